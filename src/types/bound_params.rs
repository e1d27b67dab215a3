use crate::types::SqlValue;

/// Wire format of a positional parameter. The discriminants match the
/// PostgreSQL protocol format codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Text = 0,
    Binary = 1,
}

impl ParamFormat {
    pub fn code(self) -> i16 {
        self as i16
    }
}

/// A single positional parameter ready to be sent to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    data: Option<Vec<u8>>,
    format: ParamFormat,
}

impl BoundParam {
    /// The null marker: no data, zero length, text format.
    pub fn null() -> Self {
        Self {
            data: None,
            format: ParamFormat::Text,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            data: Some(value.into().into_bytes()),
            format: ParamFormat::Text,
        }
    }

    pub fn binary(value: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(value.into()),
            format: ParamFormat::Binary,
        }
    }

    /// Binds one application value.
    pub fn from_value(value: &SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::null(),
            SqlValue::Bytes(bytes) => Self::binary(bytes.clone()),
            other => match other.to_text() {
                Some(text) => Self::text(text),
                None => Self::null(),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Byte length of the parameter; zero for NULL.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> ParamFormat {
        self.format
    }
}

/// Ordered parameter set for one parameterized execution.
/// Built fresh for every call and positionally matched to `$n` placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundParams {
    params: Vec<BoundParam>,
}

impl BoundParams {
    pub fn bind(values: &[SqlValue]) -> Self {
        Self {
            params: values.iter().map(BoundParam::from_value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BoundParam> {
        self.params.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParam> {
        self.params.iter()
    }

    /// Parameter data, `None` marking NULL.
    pub fn values(&self) -> Vec<Option<&[u8]>> {
        self.params.iter().map(BoundParam::data).collect()
    }

    pub fn lengths(&self) -> Vec<usize> {
        self.params.iter().map(BoundParam::len).collect()
    }

    pub fn formats(&self) -> Vec<ParamFormat> {
        self.params.iter().map(BoundParam::format).collect()
    }
}

impl From<Vec<BoundParam>> for BoundParams {
    fn from(params: Vec<BoundParam>) -> Self {
        Self { params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_zero_length_marker() {
        let params = BoundParams::bind(&[SqlValue::Null]);
        let param = params.get(0).unwrap();

        assert!(param.is_null());
        assert_eq!(param.len(), 0);
        assert_eq!(param.format(), ParamFormat::Text);
        assert_eq!(params.values(), vec![None]);
    }

    #[test]
    fn test_parallel_views() {
        let params = BoundParams::bind(&[
            SqlValue::from("héllo"),
            SqlValue::from(12),
            SqlValue::from(vec![0xde, 0xad]),
            SqlValue::Null,
        ]);

        assert_eq!(params.len(), 4);
        assert_eq!(params.lengths(), vec![6, 2, 2, 0]);
        assert_eq!(
            params.formats(),
            vec![
                ParamFormat::Text,
                ParamFormat::Text,
                ParamFormat::Binary,
                ParamFormat::Text
            ]
        );
        assert_eq!(
            params.values(),
            vec![
                Some("héllo".as_bytes()),
                Some(&b"12"[..]),
                Some(&[0xde, 0xad][..]),
                None
            ]
        );
    }

    #[test]
    fn test_format_codes() {
        assert_eq!(ParamFormat::Text.code(), 0);
        assert_eq!(ParamFormat::Binary.code(), 1);
    }

    #[test]
    fn test_empty_binary_is_not_null() {
        let param = BoundParam::from_value(&SqlValue::Bytes(Vec::new()));
        assert!(!param.is_null());
        assert!(param.is_empty());
        assert_eq!(param.format(), ParamFormat::Binary);
    }
}
