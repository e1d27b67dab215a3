use crate::error::{PgTxError, Result};

/// Outcome status reported by the driver for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    EmptyQuery,
    CommandOk,
    TuplesOk,
    BadResponse,
    NonfatalError,
    FatalError,
}

impl ExecStatus {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            ExecStatus::BadResponse | ExecStatus::NonfatalError | ExecStatus::FatalError
        )
    }
}

/// Driver-agnostic raw result from a database command.
/// Cell values are converted to text by the driver; `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryResult {
    pub status: ExecStatus,
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of values in column order
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows touched by an INSERT/UPDATE/DELETE style command
    pub rows_affected: Option<u64>,
    pub error_message: Option<String>,
    pub sql_state: Option<String>,
}

impl RawQueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self {
            status: ExecStatus::TuplesOk,
            columns,
            rows,
            rows_affected: None,
            error_message: None,
            sql_state: None,
        }
    }

    /// A successful command that returned no rows.
    pub fn empty() -> Self {
        Self {
            status: ExecStatus::CommandOk,
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: None,
            error_message: None,
            sql_state: None,
        }
    }

    pub fn command(rows_affected: u64) -> Self {
        Self {
            rows_affected: Some(rows_affected),
            ..Self::empty()
        }
    }

    pub fn failed(status: ExecStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            error_message: Some(message.into()),
            ..Self::empty()
        }
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

/// A single row result from a query.
/// Values are stored as text in server column order and accessed by name or position.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub(crate) fn new(columns: &[String], values: Vec<Option<String>>) -> Self {
        Self {
            columns: columns.to_vec(),
            values,
        }
    }

    /// Gets a value by column name. `Ok(None)` is SQL NULL.
    ///
    /// When several columns share a name the first one wins.
    pub fn get(&self, column: &str) -> Result<Option<&str>> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.get_index(i))
            .ok_or_else(|| PgTxError::ColumnNotFound(column.to_string()))
    }

    /// Gets a value by position, `None` when out of range.
    pub fn get_index(&self, index: usize) -> Option<Option<&str>> {
        self.values.get(index).map(|v| v.as_deref())
    }

    /// Returns all column names in this row, in server order.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|s| s.as_str()).collect()
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of a query execution, containing zero or more rows.
#[derive(Debug)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    rows_affected: Option<u64>,
}

impl QueryResult {
    /// Creates a QueryResult from a RawQueryResult.
    pub fn from_raw(raw: RawQueryResult) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .map(|values| Row::new(&raw.columns, values))
            .collect();
        Self {
            columns: raw.columns,
            rows,
            rows_affected: raw.rows_affected,
        }
    }

    /// Extracts a single row from the result.
    /// Returns an error if the result contains zero or more than one row.
    pub fn single_row(self) -> Result<Row> {
        let actual = self.rows.len();
        let mut rows = self.rows.into_iter();
        match (rows.next(), rows.next()) {
            (Some(row), None) => Ok(row),
            _ => Err(PgTxError::UnexpectedRowCount {
                expected: 1,
                actual,
            }),
        }
    }

    /// Returns all rows from the result.
    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns a reference to the rows without consuming the result.
    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the column names from this result.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows touched by the command, when the server reported a count.
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// Returns the number of rows in this result.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if this result contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
