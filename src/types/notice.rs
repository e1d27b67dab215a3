use std::sync::Arc;

use tracing::{info, warn};

/// An informational or warning message sent by the server outside of a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: String,
    pub message: String,
}

impl Notice {
    pub fn new(severity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: severity.into(),
            message: message.into(),
        }
    }
}

/// Callback receiving server notices for one connection.
pub type NoticeProcessor = Arc<dyn Fn(&Notice) + Send + Sync>;

/// Default processor: forwards notices to the tracing subscriber.
pub fn log_notice(notice: &Notice) {
    if notice.severity.eq_ignore_ascii_case("WARNING") {
        warn!(severity = %notice.severity, "{}", notice.message);
    } else {
        info!(severity = %notice.severity, "{}", notice.message);
    }
}

pub fn default_notice_processor() -> NoticeProcessor {
    Arc::new(log_notice)
}
