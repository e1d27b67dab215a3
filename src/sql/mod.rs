mod escape;
mod placeholders;

pub use escape::{escape_string, quote_identifier};
pub use placeholders::normalize_placeholders;
