mod driver;

pub use driver::{ConnectionStatus, Connector, DatabaseDriver};
