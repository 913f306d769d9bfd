//! Port traits the domain depends on.

pub mod http_port;
pub mod price_source_port;
pub mod cache_port;
pub mod config_port;
pub mod report_port;
