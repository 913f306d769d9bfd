//! Concrete adapter implementations for ports.

pub mod http_adapter;
pub mod twse_adapter;
pub mod yahoo_adapter;
pub mod csv_cache_adapter;
pub mod csv_report_adapter;
pub mod file_config_adapter;
