//! Core domain types and logic.

pub mod ohlcv;
pub mod numeric;
pub mod calendar;
pub mod position;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod risk;
pub mod retry;
pub mod retriever;
pub mod error;
