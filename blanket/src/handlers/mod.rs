pub mod app;
pub mod beregning;
pub mod metrics;
pub mod varesatser;
