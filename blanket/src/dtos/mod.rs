pub mod beregning;
pub mod varesatser;
