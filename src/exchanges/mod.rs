//! 交易所接入实现

pub mod binance;

pub use binance::BinanceFutures;
