//! 订单执行与组合策略
//!
//! `OrderExecutor` 是唯一的下单能力，OCO、TWAP、网格协调器
//! 通过持有它组合出各自的执行语义。

pub mod grid;
pub mod oco;
pub mod orders;
pub mod twap;

pub use grid::{GridBuilder, GridOrder, GridPlan, GridState, GridStatistics};
pub use oco::{OcoCoordinator, OcoEntry, OcoPair, OcoTrigger};
pub use orders::OrderExecutor;
pub use twap::{TwapMode, TwapPlan, TwapReport, TwapScheduler, TwapSummary};
