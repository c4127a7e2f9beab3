#![allow(dead_code)]
#![allow(unused_variables)]
#![allow(unused_imports)]

pub mod core;
pub mod engine;
pub mod exchanges;
pub mod strategies;
pub mod utils;

// 选择性导出，避免命名冲突；core须用crate::前缀与内建crate区分
pub use crate::core::{config::*, error::*, exchange::*, types::*, validator::*};
pub use engine::ExecutionEngine;
pub use exchanges::*;
pub use strategies::*;
pub use utils::*;
