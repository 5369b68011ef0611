//! 计划层：数据模型、Planner、Executor
//!
//! 固定两段式流程：create_plan 产出一次性的步骤列表，execute_plan 顺序走完。
//! 没有分支、循环、重试，也不做步骤并行。

pub mod executor;
pub mod planner;
pub mod types;

pub use executor::Executor;
pub use planner::Planner;
pub use types::{ParamValue, Plan, Step};
