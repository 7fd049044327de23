//! 代价规则
//!
//! - `CalculateCostRule`: 为整棵计划树填充估算

pub mod calculate_cost;

pub use calculate_cost::CalculateCostRule;
