//! 连接规划规则
//!
//! - `PlanJoinsRule`: 连接区域重排
//! - `ChooseJoinStrategyRule`: 选择归并或嵌套循环连接
//! - `ChooseDependentRule`: 选择依赖连接

pub mod choose_dependent;
pub mod choose_join_strategy;
pub mod plan_joins;

pub use choose_dependent::ChooseDependentRule;
pub use choose_join_strategy::ChooseJoinStrategyRule;
pub use plan_joins::PlanJoinsRule;
