//! 规划器模块
//!
//! - `plan`: 基于竞技场的计划树
//! - `rewrite`: 规则栈驱动的计划重写

pub mod plan;
pub mod rewrite;

pub use plan::{NodeId, NodeKind, NodeType, PlanTree};
pub use rewrite::{optimize_plan, CommandContext, CommandKind, QueryOptimizer};
