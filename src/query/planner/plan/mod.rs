//! 计划树模块
//!
//! ## 模块结构
//!
//! - `node` - 节点类型与强类型属性载荷
//! - `tree` - 基于竞技场的可变计划树
//! - `access_pattern` - 访问模式
//! - `explain` - 计划描述输出

pub mod access_pattern;
pub mod explain;
pub mod node;
pub mod tree;

pub use access_pattern::AccessPattern;
pub use explain::{describe_plan, PlanDescription, PlanNodeDescription};
pub use node::{
    ColStats, JoinSide, JoinStrategy, JoinType, NodeId, NodeKind, NodeType, PlanNode, SetOperation,
    SortItem,
};
pub use tree::PlanTree;
