//! 优化策略模块
//!
//! 提供基于代价的连接规划策略
//!
//! ## 模块结构
//!
//! - `join_region` - 连接区域的发现与左深重建
//! - `join_order` - 连接顺序优化器（动态规划与贪心）
//! - `dependent_join` - 依赖连接选择器

pub mod dependent_join;
pub mod join_order;
pub mod join_region;

pub use dependent_join::{apply_dependent_join, DependentJoinSelector};

pub use join_order::{
    JoinCondition,
    JoinOrderOptimizer,
    JoinOrderResult,
    JoinSourceInfo,
    OptimizationMethod,
};

pub use join_region::{source_access_node, JoinRegion, RegionCriteria};
