//! 代价计算模块
//!
//! 提供查询优化器所需的基数与列统计估算功能
//!
//! ## 模块结构
//!
//! - `estimator` - 代价估算器，后序推导并缓存节点估算
//! - `selectivity` - 选择性估计器，估算查询条件的选择性
//! - `col_stats` - 列统计解析（节点统计优先，回退元数据）
//! - `config` - 代价模型配置
//! - `estimate` - 节点估算结果与未知值算术
//! - `node_estimators` - 各类节点估算器

pub mod col_stats;
pub mod config;
pub mod estimate;
pub mod estimator;
pub mod node_estimators;
pub mod selectivity;

pub use col_stats::ColumnStatsResolver;
pub use config::CostModelConfig;
pub use estimate::NodeEstimate;
pub use estimator::CostEstimator;
pub use selectivity::SelectivityEstimator;
