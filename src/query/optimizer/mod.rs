//! 查询优化器模块
//!
//! 提供规则共用的优化组件：下推能力校验、帧工具、代价估算、连接策略与访问模式校验
//!
//! ## 模块结构
//!
//! - `capability` - 下推能力校验，判断语言对象能否整体交给数据源执行
//! - `frame` - 帧工具，定位起源节点并在帧变化时改写祖先节点
//! - `cost` - 代价计算模块，估算节点基数与列统计
//! - `strategy` - 优化策略模块，提供连接区域、连接顺序与依赖连接选择
//! - `access_pattern` - 访问模式校验
//!
//! ## 使用示例
//!
//! ```rust
//! use fedplan::query::optimizer::cost::{CostEstimator, CostModelConfig};
//! use fedplan::query::metadata::MetadataStore;
//! use std::sync::Arc;
//!
//! // 创建代价估算器
//! let estimator = CostEstimator::new(Arc::new(MetadataStore::new()), CostModelConfig::default());
//! assert_eq!(estimator.config().group_reduction, 0.5);
//! ```

pub mod access_pattern;
pub mod capability;
pub mod cost;
pub mod frame;
pub mod strategy;

// 重新导出主要类型
pub use access_pattern::{constrained_elements, satisfy_access_patterns, validate_access_patterns};
pub use capability::{can_push_language_object, LanguageObject};
pub use cost::{CostEstimator, CostModelConfig, NodeEstimate, SelectivityEstimator};
pub use frame::{
    convert_criteria, convert_expression, convert_frame, find_join_source_node,
    find_originating_node,
};
pub use strategy::{
    apply_dependent_join, DependentJoinSelector, JoinOrderOptimizer, JoinRegion,
};
