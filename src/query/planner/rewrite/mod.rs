//! 计划重写模块
//!
//! 规划过程由一组规则驱动：优化器从规则栈中依次弹出规则并原地改写计划树，
//! 规则可以把需要紧接着执行的规则重新压入栈顶。
//!
//! # 模块结构
//!
//! - `context`: 重写上下文与命令上下文
//! - `rule`: 优化规则 trait 定义
//! - `rule_enum`: 静态分发的规则枚举
//! - `rule_stack`: 规则栈
//! - `plan_rewriter`: 查询优化器实现
//! - `access`: 访问节点的放置、提升与访问模式校验
//! - `merge`: 虚拟分组帧合并
//! - `predicate_pushdown`: 条件下推与传递复制
//! - `join`: 连接重排、连接算法与依赖连接选择
//! - `cost`: 代价估算
//!
//! # 默认规则顺序
//!
//! 1. `PlaceAccessRule`
//! 2. `MergeVirtualRule`
//! 3. `PushSelectCriteriaRule`
//! 4. `CopyCriteriaRule`（有复制时重新压入 `PushSelectCriteriaRule`）
//! 5. `PlanJoinsRule`
//! 6. `RaiseAccessRule`
//! 7. `ChooseJoinStrategyRule`
//! 8. `ChooseDependentRule`
//! 9. `CalculateCostRule`
//! 10. `AccessPatternValidationRule`
//!
//! # 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use fedplan::core::types::GroupSymbol;
//! use fedplan::query::capabilities::{BasicCapabilitiesFinder, SourceCapabilities};
//! use fedplan::query::metadata::{GroupRecord, MetadataStore};
//! use fedplan::query::planner::plan::{NodeKind, PlanTree};
//! use fedplan::query::planner::rewrite::{optimize_plan, CommandContext};
//!
//! let mut tree = PlanTree::new();
//! let source = tree.add_node(NodeKind::source(GroupSymbol::new("pm1.g1")));
//! tree.set_root(source);
//!
//! let metadata = MetadataStore::new().with_group(GroupRecord::new("pm1.g1", "pm1"));
//! let finder = BasicCapabilitiesFinder::new().with_default(SourceCapabilities::full());
//! let tree = optimize_plan(tree, Arc::new(metadata), Arc::new(finder), CommandContext::default())?;
//! # Ok::<(), fedplan::core::error::OptimizeError>(())
//! ```

pub mod context;
pub mod plan_rewriter;
pub mod rule;
pub mod rule_enum;
pub mod rule_stack;

pub mod access;
pub mod cost;
pub mod join;
pub mod merge;
pub mod predicate_pushdown;

pub use context::{CommandContext, CommandKind, RewriteContext};
pub use plan_rewriter::{create_default_optimizer, optimize_plan, QueryOptimizer};
pub use rule::OptimizerRule;
pub use rule_enum::RuleKind;
pub use rule_stack::RuleStack;

pub use access::*;
pub use cost::*;
pub use join::*;
pub use merge::*;
pub use predicate_pushdown::*;
