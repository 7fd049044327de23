//! 统一错误处理系统
//!
//! ## 设计理念
//!
//! 1. **按来源分层**：
//!    - 元数据错误（`MetadataError`）：元数据接口查找失败
//!    - 规划错误（`QueryPlannerError`）：查询不存在合法计划，例如访问模式未满足
//!    - 组件错误（`ComponentError`）：优化器自身的不变量被破坏
//!
//! 2. **统一接口**：`OptimizeResult<T>` 提供统一的返回类型，
//!    各层错误通过 `#[from]` 自动转换，调用方可以区分"查询无法规划"与"优化器出错"

pub mod metadata;
pub mod planner;
pub mod optimize;

pub use metadata::{MetadataError, MetadataResult};
pub use planner::{PlannerResult, QueryPlannerError};
pub use optimize::{ComponentError, OptimizeError, OptimizeResult};
