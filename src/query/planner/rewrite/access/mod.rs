//! 访问节点规则
//!
//! - `PlaceAccessRule`: 在物理分组上方放置访问节点
//! - `RaiseAccessRule`: 把数据源能执行的操作并入访问节点
//! - `AccessPatternValidationRule`: 校验访问模式

pub mod place_access;
pub mod raise_access;
pub mod validation;

pub use place_access::PlaceAccessRule;
pub use raise_access::RaiseAccessRule;
pub use validation::AccessPatternValidationRule;
