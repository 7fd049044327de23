//! 条件下推规则
//!
//! - `PushSelectCriteriaRule`: 把选择条件下推到其起源节点
//! - `CopyCriteriaRule`: 经等值连接条件传递复制常量条件

pub mod copy_criteria;
pub mod push_select_criteria;

pub use copy_criteria::CopyCriteriaRule;
pub use push_select_criteria::PushSelectCriteriaRule;
