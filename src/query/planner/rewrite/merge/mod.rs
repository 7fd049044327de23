//! 合并规则
//!
//! - `MergeVirtualRule`: 消除简单虚拟分组的帧

pub mod merge_virtual;

pub use merge_virtual::MergeVirtualRule;
