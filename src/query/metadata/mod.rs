//! 元数据查询接口
//!
//! 优化器通过 `QueryMetadataInterface` 读取分组所属模型、基数、元素统计、
//! 唯一键与访问模式。元数据在一次规划过程中视为只读且稳定。
//!
//! ## 模块结构
//!
//! - `store` - 内存元数据目录，可在代码中构建或从 TOML 加载

pub mod store;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::MetadataResult;
use crate::core::types::{DataType, ElementSymbol, GroupSymbol};

pub use store::{ElementRecord, GroupRecord, MetadataStore};

/// 未知基数 / 未知估算值的哨兵
pub const UNKNOWN_VALUE: f64 = -1.0;

/// 判断估算值是否未知
pub fn is_unknown(value: f64) -> bool {
    value < 0.0 || value.is_nan()
}

/// 列的可搜索性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// 支持所有比较与 LIKE
    #[default]
    Searchable,
    /// 支持除 LIKE 之外的比较
    AllExceptLike,
    /// 仅支持 LIKE
    LikeOnly,
    /// 不可出现在条件中
    Unsearchable,
}

impl SearchType {
    pub fn allows_comparison(&self) -> bool {
        matches!(self, SearchType::Searchable | SearchType::AllExceptLike)
    }

    pub fn allows_like(&self) -> bool {
        matches!(self, SearchType::Searchable | SearchType::LikeOnly)
    }
}

/// 元素（列）信息
#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub data_type: DataType,
    pub search_type: SearchType,
    pub nullable: bool,
    /// 不同值数量
    pub ndv: Option<f64>,
    /// 空值比例
    pub null_fraction: Option<f64>,
    /// 统计最小值（字符串形式，按列类型解析）
    pub min: Option<String>,
    /// 统计最大值
    pub max: Option<String>,
}

/// 元数据查询接口
///
/// 实现者可以被多个并发规划共享；若内部有缓存，需要自行同步。
pub trait QueryMetadataInterface: Send + Sync + fmt::Debug {
    /// 分组所属的模型（数据源）标识
    fn model_of(&self, group: &GroupSymbol) -> MetadataResult<String>;

    /// 是否为虚拟分组（视图）
    fn is_virtual_group(&self, group: &GroupSymbol) -> MetadataResult<bool>;

    /// 分组的存储基数，未知时返回 `UNKNOWN_VALUE`
    fn group_cardinality(&self, group: &GroupSymbol) -> MetadataResult<f64>;

    /// 元素信息
    fn element_info(&self, element: &ElementSymbol) -> MetadataResult<ElementInfo>;

    /// 唯一键（主键在前），每个键为元素短名列表
    fn unique_keys(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<String>>>;

    /// 声明的访问模式，每个模式为必须约束的元素短名列表
    fn access_patterns(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<String>>>;

    /// 给定元素集合是否覆盖分组的某个唯一键
    fn covers_unique_key(&self, group: &GroupSymbol, elements: &[&str]) -> MetadataResult<bool> {
        Ok(self
            .unique_keys(group)?
            .iter()
            .any(|key| !key.is_empty() && key.iter().all(|k| elements.contains(&k.as_str()))))
    }

    /// 元素是否属于某个唯一键
    fn is_key_element(&self, element: &ElementSymbol) -> MetadataResult<bool> {
        Ok(self
            .unique_keys(element.group())?
            .iter()
            .any(|key| key.iter().any(|k| k == element.short_name())))
    }
}
