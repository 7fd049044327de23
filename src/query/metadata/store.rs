//! 内存元数据目录
//!
//! 统一管理分组、元素与统计信息，提供线程安全的访问。
//! 可以在代码中逐个注册分组，也可以从 TOML 描述加载：
//!
//! ```toml
//! [[groups]]
//! name = "pm1.g1"
//! model = "pm1"
//! cardinality = 1000
//! unique_keys = [["e1"]]
//!
//! [[groups.elements]]
//! name = "e1"
//! data_type = "string"
//! ndv = 1000
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{ElementInfo, QueryMetadataInterface, SearchType, UNKNOWN_VALUE};
use crate::core::error::{MetadataError, MetadataResult};
use crate::core::types::{DataType, ElementSymbol, GroupSymbol};

/// 元素记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub ndv: Option<f64>,
    #[serde(default)]
    pub null_fraction: Option<f64>,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ElementRecord {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            search_type: SearchType::Searchable,
            nullable: true,
            ndv: None,
            null_fraction: None,
            min: None,
            max: None,
        }
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_ndv(mut self, ndv: f64) -> Self {
        self.ndv = Some(ndv);
        self
    }

    pub fn with_null_fraction(mut self, fraction: f64) -> Self {
        self.null_fraction = Some(fraction.clamp(0.0, 1.0));
        self
    }

    pub fn with_range(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    fn to_info(&self) -> ElementInfo {
        ElementInfo {
            data_type: self.data_type,
            search_type: self.search_type,
            nullable: self.nullable,
            ndv: self.ndv,
            null_fraction: self.null_fraction,
            min: self.min.clone(),
            max: self.max.clone(),
        }
    }
}

/// 分组记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub cardinality: Option<f64>,
    #[serde(default)]
    pub elements: Vec<ElementRecord>,
    #[serde(default)]
    pub unique_keys: Vec<Vec<String>>,
    #[serde(default)]
    pub access_patterns: Vec<Vec<String>>,
}

impl GroupRecord {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            is_virtual: false,
            cardinality: None,
            elements: Vec::new(),
            unique_keys: Vec::new(),
            access_patterns: Vec::new(),
        }
    }

    pub fn virtual_group(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    pub fn with_cardinality(mut self, cardinality: f64) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    pub fn element(mut self, element: ElementRecord) -> Self {
        self.elements.push(element);
        self
    }

    pub fn unique_key(mut self, columns: &[&str]) -> Self {
        self.unique_keys
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn access_pattern(mut self, columns: &[&str]) -> Self {
        self.access_patterns
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

/// 内存元数据目录
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    groups: Arc<RwLock<HashMap<String, GroupRecord>>>,
}

impl MetadataStore {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 描述加载
    pub fn from_toml_str(content: &str) -> MetadataResult<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        let store = Self::new();
        for group in file.groups {
            store.add_group(group);
        }
        Ok(store)
    }

    /// 注册分组，同名分组被覆盖
    pub fn add_group(&self, group: GroupRecord) {
        log::trace!("注册分组 {} (模型 {})", group.name, group.model);
        self.groups.write().insert(group.name.clone(), group);
    }

    /// 链式注册
    pub fn with_group(self, group: GroupRecord) -> Self {
        self.add_group(group);
        self
    }

    /// 更新分组基数（统计信息刷新）
    pub fn update_cardinality(&self, group_name: &str, cardinality: Option<f64>) -> MetadataResult<()> {
        let mut groups = self.groups.write();
        let record = groups
            .get_mut(group_name)
            .ok_or_else(|| MetadataError::GroupNotFound(group_name.to_string()))?;
        record.cardinality = cardinality;
        Ok(())
    }

    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    fn with_record<T>(
        &self,
        group: &GroupSymbol,
        f: impl FnOnce(&GroupRecord) -> MetadataResult<T>,
    ) -> MetadataResult<T> {
        let groups = self.groups.read();
        let record = groups
            .get(group.metadata_name())
            .ok_or_else(|| MetadataError::GroupNotFound(group.metadata_name().to_string()))?;
        f(record)
    }
}

impl QueryMetadataInterface for MetadataStore {
    fn model_of(&self, group: &GroupSymbol) -> MetadataResult<String> {
        self.with_record(group, |r| Ok(r.model.clone()))
    }

    fn is_virtual_group(&self, group: &GroupSymbol) -> MetadataResult<bool> {
        self.with_record(group, |r| Ok(r.is_virtual))
    }

    fn group_cardinality(&self, group: &GroupSymbol) -> MetadataResult<f64> {
        self.with_record(group, |r| Ok(r.cardinality.unwrap_or(UNKNOWN_VALUE)))
    }

    fn element_info(&self, element: &ElementSymbol) -> MetadataResult<ElementInfo> {
        self.with_record(element.group(), |r| {
            r.elements
                .iter()
                .find(|e| e.name == element.short_name())
                .map(ElementRecord::to_info)
                .ok_or_else(|| MetadataError::ElementNotFound(element.metadata_name()))
        })
    }

    fn unique_keys(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<String>>> {
        self.with_record(group, |r| Ok(r.unique_keys.clone()))
    }

    fn access_patterns(&self, group: &GroupSymbol) -> MetadataResult<Vec<Vec<String>>> {
        self.with_record(group, |r| Ok(r.access_patterns.clone()))
    }
}
