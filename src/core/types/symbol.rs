//! 符号类型定义
//!
//! 分组符号（GroupSymbol）标识查询中的一个数据来源，可以是物理表、
//! 视图或其别名；元素符号（ElementSymbol）标识分组中的一列。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 分组符号
///
/// `name` 为查询中可见的名称（可能是别名），`definition` 在使用别名时
/// 指向元数据中的真实分组名称。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupSymbol {
    name: String,
    definition: Option<String>,
}

impl GroupSymbol {
    /// 创建无别名的分组符号
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: None,
        }
    }

    /// 创建带别名的分组符号，`definition` 为元数据中的分组名称
    pub fn aliased(alias: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: alias.into(),
            definition: Some(definition.into()),
        }
    }

    /// 查询中可见的名称
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&str> {
        self.definition.as_deref()
    }

    /// 元数据查找时使用的名称
    pub fn metadata_name(&self) -> &str {
        self.definition.as_deref().unwrap_or(&self.name)
    }

    /// 是否为别名
    pub fn is_aliased(&self) -> bool {
        self.definition.is_some()
    }

    /// 创建属于该分组的元素符号
    pub fn element(&self, short_name: impl Into<String>) -> ElementSymbol {
        ElementSymbol::new(self.clone(), short_name)
    }
}

impl fmt::Display for GroupSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 元素符号
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementSymbol {
    group: GroupSymbol,
    short_name: String,
}

impl ElementSymbol {
    pub fn new(group: GroupSymbol, short_name: impl Into<String>) -> Self {
        Self {
            group,
            short_name: short_name.into(),
        }
    }

    /// 从全名解析，例如 `pm1.g1.e1` 解析为分组 `pm1.g1` 与元素 `e1`
    pub fn parse(full_name: &str) -> Option<Self> {
        let (group, short) = full_name.rsplit_once('.')?;
        if group.is_empty() || short.is_empty() {
            return None;
        }
        Some(Self::new(GroupSymbol::new(group), short))
    }

    pub fn group(&self) -> &GroupSymbol {
        &self.group
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// 查询中可见的全名
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.group.name(), self.short_name)
    }

    /// 元数据中的全名（别名被解析为真实分组）
    pub fn metadata_name(&self) -> String {
        format!("{}.{}", self.group.metadata_name(), self.short_name)
    }

    /// 替换所属分组，保留元素名称
    pub fn with_group(&self, group: GroupSymbol) -> Self {
        Self::new(group, self.short_name.clone())
    }
}

impl fmt::Display for ElementSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group.name(), self.short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_parse() {
        let e = ElementSymbol::parse("pm1.g1.e1").expect("应能解析");
        assert_eq!(e.group().name(), "pm1.g1");
        assert_eq!(e.short_name(), "e1");
        assert_eq!(e.to_string(), "pm1.g1.e1");
        assert!(ElementSymbol::parse("e1").is_none());
    }

    #[test]
    fn test_aliased_group_metadata_name() {
        let g = GroupSymbol::aliased("x", "pm1.g1");
        let e = g.element("e2");
        assert_eq!(e.full_name(), "x.e2");
        assert_eq!(e.metadata_name(), "pm1.g1.e2");
        assert!(g.is_aliased());
    }
}
