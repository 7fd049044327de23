//! 数据源能力描述
//!
//! 每个模型（数据源）暴露一组布尔能力标志、若干数值上限以及支持的标量函数集合。
//! 规划过程中能力视为只读。
//!
//! ## 模块结构
//!
//! - `finder` - 能力查找器接口与实现

pub mod finder;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

pub use finder::{BasicCapabilitiesFinder, CachingCapabilitiesFinder, CapabilitiesFinder};

/// 能力标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    CriteriaCompareEq,
    CriteriaCompareOrdered,
    CriteriaLike,
    CriteriaLikeEscape,
    CriteriaNot,
    CriteriaIsnull,
    CriteriaIn,
    CriteriaOr,
    CriteriaQuantifiedSome,
    CriteriaQuantifiedAll,
    CriteriaExists,
    QuerySubqueriesScalar,
    QueryFromJoinInner,
    QueryFromJoinOuter,
    QueryFromJoinOuterFull,
    QueryFromJoinSelfjoin,
    QueryFromGroupAlias,
    QueryAggregates,
    QueryAggregatesCount,
    QueryAggregatesCountStar,
    QueryAggregatesSum,
    QueryAggregatesAvg,
    QueryAggregatesMin,
    QueryAggregatesMax,
    QueryAggregatesDistinct,
    QueryGroupBy,
    QuerySelectDistinct,
    QueryOrderby,
    QueryUnion,
    QueryIntersect,
    QueryExcept,
    RowLimit,
    RowOffset,
    QueryCase,
    QuerySearchedCase,
    DependentJoin,
}

impl Capability {
    /// 全部能力标志
    pub const ALL: [Capability; 36] = [
        Capability::CriteriaCompareEq,
        Capability::CriteriaCompareOrdered,
        Capability::CriteriaLike,
        Capability::CriteriaLikeEscape,
        Capability::CriteriaNot,
        Capability::CriteriaIsnull,
        Capability::CriteriaIn,
        Capability::CriteriaOr,
        Capability::CriteriaQuantifiedSome,
        Capability::CriteriaQuantifiedAll,
        Capability::CriteriaExists,
        Capability::QuerySubqueriesScalar,
        Capability::QueryFromJoinInner,
        Capability::QueryFromJoinOuter,
        Capability::QueryFromJoinOuterFull,
        Capability::QueryFromJoinSelfjoin,
        Capability::QueryFromGroupAlias,
        Capability::QueryAggregates,
        Capability::QueryAggregatesCount,
        Capability::QueryAggregatesCountStar,
        Capability::QueryAggregatesSum,
        Capability::QueryAggregatesAvg,
        Capability::QueryAggregatesMin,
        Capability::QueryAggregatesMax,
        Capability::QueryAggregatesDistinct,
        Capability::QueryGroupBy,
        Capability::QuerySelectDistinct,
        Capability::QueryOrderby,
        Capability::QueryUnion,
        Capability::QueryIntersect,
        Capability::QueryExcept,
        Capability::RowLimit,
        Capability::RowOffset,
        Capability::QueryCase,
        Capability::QuerySearchedCase,
        Capability::DependentJoin,
    ];
}

/// 单个数据源的能力集合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCapabilities {
    supported: BTreeSet<Capability>,
    /// IN 条件允许的最大值个数，`None` 表示不限制
    max_in_criteria_size: Option<usize>,
    /// 单次依赖查询允许的最大谓词数，`None` 表示不限制
    max_dependent_predicates: Option<usize>,
    /// 支持的标量函数（小写）
    functions: HashSet<String>,
}

impl SourceCapabilities {
    /// 不支持任何能力的数据源
    pub fn new() -> Self {
        Self::default()
    }

    /// 支持全部能力、无数值上限的数据源
    pub fn full() -> Self {
        Self {
            supported: Capability::ALL.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.supported.insert(capability);
        self
    }

    pub fn with_all(mut self, capabilities: &[Capability]) -> Self {
        self.supported.extend(capabilities.iter().copied());
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        self.supported.remove(&capability);
        self
    }

    pub fn with_max_in_criteria_size(mut self, size: usize) -> Self {
        self.max_in_criteria_size = Some(size);
        self
    }

    pub fn with_max_dependent_predicates(mut self, count: usize) -> Self {
        self.max_dependent_predicates = Some(count);
        self
    }

    pub fn with_function(mut self, name: &str) -> Self {
        self.functions.insert(name.to_ascii_lowercase());
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.supported.contains(&capability)
    }

    pub fn supports_function(&self, name: &str) -> bool {
        self.functions.contains(&name.to_ascii_lowercase())
    }

    pub fn max_in_criteria_size(&self) -> Option<usize> {
        self.max_in_criteria_size
    }

    pub fn max_dependent_predicates(&self) -> Option<usize> {
        self.max_dependent_predicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let caps = SourceCapabilities::new()
            .with(Capability::CriteriaCompareEq)
            .with_max_in_criteria_size(50)
            .with_function("UPPER");
        assert!(caps.supports(Capability::CriteriaCompareEq));
        assert!(!caps.supports(Capability::CriteriaLike));
        assert!(caps.supports_function("upper"));
        assert_eq!(caps.max_in_criteria_size(), Some(50));
        assert_eq!(caps.max_dependent_predicates(), None);
    }

    #[test]
    fn test_full_and_without() {
        let caps = SourceCapabilities::full().without(Capability::CriteriaOr);
        assert!(caps.supports(Capability::DependentJoin));
        assert!(!caps.supports(Capability::CriteriaOr));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Capability::QueryFromJoinOuterFull).unwrap();
        assert_eq!(json, "\"QUERY_FROM_JOIN_OUTER_FULL\"");
        let caps: SourceCapabilities = serde_json::from_str(
            r#"{"supported": ["CRITERIA_IN", "ROW_LIMIT"], "max_in_criteria_size": 10}"#,
        )
        .unwrap();
        assert!(caps.supports(Capability::RowLimit));
        assert_eq!(caps.max_in_criteria_size(), Some(10));
    }
}
