//! 规划错误类型
//!
//! 查询本身不存在合法计划时返回。错误信息需要精确且可复现，
//! 便于用户定位不满足的访问模式。

use thiserror::Error;

/// 规划错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryPlannerError {
    /// 访问模式未满足
    ///
    /// `groups` 为访问节点暴露的分组，`patterns` 为全部声明的访问模式描述
    #[error(
        "Group has an access pattern which has not been met: group(s) [{}]; access pattern(s) [{}]",
        .groups.join(", "),
        .patterns.join(", ")
    )]
    UnmetAccessPattern {
        groups: Vec<String>,
        patterns: Vec<String>,
    },
}

/// 规划结果类型
pub type PlannerResult<T> = Result<T, QueryPlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmet_access_pattern_message() {
        let err = QueryPlannerError::UnmetAccessPattern {
            groups: vec!["pm4.g1".to_string()],
            patterns: vec!["Access Pattern: Unsatisfied [pm4.g1.e1] History [[pm4.g1.e1]]".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Group has an access pattern which has not been met: group(s) [pm4.g1]; \
             access pattern(s) [Access Pattern: Unsatisfied [pm4.g1.e1] History [[pm4.g1.e1]]]"
        );
    }
}
