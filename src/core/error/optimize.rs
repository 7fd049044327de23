//! 优化器错误类型
//!
//! 定义查询优化器相关的错误类型，包括：
//! - 组件内部错误（优化器自身的不变量被破坏）
//! - 统一的优化错误（元数据错误、规划错误、组件错误）

use thiserror::Error;

use crate::core::error::metadata::MetadataError;
use crate::core::error::planner::QueryPlannerError;

/// 组件内部错误
///
/// 表示优化器自身的缺陷，而不是查询无法规划
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    /// 计划节点不存在（悬空的节点ID）
    #[error("计划节点不存在: {0}")]
    NodeNotFound(usize),

    /// 计划结构不合法
    #[error("无效的计划结构: {0}")]
    InvalidPlanStructure(String),

    /// 条件结构不合法
    #[error("无效的条件结构: {0}")]
    MalformedCriteria(String),

    /// 规则执行次数超过上限
    #[error("规则执行次数超过上限 {limit}，最后执行的规则: {last_rule}")]
    RuleLimitExceeded { limit: usize, last_rule: String },

    /// 其他内部错误
    #[error("内部优化错误: {0}")]
    Internal(String),
}

impl ComponentError {
    pub fn invalid_plan_structure(msg: impl Into<String>) -> Self {
        Self::InvalidPlanStructure(msg.into())
    }

    pub fn malformed_criteria(msg: impl Into<String>) -> Self {
        Self::MalformedCriteria(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// 优化器错误类型
///
/// 三类错误都直接传播给规则栈的调用方，规则之间不吞掉彼此的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("元数据错误: {0}")]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Planner(#[from] QueryPlannerError),

    #[error("优化器组件错误: {0}")]
    Component(#[from] ComponentError),
}

impl OptimizeError {
    /// 查询无法规划（用户可修正）
    pub fn is_planner_error(&self) -> bool {
        matches!(self, OptimizeError::Planner(_))
    }

    /// 优化器内部缺陷
    pub fn is_component_error(&self) -> bool {
        matches!(self, OptimizeError::Component(_))
    }
}

/// 优化器结果类型
pub type OptimizeResult<T> = Result<T, OptimizeError>;
