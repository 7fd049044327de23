//! 重写上下文定义
//!
//! 定义 RewriteContext 结构体，携带一次规划过程共享的只读输入：
//! 元数据接口、能力查找器、命令上下文，以及规则执行计数。

use std::fmt;
use std::sync::Arc;

use crate::config::PlannerLimits;
use crate::query::capabilities::CapabilitiesFinder;
use crate::query::metadata::QueryMetadataInterface;
use crate::query::optimizer::cost::{CostEstimator, CostModelConfig};

/// 被规划的命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Query,
    Insert,
    Update { has_where: bool },
    Delete { has_where: bool },
}

impl CommandKind {
    /// 是否需要校验访问模式
    ///
    /// INSERT 不读取目标分组，不受访问模式约束
    pub fn validates_access_patterns(&self) -> bool {
        !matches!(self, CommandKind::Insert)
    }
}

impl Default for CommandKind {
    fn default() -> Self {
        CommandKind::Query
    }
}

/// 会话级的命令上下文
///
/// 每次规划显式传入，规则不读取任何全局状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommandContext {
    /// 是否复制全部传递条件（包括无法下推到目标数据源的条件）
    pub copy_all_criteria: bool,
    pub command_kind: CommandKind,
    pub cost: CostModelConfig,
    pub limits: PlannerLimits,
}

impl CommandContext {
    pub fn new(command_kind: CommandKind) -> Self {
        Self {
            command_kind,
            ..Self::default()
        }
    }

    pub fn with_copy_all_criteria(mut self, copy_all: bool) -> Self {
        self.copy_all_criteria = copy_all;
        self
    }

    pub fn with_cost(mut self, cost: CostModelConfig) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_limits(mut self, limits: PlannerLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// 重写上下文
///
/// 规则通过上下文访问元数据、数据源能力与代价估算器
pub struct RewriteContext {
    metadata: Arc<dyn QueryMetadataInterface>,
    finder: Arc<dyn CapabilitiesFinder>,
    command: CommandContext,
    estimator: CostEstimator,
    /// 已执行的规则次数
    executions: usize,
}

impl RewriteContext {
    /// 创建新的重写上下文
    pub fn new(
        metadata: Arc<dyn QueryMetadataInterface>,
        finder: Arc<dyn CapabilitiesFinder>,
        command: CommandContext,
    ) -> Self {
        let estimator = CostEstimator::new(metadata.clone(), command.cost);
        Self {
            metadata,
            finder,
            command,
            estimator,
            executions: 0,
        }
    }

    pub fn metadata(&self) -> &dyn QueryMetadataInterface {
        &*self.metadata
    }

    pub fn finder(&self) -> &dyn CapabilitiesFinder {
        &*self.finder
    }

    pub fn command(&self) -> &CommandContext {
        &self.command
    }

    pub fn estimator(&self) -> &CostEstimator {
        &self.estimator
    }

    /// 记录一次规则执行，返回累计次数
    pub fn record_execution(&mut self) -> usize {
        self.executions += 1;
        self.executions
    }

    /// 获取已执行的规则次数
    pub fn executions(&self) -> usize {
        self.executions
    }
}

impl fmt::Debug for RewriteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteContext")
            .field("command", &self.command)
            .field("executions", &self.executions)
            .finish()
    }
}
