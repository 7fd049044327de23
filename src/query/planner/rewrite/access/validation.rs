//! 访问模式校验规则

use crate::core::error::OptimizeResult;
use crate::query::optimizer::access_pattern::validate_access_patterns;
use crate::query::planner::plan::PlanTree;
use crate::query::planner::rewrite::context::{CommandKind, RewriteContext};
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 访问模式校验规则
///
/// 在计划形态稳定后执行。任一访问节点的访问模式全部未满足时，规划失败并返回
/// 规划错误。INSERT 不受访问模式约束；DELETE 与 UPDATE 与查询一样校验。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AccessPatternValidationRule;

impl AccessPatternValidationRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for AccessPatternValidationRule {
    fn name(&self) -> &'static str {
        "AccessPatternValidationRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let kind = ctx.command().command_kind;
        if !kind.validates_access_patterns() {
            log::debug!("{:?} 命令不校验访问模式", kind);
            return Ok(());
        }
        if let CommandKind::Update { has_where } | CommandKind::Delete { has_where } = kind {
            log::trace!("校验 {:?} 命令的访问模式，WHERE 子句: {}", kind, has_where);
        }
        let root = tree.require_root()?;
        validate_access_patterns(tree, root)
    }
}
