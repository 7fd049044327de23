//! 计算计划代价的规则

use crate::core::error::OptimizeResult;
use crate::query::planner::plan::PlanTree;
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 计算计划代价的规则
///
/// 自底向上为每个节点填充估算基数与列统计，结果缓存在节点上
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CalculateCostRule;

impl CalculateCostRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for CalculateCostRule {
    fn name(&self) -> &'static str {
        "CalculateCostRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        let cardinality = ctx.estimator().compute_cost_for_tree(tree, root)?;
        log::debug!("计划根节点 {} 的估算基数为 {}", root, cardinality);
        Ok(())
    }
}
