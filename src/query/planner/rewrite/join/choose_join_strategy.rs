//! 选择连接算法的规则

use crate::core::error::OptimizeResult;
use crate::query::planner::plan::{JoinStrategy, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 选择连接算法的规则
///
/// 由引擎执行的连接（不在访问节点之下）有等值条件时使用归并连接，
/// 否则使用嵌套循环连接。
///
/// # 适用条件
///
/// - 连接不在访问节点之下
/// - 已选定为依赖连接的不再改变
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChooseJoinStrategyRule;

impl ChooseJoinStrategyRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for ChooseJoinStrategyRule {
    fn name(&self) -> &'static str {
        "ChooseJoinStrategyRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        _ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        for join in tree.find_nodes(root, &[NodeType::Join], &[NodeType::Access]) {
            if let NodeKind::Join {
                criteria, strategy, ..
            } = tree.kind_mut(join)
            {
                if *strategy == Some(JoinStrategy::Dependent) {
                    continue;
                }
                let equi = criteria
                    .iter()
                    .flat_map(|c| c.conjuncts())
                    .any(|c| c.equi_join_pair().is_some());
                let chosen = if equi {
                    JoinStrategy::Merge
                } else {
                    JoinStrategy::NestedLoop
                };
                log::trace!("连接 {} 使用 {:?}", join, chosen);
                *strategy = Some(chosen);
            }
        }
        Ok(())
    }
}
