//! 选择依赖连接的规则

use crate::core::error::OptimizeResult;
use crate::query::optimizer::strategy::{apply_dependent_join, DependentJoinSelector};
use crate::query::planner::plan::{JoinStrategy, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 选择依赖连接的规则
///
/// # 转换示例
///
/// Before:
/// ```text
///   LeftOuterJoin(g1.e1 = g2.e1)
///    /              \
///  Access(pm1)     Access(pm2)
/// ```
///
/// After:
/// ```text
///   LeftOuterJoin(g1.e1 = g2.e1, Dependent)
///    /              \
///  Access(pm1)     Access(pm2, dependent)
///                     |
///                  Select(g2.e1 IN <DVS>)
/// ```
///
/// # 适用条件
///
/// - 自下而上处理由引擎执行的连接
/// - 依赖侧由 [`DependentJoinSelector`] 决定，两侧都不合适时保持原样
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChooseDependentRule;

impl ChooseDependentRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for ChooseDependentRule {
    fn name(&self) -> &'static str {
        "ChooseDependentRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        let joins = tree.find_nodes(root, &[NodeType::Join], &[NodeType::Access]);
        let selector = DependentJoinSelector::new(ctx.metadata(), ctx.finder(), ctx.estimator());
        let mut chosen = 0;
        for join in joins.into_iter().rev() {
            if matches!(
                tree.kind(join),
                NodeKind::Join {
                    strategy: Some(JoinStrategy::Dependent),
                    ..
                }
            ) {
                continue;
            }
            if let Some(side) = selector.choose(tree, join)? {
                log::trace!("连接 {} 改为依赖连接，依赖侧 {:?}", join, side);
                apply_dependent_join(tree, join, side)?;
                chosen += 1;
            }
        }
        log::debug!("选择依赖连接 {} 个", chosen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::types::{Criteria, DataType, GroupSymbol};
    use crate::query::capabilities::{BasicCapabilitiesFinder, SourceCapabilities};
    use crate::query::metadata::{ElementRecord, GroupRecord, MetadataStore};
    use crate::query::planner::plan::{JoinSide, JoinType};
    use crate::query::planner::rewrite::context::CommandContext;

    #[test]
    fn test_outer_join_becomes_dependent() {
        let store = MetadataStore::new()
            .with_group(
                GroupRecord::new("pm1.g1", "pm1")
                    .with_cardinality(100.0)
                    .element(ElementRecord::new("e1", DataType::Integer)),
            )
            .with_group(
                GroupRecord::new("pm2.g2", "pm2")
                    .with_cardinality(10_000.0)
                    .element(ElementRecord::new("e1", DataType::Integer))
                    .unique_key(&["e1"]),
            );
        let mut ctx = RewriteContext::new(
            Arc::new(store),
            Arc::new(BasicCapabilitiesFinder::new().with_default(SourceCapabilities::full())),
            CommandContext::default(),
        );

        let g1 = GroupSymbol::new("pm1.g1");
        let g2 = GroupSymbol::new("pm2.g2");
        let mut tree = PlanTree::new();
        let a1 = tree.add_node(NodeKind::access("pm1"));
        let s1 = tree.add_node(NodeKind::source(g1.clone()));
        tree.add_child(a1, s1);
        let a2 = tree.add_node(NodeKind::access("pm2"));
        let s2 = tree.add_node(NodeKind::source(g2.clone()));
        tree.add_child(a2, s2);
        let join = tree.add_node(NodeKind::join(
            JoinType::LeftOuter,
            vec![Criteria::eq(g1.element("e1"), g2.element("e1"))],
        ));
        tree.add_child(join, a1);
        tree.add_child(join, a2);
        tree.set_root(join);

        ChooseDependentRule::new()
            .execute(&mut tree, &mut ctx, &mut RuleStack::new())
            .unwrap();
        tree.validate().unwrap();
        match tree.kind(join) {
            NodeKind::Join {
                strategy,
                dependent_side,
                ..
            } => {
                assert_eq!(*strategy, Some(JoinStrategy::Dependent));
                assert_eq!(*dependent_side, Some(JoinSide::Right));
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert!(matches!(tree.kind(a2), NodeKind::Access { dependent: true, .. }));

        // 已经是依赖连接时不再重复处理
        let before = tree.len();
        ChooseDependentRule::new()
            .execute(&mut tree, &mut ctx, &mut RuleStack::new())
            .unwrap();
        assert_eq!(tree.len(), before);
    }
}
