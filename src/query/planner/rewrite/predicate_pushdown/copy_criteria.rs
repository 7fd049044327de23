//! 传递复制条件的规则

use crate::core::error::OptimizeResult;
use crate::core::types::{Criteria, ElementSymbol, Expression};
use crate::query::optimizer::capability::{can_push_language_object, LanguageObject};
use crate::query::planner::plan::{JoinType, NodeId, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_enum::RuleKind;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 传递复制条件的规则
///
/// 内连接上的等值条件 `a = b` 让作用在 `a` 上的常量条件同样作用在 `b` 上。
///
/// # 转换示例
///
/// Before:
/// ```text
///   InnerJoin(g1.e1 = g2.e1)
///    /             \
///  Select(g1.e1 = 5) Access(g2)
///    |
///  Access(g1)
/// ```
///
/// After:
/// ```text
///   Select(g2.e1 = 5, copied)
///        |
///   InnerJoin(g1.e1 = g2.e1)
///    /             \
///  Select(g1.e1 = 5) Access(g2)
///    |
///  Access(g1)
/// ```
///
/// 复制出的条件随后由 [`PushSelectCriteriaRule`](super::PushSelectCriteriaRule) 下推。
///
/// # 适用条件
///
/// - 只处理内连接
/// - 只复制引用单个元素、另一侧为常量的比较条件与 IN 条件
/// - 已存在的条件不重复复制
/// - 未开启 `copy_all_criteria` 时，目标数据源无法执行的条件不复制
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CopyCriteriaRule;

impl CopyCriteriaRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }

    /// 条件只约束单个元素且其余部分都是常量时返回该元素
    fn copyable_element(criteria: &Criteria) -> Option<&ElementSymbol> {
        match criteria {
            Criteria::Compare { left, right, .. } => match (left, right) {
                (Expression::Element(e), Expression::Constant(_))
                | (Expression::Constant(_), Expression::Element(e)) => Some(e),
                _ => None,
            },
            Criteria::Set {
                expr: Expression::Element(e),
                values,
                ..
            } if values.iter().all(|v| matches!(v, Expression::Constant(_))) => Some(e),
            _ => None,
        }
    }

    /// 目标元素所在的访问节点模型
    fn target_model<'a>(tree: &'a PlanTree, join: NodeId, element: &ElementSymbol) -> Option<&'a str> {
        let source = tree
            .find_nodes(join, &[NodeType::Source], &[NodeType::Source])
            .into_iter()
            .find(|s| matches!(tree.kind(*s), NodeKind::Source { group, .. } if group == element.group()))?;
        let access = tree.find_parent(source, &[NodeType::Access], &[NodeType::Join])?;
        match tree.kind(access) {
            NodeKind::Access { model, .. } => Some(model.as_str()),
            _ => None,
        }
    }

    fn copy_for_join(
        tree: &mut PlanTree,
        ctx: &RewriteContext,
        join: NodeId,
    ) -> OptimizeResult<usize> {
        let pairs: Vec<(ElementSymbol, ElementSymbol)> = match tree.kind(join) {
            NodeKind::Join {
                join_type: JoinType::Inner,
                criteria,
                ..
            } => criteria
                .iter()
                .flat_map(Criteria::conjuncts)
                .filter_map(Criteria::equi_join_pair)
                .map(|(l, r)| (l.clone(), r.clone()))
                .collect(),
            _ => return Ok(0),
        };
        if pairs.is_empty() {
            return Ok(0);
        }

        let mut existing: Vec<Criteria> = Vec::new();
        for select in tree.find_nodes(join, &[NodeType::Select], &[NodeType::Source]) {
            if let NodeKind::Select { criteria, .. } = tree.kind(select) {
                existing.extend(criteria.conjuncts().into_iter().cloned());
            }
        }
        if let Some(parent) = tree.parent(join) {
            if let NodeKind::Select { criteria, .. } = tree.kind(parent) {
                existing.extend(criteria.conjuncts().into_iter().cloned());
            }
        }

        let mut copies = Vec::new();
        for criteria in &existing {
            let Some(element) = Self::copyable_element(criteria) else {
                continue;
            };
            for (left, right) in &pairs {
                let partner = if element == left {
                    right
                } else if element == right {
                    left
                } else {
                    continue;
                };
                let mut derived = criteria.clone();
                derived.replace_elements(&mut |e| {
                    (e == element).then(|| Expression::Element(partner.clone()))
                });
                if existing.contains(&derived) || copies.contains(&derived) {
                    continue;
                }
                if !ctx.command().copy_all_criteria {
                    let pushable = match Self::target_model(tree, join, partner) {
                        Some(model) => can_push_language_object(
                            LanguageObject::Criteria(&derived),
                            model,
                            ctx.metadata(),
                            ctx.finder(),
                        )?,
                        None => false,
                    };
                    if !pushable {
                        log::trace!("条件 {} 无法下推到目标数据源，不复制", derived);
                        continue;
                    }
                }
                log::trace!("由 {} 经连接 {} 复制出条件 {}", criteria, join, derived);
                copies.push(derived);
            }
        }

        let count = copies.len();
        if let Some(criteria) = Criteria::combine(copies) {
            let select = tree.add_node(NodeKind::Select {
                criteria,
                copied: true,
                dependent: false,
            });
            tree.add_as_parent(join, select);
            tree.invalidate_estimates(select);
        }
        Ok(count)
    }
}

impl OptimizerRule for CopyCriteriaRule {
    fn name(&self) -> &'static str {
        "CopyCriteriaRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        let mut copied = 0;
        for join in tree.find_nodes(root, &[NodeType::Join], &[]) {
            copied += Self::copy_for_join(tree, ctx, join)?;
        }
        log::debug!("复制条件 {} 个", copied);
        if copied > 0 {
            rules.push(RuleKind::PushSelectCriteria(Default::default()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::types::{CompareOperator, DataType, GroupSymbol, Value};
    use crate::query::capabilities::{BasicCapabilitiesFinder, Capability, SourceCapabilities};
    use crate::query::metadata::{ElementRecord, GroupRecord, MetadataStore};
    use crate::query::planner::rewrite::context::CommandContext;

    fn context(caps: SourceCapabilities, copy_all: bool) -> RewriteContext {
        let store = MetadataStore::new()
            .with_group(GroupRecord::new("pm1.g1", "pm1").element(ElementRecord::new("e1", DataType::Integer)))
            .with_group(GroupRecord::new("pm2.g2", "pm2").element(ElementRecord::new("e1", DataType::Integer)));
        RewriteContext::new(
            Arc::new(store),
            Arc::new(BasicCapabilitiesFinder::new().with_default(caps)),
            CommandContext::default().with_copy_all_criteria(copy_all),
        )
    }

    /// InnerJoin(g1.e1 = g2.e1) -> [Access(g1) -> Select(filter) -> Source(g1), Access(g2) -> Source(g2)]
    fn sample(filter: Criteria) -> (PlanTree, NodeId) {
        let g1 = GroupSymbol::new("pm1.g1");
        let g2 = GroupSymbol::new("pm2.g2");
        let mut tree = PlanTree::new();
        let a1 = tree.add_node(NodeKind::access("pm1"));
        let s1 = tree.add_node(NodeKind::source(g1.clone()));
        let select = tree.add_node(NodeKind::select(filter));
        tree.add_child(select, s1);
        tree.add_child(a1, select);
        let a2 = tree.add_node(NodeKind::access("pm2"));
        let s2 = tree.add_node(NodeKind::source(g2.clone()));
        tree.add_child(a2, s2);
        let join = tree.add_node(NodeKind::join(
            JoinType::Inner,
            vec![Criteria::eq(g1.element("e1"), g2.element("e1"))],
        ));
        tree.add_child(join, a1);
        tree.add_child(join, a2);
        tree.set_root(join);
        (tree, join)
    }

    fn g1e1() -> ElementSymbol {
        GroupSymbol::new("pm1.g1").element("e1")
    }

    #[test]
    fn test_copy_constant_criteria() {
        let (mut tree, join) = sample(Criteria::compare(g1e1(), CompareOperator::Gt, Value::from(5i64)));
        let mut ctx = context(SourceCapabilities::full(), false);
        let mut rules = RuleStack::new();
        CopyCriteriaRule::new().execute(&mut tree, &mut ctx, &mut rules).unwrap();

        let root = tree.root().unwrap();
        assert_ne!(root, join, "复制的条件应插入到连接之上");
        match tree.kind(root) {
            NodeKind::Select { criteria, copied, .. } => {
                assert!(copied);
                assert_eq!(
                    *criteria,
                    Criteria::compare(GroupSymbol::new("pm2.g2").element("e1"), CompareOperator::Gt, Value::from(5i64))
                );
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert_eq!(rules.peek(), Some(&RuleKind::PushSelectCriteria(Default::default())));

        // 条件已存在时不再复制
        let mut rules = RuleStack::new();
        CopyCriteriaRule::new().execute(&mut tree, &mut ctx, &mut rules).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_unsupported_copy_is_skipped() {
        let filter = Criteria::Set {
            expr: Expression::Element(g1e1()),
            values: vec![Expression::constant(1i64), Expression::constant(2i64)],
            negated: false,
        };
        let caps = SourceCapabilities::full().without(Capability::CriteriaIn);

        let (mut tree, join) = sample(filter.clone());
        let mut ctx = context(caps.clone(), false);
        let mut rules = RuleStack::new();
        CopyCriteriaRule::new().execute(&mut tree, &mut ctx, &mut rules).unwrap();
        assert_eq!(tree.root(), Some(join));
        assert!(rules.is_empty());

        let (mut tree, join) = sample(filter);
        let mut ctx = context(caps, true);
        CopyCriteriaRule::new().execute(&mut tree, &mut ctx, &mut rules).unwrap();
        assert_ne!(tree.root(), Some(join), "开启 copy_all_criteria 后应复制");
    }
}
