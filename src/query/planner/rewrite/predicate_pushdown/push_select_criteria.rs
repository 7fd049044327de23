//! 下推选择条件的规则

use crate::core::error::OptimizeResult;
use crate::core::types::Criteria;
use crate::query::optimizer::capability::{can_push_language_object, LanguageObject};
use crate::query::optimizer::frame::find_originating_node;
use crate::query::planner::plan::{JoinType, NodeId, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 条件的目标位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// 保持原位
    Stay,
    /// 并入内连接的连接条件
    JoinCriteria(NodeId),
    /// 作为新的 Select 节点插入到该节点之上
    Above(NodeId),
}

/// 下推选择条件的规则
///
/// # 转换示例
///
/// Before:
/// ```text
///   Select(g1.e1 = 1 AND g1.e2 = g2.e2)
///       |
///   CrossJoin
///    /      \
///  Access    Access
///    |         |
///  Source(g1) Source(g2)
/// ```
///
/// After:
/// ```text
///   InnerJoin(g1.e2 = g2.e2)
///    /             \
///  Access          Access
///    |               |
///  Select(g1.e1 = 1) Source(g2)
///    |
///  Source(g1)
/// ```
///
/// # 适用条件
///
/// - 每个 AND 子条件单独下推到其起源节点
/// - 数据源支持该条件时放入访问节点内部，否则放在访问节点之上
/// - 引用多个分组的条件并入内连接/交叉连接的连接条件
/// - 不会下推到外连接的补空侧，也不会越过分组、集合操作与 LIMIT
/// - 内连接中只引用一侧的连接条件，以及外连接中只引用补空侧的连接条件，先移到对应子节点之上再下推
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PushSelectCriteriaRule;

impl PushSelectCriteriaRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }

    /// 把连接条件中只引用一侧的子条件移到该侧之上
    fn split_join_criteria(tree: &mut PlanTree, root: NodeId) {
        for join in tree.find_nodes(root, &[NodeType::Join], &[]) {
            let children = tree.children(join).to_vec();
            if children.len() != 2 {
                continue;
            }
            let (join_type, criteria) = match tree.kind(join) {
                NodeKind::Join {
                    join_type, criteria, ..
                } => (*join_type, criteria.clone()),
                _ => continue,
            };
            if join_type == JoinType::FullOuter || criteria.is_empty() {
                continue;
            }
            let mut kept = Vec::new();
            let mut moved = Vec::new();
            for conjunct in criteria.into_iter().flat_map(Criteria::into_conjuncts) {
                let groups = conjunct.groups();
                let side = (0..2).find(|i| {
                    !groups.is_empty()
                        && groups.is_subset(tree.node_groups(children[*i]))
                        && (!join_type.is_outer() || join_type.is_null_supplying_side(*i))
                });
                match side {
                    Some(i) => moved.push((children[i], conjunct)),
                    None => kept.push(conjunct),
                }
            }
            if moved.is_empty() {
                continue;
            }
            if let NodeKind::Join { criteria, .. } = tree.kind_mut(join) {
                *criteria = kept;
            }
            for (child, conjunct) in moved {
                log::trace!("连接 {} 的条件 {} 移到子节点 {} 之上", join, conjunct, child);
                let select = tree.add_node(NodeKind::select(conjunct));
                tree.add_as_parent(child, select);
            }
            tree.invalidate_estimates(join);
        }
    }

    fn placement(
        tree: &PlanTree,
        ctx: &RewriteContext,
        select: NodeId,
        conjunct: &Criteria,
    ) -> OptimizeResult<Placement> {
        let groups = conjunct.groups();
        if groups.is_empty() {
            return Ok(Placement::Stay);
        }
        let Some(start) = tree.first_child(select) else {
            return Ok(Placement::Stay);
        };
        let Some(origin) = find_originating_node(tree, start, &groups) else {
            return Ok(Placement::Stay);
        };

        // 从起源节点向上检查路径
        let mut highest_access = None;
        let mut child = origin;
        while let Some(parent) = tree.parent(child) {
            if parent == select {
                break;
            }
            match tree.kind(parent) {
                NodeKind::Join { join_type, .. } => {
                    let index = tree.child_index(child).unwrap_or(0);
                    if join_type.is_null_supplying_side(index) {
                        return Ok(Placement::Stay);
                    }
                }
                NodeKind::Group { .. }
                | NodeKind::SetOp { .. }
                | NodeKind::Limit { .. }
                | NodeKind::Source { .. }
                | NodeKind::Null => return Ok(Placement::Stay),
                NodeKind::Access { .. } => highest_access = Some(parent),
                NodeKind::Select { .. }
                | NodeKind::Project { .. }
                | NodeKind::Sort { .. }
                | NodeKind::DupRemove => {}
            }
            child = parent;
        }

        if let Some(access) = highest_access {
            let pushable = match tree.kind(access) {
                NodeKind::Access { model, .. } => can_push_language_object(
                    LanguageObject::Criteria(conjunct),
                    model,
                    ctx.metadata(),
                    ctx.finder(),
                )?,
                _ => false,
            };
            if !pushable {
                return Ok(Self::settle(tree, select, Placement::Above(access)));
            }
        }

        let placement = match tree.kind(origin) {
            NodeKind::Join {
                join_type: JoinType::Inner | JoinType::Cross,
                ..
            } => Placement::JoinCriteria(origin),
            _ => Placement::Above(origin),
        };
        Ok(Self::settle(tree, select, placement))
    }

    /// 条件已经位于目标位置（中间只隔着其他 Select）时保持原位
    fn settle(tree: &PlanTree, select: NodeId, placement: Placement) -> Placement {
        let Placement::Above(anchor) = placement else {
            return placement;
        };
        let mut current = tree.first_child(select);
        while let Some(node) = current {
            if node == anchor {
                return Placement::Stay;
            }
            if tree.node_type(node) != NodeType::Select {
                break;
            }
            current = tree.first_child(node);
        }
        placement
    }

    fn push_select(tree: &mut PlanTree, ctx: &RewriteContext, select: NodeId) -> OptimizeResult<()> {
        let (criteria, copied) = match tree.kind(select) {
            NodeKind::Select {
                criteria,
                copied,
                dependent: false,
            } => (criteria.clone(), *copied),
            _ => return Ok(()),
        };

        let mut remaining = Vec::new();
        let mut moved = false;
        for conjunct in criteria.into_conjuncts() {
            match Self::placement(tree, ctx, select, &conjunct)? {
                Placement::Stay => remaining.push(conjunct),
                Placement::JoinCriteria(join) => {
                    log::trace!("条件 {} 并入连接 {}", conjunct, join);
                    if let NodeKind::Join {
                        join_type, criteria, ..
                    } = tree.kind_mut(join)
                    {
                        criteria.push(conjunct);
                        *join_type = JoinType::Inner;
                    }
                    tree.invalidate_estimates(join);
                    moved = true;
                }
                Placement::Above(anchor) => {
                    log::trace!("条件 {} 下推到节点 {} 之上", conjunct, anchor);
                    let pushed = tree.add_node(NodeKind::Select {
                        criteria: conjunct,
                        copied,
                        dependent: false,
                    });
                    tree.add_as_parent(anchor, pushed);
                    tree.invalidate_estimates(pushed);
                    moved = true;
                }
            }
        }
        if !moved {
            return Ok(());
        }

        match Criteria::combine(remaining) {
            Some(rest) => {
                if let NodeKind::Select { criteria, .. } = tree.kind_mut(select) {
                    *criteria = rest;
                }
                tree.invalidate_estimates(select);
            }
            None => {
                let parent = tree.parent(select);
                tree.remove_from_parent(select)?;
                if let Some(parent) = parent {
                    tree.invalidate_estimates(parent);
                }
            }
        }
        Ok(())
    }
}

impl OptimizerRule for PushSelectCriteriaRule {
    fn name(&self) -> &'static str {
        "PushSelectCriteriaRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        Self::split_join_criteria(tree, root);
        let root = tree.require_root()?;
        for select in tree.find_nodes(root, &[NodeType::Select], &[]) {
            if tree.contains(select) {
                Self::push_select(tree, ctx, select)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::types::{DataType, GroupSymbol, Value};
    use crate::query::capabilities::{BasicCapabilitiesFinder, Capability, SourceCapabilities};
    use crate::query::metadata::{ElementRecord, GroupRecord, MetadataStore};
    use crate::query::planner::rewrite::context::CommandContext;

    fn store() -> MetadataStore {
        let group = |name: &str| {
            GroupRecord::new(name, "pm1")
                .element(ElementRecord::new("e1", DataType::Integer))
                .element(ElementRecord::new("e2", DataType::Integer))
        };
        MetadataStore::new().with_group(group("pm1.g1")).with_group(group("pm1.g2"))
    }

    fn ctx(caps: SourceCapabilities) -> RewriteContext {
        RewriteContext::new(
            Arc::new(store()),
            Arc::new(BasicCapabilitiesFinder::new().with_default(caps)),
            CommandContext::default(),
        )
    }

    fn access(tree: &mut PlanTree, group: &str) -> (NodeId, NodeId) {
        let access = tree.add_node(NodeKind::access("pm1"));
        let source = tree.add_node(NodeKind::source(GroupSymbol::new(group)));
        tree.add_child(access, source);
        (access, source)
    }

    /// Select(criteria) -> Join(join_type) -> [Access(g1), Access(g2)]
    fn sample(join_type: JoinType, criteria: Criteria) -> (PlanTree, NodeId, [NodeId; 4]) {
        let mut tree = PlanTree::new();
        let (a1, s1) = access(&mut tree, "pm1.g1");
        let (a2, s2) = access(&mut tree, "pm1.g2");
        let join = tree.add_node(NodeKind::join(join_type, vec![]));
        tree.add_child(join, a1);
        tree.add_child(join, a2);
        let select = tree.add_node(NodeKind::select(criteria));
        tree.add_child(select, join);
        tree.set_root(select);
        (tree, join, [a1, s1, a2, s2])
    }

    fn g1(e: &str) -> crate::core::types::ElementSymbol {
        GroupSymbol::new("pm1.g1").element(e)
    }

    fn g2(e: &str) -> crate::core::types::ElementSymbol {
        GroupSymbol::new("pm1.g2").element(e)
    }

    fn run(tree: &mut PlanTree, ctx: &mut RewriteContext) {
        PushSelectCriteriaRule::new()
            .execute(tree, ctx, &mut RuleStack::new())
            .unwrap();
        tree.validate().unwrap();
    }

    #[test]
    fn test_push_into_access_and_join() {
        let criteria = Criteria::and(vec![
            Criteria::eq(g1("e1"), Value::from(1i64)),
            Criteria::eq(g1("e2"), g2("e2")),
        ]);
        let (mut tree, join, [a1, s1, _, _]) = sample(JoinType::Cross, criteria);
        let mut ctx = ctx(SourceCapabilities::full());
        run(&mut tree, &mut ctx);

        assert_eq!(tree.root(), Some(join), "原 Select 节点应被移除");
        match tree.kind(join) {
            NodeKind::Join {
                join_type, criteria, ..
            } => {
                assert_eq!(*join_type, JoinType::Inner);
                assert_eq!(criteria.len(), 1);
            }
            other => panic!("unexpected node {:?}", other),
        }
        let pushed = tree.first_child(a1).unwrap();
        assert_eq!(tree.node_type(pushed), NodeType::Select);
        assert_eq!(tree.first_child(pushed), Some(s1));

        // 再次执行保持不变
        let before = tree.len();
        run(&mut tree, &mut ctx);
        assert_eq!(tree.len(), before);
        assert_eq!(tree.first_child(a1), Some(pushed));
    }

    #[test]
    fn test_unsupported_criteria_stays_above_access() {
        let (mut tree, _, [a1, s1, _, _]) =
            sample(JoinType::Inner, Criteria::eq(g1("e1"), Value::from(1i64)));
        let mut ctx = ctx(SourceCapabilities::full().without(Capability::CriteriaCompareEq));
        run(&mut tree, &mut ctx);

        let above = tree.parent(a1).unwrap();
        assert_eq!(tree.node_type(above), NodeType::Select);
        assert_eq!(tree.first_child(a1), Some(s1));
    }

    #[test]
    fn test_no_push_into_null_supplying_side() {
        let (mut tree, join, [_, _, a2, s2]) =
            sample(JoinType::LeftOuter, Criteria::eq(g2("e1"), Value::from(1i64)));
        let mut ctx = ctx(SourceCapabilities::full());
        run(&mut tree, &mut ctx);

        let root = tree.root().unwrap();
        assert_eq!(tree.node_type(root), NodeType::Select);
        assert_eq!(tree.first_child(root), Some(join));
        assert_eq!(tree.first_child(a2), Some(s2));
    }

    #[test]
    fn test_outer_join_criteria_on_inner_side_is_pushed() {
        let mut tree = PlanTree::new();
        let (a1, _) = access(&mut tree, "pm1.g1");
        let (a2, s2) = access(&mut tree, "pm1.g2");
        let join = tree.add_node(NodeKind::join(
            JoinType::LeftOuter,
            vec![Criteria::and(vec![
                Criteria::eq(g1("e1"), g2("e1")),
                Criteria::eq(g2("e2"), Value::from(3i64)),
                Criteria::eq(g1("e2"), Value::from(4i64)),
            ])],
        ));
        tree.add_child(join, a1);
        tree.add_child(join, a2);
        tree.set_root(join);
        let mut ctx = ctx(SourceCapabilities::full());
        run(&mut tree, &mut ctx);

        match tree.kind(join) {
            NodeKind::Join { criteria, .. } => assert_eq!(criteria.len(), 2, "保留侧的条件不能移出"),
            other => panic!("unexpected node {:?}", other),
        }
        let pushed = tree.first_child(a2).unwrap();
        assert_eq!(tree.node_type(pushed), NodeType::Select);
        assert_eq!(tree.first_child(pushed), Some(s2));
    }
}
