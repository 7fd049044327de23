//! 提升访问节点的规则

use crate::core::error::{ComponentError, OptimizeResult};
use crate::query::optimizer::access_pattern::constrained_elements;
use crate::query::optimizer::capability::{can_push_language_object, LanguageObject};
use crate::query::planner::plan::{NodeId, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 提升访问节点的规则
///
/// # 转换示例
///
/// Before:
/// ```text
///   Sort(e1)
///      |
///   Access(pm1)
///      |
///   Source(pm1.g1)
/// ```
///
/// After:
/// ```text
///   Access(pm1)
///      |
///   Sort(e1)
///      |
///   Source(pm1.g1)
/// ```
///
/// # 适用条件
///
/// - 父节点为 Select、Project、Group、Sort、DupRemove、Limit，且数据源能执行父节点的操作
/// - 父节点为连接或集合操作时，所有子节点都是同一模型的访问节点，且数据源支持该操作
/// - 依赖访问节点不会被提升
///
/// 反复提升直到没有访问节点可以继续上移
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RaiseAccessRule;

impl RaiseAccessRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }

    fn access_model(tree: &PlanTree, node: NodeId) -> Option<&str> {
        match tree.kind(node) {
            NodeKind::Access {
                model,
                dependent: false,
                ..
            } => Some(model.as_str()),
            _ => None,
        }
    }

    /// 子树内已下推的条件仍无法满足任何访问模式
    fn has_unsatisfied_patterns(tree: &PlanTree, access: NodeId) -> bool {
        match tree.kind(access) {
            NodeKind::Access { access_patterns, .. } if !access_patterns.is_empty() => {
                let constrained = constrained_elements(tree, access);
                let mut patterns = access_patterns.clone();
                !patterns.iter_mut().any(|p| p.satisfy(constrained.iter()))
            }
            _ => false,
        }
    }

    /// 单子节点父节点的操作能否下推
    fn can_raise_over(
        &self,
        tree: &PlanTree,
        parent: NodeId,
        model: &str,
        ctx: &RewriteContext,
    ) -> OptimizeResult<bool> {
        let push = |object: LanguageObject<'_>| {
            can_push_language_object(object, model, ctx.metadata(), ctx.finder())
        };
        match tree.kind(parent) {
            NodeKind::Select {
                criteria,
                dependent: false,
                ..
            } => push(LanguageObject::Criteria(criteria)),
            NodeKind::Project { columns } => {
                for column in columns {
                    if !push(LanguageObject::Expression(column))? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeKind::Group {
                grouping,
                aggregates,
            } => {
                if !push(LanguageObject::GroupBy(grouping))? {
                    return Ok(false);
                }
                for aggregate in aggregates {
                    if !push(LanguageObject::Expression(aggregate))? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeKind::Sort { items } => push(LanguageObject::OrderBy(items)),
            NodeKind::DupRemove => push(LanguageObject::Distinct),
            NodeKind::Limit { limit, offset } => push(LanguageObject::Limit {
                limit: limit.is_some(),
                offset: offset.is_some(),
            }),
            _ => Ok(false),
        }
    }

    /// 多子节点父节点（连接、集合操作）能否整体下推
    fn can_raise_over_children(
        &self,
        tree: &PlanTree,
        parent: NodeId,
        ctx: &RewriteContext,
    ) -> OptimizeResult<Option<String>> {
        let children = tree.children(parent);
        if children.len() < 2 {
            return Ok(None);
        }
        let mut models = children.iter().map(|c| Self::access_model(tree, *c));
        let model = match models.next().flatten() {
            Some(model) => model.to_string(),
            None => return Ok(None),
        };
        if !models.all(|m| m == Some(model.as_str())) {
            return Ok(None);
        }
        if children.iter().any(|c| Self::has_unsatisfied_patterns(tree, *c)) {
            return Ok(None);
        }
        let push = |object: LanguageObject<'_>| {
            can_push_language_object(object, &model, ctx.metadata(), ctx.finder())
        };
        let pushable = match tree.kind(parent) {
            NodeKind::Join {
                join_type, criteria, ..
            } => {
                let mut names: Vec<&str> = Vec::new();
                for child in children {
                    names.extend(tree.node_groups(*child).iter().map(|g| g.metadata_name()));
                }
                let mut deduped = names.clone();
                deduped.sort_unstable();
                deduped.dedup();
                let self_join = deduped.len() < names.len();
                if !push(LanguageObject::Join {
                    join_type: *join_type,
                    self_join,
                })? {
                    false
                } else {
                    let mut ok = true;
                    for c in criteria {
                        if !push(LanguageObject::Criteria(c))? {
                            ok = false;
                            break;
                        }
                    }
                    ok
                }
            }
            NodeKind::SetOp { op, .. } => push(LanguageObject::SetOp { op: *op })?,
            _ => false,
        };
        Ok(pushable.then_some(model))
    }

    /// 把访问节点移到 `parent` 之上
    fn raise_over(tree: &mut PlanTree, access: NodeId, parent: NodeId) -> OptimizeResult<()> {
        let child = tree
            .remove_all_children(access)
            .into_iter()
            .next()
            .ok_or_else(|| ComponentError::invalid_plan_structure(format!("访问节点 {} 没有子节点", access)))?;
        tree.replace_child(parent, access, child);
        tree.add_as_parent(parent, access);
        tree.invalidate_estimates(parent);
        Ok(())
    }

    /// 合并多个同模型访问节点并移到 `parent` 之上，保留第一个访问节点
    fn raise_over_children(tree: &mut PlanTree, parent: NodeId) -> OptimizeResult<NodeId> {
        let accesses = tree.children(parent).to_vec();
        let mut patterns = Vec::new();
        for access in &accesses {
            if let NodeKind::Access { access_patterns, .. } = tree.kind_mut(*access) {
                patterns.append(access_patterns);
            }
            let child = tree.remove_all_children(*access).into_iter().next().ok_or_else(|| {
                ComponentError::invalid_plan_structure(format!("访问节点 {} 没有子节点", access))
            })?;
            tree.replace_child(parent, *access, child);
        }
        let kept = accesses[0];
        for access in &accesses[1..] {
            tree.remove_subtree(*access);
        }
        if let NodeKind::Access { access_patterns, .. } = tree.kind_mut(kept) {
            *access_patterns = patterns;
        }
        tree.add_as_parent(parent, kept);
        tree.invalidate_estimates(parent);
        Ok(kept)
    }

    fn raise_once(&self, tree: &mut PlanTree, ctx: &RewriteContext) -> OptimizeResult<bool> {
        let root = tree.require_root()?;
        for access in tree.find_nodes(root, &[NodeType::Access], &[]) {
            let Some(parent) = tree.parent(access) else {
                continue;
            };
            let Some(model) = Self::access_model(tree, access).map(str::to_string) else {
                continue;
            };
            if tree.child_count(parent) == 1 {
                if self.can_raise_over(tree, parent, &model, ctx)? {
                    log::trace!("访问节点 {} 提升到 {} 节点之上", access, tree.node_type(parent).name());
                    Self::raise_over(tree, access, parent)?;
                    return Ok(true);
                }
            } else if let Some(model) = self.can_raise_over_children(tree, parent, ctx)? {
                let kept = Self::raise_over_children(tree, parent)?;
                log::trace!("合并 {} 节点下的访问节点为 {}（模型 {}）", tree.node_type(parent).name(), kept, model);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl OptimizerRule for RaiseAccessRule {
    fn name(&self) -> &'static str {
        "RaiseAccessRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let mut raised = 0;
        while self.raise_once(tree, ctx)? {
            raised += 1;
        }
        log::debug!("提升访问节点 {} 次", raised);
        Ok(())
    }
}
