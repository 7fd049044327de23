//! 合并简单虚拟分组的规则

use std::collections::BTreeSet;

use crate::core::error::OptimizeResult;
use crate::core::types::Expression;
use crate::query::optimizer::frame::convert_frame;
use crate::query::planner::plan::{NodeId, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 合并简单虚拟分组的规则
///
/// # 转换示例
///
/// Before:
/// ```text
///   Select(v1.a = 5)
///       |
///   Source(vm1.v1)    [a -> pm1.g1.e1]
///       |
///   Project(pm1.g1.e1)
///       |
///   Source(pm1.g1)
/// ```
///
/// After:
/// ```text
///   Select(pm1.g1.e1 = 5)
///       |
///   Source(pm1.g1)
/// ```
///
/// # 适用条件
///
/// - 虚拟 Source 节点的唯一子节点为 Project
/// - 投影列与符号映射只包含元素和常量
/// - 虚拟 Source 不是根节点
/// - 含常量映射的虚拟分组不在外连接的补空侧之下
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MergeVirtualRule;

impl MergeVirtualRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }

    fn is_simple(expr: &Expression) -> bool {
        matches!(expr, Expression::Element(_) | Expression::Constant(_))
    }

    /// 节点是否位于外连接的补空侧（不跨越外层帧）
    fn under_null_supplying_side(tree: &PlanTree, node: NodeId) -> bool {
        let mut child = node;
        while let Some(parent) = tree.parent(child) {
            match tree.kind(parent) {
                NodeKind::Join { join_type, .. } => {
                    if let Some(index) = tree.child_index(child) {
                        if join_type.is_null_supplying_side(index) {
                            return true;
                        }
                    }
                }
                NodeKind::Source { .. } => return false,
                _ => {}
            }
            child = parent;
        }
        false
    }

    /// 尝试合并一个虚拟分组，返回是否合并
    fn merge(tree: &mut PlanTree, source: NodeId) -> bool {
        let Some(parent) = tree.parent(source) else {
            return false;
        };
        let (group, symbol_map) = match tree.kind(source) {
            NodeKind::Source {
                group,
                symbol_map,
                virtual_group: true,
            } => (group.clone(), symbol_map.clone()),
            _ => return false,
        };
        let project = match tree.children(source) {
            [only] if tree.node_type(*only) == NodeType::Project => *only,
            _ => return false,
        };
        let simple_project = match tree.kind(project) {
            NodeKind::Project { columns } => columns.iter().all(Self::is_simple),
            _ => false,
        };
        if !simple_project || !symbol_map.values().all(Self::is_simple) {
            return false;
        }
        let has_constants = symbol_map.values().any(|e| matches!(e, Expression::Constant(_)));
        if has_constants && Self::under_null_supplying_side(tree, source) {
            log::trace!("虚拟分组 {} 含常量映射且位于外连接补空侧，不合并", group);
            return false;
        }
        let Some(inner) = tree.first_child(project) else {
            return false;
        };

        let inner_groups: BTreeSet<_> = tree.node_groups(inner).clone();
        convert_frame(tree, source, &group, Some(&inner_groups), &symbol_map);
        tree.remove_all_children(project);
        tree.replace_child(parent, source, inner);
        tree.remove_subtree(source);
        tree.recompute_groups(parent);
        tree.invalidate_estimates(parent);
        log::debug!("合并虚拟分组 {}", group);
        true
    }
}

impl OptimizerRule for MergeVirtualRule {
    fn name(&self) -> &'static str {
        "MergeVirtualRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        _ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        // 自底向上，内层视图先合并
        let mut sources = tree.find_nodes(root, &[NodeType::Source], &[]);
        sources.reverse();
        for source in sources {
            if tree.contains(source) {
                Self::merge(tree, source);
            }
        }
        Ok(())
    }
}
