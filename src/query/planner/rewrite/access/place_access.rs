//! 放置访问节点的规则

use crate::core::error::OptimizeResult;
use crate::query::planner::plan::{AccessPattern, NodeKind, NodeType, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 放置访问节点的规则
///
/// # 转换示例
///
/// Before:
/// ```text
///   Join
///    /  \
///  Source(pm1.g1)  Source(pm2.g1)
/// ```
///
/// After:
/// ```text
///   Join
///    /  \
///  Access(pm1)  Access(pm2)
///     |            |
///  Source(pm1.g1)  Source(pm2.g1)
/// ```
///
/// # 适用条件
///
/// - 物理分组的 Source 叶子节点
/// - 父节点还不是 Access 节点
///
/// 访问节点携带分组所属的模型以及元数据声明的访问模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlaceAccessRule;

impl PlaceAccessRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }
}

impl OptimizerRule for PlaceAccessRule {
    fn name(&self) -> &'static str {
        "PlaceAccessRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        for source in tree.find_nodes(root, &[NodeType::Source], &[]) {
            let group = match tree.kind(source) {
                NodeKind::Source {
                    group,
                    virtual_group: false,
                    ..
                } if tree.child_count(source) == 0 => group.clone(),
                _ => continue,
            };
            if tree
                .parent(source)
                .is_some_and(|p| tree.node_type(p) == NodeType::Access)
            {
                continue;
            }

            let model = ctx.metadata().model_of(&group)?;
            let access_patterns: Vec<AccessPattern> = ctx
                .metadata()
                .access_patterns(&group)?
                .into_iter()
                .map(|pattern| AccessPattern::new(pattern.iter().map(|e| group.element(e.as_str())).collect()))
                .collect();
            log::trace!(
                "为分组 {} 放置访问节点，模型 {}，访问模式 {} 个",
                group,
                model,
                access_patterns.len()
            );
            let access = tree.add_node(NodeKind::Access {
                model,
                access_patterns,
                dependent: false,
                atomic_request: false,
            });
            tree.add_as_parent(source, access);
        }
        Ok(())
    }
}
