//! 查询优化器实现
//!
//! 从规则栈中依次弹出规则并应用到计划树，规则可以在执行过程中压入后续规则。
//! 每条规则执行后都会校验树结构，规则执行总次数超过上限时中止优化。

use std::sync::Arc;

use crate::core::error::{ComponentError, OptimizeResult};
use crate::query::capabilities::CapabilitiesFinder;
use crate::query::metadata::QueryMetadataInterface;
use crate::query::planner::plan::PlanTree;
use crate::query::planner::rewrite::context::{CommandContext, RewriteContext};
use crate::query::planner::rewrite::rule_enum::RuleKind;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 查询优化器
///
/// 持有初始规则栈，每次优化复制一份独立执行
#[derive(Debug, Clone)]
pub struct QueryOptimizer {
    rules: RuleStack,
}

impl QueryOptimizer {
    /// 使用默认规则序列创建优化器
    pub fn new() -> Self {
        Self {
            rules: RuleStack::with_default_rules(),
        }
    }

    /// 使用自定义的初始规则栈
    pub fn with_rules(rules: RuleStack) -> Self {
        Self { rules }
    }

    /// 追加一条在最后执行的规则
    pub fn add_rule(&mut self, rule: RuleKind) {
        self.rules.add_last(rule);
    }

    pub fn rules(&self) -> &RuleStack {
        &self.rules
    }

    /// 原地优化计划树
    ///
    /// 任何规则返回的错误都会直接上抛，此时计划树可能处于部分改写的状态
    pub fn optimize(
        &self,
        tree: &mut PlanTree,
        metadata: Arc<dyn QueryMetadataInterface>,
        finder: Arc<dyn CapabilitiesFinder>,
        command: CommandContext,
    ) -> OptimizeResult<()> {
        let limit = command.limits.max_rule_executions;
        let mut ctx = RewriteContext::new(metadata, finder, command);
        let mut rules = self.rules.clone();
        let root = tree.require_root()?;
        tree.recompute_subtree_groups(root);

        while let Some(rule) = rules.pop() {
            let executions = ctx.record_execution();
            if executions > limit {
                log::warn!("规则执行次数超过上限 {}，中止于 {}", limit, rule.name());
                return Err(ComponentError::RuleLimitExceeded {
                    limit,
                    last_rule: rule.name().to_string(),
                }
                .into());
            }
            log::debug!("执行规则 {}（第 {} 次）", rule.name(), executions);
            rule.execute(tree, &mut ctx, &mut rules)?;
            tree.validate()?;
            log::trace!("规则 {} 执行后的计划:\n{}", rule.name(), tree);
        }
        log::debug!("优化完成，共执行规则 {} 次", ctx.executions());
        Ok(())
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

/// 创建默认优化器
pub fn create_default_optimizer() -> QueryOptimizer {
    QueryOptimizer::new()
}

/// 使用默认规则优化计划树
///
/// 这是一个便捷函数，使用默认规则序列
pub fn optimize_plan(
    mut tree: PlanTree,
    metadata: Arc<dyn QueryMetadataInterface>,
    finder: Arc<dyn CapabilitiesFinder>,
    command: CommandContext,
) -> OptimizeResult<PlanTree> {
    create_default_optimizer().optimize(&mut tree, metadata, finder, command)?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerLimits;
    use crate::core::error::OptimizeError;
    use crate::core::types::GroupSymbol;
    use crate::query::capabilities::{BasicCapabilitiesFinder, SourceCapabilities};
    use crate::query::metadata::{GroupRecord, MetadataStore};
    use crate::query::planner::plan::{NodeKind, NodeType};
    use crate::query::planner::rewrite::predicate_pushdown::CopyCriteriaRule;

    fn single_source() -> PlanTree {
        let mut tree = PlanTree::new();
        let source = tree.add_node(NodeKind::source(GroupSymbol::new("pm1.g1")));
        let project = tree.add_node(NodeKind::project(vec![]));
        tree.add_child(project, source);
        tree.set_root(project);
        tree
    }

    fn deps() -> (Arc<dyn QueryMetadataInterface>, Arc<dyn CapabilitiesFinder>) {
        let store = MetadataStore::new().with_group(GroupRecord::new("pm1.g1", "pm1").with_cardinality(10.0));
        let finder = BasicCapabilitiesFinder::new().with_default(SourceCapabilities::full());
        (Arc::new(store), Arc::new(finder))
    }

    #[test]
    fn test_default_pipeline_places_access() {
        let (metadata, finder) = deps();
        let tree = optimize_plan(single_source(), metadata, finder, CommandContext::default()).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(tree.node_type(root), NodeType::Access, "投影应并入访问节点");
        assert_eq!(tree.est_cardinality(root), Some(10.0));
    }

    #[test]
    fn test_rule_limit_exceeded() {
        let (metadata, finder) = deps();
        let mut tree = single_source();
        let limits = PlannerLimits {
            max_rule_executions: 3,
            ..PlannerLimits::default()
        };
        let err = QueryOptimizer::new()
            .optimize(&mut tree, metadata, finder, CommandContext::default().with_limits(limits))
            .unwrap_err();
        match err {
            OptimizeError::Component(ComponentError::RuleLimitExceeded { limit, last_rule }) => {
                assert_eq!(limit, 3);
                assert_eq!(last_rule, "CopyCriteriaRule");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_custom_rules() {
        let (metadata, finder) = deps();
        let mut tree = single_source();
        let mut optimizer = QueryOptimizer::with_rules(RuleStack::new());
        optimizer.add_rule(RuleKind::CopyCriteria(CopyCriteriaRule::new()));
        assert_eq!(optimizer.rules().len(), 1);
        optimizer
            .optimize(&mut tree, metadata, finder, CommandContext::default())
            .unwrap();
        assert_eq!(tree.node_type(tree.root().unwrap()), NodeType::Project);
    }
}
