//! 过滤估算器
//!
//! Select 节点的输出基数由选择性估计器给出；与常量等值比较的列在输出中只剩一个取值，
//! 其列统计的 NDV 记为 1，其余列的 NDV 不超过输出基数。

use super::{get_input_rows, get_input_stats, single_group, EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::{CompareOperator, Criteria, ElementSymbol, Expression};
use crate::query::metadata::is_unknown;
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::optimizer::cost::selectivity::SelectivityEstimator;
use crate::query::planner::plan::{NodeId, NodeKind, PlanTree};

/// 过滤估算器
pub struct FilterEstimator;

impl NodeEstimator for FilterEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        let NodeKind::Select { criteria, .. } = tree.kind(node) else {
            return Err(ComponentError::invalid_plan_structure("过滤估算器只处理 Select 节点").into());
        };
        let child_rows = get_input_rows(child_estimates, 0);
        let child_stats = get_input_stats(child_estimates, 0);
        let key_group = tree.first_child(node).and_then(|c| single_group(tree, c));

        let estimator = SelectivityEstimator::new(ctx.metadata, ctx.config, child_rows, child_stats)
            .with_key_group(key_group);
        let cardinality = estimator.estimate_cardinality(criteria)?;

        let resolver = ctx.resolver(child_stats);
        let mut col_stats = child_stats.cloned().unwrap_or_default();
        for conjunct in criteria.conjuncts() {
            if let Some(element) = constant_equality(conjunct) {
                let mut stats = resolver.stats_for(element);
                stats.ndv = Some(1.0);
                col_stats.insert(element.clone(), stats);
            }
        }
        if !is_unknown(cardinality) {
            for stats in col_stats.values_mut() {
                if let Some(ndv) = stats.ndv.as_mut() {
                    *ndv = ndv.min(cardinality.max(1.0));
                }
            }
        }
        Ok(NodeEstimate::new(cardinality).with_col_stats(col_stats))
    }
}

/// `element = 常量` 形式的条件返回该元素
fn constant_equality(criteria: &Criteria) -> Option<&ElementSymbol> {
    match criteria {
        Criteria::Compare {
            op: CompareOperator::Eq,
            left: Expression::Element(e),
            right,
        }
        | Criteria::Compare {
            op: CompareOperator::Eq,
            left: right,
            right: Expression::Element(e),
        } if right.is_evaluatable() => Some(e),
        _ => None,
    }
}
