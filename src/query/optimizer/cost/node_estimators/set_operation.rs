//! 集合操作估算器
//!
//! 为集合操作节点提供基数估算（多于两个输入时按顺序两两折叠）：
//! - UNION ALL：各输入之和
//! - UNION：和减去较小一侧按重叠比例估算的重复行
//! - INTERSECT：较小一侧乘以重叠比例
//! - EXCEPT：第一个输入乘以未重叠比例
//!
//! 输出列统计沿用第一个输入。

use super::{EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::query::metadata::UNKNOWN_VALUE;
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{NodeId, NodeKind, PlanTree, SetOperation};

/// 集合操作估算器
pub struct SetOperationEstimator;

impl SetOperationEstimator {
    fn combine(op: SetOperation, all: bool, acc: f64, next: f64, overlap: f64) -> f64 {
        match (op, all) {
            (SetOperation::Union, true) => acc + next,
            (SetOperation::Union, false) => acc + next - acc.min(next) * overlap,
            (SetOperation::Intersect, _) => acc.min(next) * overlap,
            (SetOperation::Except, _) => acc * (1.0 - overlap),
        }
    }
}

impl NodeEstimator for SetOperationEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        let NodeKind::SetOp { op, all } = tree.kind(node) else {
            return Err(ComponentError::invalid_plan_structure("集合操作估算器只处理 SetOp 节点").into());
        };
        let Some(first) = child_estimates.first() else {
            return Ok(NodeEstimate::unknown());
        };
        let col_stats = first.col_stats.clone();
        if child_estimates.iter().any(NodeEstimate::is_unknown) {
            return Ok(NodeEstimate::new(UNKNOWN_VALUE).with_col_stats(col_stats));
        }

        let overlap = ctx.config.set_overlap_fraction;
        let cardinality = child_estimates[1..]
            .iter()
            .fold(first.cardinality, |acc, e| Self::combine(*op, *all, acc, e.cardinality, overlap));
        Ok(NodeEstimate::new(cardinality.max(0.0)).with_col_stats(col_stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::metadata::MetadataStore;
    use crate::query::optimizer::cost::config::CostModelConfig;

    fn run(op: SetOperation, all: bool, inputs: &[f64]) -> f64 {
        let md = MetadataStore::new();
        let config = CostModelConfig::default();
        let ctx = EstimateContext::new(&md, &config);
        let mut tree = PlanTree::new();
        let node = tree.add_node(NodeKind::SetOp { op, all });
        let children: Vec<NodeEstimate> = inputs.iter().map(|c| NodeEstimate::new(*c)).collect();
        SetOperationEstimator
            .estimate(&tree, node, &children, &ctx)
            .unwrap()
            .cardinality
    }

    #[test]
    fn test_union_variants() {
        assert_eq!(run(SetOperation::Union, true, &[10.0, 20.0]), 30.0);
        // 默认重叠比例 0.5
        assert_eq!(run(SetOperation::Union, false, &[10.0, 20.0]), 25.0);
        assert_eq!(run(SetOperation::Union, true, &[1.0, 2.0, 3.0]), 6.0);
    }

    #[test]
    fn test_intersect_and_except() {
        assert_eq!(run(SetOperation::Intersect, false, &[10.0, 40.0]), 5.0);
        assert_eq!(run(SetOperation::Except, false, &[10.0, 40.0]), 5.0);
        assert_eq!(run(SetOperation::Union, true, &[10.0, UNKNOWN_VALUE]), UNKNOWN_VALUE);
    }
}
