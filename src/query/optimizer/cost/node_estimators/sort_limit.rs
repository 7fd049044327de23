//! 排序和限制操作估算器
//!
//! - Sort：不改变行数
//! - Limit：`min(max(0, 子节点 - offset), limit)`；子节点未知时直接使用限制值，
//!   已知上界比"未知"更有用

use super::{get_input_rows, EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::query::metadata::{is_unknown, UNKNOWN_VALUE};
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{NodeId, NodeKind, PlanTree};

/// 排序和限制操作估算器
pub struct SortLimitEstimator;

impl SortLimitEstimator {
    /// 估算限制后的行数
    pub fn limit_cardinality(child_rows: f64, limit: Option<u64>, offset: Option<u64>) -> f64 {
        if is_unknown(child_rows) {
            return limit.map_or(UNKNOWN_VALUE, |l| l as f64);
        }
        let remaining = (child_rows - offset.unwrap_or(0) as f64).max(0.0);
        match limit {
            Some(l) => remaining.min(l as f64),
            None => remaining,
        }
    }
}

impl NodeEstimator for SortLimitEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        _ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        let child = child_estimates.first().cloned().unwrap_or_else(NodeEstimate::unknown);
        match tree.kind(node) {
            NodeKind::Sort { .. } => Ok(child),
            NodeKind::Limit { limit, offset } => {
                let cardinality = Self::limit_cardinality(get_input_rows(child_estimates, 0), *limit, *offset);
                Ok(NodeEstimate::new(cardinality).with_col_stats(child.col_stats))
            }
            other => Err(ComponentError::invalid_plan_structure(format!(
                "排序限制估算器不支持 {} 节点",
                other.node_type().name()
            ))
            .into()),
        }
    }
}
