//! 连接操作估算器
//!
//! 为连接节点提供基数估算：
//! - 交叉连接（或无条件内连接）：两侧基数之积
//! - 等值连接：`左 × 右 / max(NDV)`，键列一侧的 NDV 取该侧基数
//! - 非等值条件：每个条件乘以默认选择性
//! - 外连接：结果不少于保留侧基数
//!
//! 任一侧基数未知时结果未知。

use super::{get_input_rows, EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::ElementSymbol;
use crate::query::metadata::{is_unknown, UNKNOWN_VALUE};
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{JoinType, NodeId, NodeKind, PlanTree};

/// 连接操作估算器
pub struct JoinEstimator;

impl JoinEstimator {
    /// 等值连接一侧元素的 NDV
    fn side_ndv(
        ctx: &EstimateContext<'_>,
        estimate: &NodeEstimate,
        element: &ElementSymbol,
    ) -> Option<f64> {
        let resolver = ctx.resolver(Some(&estimate.col_stats));
        if resolver.is_single_column_key(element) && !estimate.is_unknown() {
            return Some(estimate.cardinality.max(1.0));
        }
        resolver.ndv(element)
    }
}

impl NodeEstimator for JoinEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        let NodeKind::Join {
            join_type,
            criteria,
            ..
        } = tree.kind(node)
        else {
            return Err(ComponentError::invalid_plan_structure("连接估算器只处理 Join 节点").into());
        };
        let children = tree.children(node);
        if children.len() != 2 || child_estimates.len() != 2 {
            return Err(ComponentError::invalid_plan_structure(format!(
                "连接节点 {} 需要两个子节点",
                node
            ))
            .into());
        }

        let mut col_stats = child_estimates[0].col_stats.clone();
        col_stats.extend(child_estimates[1].col_stats.clone());

        let left = get_input_rows(child_estimates, 0);
        let right = get_input_rows(child_estimates, 1);
        if is_unknown(left) || is_unknown(right) {
            return Ok(NodeEstimate::new(UNKNOWN_VALUE).with_col_stats(col_stats));
        }

        let left_groups = tree.node_groups(children[0]);
        let mut divisor: Option<f64> = None;
        let mut factor = 1.0;
        if *join_type != JoinType::Cross {
            for crit in criteria {
                match crit.equi_join_pair() {
                    Some((a, b)) => {
                        let (l, r) = if left_groups.contains(a.group()) { (a, b) } else { (b, a) };
                        let ndv_l = Self::side_ndv(ctx, &child_estimates[0], l);
                        let ndv_r = Self::side_ndv(ctx, &child_estimates[1], r);
                        let d = match (ndv_l, ndv_r) {
                            (Some(x), Some(y)) => x.max(y),
                            (Some(x), None) | (None, Some(x)) => x,
                            (None, None) => left.max(right),
                        };
                        divisor = Some(divisor.map_or(d, |cur| cur.max(d)));
                    }
                    None => factor *= ctx.config.unknown_selectivity,
                }
            }
        }

        let product = left * right;
        let mut cardinality = match divisor {
            Some(d) if d > 0.0 => product / d,
            _ => product,
        } * factor;
        cardinality = cardinality.min(product);

        cardinality = match join_type {
            JoinType::LeftOuter => cardinality.max(left),
            JoinType::RightOuter => cardinality.max(right),
            JoinType::FullOuter => cardinality.max(left.max(right)),
            JoinType::Inner | JoinType::Cross => cardinality,
        };
        log::trace!("连接 {} 估算 {} x {} -> {}", node, left, right, cardinality);
        Ok(NodeEstimate::new(cardinality).with_col_stats(col_stats))
    }
}
