//! 数据处理节点估算器
//!
//! 为数据处理节点提供估算：
//! - Project：行数不变；元素列透传统计，常量列记录单值统计
//! - DupRemove：投影列 NDV 之积（不超过子节点行数）
//! - Group：分组列 NDV 之积（不超过子节点行数），无分组列时为 1 行

use std::collections::HashMap;

use super::{get_input_stats, project_column_symbol, EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::{ElementSymbol, Expression};
use crate::query::metadata::{is_unknown, UNKNOWN_VALUE};
use crate::query::optimizer::cost::col_stats::ColumnStatsResolver;
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{ColStats, NodeId, NodeKind, NodeType, PlanTree};

/// 数据处理节点估算器
pub struct DataProcessingEstimator;

impl DataProcessingEstimator {
    fn project(
        columns: &[Expression],
        child: &NodeEstimate,
        resolver: &ColumnStatsResolver<'_>,
    ) -> NodeEstimate {
        let mut col_stats = HashMap::new();
        for (index, column) in columns.iter().enumerate() {
            match column {
                Expression::Element(e) => {
                    col_stats.insert(e.clone(), resolver.stats_for(e));
                }
                Expression::Constant(value) => {
                    col_stats.insert(
                        project_column_symbol(index),
                        ColStats::single_value(Some(value.clone())),
                    );
                }
                _ => {}
            }
        }
        NodeEstimate::new(child.cardinality).with_col_stats(col_stats)
    }

    /// 列组合的不同值数量之积；任一列未知时返回 `None`
    fn distinct_product<'e>(
        columns: impl Iterator<Item = (usize, &'e Expression)>,
        resolver: &ColumnStatsResolver<'_>,
    ) -> Option<f64> {
        let mut product = 1.0;
        for (index, column) in columns {
            let ndv = match column {
                Expression::Element(e) => resolver.ndv(e)?,
                Expression::Constant(_) => 1.0,
                _ => resolver.ndv(&project_column_symbol(index))?,
            };
            product *= ndv;
        }
        Some(product)
    }

    /// 去重估算：子节点为投影时按投影列计算
    fn dup_remove(
        tree: &PlanTree,
        node: NodeId,
        child: &NodeEstimate,
        resolver: &ColumnStatsResolver<'_>,
    ) -> f64 {
        let c = child.cardinality;
        let columns = match tree.first_child(node) {
            Some(child_id) if tree.node_type(child_id) == NodeType::Project => match tree.kind(child_id) {
                NodeKind::Project { columns } => columns.as_slice(),
                _ => return c,
            },
            _ => return c,
        };
        match Self::distinct_product(columns.iter().enumerate(), resolver) {
            Some(distinct) if is_unknown(c) => distinct,
            Some(distinct) => distinct.min(c),
            None => c,
        }
    }

    fn group(
        grouping: &[Expression],
        child: &NodeEstimate,
        resolver: &ColumnStatsResolver<'_>,
        reduction: f64,
    ) -> f64 {
        if grouping.is_empty() {
            return 1.0;
        }
        let c = child.cardinality;
        match Self::distinct_product(grouping.iter().enumerate(), resolver) {
            Some(distinct) if is_unknown(c) => distinct,
            Some(distinct) => distinct.min(c),
            None if is_unknown(c) => UNKNOWN_VALUE,
            None => c * reduction,
        }
    }
}

impl NodeEstimator for DataProcessingEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        let child = child_estimates.first().cloned().unwrap_or_else(NodeEstimate::unknown);
        let resolver = ctx.resolver(get_input_stats(child_estimates, 0));
        match tree.kind(node) {
            NodeKind::Project { columns } => Ok(Self::project(columns, &child, &resolver)),
            NodeKind::DupRemove => {
                let cardinality = Self::dup_remove(tree, node, &child, &resolver);
                Ok(NodeEstimate::new(cardinality).with_col_stats(child.col_stats.clone()))
            }
            NodeKind::Group { grouping, .. } => {
                let cardinality = Self::group(grouping, &child, &resolver, ctx.config.group_reduction);
                let col_stats: HashMap<ElementSymbol, ColStats> = grouping
                    .iter()
                    .filter_map(Expression::as_element)
                    .map(|e| (e.clone(), resolver.stats_for(e)))
                    .collect();
                Ok(NodeEstimate::new(cardinality).with_col_stats(col_stats))
            }
            other => Err(ComponentError::invalid_plan_structure(format!(
                "数据处理估算器不支持 {} 节点",
                other.node_type().name()
            ))
            .into()),
        }
    }
}
