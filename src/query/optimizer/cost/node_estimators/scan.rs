//! 数据来源估算器
//!
//! 为叶子及访问节点提供估算：
//! - Source：物理分组取元数据中的存储基数；虚拟分组沿符号映射向外传播子节点统计
//! - Access：透传其下请求的估算
//! - Null：恒为 0 行

use std::collections::HashMap;

use super::{get_input_rows, get_input_stats, EstimateContext, NodeEstimator};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::Expression;
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{ColStats, NodeId, NodeKind, PlanTree};

/// 数据来源估算器
pub struct ScanEstimator;

impl NodeEstimator for ScanEstimator {
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate> {
        match tree.kind(node) {
            NodeKind::Null => Ok(NodeEstimate::new(0.0)),
            NodeKind::Access { .. } => Ok(child_estimates
                .first()
                .cloned()
                .unwrap_or_else(NodeEstimate::unknown)),
            NodeKind::Source {
                group,
                symbol_map,
                virtual_group,
            } => {
                if child_estimates.is_empty() {
                    // 物理分组：元数据查找失败属于元数据错误，直接上抛
                    let cardinality = ctx.metadata.group_cardinality(group)?;
                    return Ok(NodeEstimate::new(cardinality));
                }
                let cardinality = get_input_rows(child_estimates, 0);
                if !*virtual_group || symbol_map.is_empty() {
                    return Ok(child_estimates[0].clone());
                }
                let resolver = ctx.resolver(get_input_stats(child_estimates, 0));
                let mut col_stats = HashMap::new();
                for (outer, inner) in symbol_map {
                    let stats = match inner {
                        Expression::Constant(value) => ColStats::single_value(Some(value.clone())),
                        Expression::Element(element) => resolver.stats_for(element),
                        _ => continue,
                    };
                    col_stats.insert(outer.clone(), stats);
                }
                Ok(NodeEstimate::new(cardinality).with_col_stats(col_stats))
            }
            other => Err(ComponentError::invalid_plan_structure(format!(
                "数据来源估算器不支持 {} 节点",
                other.node_type().name()
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::expression::SymbolMap;
    use crate::core::types::{DataType, GroupSymbol, Value};
    use crate::query::metadata::{ElementRecord, GroupRecord, MetadataStore, UNKNOWN_VALUE};
    use crate::query::optimizer::cost::config::CostModelConfig;

    fn metadata() -> MetadataStore {
        MetadataStore::new()
            .with_group(
                GroupRecord::new("pm1.g1", "pm1")
                    .with_cardinality(120.0)
                    .element(ElementRecord::new("e1", DataType::Integer).with_ndv(12.0)),
            )
            .with_group(GroupRecord::new("pm1.g2", "pm1"))
    }

    #[test]
    fn test_physical_source_cardinality() {
        let md = metadata();
        let config = CostModelConfig::default();
        let ctx = EstimateContext::new(&md, &config);
        let mut tree = PlanTree::new();
        let known = tree.add_node(NodeKind::source(GroupSymbol::new("pm1.g1")));
        let unknown = tree.add_node(NodeKind::source(GroupSymbol::new("pm1.g2")));
        let missing = tree.add_node(NodeKind::source(GroupSymbol::new("pm9.g9")));

        assert_eq!(ScanEstimator.estimate(&tree, known, &[], &ctx).unwrap().cardinality, 120.0);
        assert_eq!(
            ScanEstimator.estimate(&tree, unknown, &[], &ctx).unwrap().cardinality,
            UNKNOWN_VALUE
        );
        assert!(ScanEstimator.estimate(&tree, missing, &[], &ctx).is_err(), "未知分组应返回元数据错误");
    }

    #[test]
    fn test_virtual_source_maps_stats() {
        let md = metadata();
        let config = CostModelConfig::default();
        let ctx = EstimateContext::new(&md, &config);
        let v = GroupSymbol::new("vm1.v1");
        let mut map = SymbolMap::new();
        map.insert(v.element("a"), Expression::Element(GroupSymbol::new("pm1.g1").element("e1")));
        map.insert(v.element("b"), Expression::constant(Value::from(3i64)));
        let mut tree = PlanTree::new();
        let source = tree.add_node(NodeKind::virtual_source(v.clone(), map));

        let child = NodeEstimate::new(120.0);
        let estimate = ScanEstimator.estimate(&tree, source, &[child], &ctx).unwrap();
        assert_eq!(estimate.cardinality, 120.0);
        assert_eq!(estimate.col_stats[&v.element("a")].ndv, Some(12.0));
        assert_eq!(estimate.col_stats[&v.element("b")].ndv, Some(1.0));
    }
}
