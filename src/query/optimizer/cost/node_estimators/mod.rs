//! 节点估算器模块
//!
//! 为不同类型的计划节点提供基数与列统计估算功能

use std::collections::HashMap;

use crate::core::error::OptimizeResult;
use crate::core::types::{ElementSymbol, GroupSymbol};
use crate::query::metadata::{QueryMetadataInterface, UNKNOWN_VALUE};
use crate::query::optimizer::cost::col_stats::ColumnStatsResolver;
use crate::query::optimizer::cost::config::CostModelConfig;
use crate::query::optimizer::cost::estimate::NodeEstimate;
use crate::query::planner::plan::{ColStats, NodeId, PlanTree};

pub mod data_processing;
pub mod filter;
pub mod join;
pub mod scan;
pub mod set_operation;
pub mod sort_limit;

pub use data_processing::DataProcessingEstimator;
pub use filter::FilterEstimator;
pub use join::JoinEstimator;
pub use scan::ScanEstimator;
pub use set_operation::SetOperationEstimator;
pub use sort_limit::SortLimitEstimator;

/// 估算所需的只读环境
#[derive(Clone, Copy)]
pub struct EstimateContext<'a> {
    pub metadata: &'a dyn QueryMetadataInterface,
    pub config: &'a CostModelConfig,
}

impl<'a> EstimateContext<'a> {
    pub fn new(metadata: &'a dyn QueryMetadataInterface, config: &'a CostModelConfig) -> Self {
        Self { metadata, config }
    }

    pub fn resolver<'b>(&self, stats: Option<&'b HashMap<ElementSymbol, ColStats>>) -> ColumnStatsResolver<'b>
    where
        'a: 'b,
    {
        ColumnStatsResolver::new(self.metadata, stats)
    }
}

/// 节点估算器 trait
///
/// 所有节点估算器都需要实现此 trait
pub trait NodeEstimator {
    /// 估算节点的输出基数和列统计
    ///
    /// # 参数
    /// - `tree`: 计划树（用于读取节点载荷与子节点分组）
    /// - `node`: 待估算节点
    /// - `child_estimates`: 子节点的估算结果，顺序与子节点一致
    fn estimate(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
        ctx: &EstimateContext<'_>,
    ) -> OptimizeResult<NodeEstimate>;
}

/// 获取子节点的输入行数，缺失时视为未知
pub fn get_input_rows(child_estimates: &[NodeEstimate], index: usize) -> f64 {
    child_estimates
        .get(index)
        .map(|e| e.cardinality)
        .unwrap_or(UNKNOWN_VALUE)
}

/// 获取子节点的列统计
pub fn get_input_stats(child_estimates: &[NodeEstimate], index: usize) -> Option<&HashMap<ElementSymbol, ColStats>> {
    child_estimates.get(index).map(|e| &e.col_stats)
}

/// 只产生单个分组时返回该分组
pub fn single_group(tree: &PlanTree, node: NodeId) -> Option<&GroupSymbol> {
    let groups = tree.node_groups(node);
    if groups.len() == 1 {
        groups.iter().next()
    } else {
        None
    }
}

/// 投影中非元素列的位置符号，用于挂接列统计
pub fn project_column_symbol(index: usize) -> ElementSymbol {
    ElementSymbol::new(GroupSymbol::new(""), format!("expr{}", index))
}
