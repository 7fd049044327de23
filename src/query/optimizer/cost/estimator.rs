//! 代价估算器
//!
//! 后序遍历计划树，为每个节点按类型选择节点估算器，并把结果缓存到节点的
//! `EST_CARDINALITY` / `EST_COL_STATS` 属性上。已缓存的节点不再重复推导；
//! 改变子树形状的规则负责调用 `PlanTree::invalidate_estimates` 清除缓存。

use std::sync::Arc;

use super::config::CostModelConfig;
use super::estimate::NodeEstimate;
use super::node_estimators::{
    DataProcessingEstimator, EstimateContext, FilterEstimator, JoinEstimator, NodeEstimator,
    ScanEstimator, SetOperationEstimator, SortLimitEstimator,
};
use crate::core::error::OptimizeResult;
use crate::query::metadata::QueryMetadataInterface;
use crate::query::planner::plan::{NodeId, NodeType, PlanTree};

/// 代价估算器
#[derive(Debug, Clone)]
pub struct CostEstimator {
    metadata: Arc<dyn QueryMetadataInterface>,
    config: CostModelConfig,
}

impl CostEstimator {
    /// 创建新的代价估算器
    pub fn new(metadata: Arc<dyn QueryMetadataInterface>, config: CostModelConfig) -> Self {
        Self { metadata, config }
    }

    pub fn config(&self) -> &CostModelConfig {
        &self.config
    }

    /// 计算节点（及其未缓存的子树）的估算基数
    ///
    /// 未知时返回 `UNKNOWN_VALUE`
    pub fn compute_cost_for_tree(&self, tree: &mut PlanTree, node: NodeId) -> OptimizeResult<f64> {
        Ok(self.compute_node(tree, node)?.cardinality)
    }

    /// 计算节点的完整估算结果
    pub fn compute_estimate(&self, tree: &mut PlanTree, node: NodeId) -> OptimizeResult<NodeEstimate> {
        self.compute_node(tree, node)
    }

    /// 重新计算单个节点的估算并覆盖缓存
    ///
    /// 子节点使用已缓存的估算，只有缺失时才向下推导
    pub fn update_cardinality(&self, tree: &mut PlanTree, node: NodeId) -> OptimizeResult<f64> {
        tree.try_node(node)?;
        let child_estimates = self.child_estimates(tree, node)?;
        let estimate = self.estimate_local(tree, node, &child_estimates)?;
        log::trace!("更新节点 {} 的估算基数为 {}", node, estimate.cardinality);
        Ok(Self::store(tree, node, estimate).cardinality)
    }

    fn compute_node(&self, tree: &mut PlanTree, node: NodeId) -> OptimizeResult<NodeEstimate> {
        let cached = tree.try_node(node)?.est_cardinality();
        if let Some(cardinality) = cached {
            let col_stats = tree.est_col_stats(node).cloned().unwrap_or_default();
            return Ok(NodeEstimate::new(cardinality).with_col_stats(col_stats));
        }
        let child_estimates = self.child_estimates(tree, node)?;
        let estimate = self.estimate_local(tree, node, &child_estimates)?;
        Ok(Self::store(tree, node, estimate))
    }

    fn child_estimates(&self, tree: &mut PlanTree, node: NodeId) -> OptimizeResult<Vec<NodeEstimate>> {
        let children = tree.children(node).to_vec();
        children
            .into_iter()
            .map(|child| self.compute_node(tree, child))
            .collect()
    }

    fn store(tree: &mut PlanTree, node: NodeId, estimate: NodeEstimate) -> NodeEstimate {
        tree.set_est_cardinality(node, estimate.cardinality);
        tree.set_est_col_stats(node, estimate.col_stats.clone());
        estimate
    }

    fn estimate_local(
        &self,
        tree: &PlanTree,
        node: NodeId,
        child_estimates: &[NodeEstimate],
    ) -> OptimizeResult<NodeEstimate> {
        let ctx = EstimateContext::new(&*self.metadata, &self.config);
        let estimator: &dyn NodeEstimator = match tree.node_type(node) {
            NodeType::Access | NodeType::Source | NodeType::Null => &ScanEstimator,
            NodeType::Select => &FilterEstimator,
            NodeType::Join => &JoinEstimator,
            NodeType::SetOp => &SetOperationEstimator,
            NodeType::Sort | NodeType::Limit => &SortLimitEstimator,
            NodeType::Project | NodeType::DupRemove | NodeType::Group => &DataProcessingEstimator,
        };
        estimator.estimate(tree, node, child_estimates, &ctx)
    }
}
