//! 连接重排规则

use std::collections::BTreeSet;

use crate::core::error::OptimizeResult;
use crate::core::types::ElementSymbol;
use crate::query::metadata::is_unknown;
use crate::query::optimizer::access_pattern::constrained_elements;
use crate::query::optimizer::cost::ColumnStatsResolver;
use crate::query::optimizer::strategy::{
    source_access_node, JoinCondition, JoinOrderOptimizer, JoinRegion, JoinSourceInfo,
};
use crate::query::planner::plan::{NodeKind, PlanTree};
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 连接重排规则
///
/// 对每个由内连接/交叉连接组成的连接区域选择左深连接顺序。
///
/// # 转换示例
///
/// Before:
/// ```text
///        Join(g2.e1 = g3.e1)
///        /             \
///   CrossJoin         Access(g3)
///    /      \
/// Access(g1) Access(g2)
/// ```
///
/// After:
/// ```text
///        Join
///        /    \
///   Join(g2.e1 = g3.e1) Access(g1)
///    /      \
/// Access(g2) Access(g3)
/// ```
///
/// # 适用条件
///
/// - 区域内至少有两个连接源
/// - 源数量不超过 `exhaustive_join_bound` 时穷举，否则贪心
/// - 只能借助连接条件满足访问模式的源必须排在提供取值的源之后
/// - 估算基数未知的源按 `unknown_cardinality_rank` 参与排序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PlanJoinsRule;

impl PlanJoinsRule {
    /// 创建规则实例
    pub fn new() -> Self {
        Self
    }

    /// 等值条件中元素的不同值数量；单列唯一键的不同值数量即源的行数
    fn element_ndv(
        tree: &PlanTree,
        ctx: &RewriteContext,
        region: &JoinRegion,
        element: &ElementSymbol,
        rows: &[f64],
    ) -> Option<f64> {
        let index = region.source_of(tree, element.group())?;
        let source = region.join_sources()[index];
        let resolver = ColumnStatsResolver::new(ctx.metadata(), tree.est_col_stats(source));
        if resolver.is_single_column_key(element) && !is_unknown(rows[index]) {
            return Some(rows[index].max(1.0));
        }
        resolver.ndv(element)
    }

    fn conditions(
        tree: &PlanTree,
        ctx: &RewriteContext,
        region: &JoinRegion,
        rows: &[f64],
    ) -> Vec<JoinCondition> {
        let default_selectivity = ctx.command().cost.unknown_selectivity;
        region
            .criteria()
            .iter()
            .filter_map(|rc| {
                let mask = region.source_mask(tree, &rc.groups);
                if mask == 0 {
                    return None;
                }
                let selectivity = match rc.criteria.equi_join_pair() {
                    Some((left, right)) => {
                        let ndv = [left, right]
                            .iter()
                            .filter_map(|e| Self::element_ndv(tree, ctx, region, e, rows))
                            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
                        ndv.map_or(default_selectivity, |ndv| 1.0 / ndv.max(1.0))
                    }
                    None => default_selectivity,
                };
                Some(JoinCondition::new(mask, selectivity))
            })
            .collect()
    }

    /// 访问模式只能由其他连接源经等值条件提供取值时，返回需要先加入的源
    fn prerequisites(tree: &PlanTree, region: &JoinRegion, index: usize) -> u64 {
        let source = region.join_sources()[index];
        let Some(access) = source_access_node(tree, source) else {
            return 0;
        };
        let patterns = match tree.kind(access) {
            NodeKind::Access { access_patterns, .. } if !access_patterns.is_empty() => {
                access_patterns.clone()
            }
            _ => return 0,
        };
        let constrained = constrained_elements(tree, access);
        let mut remaining = Vec::new();
        for mut pattern in patterns {
            if pattern.satisfy(constrained.iter()) {
                return 0;
            }
            remaining.push(pattern);
        }

        let mut best: Option<u64> = None;
        for pattern in &remaining {
            let mut mask = 0u64;
            let mut covered = true;
            for element in pattern.unsatisfied() {
                let partners: BTreeSet<usize> = region
                    .criteria()
                    .iter()
                    .filter_map(|rc| rc.criteria.equi_join_pair())
                    .filter_map(|(l, r)| {
                        if l == element {
                            Some(r)
                        } else if r == element {
                            Some(l)
                        } else {
                            None
                        }
                    })
                    .filter_map(|partner| region.source_of(tree, partner.group()))
                    .filter(|i| *i != index)
                    .collect();
                match partners.iter().next() {
                    Some(i) => mask |= 1 << i,
                    None => {
                        covered = false;
                        break;
                    }
                }
            }
            if covered && best.map_or(true, |b| mask.count_ones() < b.count_ones()) {
                best = Some(mask);
            }
        }
        best.unwrap_or(0)
    }

    fn plan_region(tree: &mut PlanTree, ctx: &RewriteContext, mut region: JoinRegion) -> OptimizeResult<bool> {
        let count = region.join_sources().len();
        if count < 2 || count > u64::BITS as usize {
            return Ok(false);
        }
        let limits = ctx.command().limits;
        let mut rows = Vec::with_capacity(count);
        for source in region.join_sources().to_vec() {
            rows.push(ctx.estimator().compute_cost_for_tree(tree, source)?);
        }
        let tables: Vec<JoinSourceInfo> = (0..count)
            .map(|i| {
                let estimated = if is_unknown(rows[i]) {
                    limits.unknown_cardinality_rank
                } else {
                    rows[i]
                };
                JoinSourceInfo::new(estimated).with_prerequisites(Self::prerequisites(tree, &region, i))
            })
            .collect();
        let conditions = Self::conditions(tree, ctx, &region, &rows);

        let result = JoinOrderOptimizer::new(limits.exhaustive_join_bound).optimize_join_order(
            &tables,
            &conditions,
            region.order(),
        );
        log::trace!(
            "连接区域 {} 的候选顺序 {:?}（{:?}，代价 {}）",
            region.root(),
            result.order,
            result.optimization_method,
            result.total_cost
        );
        if !result.differs_from(region.order()) {
            return Ok(false);
        }
        region.set_order(result.order)?;
        region.reconstruct(tree)?;
        Ok(true)
    }
}

impl OptimizerRule for PlanJoinsRule {
    fn name(&self) -> &'static str {
        "PlanJoinsRule"
    }

    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        _rules: &mut RuleStack,
    ) -> OptimizeResult<()> {
        let root = tree.require_root()?;
        let regions = JoinRegion::discover_all(tree, root);
        let mut reordered = 0;
        // 先处理内层区域
        for region in regions.into_iter().rev() {
            if Self::plan_region(tree, ctx, region)? {
                reordered += 1;
            }
        }
        log::debug!("重排连接区域 {} 个", reordered);
        Ok(())
    }
}
