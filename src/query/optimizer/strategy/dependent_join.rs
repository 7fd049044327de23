//! 依赖连接选择
//!
//! 依赖连接分两步执行：先执行独立侧，再把独立侧结果中的连接列取值作为 IN 列表
//! 参数化依赖侧的请求。选择规则：
//! - 只有内连接、左外连接、右外连接可以成为依赖连接，外连接只有补空侧可以作为依赖侧
//! - 连接至少有一个等值条件，依赖侧必须是单个 Access 子树（可以被 Select 包装）
//! - 依赖侧的数据源需要支持 IN 条件与依赖连接，并满足谓词数量上限
//! - 只能借助连接条件满足访问模式的一侧直接成为候选，不受 IN 大小上限与行数比较限制；
//!   其余候选要求独立侧行数不超过 IN 大小上限且不多于依赖侧
//! - 能借助连接条件满足访问模式的一侧优先，其次是连接列覆盖唯一键的一侧，
//!   最后比较两侧作为依赖侧时需要取回的行数
//!
//! 判定只依赖两侧的估算与键信息，左右互换时结果随之互换

use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::{CompareOperator, Criteria, ElementSymbol, Expression, GroupSymbol};
use crate::query::capabilities::{Capability, CapabilitiesFinder};
use crate::query::metadata::{is_unknown, QueryMetadataInterface};
use crate::query::optimizer::access_pattern::constrained_elements;
use crate::query::optimizer::cost::{ColumnStatsResolver, CostEstimator};
use crate::query::optimizer::frame::find_join_source_node;
use crate::query::optimizer::strategy::join_region::source_access_node;
use crate::query::planner::plan::{
    AccessPattern, JoinSide, JoinStrategy, JoinType, NodeId, NodeKind, NodeType, PlanTree,
};

/// 连接一侧的候选信息
#[derive(Debug, Clone)]
struct SideCandidate {
    cardinality: f64,
    eligible: bool,
    key_covered: bool,
    satisfies_pattern: bool,
    /// 连接列的最大不同值数量
    ndv: Option<f64>,
}

/// 依赖连接选择器
pub struct DependentJoinSelector<'a> {
    metadata: &'a dyn QueryMetadataInterface,
    finder: &'a dyn CapabilitiesFinder,
    estimator: &'a CostEstimator,
}

impl<'a> DependentJoinSelector<'a> {
    pub fn new(
        metadata: &'a dyn QueryMetadataInterface,
        finder: &'a dyn CapabilitiesFinder,
        estimator: &'a CostEstimator,
    ) -> Self {
        Self {
            metadata,
            finder,
            estimator,
        }
    }

    /// 选择依赖侧；两侧都不合适时返回 `None`
    pub fn choose(&self, tree: &mut PlanTree, join: NodeId) -> OptimizeResult<Option<JoinSide>> {
        let (join_type, pairs) = match tree.try_node(join)?.kind() {
            NodeKind::Join {
                join_type, criteria, ..
            } => (*join_type, equi_pairs(criteria)),
            _ => return Ok(None),
        };
        if !matches!(join_type, JoinType::Inner | JoinType::LeftOuter | JoinType::RightOuter) {
            return Ok(None);
        }
        if pairs.is_empty() || tree.child_count(join) != 2 {
            return Ok(None);
        }

        let children = [tree.children(join)[0], tree.children(join)[1]];
        let rows = [
            self.estimator.compute_cost_for_tree(tree, children[0])?,
            self.estimator.compute_cost_for_tree(tree, children[1])?,
        ];

        let left = self.candidate(tree, join_type, &pairs, children[0], rows[0], rows[1], 0)?;
        let right = self.candidate(tree, join_type, &pairs, children[1], rows[1], rows[0], 1)?;
        let chosen = self.decide(tree, children, &left, &right);
        log::trace!(
            "连接 {} 的依赖侧候选: 左 {:?} 右 {:?}，选择 {:?}",
            join,
            left,
            right,
            chosen
        );
        Ok(chosen)
    }

    #[allow(clippy::too_many_arguments)]
    fn candidate(
        &self,
        tree: &PlanTree,
        join_type: JoinType,
        pairs: &[(ElementSymbol, ElementSymbol)],
        child: NodeId,
        rows: f64,
        other_rows: f64,
        index: usize,
    ) -> OptimizeResult<SideCandidate> {
        let groups = tree.node_groups(child);
        let join_elements: Vec<&ElementSymbol> = pairs
            .iter()
            .filter_map(|(l, r)| {
                if groups.contains(l.group()) {
                    Some(l)
                } else if groups.contains(r.group()) {
                    Some(r)
                } else {
                    None
                }
            })
            .collect();

        let resolver = ColumnStatsResolver::new(self.metadata, tree.est_col_stats(child));
        let ndv = join_elements
            .iter()
            .filter_map(|e| resolver.ndv(e))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));

        let mut candidate = SideCandidate {
            cardinality: rows,
            eligible: false,
            key_covered: self.covers_key(tree, child, &join_elements)?,
            satisfies_pattern: false,
            ndv,
        };

        if join_type.is_outer() && !join_type.is_null_supplying_side(index) {
            return Ok(candidate);
        }
        let Some(access) = dependent_access(tree, child) else {
            return Ok(candidate);
        };
        let (model, patterns) = match tree.kind(access) {
            NodeKind::Access {
                model,
                access_patterns,
                ..
            } => (model.clone(), access_patterns.clone()),
            _ => return Ok(candidate),
        };
        candidate.satisfies_pattern = pattern_needs_join(tree, access, patterns, &join_elements);

        let caps = self.finder.find_capabilities(&model)?;
        if !caps.supports(Capability::CriteriaIn) || !caps.supports(Capability::DependentJoin) {
            return Ok(candidate);
        }
        if let Some(max) = caps.max_dependent_predicates() {
            if join_elements.len() > max {
                return Ok(candidate);
            }
        }
        if candidate.satisfies_pattern {
            candidate.eligible = true;
            return Ok(candidate);
        }
        if let Some(max_in) = caps.max_in_criteria_size() {
            let limit = (max_in * caps.max_dependent_predicates().unwrap_or(1)) as f64;
            if is_unknown(other_rows) || other_rows > limit {
                return Ok(candidate);
            }
        }
        if !is_unknown(rows) && !is_unknown(other_rows) && other_rows > rows {
            return Ok(candidate);
        }
        candidate.eligible = true;
        Ok(candidate)
    }

    /// 连接列与子树内的常量等值条件一起是否覆盖某个分组的唯一键
    fn covers_key(
        &self,
        tree: &PlanTree,
        child: NodeId,
        join_elements: &[&ElementSymbol],
    ) -> OptimizeResult<bool> {
        let mut by_group: BTreeMap<GroupSymbol, BTreeSet<&str>> = BTreeMap::new();
        for e in join_elements {
            by_group.entry(e.group().clone()).or_default().insert(e.short_name());
        }
        let selects = tree.find_nodes(child, &[NodeType::Select], &[NodeType::Join, NodeType::Source]);
        let mut constant_elements = Vec::new();
        for select in selects {
            if let NodeKind::Select { criteria, .. } = tree.kind(select) {
                constant_elements.extend(constant_equalities(criteria));
            }
        }
        for e in &constant_elements {
            by_group.entry(e.group().clone()).or_default().insert(e.short_name());
        }
        for (group, names) in &by_group {
            let names: Vec<&str> = names.iter().copied().collect();
            if self.metadata.covers_unique_key(group, &names)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn decide(
        &self,
        tree: &PlanTree,
        children: [NodeId; 2],
        left: &SideCandidate,
        right: &SideCandidate,
    ) -> Option<JoinSide> {
        match (left.eligible, right.eligible) {
            (false, false) => return None,
            (true, false) => return Some(JoinSide::Left),
            (false, true) => return Some(JoinSide::Right),
            (true, true) => {}
        }
        match (left.satisfies_pattern, right.satisfies_pattern) {
            (true, false) => return Some(JoinSide::Left),
            (false, true) => return Some(JoinSide::Right),
            _ => {}
        }
        match (left.key_covered, right.key_covered) {
            (true, false) => {
                return (!contains_cross_join(tree, children[1])).then_some(JoinSide::Left);
            }
            (false, true) => {
                return (!contains_cross_join(tree, children[0])).then_some(JoinSide::Right);
            }
            _ => {}
        }
        let default_selectivity = self.estimator.config().unknown_selectivity;
        let left_fetch = fetch_rows(left, right, default_selectivity)?;
        let right_fetch = fetch_rows(right, left, default_selectivity)?;
        if left_fetch < right_fetch {
            Some(JoinSide::Left)
        } else if right_fetch < left_fetch {
            Some(JoinSide::Right)
        } else {
            None
        }
    }
}

/// 连接子节点下可作为依赖侧的 Access 节点
///
/// Access 节点与连接之间只允许 Select 包装
fn dependent_access(tree: &PlanTree, child: NodeId) -> Option<NodeId> {
    let access = source_access_node(tree, child)?;
    (find_join_source_node(tree, access) == child).then_some(access)
}

/// 访问节点子树内的条件无法满足任何访问模式，而某个模式剩余的元素都由连接条件约束
fn pattern_needs_join(
    tree: &PlanTree,
    access: NodeId,
    mut patterns: Vec<AccessPattern>,
    join_elements: &[&ElementSymbol],
) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let constrained = constrained_elements(tree, access);
    for pattern in patterns.iter_mut() {
        if pattern.satisfy(constrained.iter()) {
            return false;
        }
    }
    patterns
        .iter()
        .any(|p| p.unsatisfied().iter().all(|e| join_elements.contains(&e)))
}

/// 作为依赖侧时需要取回的行数；任一侧未知时返回 `None`
fn fetch_rows(side: &SideCandidate, other: &SideCandidate, default_selectivity: f64) -> Option<f64> {
    if is_unknown(side.cardinality) || is_unknown(other.cardinality) {
        return None;
    }
    if side.key_covered {
        return Some(side.cardinality.min(other.cardinality));
    }
    let selectivity = side.ndv.map_or(default_selectivity, |ndv| 1.0 / ndv.max(1.0));
    Some(side.cardinality * (other.cardinality * selectivity).min(1.0))
}

fn contains_cross_join(tree: &PlanTree, node: NodeId) -> bool {
    tree.find_nodes(node, &[NodeType::Join], &[])
        .into_iter()
        .any(|j| matches!(tree.kind(j), NodeKind::Join { join_type: JoinType::Cross, .. }))
}

fn equi_pairs(criteria: &[Criteria]) -> Vec<(ElementSymbol, ElementSymbol)> {
    criteria
        .iter()
        .flat_map(|c| c.conjuncts())
        .filter_map(|c| c.equi_join_pair())
        .map(|(l, r)| (l.clone(), r.clone()))
        .collect()
}

/// 与常量做等值比较的元素
fn constant_equalities(criteria: &Criteria) -> Vec<ElementSymbol> {
    criteria
        .conjuncts()
        .into_iter()
        .filter_map(|c| match c {
            Criteria::Compare {
                op: CompareOperator::Eq,
                left,
                right,
            } => match (left, right) {
                (Expression::Element(e), Expression::Constant(_))
                | (Expression::Constant(_), Expression::Element(e)) => Some(e.clone()),
                _ => None,
            },
            _ => None,
        })
        .collect()
}

/// 把连接改写为依赖连接
///
/// 依赖侧的 Access 节点被标记为依赖，其下插入由独立侧结果参数化的 IN 条件
pub fn apply_dependent_join(tree: &mut PlanTree, join: NodeId, side: JoinSide) -> OptimizeResult<()> {
    let child = tree
        .children(join)
        .get(side.index())
        .copied()
        .ok_or_else(|| ComponentError::invalid_plan_structure(format!("连接 {} 缺少 {:?} 侧子节点", join, side)))?;
    let access = dependent_access(tree, child).unwrap_or(child);
    let access_child = match tree.kind(access) {
        NodeKind::Access { .. } => tree.first_child(access).ok_or_else(|| {
            ComponentError::invalid_plan_structure(format!("访问节点 {} 没有子节点", access))
        })?,
        other => {
            return Err(ComponentError::invalid_plan_structure(format!(
                "依赖侧必须是访问节点，实际为 {}",
                other.node_type().name()
            ))
            .into())
        }
    };

    let value_source = format!("DVS_{}", join.0);
    let dependent_groups = tree.node_groups(access).clone();
    let pairs = match tree.kind_mut(join) {
        NodeKind::Join {
            criteria,
            strategy,
            dependent_value_source,
            dependent_side,
            ..
        } => {
            *strategy = Some(JoinStrategy::Dependent);
            *dependent_value_source = Some(value_source.clone());
            *dependent_side = Some(side);
            equi_pairs(criteria)
        }
        _ => return Err(ComponentError::invalid_plan_structure(format!("节点 {} 不是连接", join)).into()),
    };

    let dependent_criteria: Vec<Criteria> = pairs
        .iter()
        .filter_map(|(l, r)| {
            if dependent_groups.contains(l.group()) {
                Some(l)
            } else if dependent_groups.contains(r.group()) {
                Some(r)
            } else {
                None
            }
        })
        .map(|e| Criteria::DependentSet {
            expr: Expression::Element(e.clone()),
            value_source: value_source.clone(),
        })
        .collect();
    let criteria = Criteria::combine(dependent_criteria).ok_or_else(|| {
        ComponentError::malformed_criteria(format!("连接 {} 没有引用依赖侧的等值条件", join))
    })?;

    if let NodeKind::Access { dependent, .. } = tree.kind_mut(access) {
        *dependent = true;
    }
    let select = tree.add_node(NodeKind::Select {
        criteria,
        copied: false,
        dependent: true,
    });
    tree.add_as_parent(access_child, select);
    tree.invalidate_estimates(select);
    log::debug!("连接 {} 改写为依赖连接，依赖侧 {:?}，值来源 {}", join, side, value_source);
    Ok(())
}
