//! 连接区域
//!
//! 连接区域是一段可以相互重排的内连接/交叉连接：区域内的连接节点直接相连，
//! 中间没有帧或其他节点。区域不拥有任何节点，只引用树中已有的连接节点（节点池）
//! 与连接源节点（区域连接的、本身不是区域连接的子节点）。外连接不参与重排，
//! 其两侧各自可以形成独立区域。
//!
//! 重建时按选定顺序生成左深树：复用原有连接节点，每个条件放到其引用分组
//! 首次全部可用的最低一层连接上。

use std::collections::BTreeSet;

use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::{Criteria, GroupSymbol};
use crate::query::planner::plan::{JoinType, NodeId, NodeKind, NodeType, PlanTree};

/// 区域内的一个条件及其引用的分组
#[derive(Debug, Clone)]
pub struct RegionCriteria {
    pub criteria: Criteria,
    pub groups: BTreeSet<GroupSymbol>,
}

/// 连接区域
#[derive(Debug, Clone)]
pub struct JoinRegion {
    root: NodeId,
    join_nodes: Vec<NodeId>,
    join_sources: Vec<NodeId>,
    criteria: Vec<RegionCriteria>,
    order: Vec<usize>,
}

fn is_region_join(tree: &PlanTree, node: NodeId) -> bool {
    match tree.kind(node) {
        NodeKind::Join { join_type, .. } => join_type.is_reorderable() && tree.child_count(node) == 2,
        _ => false,
    }
}

impl JoinRegion {
    /// 以 `root` 为顶层连接发现区域；`root` 不是可重排连接时返回 `None`
    pub fn discover(tree: &PlanTree, root: NodeId) -> Option<JoinRegion> {
        if !is_region_join(tree, root) {
            return None;
        }
        let mut region = JoinRegion {
            root,
            join_nodes: Vec::new(),
            join_sources: Vec::new(),
            criteria: Vec::new(),
            order: Vec::new(),
        };
        region.collect(tree, root);
        region.order = (0..region.join_sources.len()).collect();
        Some(region)
    }

    fn collect(&mut self, tree: &PlanTree, join: NodeId) {
        self.join_nodes.push(join);
        if let NodeKind::Join { criteria, .. } = tree.kind(join) {
            for crit in criteria.iter().flat_map(|c| c.conjuncts()) {
                self.criteria.push(RegionCriteria {
                    groups: crit.groups(),
                    criteria: crit.clone(),
                });
            }
        }
        for child in tree.children(join) {
            if is_region_join(tree, *child) {
                self.collect(tree, *child);
            } else {
                self.join_sources.push(*child);
            }
        }
    }

    /// 查找计划树中所有区域（自上而下，区域内部的连接不会再次作为区域顶层）
    pub fn discover_all(tree: &PlanTree, start: NodeId) -> Vec<JoinRegion> {
        let mut regions = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if let Some(region) = JoinRegion::discover(tree, node) {
                stack.extend(region.join_sources.iter().rev().copied());
                regions.push(region);
            } else {
                stack.extend(tree.children(node).iter().rev().copied());
            }
        }
        regions
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn join_nodes(&self) -> &[NodeId] {
        &self.join_nodes
    }

    pub fn join_sources(&self) -> &[NodeId] {
        &self.join_sources
    }

    pub fn criteria(&self) -> &[RegionCriteria] {
        &self.criteria
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// 设置候选顺序，必须是连接源下标的一个排列
    pub fn set_order(&mut self, order: Vec<usize>) -> OptimizeResult<()> {
        let mut sorted = order.clone();
        sorted.sort_unstable();
        if sorted != (0..self.join_sources.len()).collect::<Vec<_>>() {
            return Err(ComponentError::internal(format!(
                "无效的连接顺序 {:?}，区域共有 {} 个连接源",
                order,
                self.join_sources.len()
            ))
            .into());
        }
        self.order = order;
        Ok(())
    }

    /// 分组集合对应的连接源位掩码
    pub fn source_mask(&self, tree: &PlanTree, groups: &BTreeSet<GroupSymbol>) -> u64 {
        self.join_sources
            .iter()
            .enumerate()
            .filter(|(_, s)| !tree.node_groups(**s).is_disjoint(groups))
            .fold(0u64, |mask, (i, _)| mask | (1 << i))
    }

    /// 元素所在的连接源下标
    pub fn source_of(&self, tree: &PlanTree, group: &GroupSymbol) -> Option<usize> {
        self.join_sources
            .iter()
            .position(|s| tree.node_groups(*s).contains(group))
    }

    /// 按当前顺序重建区域，返回新的区域顶层节点
    ///
    /// 只有一个连接源时，该源直接取代区域，原有连接节点全部删除
    pub fn reconstruct(&self, tree: &mut PlanTree) -> OptimizeResult<NodeId> {
        let sources: Vec<NodeId> = self.order.iter().map(|i| self.join_sources[*i]).collect();
        if sources.is_empty() {
            return Err(ComponentError::invalid_plan_structure("连接区域没有连接源").into());
        }
        for join in &self.join_nodes {
            tree.remove_all_children(*join);
        }

        if sources.len() == 1 {
            let source = sources[0];
            match tree.parent(self.root) {
                Some(parent) => tree.replace_child(parent, self.root, source),
                None => {
                    tree.detach(source);
                    tree.set_root(source);
                }
            }
            for join in &self.join_nodes {
                tree.remove_subtree(*join);
            }
            if let Some(parent) = tree.parent(source) {
                tree.recompute_groups(parent);
                tree.invalidate_estimates(parent);
            }
            return Ok(source);
        }

        if self.join_nodes.len() != sources.len() - 1 {
            return Err(ComponentError::invalid_plan_structure(format!(
                "连接区域有 {} 个连接源但有 {} 个连接节点",
                sources.len(),
                self.join_nodes.len()
            ))
            .into());
        }

        // 每一层可用的分组
        let mut available: Vec<BTreeSet<GroupSymbol>> = Vec::with_capacity(sources.len());
        let mut acc = BTreeSet::new();
        for source in &sources {
            acc.extend(tree.node_groups(*source).iter().cloned());
            available.push(acc.clone());
        }
        let mut placed: Vec<Vec<Criteria>> = vec![Vec::new(); sources.len()];
        for rc in &self.criteria {
            let level = (1..sources.len())
                .find(|level| rc.groups.is_subset(&available[*level]))
                .unwrap_or(sources.len() - 1);
            placed[level].push(rc.criteria.clone());
        }

        // 节点池中的第一个连接（原区域顶层）作为新的顶层
        let n = sources.len();
        let mut current = sources[0];
        let mut bottom = None;
        for (level, source) in sources.iter().enumerate().skip(1) {
            let join = self.join_nodes[n - 1 - level];
            let criteria = std::mem::take(&mut placed[level]);
            if let NodeKind::Join {
                join_type,
                criteria: join_criteria,
                strategy,
                dependent_value_source,
                dependent_side,
            } = tree.kind_mut(join)
            {
                *join_type = if criteria.is_empty() { JoinType::Cross } else { JoinType::Inner };
                *join_criteria = criteria;
                *strategy = None;
                *dependent_value_source = None;
                *dependent_side = None;
            }
            tree.set_groups(join, BTreeSet::new());
            tree.add_child(join, current);
            tree.add_child(join, *source);
            bottom.get_or_insert(join);
            current = join;
        }
        if let Some(bottom) = bottom {
            tree.recompute_groups(bottom);
            tree.invalidate_estimates(bottom);
        }
        log::trace!("重建连接区域 {}，顺序 {:?}", self.root, self.order);
        Ok(current)
    }
}

/// 连接源节点下的 Access 节点（连接源本身或其 Select 包装之下）
pub fn source_access_node(tree: &PlanTree, source: NodeId) -> Option<NodeId> {
    tree.find_node(source, &[NodeType::Access], &[NodeType::Access, NodeType::Join, NodeType::Source])
}
