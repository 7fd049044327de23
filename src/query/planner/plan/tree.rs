//! 计划树
//!
//! 节点保存在竞技场（arena）中，通过 `NodeId` 寻址。子节点列表有序且独占，
//! 父节点仅保存索引，不持有所有权。所有改变树形的操作都通过 `PlanTree`
//! 进行，以维护"每个节点至多一个父节点"的不变量。

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Index, IndexMut};

use super::node::{ColStats, NodeId, NodeKind, NodeType, PlanNode};
use crate::core::error::{ComponentError, OptimizeResult};
use crate::core::types::{ElementSymbol, GroupSymbol};

/// 计划树
#[derive(Debug, Clone, Default)]
pub struct PlanTree {
    nodes: Vec<Option<PlanNode>>,
    root: Option<NodeId>,
}

impl PlanTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// 根节点，空树返回组件错误
    pub fn require_root(&self) -> OptimizeResult<NodeId> {
        self.root
            .ok_or_else(|| ComponentError::invalid_plan_structure("计划树为空").into())
    }

    /// 创建一个未挂接的节点
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(PlanNode::new(kind)));
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&PlanNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// 带检查的节点访问
    pub fn try_node(&self, id: NodeId) -> OptimizeResult<&PlanNode> {
        self.get(id)
            .ok_or_else(|| ComponentError::NodeNotFound(id.0).into())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// 存活节点数量
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self[id].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self[id].kind
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        self[id].kind.node_type()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self[id].children
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self[id].children.len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self[id].children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self[id].children.last().copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self[id].parent
    }

    /// 节点在父节点子列表中的位置
    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self[parent].children.iter().position(|c| *c == id)
    }

    pub fn node_groups(&self, id: NodeId) -> &BTreeSet<GroupSymbol> {
        &self[id].groups
    }

    pub fn set_groups(&mut self, id: NodeId, groups: BTreeSet<GroupSymbol>) {
        self[id].groups = groups;
    }

    pub fn add_group(&mut self, id: NodeId, group: GroupSymbol) {
        self[id].groups.insert(group);
    }

    /// 追加子节点，子节点必须未挂接
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self[parent].children.push(child);
        self[child].parent = Some(parent);
        self.merge_child_groups(parent, child);
    }

    /// 作为第一个子节点插入
    pub fn add_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self[parent].children.insert(0, child);
        self[child].parent = Some(parent);
        self.merge_child_groups(parent, child);
    }

    fn merge_child_groups(&mut self, parent: NodeId, child: NodeId) {
        if self.node_type(parent) != NodeType::Source {
            let groups = self[child].groups.clone();
            self[parent].groups.extend(groups);
        }
    }

    /// 在 `node` 与其父节点之间插入 `new_parent`
    ///
    /// `new_parent` 占据 `node` 原来的位置（若 `node` 为根则成为新根）
    pub fn add_as_parent(&mut self, node: NodeId, new_parent: NodeId) {
        self.detach(new_parent);
        match self.parent(node) {
            Some(parent) => {
                let idx = self.child_index(node).unwrap_or(0);
                self[parent].children[idx] = new_parent;
                self[new_parent].parent = Some(parent);
            }
            None => {
                if self.root == Some(node) {
                    self.root = Some(new_parent);
                }
            }
        }
        self[node].parent = None;
        self[new_parent].children.push(node);
        self[node].parent = Some(new_parent);
        if self.node_type(new_parent) != NodeType::Source {
            let groups = self[node].groups.clone();
            self[new_parent].groups = groups;
        }
    }

    /// 把节点从树中摘除，唯一的子节点接替其位置
    ///
    /// 返回被摘除的节点；拥有多个子节点的节点不能摘除
    pub fn remove_from_parent(&mut self, node: NodeId) -> OptimizeResult<PlanNode> {
        if self.child_count(node) > 1 {
            return Err(ComponentError::invalid_plan_structure(format!(
                "节点 {} 有多个子节点，无法直接摘除",
                node
            ))
            .into());
        }
        let child = self.first_child(node);
        let parent = self.parent(node);
        if let Some(child) = child {
            self[child].parent = parent;
        }
        match parent {
            Some(parent) => {
                let idx = self.child_index(node).unwrap_or(0);
                match child {
                    Some(child) => self[parent].children[idx] = child,
                    None => {
                        self[parent].children.remove(idx);
                    }
                }
            }
            None => {
                if self.root == Some(node) {
                    self.root = child;
                }
            }
        }
        let removed = self.nodes[node.0]
            .take()
            .ok_or(ComponentError::NodeNotFound(node.0))?;
        Ok(removed)
    }

    /// 用 `new_child` 替换 `old_child`，被替换的节点变为未挂接
    pub fn replace_child(&mut self, parent: NodeId, old_child: NodeId, new_child: NodeId) {
        self.detach(new_child);
        if let Some(idx) = self[parent].children.iter().position(|c| *c == old_child) {
            self[parent].children[idx] = new_child;
            self[new_child].parent = Some(parent);
            self[old_child].parent = None;
        }
    }

    /// 把节点（连同其子树）从父节点上摘下
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self[node].parent.take() {
            self[parent].children.retain(|c| *c != node);
        } else if self.root == Some(node) {
            self.root = None;
        }
    }

    /// 移除所有子节点，返回原子节点列表
    pub fn remove_all_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self[node].children);
        for child in &children {
            self[*child].parent = None;
        }
        children
    }

    /// 删除节点及其整个子树
    pub fn remove_subtree(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.get_mut(id.0).and_then(Option::take) {
                stack.extend(removed.children);
            }
        }
    }

    /// 先序查找指定类型的节点
    ///
    /// 到达 `stop_types` 中类型的节点后不再向下搜索（该节点本身仍参与匹配）
    pub fn find_nodes(&self, start: NodeId, types: &[NodeType], stop_types: &[NodeType]) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.find_nodes_into(start, types, stop_types, &mut out);
        out
    }

    fn find_nodes_into(&self, id: NodeId, types: &[NodeType], stop_types: &[NodeType], out: &mut Vec<NodeId>) {
        let node_type = self.node_type(id);
        if types.contains(&node_type) {
            out.push(id);
        }
        if stop_types.contains(&node_type) {
            return;
        }
        for child in &self[id].children {
            self.find_nodes_into(*child, types, stop_types, out);
        }
    }

    /// 先序查找第一个指定类型的节点
    pub fn find_node(&self, start: NodeId, types: &[NodeType], stop_types: &[NodeType]) -> Option<NodeId> {
        let node_type = self.node_type(start);
        if types.contains(&node_type) {
            return Some(start);
        }
        if stop_types.contains(&node_type) {
            return None;
        }
        self[start]
            .children
            .iter()
            .find_map(|c| self.find_node(*c, types, stop_types))
    }

    /// 向上查找第一个指定类型的祖先（不含自身）
    pub fn find_parent(&self, start: NodeId, types: &[NodeType], stop_types: &[NodeType]) -> Option<NodeId> {
        let mut current = self.parent(start);
        while let Some(id) = current {
            let node_type = self.node_type(id);
            if types.contains(&node_type) {
                return Some(id);
            }
            if stop_types.contains(&node_type) {
                return None;
            }
            current = self.parent(id);
        }
        None
    }

    /// 从 `id` 到根的祖先序列（不含自身）
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// 子树中的全部节点（先序）
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self[n].children.iter().rev().copied());
        }
        out
    }

    /// 重新计算节点及其所有祖先的分组集合
    pub fn recompute_groups(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            self.recompute_local_groups(n);
            current = self.parent(n);
        }
    }

    /// 自底向上重新计算子树内所有节点的分组集合
    pub fn recompute_subtree_groups(&mut self, id: NodeId) {
        let children = self[id].children.clone();
        for child in children {
            self.recompute_subtree_groups(child);
        }
        self.recompute_local_groups(id);
    }

    fn recompute_local_groups(&mut self, id: NodeId) {
        let node = &self[id];
        if let NodeKind::Source { group, .. } = &node.kind {
            let mut groups = BTreeSet::new();
            groups.insert(group.clone());
            self[id].groups = groups;
            return;
        }
        if node.children.is_empty() {
            return;
        }
        let groups: BTreeSet<GroupSymbol> = node
            .children
            .iter()
            .flat_map(|c| self[*c].groups.iter().cloned())
            .collect();
        self[id].groups = groups;
    }

    pub fn est_cardinality(&self, id: NodeId) -> Option<f64> {
        self[id].est_cardinality
    }

    pub fn set_est_cardinality(&mut self, id: NodeId, cardinality: f64) {
        self[id].est_cardinality = Some(cardinality);
    }

    pub fn est_col_stats(&self, id: NodeId) -> Option<&HashMap<ElementSymbol, ColStats>> {
        self[id].est_col_stats.as_ref()
    }

    pub fn set_est_col_stats(&mut self, id: NodeId, stats: HashMap<ElementSymbol, ColStats>) {
        self[id].est_col_stats = Some(stats);
    }

    /// 清除节点及其所有祖先上缓存的估算
    pub fn invalidate_estimates(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = &mut self[n];
            node.est_cardinality = None;
            node.est_col_stats = None;
            current = node.parent;
        }
    }

    /// 校验树结构：父子指针一致、每个节点只被引用一次、分组集合与子节点一致
    pub fn validate(&self) -> OptimizeResult<()> {
        let root = self.require_root()?;
        if self.try_node(root)?.parent.is_some() {
            return Err(ComponentError::invalid_plan_structure("根节点存在父节点").into());
        }
        let mut seen = BTreeSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return Err(ComponentError::invalid_plan_structure(format!(
                    "节点 {} 被多个父节点引用",
                    id
                ))
                .into());
            }
            for child in &self.try_node(id)?.children {
                if self.try_node(*child)?.parent != Some(id) {
                    return Err(ComponentError::invalid_plan_structure(format!(
                        "节点 {} 的父指针不一致",
                        child
                    ))
                    .into());
                }
                stack.push(*child);
            }
            self.validate_groups(id)?;
        }
        Ok(())
    }

    /// Source 节点的分组只含自身分组，其余带子节点的节点为子节点分组的并集
    fn validate_groups(&self, id: NodeId) -> OptimizeResult<()> {
        let node = self.try_node(id)?;
        let expected: BTreeSet<GroupSymbol> = match &node.kind {
            NodeKind::Source { group, .. } => [group.clone()].into_iter().collect(),
            _ if node.children.is_empty() => return Ok(()),
            _ => node
                .children
                .iter()
                .flat_map(|c| self[*c].groups.iter().cloned())
                .collect(),
        };
        if node.groups != expected {
            let actual: Vec<&str> = node.groups.iter().map(|g| g.name()).collect();
            let expected: Vec<&str> = expected.iter().map(|g| g.name()).collect();
            return Err(ComponentError::invalid_plan_structure(format!(
                "节点 {} 的分组 [{}] 与期望的 [{}] 不一致",
                id,
                actual.join(", "),
                expected.join(", ")
            ))
            .into());
        }
        Ok(())
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = &self[id];
        write!(f, "{}{}", "  ".repeat(depth), node.node_type().name())?;
        let desc = node.kind.describe();
        if !desc.is_empty() {
            write!(f, " {}", desc)?;
        }
        let groups: Vec<&str> = node.groups.iter().map(|g| g.name()).collect();
        write!(f, " groups=[{}]", groups.join(", "))?;
        if let Some(card) = node.est_cardinality {
            write!(f, " est={}", card)?;
        }
        writeln!(f)?;
        for child in &node.children {
            self.fmt_node(f, *child, depth + 1)?;
        }
        Ok(())
    }
}

impl Index<NodeId> for PlanTree {
    type Output = PlanNode;

    fn index(&self, id: NodeId) -> &PlanNode {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("计划节点 {} 不存在", id),
        }
    }
}

impl IndexMut<NodeId> for PlanTree {
    fn index_mut(&mut self, id: NodeId) -> &mut PlanNode {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("计划节点 {} 不存在", id),
        }
    }
}

impl fmt::Display for PlanTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => self.fmt_node(f, root, 0),
            None => writeln!(f, "<empty plan>"),
        }
    }
}
