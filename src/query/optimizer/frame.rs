//! 帧与分组工具
//!
//! 定位连接源节点与条件的起源节点，并在帧（Source 节点）被替换、移除或
//! 重新挂接时改写祖先节点中的符号引用，使分组集合与子节点保持一致。
//!
//! 这些函数不返回错误：找不到节点是合法的查询形态，用 `None` 或空结果表示。

use std::collections::BTreeSet;

use crate::core::types::expression::SymbolMap;
use crate::core::types::{Criteria, Expression, GroupSymbol};
use crate::query::planner::plan::{NodeId, NodeKind, NodeType, PlanTree};

/// 可以作为条件起源的节点类型
const ORIGINATING_TYPES: [NodeType; 5] = [
    NodeType::Source,
    NodeType::Join,
    NodeType::SetOp,
    NodeType::Group,
    NodeType::Null,
];

/// 查找连接源节点
///
/// 从 `node` 沿 Select/Access 包装向上，返回作为连接直接子节点的最外层包装；
/// 不在连接之下的节点原样返回。
pub fn find_join_source_node(tree: &PlanTree, node: NodeId) -> NodeId {
    let mut current = node;
    loop {
        match tree.parent(current) {
            Some(parent) => match tree.node_type(parent) {
                NodeType::Join => return current,
                NodeType::Select | NodeType::Access => current = parent,
                _ => return node,
            },
            None => return node,
        }
    }
}

/// 查找条件的起源节点
///
/// 返回分组集合包含 `groups` 的最内层 Source/Join/SetOp/Group/Null 节点。
/// Access 节点本身不会被返回，但会继续搜索其下方。`groups` 为空时返回
/// 遇到的第一个候选节点。
pub fn find_originating_node(
    tree: &PlanTree,
    root: NodeId,
    groups: &BTreeSet<GroupSymbol>,
) -> Option<NodeId> {
    if !groups.is_subset(tree.node_groups(root)) {
        return None;
    }
    for child in tree.children(root) {
        if let Some(found) = find_originating_node(tree, *child, groups) {
            return Some(found);
        }
    }
    let node_type = tree.node_type(root);
    if ORIGINATING_TYPES.contains(&node_type) && groups.is_subset(tree.node_groups(root)) {
        Some(root)
    } else {
        None
    }
}

/// 复制并改写表达式
pub fn convert_expression(expr: &Expression, symbol_map: &SymbolMap) -> Expression {
    let mut out = expr.clone();
    convert_expression_in_place(&mut out, symbol_map);
    out
}

pub fn convert_expression_in_place(expr: &mut Expression, symbol_map: &SymbolMap) {
    expr.replace_elements(&mut |e| symbol_map.get(e).cloned());
}

/// 复制并改写条件
pub fn convert_criteria(criteria: &Criteria, symbol_map: &SymbolMap) -> Criteria {
    let mut out = criteria.clone();
    convert_criteria_in_place(&mut out, symbol_map);
    out
}

pub fn convert_criteria_in_place(criteria: &mut Criteria, symbol_map: &SymbolMap) {
    criteria.replace_elements(&mut |e| symbol_map.get(e).cloned());
}

/// 帧转换
///
/// 从 `start` 的父节点开始逐级向上，按 `symbol_map` 改写条件、投影、排序与分组表达式，
/// 并把各祖先分组集合中的 `old_group` 替换为 `new_groups`（`None` 表示仅移除）。
/// 到达外层 Source 帧时改写其符号映射后停止。返回访问过的祖先（自下而上）。
pub fn convert_frame(
    tree: &mut PlanTree,
    start: NodeId,
    old_group: &GroupSymbol,
    new_groups: Option<&BTreeSet<GroupSymbol>>,
    symbol_map: &SymbolMap,
) -> Vec<NodeId> {
    let mut visited = Vec::new();
    let mut current = tree.parent(start);
    while let Some(id) = current {
        visited.push(id);
        let at_frame = convert_node(tree, id, symbol_map);

        let mut groups = tree.node_groups(id).clone();
        if !at_frame {
            groups.remove(old_group);
            if let Some(new_groups) = new_groups {
                groups.extend(new_groups.iter().cloned());
            }
            tree.set_groups(id, groups);
        }
        tree.invalidate_estimates(id);

        if at_frame {
            break;
        }
        current = tree.parent(id);
    }
    log::trace!(
        "帧转换 {} -> {:?}，访问 {} 个祖先",
        old_group,
        new_groups.map(|g| g.iter().map(|s| s.name().to_string()).collect::<Vec<_>>()),
        visited.len()
    );
    visited
}

/// 改写单个节点的表达式，返回该节点是否为帧边界
fn convert_node(tree: &mut PlanTree, id: NodeId, symbol_map: &SymbolMap) -> bool {
    match tree.kind_mut(id) {
        NodeKind::Select { criteria, .. } => convert_criteria_in_place(criteria, symbol_map),
        NodeKind::Join { criteria, .. } => criteria
            .iter_mut()
            .for_each(|c| convert_criteria_in_place(c, symbol_map)),
        NodeKind::Project { columns } => columns
            .iter_mut()
            .for_each(|c| convert_expression_in_place(c, symbol_map)),
        NodeKind::Sort { items } => items
            .iter_mut()
            .for_each(|i| convert_expression_in_place(&mut i.expr, symbol_map)),
        NodeKind::Group {
            grouping,
            aggregates,
        } => grouping
            .iter_mut()
            .chain(aggregates.iter_mut())
            .for_each(|e| convert_expression_in_place(e, symbol_map)),
        NodeKind::Source { symbol_map: frame_map, .. } => {
            frame_map
                .values_mut()
                .for_each(|e| convert_expression_in_place(e, symbol_map));
            return true;
        }
        NodeKind::Access { .. }
        | NodeKind::SetOp { .. }
        | NodeKind::DupRemove
        | NodeKind::Null
        | NodeKind::Limit { .. } => {}
    }
    false
}
