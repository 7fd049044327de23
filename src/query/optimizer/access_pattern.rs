//! 访问模式校验
//!
//! 每个携带访问模式的 Access 节点，其子树中的 Select 条件与连接条件（包括依赖连接
//! 插入的依赖集合条件）必须约束某一个模式中的全部元素，否则查询没有合法计划。

use std::collections::BTreeSet;

use crate::core::error::{OptimizeResult, QueryPlannerError};
use crate::core::types::ElementSymbol;
use crate::query::planner::plan::{NodeId, NodeKind, NodeType, PlanTree};

/// 访问节点子树中被条件约束的元素
pub fn constrained_elements(tree: &PlanTree, access: NodeId) -> BTreeSet<ElementSymbol> {
    let mut out = BTreeSet::new();
    for node in tree.subtree(access) {
        match tree.kind(node) {
            NodeKind::Select { criteria, .. } => out.extend(criteria.constrained_elements()),
            NodeKind::Join { criteria, .. } => {
                for c in criteria {
                    out.extend(c.constrained_elements());
                }
            }
            _ => {}
        }
    }
    out
}

/// 用子树中的条件收缩单个访问节点的访问模式
///
/// 返回是否至少有一个模式被满足；没有访问模式的节点视为满足
pub fn satisfy_access_patterns(tree: &mut PlanTree, access: NodeId) -> bool {
    let constrained = constrained_elements(tree, access);
    match tree.kind_mut(access) {
        NodeKind::Access { access_patterns, .. } if !access_patterns.is_empty() => {
            let mut satisfied = false;
            for pattern in access_patterns.iter_mut() {
                satisfied |= pattern.satisfy(constrained.iter());
            }
            satisfied
        }
        _ => true,
    }
}

/// 校验整棵树的访问模式
pub fn validate_access_patterns(tree: &mut PlanTree, root: NodeId) -> OptimizeResult<()> {
    let accesses = tree.find_nodes(root, &[NodeType::Access], &[]);
    for access in accesses {
        if satisfy_access_patterns(tree, access) {
            continue;
        }
        let groups: Vec<String> = tree
            .find_nodes(access, &[NodeType::Source], &[NodeType::Source])
            .into_iter()
            .filter_map(|s| match tree.kind(s) {
                NodeKind::Source { group, .. } => Some(group.name().to_string()),
                _ => None,
            })
            .collect();
        let patterns: Vec<String> = match tree.kind(access) {
            NodeKind::Access { access_patterns, .. } => {
                access_patterns.iter().map(ToString::to_string).collect()
            }
            _ => Vec::new(),
        };
        log::debug!("访问节点 {} 的访问模式未满足: {:?}", access, patterns);
        return Err(QueryPlannerError::UnmetAccessPattern { groups, patterns }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Criteria, GroupSymbol, Value};
    use crate::query::planner::plan::AccessPattern;

    fn access_with_pattern(tree: &mut PlanTree, pattern: &[&str]) -> NodeId {
        let g = GroupSymbol::new("pm4.g1");
        let access = tree.add_node(NodeKind::Access {
            model: "pm4".to_string(),
            access_patterns: vec![AccessPattern::new(pattern.iter().map(|e| g.element(*e)).collect())],
            dependent: false,
            atomic_request: false,
        });
        let source = tree.add_node(NodeKind::source(g));
        tree.add_child(access, source);
        tree.set_root(access);
        access
    }

    #[test]
    fn test_unmet_pattern_message() {
        let mut tree = PlanTree::new();
        let access = access_with_pattern(&mut tree, &["e1"]);
        let err = validate_access_patterns(&mut tree, access).unwrap_err();
        assert!(err.is_planner_error());
        assert_eq!(
            err.to_string(),
            "Group has an access pattern which has not been met: group(s) [pm4.g1]; \
             access pattern(s) [Access Pattern: Unsatisfied [pm4.g1.e1] History [[pm4.g1.e1]]]"
        );
    }

    #[test]
    fn test_pattern_satisfied_by_select() {
        let mut tree = PlanTree::new();
        let access = access_with_pattern(&mut tree, &["e1"]);
        let source = tree.first_child(access).unwrap();
        let select = tree.add_node(NodeKind::select(Criteria::eq(
            GroupSymbol::new("pm4.g1").element("e1"),
            Value::from("3"),
        )));
        tree.add_as_parent(source, select);
        assert!(validate_access_patterns(&mut tree, access).is_ok());
    }

    #[test]
    fn test_partial_satisfaction_records_history() {
        let mut tree = PlanTree::new();
        let access = access_with_pattern(&mut tree, &["e1", "e2"]);
        let source = tree.first_child(access).unwrap();
        let select = tree.add_node(NodeKind::select(Criteria::eq(
            GroupSymbol::new("pm4.g1").element("e1"),
            Value::from("3"),
        )));
        tree.add_as_parent(source, select);
        let err = validate_access_patterns(&mut tree, access).unwrap_err();
        assert!(err.to_string().contains(
            "Access Pattern: Unsatisfied [pm4.g1.e2] History [[pm4.g1.e1, pm4.g1.e2], [pm4.g1.e2]]"
        ));
    }
}
