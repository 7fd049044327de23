//! 访问模式集成测试
//!
//! 测试范围:
//! - optimizer::access_pattern - 访问模式的收缩与校验
//! - rewrite::access::validation - 按命令类型校验
//! - 完整优化流程中经依赖连接满足访问模式

mod common;

use common::assertions::{assert_err_with, assert_ok};
use common::{element, join, project_root, select, source, TestPlanner};

use fedplan::core::types::{Criteria, Value};
use fedplan::query::planner::plan::{JoinSide, JoinStrategy, JoinType, NodeKind, NodeType, PlanTree};
use fedplan::query::planner::rewrite::{optimize_plan, CommandContext, CommandKind};

const UNMET_PM4: &str = "Group has an access pattern which has not been met: group(s) [pm4.g1]; \
     access pattern(s) [Access Pattern: Unsatisfied [pm4.g1.e1] History [[pm4.g1.e1]]]";

/// 对 pm4.g1 的单表命令，`filter` 为 WHERE 子句
fn single_group_plan(filter: Option<Criteria>) -> PlanTree {
    let mut tree = PlanTree::new();
    let mut top = source(&mut tree, "pm4.g1");
    if let Some(criteria) = filter {
        top = select(&mut tree, top, criteria);
    }
    project_root(&mut tree, top, &["pm4.g1.e2"]);
    tree
}

fn plan(tree: PlanTree, kind: CommandKind) -> fedplan::core::error::OptimizeResult<PlanTree> {
    let planner = TestPlanner::new();
    optimize_plan(tree, planner.metadata, planner.finder, CommandContext::new(kind))
}

fn where_e1() -> Criteria {
    Criteria::eq(element("pm4.g1.e1"), Value::from("3"))
}

// ==================== 命令类型测试 ====================

#[test]
fn test_delete_without_where_fails() {
    let result = plan(single_group_plan(None), CommandKind::Delete { has_where: false });
    let err = result.expect_err("未满足访问模式的 DELETE 应失败");
    assert!(err.is_planner_error(), "应为规划错误: {:?}", err);
    assert_eq!(err.to_string(), UNMET_PM4);
}

#[test]
fn test_update_without_where_fails() {
    assert_err_with(
        plan(single_group_plan(None), CommandKind::Update { has_where: false }),
        UNMET_PM4,
    );
}

#[test]
fn test_query_without_criteria_fails() {
    assert_err_with(plan(single_group_plan(None), CommandKind::Query), UNMET_PM4);
}

#[test]
fn test_delete_and_update_with_where_succeed() {
    for kind in [
        CommandKind::Delete { has_where: true },
        CommandKind::Update { has_where: true },
        CommandKind::Query,
    ] {
        let tree = assert_ok(plan(single_group_plan(Some(where_e1())), kind));
        let root = tree.root().expect("计划应有根节点");
        match tree.kind(root) {
            NodeKind::Access { access_patterns, .. } => {
                assert!(
                    access_patterns.iter().any(|p| p.is_satisfied()),
                    "{:?} 的访问模式应被 WHERE 子句满足",
                    kind
                );
            }
            other => panic!("根节点应为访问节点: {:?}", other),
        }
    }
}

#[test]
fn test_insert_is_exempt() {
    assert_ok(plan(single_group_plan(None), CommandKind::Insert));
}

#[test]
fn test_where_on_other_column_does_not_satisfy() {
    let filter = Criteria::eq(element("pm4.g1.e2"), Value::from(2i64));
    assert_err_with(
        plan(single_group_plan(Some(filter)), CommandKind::Delete { has_where: true }),
        "Unsatisfied [pm4.g1.e1]",
    );
}

// ==================== 连接满足访问模式测试 ====================

#[test]
fn test_dependent_join_satisfies_pattern() {
    let mut tree = PlanTree::new();
    let provider = source(&mut tree, "pm1.g2");
    let pm4 = source(&mut tree, "pm4.g1");
    let j = join(
        &mut tree,
        JoinType::Inner,
        provider,
        pm4,
        vec![Criteria::eq(element("pm1.g2.e3"), element("pm4.g1.e1"))],
    );
    project_root(&mut tree, j, &["pm1.g2.e1", "pm4.g1.e2"]);

    let tree = assert_ok(plan(tree, CommandKind::Query));
    let root = tree.root().expect("计划应有根节点");
    let joins = tree.find_nodes(root, &[NodeType::Join], &[]);
    assert_eq!(joins.len(), 1);
    match tree.kind(joins[0]) {
        NodeKind::Join {
            strategy,
            dependent_side,
            ..
        } => {
            assert_eq!(*strategy, Some(JoinStrategy::Dependent));
            assert_eq!(*dependent_side, Some(JoinSide::Right), "带访问模式的一侧应作为依赖侧");
        }
        other => panic!("unexpected node {:?}", other),
    }
    let dependent = tree.children(joins[0])[1];
    assert!(matches!(tree.kind(dependent), NodeKind::Access { dependent: true, .. }));
}

#[test]
fn test_same_model_join_pushed_when_pattern_met_by_where() {
    let mut tree = PlanTree::new();
    let g1 = source(&mut tree, "pm4.g1");
    let g2 = source(&mut tree, "pm4.g2");
    let j = join(
        &mut tree,
        JoinType::Inner,
        g1,
        g2,
        vec![Criteria::eq(element("pm4.g1.e1"), element("pm4.g2.e1"))],
    );
    let filtered = select(&mut tree, j, where_e1());
    project_root(&mut tree, filtered, &["pm4.g1.e2", "pm4.g2.e2"]);

    let tree = assert_ok(plan(tree, CommandKind::Query));
    let root = tree.root().expect("计划应有根节点");
    let accesses = tree.find_nodes(root, &[NodeType::Access], &[]);
    assert_eq!(accesses.len(), 1, "同一模型的连接应整体下推:\n{}", tree);
    assert_eq!(accesses[0], root);
    assert!(matches!(tree.kind(root), NodeKind::Access { dependent: false, .. }));
    let joins = tree.find_nodes(root, &[NodeType::Join], &[]);
    assert_eq!(joins.len(), 1);
    assert!(!matches!(
        tree.kind(joins[0]),
        NodeKind::Join {
            strategy: Some(JoinStrategy::Dependent),
            ..
        }
    ));
}
