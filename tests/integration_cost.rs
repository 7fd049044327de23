//! 代价估算集成测试
//!
//! 测试范围:
//! - optimizer::cost::estimator - 整棵树的基数估算与缓存
//! - optimizer::cost::selectivity - 唯一键识别、OR/NOT 的边界
//! - query::metadata - 基数更新后的重新估算

mod common;

use std::sync::Arc;

use common::assertions::assert_ok;
use common::fixtures::example_metadata;
use common::{element, join, select, source};

use fedplan::core::types::{CompareOperator, Criteria, Value};
use fedplan::query::metadata::{is_unknown, MetadataStore, UNKNOWN_VALUE};
use fedplan::query::optimizer::cost::{CostEstimator, CostModelConfig};
use fedplan::query::planner::plan::{JoinType, NodeId, NodeKind, PlanTree};

fn estimator(md: MetadataStore) -> CostEstimator {
    CostEstimator::new(Arc::new(md), CostModelConfig::default())
}

/// Select(criteria) -> Source(group)
fn filtered(group: &str, criteria: Criteria) -> (PlanTree, NodeId) {
    let mut tree = PlanTree::new();
    let s = source(&mut tree, group);
    let root = select(&mut tree, s, criteria);
    tree.set_root(root);
    (tree, root)
}

fn estimate(group: &str, criteria: Criteria) -> f64 {
    let (mut tree, root) = filtered(group, criteria);
    assert_ok(estimator(example_metadata()).compute_cost_for_tree(&mut tree, root))
}

// ==================== 唯一键测试 ====================

#[test]
fn test_compound_key_over_unknown_cardinality() {
    let p1 = Criteria::eq(element("pm4.g1.e1"), Value::from("3"));
    let p2 = Criteria::eq(element("pm4.g1.e2"), Value::from(2i64));

    let and = estimate("pm4.g1", Criteria::and(vec![p1.clone(), p2.clone()]));
    assert_eq!(and, 1.0, "覆盖复合键的 AND 条件应估算为 1 行");

    let or = estimate("pm4.g1", Criteria::or(vec![p1, p2]));
    assert_eq!(or, UNKNOWN_VALUE, "OR 条件不能识别唯一键");
}

#[test]
fn test_conjunct_order_does_not_change_estimate() {
    let a = Criteria::eq(element("pm1.g1.e2"), Value::from(4i64));
    let b = Criteria::compare(element("pm1.g1.e1"), CompareOperator::Gt, Value::from(10i64));
    let c = Criteria::IsNull {
        expr: element("pm1.g1.e3").into(),
        negated: true,
    };
    let first = estimate("pm1.g1", Criteria::and(vec![a.clone(), b.clone(), c.clone()]));
    let second = estimate("pm1.g1", Criteria::and(vec![c, a, b]));
    assert_eq!(first, second, "合取项的顺序不影响估算");
}

// ==================== 边界测试 ====================

#[test]
fn test_or_and_not_stay_within_bounds() {
    let rows = 1_000.0;
    let p = Criteria::eq(element("pm1.g1.e2"), Value::from(4i64));
    let q = Criteria::eq(element("pm1.g1.e1"), Value::from(1i64));
    let ep = estimate("pm1.g1", p.clone());
    let eq = estimate("pm1.g1", q.clone());
    assert!((ep - 100.0).abs() < 1e-9, "e2 有 10 个不同值，等值条件应保留十分之一");
    assert_eq!(eq, 1.0, "单列键的等值条件应估算为 1 行");

    let or = estimate("pm1.g1", Criteria::or(vec![p.clone(), q]));
    assert!(or >= ep.max(eq), "OR 的估算不应小于任一分支");
    assert!(or <= rows, "OR 的估算不应超过输入行数");

    let not = estimate("pm1.g1", Criteria::not(p));
    assert!((0.0..=rows).contains(&not));
}

#[test]
fn test_limit_over_unknown_child_uses_limit() {
    let mut tree = PlanTree::new();
    let s = source(&mut tree, "pm4.g1");
    let limit = tree.add_node(NodeKind::limit(Some(10), None));
    tree.add_child(limit, s);
    tree.set_root(limit);

    let est = estimator(example_metadata());
    assert_eq!(assert_ok(est.compute_cost_for_tree(&mut tree, limit)), 10.0);
    assert!(is_unknown(tree.est_cardinality(s).unwrap_or(UNKNOWN_VALUE)));
}

// ==================== 连接与缓存测试 ====================

#[test]
fn test_join_estimates() {
    let mut tree = PlanTree::new();
    let left = source(&mut tree, "pm1.g1");
    let right = source(&mut tree, "pm1.g2");
    let cross = join(&mut tree, JoinType::Cross, left, right, vec![]);
    tree.set_root(cross);
    let est = estimator(example_metadata());
    assert_eq!(assert_ok(est.compute_cost_for_tree(&mut tree, cross)), 100_000.0);

    let mut tree = PlanTree::new();
    let left = source(&mut tree, "pm1.g1");
    let right = source(&mut tree, "pm1.g2");
    let inner = join(
        &mut tree,
        JoinType::Inner,
        left,
        right,
        vec![Criteria::eq(element("pm1.g1.e1"), element("pm1.g2.e1"))],
    );
    tree.set_root(inner);
    let rows = assert_ok(est.compute_cost_for_tree(&mut tree, inner));
    assert!(rows > 0.0 && rows <= 1_000.0, "键连接的结果不超过较大一侧: {}", rows);
}

#[test]
fn test_cardinality_update_after_invalidation() {
    let md = example_metadata();
    let est = CostEstimator::new(Arc::new(md.clone()), CostModelConfig::default());
    let (mut tree, root) = filtered("pm1.g2", Criteria::eq(element("pm1.g2.e2"), Value::from(1i64)));
    let before = assert_ok(est.compute_cost_for_tree(&mut tree, root));
    assert!((before - 10.0).abs() < 1e-9);

    assert_ok(md.update_cardinality("pm1.g2", Some(500.0)));
    assert_eq!(
        assert_ok(est.compute_cost_for_tree(&mut tree, root)),
        before,
        "缓存的估算在失效前保持不变"
    );

    tree.invalidate_estimates(tree.first_child(root).unwrap_or(root));
    let after = assert_ok(est.compute_cost_for_tree(&mut tree, root));
    assert!((after - 50.0).abs() < 1e-9);
}
