//! 优化器集成测试
//!
//! 测试范围:
//! - rewrite::plan_rewriter - 默认规则序列的完整执行
//! - rewrite::rule_stack - 自定义规则与执行上限
//! - config - 由配置文件生成命令上下文
//! - plan::explain - 计划描述输出

mod common;

use std::sync::Arc;

use common::assertions::{assert_node_type, assert_ok, assert_valid};
use common::fixtures::example_metadata;
use common::{access_for, element, join, project_root, select, source, TestPlanner};

use fedplan::config::Config;
use fedplan::core::error::{ComponentError, OptimizeError};
use fedplan::core::types::expression::SymbolMap;
use fedplan::core::types::{Criteria, Expression, Value};
use fedplan::query::capabilities::{BasicCapabilitiesFinder, Capability, SourceCapabilities};
use fedplan::query::planner::plan::{
    describe_plan, JoinStrategy, JoinType, NodeKind, NodeType, PlanTree,
};
use fedplan::query::planner::rewrite::{
    optimize_plan, CommandContext, CommandKind, QueryOptimizer, RuleKind, RuleStack,
};

/// Project(g1.e1) -> Select(g1.e2 = 4) -> Join(g1.e1 = g2.e1) -> [Source(pm1.g1), Source(pm1.g2)]
fn same_model_join() -> PlanTree {
    let mut tree = PlanTree::new();
    let g1 = source(&mut tree, "pm1.g1");
    let g2 = source(&mut tree, "pm1.g2");
    let j = join(
        &mut tree,
        JoinType::Inner,
        g1,
        g2,
        vec![Criteria::eq(element("pm1.g1.e1"), element("pm1.g2.e1"))],
    );
    let filtered = select(&mut tree, j, Criteria::eq(element("pm1.g1.e2"), Value::from(4i64)));
    project_root(&mut tree, filtered, &["pm1.g1.e1"]);
    tree
}

// ==================== 完整流程测试 ====================

#[test]
fn test_same_model_join_pushed_to_single_access() {
    let planner = TestPlanner::new();
    let tree = assert_ok(optimize_plan(
        same_model_join(),
        planner.metadata,
        planner.finder,
        CommandContext::default(),
    ));
    assert_valid(&tree);

    let root = tree.root().expect("计划应有根节点");
    assert_node_type(&tree, root, NodeType::Access);
    let accesses = tree.find_nodes(root, &[NodeType::Access], &[]);
    assert_eq!(accesses.len(), 1, "同一数据源上的整个查询应合并为一个访问节点");
    assert_eq!(tree.node_groups(root).len(), 2);
    assert!(tree.est_cardinality(root).is_some(), "根节点应带有估算基数");
}

#[test]
fn test_join_without_capability_stays_in_engine() {
    let caps = SourceCapabilities::full()
        .without(Capability::QueryFromJoinInner)
        .without(Capability::DependentJoin);
    let planner = TestPlanner::with_finder(BasicCapabilitiesFinder::new().with_default(caps));
    let tree = assert_ok(optimize_plan(
        same_model_join(),
        planner.metadata,
        planner.finder,
        CommandContext::default(),
    ));
    assert_valid(&tree);

    let root = tree.root().expect("计划应有根节点");
    let joins = tree.find_nodes(root, &[NodeType::Join], &[]);
    assert_eq!(joins.len(), 1);
    for child in tree.children(joins[0]) {
        assert_node_type(&tree, *child, NodeType::Access);
    }
    match tree.kind(joins[0]) {
        NodeKind::Join { strategy, .. } => assert_eq!(*strategy, Some(JoinStrategy::Merge)),
        other => panic!("unexpected node {:?}", other),
    }

    // 过滤条件下推到 pm1.g1 的访问节点之下
    let g1_access = access_for(&tree, "pm1.g1").expect("pm1.g1 应有访问节点");
    let selects = tree.find_nodes(g1_access, &[NodeType::Select], &[]);
    assert!(!selects.is_empty(), "过滤条件应进入访问节点");
}

#[test]
fn test_simple_view_is_merged() {
    // Project(vm1.g1.a) -> Source(vm1.g1) -> Project(pm1.g1.e1) -> Source(pm1.g1)
    let mut tree = PlanTree::new();
    let mut map = SymbolMap::new();
    map.insert(element("vm1.g1.a"), Expression::Element(element("pm1.g1.e1")));
    let view = tree.add_node(NodeKind::virtual_source(common::group("vm1.g1"), map));
    let inner = source(&mut tree, "pm1.g1");
    let definition = tree.add_node(NodeKind::project(vec![element("pm1.g1.e1").into()]));
    tree.add_child(definition, inner);
    tree.add_child(view, definition);
    project_root(&mut tree, view, &["vm1.g1.a"]);

    let planner = TestPlanner::new();
    let tree = assert_ok(optimize_plan(
        tree,
        planner.metadata,
        planner.finder,
        CommandContext::default(),
    ));
    assert_valid(&tree);

    let root = tree.root().expect("计划应有根节点");
    let sources = tree.find_nodes(root, &[NodeType::Source], &[]);
    assert_eq!(sources.len(), 1);
    assert!(
        matches!(tree.kind(sources[0]), NodeKind::Source { virtual_group: false, .. }),
        "虚拟分组应被展开"
    );
    assert!(!tree.node_groups(root).contains(&common::group("vm1.g1")));
}

// ==================== 规则栈测试 ====================

#[test]
fn test_rule_execution_ceiling() {
    let planner = TestPlanner::new();
    let mut config = Config::default();
    config.planner.max_rule_executions = 2;
    let mut tree = same_model_join();

    let result = QueryOptimizer::new().optimize(
        &mut tree,
        planner.metadata,
        planner.finder,
        config.command_context(CommandKind::Query),
    );
    match result {
        Err(OptimizeError::Component(ComponentError::RuleLimitExceeded { limit, last_rule })) => {
            assert_eq!(limit, 2);
            assert_eq!(last_rule, "PushSelectCriteriaRule");
        }
        other => panic!("应超过规则执行上限: {:?}", other),
    }
}

#[test]
fn test_custom_rule_stack() {
    let planner = TestPlanner::new();
    let mut rules = RuleStack::new();
    rules.push(RuleKind::CalculateCost(Default::default()));
    rules.push(RuleKind::PlaceAccess(Default::default()));
    let optimizer = QueryOptimizer::with_rules(rules);
    assert_eq!(optimizer.rules().len(), 2);

    let mut tree = PlanTree::new();
    let s = source(&mut tree, "pm1.g2");
    project_root(&mut tree, s, &["pm1.g2.e1"]);
    assert_ok(optimizer.optimize(
        &mut tree,
        planner.metadata,
        planner.finder,
        CommandContext::default(),
    ));

    let root = tree.root().expect("计划应有根节点");
    assert_node_type(&tree, root, NodeType::Project);
    assert_node_type(&tree, tree.first_child(root).unwrap_or(root), NodeType::Access);
    assert_eq!(tree.est_cardinality(root), Some(100.0));
}

// ==================== 配置与输出测试 ====================

#[test]
fn test_config_drives_command_context() {
    let config = Config::from_toml_str(
        r#"
copy_all_criteria = true

[planner]
max_rule_executions = 500
exhaustive_join_bound = 4
"#,
    )
    .expect("配置解析失败");
    let ctx = config.command_context(CommandKind::Delete { has_where: true });
    assert!(ctx.copy_all_criteria);
    assert_eq!(ctx.limits.max_rule_executions, 500);
    assert_eq!(ctx.limits.exhaustive_join_bound, 4);
    assert_eq!(ctx.command_kind, CommandKind::Delete { has_where: true });

    let tree = assert_ok(optimize_plan(
        same_model_join(),
        Arc::new(example_metadata()),
        Arc::new(common::fixtures::full_capabilities()),
        ctx,
    ));
    assert_valid(&tree);
}

#[test]
fn test_explain_lists_every_node() {
    let planner = TestPlanner::new();
    let tree = assert_ok(optimize_plan(
        same_model_join(),
        planner.metadata,
        planner.finder,
        CommandContext::default(),
    ));
    let root = tree.root().expect("计划应有根节点");
    let description = describe_plan(&tree);
    assert_eq!(description.plan_node_descs.len(), tree.subtree(root).len());
    assert_eq!(description.plan_node_descs[0].id, root.0);

    let json = tree.explain_json().expect("计划应能序列化为 JSON");
    assert!(json.contains("\"Access\""), "输出应包含访问节点: {}", json);
}
