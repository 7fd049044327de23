//! 集成测试共享工具模块
//!
//! 提供测试用的元数据目录、能力查找器与计划树构造函数

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

use std::sync::Arc;

use fedplan::core::types::{Criteria, ElementSymbol, GroupSymbol};
use fedplan::query::capabilities::CapabilitiesFinder;
use fedplan::query::metadata::QueryMetadataInterface;
use fedplan::query::planner::plan::{JoinType, NodeId, NodeKind, PlanTree};

/// 测试规划环境
pub struct TestPlanner {
    pub metadata: Arc<dyn QueryMetadataInterface>,
    pub finder: Arc<dyn CapabilitiesFinder>,
}

impl TestPlanner {
    /// 使用标准测试目录与全能力数据源
    pub fn new() -> Self {
        Self {
            metadata: Arc::new(fixtures::example_metadata()),
            finder: Arc::new(fixtures::full_capabilities()),
        }
    }

    pub fn with_finder(finder: impl CapabilitiesFinder + 'static) -> Self {
        Self {
            metadata: Arc::new(fixtures::example_metadata()),
            finder: Arc::new(finder),
        }
    }
}

/// 元素符号，`name` 形如 `pm1.g1.e1`
pub fn element(name: &str) -> ElementSymbol {
    ElementSymbol::parse(name).expect("元素名称格式应为 model.group.element")
}

pub fn group(name: &str) -> GroupSymbol {
    GroupSymbol::new(name)
}

/// 规范化计划的叶子：物理分组的 Source 节点
pub fn source(tree: &mut PlanTree, name: &str) -> NodeId {
    tree.add_node(NodeKind::source(group(name)))
}

/// 在 `child` 之上放置 Select 节点
pub fn select(tree: &mut PlanTree, child: NodeId, criteria: Criteria) -> NodeId {
    let select = tree.add_node(NodeKind::select(criteria));
    tree.add_child(select, child);
    select
}

/// 两个子节点之间的连接
pub fn join(
    tree: &mut PlanTree,
    join_type: JoinType,
    left: NodeId,
    right: NodeId,
    criteria: Vec<Criteria>,
) -> NodeId {
    let join = tree.add_node(NodeKind::join(join_type, criteria));
    tree.add_child(join, left);
    tree.add_child(join, right);
    join
}

/// 以 `child` 为输入、投影 `columns` 的根节点
pub fn project_root(tree: &mut PlanTree, child: NodeId, columns: &[&str]) -> NodeId {
    let project = tree.add_node(NodeKind::project(
        columns.iter().map(|c| element(c).into()).collect(),
    ));
    tree.add_child(project, child);
    tree.set_root(project);
    project
}

/// 查找包含指定分组的访问节点
pub fn access_for(tree: &PlanTree, group_name: &str) -> Option<NodeId> {
    let root = tree.root()?;
    tree.find_nodes(root, &[fedplan::query::planner::plan::NodeType::Access], &[])
        .into_iter()
        .find(|a| tree.node_groups(*a).contains(&group(group_name)))
}
