//! 计划描述输出
//!
//! 把计划树展开为扁平的节点描述列表，便于以 JSON 形式输出诊断信息。

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::tree::PlanTree;

/// 节点描述键值对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pair {
    pub key: String,
    pub value: String,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// 计划节点描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNodeDescription {
    pub name: String,
    pub id: usize,
    pub groups: Vec<String>,
    pub description: Option<Vec<Pair>>,
    pub est_cardinality: Option<f64>,
    pub dependencies: Option<Vec<usize>>,
}

impl PlanNodeDescription {
    pub fn new(name: impl Into<String>, id: usize) -> Self {
        Self {
            name: name.into(),
            id,
            groups: Vec::new(),
            description: None,
            est_cardinality: None,
            dependencies: None,
        }
    }

    pub fn add_description(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.description
            .get_or_insert_with(Vec::new)
            .push(Pair::new(key, value));
    }

    pub fn with_description(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_description(key, value);
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<usize>) -> Self {
        self.dependencies = Some(deps);
        self
    }
}

/// 计划描述
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanDescription {
    pub plan_node_descs: Vec<PlanNodeDescription>,
    pub node_index_map: HashMap<usize, usize>,
}

impl PlanDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_desc(&mut self, desc: PlanNodeDescription) -> usize {
        let index = self.plan_node_descs.len();
        self.node_index_map.insert(desc.id, index);
        self.plan_node_descs.push(desc);
        index
    }

    pub fn get_node_desc(&self, node_id: usize) -> Option<&PlanNodeDescription> {
        self.node_index_map
            .get(&node_id)
            .and_then(|&index| self.plan_node_descs.get(index))
    }
}

/// 按先序生成整棵树的描述
pub fn describe_plan(tree: &PlanTree) -> PlanDescription {
    let mut plan = PlanDescription::new();
    if let Some(root) = tree.root() {
        for id in tree.subtree(root) {
            plan.add_node_desc(describe_node(tree, id));
        }
    }
    plan
}

fn describe_node(tree: &PlanTree, id: NodeId) -> PlanNodeDescription {
    let node = &tree[id];
    let mut desc = PlanNodeDescription::new(node.node_type().name(), id.0)
        .with_dependencies(node.children().iter().map(|c| c.0).collect());
    desc.groups = node.groups().iter().map(|g| g.name().to_string()).collect();
    desc.est_cardinality = node.est_cardinality();
    let detail = node.kind().describe();
    if !detail.is_empty() {
        desc.add_description("detail", detail);
    }
    if let Some(stats) = node.est_col_stats() {
        let ordered: BTreeMap<String, String> = stats
            .iter()
            .map(|(k, v)| (k.to_string(), format!("ndv={:?} nulls={:?}", v.ndv, v.null_fraction)))
            .collect();
        for (k, v) in ordered {
            desc.add_description(format!("stats.{}", k), v);
        }
    }
    desc
}

impl PlanTree {
    /// 以 JSON 形式输出计划
    pub fn explain_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&describe_plan(self))
    }
}
