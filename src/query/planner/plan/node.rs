//! 计划节点定义
//!
//! 每种节点类型携带各自的强类型属性载荷，所有节点共享分组集合与估算属性。

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::access_pattern::AccessPattern;
use crate::core::types::expression::SymbolMap;
use crate::core::types::{Criteria, ElementSymbol, Expression, GroupSymbol, Value};

/// 计划树中的节点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 节点类型（不带载荷的判别值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Access,
    Source,
    Join,
    Select,
    Project,
    Group,
    Sort,
    SetOp,
    DupRemove,
    Null,
    Limit,
}

impl NodeType {
    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Access => "Access",
            NodeType::Source => "Source",
            NodeType::Join => "Join",
            NodeType::Select => "Select",
            NodeType::Project => "Project",
            NodeType::Group => "Group",
            NodeType::Sort => "Sort",
            NodeType::SetOp => "SetOp",
            NodeType::DupRemove => "DupRemove",
            NodeType::Null => "Null",
            NodeType::Limit => "Limit",
        }
    }
}

/// 连接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
}

impl JoinType {
    pub fn name(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Cross => "CROSS JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
        }
    }

    pub fn is_outer(&self) -> bool {
        matches!(
            self,
            JoinType::LeftOuter | JoinType::RightOuter | JoinType::FullOuter
        )
    }

    /// 内连接或交叉连接，可以参与连接重排
    pub fn is_reorderable(&self) -> bool {
        matches!(self, JoinType::Inner | JoinType::Cross)
    }

    /// 该侧（0 为左，1 为右）是否为外连接的非保留侧
    pub fn is_null_supplying_side(&self, side: usize) -> bool {
        match self {
            JoinType::LeftOuter => side == 1,
            JoinType::RightOuter => side == 0,
            JoinType::FullOuter => true,
            _ => false,
        }
    }
}

/// 连接执行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinStrategy {
    NestedLoop,
    Merge,
    /// 依赖连接：一侧的结果集在运行期参数化另一侧的访问
    Dependent,
}

/// 依赖连接中被参数化的一侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn index(&self) -> usize {
        match self {
            JoinSide::Left => 0,
            JoinSide::Right => 1,
        }
    }

    pub fn other(&self) -> JoinSide {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }
}

/// 集合操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SetOperation {
    Union,
    Intersect,
    Except,
}

impl SetOperation {
    pub fn name(&self) -> &'static str {
        match self {
            SetOperation::Union => "UNION",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::Except => "EXCEPT",
        }
    }
}

/// 排序项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    pub expr: Expression,
    pub ascending: bool,
}

impl SortItem {
    pub fn asc(expr: impl Into<Expression>) -> Self {
        Self {
            expr: expr.into(),
            ascending: true,
        }
    }

    pub fn desc(expr: impl Into<Expression>) -> Self {
        Self {
            expr: expr.into(),
            ascending: false,
        }
    }
}

/// 列统计估算
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColStats {
    /// 不同值数量
    pub ndv: Option<f64>,
    pub null_fraction: Option<f64>,
    pub min: Option<Value>,
    pub max: Option<Value>,
}

impl ColStats {
    /// 单值列（常量投影）
    pub fn single_value(value: Option<Value>) -> Self {
        Self {
            ndv: Some(1.0),
            null_fraction: Some(if matches!(value, Some(Value::Null)) { 1.0 } else { 0.0 }),
            min: value.clone(),
            max: value,
        }
    }
}

/// 节点载荷
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    /// 原子访问：其下子树作为一个请求下推到 `model`
    Access {
        model: String,
        access_patterns: Vec<AccessPattern>,
        /// 是否由依赖连接参数化
        dependent: bool,
        /// 是否已经确定为不可再拆分的请求
        atomic_request: bool,
    },
    /// 分组来源。虚拟分组（视图）的 `symbol_map` 把外部可见元素映射到内部表达式
    Source {
        group: GroupSymbol,
        #[serde(serialize_with = "serialize_symbol_map")]
        symbol_map: SymbolMap,
        virtual_group: bool,
    },
    Join {
        join_type: JoinType,
        criteria: Vec<Criteria>,
        strategy: Option<JoinStrategy>,
        /// 依赖连接的值来源标识
        dependent_value_source: Option<String>,
        dependent_side: Option<JoinSide>,
    },
    Select {
        criteria: Criteria,
        /// 由传递推导复制而来
        copied: bool,
        /// 依赖连接插入的参数化条件
        dependent: bool,
    },
    Project {
        columns: Vec<Expression>,
    },
    Group {
        grouping: Vec<Expression>,
        aggregates: Vec<Expression>,
    },
    Sort {
        items: Vec<SortItem>,
    },
    SetOp {
        op: SetOperation,
        all: bool,
    },
    DupRemove,
    Null,
    Limit {
        limit: Option<u64>,
        offset: Option<u64>,
    },
}

fn serialize_symbol_map<S>(map: &SymbolMap, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v.to_string())))
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Access { .. } => NodeType::Access,
            NodeKind::Source { .. } => NodeType::Source,
            NodeKind::Join { .. } => NodeType::Join,
            NodeKind::Select { .. } => NodeType::Select,
            NodeKind::Project { .. } => NodeType::Project,
            NodeKind::Group { .. } => NodeType::Group,
            NodeKind::Sort { .. } => NodeType::Sort,
            NodeKind::SetOp { .. } => NodeType::SetOp,
            NodeKind::DupRemove => NodeType::DupRemove,
            NodeKind::Null => NodeType::Null,
            NodeKind::Limit { .. } => NodeType::Limit,
        }
    }

    pub fn access(model: impl Into<String>) -> Self {
        NodeKind::Access {
            model: model.into(),
            access_patterns: Vec::new(),
            dependent: false,
            atomic_request: false,
        }
    }

    pub fn source(group: GroupSymbol) -> Self {
        NodeKind::Source {
            group,
            symbol_map: SymbolMap::new(),
            virtual_group: false,
        }
    }

    pub fn virtual_source(group: GroupSymbol, symbol_map: SymbolMap) -> Self {
        NodeKind::Source {
            group,
            symbol_map,
            virtual_group: true,
        }
    }

    pub fn join(join_type: JoinType, criteria: Vec<Criteria>) -> Self {
        NodeKind::Join {
            join_type,
            criteria,
            strategy: None,
            dependent_value_source: None,
            dependent_side: None,
        }
    }

    pub fn select(criteria: Criteria) -> Self {
        NodeKind::Select {
            criteria,
            copied: false,
            dependent: false,
        }
    }

    pub fn project(columns: Vec<Expression>) -> Self {
        NodeKind::Project { columns }
    }

    pub fn limit(limit: Option<u64>, offset: Option<u64>) -> Self {
        NodeKind::Limit { limit, offset }
    }

    /// 简短的属性描述，用于计划输出
    pub fn describe(&self) -> String {
        match self {
            NodeKind::Access {
                model,
                access_patterns,
                dependent,
                ..
            } => {
                let mut out = format!("model={}", model);
                if *dependent {
                    out.push_str(" dependent");
                }
                for ap in access_patterns {
                    out.push_str(&format!(" [{}]", ap));
                }
                out
            }
            NodeKind::Source {
                group,
                virtual_group,
                ..
            } => {
                if *virtual_group {
                    format!("{} (virtual)", group)
                } else {
                    group.to_string()
                }
            }
            NodeKind::Join {
                join_type,
                criteria,
                strategy,
                dependent_value_source,
                ..
            } => {
                let mut out = join_type.name().to_string();
                if !criteria.is_empty() {
                    let parts: Vec<String> = criteria.iter().map(|c| c.to_string()).collect();
                    out.push_str(&format!(" ON {}", parts.join(" AND ")));
                }
                if let Some(strategy) = strategy {
                    out.push_str(&format!(" strategy={:?}", strategy));
                }
                if let Some(source) = dependent_value_source {
                    out.push_str(&format!(" values={}", source));
                }
                out
            }
            NodeKind::Select { criteria, copied, dependent } => {
                let mut out = criteria.to_string();
                if *copied {
                    out.push_str(" (copied)");
                }
                if *dependent {
                    out.push_str(" (dependent)");
                }
                out
            }
            NodeKind::Project { columns } => join_display(columns),
            NodeKind::Group { grouping, aggregates } => {
                format!("by [{}] agg [{}]", join_display(grouping), join_display(aggregates))
            }
            NodeKind::Sort { items } => items
                .iter()
                .map(|i| format!("{} {}", i.expr, if i.ascending { "ASC" } else { "DESC" }))
                .collect::<Vec<_>>()
                .join(", "),
            NodeKind::SetOp { op, all } => {
                if *all {
                    format!("{} ALL", op.name())
                } else {
                    op.name().to_string()
                }
            }
            NodeKind::DupRemove | NodeKind::Null => String::new(),
            NodeKind::Limit { limit, offset } => {
                let mut out = String::new();
                if let Some(offset) = offset {
                    out.push_str(&format!("offset={} ", offset));
                }
                match limit {
                    Some(limit) => out.push_str(&format!("limit={}", limit)),
                    None => out.push_str("limit=ALL"),
                }
                out
            }
        }
    }
}

fn join_display(values: &[Expression]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 计划节点
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) groups: BTreeSet<GroupSymbol>,
    pub(crate) est_cardinality: Option<f64>,
    pub(crate) est_col_stats: Option<HashMap<ElementSymbol, ColStats>>,
}

impl PlanNode {
    pub(crate) fn new(kind: NodeKind) -> Self {
        let mut groups = BTreeSet::new();
        if let NodeKind::Source { group, .. } = &kind {
            groups.insert(group.clone());
        }
        Self {
            kind,
            children: Vec::new(),
            parent: None,
            groups,
            est_cardinality: None,
            est_col_stats: None,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn groups(&self) -> &BTreeSet<GroupSymbol> {
        &self.groups
    }

    pub fn est_cardinality(&self) -> Option<f64> {
        self.est_cardinality
    }

    pub fn est_col_stats(&self) -> Option<&HashMap<ElementSymbol, ColStats>> {
        self.est_col_stats.as_ref()
    }
}
