//! 表达式类型定义
//!
//! 已解析的标量表达式：元素引用、常量、函数、聚合、CASE 与标量子查询。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::criteria::Criteria;
use crate::core::types::symbol::{ElementSymbol, GroupSymbol};
use crate::core::types::value::Value;

/// 帧符号映射：外层可见的元素 → 内层表达式
pub type SymbolMap = BTreeMap<ElementSymbol, Expression>;

/// 聚合函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// 子查询引用
///
/// 子查询本身的规划不属于本模块；这里只记录子查询能否整体下推到
/// 某个模型（`model` 为 `None` 表示跨多个来源，只能在引擎内求值）。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubqueryRef {
    pub name: String,
    pub model: Option<String>,
}

impl SubqueryRef {
    pub fn new(name: impl Into<String>, model: Option<&str>) -> Self {
        Self {
            name: name.into(),
            model: model.map(str::to_string),
        }
    }
}

/// CASE 表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseExpression {
    /// CASE expr WHEN v THEN r ... END
    Simple {
        operand: Box<Expression>,
        whens: Vec<(Expression, Expression)>,
        otherwise: Option<Box<Expression>>,
    },
    /// CASE WHEN crit THEN r ... END
    Searched {
        whens: Vec<(Criteria, Expression)>,
        otherwise: Option<Box<Expression>>,
    },
}

/// 标量表达式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Element(ElementSymbol),
    Constant(Value),
    Function {
        name: String,
        args: Vec<Expression>,
        deterministic: bool,
    },
    Aggregate {
        func: AggregateFunction,
        arg: Option<Box<Expression>>,
        distinct: bool,
    },
    Case(CaseExpression),
    ScalarSubquery(SubqueryRef),
}

impl Expression {
    pub fn element(symbol: ElementSymbol) -> Self {
        Expression::Element(symbol)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    /// 确定性函数调用
    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            args,
            deterministic: true,
        }
    }

    pub fn as_element(&self) -> Option<&ElementSymbol> {
        match self {
            Expression::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Expression::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// 是否可以在下推前由引擎预先求值
    ///
    /// 不含元素引用、聚合、子查询且所有函数均为确定性函数
    pub fn is_evaluatable(&self) -> bool {
        match self {
            Expression::Constant(_) => true,
            Expression::Element(_) | Expression::Aggregate { .. } | Expression::ScalarSubquery(_) => {
                false
            }
            Expression::Function {
                args,
                deterministic,
                ..
            } => *deterministic && args.iter().all(Expression::is_evaluatable),
            Expression::Case(case) => match case {
                CaseExpression::Simple {
                    operand,
                    whens,
                    otherwise,
                } => {
                    operand.is_evaluatable()
                        && whens
                            .iter()
                            .all(|(w, t)| w.is_evaluatable() && t.is_evaluatable())
                        && otherwise.as_ref().map_or(true, |e| e.is_evaluatable())
                }
                CaseExpression::Searched { whens, otherwise } => {
                    whens
                        .iter()
                        .all(|(c, t)| c.is_evaluatable() && t.is_evaluatable())
                        && otherwise.as_ref().map_or(true, |e| e.is_evaluatable())
                }
            },
        }
    }

    /// 依次访问表达式中引用的所有元素
    pub fn for_each_element<F: FnMut(&ElementSymbol)>(&self, f: &mut F) {
        match self {
            Expression::Element(e) => f(e),
            Expression::Constant(_) | Expression::ScalarSubquery(_) => {}
            Expression::Function { args, .. } => args.iter().for_each(|a| a.for_each_element(f)),
            Expression::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.for_each_element(f);
                }
            }
            Expression::Case(CaseExpression::Simple {
                operand,
                whens,
                otherwise,
            }) => {
                operand.for_each_element(f);
                for (w, t) in whens {
                    w.for_each_element(f);
                    t.for_each_element(f);
                }
                if let Some(e) = otherwise {
                    e.for_each_element(f);
                }
            }
            Expression::Case(CaseExpression::Searched { whens, otherwise }) => {
                for (c, t) in whens {
                    c.for_each_element(f);
                    t.for_each_element(f);
                }
                if let Some(e) = otherwise {
                    e.for_each_element(f);
                }
            }
        }
    }

    /// 替换元素引用
    ///
    /// `f` 返回 `Some` 时用返回的表达式替换该元素，返回 `None` 时保持不变
    pub fn replace_elements<F>(&mut self, f: &mut F)
    where
        F: FnMut(&ElementSymbol) -> Option<Expression>,
    {
        match self {
            Expression::Element(e) => {
                if let Some(replacement) = f(e) {
                    *self = replacement;
                }
            }
            Expression::Constant(_) | Expression::ScalarSubquery(_) => {}
            Expression::Function { args, .. } => {
                args.iter_mut().for_each(|a| a.replace_elements(f))
            }
            Expression::Aggregate { arg, .. } => {
                if let Some(arg) = arg {
                    arg.replace_elements(f);
                }
            }
            Expression::Case(CaseExpression::Simple {
                operand,
                whens,
                otherwise,
            }) => {
                operand.replace_elements(f);
                for (w, t) in whens.iter_mut() {
                    w.replace_elements(f);
                    t.replace_elements(f);
                }
                if let Some(e) = otherwise {
                    e.replace_elements(f);
                }
            }
            Expression::Case(CaseExpression::Searched { whens, otherwise }) => {
                for (c, t) in whens.iter_mut() {
                    c.replace_elements(f);
                    t.replace_elements(f);
                }
                if let Some(e) = otherwise {
                    e.replace_elements(f);
                }
            }
        }
    }

    pub fn elements(&self) -> Vec<ElementSymbol> {
        let mut out = Vec::new();
        self.for_each_element(&mut |e| out.push(e.clone()));
        out
    }

    /// 表达式引用的分组集合
    pub fn groups(&self) -> BTreeSet<GroupSymbol> {
        let mut out = BTreeSet::new();
        self.for_each_element(&mut |e| {
            out.insert(e.group().clone());
        });
        out
    }

    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate { .. } => true,
            Expression::Function { args, .. } => args.iter().any(Expression::contains_aggregate),
            Expression::Case(CaseExpression::Simple {
                operand,
                whens,
                otherwise,
            }) => {
                operand.contains_aggregate()
                    || whens
                        .iter()
                        .any(|(w, t)| w.contains_aggregate() || t.contains_aggregate())
                    || otherwise.as_ref().map_or(false, |e| e.contains_aggregate())
            }
            Expression::Case(CaseExpression::Searched { whens, otherwise }) => {
                whens.iter().any(|(_, t)| t.contains_aggregate())
                    || otherwise.as_ref().map_or(false, |e| e.contains_aggregate())
            }
            _ => false,
        }
    }
}

impl From<ElementSymbol> for Expression {
    fn from(e: ElementSymbol) -> Self {
        Expression::Element(e)
    }
}

impl From<Value> for Expression {
    fn from(v: Value) -> Self {
        Expression::Constant(v)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Element(e) => write!(f, "{}", e),
            Expression::Constant(v) => write!(f, "{}", v),
            Expression::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expression::Aggregate {
                func,
                arg,
                distinct,
            } => match arg {
                Some(arg) if *distinct => write!(f, "{}(DISTINCT {})", func.name(), arg),
                Some(arg) => write!(f, "{}({})", func.name(), arg),
                None => write!(f, "{}(*)", func.name()),
            },
            Expression::Case(CaseExpression::Simple {
                operand,
                whens,
                otherwise,
            }) => {
                write!(f, "CASE {}", operand)?;
                for (w, t) in whens {
                    write!(f, " WHEN {} THEN {}", w, t)?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::Case(CaseExpression::Searched { whens, otherwise }) => {
                write!(f, "CASE")?;
                for (c, t) in whens {
                    write!(f, " WHEN {} THEN {}", c, t)?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expression::ScalarSubquery(s) => write!(f, "({})", s.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::symbol::GroupSymbol;

    #[test]
    fn test_evaluatable() {
        let g = GroupSymbol::new("pm1.g1");
        assert!(Expression::constant(1i64).is_evaluatable());
        assert!(Expression::function("concat", vec![Expression::constant("a")]).is_evaluatable());
        assert!(!Expression::element(g.element("e1")).is_evaluatable());
        let rand = Expression::Function {
            name: "rand".to_string(),
            args: vec![],
            deterministic: false,
        };
        assert!(!rand.is_evaluatable());
    }

    #[test]
    fn test_replace_elements() {
        let g = GroupSymbol::new("v1");
        let mut expr = Expression::function("upper", vec![Expression::element(g.element("a"))]);
        expr.replace_elements(&mut |e| {
            (e.short_name() == "a").then(|| Expression::element(GroupSymbol::new("pm1.g1").element("e1")))
        });
        assert_eq!(expr.to_string(), "upper(pm1.g1.e1)");
        assert_eq!(expr.groups().len(), 1);
    }
}
