//! 条件（谓词）类型定义
//!
//! 解析完成后的条件树。除帧转换时的符号替换外，条件在优化过程中不可变。

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::expression::{Expression, SubqueryRef};
use crate::core::types::symbol::{ElementSymbol, GroupSymbol};

/// 比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOperator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOperator::Eq => "=",
            CompareOperator::Ne => "<>",
            CompareOperator::Lt => "<",
            CompareOperator::Le => "<=",
            CompareOperator::Gt => ">",
            CompareOperator::Ge => ">=",
        }
    }

    /// 是否为有序比较（< <= > >=）
    pub fn is_ordered(&self) -> bool {
        matches!(
            self,
            CompareOperator::Lt | CompareOperator::Le | CompareOperator::Gt | CompareOperator::Ge
        )
    }

    /// 交换左右操作数后的等价操作符
    pub fn reverse(&self) -> Self {
        match self {
            CompareOperator::Lt => CompareOperator::Gt,
            CompareOperator::Le => CompareOperator::Ge,
            CompareOperator::Gt => CompareOperator::Lt,
            CompareOperator::Ge => CompareOperator::Le,
            other => *other,
        }
    }
}

/// 复合条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompoundOperator {
    And,
    Or,
}

/// 子查询比较的量词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantifier {
    All,
    Some,
    Any,
}

/// 条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criteria {
    Compare {
        op: CompareOperator,
        left: Expression,
        right: Expression,
    },
    Match {
        left: Expression,
        pattern: Expression,
        escape: Option<char>,
        negated: bool,
    },
    IsNull {
        expr: Expression,
        negated: bool,
    },
    Set {
        expr: Expression,
        values: Vec<Expression>,
        negated: bool,
    },
    SubquerySet {
        expr: Expression,
        subquery: SubqueryRef,
        negated: bool,
    },
    Compound {
        op: CompoundOperator,
        operands: Vec<Criteria>,
    },
    Not(Box<Criteria>),
    SubqueryCompare {
        op: CompareOperator,
        quantifier: Quantifier,
        left: Expression,
        subquery: SubqueryRef,
    },
    Exists {
        subquery: SubqueryRef,
        negated: bool,
    },
    /// 依赖连接在运行期由另一侧结果集填充的 IN 谓词
    DependentSet {
        expr: Expression,
        value_source: String,
    },
}

impl Criteria {
    pub fn compare(left: impl Into<Expression>, op: CompareOperator, right: impl Into<Expression>) -> Self {
        Criteria::Compare {
            op,
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn eq(left: impl Into<Expression>, right: impl Into<Expression>) -> Self {
        Self::compare(left, CompareOperator::Eq, right)
    }

    pub fn and(operands: Vec<Criteria>) -> Self {
        Criteria::Compound {
            op: CompoundOperator::And,
            operands,
        }
    }

    pub fn or(operands: Vec<Criteria>) -> Self {
        Criteria::Compound {
            op: CompoundOperator::Or,
            operands,
        }
    }

    pub fn not(inner: Criteria) -> Self {
        Criteria::Not(Box::new(inner))
    }

    /// 拆分 AND 连接的子条件（递归展开嵌套 AND）
    pub fn conjuncts(&self) -> Vec<&Criteria> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Criteria>) {
        match self {
            Criteria::Compound {
                op: CompoundOperator::And,
                operands,
            } => operands.iter().for_each(|c| c.collect_conjuncts(out)),
            other => out.push(other),
        }
    }

    /// 按所有权拆分 AND 子条件
    pub fn into_conjuncts(self) -> Vec<Criteria> {
        match self {
            Criteria::Compound {
                op: CompoundOperator::And,
                operands,
            } => operands.into_iter().flat_map(Criteria::into_conjuncts).collect(),
            other => vec![other],
        }
    }

    /// 以 AND 组合多个条件；空列表返回 `None`
    pub fn combine(mut criteria: Vec<Criteria>) -> Option<Criteria> {
        match criteria.len() {
            0 => None,
            1 => criteria.pop(),
            _ => Some(Criteria::and(criteria)),
        }
    }

    pub fn for_each_element<F: FnMut(&ElementSymbol)>(&self, f: &mut F) {
        match self {
            Criteria::Compare { left, right, .. } => {
                left.for_each_element(f);
                right.for_each_element(f);
            }
            Criteria::Match { left, pattern, .. } => {
                left.for_each_element(f);
                pattern.for_each_element(f);
            }
            Criteria::IsNull { expr, .. } | Criteria::DependentSet { expr, .. } => {
                expr.for_each_element(f)
            }
            Criteria::Set { expr, values, .. } => {
                expr.for_each_element(f);
                values.iter().for_each(|v| v.for_each_element(f));
            }
            Criteria::SubquerySet { expr, .. } => expr.for_each_element(f),
            Criteria::Compound { operands, .. } => {
                operands.iter().for_each(|c| c.for_each_element(f))
            }
            Criteria::Not(inner) => inner.for_each_element(f),
            Criteria::SubqueryCompare { left, .. } => left.for_each_element(f),
            Criteria::Exists { .. } => {}
        }
    }

    pub fn replace_elements<F>(&mut self, f: &mut F)
    where
        F: FnMut(&ElementSymbol) -> Option<Expression>,
    {
        match self {
            Criteria::Compare { left, right, .. } => {
                left.replace_elements(f);
                right.replace_elements(f);
            }
            Criteria::Match { left, pattern, .. } => {
                left.replace_elements(f);
                pattern.replace_elements(f);
            }
            Criteria::IsNull { expr, .. } | Criteria::DependentSet { expr, .. } => {
                expr.replace_elements(f)
            }
            Criteria::Set { expr, values, .. } => {
                expr.replace_elements(f);
                values.iter_mut().for_each(|v| v.replace_elements(f));
            }
            Criteria::SubquerySet { expr, .. } => expr.replace_elements(f),
            Criteria::Compound { operands, .. } => {
                operands.iter_mut().for_each(|c| c.replace_elements(f))
            }
            Criteria::Not(inner) => inner.replace_elements(f),
            Criteria::SubqueryCompare { left, .. } => left.replace_elements(f),
            Criteria::Exists { .. } => {}
        }
    }

    pub fn elements(&self) -> Vec<ElementSymbol> {
        let mut out = Vec::new();
        self.for_each_element(&mut |e| out.push(e.clone()));
        out
    }

    pub fn groups(&self) -> BTreeSet<GroupSymbol> {
        let mut out = BTreeSet::new();
        self.for_each_element(&mut |e| {
            out.insert(e.group().clone());
        });
        out
    }

    /// 是否可以由引擎直接求值（不引用任何元素和子查询）
    pub fn is_evaluatable(&self) -> bool {
        match self {
            Criteria::Compare { left, right, .. } => left.is_evaluatable() && right.is_evaluatable(),
            Criteria::Match { left, pattern, .. } => {
                left.is_evaluatable() && pattern.is_evaluatable()
            }
            Criteria::IsNull { expr, .. } => expr.is_evaluatable(),
            Criteria::Set { expr, values, .. } => {
                expr.is_evaluatable() && values.iter().all(Expression::is_evaluatable)
            }
            Criteria::Compound { operands, .. } => operands.iter().all(Criteria::is_evaluatable),
            Criteria::Not(inner) => inner.is_evaluatable(),
            Criteria::SubquerySet { .. }
            | Criteria::SubqueryCompare { .. }
            | Criteria::Exists { .. }
            | Criteria::DependentSet { .. } => false,
        }
    }

    /// 若为两个不同分组元素之间的等值比较，返回这对元素
    pub fn equi_join_pair(&self) -> Option<(&ElementSymbol, &ElementSymbol)> {
        match self {
            Criteria::Compare {
                op: CompareOperator::Eq,
                left: Expression::Element(l),
                right: Expression::Element(r),
            } if l.group() != r.group() => Some((l, r)),
            _ => None,
        }
    }

    /// 条件中直接约束（与常量或其他表达式比较）的元素
    ///
    /// 只统计未取反、不在 OR 之下的比较、LIKE、IN、IS NULL 与依赖集合条件，
    /// 用于访问模式满足性判断
    pub fn constrained_elements(&self) -> Vec<ElementSymbol> {
        let mut out = Vec::new();
        for conjunct in self.conjuncts() {
            match conjunct {
                // 同一分组内的列比较不提供取值
                Criteria::Compare { left, right, .. } => {
                    if let Some(e) = left.as_element() {
                        if !right.groups().contains(e.group()) {
                            out.push(e.clone());
                        }
                    }
                    if let Some(e) = right.as_element() {
                        if !left.groups().contains(e.group()) {
                            out.push(e.clone());
                        }
                    }
                }
                Criteria::Match { left, .. }
                | Criteria::IsNull { expr: left, .. }
                | Criteria::Set { expr: left, .. }
                | Criteria::DependentSet { expr: left, .. } => {
                    if let Some(e) = left.as_element() {
                        out.push(e.clone());
                    }
                }
                _ => {}
            }
        }
        out
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Expression]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criteria::Compare { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Criteria::Match {
                left,
                pattern,
                escape,
                negated,
            } => {
                write!(f, "{}{} LIKE {}", left, if *negated { " NOT" } else { "" }, pattern)?;
                if let Some(c) = escape {
                    write!(f, " ESCAPE '{}'", c)?;
                }
                Ok(())
            }
            Criteria::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Criteria::Set {
                expr,
                values,
                negated,
            } => {
                write!(f, "{}{} IN (", expr, if *negated { " NOT" } else { "" })?;
                write_list(f, values)?;
                write!(f, ")")
            }
            Criteria::SubquerySet {
                expr,
                subquery,
                negated,
            } => write!(
                f,
                "{}{} IN ({})",
                expr,
                if *negated { " NOT" } else { "" },
                subquery.name
            ),
            Criteria::Compound { op, operands } => {
                let sep = match op {
                    CompoundOperator::And => " AND ",
                    CompoundOperator::Or => " OR ",
                };
                write!(f, "(")?;
                for (i, c) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sep)?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Criteria::Not(inner) => write!(f, "NOT ({})", inner),
            Criteria::SubqueryCompare {
                op,
                quantifier,
                left,
                subquery,
            } => {
                let q = match quantifier {
                    Quantifier::All => "ALL",
                    Quantifier::Some => "SOME",
                    Quantifier::Any => "ANY",
                };
                write!(f, "{} {} {} ({})", left, op.symbol(), q, subquery.name)
            }
            Criteria::Exists { subquery, negated } => {
                write!(f, "{}EXISTS ({})", if *negated { "NOT " } else { "" }, subquery.name)
            }
            Criteria::DependentSet { expr, value_source } => {
                write!(f, "{} IN (<dependent values from {}>)", expr, value_source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(name: &str) -> Expression {
        Expression::Element(ElementSymbol::parse(name).expect("非法元素名"))
    }

    #[test]
    fn test_conjuncts_flatten_nested_and() {
        let crit = Criteria::and(vec![
            Criteria::eq(e("pm1.g1.e1"), Expression::constant(1i64)),
            Criteria::and(vec![
                Criteria::eq(e("pm1.g1.e2"), Expression::constant(2i64)),
                Criteria::eq(e("pm1.g1.e3"), Expression::constant(3i64)),
            ]),
        ]);
        assert_eq!(crit.conjuncts().len(), 3);
        assert_eq!(crit.into_conjuncts().len(), 3);
    }

    #[test]
    fn test_equi_join_pair() {
        let join = Criteria::eq(e("pm1.g1.e1"), e("pm2.g1.e1"));
        assert!(join.equi_join_pair().is_some());
        let same_group = Criteria::eq(e("pm1.g1.e1"), e("pm1.g1.e2"));
        assert!(same_group.equi_join_pair().is_none());
    }

    #[test]
    fn test_constrained_elements_skip_or() {
        let crit = Criteria::and(vec![
            Criteria::eq(e("pm4.g1.e1"), Expression::constant("3")),
            Criteria::or(vec![
                Criteria::eq(e("pm4.g1.e2"), Expression::constant(1i64)),
                Criteria::eq(e("pm4.g1.e2"), Expression::constant(2i64)),
            ]),
        ]);
        let constrained = crit.constrained_elements();
        assert_eq!(constrained.len(), 1);
        assert_eq!(constrained[0].short_name(), "e1");
    }

    #[test]
    fn test_constrained_elements_same_group_compare() {
        let same_group = Criteria::eq(e("pm4.g1.e1"), e("pm4.g1.e2"));
        assert!(same_group.constrained_elements().is_empty());

        let cross_group = Criteria::eq(e("pm4.g1.e1"), e("pm1.g1.e1"));
        let constrained = cross_group.constrained_elements();
        assert_eq!(constrained.len(), 2);
        assert_eq!(constrained[0], ElementSymbol::parse("pm4.g1.e1").unwrap());
    }

    #[test]
    fn test_display() {
        let crit = Criteria::Match {
            left: e("pm1.g1.e1"),
            pattern: Expression::constant("a%"),
            escape: Some('\\'),
            negated: true,
        };
        assert_eq!(crit.to_string(), "pm1.g1.e1 NOT LIKE 'a%' ESCAPE '\\'");
    }
}
