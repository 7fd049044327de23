//! 选择性估计器模块
//!
//! 用于估算 Select 条件作用于已知（或未知）子节点基数后的输出行数。
//!
//! 两条路径：
//! - 复合键识别：顶层 AND 中未取反、不在 OR 之下的等值/IN/LIKE/IS NULL
//!   条件覆盖某个唯一键的全部列时，结果行数不超过各键列取值个数之积，
//!   即使子节点基数未知也能给出估算
//! - 独立选择性：逐个条件计算选择性，AND 相乘，OR 取补集之积的补，NOT 取补

use std::collections::{BTreeMap, HashMap};

use crate::core::error::MetadataResult;
use crate::core::types::criteria::{CompareOperator, CompoundOperator};
use crate::core::types::{Criteria, ElementSymbol, Expression, GroupSymbol};
use crate::query::metadata::{is_unknown, QueryMetadataInterface, UNKNOWN_VALUE};
use crate::query::optimizer::cost::col_stats::ColumnStatsResolver;
use crate::query::optimizer::cost::config::CostModelConfig;
use crate::query::optimizer::cost::estimate::clamp_to;
use crate::query::planner::plan::ColStats;

/// 选择性估计器
pub struct SelectivityEstimator<'a> {
    metadata: &'a dyn QueryMetadataInterface,
    resolver: ColumnStatsResolver<'a>,
    config: &'a CostModelConfig,
    child_cardinality: f64,
    /// 子节点只产生单个分组时，允许按该分组的唯一键识别
    key_group: Option<&'a GroupSymbol>,
}

impl<'a> SelectivityEstimator<'a> {
    /// 创建新的选择性估计器
    pub fn new(
        metadata: &'a dyn QueryMetadataInterface,
        config: &'a CostModelConfig,
        child_cardinality: f64,
        child_stats: Option<&'a HashMap<ElementSymbol, ColStats>>,
    ) -> Self {
        Self {
            metadata,
            resolver: ColumnStatsResolver::new(metadata, child_stats),
            config,
            child_cardinality,
            key_group: None,
        }
    }

    pub fn with_key_group(mut self, group: Option<&'a GroupSymbol>) -> Self {
        self.key_group = group;
        self
    }

    /// 估算条件过滤后的行数
    pub fn estimate_cardinality(&self, criteria: &Criteria) -> MetadataResult<f64> {
        let c = self.child_cardinality;
        if let Some(rows) = self.compound_key_estimate(criteria)? {
            log::trace!("条件 {} 覆盖唯一键，估算 {} 行", criteria, rows);
            return Ok(clamp_to(rows, c));
        }
        if is_unknown(c) {
            return Ok(UNKNOWN_VALUE);
        }
        Ok(clamp_to(c * self.selectivity(criteria), c))
    }

    /// 复合键识别
    ///
    /// 返回覆盖唯一键时的行数上界；任一覆盖条件被取反或位于 OR 之下时不参与覆盖
    fn compound_key_estimate(&self, criteria: &Criteria) -> MetadataResult<Option<f64>> {
        let Some(group) = self.key_group else {
            return Ok(None);
        };
        let mut covered: BTreeMap<ElementSymbol, f64> = BTreeMap::new();
        let mut equalities = Vec::new();

        for conjunct in criteria.conjuncts() {
            match conjunct {
                Criteria::Compare {
                    op: CompareOperator::Eq,
                    left,
                    right,
                } => match (left, right) {
                    (Expression::Element(l), Expression::Element(r)) => {
                        equalities.push((l.clone(), r.clone()));
                    }
                    (Expression::Element(e), other) | (other, Expression::Element(e))
                        if other.is_evaluatable() =>
                    {
                        bind(&mut covered, e, 1.0);
                    }
                    _ => {}
                },
                Criteria::Set {
                    expr: Expression::Element(e),
                    values,
                    negated: false,
                } if !values.is_empty() && values.iter().all(Expression::is_evaluatable) => {
                    bind(&mut covered, e, values.len() as f64);
                }
                Criteria::Match {
                    left: Expression::Element(e),
                    negated: false,
                    ..
                }
                | Criteria::IsNull {
                    expr: Expression::Element(e),
                    negated: false,
                } => bind(&mut covered, e, 1.0),
                _ => {}
            }
        }

        // 同一分组内的元素等值传递覆盖
        loop {
            let mut changed = false;
            for (l, r) in &equalities {
                if l.group() != r.group() {
                    continue;
                }
                let known_l = covered.get(l).copied();
                let known_r = covered.get(r).copied();
                match (known_l, known_r) {
                    (Some(m), None) => {
                        covered.insert(r.clone(), m);
                        changed = true;
                    }
                    (None, Some(m)) => {
                        covered.insert(l.clone(), m);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                break;
            }
        }

        let names: Vec<&str> = covered
            .keys()
            .filter(|e| e.group() == group)
            .map(|e| e.short_name())
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        let keys = self.metadata.unique_keys(group)?;
        let rows = keys
            .iter()
            .filter(|key| {
                !key.is_empty()
                    && key
                        .iter()
                        .all(|k| names.contains(&k.as_str()))
            })
            .map(|key| {
                key.iter()
                    .map(|k| {
                        covered
                            .iter()
                            .find(|(e, _)| e.group() == group && e.short_name() == k)
                            .map_or(1.0, |(_, m)| *m)
                    })
                    .product::<f64>()
            })
            .min_by(f64::total_cmp);
        Ok(rows)
    }

    /// 条件的选择性，结果位于 `[0, 1]`
    pub fn selectivity(&self, criteria: &Criteria) -> f64 {
        let s = match criteria {
            Criteria::Compare { op, left, right } => self.compare_selectivity(*op, left, right),
            Criteria::Match { left, negated, .. } => {
                let s = match left.as_element() {
                    Some(e) if self.resolver.is_key_element(e) => self.config.like_key_selectivity,
                    _ => self.config.like_selectivity,
                };
                negate(s, *negated)
            }
            Criteria::IsNull { expr, negated } => self.is_null_selectivity(expr, *negated),
            Criteria::Set {
                expr,
                values,
                negated,
            } => {
                let eq = match expr.as_element() {
                    Some(e) => self.eq_selectivity(e),
                    None => self.config.unknown_selectivity,
                };
                negate((eq * values.len() as f64).min(1.0), *negated)
            }
            Criteria::SubquerySet { negated, .. } | Criteria::Exists { negated, .. } => {
                negate(self.config.unknown_selectivity, *negated)
            }
            Criteria::SubqueryCompare { .. } | Criteria::DependentSet { .. } => {
                self.config.unknown_selectivity
            }
            Criteria::Compound {
                op: CompoundOperator::And,
                operands,
            } => {
                let mut parts: Vec<f64> = operands.iter().map(|c| self.selectivity(c)).collect();
                parts.sort_by(f64::total_cmp);
                parts.into_iter().product()
            }
            Criteria::Compound {
                op: CompoundOperator::Or,
                operands,
            } => {
                let mut parts: Vec<f64> =
                    operands.iter().map(|c| 1.0 - self.selectivity(c)).collect();
                parts.sort_by(f64::total_cmp);
                1.0 - parts.into_iter().product::<f64>()
            }
            Criteria::Not(inner) => 1.0 - self.selectivity(inner),
        };
        s.clamp(0.0, 1.0)
    }

    fn compare_selectivity(&self, op: CompareOperator, left: &Expression, right: &Expression) -> f64 {
        let (element, other, op) = match (left, right) {
            (Expression::Element(l), Expression::Element(r)) => {
                return match op {
                    CompareOperator::Eq => match (self.resolver.ndv(l), self.resolver.ndv(r)) {
                        (Some(a), Some(b)) => 1.0 / a.max(b),
                        (Some(a), None) | (None, Some(a)) => 1.0 / a,
                        (None, None) => self.config.unknown_selectivity,
                    },
                    CompareOperator::Ne => 1.0 - self.config.unknown_selectivity,
                    _ => self.config.unknown_selectivity,
                };
            }
            (Expression::Element(e), other) => (e, other, op),
            (other, Expression::Element(e)) => (e, other, op.reverse()),
            _ => return self.config.unknown_selectivity,
        };
        if !other.is_evaluatable() {
            return self.config.unknown_selectivity;
        }
        match op {
            CompareOperator::Eq => self.eq_selectivity(element),
            CompareOperator::Ne => 1.0 - self.eq_selectivity(element),
            ordered => self
                .range_fraction(element, other, ordered)
                .unwrap_or(self.config.unknown_selectivity),
        }
    }

    /// 等值选择性：单列唯一键按 1/c，其次 1/NDV，最后使用默认值
    fn eq_selectivity(&self, element: &ElementSymbol) -> f64 {
        let c = self.child_cardinality;
        if self.resolver.is_single_column_key(element) && !is_unknown(c) {
            return if c > 1.0 { 1.0 / c } else { 1.0 };
        }
        match self.resolver.ndv(element) {
            Some(ndv) => (1.0 / ndv).min(1.0),
            None => self.config.unknown_selectivity,
        }
    }

    /// 有序比较的区间比例；边界无效或类型不符时返回 `None`
    fn range_fraction(&self, element: &ElementSymbol, literal: &Expression, op: CompareOperator) -> Option<f64> {
        let value = literal.as_constant()?;
        let point = self.resolver.literal_ordinal(element, value)?;
        let (lo, hi) = self.resolver.range(element)?;
        if !(hi > lo) {
            return None;
        }
        let below = ((point - lo) / (hi - lo)).clamp(0.0, 1.0);
        match op {
            CompareOperator::Lt | CompareOperator::Le => Some(below),
            CompareOperator::Gt | CompareOperator::Ge => Some(1.0 - below),
            _ => None,
        }
    }

    fn is_null_selectivity(&self, expr: &Expression, negated: bool) -> f64 {
        let Some(element) = expr.as_element() else {
            return negate(self.config.unknown_selectivity, negated);
        };
        if !self.resolver.nullable(element) {
            return if negated { 1.0 } else { 0.0 };
        }
        let s = self
            .resolver
            .null_fraction(element)
            .unwrap_or(self.config.unknown_selectivity);
        negate(s, negated)
    }
}

fn bind(covered: &mut BTreeMap<ElementSymbol, f64>, element: &ElementSymbol, multiplicity: f64) {
    let entry = covered.entry(element.clone()).or_insert(multiplicity);
    *entry = entry.min(multiplicity);
}

fn negate(s: f64, negated: bool) -> f64 {
    if negated {
        1.0 - s
    } else {
        s
    }
}
