//! 下推能力校验
//!
//! 判断一个语言对象（表达式、条件、连接、集合操作、排序、限制、分组）能否整体
//! 下推到指定模型执行。结果只有"能"与"不能"，不能下推的部分由引擎在本地求值，
//! 这不是错误。元数据查找失败会原样返回。

use crate::core::error::OptimizeResult;
use crate::core::types::{
    AggregateFunction, CaseExpression, CompareOperator, CompoundOperator, Criteria, Expression,
    Quantifier, SubqueryRef,
};
use crate::query::capabilities::{Capability, CapabilitiesFinder, SourceCapabilities};
use crate::query::metadata::{QueryMetadataInterface, SearchType};
use crate::query::planner::plan::{JoinType, SetOperation, SortItem};

/// 可下推的语言对象
#[derive(Debug, Clone, Copy)]
pub enum LanguageObject<'a> {
    Expression(&'a Expression),
    Criteria(&'a Criteria),
    Join { join_type: JoinType, self_join: bool },
    SetOp { op: SetOperation },
    Distinct,
    OrderBy(&'a [SortItem]),
    Limit { limit: bool, offset: bool },
    GroupBy(&'a [Expression]),
}

/// 判断语言对象能否下推到 `model`
pub fn can_push_language_object(
    object: LanguageObject<'_>,
    model: &str,
    metadata: &dyn QueryMetadataInterface,
    finder: &dyn CapabilitiesFinder,
) -> OptimizeResult<bool> {
    let caps = finder.find_capabilities(model)?;
    let validator = CapabilityValidator {
        model,
        caps: &caps,
        metadata,
    };
    let result = validator.check(object)?;
    if !result {
        log::trace!("{:?} 无法下推到模型 {}", object, model);
    }
    Ok(result)
}

struct CapabilityValidator<'a> {
    model: &'a str,
    caps: &'a SourceCapabilities,
    metadata: &'a dyn QueryMetadataInterface,
}

impl CapabilityValidator<'_> {
    fn check(&self, object: LanguageObject<'_>) -> OptimizeResult<bool> {
        match object {
            LanguageObject::Expression(expr) => self.expression(expr),
            LanguageObject::Criteria(criteria) => self.criteria(criteria),
            LanguageObject::Join { join_type, self_join } => Ok(self.join(join_type, self_join)),
            LanguageObject::SetOp { op } => Ok(self.caps.supports(match op {
                SetOperation::Union => Capability::QueryUnion,
                SetOperation::Intersect => Capability::QueryIntersect,
                SetOperation::Except => Capability::QueryExcept,
            })),
            LanguageObject::Distinct => Ok(self.caps.supports(Capability::QuerySelectDistinct)),
            LanguageObject::OrderBy(items) => {
                if !self.caps.supports(Capability::QueryOrderby) {
                    return Ok(false);
                }
                self.all_expressions(items.iter().map(|i| &i.expr))
            }
            LanguageObject::Limit { limit, offset } => Ok((!limit
                || self.caps.supports(Capability::RowLimit))
                && (!offset || self.caps.supports(Capability::RowOffset))),
            LanguageObject::GroupBy(grouping) => {
                if !grouping.is_empty() && !self.caps.supports(Capability::QueryGroupBy) {
                    return Ok(false);
                }
                self.all_expressions(grouping.iter())
            }
        }
    }

    fn all_expressions<'e>(&self, exprs: impl Iterator<Item = &'e Expression>) -> OptimizeResult<bool> {
        for expr in exprs {
            if !self.expression(expr)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn join(&self, join_type: JoinType, self_join: bool) -> bool {
        let type_ok = match join_type {
            JoinType::Inner | JoinType::Cross => self.caps.supports(Capability::QueryFromJoinInner),
            JoinType::LeftOuter | JoinType::RightOuter => {
                self.caps.supports(Capability::QueryFromJoinOuter)
            }
            JoinType::FullOuter => {
                self.caps.supports(Capability::QueryFromJoinOuter)
                    && self.caps.supports(Capability::QueryFromJoinOuterFull)
            }
        };
        type_ok
            && (!self_join
                || (self.caps.supports(Capability::QueryFromJoinSelfjoin)
                    && self.caps.supports(Capability::QueryFromGroupAlias)))
    }

    fn expression(&self, expr: &Expression) -> OptimizeResult<bool> {
        if expr.is_evaluatable() {
            return Ok(true);
        }
        match expr {
            Expression::Element(_) | Expression::Constant(_) => Ok(true),
            Expression::Function {
                name,
                args,
                deterministic,
            } => {
                if !self.caps.supports_function(name) {
                    if !deterministic {
                        log::trace!("非确定性函数 {} 在本地逐行求值", name);
                    }
                    return Ok(false);
                }
                self.all_expressions(args.iter())
            }
            Expression::Aggregate { func, arg, distinct } => {
                if !self.aggregate(*func, arg.is_some(), *distinct) {
                    return Ok(false);
                }
                match arg {
                    Some(arg) => self.expression(arg),
                    None => Ok(true),
                }
            }
            Expression::Case(CaseExpression::Simple {
                operand,
                whens,
                otherwise,
            }) => {
                if !self.caps.supports(Capability::QueryCase) || !self.expression(operand)? {
                    return Ok(false);
                }
                for (when, then) in whens {
                    if !self.expression(when)? || !self.expression(then)? {
                        return Ok(false);
                    }
                }
                match otherwise {
                    Some(e) => self.expression(e),
                    None => Ok(true),
                }
            }
            Expression::Case(CaseExpression::Searched { whens, otherwise }) => {
                if !self.caps.supports(Capability::QuerySearchedCase) {
                    return Ok(false);
                }
                for (when, then) in whens {
                    if !self.criteria(when)? || !self.expression(then)? {
                        return Ok(false);
                    }
                }
                match otherwise {
                    Some(e) => self.expression(e),
                    None => Ok(true),
                }
            }
            Expression::ScalarSubquery(subquery) => Ok(self
                .caps
                .supports(Capability::QuerySubqueriesScalar)
                && self.same_model(subquery)),
        }
    }

    fn aggregate(&self, func: AggregateFunction, has_arg: bool, distinct: bool) -> bool {
        if distinct && !self.caps.supports(Capability::QueryAggregatesDistinct) {
            return false;
        }
        match func {
            AggregateFunction::Count => {
                if !has_arg {
                    self.caps.supports(Capability::QueryAggregatesCountStar)
                } else {
                    self.caps.supports(Capability::QueryAggregatesCount)
                        || (!distinct && self.caps.supports(Capability::QueryAggregatesCountStar))
                }
            }
            AggregateFunction::Sum => self.caps.supports(Capability::QueryAggregatesSum),
            AggregateFunction::Avg => self.caps.supports(Capability::QueryAggregatesAvg),
            AggregateFunction::Min => self.caps.supports(Capability::QueryAggregatesMin),
            AggregateFunction::Max => self.caps.supports(Capability::QueryAggregatesMax),
        }
    }

    /// 元素的可搜索性是否满足要求
    fn searchable(&self, expr: &Expression, check: fn(&SearchType) -> bool) -> OptimizeResult<bool> {
        match expr.as_element() {
            Some(element) => Ok(check(&self.metadata.element_info(element)?.search_type)),
            None => Ok(true),
        }
    }

    fn same_model(&self, subquery: &SubqueryRef) -> bool {
        subquery.model.as_deref() == Some(self.model)
    }

    fn criteria(&self, criteria: &Criteria) -> OptimizeResult<bool> {
        if criteria.is_evaluatable() {
            return Ok(true);
        }
        match criteria {
            Criteria::Compare { op, left, right } => {
                let flag = if op.is_ordered() {
                    Capability::CriteriaCompareOrdered
                } else {
                    Capability::CriteriaCompareEq
                };
                Ok(self.caps.supports(flag)
                    && self.searchable(left, SearchType::allows_comparison)?
                    && self.searchable(right, SearchType::allows_comparison)?
                    && self.expression(left)?
                    && self.expression(right)?)
            }
            Criteria::Match {
                left,
                pattern,
                escape,
                negated,
            } => Ok(self.caps.supports(Capability::CriteriaLike)
                && (escape.is_none() || self.caps.supports(Capability::CriteriaLikeEscape))
                && (!negated || self.caps.supports(Capability::CriteriaNot))
                && self.searchable(left, SearchType::allows_like)?
                && self.expression(left)?
                && self.expression(pattern)?),
            Criteria::IsNull { expr, negated } => Ok(self.caps.supports(Capability::CriteriaIsnull)
                && (!negated || self.caps.supports(Capability::CriteriaNot))
                && self.expression(expr)?),
            Criteria::Set {
                expr,
                values,
                negated,
            } => {
                if !self.caps.supports(Capability::CriteriaIn)
                    || (*negated && !self.caps.supports(Capability::CriteriaNot))
                {
                    return Ok(false);
                }
                if let Some(max) = self.caps.max_in_criteria_size() {
                    if values.len() > max {
                        return Ok(false);
                    }
                }
                Ok(self.searchable(expr, SearchType::allows_comparison)?
                    && self.expression(expr)?
                    && self.all_expressions(values.iter())?)
            }
            // 子查询必须由引擎求值
            Criteria::SubquerySet { .. } => Ok(false),
            Criteria::Compound { op, operands } => {
                if *op == CompoundOperator::Or && !self.caps.supports(Capability::CriteriaOr) {
                    return Ok(false);
                }
                for operand in operands {
                    if !self.criteria(operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Criteria::Not(inner) => {
                Ok(self.caps.supports(Capability::CriteriaNot) && self.criteria(inner)?)
            }
            Criteria::SubqueryCompare {
                op,
                quantifier,
                left,
                subquery,
            } => {
                let quantified = match quantifier {
                    Quantifier::All => Capability::CriteriaQuantifiedAll,
                    Quantifier::Some | Quantifier::Any => Capability::CriteriaQuantifiedSome,
                };
                let compare = if *op == CompareOperator::Eq || *op == CompareOperator::Ne {
                    Capability::CriteriaCompareEq
                } else {
                    Capability::CriteriaCompareOrdered
                };
                Ok(self.caps.supports(quantified)
                    && self.caps.supports(Capability::QuerySubqueriesScalar)
                    && self.caps.supports(compare)
                    && self.same_model(subquery)
                    && self.expression(left)?)
            }
            Criteria::Exists { subquery, negated } => Ok(self
                .caps
                .supports(Capability::CriteriaExists)
                && (!negated || self.caps.supports(Capability::CriteriaNot))
                && self.same_model(subquery)),
            Criteria::DependentSet { expr, .. } => {
                Ok(self.caps.supports(Capability::CriteriaIn) && self.expression(expr)?)
            }
        }
    }
}
