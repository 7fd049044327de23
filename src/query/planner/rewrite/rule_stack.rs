//! 规则栈
//!
//! 有序的规则工作列表。栈顶的规则最先执行；规则可以把后续规则压到栈顶
//! （紧接着执行）或追加到栈底（最后执行）。

use std::collections::VecDeque;

use crate::query::planner::rewrite::rule_enum::RuleKind;

/// 规则栈
#[derive(Debug, Clone, Default)]
pub struct RuleStack {
    /// 队首为栈顶
    rules: VecDeque<RuleKind>,
}

impl RuleStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按默认顺序装载全部规则
    pub fn with_default_rules() -> Self {
        let mut stack = Self::new();
        for rule in RuleKind::default_sequence() {
            stack.add_last(rule);
        }
        stack
    }

    /// 压到栈顶，下一个执行
    pub fn push(&mut self, rule: RuleKind) {
        self.rules.push_front(rule);
    }

    /// 追加到栈底，最后执行
    pub fn add_last(&mut self, rule: RuleKind) {
        self.rules.push_back(rule);
    }

    /// 弹出栈顶规则
    pub fn pop(&mut self) -> Option<RuleKind> {
        self.rules.pop_front()
    }

    pub fn peek(&self) -> Option<&RuleKind> {
        self.rules.front()
    }

    pub fn contains(&self, rule: &RuleKind) -> bool {
        self.rules.contains(rule)
    }

    /// 移除栈中所有该规则
    pub fn remove(&mut self, rule: &RuleKind) {
        self.rules.retain(|r| r != rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleKind> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::planner::rewrite::access::{AccessPatternValidationRule, PlaceAccessRule};
    use crate::query::planner::rewrite::predicate_pushdown::PushSelectCriteriaRule;

    #[test]
    fn test_push_runs_next() {
        let mut stack = RuleStack::new();
        stack.add_last(RuleKind::PlaceAccess(PlaceAccessRule));
        stack.push(RuleKind::PushSelectCriteria(PushSelectCriteriaRule));
        stack.add_last(RuleKind::AccessPatternValidation(AccessPatternValidationRule));

        assert_eq!(stack.len(), 3);
        assert_eq!(stack.pop(), Some(RuleKind::PushSelectCriteria(PushSelectCriteriaRule)));
        assert_eq!(stack.pop(), Some(RuleKind::PlaceAccess(PlaceAccessRule)));
        assert_eq!(
            stack.pop(),
            Some(RuleKind::AccessPatternValidation(AccessPatternValidationRule))
        );
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_contains_and_remove() {
        let mut stack = RuleStack::with_default_rules();
        let rule = RuleKind::PushSelectCriteria(PushSelectCriteriaRule);
        assert!(stack.contains(&rule));
        stack.push(rule);
        stack.remove(&rule);
        assert!(!stack.contains(&rule));
        assert_eq!(stack.len(), 9);
    }

    #[test]
    fn test_default_order() {
        let stack = RuleStack::with_default_rules();
        assert_eq!(stack.peek(), Some(&RuleKind::PlaceAccess(PlaceAccessRule)));
        assert_eq!(
            stack.iter().last(),
            Some(&RuleKind::AccessPatternValidation(AccessPatternValidationRule))
        );
    }
}
