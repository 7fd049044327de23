//! 优化规则枚举 - 静态分发实现
//!
//! 该模块使用枚举实现静态分发，避免动态分发的开销。
//! 所有规则都作为枚举变体，通过 match 进行分发。
//!
//! # 优势
//!
//! - 无动态分发开销（无虚函数表查找）
//! - 无堆分配（规则存储在栈上）
//! - 规则栈可以按值比较、查找和移除规则

use crate::core::error::OptimizeResult;
use crate::query::planner::plan::PlanTree;
use crate::query::planner::rewrite::access;
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::cost;
use crate::query::planner::rewrite::join;
use crate::query::planner::rewrite::merge;
use crate::query::planner::rewrite::predicate_pushdown;
use crate::query::planner::rewrite::rule::OptimizerRule;
use crate::query::planner::rewrite::rule_stack::RuleStack;

macro_rules! define_rewrite_rules {
    (
        $(#[$enum_meta:meta])*
        pub enum $enum_name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant_name:ident($rule_type:ty)
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $(
                $(#[$variant_meta])*
                $variant_name($rule_type),
            )+
        }

        impl $enum_name {
            pub fn name(&self) -> &'static str {
                match self {
                    $(
                        $enum_name::$variant_name(_) => {
                            let type_name = stringify!($rule_type);
                            if let Some(pos) = type_name.rfind("::") {
                                &type_name[pos + 2..]
                            } else {
                                type_name
                            }
                        }
                    )+
                }
            }

            pub fn execute(
                &self,
                tree: &mut PlanTree,
                ctx: &mut RewriteContext,
                rules: &mut RuleStack,
            ) -> OptimizeResult<()> {
                match self {
                    $(
                        $enum_name::$variant_name(rule) => rule.execute(tree, ctx, rules),
                    )+
                }
            }
        }

        impl OptimizerRule for $enum_name {
            fn name(&self) -> &'static str {
                self.name()
            }

            fn execute(
                &self,
                tree: &mut PlanTree,
                ctx: &mut RewriteContext,
                rules: &mut RuleStack,
            ) -> OptimizeResult<()> {
                self.execute(tree, ctx, rules)
            }
        }
    };
}

define_rewrite_rules! {
    pub enum RuleKind {
        // ==================== 访问节点规则 ====================
        PlaceAccess(access::PlaceAccessRule),
        RaiseAccess(access::RaiseAccessRule),
        AccessPatternValidation(access::AccessPatternValidationRule),

        // ==================== 合并规则 ====================
        MergeVirtual(merge::MergeVirtualRule),

        // ==================== 条件下推规则 ====================
        PushSelectCriteria(predicate_pushdown::PushSelectCriteriaRule),
        CopyCriteria(predicate_pushdown::CopyCriteriaRule),

        // ==================== 连接规则 ====================
        PlanJoins(join::PlanJoinsRule),
        ChooseJoinStrategy(join::ChooseJoinStrategyRule),
        ChooseDependent(join::ChooseDependentRule),

        // ==================== 代价规则 ====================
        CalculateCost(cost::CalculateCostRule),
    }
}

impl RuleKind {
    /// 默认规则执行顺序
    pub fn default_sequence() -> [RuleKind; 10] {
        [
            RuleKind::PlaceAccess(access::PlaceAccessRule),
            RuleKind::MergeVirtual(merge::MergeVirtualRule),
            RuleKind::PushSelectCriteria(predicate_pushdown::PushSelectCriteriaRule),
            RuleKind::CopyCriteria(predicate_pushdown::CopyCriteriaRule),
            RuleKind::PlanJoins(join::PlanJoinsRule),
            RuleKind::RaiseAccess(access::RaiseAccessRule),
            RuleKind::ChooseJoinStrategy(join::ChooseJoinStrategyRule),
            RuleKind::ChooseDependent(join::ChooseDependentRule),
            RuleKind::CalculateCost(cost::CalculateCostRule),
            RuleKind::AccessPatternValidation(access::AccessPatternValidationRule),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_names() {
        for rule in RuleKind::default_sequence() {
            let name = rule.name();
            assert!(!name.is_empty());
            assert!(name.ends_with("Rule"), "规则名称应以 Rule 结尾: {}", name);
        }
        assert_eq!(
            RuleKind::PushSelectCriteria(predicate_pushdown::PushSelectCriteriaRule).name(),
            "PushSelectCriteriaRule"
        );
    }

    #[test]
    fn test_default_sequence_is_distinct() {
        let sequence = RuleKind::default_sequence();
        for (i, a) in sequence.iter().enumerate() {
            for b in &sequence[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
