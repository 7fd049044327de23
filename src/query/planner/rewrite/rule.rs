//! 优化规则 trait 定义
//!
//! 每条规则检查并原地改写计划树，可以把后续需要执行的规则压入规则栈。
//! 规则需要保证前进：再次压入自身之前必须消除触发它的前提条件。

use crate::core::error::OptimizeResult;
use crate::query::planner::plan::PlanTree;
use crate::query::planner::rewrite::context::RewriteContext;
use crate::query::planner::rewrite::rule_stack::RuleStack;

/// 优化规则 trait
///
/// 所有规则必须实现此 trait。
///
/// # 示例
/// ```rust
/// use fedplan::core::error::OptimizeResult;
/// use fedplan::query::planner::plan::PlanTree;
/// use fedplan::query::planner::rewrite::{OptimizerRule, RewriteContext, RuleStack};
///
/// #[derive(Debug)]
/// struct MyRule;
///
/// impl OptimizerRule for MyRule {
///     fn name(&self) -> &'static str { "MyRule" }
///
///     fn execute(&self, _tree: &mut PlanTree, _ctx: &mut RewriteContext, _rules: &mut RuleStack) -> OptimizeResult<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait OptimizerRule: std::fmt::Debug + Send + Sync {
    /// 规则名称
    fn name(&self) -> &'static str;

    /// 执行规则
    ///
    /// # 参数
    /// - `tree`: 计划树，原地改写
    /// - `ctx`: 重写上下文
    /// - `rules`: 规则栈，可压入后续规则
    ///
    /// # 返回
    /// - `Ok(())`: 执行完成（包括没有任何改动）
    /// - `Err(e)`: 元数据错误、规划错误或组件错误，直接传播给调用方
    fn execute(
        &self,
        tree: &mut PlanTree,
        ctx: &mut RewriteContext,
        rules: &mut RuleStack,
    ) -> OptimizeResult<()>;
}
