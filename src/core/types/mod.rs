// 核心类型系统模块
//
// 包含优化器使用的语言对象：分组/元素符号、常量值、表达式与条件

pub mod symbol;
pub mod value;
pub mod expression;
pub mod criteria;

// 重新导出常用类型
pub use symbol::{ElementSymbol, GroupSymbol};
pub use value::{DataType, Value};
pub use expression::{AggregateFunction, CaseExpression, Expression, SubqueryRef};
pub use criteria::{CompareOperator, CompoundOperator, Criteria, Quantifier};
