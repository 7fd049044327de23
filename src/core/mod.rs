pub mod error;
pub mod types;

// 错误和结果类型
pub use error::{
    ComponentError, MetadataError, MetadataResult, OptimizeError, OptimizeResult,
    QueryPlannerError,
};

// 语言对象类型
pub use types::{
    AggregateFunction, CompareOperator, CompoundOperator, Criteria, DataType, ElementSymbol,
    Expression, GroupSymbol, Quantifier, SubqueryRef, Value,
};
