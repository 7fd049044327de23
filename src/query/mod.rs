// 查询优化模块
//
// - metadata: 元数据接口与内存目录
// - capabilities: 数据源能力模型与查找器
// - optimizer: 帧工具、能力校验、代价估算、连接策略与访问模式校验
// - planner: 计划树与规则驱动的重写

pub mod capabilities;
pub mod metadata;
pub mod optimizer;
pub mod planner;

pub use planner::{optimize_plan, CommandContext, CommandKind, PlanTree, QueryOptimizer};
