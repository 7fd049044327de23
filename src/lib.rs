//! fedplan - 联邦关系查询计划优化器
//!
//! 输入规范化的计划树、只读元数据接口、数据源能力查找器和单次查询的命令上下文，
//! 原地改写计划树：尽可能把操作下推到各数据源，选择连接顺序与连接算法
//! （包括依赖连接），校验数据源访问模式，并为每个节点附加基数估算。

pub mod config;
pub mod core;
pub mod query;
pub mod utils;
