//! 测试数据夹具
//!
//! 模型说明:
//! - `pm1`: 两个物理分组，`e1` 为主键
//! - `pm2`: 与 `pm1` 结构相同的另一个数据源
//! - `pm3`: 没有唯一键的分组
//! - `pm4`: `g1` 以 `(e1, e2)` 为复合键并声明访问模式 `[e1]`，`g2` 没有访问模式
//! - `vm1.g1`: 定义在 `pm1.g1` 上的视图

use fedplan::core::types::DataType;
use fedplan::query::capabilities::{BasicCapabilitiesFinder, SourceCapabilities};
use fedplan::query::metadata::{ElementRecord, GroupRecord, MetadataStore};

fn standard_group(name: &str, model: &str, cardinality: f64) -> GroupRecord {
    GroupRecord::new(name, model)
        .with_cardinality(cardinality)
        .element(ElementRecord::new("e1", DataType::Integer).not_null())
        .element(ElementRecord::new("e2", DataType::Integer).with_ndv(10.0))
        .element(ElementRecord::new("e3", DataType::String))
        .unique_key(&["e1"])
}

pub fn example_metadata() -> MetadataStore {
    MetadataStore::new()
        .with_group(standard_group("pm1.g1", "pm1", 1_000.0))
        .with_group(standard_group("pm1.g2", "pm1", 100.0))
        .with_group(standard_group("pm2.g1", "pm2", 1_000.0))
        .with_group(standard_group("pm2.g2", "pm2", 1_000.0))
        .with_group(
            GroupRecord::new("pm3.g1", "pm3")
                .with_cardinality(100.0)
                .element(ElementRecord::new("e1", DataType::Integer))
                .element(ElementRecord::new("e2", DataType::Integer)),
        )
        .with_group(
            GroupRecord::new("pm4.g1", "pm4")
                .element(ElementRecord::new("e1", DataType::String))
                .element(ElementRecord::new("e2", DataType::Integer))
                .element(ElementRecord::new("e3", DataType::String))
                .unique_key(&["e1", "e2"])
                .access_pattern(&["e1"]),
        )
        .with_group(
            GroupRecord::new("pm4.g2", "pm4")
                .with_cardinality(100.0)
                .element(ElementRecord::new("e1", DataType::String).not_null())
                .element(ElementRecord::new("e2", DataType::Integer))
                .unique_key(&["e1"]),
        )
        .with_group(GroupRecord::new("vm1.g1", "vm1").virtual_group())
}

pub fn full_capabilities() -> BasicCapabilitiesFinder {
    BasicCapabilitiesFinder::new().with_default(SourceCapabilities::full())
}

/// 不支持连接下推的数据源，连接由引擎执行
pub fn no_join_capabilities() -> BasicCapabilitiesFinder {
    use fedplan::query::capabilities::Capability;
    let caps = SourceCapabilities::full()
        .without(Capability::QueryFromJoinInner)
        .without(Capability::QueryFromJoinOuter);
    BasicCapabilitiesFinder::new().with_default(caps)
}
