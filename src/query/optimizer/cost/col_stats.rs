//! 列统计解析
//!
//! 优先使用节点上已推导的 `ColStats`，缺失时回退到元数据中的元素统计。
//! 统计信息只是估算提示：元数据里查不到的元素按"无统计"处理。

use std::collections::HashMap;

use crate::core::types::{DataType, ElementSymbol, Value};
use crate::query::metadata::{ElementInfo, QueryMetadataInterface};
use crate::query::planner::plan::ColStats;

/// 列统计解析器
pub struct ColumnStatsResolver<'a> {
    metadata: &'a dyn QueryMetadataInterface,
    stats: Option<&'a HashMap<ElementSymbol, ColStats>>,
}

impl<'a> ColumnStatsResolver<'a> {
    pub fn new(
        metadata: &'a dyn QueryMetadataInterface,
        stats: Option<&'a HashMap<ElementSymbol, ColStats>>,
    ) -> Self {
        Self { metadata, stats }
    }

    fn node_stats(&self, element: &ElementSymbol) -> Option<&ColStats> {
        self.stats.and_then(|s| s.get(element))
    }

    fn info(&self, element: &ElementSymbol) -> Option<ElementInfo> {
        self.metadata.element_info(element).ok()
    }

    /// 不同值数量
    pub fn ndv(&self, element: &ElementSymbol) -> Option<f64> {
        self.node_stats(element)
            .and_then(|s| s.ndv)
            .or_else(|| self.info(element).and_then(|i| i.ndv))
            .filter(|v| *v > 0.0)
    }

    pub fn null_fraction(&self, element: &ElementSymbol) -> Option<f64> {
        self.node_stats(element)
            .and_then(|s| s.null_fraction)
            .or_else(|| self.info(element).and_then(|i| i.null_fraction))
            .map(|v| v.clamp(0.0, 1.0))
    }

    pub fn nullable(&self, element: &ElementSymbol) -> bool {
        self.info(element).map_or(true, |i| i.nullable)
    }

    pub fn data_type(&self, element: &ElementSymbol) -> Option<DataType> {
        self.info(element).map(|i| i.data_type)
    }

    /// 元素是否属于某个唯一键
    pub fn is_key_element(&self, element: &ElementSymbol) -> bool {
        self.metadata.is_key_element(element).unwrap_or(false)
    }

    /// 元素本身是否构成单列唯一键
    pub fn is_single_column_key(&self, element: &ElementSymbol) -> bool {
        self.metadata
            .covers_unique_key(element.group(), &[element.short_name()])
            .unwrap_or(false)
    }

    /// 数值化的统计边界
    ///
    /// 边界缺失、格式不符或与列类型不兼容时返回 `None`
    pub fn range(&self, element: &ElementSymbol) -> Option<(f64, f64)> {
        if let Some(stats) = self.node_stats(element) {
            if let (Some(min), Some(max)) = (&stats.min, &stats.max) {
                if let (Some(lo), Some(hi)) = (min.as_ordinal(), max.as_ordinal()) {
                    return Some((lo, hi));
                }
            }
        }
        let info = self.info(element)?;
        if !info.data_type.is_range_comparable() {
            return None;
        }
        let lo = Value::parse_as(info.data_type, info.min.as_deref()?)?.as_ordinal()?;
        let hi = Value::parse_as(info.data_type, info.max.as_deref()?)?.as_ordinal()?;
        Some((lo, hi))
    }

    /// 把常量映射到列的数轴上
    pub fn literal_ordinal(&self, element: &ElementSymbol, literal: &Value) -> Option<f64> {
        let column_type = self.data_type(element)?;
        match literal {
            Value::String(text) if column_type != DataType::String => {
                Value::parse_as(column_type, text)?.as_ordinal()
            }
            other => {
                let literal_type = other.data_type()?;
                let numeric = |t: DataType| matches!(t, DataType::Integer | DataType::Double);
                if literal_type == column_type || (numeric(literal_type) && numeric(column_type)) {
                    other.as_ordinal()
                } else {
                    None
                }
            }
        }
    }

    /// 列统计：节点已推导的统计优先，否则由元数据构造
    pub fn stats_for(&self, element: &ElementSymbol) -> ColStats {
        if let Some(stats) = self.node_stats(element) {
            return stats.clone();
        }
        match self.info(element) {
            Some(info) => ColStats {
                ndv: info.ndv,
                null_fraction: info.null_fraction,
                min: info
                    .min
                    .as_deref()
                    .and_then(|m| Value::parse_as(info.data_type, m)),
                max: info
                    .max
                    .as_deref()
                    .and_then(|m| Value::parse_as(info.data_type, m)),
            },
            None => ColStats::default(),
        }
    }
}
