//! 节点估算结果
//!
//! 基数使用 `UNKNOWN_VALUE`（-1）表示未知，未知值在算术中传播为未知。

use std::collections::HashMap;

use crate::core::types::ElementSymbol;
use crate::query::metadata::{is_unknown, UNKNOWN_VALUE};
use crate::query::planner::plan::ColStats;

/// 节点的基数与列统计估算
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeEstimate {
    pub cardinality: f64,
    pub col_stats: HashMap<ElementSymbol, ColStats>,
}

impl NodeEstimate {
    pub fn new(cardinality: f64) -> Self {
        Self {
            cardinality,
            col_stats: HashMap::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_VALUE)
    }

    pub fn with_col_stats(mut self, col_stats: HashMap<ElementSymbol, ColStats>) -> Self {
        self.col_stats = col_stats;
        self
    }

    pub fn is_unknown(&self) -> bool {
        is_unknown(self.cardinality)
    }
}

/// 两个估算值相乘，任一未知则结果未知
pub fn multiply(a: f64, b: f64) -> f64 {
    if is_unknown(a) || is_unknown(b) {
        UNKNOWN_VALUE
    } else {
        a * b
    }
}

/// 多个估算值求和，任一未知则结果未知
pub fn sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut total = 0.0;
    for v in values {
        if is_unknown(v) {
            return UNKNOWN_VALUE;
        }
        total += v;
    }
    total
}

/// 限制在 `[0, upper]` 范围内；`upper` 未知时只保证非负
pub fn clamp_to(value: f64, upper: f64) -> f64 {
    if is_unknown(value) {
        return UNKNOWN_VALUE;
    }
    if is_unknown(upper) {
        value.max(0.0)
    } else {
        value.clamp(0.0, upper)
    }
}
