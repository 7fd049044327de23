//! 代价模型配置模块
//!
//! 提供基数估算中使用的选择性常量与启发式系数
//!
//! ## 使用示例
//!
//! ```rust
//! use fedplan::query::optimizer::cost::CostModelConfig;
//!
//! // 使用默认配置
//! let config = CostModelConfig::default();
//!
//! // 自定义配置
//! let custom_config = CostModelConfig {
//!     like_selectivity: 0.25,
//!     ..Default::default()
//! };
//! assert_eq!(custom_config.unknown_selectivity, config.unknown_selectivity);
//! ```

use serde::{Deserialize, Serialize};

/// 代价模型配置
///
/// 所有选择性取值范围为 `[0, 1]`，表示满足条件的行所占比例。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostModelConfig {
    /// 缺省选择性
    ///
    /// 缺少统计信息时等值条件使用，统计边界无效时的区间比例也使用此值。默认值 1/3
    pub unknown_selectivity: f64,

    /// 非键列 LIKE 条件选择性。默认值 1/3
    pub like_selectivity: f64,

    /// 键列 LIKE 条件选择性。默认值 0.1
    ///
    /// 键列取值唯一，模式匹配命中的比例明显低于普通列
    pub like_key_selectivity: f64,

    /// 集合操作的重叠比例
    ///
    /// UNION 去重时从较小一侧扣除的重复比例，INTERSECT 保留的比例。默认值 0.5
    pub set_overlap_fraction: f64,

    /// 无法获得 NDV 时分组操作保留的比例。默认值 0.5
    pub group_reduction: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            unknown_selectivity: 1.0 / 3.0,
            like_selectivity: 1.0 / 3.0,
            like_key_selectivity: 0.1,
            set_overlap_fraction: 0.5,
            group_reduction: 0.5,
        }
    }
}

impl CostModelConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置缺省选择性
    pub fn with_unknown_selectivity(mut self, selectivity: f64) -> Self {
        self.unknown_selectivity = selectivity.clamp(0.0, 1.0);
        self
    }

    /// 设置 LIKE 选择性
    pub fn with_like_selectivity(mut self, selectivity: f64) -> Self {
        self.like_selectivity = selectivity.clamp(0.0, 1.0);
        self
    }

    /// 设置集合操作重叠比例
    pub fn with_set_overlap_fraction(mut self, fraction: f64) -> Self {
        self.set_overlap_fraction = fraction.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CostModelConfig::default();
        assert!((config.unknown_selectivity - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(config.like_key_selectivity, 0.1);
        assert_eq!(config.set_overlap_fraction, 0.5);
    }

    #[test]
    fn test_builder_pattern_clamps() {
        let config = CostModelConfig::new()
            .with_unknown_selectivity(2.0)
            .with_like_selectivity(0.2);
        assert_eq!(config.unknown_selectivity, 1.0);
        assert_eq!(config.like_selectivity, 0.2);
        assert_eq!(config.group_reduction, 0.5); // 默认
    }
}
