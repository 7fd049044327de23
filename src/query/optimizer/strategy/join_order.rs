//! 连接顺序优化器模块
//!
//! 基于代价的连接顺序优化，为连接区域选择左深连接顺序
//!
//! ## 算法支持
//!
//! - 动态规划（DP）：连接源数量不超过阈值时精确求解左深树的最优顺序
//! - 贪心算法：超过阈值时逐步加入使中间结果最小的连接源，优先有连接条件的一侧
//!
//! 代价为所有中间结果（含最终结果）的估算行数之和。一个左深前缀的行数只取决于
//! 前缀包含哪些连接源：各源行数之积乘以前缀内全部可用条件的选择性。
//!
//! 新顺序只有在严格更便宜时才替换现有顺序；平局保持现有顺序。
//! 带有前置要求（访问模式需要另一侧的等值连接条件才能满足）的连接源
//! 只能排在其前置连接源之后。

use std::collections::HashMap;

/// 连接源信息
#[derive(Debug, Clone)]
pub struct JoinSourceInfo {
    /// 估计行数（未知时由调用方替换为排序用的默认值）
    pub estimated_rows: f64,
    /// 必须先于该源加入的连接源（位掩码）
    pub prerequisites: u64,
}

impl JoinSourceInfo {
    /// 创建新的连接源信息
    pub fn new(estimated_rows: f64) -> Self {
        Self {
            estimated_rows,
            prerequisites: 0,
        }
    }

    /// 设置前置连接源
    pub fn with_prerequisites(mut self, prerequisites: u64) -> Self {
        self.prerequisites = prerequisites;
        self
    }
}

/// 连接条件
#[derive(Debug, Clone)]
pub struct JoinCondition {
    /// 条件引用的连接源（位掩码）
    pub sources: u64,
    /// 连接选择性（0.0 ~ 1.0）
    pub selectivity: f64,
}

impl JoinCondition {
    /// 创建新的连接条件
    pub fn new(sources: u64, selectivity: f64) -> Self {
        Self {
            sources,
            selectivity: selectivity.clamp(0.0, 1.0),
        }
    }

    fn applies_to(&self, mask: u64) -> bool {
        self.sources != 0 && self.sources & !mask == 0
    }

    fn connects(&self, mask: u64, next: u64) -> bool {
        self.sources & next != 0 && self.sources & mask != 0 && self.applies_to(mask | next)
    }
}

/// 优化方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationMethod {
    /// 动态规划
    DynamicProgramming,
    /// 贪心算法
    Greedy,
    /// 保持现有顺序
    Existing,
}

/// 连接顺序优化结果
#[derive(Debug, Clone)]
pub struct JoinOrderResult {
    /// 连接源下标的左深顺序
    pub order: Vec<usize>,
    /// 总估计代价
    pub total_cost: f64,
    /// 最终估计输出行数
    pub final_output_rows: f64,
    /// 产生该顺序的方法
    pub optimization_method: OptimizationMethod,
}

impl JoinOrderResult {
    /// 是否与给定顺序不同
    pub fn differs_from(&self, order: &[usize]) -> bool {
        self.order != order
    }
}

/// 连接顺序优化器
#[derive(Debug, Clone)]
pub struct JoinOrderOptimizer {
    /// 动态规划阈值（超过此值使用贪心算法）
    dp_threshold: usize,
}

/// 位掩码最多支持的连接源数量
const MAX_SOURCES: usize = 64;

impl JoinOrderOptimizer {
    /// 创建新的连接顺序优化器
    pub fn new(dp_threshold: usize) -> Self {
        Self { dp_threshold }
    }

    /// 设置DP阈值
    pub fn with_dp_threshold(mut self, threshold: usize) -> Self {
        self.dp_threshold = threshold;
        self
    }

    /// 优化连接顺序
    ///
    /// # 参数
    /// - `tables`: 参与连接的源，下标即位掩码中的位
    /// - `conditions`: 连接条件列表
    /// - `current`: 现有顺序
    pub fn optimize_join_order(
        &self,
        tables: &[JoinSourceInfo],
        conditions: &[JoinCondition],
        current: &[usize],
    ) -> JoinOrderResult {
        let existing = || {
            let (total_cost, final_output_rows) =
                order_cost(tables, conditions, current).unwrap_or((f64::INFINITY, f64::INFINITY));
            JoinOrderResult {
                order: current.to_vec(),
                total_cost,
                final_output_rows,
                optimization_method: OptimizationMethod::Existing,
            }
        };
        if tables.len() <= 1 || tables.len() > MAX_SOURCES {
            return existing();
        }

        let candidate = if tables.len() <= self.dp_threshold {
            self.optimize_with_dp(tables, conditions)
        } else {
            self.optimize_with_greedy(tables, conditions)
        };
        let current_result = existing();
        match candidate {
            Some(candidate) if candidate.total_cost < current_result.total_cost => {
                log::debug!(
                    "连接顺序 {:?} -> {:?}（{:?}，代价 {} -> {}）",
                    current,
                    candidate.order,
                    candidate.optimization_method,
                    current_result.total_cost,
                    candidate.total_cost
                );
                candidate
            }
            _ => current_result,
        }
    }

    /// 使用动态规划优化连接顺序
    fn optimize_with_dp(&self, tables: &[JoinSourceInfo], conditions: &[JoinCondition]) -> Option<JoinOrderResult> {
        let n = tables.len();
        // DP表：key = 连接源集合位掩码，value = (累计代价, 顺序)
        let mut dp: HashMap<u64, (f64, Vec<usize>)> = HashMap::new();

        for (i, table) in tables.iter().enumerate() {
            if table.prerequisites == 0 {
                dp.insert(1 << i, (0.0, vec![i]));
            }
        }

        for subset_size in 2..=n {
            for subset in generate_subsets(n, subset_size) {
                let rows = rows_for(tables, conditions, subset);
                let mut best: Option<(f64, Vec<usize>)> = None;
                for (i, table) in tables.iter().enumerate() {
                    let bit = 1u64 << i;
                    if subset & bit == 0 {
                        continue;
                    }
                    let rest = subset ^ bit;
                    if table.prerequisites & !rest != 0 {
                        continue;
                    }
                    if let Some((rest_cost, rest_order)) = dp.get(&rest) {
                        let cost = rest_cost + rows;
                        if best.as_ref().map_or(true, |(b, _)| cost < *b) {
                            let mut order = rest_order.clone();
                            order.push(i);
                            best = Some((cost, order));
                        }
                    }
                }
                if let Some(solution) = best {
                    dp.insert(subset, solution);
                }
            }
        }

        let full_set = full_mask(n);
        dp.remove(&full_set).map(|(total_cost, order)| JoinOrderResult {
            order,
            total_cost,
            final_output_rows: rows_for(tables, conditions, full_set),
            optimization_method: OptimizationMethod::DynamicProgramming,
        })
    }

    /// 使用贪心算法优化连接顺序
    fn optimize_with_greedy(&self, tables: &[JoinSourceInfo], conditions: &[JoinCondition]) -> Option<JoinOrderResult> {
        let n = tables.len();
        // 选择起始源（行数最少且没有前置要求）
        let start = (0..n)
            .filter(|i| tables[*i].prerequisites == 0)
            .min_by(|a, b| tables[*a].estimated_rows.total_cmp(&tables[*b].estimated_rows))?;

        let mut order = vec![start];
        let mut mask = 1u64 << start;
        let mut total_cost = 0.0;

        while order.len() < n {
            // 贪心选择下一个源：优先有连接条件相连的源，其次中间结果最小
            let next = (0..n)
                .filter(|i| mask & (1 << i) == 0 && tables[*i].prerequisites & !mask == 0)
                .map(|i| {
                    let bit = 1u64 << i;
                    let connected = conditions.iter().any(|c| c.connects(mask, bit));
                    (i, !connected, rows_for(tables, conditions, mask | bit))
                })
                .min_by(|a, b| a.1.cmp(&b.1).then(a.2.total_cmp(&b.2)))?;
            order.push(next.0);
            mask |= 1 << next.0;
            total_cost += next.2;
        }

        Some(JoinOrderResult {
            order,
            total_cost,
            final_output_rows: rows_for(tables, conditions, mask),
            optimization_method: OptimizationMethod::Greedy,
        })
    }
}

/// 计算给定左深顺序的代价与输出行数；违反前置要求时返回 `None`
pub fn order_cost(tables: &[JoinSourceInfo], conditions: &[JoinCondition], order: &[usize]) -> Option<(f64, f64)> {
    let mut mask = 0u64;
    let mut cost = 0.0;
    for (step, index) in order.iter().enumerate() {
        let table = tables.get(*index)?;
        if table.prerequisites & !mask != 0 {
            return None;
        }
        mask |= 1 << index;
        if step > 0 {
            cost += rows_for(tables, conditions, mask);
        }
    }
    Some((cost, rows_for(tables, conditions, mask)))
}

/// 连接源集合的估算行数
fn rows_for(tables: &[JoinSourceInfo], conditions: &[JoinCondition], mask: u64) -> f64 {
    let rows: f64 = tables
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, t)| t.estimated_rows)
        .product();
    conditions
        .iter()
        .filter(|c| c.applies_to(mask))
        .fold(rows, |acc, c| acc * c.selectivity)
}

fn full_mask(n: usize) -> u64 {
    if n >= MAX_SOURCES {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}

/// 生成指定大小的子集
fn generate_subsets(n: usize, k: usize) -> Vec<u64> {
    let mut result = Vec::new();
    generate_subsets_recursive(0, n, k, 0, &mut result);
    result
}

fn generate_subsets_recursive(start: usize, n: usize, k: usize, current: u64, result: &mut Vec<u64>) {
    if k == 0 {
        result.push(current);
        return;
    }
    for i in start..n {
        generate_subsets_recursive(i + 1, n, k - 1, current | (1 << i), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(rows: &[f64]) -> Vec<JoinSourceInfo> {
        rows.iter().map(|r| JoinSourceInfo::new(*r)).collect()
    }

    #[test]
    fn test_keeps_existing_order_on_tie() {
        let t = tables(&[10.0, 10.0]);
        let optimizer = JoinOrderOptimizer::new(6);
        let result = optimizer.optimize_join_order(&t, &[], &[0, 1]);
        assert_eq!(result.order, vec![0, 1]);
        assert_eq!(result.optimization_method, OptimizationMethod::Existing);
    }

    #[test]
    fn test_dp_avoids_cross_product() {
        // 0-1 与 1-2 之间有选择性很高的条件，0 与 2 之间没有条件
        let t = tables(&[1000.0, 10.0, 1000.0]);
        let conditions = vec![
            JoinCondition::new(0b011, 0.001),
            JoinCondition::new(0b110, 0.001),
        ];
        let optimizer = JoinOrderOptimizer::new(6);
        let result = optimizer.optimize_join_order(&t, &conditions, &[0, 2, 1]);
        assert_eq!(result.optimization_method, OptimizationMethod::DynamicProgramming);
        assert!(result.differs_from(&[0, 2, 1]));
        assert_ne!(&result.order[..2], &[0, 2], "不应先做交叉连接");
        let (existing_cost, _) = order_cost(&t, &conditions, &[0, 2, 1]).unwrap();
        assert!(result.total_cost < existing_cost);
    }

    #[test]
    fn test_greedy_matches_bound() {
        let t = tables(&[1000.0, 10.0, 1000.0]);
        let conditions = vec![
            JoinCondition::new(0b011, 0.001),
            JoinCondition::new(0b110, 0.001),
        ];
        let optimizer = JoinOrderOptimizer::new(2);
        let result = optimizer.optimize_join_order(&t, &conditions, &[0, 2, 1]);
        assert_eq!(result.optimization_method, OptimizationMethod::Greedy);
        assert_eq!(result.order[0], 1, "贪心应从最小的源开始");
    }

    #[test]
    fn test_prerequisites_are_respected() {
        // 源 0 需要源 1 先加入
        let t = vec![
            JoinSourceInfo::new(1.0).with_prerequisites(0b10),
            JoinSourceInfo::new(1000.0),
        ];
        let conditions = vec![JoinCondition::new(0b11, 0.5)];
        assert!(order_cost(&t, &conditions, &[0, 1]).is_none());
        let optimizer = JoinOrderOptimizer::new(6);
        let result = optimizer.optimize_join_order(&t, &conditions, &[0, 1]);
        assert_eq!(result.order, vec![1, 0]);
    }
}
