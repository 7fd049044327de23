use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::query::optimizer::cost::CostModelConfig;
use crate::query::planner::rewrite::{CommandContext, CommandKind};

/// 规划过程的启发式阈值
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PlannerLimits {
    /// 单次优化允许执行的规则总次数，超过即视为规则循环
    pub max_rule_executions: usize,
    /// 连接区域内数据源数量不超过此值时枚举全部左深顺序，否则使用贪心算法
    pub exhaustive_join_bound: usize,
    /// 连接排序时未知基数的代替值，仅用于比较候选顺序
    pub unknown_cardinality_rank: f64,
}

impl Default for PlannerLimits {
    fn default() -> Self {
        Self {
            max_rule_executions: 10_000,
            exhaustive_join_bound: 6,
            unknown_cardinality_rank: 10_000.0,
        }
    }
}

/// 日志配置
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub dir: String,
    pub file: String,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "logs".to_string(),
            file: "fedplan".to_string(),
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_files: 5,
        }
    }
}

/// 优化器配置
///
/// 对应配置文件中的 `[cost]`、`[planner]`、`[log]` 三个段落
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// 是否复制全部传递条件（包括无法下推到目标数据源的条件）
    pub copy_all_criteria: bool,
    pub cost: CostModelConfig,
    pub planner: PlannerLimits,
    pub log: LogConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// 按配置生成一次规划使用的命令上下文
    pub fn command_context(&self, command_kind: CommandKind) -> CommandContext {
        CommandContext::new(command_kind)
            .with_copy_all_criteria(self.copy_all_criteria)
            .with_cost(self.cost)
            .with_limits(self.planner)
    }
}
