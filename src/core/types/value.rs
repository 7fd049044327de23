//! 常量值与数据类型

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 列与常量的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    Object,
}

impl DataType {
    /// 是否为可以做区间比例估算的有序数值类型
    pub fn is_range_comparable(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Double | DataType::Date)
    }
}

/// 常量值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Date(NaiveDate),
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Double(_) => Some(DataType::Double),
            Value::String(_) => Some(DataType::String),
            Value::Date(_) => Some(DataType::Date),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 映射到数轴上的位置，用于区间选择性计算
    ///
    /// 日期按公历天数映射；不可排序的类型返回 `None`
    pub fn as_ordinal(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Double(v) if v.is_finite() => Some(*v),
            Value::Date(d) => Some(d.num_days_from_ce() as f64),
            _ => None,
        }
    }

    /// 将元数据中以字符串保存的统计边界解析为指定类型的值
    ///
    /// 格式不符时返回 `None`，调用方应退回默认选择性
    pub fn parse_as(data_type: DataType, text: &str) -> Option<Value> {
        let text = text.trim();
        match data_type {
            DataType::Integer => text.parse::<i64>().ok().map(Value::Integer),
            DataType::Double => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Double),
            DataType::Boolean => text.parse::<bool>().ok().map(Value::Boolean),
            DataType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(Value::Date),
            DataType::String => Some(Value::String(text.to_string())),
            DataType::Object => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(v) => write!(f, "{}", v.to_string().to_uppercase()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "'{}'", v.replace('\'', "''")),
            Value::Date(v) => write!(f, "{{d'{}'}}", v.format("%Y-%m-%d")),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(Value::parse_as(DataType::Integer, "42"), Some(Value::Integer(42)));
        assert_eq!(Value::parse_as(DataType::Integer, "abc"), None);
        let d = Value::parse_as(DataType::Date, "2020-01-31").expect("日期解析失败");
        assert!(d.as_ordinal().is_some());
        assert_eq!(Value::parse_as(DataType::Date, "01/31/2020"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(Value::Boolean(true).to_string(), "TRUE");
    }
}
