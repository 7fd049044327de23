//! 元数据错误类型
//!
//! 元数据接口查找失败时返回，原样传播给优化器调用方，不做重试

use thiserror::Error;

/// 元数据错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// 分组不存在
    #[error("分组不存在: {0}")]
    GroupNotFound(String),

    /// 元素不存在
    #[error("元素不存在: {0}")]
    ElementNotFound(String),

    /// 模型不存在或未注册能力描述
    #[error("模型不存在: {0}")]
    ModelNotFound(String),

    /// 底层目录错误
    #[error("元数据目录错误: {0}")]
    Catalog(String),
}

/// 元数据结果类型
pub type MetadataResult<T> = Result<T, MetadataError>;

impl From<toml::de::Error> for MetadataError {
    fn from(err: toml::de::Error) -> Self {
        MetadataError::Catalog(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_error_display() {
        let err = MetadataError::GroupNotFound("pm9.g1".to_string());
        assert!(err.to_string().contains("pm9.g1"));
    }
}
