//! 能力查找器
//!
//! 根据模型标识返回该数据源的能力集合。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::SourceCapabilities;
use crate::core::error::{MetadataError, MetadataResult};

/// 能力查找器接口
pub trait CapabilitiesFinder: Send + Sync + fmt::Debug {
    fn find_capabilities(&self, model: &str) -> MetadataResult<Arc<SourceCapabilities>>;
}

/// 基于静态映射的查找器
///
/// 未注册的模型返回默认能力（若设置）或 `ModelNotFound`
#[derive(Debug, Default, Clone)]
pub struct BasicCapabilitiesFinder {
    models: HashMap<String, Arc<SourceCapabilities>>,
    default: Option<Arc<SourceCapabilities>>,
}

impl BasicCapabilitiesFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>, caps: SourceCapabilities) -> Self {
        self.models.insert(model.into(), Arc::new(caps));
        self
    }

    pub fn with_default(mut self, caps: SourceCapabilities) -> Self {
        self.default = Some(Arc::new(caps));
        self
    }
}

impl CapabilitiesFinder for BasicCapabilitiesFinder {
    fn find_capabilities(&self, model: &str) -> MetadataResult<Arc<SourceCapabilities>> {
        self.models
            .get(model)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| MetadataError::ModelNotFound(model.to_string()))
    }
}

/// 带缓存的查找器
///
/// 包装另一个查找器，按模型缓存查找结果，可在多个并发规划之间共享
#[derive(Debug)]
pub struct CachingCapabilitiesFinder<F: CapabilitiesFinder> {
    delegate: F,
    cache: Arc<DashMap<String, Arc<SourceCapabilities>>>,
}

impl<F: CapabilitiesFinder> CachingCapabilitiesFinder<F> {
    pub fn new(delegate: F) -> Self {
        Self {
            delegate,
            cache: Arc::new(DashMap::new()),
        }
    }

    pub fn cached_models(&self) -> usize {
        self.cache.len()
    }

    /// 清空缓存（数据源能力变更后调用）
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl<F: CapabilitiesFinder> CapabilitiesFinder for CachingCapabilitiesFinder<F> {
    fn find_capabilities(&self, model: &str) -> MetadataResult<Arc<SourceCapabilities>> {
        if let Some(caps) = self.cache.get(model) {
            return Ok(caps.clone());
        }
        let caps = self.delegate.find_capabilities(model)?;
        log::trace!("缓存模型 {} 的能力", model);
        self.cache.insert(model.to_string(), caps.clone());
        Ok(caps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::capabilities::Capability;

    #[test]
    fn test_basic_finder() {
        let finder = BasicCapabilitiesFinder::new()
            .with_model("pm1", SourceCapabilities::full());
        assert!(finder
            .find_capabilities("pm1")
            .unwrap()
            .supports(Capability::CriteriaIn));
        assert!(matches!(
            finder.find_capabilities("pm2"),
            Err(MetadataError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_basic_finder_default() {
        let finder = BasicCapabilitiesFinder::new().with_default(SourceCapabilities::new());
        let caps = finder.find_capabilities("anything").unwrap();
        assert!(!caps.supports(Capability::CriteriaCompareEq));
    }

    #[test]
    fn test_caching_finder() {
        let finder = CachingCapabilitiesFinder::new(
            BasicCapabilitiesFinder::new().with_model("pm1", SourceCapabilities::full()),
        );
        let first = finder.find_capabilities("pm1").unwrap();
        let second = finder.find_capabilities("pm1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(finder.cached_models(), 1);
        assert!(finder.find_capabilities("pm9").is_err());
        assert_eq!(finder.cached_models(), 1);
        finder.invalidate();
        assert_eq!(finder.cached_models(), 0);
    }
}
