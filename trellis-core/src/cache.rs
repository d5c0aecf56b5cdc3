//! 元数据缓存
//!
//! 缓存归属于上下文而不是进程级静态表，多个上下文之间互不干扰。
//! 上下文在每次 refresh 的收尾阶段以及 close 时调用 `invalidate_all()`。

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// 可失效的缓存
pub trait InvalidatableCache: Send + Sync {
    fn name(&self) -> &str;

    fn invalidate(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 简单的记忆化缓存
pub struct MemoCache<K, V> {
    name: String,
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// 命中则返回缓存值，否则计算并写入
    ///
    /// 计算过程不持有锁
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(&key) {
            return value;
        }
        let value = compute();
        self.entries.write().insert(key, value.clone());
        value
    }
}

impl<K, V> InvalidatableCache for MemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn invalidate(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// 上下文持有的缓存注册表
#[derive(Default)]
pub struct CacheRegistry {
    caches: RwLock<Vec<Arc<dyn InvalidatableCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册缓存，同一实例重复注册会被忽略
    pub fn register(&self, cache: Arc<dyn InvalidatableCache>) {
        let mut caches = self.caches.write();
        let exists = caches
            .iter()
            .any(|c| Arc::as_ptr(c) as *const () == Arc::as_ptr(&cache) as *const ());
        if !exists {
            tracing::trace!("Registered metadata cache '{}'", cache.name());
            caches.push(cache);
        }
    }

    /// 移除单个缓存（例如旧工厂的缓存）
    pub fn unregister(&self, cache: &Arc<dyn InvalidatableCache>) {
        self.caches
            .write()
            .retain(|c| Arc::as_ptr(c) as *const () != Arc::as_ptr(cache) as *const ());
    }

    pub fn clear(&self) {
        self.caches.write().clear();
    }

    pub fn invalidate_all(&self) {
        let caches: Vec<_> = self.caches.read().clone();
        for cache in caches {
            cache.invalidate();
        }
        tracing::trace!("Invalidated metadata caches");
    }

    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}
