// crates/fv_physics/src/memo.rs

//! 场求值缓存
//!
//! 外部施加场（如矢势）在迭代中以相同坐标和时间反复求值。
//! [`CachedField`] 包装一个纯函数，以输入指纹为键查询注入的缓存。
//! 缓存由调用方持有，没有进程级全局状态。

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 输入指纹
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn builder() -> FingerprintBuilder {
        FingerprintBuilder {
            hasher: DefaultHasher::new(),
        }
    }
}

/// 指纹构造器
///
/// 浮点数按位哈希，`0.0` 与 `-0.0` 视为不同输入。
#[derive(Debug, Clone)]
pub struct FingerprintBuilder {
    hasher: DefaultHasher,
}

impl FingerprintBuilder {
    pub fn tag(mut self, tag: &str) -> Self {
        tag.hash(&mut self.hasher);
        self
    }

    pub fn scalar(mut self, value: f64) -> Self {
        value.to_bits().hash(&mut self.hasher);
        self
    }

    pub fn scalars(mut self, values: &[f64]) -> Self {
        values.len().hash(&mut self.hasher);
        for v in values {
            v.to_bits().hash(&mut self.hasher);
        }
        self
    }

    pub fn points(mut self, points: &[DVec2]) -> Self {
        points.len().hash(&mut self.hasher);
        for p in points {
            p.x.to_bits().hash(&mut self.hasher);
            p.y.to_bits().hash(&mut self.hasher);
        }
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(self.hasher.finish())
    }
}

/// 场值缓存
pub trait FieldCache<V>: Send + Sync {
    fn get(&self, key: Fingerprint) -> Option<V>;
    fn insert(&self, key: Fingerprint, value: V);
    fn clear(&self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 不缓存
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl<V> FieldCache<V> for NoCache {
    fn get(&self, _key: Fingerprint) -> Option<V> {
        None
    }

    fn insert(&self, _key: Fingerprint, _value: V) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }
}

struct CacheEntries<V> {
    map: HashMap<Fingerprint, V>,
    order: VecDeque<Fingerprint>,
}

/// 内存缓存，超出容量时淘汰最早插入的条目
pub struct InMemoryFieldCache<V> {
    entries: RwLock<CacheEntries<V>>,
    capacity: usize,
}

impl<V> InMemoryFieldCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(CacheEntries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<V> Default for InMemoryFieldCache<V> {
    fn default() -> Self {
        Self::new(64)
    }
}

impl<V: Clone + Send + Sync> FieldCache<V> for InMemoryFieldCache<V> {
    fn get(&self, key: Fingerprint) -> Option<V> {
        self.entries.read().map.get(&key).cloned()
    }

    fn insert(&self, key: Fingerprint, value: V) {
        let mut entries = self.entries.write();
        if entries.map.insert(key, value).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
            }
        }
    }

    fn clear(&self) {
        let mut entries = self.entries.write();
        entries.map.clear();
        entries.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.read().map.len()
    }
}

/// 带缓存的场函数
///
/// `field(positions, time, params)` 必须是纯函数。
pub struct CachedField<V, F, C> {
    name: String,
    params: Vec<f64>,
    field: F,
    cache: C,
    hits: AtomicU64,
    misses: AtomicU64,
    _value: PhantomData<fn() -> V>,
}

impl<V, F, C> CachedField<V, F, C>
where
    V: Clone,
    F: Fn(&[DVec2], f64, &[f64]) -> V,
    C: FieldCache<V>,
{
    pub fn new(name: impl Into<String>, params: Vec<f64>, field: F, cache: C) -> Self {
        Self {
            name: name.into(),
            params,
            field,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            _value: PhantomData,
        }
    }

    /// 当前输入的指纹
    pub fn fingerprint(&self, positions: &[DVec2], time: f64) -> Fingerprint {
        Fingerprint::builder()
            .tag(&self.name)
            .scalars(&self.params)
            .points(positions)
            .scalar(time)
            .finish()
    }

    /// 求值（命中缓存时直接返回）
    pub fn evaluate(&self, positions: &[DVec2], time: f64) -> V {
        let key = self.fingerprint(positions, time);
        if let Some(v) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return v;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = (self.field)(positions, time, &self.params);
        self.cache.insert(key, value.clone());
        value
    }

    /// (命中次数, 未命中次数)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 均匀磁场 B 的对称规范矢势 A = B/2 (−y, x)
    fn uniform_field(positions: &[DVec2], _time: f64, params: &[f64]) -> Vec<DVec2> {
        positions
            .iter()
            .map(|p| 0.5 * params[0] * DVec2::new(-p.y, p.x))
            .collect()
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let pts = [DVec2::ZERO, DVec2::ONE];
        let a = Fingerprint::builder().points(&pts).scalar(1.0).finish();
        let b = Fingerprint::builder().points(&pts).scalar(1.0).finish();
        let c = Fingerprint::builder().points(&pts).scalar(2.0).finish();
        let d = Fingerprint::builder().points(&pts[..1]).scalar(1.0).finish();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_cached_field_hits() {
        let field = CachedField::new("uniform", vec![2.0], uniform_field, InMemoryFieldCache::new(4));
        let pts = vec![DVec2::new(1.0, 0.0), DVec2::new(0.0, 1.0)];

        let first = field.evaluate(&pts, 0.0);
        let second = field.evaluate(&pts, 0.0);
        assert_eq!(first, second);
        assert_eq!(first[0], DVec2::new(0.0, 1.0));
        assert_eq!(field.stats(), (1, 1));

        field.evaluate(&pts, 1.0);
        assert_eq!(field.stats(), (1, 2));
        assert_eq!(field.cache().len(), 2);
    }

    #[test]
    fn test_no_cache_always_evaluates() {
        let field = CachedField::new("uniform", vec![1.0], uniform_field, NoCache);
        let pts = vec![DVec2::ONE];
        field.evaluate(&pts, 0.0);
        field.evaluate(&pts, 0.0);
        assert_eq!(field.stats(), (0, 2));
    }

    #[test]
    fn test_capacity_eviction() {
        let cache: InMemoryFieldCache<u32> = InMemoryFieldCache::new(2);
        for i in 0..3u64 {
            cache.insert(Fingerprint(i), i as u32);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(Fingerprint(0)).is_none());
        assert_eq!(cache.get(Fingerprint(2)), Some(2));
        cache.clear();
        assert!(cache.is_empty());
    }
}
