//! 结果缓存：有界 LRU + 每条目 TTL
//!
//! 用于对近期重复请求短路整条管线。内部用 HashMap 存条目、VecDeque 维护访问顺序
//! （队首最久未用，队尾最近使用）；过期条目在访问时惰性清除，不做后台扫描。
//!
//! 所有操作在一次加锁内同步完成，调用方可以在 async 上下文中直接使用。
//!
//! 键策略：调用方用 [`normalize_key`] 归一化请求文本（小写、去首尾空白、折叠内部空白），
//! 仅在空白与大小写上不同的请求会有意命中同一条缓存。

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

/// 默认容量
pub const DEFAULT_MAX_SIZE: usize = 100;
/// 默认 TTL：5 分钟
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    Poisoned,
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// 缓存条目（仅缓存内部持有，对外只返回值的克隆）
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
    last_access: Instant,
    access_count: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) > self.ttl
    }
}

/// 缓存统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// hits / (hits + misses)，无请求时为 0
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// 当前存活条目的平均访问次数
    pub average_access_count: f64,
    pub oldest_entry_age: Option<Duration>,
    pub newest_entry_age: Option<Duration>,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={}/{} hits={} misses={} evictions={} rate={:.2}%",
            self.size,
            self.max_size,
            self.hits,
            self.misses,
            self.evictions,
            self.hit_rate * 100.0,
        )
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// 访问顺序：队首为最久未使用
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> Inner<V> {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }
}

/// 有界 LRU + TTL 缓存
pub struct ResultCache<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
    default_ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<V>>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::Poisoned)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 查找：不存在或已过期即为 miss（过期条目顺带清除）；命中时刷新为最近使用
    pub fn lookup(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut inner = self.lock()?;
        let now = Instant::now();

        let Some(expired) = inner.entries.get(key).map(|e| e.is_expired(now)) else {
            inner.misses += 1;
            return Ok(None);
        };

        if expired {
            inner.remove(key);
            inner.misses += 1;
            tracing::debug!(key, "cache entry expired");
            return Ok(None);
        }

        inner.hits += 1;
        inner.touch(key);
        let entry = match inner.entries.get_mut(key) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        entry.last_access = now;
        entry.access_count += 1;
        Ok(Some(entry.value.clone()))
    }

    /// 写入：容量已满且为新键时淘汰最久未使用的条目；写入后该条目成为最近使用
    pub fn store(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let mut inner = self.lock()?;
        let now = Instant::now();

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_size {
            if let Some(victim) = inner.order.pop_front() {
                inner.entries.remove(&victim);
                inner.evictions += 1;
                tracing::debug!(key = %victim, "cache evicted least recently used entry");
            }
        }

        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                ttl,
                last_access: now,
                access_count: 0,
            },
        );
        inner.touch(key);
        Ok(())
    }

    /// 使用默认 TTL 写入
    pub fn store_default(&self, key: &str, value: V) -> Result<(), CacheError> {
        self.store(key, value, self.default_ttl)
    }

    /// 移除指定键，返回是否存在
    pub fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.remove(key).is_some())
    }

    /// 主动清除所有过期条目，返回清除数量
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut inner = self.lock()?;
        let now = Instant::now();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        Ok(expired.len())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.lock()?;
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    pub fn reset_stats(&self) -> Result<(), CacheError> {
        let mut inner = self.lock()?;
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let inner = self.lock()?;
        let now = Instant::now();
        let total = inner.hits + inner.misses;
        let size = inner.entries.len();

        let average_access_count = if size == 0 {
            0.0
        } else {
            inner.entries.values().map(|e| e.access_count).sum::<u64>() as f64 / size as f64
        };
        let ages = inner.entries.values().map(|e| now.duration_since(e.created_at));

        Ok(CacheStats {
            size,
            max_size: self.max_size,
            hit_rate: if total == 0 {
                0.0
            } else {
                inner.hits as f64 / total as f64
            },
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            average_access_count,
            oldest_entry_age: ages.clone().max(),
            newest_entry_age: ages.min(),
        })
    }
}

impl<V: Clone> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

/// 缓存键归一化：小写、去首尾空白、内部连续空白折叠为单个空格
pub fn normalize_key(input: &str) -> String {
    input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_store_then_lookup() {
        let cache = ResultCache::new(4, DEFAULT_TTL);
        cache.store("k", 42, DEFAULT_TTL).unwrap();
        assert_eq!(cache.lookup("k").unwrap(), Some(42));
    }

    #[test]
    fn test_expired_entry_is_purged_on_lookup() {
        let cache = ResultCache::new(4, DEFAULT_TTL);
        cache.store("k", "v".to_string(), Duration::from_millis(20)).unwrap();
        cache.store("other", "w".to_string(), DEFAULT_TTL).unwrap();
        assert_eq!(cache.len(), 2);
        sleep(Duration::from_millis(40));
        assert_eq!(cache.lookup("k").unwrap(), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().unwrap().misses, 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = ResultCache::new(3, DEFAULT_TTL);
        cache.store("a", 1, DEFAULT_TTL).unwrap();
        cache.store("b", 2, DEFAULT_TTL).unwrap();
        cache.store("c", 3, DEFAULT_TTL).unwrap();
        cache.store("d", 4, DEFAULT_TTL).unwrap();

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.lookup("a").unwrap(), None);
        assert_eq!(cache.stats().unwrap().evictions, 1);
    }

    #[test]
    fn test_lookup_refreshes_recency() {
        let cache = ResultCache::new(3, DEFAULT_TTL);
        cache.store("a", 1, DEFAULT_TTL).unwrap();
        cache.store("b", 2, DEFAULT_TTL).unwrap();
        cache.store("c", 3, DEFAULT_TTL).unwrap();

        assert_eq!(cache.lookup("a").unwrap(), Some(1));
        cache.store("d", 4, DEFAULT_TTL).unwrap();

        assert_eq!(cache.lookup("a").unwrap(), Some(1));
        assert_eq!(cache.lookup("b").unwrap(), None);
        assert_eq!(cache.lookup("c").unwrap(), Some(3));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = ResultCache::new(2, DEFAULT_TTL);
        cache.store("a", 1, DEFAULT_TTL).unwrap();
        cache.store("b", 2, DEFAULT_TTL).unwrap();
        cache.store("a", 10, DEFAULT_TTL).unwrap();

        assert_eq!(cache.stats().unwrap().evictions, 0);
        // 覆盖后 a 最新，再插入新键应淘汰 b
        cache.store("c", 3, DEFAULT_TTL).unwrap();
        assert_eq!(cache.lookup("a").unwrap(), Some(10));
        assert_eq!(cache.lookup("b").unwrap(), None);
    }

    #[test]
    fn test_hit_rate() {
        let cache = ResultCache::new(4, DEFAULT_TTL);
        assert_eq!(cache.stats().unwrap().hit_rate, 0.0);

        cache.store("a", 1, DEFAULT_TTL).unwrap();
        cache.lookup("a").unwrap();
        cache.lookup("a").unwrap();
        cache.lookup("a").unwrap();
        cache.lookup("missing").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
        assert!((stats.average_access_count - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stats_ages() {
        let cache = ResultCache::new(4, DEFAULT_TTL);
        assert_eq!(cache.stats().unwrap().oldest_entry_age, None);
        cache.store("old", 1, DEFAULT_TTL).unwrap();
        sleep(Duration::from_millis(10));
        cache.store("new", 2, DEFAULT_TTL).unwrap();
        let stats = cache.stats().unwrap();
        assert!(stats.oldest_entry_age.unwrap() > stats.newest_entry_age.unwrap());
    }

    #[test]
    fn test_purge_and_invalidate() {
        let cache = ResultCache::new(4, DEFAULT_TTL);
        cache.store("short", 1, Duration::from_millis(5)).unwrap();
        cache.store("long", 2, DEFAULT_TTL).unwrap();
        sleep(Duration::from_millis(20));
        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert!(cache.invalidate("long").unwrap());
        assert!(!cache.invalidate("long").unwrap());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(
            normalize_key("  Scrape   HTTPS://Example.com\tand  Summarize "),
            "scrape https://example.com and summarize"
        );
        assert_eq!(normalize_key("a b"), normalize_key("A   B"));
    }
}
