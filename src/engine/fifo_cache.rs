//! 容量制限付きFIFOキャッシュ
//! 挿入順で最も古いエントリを追い出す。読み出しは順序に影響しない（LRUではない）。

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct FifoCache<K, V> {
    entries: HashMap<K, V>,
    /// 挿入順のキー列（先頭が最古）
    order: VecDeque<K>,
    capacity: usize,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// 容量0は1として扱う
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// エントリを保存する
    /// 新しいキーで容量を超える場合は、保存前に最古のエントリを1件追い出して返す。
    /// 既存キーの上書きは挿入順を変えない。
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.order
                .pop_front()
                .and_then(|oldest| self.entries.remove(&oldest).map(|value| (oldest, value)))
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    /// ヒットすればその値を、なければ`build`の結果を保存して返す
    /// `build`が失敗した場合は何も保存しない
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, build: F) -> Result<&V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !self.entries.contains_key(&key) {
            let value = build()?;
            self.insert(key.clone(), value);
        }

        // 直前に保存済み
        Ok(&self.entries[&key])
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 挿入順（古い順）のキー
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}
