//! Per-module execution cache for repeated builds.
//!
//! In watch mode the engine runs the same pipelines over and over with
//! mostly unchanged inputs. Modules whose per-document work is expensive
//! memoize it here and skip it on the next pass.
//!
//! # Design
//!
//! Every module instance owns an isolated [`ExecutionCache`], handed out by
//! the engine's [`CacheManager`]. Two instances of the same module type never
//! share entries even when they use identical keys.
//!
//! ## Cache keys
//!
//! Entries are keyed by a caller-chosen string, or derived from a document:
//!
//! - **document key**: SHA-256 over the document's source path and content
//!   fingerprint, plus an optional sub-key so a module can cache several
//!   facets of one document. Two documents with the same source and the same
//!   content share a key regardless of their metadata or memory identity.
//!
//! ## Sweeping
//!
//! Each entry carries a "hit" flag. A successful lookup or a `set` marks the
//! entry hit. The engine resets every flag at the start of a pass and
//! purges entries that are still unhit at its end, so entries for documents
//! that stopped being produced do not accumulate across passes.
//!
//! ## Disabling
//!
//! A disabled cache stores nothing: lookups always miss and `set` is a
//! no-op. The CLI's `--no-cache` runs every module with a disabled cache.

use crate::document::Document;
use crate::module::Module;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tracing::debug;

/// A cached value. Stored type-erased; read back with
/// [`ExecutionCache::try_get_value`].
pub type CacheValue = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: CacheValue,
    hit: AtomicBool,
}

/// Key/value store owned by one module instance. Safe to share across the
/// worker threads of a module's parallel per-document work.
pub struct ExecutionCache {
    entries: RwLock<HashMap<String, Entry>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Presence check. Does not mark the entry hit.
    pub fn contains_key(&self, key: &str) -> bool {
        self.enabled && self.read().contains_key(key)
    }

    pub fn try_get(&self, key: &str) -> Option<CacheValue> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let found = self.read().get(key).map(|entry| {
            entry.hit.store(true, Ordering::Relaxed);
            Arc::clone(&entry.value)
        });
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Typed lookup. A stored value of another type counts as a miss.
    pub fn try_get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        let found = self.read().get(key).and_then(|entry| {
            let value = entry.value.downcast_ref::<T>()?.clone();
            entry.hit.store(true, Ordering::Relaxed);
            Some(value)
        });
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store `value` under `key`, replacing any previous entry. The entry
    /// counts as hit for the current pass.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        if !self.enabled {
            return;
        }
        self.write().insert(
            key.into(),
            Entry {
                value: Arc::new(value),
                hit: AtomicBool::new(true),
            },
        );
    }

    pub fn contains_document(&self, document: &Document, sub_key: Option<&str>) -> bool {
        self.contains_key(&document_key(document, sub_key))
    }

    pub fn try_get_document(&self, document: &Document, sub_key: Option<&str>) -> Option<CacheValue> {
        self.try_get(&document_key(document, sub_key))
    }

    pub fn try_get_document_value<T>(&self, document: &Document, sub_key: Option<&str>) -> Option<T>
    where
        T: Any + Send + Sync + Clone,
    {
        self.try_get_value(&document_key(document, sub_key))
    }

    pub fn set_document<T>(&self, document: &Document, sub_key: Option<&str>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.set(document_key(document, sub_key), value);
    }

    /// Clear every hit flag and the lookup counters.
    pub fn reset_entry_hits(&self) {
        for entry in self.read().values() {
            entry.hit.store(false, Ordering::Relaxed);
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Remove every entry not hit since the last reset. Returns how many
    /// entries were evicted.
    pub fn clear_unhit_entries(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.hit.load(Ordering::Relaxed));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len() as u64,
            evicted: 0,
        }
    }
}

impl fmt::Debug for ExecutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.len())
            .finish()
    }
}

/// Derived cache key for a document, optionally narrowed by `sub_key`.
pub fn document_key(document: &Document, sub_key: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"document\0");
    match document.source() {
        Some(source) => {
            hasher.update(b"\x01");
            hasher.update(source.as_str().as_bytes());
        }
        None => hasher.update(b"\x00"),
    }
    hasher.update(b"\0");
    hasher.update(document.fingerprint().as_bytes());
    if let Some(sub_key) = sub_key {
        hasher.update(b"\0");
        hasher.update(sub_key.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Identity of a module instance inside one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(usize);

impl ModuleId {
    /// Address of the instance behind `module`. Only unique among live
    /// instances; [`CacheManager`] pins the allocation of every module it
    /// has handed a cache to, so its ids are never reused.
    pub fn of(module: &Arc<dyn Module>) -> Self {
        ModuleId(Arc::as_ptr(module) as *const () as usize)
    }
}

struct ModuleCache {
    owner: Weak<dyn Module>,
    cache: Arc<ExecutionCache>,
}

impl ModuleCache {
    fn is_live(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

/// Owns one [`ExecutionCache`] per module instance.
///
/// Each cache holds a weak reference to its module. While that reference
/// exists the module's allocation cannot be reused, so a new instance never
/// inherits a dropped instance's entries. Caches of dropped modules are
/// discarded by [`clear_unhit_entries`](Self::clear_unhit_entries).
pub struct CacheManager {
    caches: RwLock<HashMap<ModuleId, ModuleCache>>,
    enabled: bool,
}

impl CacheManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ModuleId, ModuleCache>> {
        self.caches.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ModuleId, ModuleCache>> {
        self.caches.write().unwrap_or_else(|e| e.into_inner())
    }

    fn fresh(&self, module: &Arc<dyn Module>) -> ModuleCache {
        ModuleCache {
            owner: Arc::downgrade(module),
            cache: Arc::new(if self.enabled {
                ExecutionCache::new()
            } else {
                ExecutionCache::disabled()
            }),
        }
    }

    /// The cache for `module`, created on first request.
    pub fn cache_for(&self, module: &Arc<dyn Module>) -> Arc<ExecutionCache> {
        let id = ModuleId::of(module);
        if let Some(slot) = self.read().get(&id).filter(|slot| slot.is_live()) {
            return Arc::clone(&slot.cache);
        }
        let mut caches = self.write();
        let slot = caches.entry(id).or_insert_with(|| self.fresh(module));
        if !slot.is_live() {
            *slot = self.fresh(module);
        }
        Arc::clone(&slot.cache)
    }

    /// Number of module caches currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn all(&self) -> Vec<Arc<ExecutionCache>> {
        self.read().values().map(|slot| Arc::clone(&slot.cache)).collect()
    }

    pub fn reset_entry_hits(&self) {
        for cache in self.all() {
            cache.reset_entry_hits();
        }
    }

    /// Sweep every module cache and drop the caches of modules that no
    /// longer exist. Returns the total number of evicted entries.
    pub fn clear_unhit_entries(&self) -> usize {
        let mut dropped = 0;
        let mut dead = 0;
        self.write().retain(|_, slot| {
            if slot.is_live() {
                return true;
            }
            dead += 1;
            dropped += slot.cache.len();
            false
        });
        let evicted = dropped + self.all().iter().map(|c| c.clear_unhit_entries()).sum::<usize>();
        if evicted > 0 || dead > 0 {
            debug!(evicted, modules = dead, "evicted unhit cache entries");
        }
        evicted
    }

    /// Aggregate statistics over every module cache.
    pub fn stats(&self) -> CacheStats {
        self.all().iter().fold(CacheStats::default(), |mut acc, cache| {
            let s = cache.stats();
            acc.hits += s.hits;
            acc.misses += s.misses;
            acc.entries += s.entries;
            acc
        })
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("enabled", &self.enabled)
            .field("modules", &self.len())
            .finish()
    }
}

/// Summary of cache activity for one engine pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evicted: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} computed ({} lookups)",
                self.hits,
                self.misses,
                self.lookups()
            )?;
        } else {
            write!(f, "{} computed", self.misses)?;
        }
        write!(f, ", {} entries", self.entries)?;
        if self.evicted > 0 {
            write!(f, ", {} evicted", self.evicted)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FilePath;
    use crate::metadata::Metadata;
    use crate::module::FnModule;

    fn doc(path: &str, text: &str) -> Document {
        Document::new(Some(FilePath::new(path)), text, Metadata::new())
    }

    // =========================================================================
    // Get / Set
    // =========================================================================

    #[test]
    fn set_then_get() {
        let cache = ExecutionCache::new();
        cache.set("k", 42u32);
        assert!(cache.contains_key("k"));
        assert_eq!(cache.try_get_value::<u32>("k"), Some(42));
        assert!(cache.try_get("k").is_some());
    }

    #[test]
    fn wrong_type_is_a_miss() {
        let cache = ExecutionCache::new();
        cache.set("k", String::from("text"));
        assert_eq!(cache.try_get_value::<u32>("k"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn set_replaces_previous_value() {
        let cache = ExecutionCache::new();
        cache.set("k", 1u8);
        cache.set("k", 2u8);
        assert_eq!(cache.try_get_value::<u8>("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    // =========================================================================
    // Sweeping
    // =========================================================================

    #[test]
    fn unhit_entries_are_evicted_after_reset() {
        let cache = ExecutionCache::new();
        cache.set("k", 1u8);
        cache.reset_entry_hits();
        assert_eq!(cache.clear_unhit_entries(), 1);
        assert_eq!(cache.try_get_value::<u8>("k"), None);
    }

    #[test]
    fn hit_entries_survive_sweep() {
        let cache = ExecutionCache::new();
        cache.set("read", 1u8);
        cache.set("stale", 2u8);
        cache.reset_entry_hits();
        assert_eq!(cache.try_get_value::<u8>("read"), Some(1));
        assert_eq!(cache.clear_unhit_entries(), 1);
        assert!(cache.contains_key("read"));
        assert!(!cache.contains_key("stale"));
    }

    #[test]
    fn contains_key_does_not_mark_hit() {
        let cache = ExecutionCache::new();
        cache.set("k", 1u8);
        cache.reset_entry_hits();
        assert!(cache.contains_key("k"));
        assert_eq!(cache.clear_unhit_entries(), 1);
    }

    // =========================================================================
    // Disabled mode
    // =========================================================================

    #[test]
    fn disabled_cache_never_stores() {
        let cache = ExecutionCache::disabled();
        cache.set("k", 1u8);
        assert!(!cache.contains_key("k"));
        assert_eq!(cache.try_get_value::<u8>("k"), None);
        assert!(cache.is_empty());
    }

    // =========================================================================
    // Document keys
    // =========================================================================

    #[test]
    fn document_keys_follow_source_and_content() {
        let a = doc("/in/a.md", "one");
        let same = doc("/in/a.md", "one").with_metadata([("extra", 1)]);
        let other_content = doc("/in/a.md", "two");
        let other_source = doc("/in/b.md", "one");

        assert_eq!(document_key(&a, None), document_key(&same, None));
        assert_ne!(document_key(&a, None), document_key(&other_content, None));
        assert_ne!(document_key(&a, None), document_key(&other_source, None));
        assert_ne!(document_key(&a, None), document_key(&a, Some("toc")));
        assert_eq!(document_key(&a, None).len(), 64);
    }

    #[test]
    fn document_overloads() {
        let cache = ExecutionCache::new();
        let d = doc("/in/a.md", "body");
        cache.set_document(&d, Some("words"), 1usize);
        assert!(cache.contains_document(&d, Some("words")));
        assert!(!cache.contains_document(&d, None));
        assert_eq!(cache.try_get_document_value::<usize>(&d, Some("words")), Some(1));
        assert!(cache.try_get_document(&d, Some("words")).is_some());
    }

    // =========================================================================
    // CacheManager
    // =========================================================================

    fn module() -> Arc<dyn Module> {
        Arc::new(FnModule::new("m", |inputs, _| Ok(inputs.to_vec())))
    }

    #[test]
    fn module_instances_are_isolated() {
        let manager = CacheManager::new(true);
        let first = module();
        let second = module();

        manager.cache_for(&first).set("k", "first");
        manager.cache_for(&second).set("k", "second");

        assert_eq!(manager.cache_for(&first).try_get_value::<&str>("k"), Some("first"));
        assert_eq!(manager.cache_for(&second).try_get_value::<&str>("k"), Some("second"));
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn new_instance_never_sees_a_dropped_instances_entries() {
        let manager = CacheManager::new(true);
        for i in 0..50u32 {
            let old = module();
            manager.cache_for(&old).set("k", i);
            drop(old);

            let fresh = module();
            assert!(!manager.cache_for(&fresh).contains_key("k"), "iteration {i}");
        }
    }

    #[test]
    fn sweep_discards_caches_of_dropped_modules() {
        let manager = CacheManager::new(true);
        let kept = module();
        manager.cache_for(&kept).set("a", 1u8);
        for _ in 0..10 {
            let child = module();
            manager.cache_for(&child).set("b", 1u8);
        }
        assert_eq!(manager.len(), 11);

        // the kept entry was set this pass, so only dropped modules go
        assert_eq!(manager.clear_unhit_entries(), 10);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.cache_for(&kept).try_get_value::<u8>("a"), Some(1));
    }

    #[test]
    fn manager_sweeps_every_cache() {
        let manager = CacheManager::new(true);
        let a = module();
        let b = module();
        manager.cache_for(&a).set("x", 1u8);
        manager.cache_for(&b).set("y", 1u8);
        manager.reset_entry_hits();
        assert_eq!(manager.clear_unhit_entries(), 2);
        assert_eq!(manager.stats().entries, 0);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn disabled_manager_hands_out_disabled_caches() {
        let manager = CacheManager::new(false);
        assert!(!manager.cache_for(&module()).is_enabled());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            hits: 5,
            misses: 2,
            entries: 7,
            evicted: 0,
        };
        assert_eq!(format!("{}", s), "5 cached, 2 computed (7 lookups), 7 entries");
    }

    #[test]
    fn cache_stats_display_with_evictions() {
        let s = CacheStats {
            hits: 0,
            misses: 3,
            entries: 3,
            evicted: 2,
        };
        assert_eq!(format!("{}", s), "3 computed, 3 entries, 2 evicted");
    }
}
