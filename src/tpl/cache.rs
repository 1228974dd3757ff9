use crate::Result;
use crate::tpl::ast::AstNode;
use crate::tpl::compiled;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::trace;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub ast: Arc<Vec<AstNode>>,
    pub source: Arc<str>,
    pub compiled_at: DateTime<Utc>,
    pub use_count: u64,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub total_usage: u64,
    pub average_usage: f64,
}

/// Compiled templates keyed by their exact source text.
///
/// Entries are never evicted; the cache only shrinks through `clear`.
/// Sources differing only in whitespace are separate entries.
#[derive(Default)]
pub struct TemplateCache {
    entries: DashMap<String, CacheEntry>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached AST for `source`, compiling and storing it on a miss.
    /// Every call counts as one use.
    pub fn get_or_compile(&self, source: &str) -> Result<Arc<Vec<AstNode>>> {
        if let Some(mut entry) = self.entries.get_mut(source) {
            entry.use_count += 1;
            entry.last_used_at = Utc::now();
            trace!("Template cache hit: uses={}", entry.use_count);
            return Ok(entry.ast.clone());
        }

        // Compile outside of any map guard; a concurrent miss on the same source
        // keeps whichever entry landed first.
        let ast = Arc::new(compiled::compile_source(source)?);
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry(source.to_string())
            .or_insert_with(|| CacheEntry {
                ast,
                source: Arc::from(source),
                compiled_at: now,
                use_count: 0,
                last_used_at: now,
            });
        entry.use_count += 1;
        Ok(entry.ast.clone())
    }

    pub fn get(&self, source: &str) -> Option<CacheEntry> {
        self.entries.get(source).map(|e| e.value().clone())
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.entries.len();
        let total_usage: u64 = self.entries.iter().map(|e| e.use_count).sum();
        let average_usage = if size == 0 {
            0.0
        } else {
            total_usage as f64 / size as f64
        };
        CacheStats {
            size,
            total_usage,
            average_usage,
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TplError;

    #[test]
    fn test_hit_counts_usage() {
        let cache = TemplateCache::new();
        let a = cache.get_or_compile("Hello {{name}}").unwrap();
        let b = cache.get_or_compile("Hello {{name}}").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.total_usage, 2);
        assert_eq!(stats.average_usage, 2.0);

        let entry = cache.get("Hello {{name}}").unwrap();
        assert_eq!(entry.use_count, 2);
        assert!(entry.last_used_at >= entry.compiled_at);
        assert_eq!(&*entry.source, "Hello {{name}}");
    }

    #[test]
    fn test_exact_source_keys() {
        let cache = TemplateCache::new();
        cache.get_or_compile("{{a}}").unwrap();
        cache.get_or_compile("{{ a }}").unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().average_usage, 1.0);
    }

    #[test]
    fn test_compile_error_is_not_cached() {
        let cache = TemplateCache::new();
        let err = cache.get_or_compile("{{#if x}}").unwrap_err();
        assert!(matches!(err, TplError::Compile { .. }));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = TemplateCache::new();
        cache.get_or_compile("x").unwrap();
        cache.clear();
        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 0,
                total_usage: 0,
                average_usage: 0.0,
            }
        );
    }
}
