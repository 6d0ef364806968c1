//! Compiled-template cache for callers that preview the same text many times.

use std::sync::Arc;

use moka::sync::Cache;
use serde_json::Value as JsonValue;
use tracing::trace;

use crate::engine::{compile_template, CompiledTemplate, ExpressionEngine, SpelEngine};
use crate::options::PreviewOptions;
use crate::preview::{empty_preview, failure, render, Preview};

/// Caches compiled templates keyed by their exact text, holding at most
/// `capacity` entries. Templates that fail to compile are not cached. Each
/// evaluation runs with a fresh state, so one entry can serve any number of
/// contexts and callers.
#[derive(Debug)]
pub struct TemplateCache<E: ExpressionEngine = SpelEngine> {
    engine: E,
    options: PreviewOptions,
    inner: Cache<String, Arc<CompiledTemplate>>,
}

impl TemplateCache<SpelEngine> {
    pub fn new(capacity: u64) -> Self {
        Self::with_engine(SpelEngine, PreviewOptions::default(), capacity)
    }
}

impl<E: ExpressionEngine> TemplateCache<E> {
    pub fn with_engine(engine: E, options: PreviewOptions, capacity: u64) -> Self {
        Self {
            engine,
            options,
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Same contract as [`crate::evaluate_expression`].
    pub fn evaluate(&self, context: &JsonValue, value: Option<&str>) -> Preview {
        let Some(template) = value.filter(|v| !v.is_empty()) else {
            return empty_preview(value);
        };

        if let Some(compiled) = self.inner.get(template) {
            trace!(template, "template cache hit");
            return render(&compiled, context, &self.options);
        }

        let compiled = match compile_template(&self.engine, template, &self.options.limits()) {
            Ok(compiled) => Arc::new(compiled),
            Err(err) => return failure(template, &err, &self.options),
        };
        let preview = render(&compiled, context, &self.options);
        if self.inner.policy().max_capacity() != Some(0) {
            self.inner.insert(template.to_string(), compiled);
        }
        preview
    }

    pub fn contains(&self, template: &str) -> bool {
        self.inner.contains_key(template)
    }

    /// Number of cached templates once pending evictions have been applied.
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reuses_entries_across_contexts() {
        let cache = TemplateCache::new(8);
        assert_eq!(
            cache.evaluate(&json!({"a": 1}), Some("${a}")).preview.as_deref(),
            Some("1")
        );
        assert!(cache.contains("${a}"));
        assert_eq!(
            cache.evaluate(&json!({"a": 2}), Some("${a}")).preview.as_deref(),
            Some("2")
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn stays_within_capacity() {
        let cache = TemplateCache::new(2);
        let ctx = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        for template in ["${a}", "${b}", "${c}", "${d}"] {
            assert!(cache.evaluate(&ctx, Some(template)).is_ok());
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn failed_compiles_are_not_cached() {
        let cache = TemplateCache::new(4);
        let preview = cache.evaluate(&json!({}), Some("${a"));
        assert!(preview.error.is_some());
        assert!(!cache.contains("${a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_never_stores() {
        let cache = TemplateCache::new(0);
        let preview = cache.evaluate(&json!({"a": 1}), Some("${a}"));
        assert_eq!(preview.preview.as_deref(), Some("1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = TemplateCache::new(4);
        cache.evaluate(&json!({"a": 1}), Some("${a}"));
        cache.clear();
        assert!(!cache.contains("${a}"));
        assert!(cache.is_empty());
    }
}
