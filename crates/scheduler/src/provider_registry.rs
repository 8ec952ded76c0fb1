//! Resolves the right `ProviderAdapter` for a repository's `Source`
//! (spec.md §4.2: "one implementation per source/destination pair").

use migrator_provider::ProviderAdapter;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ProviderRegistry {
    by_source_id: HashMap<i64, Arc<dyn ProviderAdapter>>,
    default_adapter: Arc<dyn ProviderAdapter>,
}

impl ProviderRegistry {
    pub fn new(default_adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            by_source_id: HashMap::new(),
            default_adapter,
        }
    }

    pub fn with_source(mut self, source_id: i64, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.by_source_id.insert(source_id, adapter);
        self
    }

    pub fn resolve(&self, source_id: i64) -> Arc<dyn ProviderAdapter> {
        self.by_source_id
            .get(&source_id)
            .cloned()
            .unwrap_or_else(|| self.default_adapter.clone())
    }
}
