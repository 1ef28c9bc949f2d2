use std::collections::HashMap;
use std::sync::Arc;

use provar_domain::ProviderTarget;

use crate::error::ProviderError;
use crate::provider::Provider;

/// Dispatches calls to the correct [`Provider`] implementation.
///
/// A scenario's `provider:` field selects its target. When absent the
/// scenario inherits `default_target`. The
/// [`MemoryProvider`](crate::memory::MemoryProvider) should always be
/// registered.
pub struct ProviderRegistry {
    /// Default target used when a scenario's `provider:` field is absent.
    pub default_target: ProviderTarget,
    providers: HashMap<ProviderTarget, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new(default_target: ProviderTarget) -> Self {
        Self {
            default_target,
            providers: HashMap::new(),
        }
    }

    /// Register a provider for a target. Returns `&mut self` for chaining.
    pub fn register(&mut self, target: ProviderTarget, provider: Arc<dyn Provider>) -> &mut Self {
        self.providers.insert(target, provider);
        self
    }

    /// Resolve the provider for a requested target, falling back to the
    /// default. Returns `NotConfigured` if nothing is registered for it.
    pub fn resolve(&self, requested: Option<ProviderTarget>) -> Result<Arc<dyn Provider>, ProviderError> {
        let target = requested.unwrap_or(self.default_target);
        self.providers
            .get(&target)
            .cloned()
            .ok_or(ProviderError::NotConfigured(target))
    }

    /// Return all targets that have a registered provider.
    pub fn active_targets(&self) -> Vec<ProviderTarget> {
        self.providers.keys().copied().collect()
    }
}
