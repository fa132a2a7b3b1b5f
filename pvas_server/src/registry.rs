//! Channel provider registry.
//!
//! Provides a `ProviderRegistry` struct mapping provider names to provider
//! factories. Registries are plain values, so tests construct their own; a
//! process-wide instance is available through [`global_registry`].

use crate::provider::ChannelProvider;
use parking_lot::Mutex;
use pvas_common::consts::{LEGACY_PVA_PROVIDER_NAME, PVA_PROVIDER_NAME};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, OnceLock};
use tracing::debug;

/// Produces provider instances for one provider name.
pub trait ChannelProviderFactory: Send + Sync {
    /// Name the factory is registered under.
    fn factory_name(&self) -> &str;

    /// Process-wide instance; the same one on every call.
    fn shared_instance(&self) -> Arc<dyn ChannelProvider>;

    /// Fresh instance on every call.
    fn new_instance(&self) -> Arc<dyn ChannelProvider>;
}

/// Constructor used by [`SimpleProviderFactory`].
pub type ProviderConstructor = Box<dyn Fn() -> Arc<dyn ChannelProvider> + Send + Sync>;

/// Factory built from a constructor; the shared instance is built on first use.
pub struct SimpleProviderFactory {
    name: String,
    constructor: ProviderConstructor,
    shared: OnceLock<Arc<dyn ChannelProvider>>,
}

impl SimpleProviderFactory {
    /// Create a factory.
    pub fn new(
        name: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn ChannelProvider> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            constructor: Box::new(constructor),
            shared: OnceLock::new(),
        }
    }

    /// Use an existing provider as the shared instance.
    pub fn with_shared(self, provider: Arc<dyn ChannelProvider>) -> Self {
        let _ = self.shared.set(provider);
        self
    }
}

impl ChannelProviderFactory for SimpleProviderFactory {
    fn factory_name(&self) -> &str {
        &self.name
    }

    fn shared_instance(&self) -> Arc<dyn ChannelProvider> {
        self.shared.get_or_init(|| (self.constructor)()).clone()
    }

    fn new_instance(&self) -> Arc<dyn ChannelProvider> {
        (self.constructor)()
    }
}

/// Registry of channel provider factories.
///
/// All methods take `&self` and are safe to call from any thread. The lock
/// covers the map access only; instances are built after it is released.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: Mutex<HashMap<String, Arc<dyn ChannelProviderFactory>>>,
}

/// Map the deprecated provider alias to its canonical name.
fn normalize(name: &str) -> &str {
    if name == LEGACY_PVA_PROVIDER_NAME {
        debug!(
            "Provider name '{}' is deprecated, use '{}'",
            LEGACY_PVA_PROVIDER_NAME, PVA_PROVIDER_NAME
        );
        PVA_PROVIDER_NAME
    } else {
        name
    }
}

fn same_factory(a: &Arc<dyn ChannelProviderFactory>, b: &Arc<dyn ChannelProviderFactory>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under its name. Replaces any previous registration.
    pub fn register_factory(&self, factory: Arc<dyn ChannelProviderFactory>) {
        let name = factory.factory_name().to_string();
        let replaced = self.factories.lock().insert(name.clone(), factory);
        if replaced.is_some() {
            debug!(provider = %name, "Provider factory replaced");
        } else {
            debug!(provider = %name, "Provider factory registered");
        }
    }

    /// Remove a factory, only if it is the one currently registered under its name.
    ///
    /// Returns whether it was removed.
    pub fn unregister_factory(&self, factory: &Arc<dyn ChannelProviderFactory>) -> bool {
        let removed = {
            let mut factories = self.factories.lock();
            match factories.get(factory.factory_name()) {
                Some(current) if same_factory(current, factory) => {
                    factories.remove(factory.factory_name())
                }
                _ => None,
            }
        };
        removed.is_some()
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn ChannelProviderFactory>> {
        let name = normalize(name);
        self.factories.lock().get(name).cloned()
    }

    /// Shared provider instance for `name`.
    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn ChannelProvider>> {
        self.lookup(name).map(|f| f.shared_instance())
    }

    /// New provider instance for `name`.
    pub fn create_provider(&self, name: &str) -> Option<Arc<dyn ChannelProvider>> {
        self.lookup(name).map(|f| f.new_instance())
    }

    /// Snapshot of registered names, in no particular order.
    pub fn provider_names(&self) -> Vec<String> {
        self.factories.lock().keys().cloned().collect()
    }
}

// ─── Process-wide registry ──────────────────────────────────────────

static GLOBAL_REGISTRY: LazyLock<ProviderRegistry> = LazyLock::new(ProviderRegistry::new);

/// Process-wide provider registry. Empty at startup.
pub fn global_registry() -> &'static ProviderRegistry {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;

    fn factory(name: &'static str) -> Arc<dyn ChannelProviderFactory> {
        Arc::new(SimpleProviderFactory::new(name, move || {
            StaticProvider::new(name) as Arc<dyn ChannelProvider>
        }))
    }

    #[test]
    fn registry_register_and_resolve() {
        let reg = ProviderRegistry::new();
        reg.register_factory(factory("alpha"));

        let provider = reg.get_provider("alpha").expect("should resolve");
        assert_eq!(provider.provider_name(), "alpha");
        assert!(reg.get_provider("nonexistent").is_none());
        assert!(reg.create_provider("nonexistent").is_none());
    }

    #[test]
    fn registry_list_names() {
        let reg = ProviderRegistry::new();
        reg.register_factory(factory("alpha"));
        reg.register_factory(factory("beta"));

        let mut names = reg.provider_names();
        names.sort();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn unregister_by_identity() {
        let reg = ProviderRegistry::new();
        let first = factory("dup");
        let second = factory("dup");
        reg.register_factory(first.clone());
        reg.register_factory(second.clone());

        assert!(!reg.unregister_factory(&first));
        assert_eq!(reg.provider_names(), vec!["dup"]);
        assert!(reg.unregister_factory(&second));
        assert!(reg.provider_names().is_empty());
    }

    #[test]
    fn legacy_alias_normalized() {
        assert_eq!(normalize("pvAccess"), "pva");
        assert_eq!(normalize("pva"), "pva");
        assert_eq!(normalize("other"), "other");
    }

    #[test]
    fn with_shared_seeds_instance() {
        let existing: Arc<dyn ChannelProvider> = StaticProvider::new("seeded");
        let f = SimpleProviderFactory::new("seeded", || {
            StaticProvider::new("fresh") as Arc<dyn ChannelProvider>
        })
        .with_shared(existing.clone());

        assert!(Arc::ptr_eq(&f.shared_instance(), &existing));
        assert_eq!(f.new_instance().provider_name(), "fresh");
    }
}
