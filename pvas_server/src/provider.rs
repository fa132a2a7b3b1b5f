//! Channel providers.
//!
//! A provider turns a channel name into a channel. [`StaticProvider`] serves a
//! fixed set of [`SharedPv`]s added by the hosting application.

use crate::channel::SharedChannel;
use crate::error::{PvasError, PvasResult};
use crate::requester::ChannelRequester;
use crate::shared_pv::SharedPv;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Named source of channels.
pub trait ChannelProvider: Send + Sync {
    /// Provider name.
    fn provider_name(&self) -> &str;

    /// Whether `channel_name` is served.
    fn has_channel(&self, channel_name: &str) -> bool;

    /// Names of all served channels.
    fn channel_names(&self) -> Vec<String>;

    /// Open a channel. `None` if the name is not served.
    fn create_channel(
        &self,
        channel_name: &str,
        requester: &Arc<dyn ChannelRequester>,
    ) -> Option<Arc<SharedChannel>>;
}

/// Provider over a fixed name → PV map.
pub struct StaticProvider {
    name: String,
    me: Weak<StaticProvider>,
    pvs: RwLock<HashMap<String, Arc<SharedPv>>>,
}

impl StaticProvider {
    /// Create an empty provider.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|me| Self {
            name,
            me: me.clone(),
            pvs: RwLock::new(HashMap::new()),
        })
    }

    /// Provider serving the given PVs.
    ///
    /// A repeated name keeps the first PV; the rest are logged and skipped.
    pub fn from_pvs(
        name: impl Into<String>,
        pvs: impl IntoIterator<Item = (String, Arc<SharedPv>)>,
    ) -> Arc<Self> {
        let provider = Self::new(name);
        for (channel_name, pv) in pvs {
            if let Err(e) = provider.add(channel_name, pv) {
                warn!(provider = %provider.name, "{e}");
            }
        }
        provider
    }

    /// Serve `pv` under `channel_name`.
    ///
    /// # Errors
    /// `DuplicatePv` if the name is already served.
    pub fn add(&self, channel_name: impl Into<String>, pv: Arc<SharedPv>) -> PvasResult<()> {
        let channel_name = channel_name.into();
        let mut pvs = self.pvs.write();
        if pvs.contains_key(&channel_name) {
            return Err(PvasError::DuplicatePv { name: channel_name });
        }
        info!(provider = %self.name, pv = %channel_name, "PV added");
        pvs.insert(channel_name, pv);
        Ok(())
    }

    /// Stop serving `channel_name` and close its PV.
    ///
    /// Existing channels stay attached to the (now closed) PV.
    pub fn remove(&self, channel_name: &str) -> Option<Arc<SharedPv>> {
        let pv = self.pvs.write().remove(channel_name)?;
        pv.close();
        debug!(provider = %self.name, pv = %channel_name, "PV removed");
        Some(pv)
    }

    /// PV served under `channel_name`.
    pub fn get(&self, channel_name: &str) -> Option<Arc<SharedPv>> {
        self.pvs.read().get(channel_name).cloned()
    }

    /// Number of served PVs.
    pub fn len(&self) -> usize {
        self.pvs.read().len()
    }

    /// Whether no PV is served.
    pub fn is_empty(&self) -> bool {
        self.pvs.read().is_empty()
    }
}

impl ChannelProvider for StaticProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn has_channel(&self, channel_name: &str) -> bool {
        self.pvs.read().contains_key(channel_name)
    }

    fn channel_names(&self) -> Vec<String> {
        self.pvs.read().keys().cloned().collect()
    }

    fn create_channel(
        &self,
        channel_name: &str,
        requester: &Arc<dyn ChannelRequester>,
    ) -> Option<Arc<SharedChannel>> {
        let Some(pv) = self.get(channel_name) else {
            debug!(provider = %self.name, channel = %channel_name, "No such channel");
            return None;
        };
        let provider: Weak<dyn ChannelProvider> = self.me.clone();
        Some(SharedChannel::new(pv, provider, channel_name, requester))
    }
}

impl std::fmt::Debug for StaticProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticProvider")
            .field("name", &self.name)
            .field("pvs", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requester::Requester;

    struct Client;

    impl Requester for Client {
        fn requester_name(&self) -> String {
            "client".to_string()
        }
    }

    impl ChannelRequester for Client {}

    #[test]
    fn add_rejects_duplicates() {
        let provider = StaticProvider::new("test");
        provider.add("a", SharedPv::new("a", None)).unwrap();
        assert!(matches!(
            provider.add("a", SharedPv::new("a", None)),
            Err(PvasError::DuplicatePv { .. })
        ));
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn create_channel_links_back_to_provider() {
        let provider = StaticProvider::new("test");
        provider.add("a", SharedPv::new("a", None)).unwrap();
        let client: Arc<dyn ChannelRequester> = Arc::new(Client);

        assert!(provider.create_channel("missing", &client).is_none());

        let channel = provider.create_channel("a", &client).unwrap();
        assert_eq!(channel.channel_name(), "a");
        let back = channel.provider().unwrap();
        assert_eq!(back.provider_name(), "test");
        assert!(back.has_channel("a"));

        drop(back);
        drop(provider);
        assert!(channel.provider().is_none());
    }

    #[test]
    fn from_pvs_shares_pvs_between_instances() {
        let pvs = vec![
            ("a".to_string(), SharedPv::new("a", None)),
            ("b".to_string(), SharedPv::new("b", None)),
            ("a".to_string(), SharedPv::new("a2", None)),
        ];
        let first = StaticProvider::from_pvs("test", pvs.clone());
        let second = StaticProvider::from_pvs("test", pvs.clone());

        assert_eq!(first.len(), 2);
        assert!(Arc::ptr_eq(&first.get("a").unwrap(), &pvs[0].1));
        assert!(Arc::ptr_eq(&first.get("b").unwrap(), &second.get("b").unwrap()));
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn remove_closes_pv() {
        let provider = StaticProvider::new("test");
        let pv = SharedPv::new("a", None);
        pv.open_all(&pvas_common::pvdata::PvStructure::empty()).unwrap();
        provider.add("a", pv.clone()).unwrap();

        let removed = provider.remove("a").unwrap();
        assert!(Arc::ptr_eq(&removed, &pv));
        assert!(!pv.is_open());
        assert!(provider.is_empty());
        assert!(provider.remove("a").is_none());
    }
}
