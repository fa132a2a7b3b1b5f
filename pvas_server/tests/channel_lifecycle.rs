//! Channel attach/detach tests for PVAS shared PVs
//!
//! First-connect / last-disconnect hook accounting, hook re-entrancy,
//! defunct requesters, field requests and close notifications.

use proptest::prelude::*;
use pvas_common::pvdata::{PvStructure, ScalarType, ScalarValue, Status, Structure};
use pvas_server::{
    ChannelProvider, ChannelRequester, ConnectionState, GetFieldRequester, Requester,
    SharedChannel, SharedPv, SharedPvHandler, StaticProvider,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn scalar(v: f64) -> PvStructure {
    PvStructure::new(Structure::scalar(ScalarType::Double))
        .with("value", ScalarValue::Double(v))
        .unwrap()
}

#[derive(Default)]
struct CountingHandler {
    first: AtomicUsize,
    last: AtomicUsize,
    channels_seen_on_first: AtomicUsize,
}

impl SharedPvHandler for CountingHandler {
    fn on_first_connect(&self, pv: &Arc<SharedPv>) {
        // Runs without the PV lock held
        self.channels_seen_on_first
            .store(pv.num_channels(), Ordering::SeqCst);
        self.first.fetch_add(1, Ordering::SeqCst);
    }

    fn on_last_disconnect(&self, _pv: &Arc<SharedPv>) {
        self.last.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Client {
    disconnects: AtomicUsize,
}

impl Requester for Client {
    fn requester_name(&self) -> String {
        "test-client".to_string()
    }
}

impl ChannelRequester for Client {
    fn channel_state_change(&self, _channel: &Arc<SharedChannel>, state: ConnectionState) {
        if state == ConnectionState::Disconnected {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn setup(name: &str) -> (Arc<StaticProvider>, Arc<SharedPv>, Arc<CountingHandler>) {
    let handler = Arc::new(CountingHandler::default());
    let pv = SharedPv::new(name, Some(handler.clone()));
    let provider = StaticProvider::new("test");
    provider.add(name, pv.clone()).unwrap();
    (provider, pv, handler)
}

#[test]
fn test_first_and_last_hooks() {
    let (provider, pv, handler) = setup("lc:hooks");
    let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());

    let a = provider.create_channel("lc:hooks", &client).unwrap();
    assert_eq!(handler.first.load(Ordering::SeqCst), 1);
    assert_eq!(handler.channels_seen_on_first.load(Ordering::SeqCst), 1);

    let b = provider.create_channel("lc:hooks", &client).unwrap();
    assert_eq!(pv.num_channels(), 2);
    assert_eq!(handler.first.load(Ordering::SeqCst), 1);

    drop(a);
    assert_eq!(handler.last.load(Ordering::SeqCst), 0);
    drop(b);
    assert_eq!(handler.last.load(Ordering::SeqCst), 1);
    assert_eq!(pv.num_channels(), 0);

    // A new first channel fires again
    let _c = provider.create_channel("lc:hooks", &client).unwrap();
    assert_eq!(handler.first.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concurrent_attach_detach() {
    let (provider, pv, handler) = setup("lc:threads");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = provider.clone();
            thread::spawn(move || {
                let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());
                for _ in 0..200 {
                    let channel = provider.create_channel("lc:threads", &client).unwrap();
                    drop(channel);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let first = handler.first.load(Ordering::SeqCst);
    let last = handler.last.load(Ordering::SeqCst);
    assert!(first >= 1);
    assert_eq!(first, last);
    assert_eq!(pv.num_channels(), 0);
}

#[test]
fn test_defunct_requester_still_detaches() {
    let (provider, pv, handler) = setup("lc:defunct");
    pv.set_debug(6);

    let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());
    let channel = provider.create_channel("lc:defunct", &client).unwrap();
    drop(client);
    assert!(channel.requester().is_none());

    drop(channel);
    assert_eq!(handler.last.load(Ordering::SeqCst), 1);
    assert_eq!(pv.num_channels(), 0);
}

#[test]
fn test_close_notifies_channels() {
    let (provider, pv, _handler) = setup("lc:close");
    pv.open_all(&scalar(1.0)).unwrap();

    let client = Arc::new(Client::default());
    let requester: Arc<dyn ChannelRequester> = client.clone();
    let _a = provider.create_channel("lc:close", &requester).unwrap();
    let _b = provider.create_channel("lc:close", &requester).unwrap();

    assert!(pv.close());
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 2);

    // Already closed
    assert!(!pv.close());
    assert_eq!(client.disconnects.load(Ordering::SeqCst), 2);
    assert_eq!(pv.num_channels(), 2);
}

#[test]
fn test_channel_accessors() {
    let (provider, pv, _handler) = setup("lc:names");
    let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());
    let channel = provider.create_channel("lc:names", &client).unwrap();

    assert_eq!(channel.channel_name(), "lc:names");
    assert_eq!(channel.remote_address(), "lc:names");
    assert!(Arc::ptr_eq(channel.owner(), &pv));
    assert_eq!(channel.provider().unwrap().provider_name(), "test");
    assert_eq!(channel.requester().unwrap().requester_name(), "test-client");
}

#[derive(Default)]
struct FieldClient {
    done: AtomicUsize,
    last_id: parking_lot::Mutex<Option<String>>,
}

impl Requester for FieldClient {
    fn requester_name(&self) -> String {
        "field-client".to_string()
    }
}

impl GetFieldRequester for FieldClient {
    fn get_done(&self, status: Status, field: Option<Arc<Structure>>) {
        assert!(status.is_ok());
        *self.last_id.lock() = field.map(|f| f.id().to_string());
        self.done.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_get_field_waits_for_open() {
    let (provider, pv, _handler) = setup("lc:field");
    let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());
    let channel = provider.create_channel("lc:field", &client).unwrap();

    let early = Arc::new(FieldClient::default());
    channel.get_field(early.clone(), "");
    assert_eq!(early.done.load(Ordering::SeqCst), 0);

    pv.open_all(&scalar(0.0)).unwrap();
    assert_eq!(early.done.load(Ordering::SeqCst), 1);
    assert_eq!(
        early.last_id.lock().as_deref(),
        Some(Structure::scalar(ScalarType::Double).id())
    );

    // Answered immediately once typed, never twice for the queued one
    let late = Arc::new(FieldClient::default());
    channel.get_field(late.clone(), "value");
    assert_eq!(late.done.load(Ordering::SeqCst), 1);
    pv.close();
    pv.open_all(&scalar(1.0)).unwrap();
    assert_eq!(early.done.load(Ordering::SeqCst), 1);
}

proptest! {
    /// Hook counts match the model's empty/non-empty transitions.
    #[test]
    fn prop_hooks_follow_transitions(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let (provider, pv, handler) = setup("lc:prop");
        let client: Arc<dyn ChannelRequester> = Arc::new(Client::default());

        let mut open = Vec::new();
        let mut expected_first = 0;
        let mut expected_last = 0;
        for attach in ops {
            if attach {
                if open.is_empty() {
                    expected_first += 1;
                }
                open.push(provider.create_channel("lc:prop", &client).unwrap());
            } else if !open.is_empty() {
                open.remove(0);
                if open.is_empty() {
                    expected_last += 1;
                }
            }
            prop_assert_eq!(pv.num_channels(), open.len());
        }

        prop_assert_eq!(handler.first.load(Ordering::SeqCst), expected_first);
        prop_assert_eq!(handler.last.load(Ordering::SeqCst), expected_last);
    }
}
