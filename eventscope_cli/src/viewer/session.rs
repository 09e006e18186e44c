//! The ingestion pipeline: decode, store, paint

use super::detail::{self, DetailPanel};
use super::render::{self, Surface};
use super::store::{MessageId, MessageStore};
use eventscope_common::{Inbound, Message, ProtocolError};

/// Outcome of handling one inbound text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// A heartbeat reply, consumed without a row
    HeartbeatReply,
    /// A message stored and painted under this id
    Stored(MessageId),
}

/// Viewer state for one session: the message store and the surface showing it
pub struct Viewer<S> {
    store: MessageStore,
    surface: S,
}

impl<S: Surface> Viewer<S> {
    pub fn new(store: MessageStore, surface: S) -> Self {
        Self { store, surface }
    }

    /// Handle an inbound text frame
    pub fn ingest(&mut self, text: &str) -> Result<Ingested, ProtocolError> {
        match Inbound::decode(text)? {
            Inbound::HeartbeatReply => Ok(Ingested::HeartbeatReply),
            Inbound::Event(message) => Ok(Ingested::Stored(self.record(*message))),
        }
    }

    /// Store a decoded message and paint its row
    pub fn record(&mut self, message: Message) -> MessageId {
        let id = self.store.append(message);
        if let Some(stored) = self.store.lookup(id) {
            render::paint(&mut self.surface, id, stored);
        }
        id
    }

    /// Open the detail view for a row; unknown ids yield nothing
    pub fn activate(&self, id: MessageId) -> Option<DetailPanel> {
        self.store.lookup(id).map(|message| detail::show(id, message))
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// End the session, keeping the received messages
    pub fn into_store(self) -> MessageStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::render::testing::MemorySurface;
    use std::num::NonZeroUsize;

    fn event(resource: &str) -> String {
        serde_json::json!({
            "type": "INCOMING",
            "dateTime": "24-05-01 12:00:00 +0200",
            "action": "NOTIFY",
            "resource": resource,
            "version": 1,
            "data": [{"name": "PowerState", "value": "On"}],
            "descriptions": [],
            "source": {"data": []}
        })
        .to_string()
    }

    fn viewer() -> Viewer<MemorySurface> {
        Viewer::new(MessageStore::unbounded(), MemorySurface::new(240.0))
    }

    #[test]
    fn test_ingest_assigns_sequential_ids() {
        let mut viewer = viewer();
        for i in 0..5 {
            let ingested = viewer.ingest(&event(&format!("/ro/{}", i))).unwrap();
            assert_eq!(ingested, Ingested::Stored(i));
        }

        for i in 0..5u64 {
            assert_eq!(viewer.store().lookup(i).unwrap().resource, format!("/ro/{}", i));
        }
        let painted: Vec<MessageId> = viewer.surface().rows.iter().map(|r| r.id).collect();
        assert_eq!(painted, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_heartbeat_reply_produces_no_row() {
        let mut viewer = viewer();
        viewer.ingest(&event("/ro/values")).unwrap();
        assert_eq!(viewer.ingest("PONG").unwrap(), Ingested::HeartbeatReply);
        assert_eq!(viewer.ingest("PONG").unwrap(), Ingested::HeartbeatReply);

        assert_eq!(viewer.store().len(), 1);
        assert_eq!(viewer.surface().rows.len(), 1);
        assert_eq!(viewer.ingest(&event("/ro/values")).unwrap(), Ingested::Stored(1));
    }

    #[test]
    fn test_malformed_frame_leaves_state_intact() {
        let mut viewer = viewer();
        viewer.ingest(&event("/ro/values")).unwrap();
        assert!(viewer.ingest("{\"type\": ").is_err());
        assert!(viewer.ingest("PING").is_err());

        assert_eq!(viewer.store().len(), 1);
        assert_eq!(viewer.surface().rows.len(), 1);
        // The next good frame continues the sequence
        assert_eq!(viewer.ingest(&event("/ro/values")).unwrap(), Ingested::Stored(1));
    }

    #[test]
    fn test_activate_looks_up_store() {
        let mut viewer = viewer();
        viewer.ingest(&event("/ro/values")).unwrap();

        let panel = viewer.activate(0).unwrap();
        assert_eq!(panel.resource, "/ro/values");
        assert!(viewer.activate(1).is_none());
    }

    #[test]
    fn test_activate_evicted_row_is_a_no_op() {
        let store = MessageStore::with_capacity(NonZeroUsize::new(2).unwrap());
        let mut viewer = Viewer::new(store, MemorySurface::new(240.0));
        for i in 0..3 {
            viewer.ingest(&event(&format!("/ro/{}", i))).unwrap();
        }

        // The row for id 0 is still painted but its message is gone
        assert_eq!(viewer.surface().rows[0].id, 0);
        assert!(viewer.activate(0).is_none());
        assert!(viewer.activate(2).is_some());
    }
}
