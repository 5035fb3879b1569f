use std::sync::Arc;

use parking_lot::Mutex;
use tourplan_db::{Slot, Store};

use crate::turn::{ChatTurn, MapPayload, StoredTurn};

/// Ordered chat turns, written through to the session store on every change.
pub struct History {
    turns: Vec<ChatTurn>,
    store: Arc<Mutex<Store>>,
}

impl History {
    /// Rebuild from the persisted copy. Missing or unreadable data yields an
    /// empty history; the failure is logged and otherwise ignored.
    pub fn restore(store: Arc<Mutex<Store>>) -> Self {
        let raw = {
            let mut db = store.lock();
            db.slots().get(Slot::History)
        };

        let turns = match raw {
            Ok(Some(raw)) => decode(&raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "failed to load saved messages");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read saved messages");
                Vec::new()
            }
        };

        tracing::debug!(turns = turns.len(), "restored chat history");
        Self { turns, store }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Most recent turn carrying a map, scanning from the end.
    pub fn latest_map(&self) -> Option<&MapPayload> {
        self.turns.iter().rev().find_map(|turn| turn.map.as_ref())
    }

    pub fn append(&mut self, turn: ChatTurn) -> &ChatTurn {
        self.turns.push(turn);
        self.persist();
        &self.turns[self.turns.len() - 1]
    }

    /// Empty the list and drop the persisted copy.
    pub fn clear(&mut self) {
        self.turns.clear();
        let removed = {
            let mut db = self.store.lock();
            db.slots().remove(Slot::History)
        };
        if let Err(err) = removed {
            tracing::warn!(error = %err, "failed to remove saved messages");
        }
    }

    /// Drop in-memory turns only; used when the store was wiped elsewhere.
    pub(crate) fn forget(&mut self) {
        self.turns.clear();
    }

    fn persist(&self) {
        if self.turns.is_empty() {
            return;
        }
        let encoded = match encode(&self.turns) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize messages");
                return;
            }
        };
        let written = {
            let mut db = self.store.lock();
            db.slots().set(Slot::History, &encoded)
        };
        if let Err(err) = written {
            tracing::warn!(error = %err, "failed to save messages");
        }
    }
}

pub fn encode(turns: &[ChatTurn]) -> Result<String, serde_json::Error> {
    let stored: Vec<StoredTurn> = turns.iter().map(StoredTurn::from).collect();
    serde_json::to_string(&stored)
}

pub fn decode(raw: &str) -> Result<Vec<ChatTurn>, serde_json::Error> {
    let stored: Vec<StoredTurn> = serde_json::from_str(raw)?;
    Ok(stored.into_iter().map(ChatTurn::from).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tourplan_api::Role;
    use tourplan_db::{Slot, Store};

    use super::{History, decode, encode};
    use crate::turn::{ChatTurn, MapPayload, Route};

    fn shared_store() -> Arc<Mutex<Store>> {
        Arc::new(Mutex::new(Store::open_in_memory().expect("open store")))
    }

    fn paris_reply() -> ChatTurn {
        ChatTurn::assistant("Here is a plan").with_map(MapPayload {
            image_reference: "X".to_string(),
            journey: Route {
                origin: "NYC".to_string(),
                destination: "Paris".to_string(),
            },
        })
    }

    #[test]
    fn append_writes_through_and_restore_reads_back() {
        let store = shared_store();
        let mut history = History::restore(Arc::clone(&store));
        assert!(history.is_empty());

        history.append(ChatTurn::user("Plan a trip to Paris"));
        history.append(paris_reply());

        let restored = History::restore(store);
        assert_eq!(restored.len(), 2);
        for (original, restored) in history.turns().iter().zip(restored.turns()) {
            assert_eq!(original.id, restored.id);
            assert_eq!(original.role, restored.role);
            assert_eq!(original.content, restored.content);
            assert_eq!(original.map, restored.map);
            assert_eq!(
                original.timestamp.timestamp(),
                restored.timestamp.timestamp()
            );
        }
    }

    #[test]
    fn corrupt_history_restores_empty() {
        let store = shared_store();
        store
            .lock()
            .slots()
            .set(Slot::History, "{not json")
            .expect("set");

        let history = History::restore(store);
        assert!(history.is_empty());
    }

    #[test]
    fn clear_removes_persisted_copy() {
        let store = shared_store();
        let mut history = History::restore(Arc::clone(&store));
        history.append(ChatTurn::user("hello"));

        history.clear();

        assert!(history.is_empty());
        assert_eq!(store.lock().slots().get(Slot::History).expect("get"), None);
    }

    #[test]
    fn latest_map_scans_from_the_end() {
        let store = shared_store();
        let mut history = History::restore(store);
        history.append(ChatTurn::user("Plan a trip to Paris"));
        history.append(paris_reply());
        history.append(ChatTurn::user("Thanks"));
        history.append(ChatTurn::assistant("You're welcome"));

        let latest = history.latest_map().expect("map");
        assert_eq!(latest.journey.origin, "NYC");
    }

    #[test]
    fn decodes_browser_style_timestamps() {
        let raw = r#"[
            {"id":"1700000000000","role":"user","content":"Plan a trip to Paris","timestamp":"2023-11-14T22:13:20.000Z"},
            {"id":"1700000000001","role":"assistant","content":"Here is a plan","timestamp":"2023-11-14T22:13:21.500Z",
             "map_image_url":"X","journey_details":{"origin":"NYC","destination":"Paris"}}
        ]"#;

        let turns = decode(raw).expect("decode");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(turns[1].map.as_ref().map(|m| m.image_reference.as_str()), Some("X"));

        let reencoded = encode(&turns).expect("encode");
        assert_eq!(decode(&reencoded).expect("decode again"), turns);
    }
}
