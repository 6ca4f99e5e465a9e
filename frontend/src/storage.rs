use crate::models::ChatTurn;

/// Local-storage slot holding the JSON-encoded conversation.
pub const HISTORY_KEY: &str = "chatHistory";

/// Where the conversation survives page reloads.
pub trait HistoryStore {
    /// Returns the saved conversation, or an empty one if nothing usable is stored.
    fn load(&self) -> Vec<ChatTurn>;
    fn save(&self, history: &[ChatTurn]) -> Result<(), String>;
    fn clear(&self) -> Result<(), String>;
}

/// Parses a stored history. Corrupt data is discarded rather than surfaced.
pub fn decode_history(raw: &str) -> Vec<ChatTurn> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        log::warn!("Discarding unreadable chat history: {e}");
        Vec::new()
    })
}

pub fn encode_history(history: &[ChatTurn]) -> Result<String, String> {
    serde_json::to_string(history).map_err(|e| format!("Serialize error: {e}"))
}

/// Browser `window.localStorage`.
#[derive(Clone, Debug)]
pub struct LocalStorageStore {
    key: String,
}

impl Default for LocalStorageStore {
    fn default() -> Self {
        Self { key: HISTORY_KEY.to_string() }
    }
}

impl LocalStorageStore {
    fn storage() -> Result<web_sys::Storage, String> {
        web_sys::window()
            .ok_or_else(|| "No window available".to_string())?
            .local_storage()
            .map_err(|e| format!("Storage error: {e:?}"))?
            .ok_or_else(|| "localStorage is disabled".to_string())
    }
}

impl HistoryStore for LocalStorageStore {
    fn load(&self) -> Vec<ChatTurn> {
        let raw = Self::storage().and_then(|s| {
            s.get_item(&self.key).map_err(|e| format!("Storage error: {e:?}"))
        });
        match raw {
            Ok(Some(raw)) => decode_history(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read chat history: {e}");
                Vec::new()
            }
        }
    }

    fn save(&self, history: &[ChatTurn]) -> Result<(), String> {
        let json = encode_history(history)?;
        Self::storage()?
            .set_item(&self.key, &json)
            .map_err(|e| format!("Storage error: {e:?}"))
    }

    fn clear(&self) -> Result<(), String> {
        Self::storage()?
            .remove_item(&self.key)
            .map_err(|e| format!("Storage error: {e:?}"))
    }
}

/// In-memory slot with the same JSON encoding as local storage.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slot: std::rc::Rc<std::cell::RefCell<Option<String>>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_raw(raw: &str) -> Self {
        let store = Self::default();
        *store.slot.borrow_mut() = Some(raw.to_string());
        store
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    pub fn persisted(&self) -> Vec<ChatTurn> {
        self.raw().map(|r| decode_history(&r)).unwrap_or_default()
    }
}

#[cfg(test)]
impl HistoryStore for MemoryStore {
    fn load(&self) -> Vec<ChatTurn> {
        self.raw().map(|r| decode_history(&r)).unwrap_or_default()
    }

    fn save(&self, history: &[ChatTurn]) -> Result<(), String> {
        *self.slot.borrow_mut() = Some(encode_history(history)?);
        Ok(())
    }

    fn clear(&self) -> Result<(), String> {
        *self.slot.borrow_mut() = None;
        Ok(())
    }
}
