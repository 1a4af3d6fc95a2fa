//! LocalStorage-backed play history
//!
//! One JSON entry per shop. Native builds have no browser storage and fall
//! back to the in-memory store.

use crate::plays::{PlayHistory, PlayStore};

#[derive(Debug, Clone, Default)]
pub struct LocalStorageStore;

impl LocalStorageStore {
    pub fn new() -> Self {
        Self
    }

    /// Storage key for a shop (used only in wasm32)
    #[allow(dead_code)]
    fn key(shop_id: &str) -> String {
        format!("discount_arcade_plays_{}", shop_id)
    }
}

#[cfg(target_arch = "wasm32")]
fn storage() -> Option<web_sys::Storage> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok())
        .flatten()
}

#[cfg(target_arch = "wasm32")]
impl PlayStore for LocalStorageStore {
    fn load(&self, shop_id: &str) -> Option<PlayHistory> {
        let json = storage()?.get_item(&Self::key(shop_id)).ok().flatten()?;
        match serde_json::from_str::<PlayHistory>(&json) {
            Ok(history) => Some(history),
            Err(err) => {
                log::warn!("Discarding unreadable play history for {}: {}", shop_id, err);
                None
            }
        }
    }

    fn save(&mut self, history: &PlayHistory) {
        let Some(storage) = storage() else {
            return;
        };
        match serde_json::to_string(history) {
            Ok(json) => {
                if storage.set_item(&Self::key(&history.shop_id), &json).is_err() {
                    log::warn!("Failed to save play history for {}", history.shop_id);
                }
            }
            Err(err) => log::warn!("Failed to encode play history: {}", err),
        }
    }

    fn invalidate(&mut self, shop_id: &str) {
        if let Some(storage) = storage() {
            let _ = storage.remove_item(&Self::key(shop_id));
        }
    }
}

/// Native stubs
#[cfg(not(target_arch = "wasm32"))]
impl PlayStore for LocalStorageStore {
    fn load(&self, _shop_id: &str) -> Option<PlayHistory> {
        None
    }

    fn save(&mut self, _history: &PlayHistory) {
        // No-op for native
    }

    fn invalidate(&mut self, _shop_id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_per_shop() {
        assert_ne!(LocalStorageStore::key("a"), LocalStorageStore::key("b"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_store_is_empty() {
        let mut store = LocalStorageStore::new();
        let mut history = PlayHistory::new("shop");
        history.record_play(1.0);
        store.save(&history);
        assert!(store.load("shop").is_none());
    }
}
