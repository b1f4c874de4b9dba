//! Process-wide shared key-value store

use crate::filter::host::{HostError, SharedData};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug)]
struct Slot {
    data: Bytes,
    version: u32,
}

/// In-memory [`SharedData`] with per-key versions.
///
/// Versions start at 1 and grow by one on every successful write of the key.
/// Writing a key that does not exist yet always succeeds, whatever `cas` says.
#[derive(Debug, Default)]
pub struct InMemorySharedData {
    slots: Mutex<HashMap<String, Slot>>,
}

impl InMemorySharedData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl SharedData for InMemorySharedData {
    fn get_shared_data(&self, key: &str) -> Result<(Option<Bytes>, Option<u32>), HostError> {
        Ok(match self.slots.lock().get(key) {
            Some(slot) => (Some(slot.data.clone()), Some(slot.version)),
            None => (None, None),
        })
    }

    fn set_shared_data(&self, key: &str, value: &[u8], cas: Option<u32>) -> Result<(), HostError> {
        let mut slots = self.slots.lock();
        match slots.get_mut(key) {
            Some(slot) => {
                if cas.is_some_and(|cas| cas != slot.version) {
                    return Err(HostError::CasMismatch(key.to_string()));
                }
                slot.data = Bytes::copy_from_slice(value);
                slot.version = slot.version.wrapping_add(1);
            }
            None => {
                slots.insert(
                    key.to_string(),
                    Slot {
                        data: Bytes::copy_from_slice(value),
                        version: 1,
                    },
                );
            }
        }
        Ok(())
    }
}
