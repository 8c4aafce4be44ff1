//! Rotating pool of API keys shared by every run.

use std::fmt;
use std::sync::Mutex;

use tracing::info;

/// API keys used round-robin on quota or auth failures.
///
/// The cursor is guarded by a mutex so concurrent runs agree on the active
/// key. The lock is never held across an await point.
pub struct KeyPool {
    keys: Vec<String>,
    cursor: Mutex<usize>,
}

impl KeyPool {
    /// Create a pool; blank keys are dropped
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k: String| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            keys,
            cursor: Mutex::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn cursor(&self) -> usize {
        // A poisoned cursor is still a valid index
        match self.cursor.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// The active key and its index
    pub fn current(&self) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.cursor() % self.keys.len();
        Some((idx, self.keys[idx].as_str()))
    }

    /// Move past `failed_index` unless another caller already did
    pub fn rotate_from(&self, failed_index: usize) {
        if self.keys.is_empty() {
            return;
        }

        let mut guard = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if *guard % self.keys.len() == failed_index {
            *guard = (failed_index + 1) % self.keys.len();
            info!(from = failed_index, to = *guard, "Rotated API key");
        }
    }
}

impl fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPool")
            .field("keys", &self.keys.len())
            .field("cursor", &self.cursor())
            .finish()
    }
}
