//! Master key slot
//!
//! Holds the unlocked master key for the lifetime of a session. Absence of a
//! key means the keychain is locked. The idle monitor clears the slot.
//!
//! ## Security Notes
//!
//! - Key bytes are zeroized when the slot is cleared or dropped
//! - On unix the backing buffer is locked with `mlock()` so it is not swapped
//!   to disk; failures are logged and the key is kept anyway

use crate::error::{KeychainError, KeychainResult};
use std::sync::Mutex;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

/// Key bytes plus the memory lock state of their buffer.
struct Secret {
    bytes: Zeroizing<Vec<u8>>,
    mlocked: bool,
}

impl Secret {
    fn new(bytes: Vec<u8>) -> Self {
        let bytes = Zeroizing::new(bytes);
        let mlocked = lock_pages(&bytes);
        Self { bytes, mlocked }
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.mlocked {
            unlock_pages(&self.bytes);
        }
    }
}

/// Shared master key slot.
#[derive(Default)]
pub struct MasterKey {
    secret: Mutex<Option<Secret>>,
}

impl MasterKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `key`, replacing (and wiping) any previous one.
    pub fn unlock(&self, key: Vec<u8>) {
        let secret = Secret::new(key);
        *self.secret.lock().unwrap() = Some(secret);
        debug!("Master key unlocked");
    }

    /// Wipe the key. Returns true if a key was present.
    pub fn lock(&self) -> bool {
        let previous = self.secret.lock().unwrap().take();
        previous.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.secret.lock().unwrap().is_some()
    }

    /// Run `f` with the key bytes, or fail with [`KeychainError::Locked`].
    pub fn with_key<T>(&self, f: impl FnOnce(&[u8]) -> T) -> KeychainResult<T> {
        let guard = self.secret.lock().unwrap();
        match guard.as_ref() {
            Some(secret) => Ok(f(&secret.bytes)),
            None => Err(KeychainError::Locked),
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}

#[cfg(unix)]
fn lock_pages(buf: &Vec<u8>) -> bool {
    if buf.capacity() == 0 {
        return false;
    }

    // SAFETY: the range is the vector's own allocation, which outlives the
    // lock because `Secret` unlocks it in `drop` before the buffer is freed.
    let result = unsafe { libc::mlock(buf.as_ptr() as *const libc::c_void, buf.capacity()) };
    if result == 0 {
        return true;
    }

    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
    let reason = match errno {
        libc::ENOMEM => "exceeds RLIMIT_MEMLOCK",
        libc::EPERM => "missing CAP_IPC_LOCK",
        _ => "unknown error",
    };
    tracing::warn!(
        "Could not lock master key memory: {} (errno {}). Key may be swapped to disk.",
        reason,
        errno
    );
    false
}

#[cfg(unix)]
fn unlock_pages(buf: &Vec<u8>) {
    // SAFETY: same allocation that was passed to `mlock`; zeroize keeps the
    // capacity intact.
    let result = unsafe { libc::munlock(buf.as_ptr() as *const libc::c_void, buf.capacity()) };
    if result != 0 {
        debug!("munlock returned non-zero");
    }
}

#[cfg(not(unix))]
fn lock_pages(_buf: &Vec<u8>) -> bool {
    tracing::warn!("Memory locking not supported on this platform");
    false
}

#[cfg(not(unix))]
fn unlock_pages(_buf: &Vec<u8>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_locked() {
        let key = MasterKey::new();
        assert!(!key.is_unlocked());
        assert!(matches!(key.with_key(|_| ()), Err(KeychainError::Locked)));
    }

    #[test]
    fn test_unlock_then_lock() {
        let key = MasterKey::new();
        key.unlock(vec![7u8; 32]);
        assert!(key.is_unlocked());
        assert_eq!(key.with_key(|k| k.len()).unwrap(), 32);

        assert!(key.lock());
        assert!(!key.is_unlocked());
        assert!(!key.lock());
    }

    #[test]
    fn test_unlock_replaces_key() {
        let key = MasterKey::new();
        key.unlock(vec![1, 2, 3]);
        key.unlock(vec![4, 5]);
        assert_eq!(key.with_key(|k| k.to_vec()).unwrap(), vec![4, 5]);
    }

    #[test]
    fn test_empty_key_is_still_unlocked() {
        let key = MasterKey::new();
        key.unlock(Vec::new());
        assert!(key.is_unlocked());
    }

    #[test]
    fn test_debug_hides_bytes() {
        let key = MasterKey::new();
        key.unlock(b"secret".to_vec());
        let debug = format!("{:?}", key);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("unlocked: true"));
    }
}
