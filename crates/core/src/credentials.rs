use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::config::ConnectionIdentity;

/// Remembers passwords for connection history entries, which are persisted
/// without them. Implementations are best-effort and log their own failures.
pub trait CredentialStore: Send + Sync {
    fn load(&self, identity: &ConnectionIdentity) -> Option<String>;
    fn save(&self, identity: &ConnectionIdentity, password: &str);
    fn forget(&self, identity: &ConnectionIdentity);
}

/// Never remembers anything; reconnecting requires the password again.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn load(&self, _identity: &ConnectionIdentity) -> Option<String> {
        None
    }

    fn save(&self, _identity: &ConnectionIdentity, _password: &str) {}

    fn forget(&self, _identity: &ConnectionIdentity) {}
}

#[derive(Debug, Default)]
pub struct MemoryCredentials {
    passwords: Mutex<HashMap<ConnectionIdentity, String>>,
}

impl CredentialStore for MemoryCredentials {
    fn load(&self, identity: &ConnectionIdentity) -> Option<String> {
        let passwords = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        passwords.get(identity).cloned()
    }

    fn save(&self, identity: &ConnectionIdentity, password: &str) {
        let mut passwords = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        passwords.insert(identity.clone(), password.to_string());
    }

    fn forget(&self, identity: &ConnectionIdentity) {
        let mut passwords = self.passwords.lock().unwrap_or_else(PoisonError::into_inner);
        passwords.remove(identity);
    }
}
