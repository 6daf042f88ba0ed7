use quarry_core::config::ConnectionIdentity;
use quarry_core::credentials::CredentialStore;

pub const DEFAULT_KEYRING_SERVICE: &str = "quarry";

/// Keeps connection passwords in the platform keychain, one entry per
/// connection identity.
#[derive(Debug, Clone)]
pub struct KeyringCredentials {
    service: String,
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new(DEFAULT_KEYRING_SERVICE)
    }
}

impl KeyringCredentials {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl KeyringCredentials {
    fn entry(&self, identity: &ConnectionIdentity) -> Option<keyring::Entry> {
        match keyring::Entry::new(&self.service, &identity.key()) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::debug!(%identity, %error, "keyring entry unavailable");
                None
            }
        }
    }
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
impl CredentialStore for KeyringCredentials {
    fn load(&self, identity: &ConnectionIdentity) -> Option<String> {
        let entry = self.entry(identity)?;
        entry.get_password().ok().filter(|password| !password.is_empty())
    }

    fn save(&self, identity: &ConnectionIdentity, password: &str) {
        if password.is_empty() {
            return;
        }
        if let Some(entry) = self.entry(identity) {
            if let Err(error) = entry.set_password(password) {
                tracing::warn!(%identity, %error, "failed to store password in keyring");
            }
        }
    }

    fn forget(&self, identity: &ConnectionIdentity) {
        if let Some(entry) = self.entry(identity) {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(error) => {
                    tracing::warn!(%identity, %error, "failed to remove password from keyring");
                }
            }
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl CredentialStore for KeyringCredentials {
    fn load(&self, _identity: &ConnectionIdentity) -> Option<String> {
        None
    }

    fn save(&self, _identity: &ConnectionIdentity, _password: &str) {}

    fn forget(&self, _identity: &ConnectionIdentity) {}
}
