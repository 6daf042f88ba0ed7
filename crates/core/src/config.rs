use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection parameters entered by the user.
///
/// The password is kept in memory only; serialized configs (connection
/// history) never carry it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip)]
    pub password: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MYSQL_PORT,
            user: user.into(),
            password: String::new(),
            database: None,
        }
        .normalized()
    }

    /// Trims host and user so validation, history and the driver all see
    /// the same strings. The password is left untouched.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.host = self.host.trim().to_string();
        self.user = self.user.trim().to_string();
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.trim().is_empty()).then_some(database);
        self
    }

    #[must_use]
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
        }
    }

    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.user == other.user
            && self.database == other.database
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// The tuple used to deduplicate connection history entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionIdentity {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
}

impl ConnectionIdentity {
    /// Stable textual key, used as the keyring account name.
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.user,
            self.host,
            self.port,
            self.database.as_deref().unwrap_or_default()
        )
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)?;
        if let Some(database) = &self.database {
            write!(f, "/{database}")?;
        }
        Ok(())
    }
}
