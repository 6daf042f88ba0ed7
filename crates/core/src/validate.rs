use thiserror::Error;

use crate::config::ConnectionConfig;

const MAX_IDENTIFIER_LEN: usize = 64;

const RESERVED_DATABASE_NAMES: [&str; 16] = [
    "DATABASE",
    "TABLE",
    "SELECT",
    "INSERT",
    "UPDATE",
    "DELETE",
    "CREATE",
    "DROP",
    "ALTER",
    "INDEX",
    "VIEW",
    "PROCEDURE",
    "FUNCTION",
    "TRIGGER",
    "USER",
    "SCHEMA",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Database,
    Table,
    Column,
}

impl IdentifierKind {
    fn label(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Table => "table",
            Self::Column => "column",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("host is required")]
    MissingHost,
    #[error("invalid host format `{0}`")]
    InvalidHost(String),
    #[error("port must be between 1 and 65535")]
    InvalidPort,
    #[error("username is required")]
    MissingUser,
    #[error("{} name is required", .0.label())]
    EmptyIdentifier(IdentifierKind),
    #[error("{} name must be 64 characters or less", .0.label())]
    IdentifierTooLong(IdentifierKind),
    #[error("{} name can only contain letters, numbers, underscores, and dollar signs", .0.label())]
    InvalidIdentifierCharacters(IdentifierKind),
    #[error("{} name cannot be a reserved SQL keyword", .0.label())]
    ReservedIdentifier(IdentifierKind),
}

pub fn validate_connection_config(config: &ConnectionConfig) -> Result<(), ValidationError> {
    let host = config.host.trim();
    if host.is_empty() {
        return Err(ValidationError::MissingHost);
    }
    if config.port == 0 {
        return Err(ValidationError::InvalidPort);
    }
    if config.user.trim().is_empty() {
        return Err(ValidationError::MissingUser);
    }
    if !is_ipv4_shape(host) && !is_hostname(host) {
        return Err(ValidationError::InvalidHost(host.to_string()));
    }
    Ok(())
}

/// Checks a name against plain (unquoted) MySQL identifier rules.
pub fn validate_identifier(kind: IdentifierKind, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyIdentifier(kind));
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong(kind));
    }
    if !name
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
    {
        return Err(ValidationError::InvalidIdentifierCharacters(kind));
    }
    if kind == IdentifierKind::Database
        && RESERVED_DATABASE_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
    {
        return Err(ValidationError::ReservedIdentifier(kind));
    }
    Ok(())
}

fn is_ipv4_shape(host: &str) -> bool {
    let octets = host.split('.').collect::<Vec<_>>();
    octets.len() == 4
        && octets
            .iter()
            .all(|octet| (1..=3).contains(&octet.len()) && octet.bytes().all(|b| b.is_ascii_digit()))
}

fn is_hostname(host: &str) -> bool {
    host.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-')
}
