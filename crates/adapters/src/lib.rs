pub mod export;
pub mod keyring_store;
pub mod mysql;

pub use keyring_store::KeyringCredentials;
pub use mysql::{DriverOptions, MysqlDriver};
