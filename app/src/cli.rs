use std::io;

use quarry_core::config::{ConnectionConfig, DEFAULT_MYSQL_PORT};

pub const PASSWORD_ENV: &str = "QUARRY_DB_PASSWORD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Run,
    HelpRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub host: Option<String>,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
    pub ephemeral: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_MYSQL_PORT,
            user: "root".to_string(),
            database: None,
            ephemeral: false,
        }
    }
}

impl CliOptions {
    /// Connection to open at startup, if a host was given.
    #[must_use]
    pub fn startup_connection(&self) -> Option<ConnectionConfig> {
        let host = self.host.as_ref()?;
        let config = ConnectionConfig::new(host.clone(), self.user.clone()).with_port(self.port);
        Some(match &self.database {
            Some(database) => config.with_database(database.clone()),
            None => config,
        })
    }
}

pub fn parse_args_from(
    args: impl IntoIterator<Item = String>,
    options: &mut CliOptions,
) -> io::Result<ParseOutcome> {
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::HelpRequested),
            "--host" => options.host = Some(next_value(&mut args, "--host")?),
            "--port" => {
                options.port = next_value(&mut args, "--port")?
                    .parse::<u16>()
                    .map_err(|error| io_other(format!("invalid --port value: {error}")))?;
            }
            "--user" => options.user = next_value(&mut args, "--user")?,
            "--database" => options.database = Some(next_value(&mut args, "--database")?),
            "--ephemeral" => options.ephemeral = true,
            _ => {
                return Err(io_other(format!("unknown argument `{flag}`")));
            }
        }
    }

    Ok(ParseOutcome::Run)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> io::Result<String> {
    args.next()
        .ok_or_else(|| io_other(format!("missing value for `{flag}`")))
}

pub fn print_help() {
    println!(
        "quarry MySQL console\n\n\
Usage:\n  quarry [OPTIONS]\n\n\
Options:\n  --host <host>        Connect to this MySQL host at startup\n  --port <port>        MySQL port (default: 3306)\n  --user <user>        MySQL user (default: root)\n  --database <name>    Default database\n  --ephemeral          Keep history, bookmarks and preferences in memory only\n\n\
Environment:\n  {PASSWORD_ENV} is used for authentication, falling back to the keyring.\n  QUARRY_LOG / RUST_LOG set the log filter.\n  QUARRY_CONFIG_DIR overrides the configuration directory.\n"
    );
}

pub fn io_other(error: impl std::fmt::Display) -> io::Error {
    io::Error::other(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::{parse_args_from, CliOptions, ParseOutcome};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| (*arg).to_string()).collect()
    }

    #[test]
    fn parse_args_from_applies_overrides() {
        let mut options = CliOptions::default();
        let outcome = parse_args_from(
            args(&[
                "--host",
                "db.internal",
                "--port",
                "33306",
                "--user",
                "app",
                "--database",
                "orders",
                "--ephemeral",
            ]),
            &mut options,
        )
        .expect("parse should succeed");

        assert_eq!(outcome, ParseOutcome::Run);
        assert_eq!(options.host.as_deref(), Some("db.internal"));
        assert_eq!(options.port, 33306);
        assert_eq!(options.user, "app");
        assert_eq!(options.database.as_deref(), Some("orders"));
        assert!(options.ephemeral);

        let config = options.startup_connection().expect("host was given");
        assert_eq!(config.identity().to_string(), "app@db.internal:33306/orders");
    }

    #[test]
    fn no_host_means_no_startup_connection() {
        let mut options = CliOptions::default();
        parse_args_from(Vec::new(), &mut options).expect("parse should succeed");
        assert!(options.startup_connection().is_none());
    }

    #[test]
    fn help_short_circuits() {
        let mut options = CliOptions::default();
        let outcome =
            parse_args_from(args(&["--help", "--bogus"]), &mut options).expect("help parses");
        assert_eq!(outcome, ParseOutcome::HelpRequested);
    }

    #[test]
    fn rejects_unknown_flags_and_missing_values() {
        let mut options = CliOptions::default();
        let error = parse_args_from(args(&["--bogus"]), &mut options)
            .expect_err("unknown flag should fail");
        assert!(error.to_string().contains("unknown argument"));

        let error = parse_args_from(args(&["--port"]), &mut options)
            .expect_err("missing value should fail");
        assert!(error.to_string().contains("missing value for `--port`"));

        let error = parse_args_from(args(&["--port", "99999"]), &mut options)
            .expect_err("out of range port should fail");
        assert!(error.to_string().contains("invalid --port value"));
    }
}
