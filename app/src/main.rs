mod cli;
mod console;

use std::io::Write as _;
use std::sync::Arc;

use quarry_adapters::{DriverOptions, KeyringCredentials, MysqlDriver};
use quarry_core::config::ConnectionConfig;
use quarry_core::credentials::CredentialStore;
use quarry_core::driver::DatabaseDriver;
use quarry_core::settings::{self, Settings};
use quarry_core::storage::{FileStateStore, MemoryStateStore, StateStore};
use quarry_core::workspace::Workspace;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::cli::{CliOptions, ParseOutcome, PASSWORD_ENV};
use crate::console::{drain_toasts, parse_command, Console, Flow, InputBuffer};

const LOG_ENV: &str = "QUARRY_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut options = CliOptions::default();
    if cli::parse_args_from(std::env::args().skip(1), &mut options)? == ParseOutcome::HelpRequested
    {
        cli::print_help();
        return Ok(());
    }

    let settings = settings::load_default()?;
    init_logging(settings.log_filter.as_deref());
    run(options, settings).await
}

async fn run(options: CliOptions, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(options.ephemeral);
    let credentials: Arc<dyn CredentialStore> = Arc::new(KeyringCredentials::default());
    let driver = Arc::new(MysqlDriver::new(DriverOptions::from_settings(&settings)));
    let mut workspace =
        Workspace::open(driver, store, &settings).with_credentials(Arc::clone(&credentials));

    if let Some(mut config) = options.startup_connection() {
        let env_password = std::env::var(PASSWORD_ENV).ok();
        config.password = resolve_password(&config, env_password, credentials.as_ref());
        workspace.connect(config).await;
    }
    print_toasts(&mut workspace);

    let mut console = Console::default();
    let mut buffer = InputBuffer::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&workspace, buffer.is_pending())?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = buffer.push_line(&line) else {
            continue;
        };
        let flow = console.run_command(&mut workspace, parse_command(&input)).await;
        print_toasts(&mut workspace);
        if flow == Flow::Quit {
            break;
        }
    }

    if workspace.connection().is_connected() {
        workspace.disconnect().await;
    }
    Ok(())
}

fn open_store(ephemeral: bool) -> Arc<dyn StateStore> {
    if ephemeral {
        return Arc::new(MemoryStateStore::new());
    }
    match FileStateStore::open_default() {
        Ok(store) => {
            tracing::debug!(dir = %store.dir().display(), "using state directory");
            Arc::new(store)
        }
        Err(error) => {
            tracing::warn!(%error, "state directory unavailable; nothing will be saved");
            Arc::new(MemoryStateStore::new())
        }
    }
}

/// `QUARRY_DB_PASSWORD` wins over a password remembered in the keyring.
fn resolve_password(
    config: &ConnectionConfig,
    env_password: Option<String>,
    credentials: &dyn CredentialStore,
) -> String {
    env_password
        .filter(|password| !password.is_empty())
        .or_else(|| credentials.load(&config.identity()))
        .unwrap_or_default()
}

fn prompt<D: DatabaseDriver>(
    workspace: &Workspace<D>,
    continuation: bool,
) -> std::io::Result<()> {
    let label = if continuation {
        "    -> ".to_string()
    } else {
        match workspace.connection().selected_database() {
            Some(database) => format!("quarry [{database}]> "),
            None if workspace.connection().is_connected() => "quarry> ".to_string(),
            None => "quarry (offline)> ".to_string(),
        }
    };
    let mut stdout = std::io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()
}

fn print_toasts<D: DatabaseDriver>(workspace: &mut Workspace<D>) {
    for line in drain_toasts(workspace) {
        eprintln!("{line}");
    }
}

fn init_logging(settings_filter: Option<&str>) {
    let filter = build_env_filter(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        settings_filter,
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Priority: `QUARRY_LOG` > `RUST_LOG` > settings file > `info`.
fn build_env_filter(
    quarry_log: Option<String>,
    rust_log: Option<String>,
    settings_filter: Option<&str>,
) -> EnvFilter {
    let candidates = [quarry_log, rust_log, settings_filter.map(str::to_string)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|filter| EnvFilter::try_new(filter).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
