use std::fmt::Write as _;
use std::path::PathBuf;

use quarry_adapters::export;
use quarry_core::config::ConnectionConfig;
use quarry_core::driver::{DatabaseDriver, QueryOutput};
use quarry_core::format::{format_bytes, format_duration, format_query, truncate_text};
use quarry_core::notifications::ToastLevel;
use quarry_core::query_session::QueryResult;
use quarry_core::workspace::Workspace;

const CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sql(String),
    Help,
    Quit,
    Use(String),
    Databases,
    Tables,
    Describe(String),
    Data { table: String, page: u64 },
    History,
    Connections,
    Reconnect(usize),
    Forget(usize),
    Disconnect,
    Ping,
    Bookmark(String),
    Bookmarks,
    Open(usize),
    Run,
    Export(PathBuf),
    Format(String),
    Complete(String),
    Theme,
    Invalid(String),
}

/// Parses one complete console input. Backslash commands take the rest of
/// the line as arguments; anything else is SQL.
#[must_use]
pub fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('\\') else {
        return Command::Sql(input.to_string());
    };
    let (name, argument) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(name, argument)| (name, argument.trim()));

    match name {
        "?" | "help" => Command::Help,
        "q" | "quit" => Command::Quit,
        "u" | "use" => required(argument, "\\use <database>", Command::Use),
        "l" | "databases" => Command::Databases,
        "dt" | "tables" => Command::Tables,
        "d" | "describe" => required(argument, "\\describe <table>", Command::Describe),
        "data" => parse_data(argument),
        "history" => Command::History,
        "connections" => Command::Connections,
        "reconnect" => index_argument(argument, "\\reconnect <n>", Command::Reconnect),
        "forget" => index_argument(argument, "\\forget <n>", Command::Forget),
        "disconnect" => Command::Disconnect,
        "ping" => Command::Ping,
        "bookmark" => required(argument, "\\bookmark <title>", Command::Bookmark),
        "bookmarks" => Command::Bookmarks,
        "open" => index_argument(argument, "\\open <n>", Command::Open),
        "run" => Command::Run,
        "export" => required(argument, "\\export <path>", |path| {
            Command::Export(PathBuf::from(path))
        }),
        "format" => required(argument, "\\format <sql>", Command::Format),
        "complete" => Command::Complete(argument.to_string()),
        "theme" => Command::Theme,
        other => Command::Invalid(format!("unknown command `\\{other}`; try \\help")),
    }
}

fn required(argument: &str, usage: &str, build: impl FnOnce(String) -> Command) -> Command {
    if argument.is_empty() {
        Command::Invalid(format!("usage: {usage}"))
    } else {
        build(argument.to_string())
    }
}

fn index_argument(argument: &str, usage: &str, build: impl FnOnce(usize) -> Command) -> Command {
    match argument.parse::<usize>() {
        Ok(index) if index > 0 => build(index - 1),
        _ => Command::Invalid(format!("usage: {usage} (1-based)")),
    }
}

fn parse_data(argument: &str) -> Command {
    let mut parts = argument.split_whitespace();
    let Some(table) = parts.next() else {
        return Command::Invalid("usage: \\data <table> [page]".to_string());
    };
    let page = match parts.next().map(str::parse::<u64>) {
        None => 0,
        Some(Ok(page)) if page > 0 => page - 1,
        Some(_) => return Command::Invalid("page numbers start at 1".to_string()),
    };
    Command::Data {
        table: table.to_string(),
        page,
    }
}

/// Collects console lines into complete inputs: SQL runs until a line ends
/// with `;`, backslash commands are complete on their own.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: String,
}

impl InputBuffer {
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if self.pending.is_empty() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.starts_with('\\') {
                return Some(trimmed.to_string());
            }
        } else {
            self.pending.push('\n');
        }
        self.pending.push_str(line);

        if line.trim_end().ends_with(';') {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console state that outlives a single command.
#[derive(Debug, Default)]
pub struct Console {
    last_result: Option<QueryResult>,
}

impl Console {
    pub async fn run_command<D: DatabaseDriver>(
        &mut self,
        workspace: &mut Workspace<D>,
        command: Command,
    ) -> Flow {
        match command {
            Command::Quit => return Flow::Quit,
            Command::Help => print_commands(),
            Command::Invalid(message) => eprintln!("{message}"),
            Command::Sql(sql) => self.execute(workspace, Some(&sql)).await,
            Command::Run => self.execute(workspace, None).await,
            Command::Use(database) => {
                workspace.select_database(&database).await;
                print_tables(workspace);
            }
            Command::Databases => {
                workspace.refresh_databases().await;
                for database in workspace.connection().catalog().databases() {
                    println!("{database}");
                }
            }
            Command::Tables => {
                workspace.refresh_tables().await;
                print_tables(workspace);
            }
            Command::Describe(table) => describe(workspace, &table).await,
            Command::Data { table, page } => {
                let Some(database) = selected_database(workspace) else {
                    return Flow::Continue;
                };
                let output = workspace.table_data(&database, &table, page).await;
                print!("{}", render_output(&output));
            }
            Command::History => {
                for entry in workspace.queries().history().iter() {
                    let status = if entry.success { "ok" } else { "failed" };
                    println!(
                        "{} [{status}, {}] {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        format_duration(entry.execution_time_ms),
                        truncate_text(entry.query.trim(), 80)
                    );
                }
            }
            Command::Connections => {
                for (index, entry) in workspace.connection().history().entries().iter().enumerate()
                {
                    println!("{}. {}", index + 1, entry.identity());
                }
            }
            Command::Reconnect(index) => {
                let identity = workspace
                    .connection()
                    .history()
                    .entries()
                    .get(index)
                    .map(ConnectionConfig::identity);
                match identity {
                    Some(identity) => {
                        workspace.reconnect(&identity).await;
                    }
                    None => eprintln!("no connection #{}", index + 1),
                }
            }
            Command::Forget(index) => {
                let identity = workspace
                    .connection()
                    .history()
                    .entries()
                    .get(index)
                    .map(ConnectionConfig::identity);
                if !identity.is_some_and(|identity| workspace.remove_from_history(&identity)) {
                    eprintln!("no connection #{}", index + 1);
                }
            }
            Command::Disconnect => {
                workspace.disconnect().await;
            }
            Command::Ping => {
                let alive = workspace.ping().await;
                println!("{}", if alive { "alive" } else { "not connected" });
            }
            Command::Bookmark(title) => {
                let query = self
                    .last_result
                    .as_ref()
                    .map(|result| result.query.clone())
                    .or_else(|| workspace.queries().active_tab().map(|tab| tab.content.clone()))
                    .unwrap_or_default();
                if query.trim().is_empty() {
                    eprintln!("nothing to bookmark yet");
                } else {
                    workspace.add_bookmark(title, query, Vec::new());
                }
            }
            Command::Bookmarks => {
                for (index, bookmark) in workspace.queries().bookmarks().bookmarks().iter().enumerate()
                {
                    println!(
                        "{}. {} ({})",
                        index + 1,
                        bookmark.title,
                        truncate_text(bookmark.query.trim(), 60)
                    );
                }
            }
            Command::Open(index) => {
                let id = workspace
                    .queries()
                    .bookmarks()
                    .bookmarks()
                    .get(index)
                    .map(|bookmark| bookmark.id);
                match id.and_then(|id| workspace.open_bookmark(id)) {
                    Some(tab_id) => {
                        if let Some(tab) = workspace.queries().tabs().get(tab_id) {
                            println!("-- {}\n{}", tab.title, tab.content);
                        }
                    }
                    None => eprintln!("no bookmark #{}", index + 1),
                }
            }
            Command::Export(path) => self.export(workspace, &path),
            Command::Format(sql) => println!("{}", format_query(&sql)),
            Command::Complete(prefix) => println!("{}", workspace.completions(&prefix).join("  ")),
            Command::Theme => {
                let theme = workspace.preferences_mut().toggle_theme();
                println!("theme: {theme:?}");
            }
        }
        Flow::Continue
    }

    async fn execute<D: DatabaseDriver>(&mut self, workspace: &mut Workspace<D>, sql: Option<&str>) {
        if let Some(sql) = sql {
            let tab_id = workspace.queries().active_tab().map(|tab| tab.id);
            if let Some(tab_id) = tab_id {
                workspace.queries_mut().update_tab_content(tab_id, sql);
            }
        }
        if let Some(result) = workspace.execute_query(sql, None).await {
            print!("{}", render_output(&result.output));
            self.last_result = Some(result);
        }
    }

    fn export<D: DatabaseDriver>(&self, workspace: &mut Workspace<D>, path: &std::path::Path) {
        let Some(result) = &self.last_result else {
            eprintln!("run a query before exporting");
            return;
        };
        match export::export_output(path, &result.output) {
            Ok(rows) => {
                workspace
                    .notifier_mut()
                    .success(format!("Exported {rows} rows to {}", path.display()));
            }
            Err(error) => {
                workspace.notifier_mut().error(error.to_string());
            }
        }
    }
}

fn selected_database<D: DatabaseDriver>(workspace: &Workspace<D>) -> Option<String> {
    let database = workspace.connection().selected_database().map(str::to_string);
    if database.is_none() {
        eprintln!("select a database first with \\use <database>");
    }
    database
}

async fn describe<D: DatabaseDriver>(workspace: &Workspace<D>, table: &str) {
    let Some(database) = selected_database(workspace) else {
        return;
    };
    let columns = workspace.table_structure(&database, table).await;
    if columns.is_empty() {
        eprintln!("no columns found for {database}.{table}");
        return;
    }
    for column in columns {
        println!(
            "{:<24} {:<20} {:<8} {:?} {}",
            column.name,
            column.data_type,
            if column.nullable { "NULL" } else { "NOT NULL" },
            column.key,
            column.extra
        );
    }
}

fn print_tables<D: DatabaseDriver>(workspace: &Workspace<D>) {
    for table in workspace.connection().catalog().tables() {
        println!(
            "{:<32} {:>10} rows {:>10} {}",
            table.name,
            table.info.rows,
            format_bytes(table.info.size_bytes),
            table.info.engine
        );
    }
}

/// Toasts raised since the last drain, oldest first.
pub fn drain_toasts<D: DatabaseDriver>(workspace: &mut Workspace<D>) -> Vec<String> {
    let lines = workspace
        .notifier()
        .toasts()
        .iter()
        .map(|toast| {
            let marker = match toast.level {
                ToastLevel::Success => "ok",
                ToastLevel::Info => "info",
                ToastLevel::Warning => "warn",
                ToastLevel::Error => "error",
            };
            format!("[{marker}] {}: {}", toast.title, toast.message)
        })
        .collect();
    workspace.notifier_mut().clear();
    lines
}

/// Plain-text grid of a result set, followed by a row count line.
#[must_use]
pub fn render_output(output: &QueryOutput) -> String {
    let mut rendered = String::new();
    if output.columns.is_empty() {
        let affected = output.affected_rows.unwrap_or_default();
        let _ = writeln!(rendered, "{affected} row(s) affected");
        if let Some(insert_id) = output.insert_id.filter(|id| *id > 0) {
            let _ = writeln!(rendered, "last insert id: {insert_id}");
        }
        return rendered;
    }

    let cells = output
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| truncate_text(&value.to_string(), CELL_WIDTH))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let widths = output
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            cells
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let header = output
        .columns
        .iter()
        .zip(&widths)
        .map(|(column, width)| format!("{:<width$}", column.name))
        .collect::<Vec<_>>();
    let _ = writeln!(rendered, "{}", header.join(" | ").trim_end());
    let rule = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>();
    let _ = writeln!(rendered, "{}", rule.join("-+-"));
    for row in &cells {
        let line = widths
            .iter()
            .enumerate()
            .map(|(index, width)| {
                format!("{:<width$}", row.get(index).map_or("", String::as_str))
            })
            .collect::<Vec<_>>();
        let _ = writeln!(rendered, "{}", line.join(" | ").trim_end());
    }
    let _ = writeln!(rendered, "({} rows)", output.rows.len());
    rendered
}

fn print_commands() {
    println!(
        "SQL statements run when a line ends with `;`.\n\n\
Commands:\n  \\use <db>           select a database\n  \\databases          list databases\n  \\tables             list tables of the selected database\n  \\describe <table>   show table columns\n  \\data <table> [n]   show page n of a table\n  \\history            recent queries\n  \\connections        recent connections\n  \\reconnect <n>      reconnect to a recent connection\n  \\forget <n>         drop a recent connection\n  \\disconnect         close the connection\n  \\ping               check the connection\n  \\bookmark <title>   bookmark the last query\n  \\bookmarks          list bookmarks\n  \\open <n>           open a bookmark in a new tab\n  \\run                run the active tab\n  \\export <path>      export the last result (.csv, .json, optionally .gz)\n  \\format <sql>       pretty-print SQL\n  \\complete <prefix>  completion candidates\n  \\theme              toggle the color theme\n  \\quit               exit"
    );
}
