use crate::config::ConnectionConfig;

const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

const CLAUSE_KEYWORDS: [&str; 13] = [
    "SELECT", "FROM", "WHERE", "JOIN", "HAVING", "UNION", "INSERT", "UPDATE", "DELETE", "CREATE",
    "DROP", "ALTER", "LIMIT",
];

const CLAUSE_KEYWORD_PAIRS: [(&str, &str); 7] = [
    ("ORDER", "BY"),
    ("GROUP", "BY"),
    ("LEFT", "JOIN"),
    ("RIGHT", "JOIN"),
    ("INNER", "JOIN"),
    ("OUTER", "JOIN"),
    ("CROSS", "JOIN"),
];

const CONDITION_KEYWORDS: [&str; 2] = ["AND", "OR"];

#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

#[must_use]
pub fn qualified_table_name(database: Option<&str>, table: &str) -> String {
    match database {
        Some(database) => format!("{}.{}", quote_identifier(database), quote_identifier(table)),
        None => quote_identifier(table),
    }
}

/// `user@host:port/db`, without the password.
#[must_use]
pub fn format_connection_string(config: &ConnectionConfig) -> String {
    config.identity().to_string()
}

#[must_use]
pub fn format_duration(millis: u64) -> String {
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", millis as f64 / 1_000.0)
    } else {
        let minutes = millis / 60_000;
        let seconds = ((millis % 60_000) as f64 / 1_000.0).round();
        format!("{minutes}m {seconds}s")
    }
}

#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", BYTE_UNITS[unit_index])
}

#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word,
    Literal,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    spaced: bool,
}

/// Lays a statement out one clause per line. Quoted literals and
/// identifiers are copied through untouched.
#[must_use]
pub fn format_query(sql: &str) -> String {
    let tokens = tokenize(sql);
    let mut out = String::with_capacity(sql.len() + 16);
    let mut index = 0;

    while index < tokens.len() {
        let token = &tokens[index];
        match token.kind {
            TokenKind::Comma => {
                trim_trailing_spaces(&mut out);
                out.push_str(",\n  ");
            }
            TokenKind::Literal => push_token(&mut out, token),
            TokenKind::Word => {
                let next_word = tokens
                    .get(index + 1)
                    .filter(|next| next.kind == TokenKind::Word);
                let pair = next_word.filter(|next| {
                    CLAUSE_KEYWORD_PAIRS.iter().any(|(first, second)| {
                        token.text.eq_ignore_ascii_case(first)
                            && next.text.eq_ignore_ascii_case(second)
                    })
                });

                if let Some(next) = pair {
                    start_line(&mut out, "");
                    out.push_str(&token.text);
                    out.push(' ');
                    out.push_str(&next.text);
                    index += 1;
                } else if is_one_of(&token.text, &CLAUSE_KEYWORDS) {
                    start_line(&mut out, "");
                    out.push_str(&token.text);
                } else if is_one_of(&token.text, &CONDITION_KEYWORDS) {
                    start_line(&mut out, "  ");
                    out.push_str(&token.text);
                } else {
                    push_token(&mut out, token);
                }
            }
        }
        index += 1;
    }

    out.trim().to_string()
}

fn is_one_of(word: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

fn trim_trailing_spaces(out: &mut String) {
    let trimmed_len = out.trim_end_matches(' ').len();
    out.truncate(trimmed_len);
}

fn start_line(out: &mut String, indent: &str) {
    trim_trailing_spaces(out);
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(indent);
}

fn push_token(out: &mut String, token: &Token) {
    if token.spaced && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
    out.push_str(&token.text);
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    let mut spaced = false;

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            spaced = true;
            chars.next();
            continue;
        }

        if ch == ',' {
            chars.next();
            tokens.push(Token {
                kind: TokenKind::Comma,
                text: ",".to_string(),
                spaced,
            });
        } else if matches!(ch, '\'' | '"' | '`') {
            let mut text = String::new();
            text.push(ch);
            chars.next();
            while let Some(inner) = chars.next() {
                text.push(inner);
                if inner == '\\' && ch != '`' {
                    if let Some(escaped) = chars.next() {
                        text.push(escaped);
                    }
                } else if inner == ch {
                    if chars.peek() == Some(&ch) {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            tokens.push(Token {
                kind: TokenKind::Literal,
                text,
                spaced,
            });
        } else {
            let mut text = String::new();
            while let Some(&inner) = chars.peek() {
                if inner.is_whitespace() || matches!(inner, ',' | '\'' | '"' | '`') {
                    break;
                }
                text.push(inner);
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Word,
                text,
                spaced,
            });
        }
        spaced = false;
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::{
        format_bytes, format_connection_string, format_duration, format_query,
        qualified_table_name, quote_identifier, truncate_text,
    };
    use crate::config::ConnectionConfig;

    #[test]
    fn connection_string_omits_password() {
        let config = ConnectionConfig::new("db.internal", "app")
            .with_password("hunter2")
            .with_database("orders");
        assert_eq!(format_connection_string(&config), "app@db.internal:3306/orders");

        let config = ConnectionConfig::new("localhost", "root").with_port(3307);
        assert_eq!(format_connection_string(&config), "root@localhost:3307");
    }

    #[test]
    fn identifiers_escape_backticks() {
        assert_eq!(quote_identifier("weird`name"), "`weird``name`");
        assert_eq!(
            qualified_table_name(Some("app"), "users"),
            "`app`.`users`"
        );
        assert_eq!(qualified_table_name(None, "users"), "`users`");
    }

    #[test]
    fn durations_switch_units() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1_500), "1.50s");
        assert_eq!(format_duration(125_000), "2m 5s");
    }

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1_536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("ñandú salvaje", 5), "ñandú...");
    }

    #[test]
    fn format_query_breaks_clauses_and_columns() {
        let formatted = format_query(
            "select id,  email from users   where active = 1 and age > 30 order by id",
        );
        assert_eq!(
            formatted,
            "select id,\n  email\nfrom users\nwhere active = 1\n  and age > 30\norder by id"
        );
    }

    #[test]
    fn format_query_keeps_literals_intact() {
        let formatted = format_query("SELECT * FROM t WHERE name='a, b' AND note = \"x  y\"");
        assert_eq!(
            formatted,
            "SELECT *\nFROM t\nWHERE name='a, b'\n  AND note = \"x  y\""
        );
    }
}
