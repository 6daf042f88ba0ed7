use std::collections::HashSet;

use crate::catalog::Catalog;

pub const SQL_KEYWORDS: [&str; 29] = [
    "SELECT",
    "FROM",
    "WHERE",
    "INSERT",
    "UPDATE",
    "DELETE",
    "CREATE",
    "DROP",
    "ALTER",
    "TABLE",
    "DATABASE",
    "INDEX",
    "JOIN",
    "LEFT JOIN",
    "RIGHT JOIN",
    "INNER JOIN",
    "OUTER JOIN",
    "ORDER BY",
    "GROUP BY",
    "HAVING",
    "LIMIT",
    "OFFSET",
    "AND",
    "OR",
    "NOT",
    "IN",
    "EXISTS",
    "LIKE",
    "BETWEEN",
];

/// Keywords, then cached database names, then cached table names.
/// Derived on demand so it always reflects the current catalog.
#[must_use]
pub fn completions(catalog: &Catalog) -> Vec<String> {
    let mut seen = HashSet::new();
    SQL_KEYWORDS
        .iter()
        .map(|keyword| (*keyword).to_string())
        .chain(catalog.databases().iter().cloned())
        .chain(catalog.tables().iter().map(|table| table.name.clone()))
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// Candidates starting with `prefix`, compared case-insensitively.
#[must_use]
pub fn completions_with_prefix(catalog: &Catalog, prefix: &str) -> Vec<String> {
    let prefix = prefix.trim().to_ascii_lowercase();
    completions(catalog)
        .into_iter()
        .filter(|candidate| candidate.to_ascii_lowercase().starts_with(&prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{completions, completions_with_prefix, SQL_KEYWORDS};
    use crate::catalog::Catalog;
    use crate::testing::FakeDriver;

    #[test]
    fn empty_catalog_offers_keywords_only() {
        let candidates = completions(&Catalog::default());
        assert_eq!(candidates.len(), SQL_KEYWORDS.len());
        assert_eq!(candidates[0], "SELECT");
    }

    #[tokio::test]
    async fn includes_cached_databases_and_tables() {
        let driver = FakeDriver::default();
        let mut catalog = Catalog::default();
        catalog
            .load_databases(&driver)
            .await
            .expect("databases should load");
        catalog
            .load_tables(&driver, "app")
            .await
            .expect("tables should load");

        let candidates = completions(&catalog);
        assert!(candidates.contains(&"analytics".to_string()));
        assert!(candidates.contains(&"users".to_string()));
        assert_eq!(candidates.len(), SQL_KEYWORDS.len() + 4);

        let filtered = completions_with_prefix(&catalog, "se");
        assert_eq!(filtered, vec!["SELECT".to_string(), "sessions".to_string()]);
    }
}
