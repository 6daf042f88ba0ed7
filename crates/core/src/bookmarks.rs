use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{self, StateKey, StateStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBookmark {
    pub id: Uuid,
    pub title: String,
    pub query: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl QueryBookmark {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        query: impl Into<String>,
        database: Option<String>,
        tags: impl IntoIterator<Item = String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            query: query.into(),
            database,
            tags: normalize_tags(tags),
            created: now,
            updated: now,
        }
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag.trim())
    }
}

/// Fields to change on an existing bookmark; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkUpdate {
    pub title: Option<String>,
    pub query: Option<String>,
    pub database: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

/// Saved queries, in creation order. Every change is written through to the
/// state store.
pub struct BookmarkBook {
    store: Arc<dyn StateStore>,
    bookmarks: Vec<QueryBookmark>,
}

impl std::fmt::Debug for BookmarkBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookmarkBook")
            .field("bookmarks", &self.bookmarks)
            .finish_non_exhaustive()
    }
}

impl BookmarkBook {
    #[must_use]
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let bookmarks = storage::load_or_default(store.as_ref(), StateKey::Bookmarks);
        Self { store, bookmarks }
    }

    #[must_use]
    pub fn bookmarks(&self) -> &[QueryBookmark] {
        &self.bookmarks
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&QueryBookmark> {
        self.bookmarks.iter().find(|bookmark| bookmark.id == id)
    }

    #[must_use]
    pub fn tagged(&self, tag: &str) -> Vec<&QueryBookmark> {
        self.bookmarks
            .iter()
            .filter(|bookmark| bookmark.has_tag(tag))
            .collect()
    }

    /// Adds a bookmark. Identical queries may be bookmarked more than once.
    pub fn add(&mut self, bookmark: QueryBookmark) -> Uuid {
        let id = bookmark.id;
        self.bookmarks.push(bookmark);
        self.persist();
        id
    }

    pub fn update(&mut self, id: Uuid, update: BookmarkUpdate) -> bool {
        let Some(bookmark) = self.bookmarks.iter_mut().find(|bookmark| bookmark.id == id) else {
            return false;
        };

        if let Some(title) = update.title {
            bookmark.title = title;
        }
        if let Some(query) = update.query {
            bookmark.query = query;
        }
        if let Some(database) = update.database {
            bookmark.database = database;
        }
        if let Some(tags) = update.tags {
            bookmark.tags = normalize_tags(tags);
        }
        bookmark.updated = Utc::now();
        self.persist();
        true
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let original_len = self.bookmarks.len();
        self.bookmarks.retain(|bookmark| bookmark.id != id);
        if self.bookmarks.len() == original_len {
            return false;
        }
        self.persist();
        true
    }

    fn persist(&self) {
        if let Err(error) = storage::save(self.store.as_ref(), StateKey::Bookmarks, &self.bookmarks) {
            tracing::warn!(%error, "failed to persist bookmarks");
        }
    }
}

fn normalize_tags(tags: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}
