use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(Uuid);

impl TabId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTab {
    pub id: TabId,
    pub title: String,
    pub content: String,
    pub database: Option<String>,
    pub modified: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    Declined,
    NotFound,
}

/// Open editor tabs. While non-empty exactly one tab is active.
#[derive(Debug, Clone, Default)]
pub struct TabSet {
    tabs: Vec<QueryTab>,
}

impl TabSet {
    #[must_use]
    pub fn tabs(&self) -> &[QueryTab] {
        &self.tabs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: TabId) -> Option<&QueryTab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    #[must_use]
    pub fn active(&self) -> Option<&QueryTab> {
        self.tabs.iter().find(|tab| tab.active)
    }

    #[must_use]
    pub fn active_id(&self) -> Option<TabId> {
        self.active().map(|tab| tab.id)
    }

    /// Opens a tab titled `Query N` and makes it active.
    pub fn create(&mut self, content: impl Into<String>, database: Option<String>) -> TabId {
        let title = format!("Query {}", self.tabs.len() + 1);
        self.create_titled(title, content, database)
    }

    pub fn create_titled(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
        database: Option<String>,
    ) -> TabId {
        let id = TabId::new();
        for tab in &mut self.tabs {
            tab.active = false;
        }
        self.tabs.push(QueryTab {
            id,
            title: title.into(),
            content: content.into(),
            database,
            modified: false,
            active: true,
        });
        id
    }

    pub fn update_content(&mut self, id: TabId, content: impl Into<String>) -> bool {
        let Some(tab) = self.get_mut(id) else {
            return false;
        };
        tab.content = content.into();
        tab.modified = true;
        true
    }

    pub fn mark_saved(&mut self, id: TabId) -> bool {
        let Some(tab) = self.get_mut(id) else {
            return false;
        };
        tab.modified = false;
        true
    }

    pub fn rename(&mut self, id: TabId, title: impl Into<String>) -> bool {
        let title = title.into();
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        let Some(tab) = self.get_mut(id) else {
            return false;
        };
        tab.title = title.to_string();
        true
    }

    pub fn set_database(&mut self, id: TabId, database: Option<String>) -> bool {
        let Some(tab) = self.get_mut(id) else {
            return false;
        };
        tab.database = database;
        true
    }

    pub fn set_active(&mut self, id: TabId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        for tab in &mut self.tabs {
            tab.active = tab.id == id;
        }
        true
    }

    /// Closes a tab. A modified tab is only closed when `confirm` agrees.
    ///
    /// When the active tab closes, the tab that slides into its index (or
    /// the new last tab) becomes active.
    pub fn close<F>(&mut self, id: TabId, confirm: F) -> CloseOutcome
    where
        F: FnOnce(&QueryTab) -> bool,
    {
        let Some(index) = self.tabs.iter().position(|tab| tab.id == id) else {
            return CloseOutcome::NotFound;
        };
        if self.tabs[index].modified && !confirm(&self.tabs[index]) {
            return CloseOutcome::Declined;
        }

        let removed = self.tabs.remove(index);
        if removed.active && !self.tabs.is_empty() {
            let next = index.min(self.tabs.len() - 1);
            self.tabs[next].active = true;
        }
        CloseOutcome::Closed
    }

    fn get_mut(&mut self, id: TabId) -> Option<&mut QueryTab> {
        self.tabs.iter_mut().find(|tab| tab.id == id)
    }
}
