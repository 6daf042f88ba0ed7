use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{self, StateKey, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// UI preferences that survive restarts.
pub struct Preferences {
    store: Arc<dyn StateStore>,
    theme: Theme,
    sidebar_collapsed: bool,
}

impl std::fmt::Debug for Preferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preferences")
            .field("theme", &self.theme)
            .field("sidebar_collapsed", &self.sidebar_collapsed)
            .finish_non_exhaustive()
    }
}

impl Preferences {
    #[must_use]
    pub fn load(store: Arc<dyn StateStore>) -> Self {
        let theme = storage::load_or_default(store.as_ref(), StateKey::Theme);
        let sidebar_collapsed = storage::load_or_default(store.as_ref(), StateKey::SidebarCollapsed);
        Self {
            store,
            theme,
            sidebar_collapsed,
        }
    }

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    #[must_use]
    pub fn sidebar_collapsed(&self) -> bool {
        self.sidebar_collapsed
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Err(error) = storage::save(self.store.as_ref(), StateKey::Theme, &theme) {
            tracing::warn!(%error, "failed to persist theme");
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        if let Err(error) = storage::save(
            self.store.as_ref(),
            StateKey::SidebarCollapsed,
            &self.sidebar_collapsed,
        ) {
            tracing::warn!(%error, "failed to persist sidebar state");
        }
        self.sidebar_collapsed
    }
}
