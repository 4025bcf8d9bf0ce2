//! Theme activation
//!
//! The host pushes the full set of theme stylesheet URLs it wants applied.
//! The activator diffs that set against what is already linked, removes the
//! stale links first, then links the new ones.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::host::{StylesheetLink, ThemeDocument};

/// Marker class on every link the activator owns.
pub const THEME_LINK_CLASS: &str = "custom-theme";

#[derive(Debug)]
pub struct ThemeActivator {
    active: Vec<String>,
    accepts: bool,
}

/// Document mutations for one theme update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemePlan {
    pub deactivate: Vec<String>,
    pub activate: Vec<String>,
}

impl ThemeActivator {
    pub fn new(accepts: bool) -> Self {
        Self {
            active: Vec::new(),
            accepts,
        }
    }

    pub fn set_accepts(&mut self, accepts: bool) {
        self.accepts = accepts;
    }

    pub fn active(&self) -> &[String] {
        &self.active
    }

    /// Diff `incoming` against the active set and adopt it. `None` when
    /// nothing needs to change.
    pub fn plan(&mut self, incoming: Vec<String>) -> Option<ThemePlan> {
        if !self.accepts {
            return None;
        }

        let mut sorted_active = self.active.clone();
        sorted_active.sort();
        let mut sorted_incoming = incoming.clone();
        sorted_incoming.sort();
        if sorted_active == sorted_incoming {
            return None;
        }

        let deactivate = self
            .active
            .iter()
            .filter(|url| !incoming.contains(*url))
            .cloned()
            .collect();

        let mut activate: Vec<String> = Vec::new();
        for url in &incoming {
            if url.is_empty() || self.active.contains(url) || activate.contains(url) {
                continue;
            }
            activate.push(url.clone());
        }

        self.active = incoming;

        Some(ThemePlan {
            deactivate,
            activate,
        })
    }
}

impl ThemePlan {
    /// Apply to the document: every removal before any insertion.
    pub fn apply(&self, document: &dyn ThemeDocument) {
        for url in &self.deactivate {
            let id = theme_element_id(url);
            if document.disable_stylesheet(&id) {
                document.remove_stylesheet(&id);
            }
        }

        for url in &self.activate {
            document.append_stylesheet(theme_link(url));
        }
    }
}

/// Element id for a theme URL. Ids are compared rather than hrefs because
/// `file://` hrefs do not round-trip on desktop hosts.
pub fn theme_element_id(url: &str) -> String {
    STANDARD.encode(url)
}

pub fn theme_link(url: &str) -> StylesheetLink {
    StylesheetLink {
        id: theme_element_id(url),
        href: url.to_string(),
        link_type: "text/css".to_string(),
        rel: "stylesheet".to_string(),
        media: "screen,print".to_string(),
        class_name: THEME_LINK_CLASS.to_string(),
    }
}
