//! Core domain types shared by the wiki client, the reconciler and the bot.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one bot run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TableKind
// ---------------------------------------------------------------------------

/// The two kinds of works tables found on producer pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Songs table (`{{pwt head}}` / `{{pwt row}}`).
    ProducerWorks,
    /// Albums table (`{{awt head}}` / `{{awt row}}`), possibly split in two.
    AlbumWorks,
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProducerWorks => f.write_str("producer works"),
            Self::AlbumWorks => f.write_str("album works"),
        }
    }
}

// ---------------------------------------------------------------------------
// Documents and collaborator payloads
// ---------------------------------------------------------------------------

/// Current state of a wiki page as seen by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    /// Canonical page title.
    pub title: String,
    /// Latest revision text (empty when the page is missing).
    pub text: String,
    /// Whether the page exists at all.
    pub exists: bool,
    /// Whether the page is a redirect.
    pub redirect: bool,
}

impl Document {
    /// An existing, non-redirect page with the given text.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            exists: true,
            redirect: false,
        }
    }
}

/// Flags attached to an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveFlags {
    /// Mark the edit as minor.
    pub minor: bool,
    /// Mark the edit with the bot flag.
    pub bot: bool,
}

/// An album page found in a producer's album category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumPage {
    pub title: String,
    /// Member of the compilation-albums category.
    pub compilation: bool,
}

/// Pages currently transcluded by a producer page, split by table kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedPages {
    pub songs: BTreeSet<String>,
    pub albums: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn table_kind_display() {
        assert_eq!(TableKind::ProducerWorks.to_string(), "producer works");
        assert_eq!(TableKind::AlbumWorks.to_string(), "album works");
    }

    #[test]
    fn new_document_exists() {
        let doc = Document::new("Foo", "text");
        assert!(doc.exists);
        assert!(!doc.redirect);
    }
}
