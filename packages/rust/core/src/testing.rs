//! In-memory wiki used by the processor and run tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use pagebot_shared::{AlbumPage, Document, LinkedPages, PageBotError, Result, SaveFlags};

use crate::collaborators::{CategoryIndex, DocumentStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SavedEdit {
    pub title: String,
    pub text: String,
    pub summary: String,
}

#[derive(Default)]
pub(crate) struct MemoryWiki {
    pages: Mutex<HashMap<String, Document>>,
    songs: HashMap<String, BTreeSet<String>>,
    albums: HashMap<String, Vec<AlbumPage>>,
    linked: HashMap<String, LinkedPages>,
    saves: Mutex<Vec<SavedEdit>>,
    failing_saves: BTreeSet<String>,
}

impl MemoryWiki {
    pub fn with_page(mut self, title: &str, text: &str) -> Self {
        self.pages
            .get_mut()
            .unwrap()
            .insert(title.to_string(), Document::new(title, text));
        self
    }

    pub fn with_redirect(mut self, title: &str) -> Self {
        let mut document = Document::new(title, "#REDIRECT [[Elsewhere]]");
        document.redirect = true;
        self.pages.get_mut().unwrap().insert(title.to_string(), document);
        self
    }

    pub fn with_songs(mut self, producer: &str, titles: &[&str]) -> Self {
        self.songs.insert(
            producer.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_albums(mut self, producer: &str, albums: &[(&str, bool)]) -> Self {
        self.albums.insert(
            producer.to_string(),
            albums
                .iter()
                .map(|(title, compilation)| AlbumPage {
                    title: title.to_string(),
                    compilation: *compilation,
                })
                .collect(),
        );
        self
    }

    pub fn with_linked(mut self, page: &str, songs: &[&str], albums: &[&str]) -> Self {
        self.linked.insert(
            page.to_string(),
            LinkedPages {
                songs: songs.iter().map(|t| t.to_string()).collect(),
                albums: albums.iter().map(|t| t.to_string()).collect(),
            },
        );
        self
    }

    pub fn failing_save(mut self, title: &str) -> Self {
        self.failing_saves.insert(title.to_string());
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn saves(&self) -> Vec<SavedEdit> {
        self.saves.lock().unwrap().clone()
    }

    pub fn saved(&self, title: &str) -> Option<SavedEdit> {
        self.saves().into_iter().rev().find(|edit| edit.title == title)
    }
}

impl DocumentStore for Arc<MemoryWiki> {
    async fn fetch(&self, title: &str) -> Result<Document> {
        let pages = self.pages.lock().unwrap();
        Ok(pages.get(title).cloned().unwrap_or_else(|| Document {
            title: title.to_string(),
            ..Document::default()
        }))
    }

    async fn save(&self, title: &str, text: &str, summary: &str, _flags: SaveFlags) -> Result<()> {
        if self.failing_saves.contains(title) {
            return Err(PageBotError::Api {
                code: "protectedpage".into(),
                info: "This page has been protected".into(),
            });
        }
        self.saves.lock().unwrap().push(SavedEdit {
            title: title.to_string(),
            text: text.to_string(),
            summary: summary.to_string(),
        });
        self.pages
            .lock()
            .unwrap()
            .insert(title.to_string(), Document::new(title, text));
        Ok(())
    }
}

impl CategoryIndex for Arc<MemoryWiki> {
    async fn song_pages(&self, producer: &str) -> Result<BTreeSet<String>> {
        Ok(self.songs.get(producer).cloned().unwrap_or_default())
    }

    async fn album_pages(&self, producer: &str, _compilation_category: &str) -> Result<Vec<AlbumPage>> {
        Ok(self.albums.get(producer).cloned().unwrap_or_default())
    }

    async fn linked_pages(&self, title: &str) -> Result<LinkedPages> {
        Ok(self.linked.get(title).cloned().unwrap_or_default())
    }
}

/// A producer page with one song table and one album table.
pub(crate) fn producer_page(producer: &str, songs: &[&str], albums: &[&str]) -> String {
    let mut page = format!(
        "{{{{ProdLinks|catname={producer}}}}}\n==Songs==\n{{| class=\"sortable producer-table\"\n|- class=\"vcolor-default\"\n! {{{{pwt head}}}}\n"
    );
    for title in songs {
        page.push_str(&format!("|-\n| {{{{pwt row|{title}}}}}\n"));
    }
    page.push_str("|}\n==Discography==\n{| class=\"sortable producer-table\"\n|- class=\"vcolor-default\"\n! {{awt head}}\n");
    for title in albums {
        page.push_str(&format!("|-\n| {{{{awt row|{title}}}}}\n"));
    }
    page.push_str("|}\n[[Category:Producers]]\n");
    page
}
