//! External collaborators of the producer-page processor.
//!
//! [`WikiClient`] implements both traits; tests use in-memory fakes.

use std::collections::BTreeSet;
use std::future::Future;

use pagebot_shared::{AlbumPage, Document, LinkedPages, Result, SaveFlags};
use pagebot_wiki::WikiClient;

/// Reads and writes page text.
pub trait DocumentStore: Send + Sync + 'static {
    fn fetch(&self, title: &str) -> impl Future<Output = Result<Document>> + Send;

    fn save(
        &self,
        title: &str,
        text: &str,
        summary: &str,
        flags: SaveFlags,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Answers which pages should be and which are referenced by a producer page.
pub trait CategoryIndex: Send + Sync + 'static {
    /// Song pages filed under the producer's songs category.
    fn song_pages(&self, producer: &str) -> impl Future<Output = Result<BTreeSet<String>>> + Send;

    /// Album pages filed under the producer's albums category.
    fn album_pages(
        &self,
        producer: &str,
        compilation_category: &str,
    ) -> impl Future<Output = Result<Vec<AlbumPage>>> + Send;

    /// Pages currently transcluded by the producer page.
    fn linked_pages(&self, title: &str) -> impl Future<Output = Result<LinkedPages>> + Send;
}

impl DocumentStore for WikiClient {
    async fn fetch(&self, title: &str) -> Result<Document> {
        self.fetch_document(title).await
    }

    async fn save(&self, title: &str, text: &str, summary: &str, flags: SaveFlags) -> Result<()> {
        WikiClient::save(self, title, text, summary, flags).await
    }
}

impl CategoryIndex for WikiClient {
    async fn song_pages(&self, producer: &str) -> Result<BTreeSet<String>> {
        WikiClient::song_pages(self, producer).await
    }

    async fn album_pages(&self, producer: &str, compilation_category: &str) -> Result<Vec<AlbumPage>> {
        WikiClient::album_pages(self, producer, compilation_category).await
    }

    async fn linked_pages(&self, title: &str) -> Result<LinkedPages> {
        WikiClient::linked_pages(self, title).await
    }
}
