//! Producer-page processor.
//!
//! For every producer page: read its `{{ProdLinks}}` category, list the song
//! and album pages filed there, and add the ones the page does not link yet to
//! its works tables.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, info, instrument, warn};

use pagebot_pipeline::{ItemHandler, ItemReport, Outcome, PipelineState};
use pagebot_shared::{PageBotError, ProducerPagesConfig, Result, SaveFlags, TableKind};
use pagebot_wikitext::{MissingEntry, producer_category, reconcile};

use crate::bot::ProgressReporter;
use crate::collaborators::{CategoryIndex, DocumentStore};
use crate::report::render_report;

/// Rows added to one producer page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditStats {
    pub songs_added: usize,
    pub albums_added: usize,
}

pub type PageReport = ItemReport<EditStats, Vec<String>>;

pub struct ProducerPageProcessor<D, C> {
    store: D,
    index: C,
    settings: ProducerPagesConfig,
    single_page: bool,
    progress: Arc<dyn ProgressReporter>,
    checked: AtomicUsize,
}

impl<D, C> ProducerPageProcessor<D, C>
where
    D: DocumentStore,
    C: CategoryIndex,
{
    pub fn new(
        store: D,
        index: C,
        settings: ProducerPagesConfig,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            store,
            index,
            settings,
            single_page: false,
            progress,
            checked: AtomicUsize::new(0),
        }
    }

    /// Process a single page: log detailed counts and skip the run report.
    pub fn single_page(mut self, single_page: bool) -> Self {
        self.single_page = single_page;
        self
    }

    pub fn settings(&self) -> &ProducerPagesConfig {
        &self.settings
    }

    /// Bring one producer page up to date and save it if anything changed.
    async fn treat(&self, title: &str) -> Result<PageReport> {
        let document = self.store.fetch(title).await?;
        if !document.exists {
            return Err(PageBotError::NotFound("Page doesn't exist".into()));
        }
        if document.redirect {
            return Err(PageBotError::NotFound("Page is a redirect".into()));
        }

        let producer = producer_category(&document.text)?;
        debug!(%producer, "main category is {producer} songs list");

        let (songs, albums, linked) = tokio::try_join!(
            self.index.song_pages(&producer),
            self.index
                .album_pages(&producer, &self.settings.compilation_category),
            self.index.linked_pages(title),
        )?;

        let missing_songs: Vec<String> = songs.difference(&linked.songs).cloned().collect();
        let missing_albums: Vec<MissingEntry> = albums
            .iter()
            .filter(|album| !linked.albums.contains(&album.title))
            .map(|album| {
                if album.compilation {
                    MissingEntry::compilation(&album.title)
                } else {
                    MissingEntry::regular(&album.title)
                }
            })
            .collect();
        let album_titles: Vec<String> = missing_albums.iter().map(|a| a.title.clone()).collect();

        if self.single_page {
            info!(
                page_length = document.text.chars().count(),
                songs_in_category = songs.len(),
                albums_in_category = albums.len(),
                songs_in_table = linked.songs.len(),
                albums_in_table = linked.albums.len(),
                missing_songs = ?missing_songs,
                missing_albums = ?album_titles,
                "page details"
            );
        }

        if missing_songs.is_empty() && missing_albums.is_empty() {
            debug!("all songs and albums accounted for");
            return Ok(ItemReport::unchanged(title));
        }

        let mut text = document.text;
        let mut report = ItemReport::modified(title);
        let mut stats = EditStats::default();

        if !missing_songs.is_empty() {
            info!(
                count = missing_songs.len(),
                songs = %missing_songs.join(", "),
                "found missing songs"
            );
            let entries: Vec<MissingEntry> =
                missing_songs.iter().map(MissingEntry::regular).collect();
            text = reconcile(&text, TableKind::ProducerWorks, &entries).map_err(|e| {
                let unplaced = missing_songs.iter().chain(&album_titles).cloned().collect();
                PageBotError::partial_failure(e, unplaced)
            })?;
            stats.songs_added = missing_songs.len();
        }

        if !missing_albums.is_empty() {
            info!(
                count = missing_albums.len(),
                albums = %album_titles.join(", "),
                "found missing albums"
            );
            match reconcile(&text, TableKind::AlbumWorks, &missing_albums) {
                Ok(updated) => {
                    text = updated;
                    stats.albums_added = missing_albums.len();
                }
                // Song rows are already in place; save them anyway.
                Err(e) if stats.songs_added > 0 => {
                    error!(error = %e, "album table not updated");
                    report = report.with_error(e.to_string()).with_failure(album_titles);
                }
                Err(e) => return Err(PageBotError::partial_failure(e, album_titles)),
            }
        }

        self.store
            .save(title, &text, &self.settings.edit_summary, SaveFlags::default())
            .await?;
        info!(
            songs_added = stats.songs_added,
            albums_added = stats.albums_added,
            "page updated"
        );
        Ok(report.with_success(stats))
    }
}

impl<D, C> ItemHandler<String> for ProducerPageProcessor<D, C>
where
    D: DocumentStore,
    C: CategoryIndex,
{
    type Success = EditStats;
    type Failure = Vec<String>;

    #[instrument(name = "page", skip_all, fields(title = %title))]
    async fn process_item(&self, title: String) -> Outcome<EditStats, Vec<String>> {
        let report = match self.treat(&title).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "page not updated");
                let report = ItemReport::failed(&title, e.to_string());
                match e.unplaced() {
                    Some(unplaced) => report.with_failure(unplaced.to_vec()),
                    None => report,
                }
            }
        };

        let checked = self.checked.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress.page_checked(&title, checked);
        report.into()
    }

    async fn finalize(&self, state: &PipelineState<EditStats, Vec<String>>) {
        for (title, message) in &state.errors {
            error!(%title, %message, "page needs manual intervention");
        }
        for title in &state.modified {
            info!(%title, "page edited");
        }
        if self.single_page {
            return;
        }

        self.progress.phase("Saving report");
        let today = chrono::Local::now().date_naive();
        let report = render_report(state, &self.settings.category, today);
        match self
            .store
            .save(
                &self.settings.report_page,
                &report,
                &self.settings.report_summary,
                SaveFlags::default(),
            )
            .await
        {
            Ok(()) => info!(page = %self.settings.report_page, "report saved"),
            Err(e) => error!(page = %self.settings.report_page, error = %e, "failed to save report"),
        }

        for (title, entries) in &state.failures {
            warn!(%title, entries = %entries.join(", "), "entries left for manual addition");
        }
    }
}
