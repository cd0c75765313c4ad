//! Category and transclusion queries used by the producer-page bot.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use futures::Stream;
use futures::future::try_join_all;
use futures::stream;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use pagebot_shared::{AlbumPage, LinkedPages, Result};
use pagebot_wikitext::is_album_title;

use crate::client::{PagesQuery, Params, TitleRef, WikiClient, next_query, params, query_part};

/// Main namespace.
const NS_MAIN: &str = "0";
/// Category namespace.
const NS_CATEGORY: &str = "14";

#[derive(Debug, Default, Deserialize)]
struct MembersQuery {
    #[serde(default)]
    categorymembers: Vec<TitleRef>,
}

fn members_query(category: &str, namespace: &str) -> Params {
    let mut query = params(&[
        ("action", "query"),
        ("list", "categorymembers"),
        ("cmprop", "title"),
        ("cmlimit", "max"),
        ("cmsort", "sortkey"),
        ("cmdir", "ascending"),
    ]);
    query.insert("cmtitle".into(), category.into());
    query.insert("cmnamespace".into(), namespace.into());
    query
}

fn member_titles(response: &Value) -> Result<Vec<String>> {
    let members: MembersQuery = query_part(response)?;
    Ok(members.categorymembers.into_iter().map(|m| m.title).collect())
}

/// Songs category of a producer: `Category:<name>_songs_list`.
fn songs_category(producer: &str) -> String {
    format!("Category:{producer}_songs_list")
}

/// Cursor state of a lazily paginated listing.
enum Cursor {
    /// Next request to send.
    Next(Params),
    Done,
}

impl WikiClient {
    /// All members of `category` in one namespace, every page fetched.
    #[instrument(skip(self))]
    pub async fn category_members(&self, category: &str, namespace: &str) -> Result<Vec<String>> {
        let responses = self.query_all(members_query(category, namespace)).await?;
        let mut titles = Vec::new();
        for response in &responses {
            titles.extend(member_titles(response)?);
        }
        debug!(count = titles.len(), batches = responses.len(), "listed category");
        Ok(titles)
    }

    /// Main-namespace members of `category` as a lazy stream, in sort-key
    /// order, optionally starting at sort key prefix `start`.
    ///
    /// Pages are only requested as the stream is polled. After an error the
    /// stream yields it once and ends.
    pub fn category_stream(
        &self,
        category: &str,
        start: Option<&str>,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        let mut query = members_query(category, NS_MAIN);
        if let Some(start) = start {
            query.insert("cmstartsortkeyprefix".into(), start.into());
        }

        stream::unfold(
            (self.clone(), query.clone(), Cursor::Next(query), VecDeque::<String>::new()),
            |(client, base, mut cursor, mut buffer)| async move {
                loop {
                    if let Some(title) = buffer.pop_front() {
                        return Some((Ok(title), (client, base, cursor, buffer)));
                    }
                    let Cursor::Next(query) = cursor else {
                        return None;
                    };
                    let page = match client.call(Method::GET, &query).await {
                        Ok(response) => member_titles(&response)
                            .map(|titles| (titles, next_query(&base, &response))),
                        Err(e) => Err(e),
                    };
                    match page {
                        Ok((titles, next)) => {
                            buffer.extend(titles);
                            cursor = next.map_or(Cursor::Done, Cursor::Next);
                        }
                        Err(e) => return Some((Err(e), (client, base, Cursor::Done, buffer))),
                    }
                }
            },
        )
    }

    /// Song pages of a producer: the songs category plus its subcategories,
    /// except the `/Albums` one.
    #[instrument(skip(self))]
    pub async fn song_pages(&self, producer: &str) -> Result<BTreeSet<String>> {
        let category = songs_category(producer);
        let subcategories = self.category_members(&category, NS_CATEGORY).await?;

        let lists = std::iter::once(category.clone())
            .chain(subcategories.into_iter().filter(|c| !c.ends_with("/Albums")))
            .map(|c| async move { self.category_members(&c, NS_MAIN).await });
        let songs: BTreeSet<String> = try_join_all(lists).await?.into_iter().flatten().collect();

        debug!(count = songs.len(), "collected song pages");
        Ok(songs)
    }

    /// Album pages of a producer, flagged when they are also in
    /// `compilation_category`.
    #[instrument(skip(self))]
    pub async fn album_pages(
        &self,
        producer: &str,
        compilation_category: &str,
    ) -> Result<Vec<AlbumPage>> {
        let mut query = params(&[
            ("action", "query"),
            ("generator", "categorymembers"),
            ("gcmnamespace", NS_MAIN),
            ("gcmlimit", "max"),
            ("gcmsort", "sortkey"),
            ("gcmdir", "ascending"),
            ("prop", "categories"),
            ("cllimit", "max"),
        ]);
        query.insert("gcmtitle".into(), format!("{}/Albums", songs_category(producer)));
        query.insert("clcategories".into(), compilation_category.into());

        // Category data for one page may arrive over several batches.
        let mut albums: BTreeMap<String, bool> = BTreeMap::new();
        for response in self.query_all(query).await? {
            let batch: PagesQuery = query_part(&response)?;
            for page in batch.pages {
                let compilation = !page.categories.is_empty();
                *albums.entry(page.title).or_default() |= compilation;
            }
        }

        debug!(count = albums.len(), "collected album pages");
        Ok(albums
            .into_iter()
            .map(|(title, compilation)| AlbumPage { title, compilation })
            .collect())
    }

    /// Main-namespace pages transcluded by `title`, split into songs and albums.
    #[instrument(skip(self))]
    pub async fn linked_pages(&self, title: &str) -> Result<LinkedPages> {
        let mut query = params(&[
            ("action", "query"),
            ("prop", "templates"),
            ("tlnamespace", NS_MAIN),
            ("tllimit", "max"),
            ("tldir", "ascending"),
        ]);
        query.insert("titles".into(), title.into());

        let mut linked = LinkedPages::default();
        for response in self.query_all(query).await? {
            let batch: PagesQuery = query_part(&response)?;
            for template in batch.pages.into_iter().flat_map(|p| p.templates) {
                if template.ns != 0 {
                    continue;
                }
                if is_album_title(&template.title) {
                    linked.albums.insert(template.title);
                } else {
                    linked.songs.insert(template.title);
                }
            }
        }

        debug!(songs = linked.songs.len(), albums = linked.albums.len(), "collected linked pages");
        Ok(linked)
    }
}
