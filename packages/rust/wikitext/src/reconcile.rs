//! Merging missing pages into works tables.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use pagebot_shared::{Result, TableKind};

use crate::table::{RowEntry, TableBlock, TableShape, resolve_shape};

/// Boilerplate for an album table created from scratch.
const NEW_ALBUM_TABLE_HEAD: &str =
    "==Discography==\n{| class=\"sortable producer-table\"\n|- class=\"vcolor-default\"\n! {{awt head}}\n";

/// Which album table an entry belongs to when the albums are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    #[default]
    Regular,
    Compilation,
}

/// A page that should be listed in a works table but is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MissingEntry {
    pub title: String,
    pub variant: Variant,
}

impl MissingEntry {
    pub fn regular(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            variant: Variant::Regular,
        }
    }

    pub fn compilation(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            variant: Variant::Compilation,
        }
    }
}

/// Insert `missing` into the `kind` tables of `text`, keeping rows sorted.
///
/// Returns the page unchanged when nothing is missing. Song pages need exactly
/// one song table. Album pages without an album table get a new one.
pub fn reconcile(text: &str, kind: TableKind, missing: &[MissingEntry]) -> Result<String> {
    if missing.is_empty() {
        return Ok(text.to_string());
    }

    match resolve_shape(text, kind)? {
        TableShape::None => Ok(insert_new_album_table(text, missing)),
        TableShape::Single(mut block) => {
            for entry in missing {
                block.insert(RowEntry::for_title(kind, &entry.title));
            }
            debug!(%kind, added = missing.len(), rows = block.rows.len(), "merged table");
            Ok(splice(text, [block]))
        }
        TableShape::Split(mut regular, mut compilation) => {
            for entry in missing {
                let target = match entry.variant {
                    Variant::Regular => &mut regular,
                    Variant::Compilation => &mut compilation,
                };
                target.insert(RowEntry::for_title(kind, &entry.title));
            }
            debug!(
                %kind,
                added = missing.len(),
                regular = regular.rows.len(),
                compilation = compilation.rows.len(),
                "merged split tables"
            );
            Ok(splice(text, [regular, compilation]))
        }
    }
}

/// Replace each block's original range with its rendering.
fn splice<'a, const N: usize>(text: &str, blocks: [TableBlock<'a>; N]) -> String {
    let mut out = text.to_string();
    // Later ranges first so earlier offsets stay valid.
    for block in blocks.iter().rev() {
        out.replace_range(block.range.clone(), &block.render());
    }
    out
}

/// Build a fresh album table and place it before `__NOTOC__`, before the
/// first category link, or at the end of the page.
fn insert_new_album_table(text: &str, missing: &[MissingEntry]) -> String {
    static CATEGORY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\[[Cc]ategory:").expect("valid regex"));

    let mut rows: Vec<RowEntry> = missing
        .iter()
        .map(|entry| RowEntry::for_title(TableKind::AlbumWorks, &entry.title))
        .collect();
    rows.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));

    let rendered: Vec<&str> = rows.iter().map(|r| r.raw_text.as_str()).collect();
    let table = format!("{NEW_ALBUM_TABLE_HEAD}{}\n|}}\n\n", rendered.join("\n"));

    let anchor = text
        .find("__NOTOC__")
        .or_else(|| CATEGORY_RE.find(text).map(|m| m.start()));
    debug!(rows = rows.len(), anchored = anchor.is_some(), "created album table");

    match anchor {
        Some(at) => {
            let mut out = String::with_capacity(text.len() + table.len());
            out.push_str(&text[..at]);
            out.push_str(&table);
            out.push_str(&text[at..]);
            out
        }
        None => format!("{text}\n{table}"),
    }
}
