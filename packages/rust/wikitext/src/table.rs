//! Locating and parsing works tables.
//!
//! A works table is a sortable `producer-table` whose header row is a
//! `{{pwt head}}` (songs) or `{{awt head}}` (albums) template. Every row is a
//! `|-` line followed by one `{{pwt row|...}}` / `{{awt row|...}}` cell.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use pagebot_shared::{PageBotError, Result, TableKind};

use crate::sort_key::sort_value;

static PWT_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{\|\s*class=["']sortable\s+producer-table["']\s*\n\|-[^\{\}\n]*?\n!\s*\{\{\s*[Pp]wt[ _]head\s*\}\}\s*\n"#,
    )
    .expect("valid regex")
});

static AWT_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\{\|\s*class=["']sortable\s+producer-table["']\s*\n\|-[^\{\}\n]*?\n!\s*\{\{\s*[Aa]wt[ _]head\s*\}\}\s*\n"#,
    )
    .expect("valid regex")
});

// `pht row` is the legacy spelling still found on older pages.
static PWT_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<row>\|-[^\n]*\n[\s\x{200B}]*\|[\s\x{200B}]*\{\{\s*[Pp][wh]t[ _]row\s*\|(?P<input>[^\n]*)\}\})[\s\x{200B}]*?\n",
    )
    .expect("valid regex")
});

static AWT_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<row>\|-[^\n]*\n[\s\x{200B}]*\|[\s\x{200B}]*\{\{\s*[Aa]wt[ _]row\s*\|(?P<input>[^\n]*)\}\})[\s\x{200B}]*?\n",
    )
    .expect("valid regex")
});

fn head_regex(kind: TableKind) -> &'static Regex {
    match kind {
        TableKind::ProducerWorks => &PWT_HEAD_RE,
        TableKind::AlbumWorks => &AWT_HEAD_RE,
    }
}

fn row_regex(kind: TableKind) -> &'static Regex {
    match kind {
        TableKind::ProducerWorks => &PWT_ROW_RE,
        TableKind::AlbumWorks => &AWT_ROW_RE,
    }
}

/// Template name used when writing a new row of this kind.
pub(crate) fn row_template(kind: TableKind) -> &'static str {
    match kind {
        TableKind::ProducerWorks => "pwt row",
        TableKind::AlbumWorks => "awt row",
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One row of a works table together with its sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEntry {
    /// Row wikitext, from `|-` to the closing `}}` of the row template.
    pub raw_text: String,
    pub sort_key: String,
}

impl RowEntry {
    /// Build the row for a page that is not in the table yet.
    pub fn for_title(kind: TableKind, title: &str) -> Self {
        Self {
            raw_text: format!("|-\n| {{{{{}|{title}}}}}", row_template(kind)),
            sort_key: sort_value(title),
        }
    }
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

/// A works table found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBlock<'a> {
    pub kind: TableKind,
    /// Byte range of the whole table, head through `|}`.
    pub range: Range<usize>,
    /// Table start and header row, kept verbatim.
    pub head: &'a str,
    /// Rows in document order.
    pub rows: Vec<RowEntry>,
}

impl TableBlock<'_> {
    /// Insert a row before the first row with a strictly greater key.
    ///
    /// Equal keys keep existing rows first.
    pub fn insert(&mut self, row: RowEntry) {
        let at = self
            .rows
            .iter()
            .position(|existing| existing.sort_key > row.sort_key)
            .unwrap_or(self.rows.len());
        self.rows.insert(at, row);
    }

    /// Render the table back to wikitext.
    pub fn render(&self) -> String {
        let rows: Vec<&str> = self.rows.iter().map(|r| r.raw_text.as_str()).collect();
        format!("{}{}\n|}}", self.head, rows.join("\n"))
    }
}

/// How the tables of one kind appear in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableShape<'a> {
    None,
    Single(TableBlock<'a>),
    /// Regular albums first, compilations second.
    Split(TableBlock<'a>, TableBlock<'a>),
}

/// Find every table of `kind` in `text`, in document order.
pub fn find_blocks(text: &str, kind: TableKind) -> Vec<TableBlock<'_>> {
    let head_re = head_regex(kind);
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(head) = head_re.find_at(text, pos) {
        let Some(end) = find_table_end(text, head.end()) else {
            break;
        };
        let block_text = &text[head.start()..end];
        let rows = row_regex(kind)
            .captures_iter(block_text)
            .map(|caps| RowEntry {
                raw_text: caps["row"].to_string(),
                sort_key: sort_value(&caps["input"]),
            })
            .collect();

        blocks.push(TableBlock {
            kind,
            range: head.start()..end,
            head: head.as_str(),
            rows,
        });
        pos = end;
    }

    blocks
}

/// Resolve the table layout of `kind`, rejecting layouts the kind does not allow.
///
/// Song tables must be unique. Album tables may be absent, single, or split
/// into regular and compilation tables.
pub fn resolve_shape(text: &str, kind: TableKind) -> Result<TableShape<'_>> {
    let blocks = find_blocks(text, kind);
    let allowed = match kind {
        TableKind::ProducerWorks => 1,
        TableKind::AlbumWorks => 2,
    };

    if blocks.len() > allowed {
        return Err(PageBotError::AmbiguousTable {
            kind,
            found: blocks.len(),
            expected: allowed,
        });
    }

    let mut blocks = blocks.into_iter();
    match (blocks.next(), blocks.next()) {
        (None, _) if kind == TableKind::ProducerWorks => Err(PageBotError::TableNotFound { kind }),
        (None, _) => Ok(TableShape::None),
        (Some(only), None) => Ok(TableShape::Single(only)),
        (Some(regular), Some(compilation)) => Ok(TableShape::Split(regular, compilation)),
    }
}

/// End of a table body: just past the first `|}` that is not part of `|}}`.
fn find_table_end(text: &str, from: usize) -> Option<usize> {
    let mut search = from;
    while let Some(offset) = text[search..].find("|}") {
        let at = search + offset;
        if !text[at + 2..].starts_with('}') {
            return Some(at + 2);
        }
        search = at + 2;
    }
    None
}
