//! Wikitext handling for producer pages.
//!
//! Everything here is pure text processing: sort keys for table rows,
//! locating works tables, merging missing pages into them in sort order,
//! and reading the page's `{{ProdLinks}}` marker.

mod page;
mod reconcile;
mod sort_key;
mod table;

pub use page::{is_album_title, producer_category};
pub use reconcile::{MissingEntry, Variant, reconcile};
pub use sort_key::{RowParams, romanized_title, sort_value};
pub use table::{RowEntry, TableBlock, TableShape, find_blocks, resolve_shape};
