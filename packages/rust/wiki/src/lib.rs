//! MediaWiki API access for pagebot.
//!
//! [`WikiClient`] covers login, page fetch and save, and the category and
//! transclusion listings the producer-page bot compares against.

mod category;
mod client;
mod retry;

pub use client::WikiClient;
pub use retry::RetryPolicy;
