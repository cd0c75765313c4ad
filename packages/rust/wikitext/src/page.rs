//! Page-level conventions: the `{{ProdLinks}}` marker and album titles.

use std::sync::LazyLock;

use regex::Regex;

use pagebot_shared::{PageBotError, Result};

/// Read the producer's category name from the page's single `{{ProdLinks}}`.
///
/// `{{ProdLinks|catname=Foo}}`, `{{ProdLinks|1=Foo}}` and `{{ProdLinks|Foo}}`
/// all yield `Foo`.
pub fn producer_category(text: &str) -> Result<String> {
    static PROD_LINKS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\{\{\s*[Pp]rodLinks\s*\|([^\}\|]*)").expect("valid regex")
    });
    static PARAM_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\s*\b(catname|1)\b\s*=\s*").expect("valid regex")
    });

    let mut found = PROD_LINKS_RE.captures_iter(text);
    let Some(first) = found.next() else {
        return Err(PageBotError::malformed("Cannot find {{t|ProdLinks}}"));
    };
    let extra = found.count();
    if extra > 0 {
        return Err(PageBotError::malformed(format!(
            "Found {} {{{{t|ProdLinks}}}} templates, expected 1",
            extra + 1
        )));
    }

    let name = PARAM_NAME_RE.replace_all(first[1].trim(), "");
    let name = name.trim();
    if name.is_empty() {
        return Err(PageBotError::malformed("Empty {{t|ProdLinks}} category"));
    }
    Ok(name.to_string())
}

/// Whether a linked title names an album or EP page. Case-insensitive.
pub fn is_album_title(title: &str) -> bool {
    static ALBUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i) \((album|E\.?P\.?)\)$").expect("valid regex"));
    ALBUM_RE.is_match(title)
}
