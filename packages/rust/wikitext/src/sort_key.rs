//! Sort keys for works-table rows.
//!
//! Rows are ordered by the romanized title of the song or album they link to.
//! Titles of foreign-script pages carry their romanization in a trailing
//! parenthesized span (`メルト (Melt)`), which becomes the key. Latin titles
//! sort by their full name.

use std::sync::LazyLock;

use regex::Regex;

/// Characters removed from a key after lowercasing.
const STRIPPED_CHARS: &[char] = &[
    '[', '(', ')', ']', '"', '\'', '¿', '?', '『', '』', '「', '」', ':', '’',
];

/// Parameters of a `{{pwt row|...}}` / `{{awt row|...}}` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParams<'a> {
    /// The linked page title (first argument, `1=` and `{{=}}` resolved).
    pub title: String,
    /// Everything after the title argument, verbatim (`|rom=...|...`).
    pub trailing: &'a str,
    /// Manual romanization override (`rom=`).
    pub rom: Option<&'a str>,
    /// Original-script title (`kanji=` or the first unnamed extra parameter).
    pub kanji: Option<&'a str>,
}

impl<'a> RowParams<'a> {
    /// Split a template argument string into title and trailing parameters.
    pub fn parse(input: &'a str) -> Self {
        static POSITIONAL_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\s*1\s*=\s*").expect("valid regex"));
        static ROM_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\|rom\s*=\s*([^|]*)").expect("valid regex"));
        static KANJI_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\|kanji\s*=\s*([^|]*)").expect("valid regex"));

        let raw_title = input.split('|').next().unwrap_or_default();
        let trailing = &input[raw_title.len()..];
        let title = POSITIONAL_RE.replace(raw_title, "").replace("{{=}}", "=");

        let rom = ROM_RE
            .captures(trailing)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|rom| !rom.is_empty());
        let kanji = KANJI_RE
            .captures(trailing)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .or_else(|| {
                trailing
                    .split('|')
                    .skip(1)
                    .find(|param| !param.contains('='))
            });

        Self {
            title,
            trailing,
            rom,
            kanji,
        }
    }
}

/// Derive the sort key of a row from its template arguments (or a bare title).
///
/// The key is the normalized romanization followed by the verbatim trailing
/// parameters, so rows for the same title stay distinct.
pub fn sort_value(input: &str) -> String {
    let params = RowParams::parse(input);
    let romanized = match params.rom {
        Some(rom) => rom.to_string(),
        None => romanized_title(&params.title),
    };

    let mut key = remove_tones(&romanized).to_lowercase();
    key.retain(|c| !STRIPPED_CHARS.contains(&c));
    key.push_str(params.trailing);
    key
}

/// Extract the romanized part of a page title.
///
/// Returns the title itself when it has no romanization span, or when the
/// part outside the span is printable ASCII already.
pub fn romanized_title(page_title: &str) -> String {
    static NESTED_PREFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[^(]*\)[^(]*\(").expect("valid regex"));

    let name = page_title.strip_suffix(" (album)").unwrap_or(page_title);
    let trimmed = match name.find(")/") {
        Some(idx) => &name[..=idx],
        None => name,
    };

    let Some(mut span) = romanization_span(trimmed) else {
        return name.to_string();
    };
    while let Some(m) = NESTED_PREFIX_RE.find(span) {
        span = &span[m.end()..];
    }

    let original = page_title.replace(&format!(" ({span})"), "");
    if original.chars().all(is_printable_ascii) {
        return page_title.to_string();
    }
    span.to_string()
}

/// Find the leftmost `" (X...)"` group that runs to the closing parenthesis
/// at the very end of `title`, where `X` is ASCII or an accented capital.
fn romanization_span(title: &str) -> Option<&str> {
    let body = title.strip_suffix(')')?;
    let mut prev: Option<char> = None;
    let mut before_prev: Option<char> = None;

    for (idx, c) in body.char_indices() {
        if prev == Some('(') && before_prev.is_some_and(char::is_whitespace) {
            let span = &body[idx..];
            if is_span_start(c) && !span.contains('\n') {
                return Some(span);
            }
        }
        before_prev = prev;
        prev = Some(c);
    }
    None
}

fn is_span_start(c: char) -> bool {
    is_printable_ascii(c) || "ĀÁǍÀĒÉĚÈŌÓǑÒ".contains(c)
}

fn is_printable_ascii(c: char) -> bool {
    (' '..='~').contains(&c)
}

/// Map pinyin tone marks on vowels to their base letter (`ǖ` becomes `v`).
fn remove_tones(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ā' | 'á' | 'ǎ' | 'à' => 'a',
            'Ā' | 'Á' | 'Ǎ' | 'À' => 'A',
            'ī' | 'í' | 'ǐ' | 'ì' => 'i',
            'Ī' | 'Í' | 'Ǐ' | 'Ì' => 'I',
            'ū' | 'ú' | 'ǔ' | 'ù' => 'u',
            'Ū' | 'Ú' | 'Ǔ' | 'Ù' => 'U',
            'ē' | 'é' | 'ě' | 'è' => 'e',
            'Ē' | 'É' | 'Ě' | 'È' => 'E',
            'ō' | 'ó' | 'ǒ' | 'ò' => 'o',
            'Ō' | 'Ó' | 'Ǒ' | 'Ò' => 'O',
            'ǖ' | 'ǘ' | 'ǚ' | 'ǜ' => 'v',
            'Ǖ' | 'Ǘ' | 'Ǚ' | 'Ǜ' => 'V',
            other => other,
        })
        .collect()
}
