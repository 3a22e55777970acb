//! # HTML Text Extraction
//!
//! Reduces a page to its visible text. Deliberately lossy: page chrome
//! (scripts, styles, navigation, headers, footers, asides) is dropped.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Elements whose whole content is discarded
pub const EXCLUDED_ELEMENTS: [&str; 6] = ["script", "style", "nav", "header", "footer", "aside"];

static EXCLUDED: OnceLock<Vec<Regex>> = OnceLock::new();
static COMMENT: OnceLock<Regex> = OnceLock::new();
static TAG: OnceLock<Regex> = OnceLock::new();
static ENTITY: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn excluded_elements() -> &'static [Regex] {
    EXCLUDED.get_or_init(|| {
        EXCLUDED_ELEMENTS
            .iter()
            .map(|tag| {
                Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                    .expect("static pattern compiles")
            })
            .collect()
    })
}

/// Convert HTML into collapsed plain text, truncated to `max_chars` characters
pub fn html_to_text(html: &str, max_chars: usize) -> String {
    let mut text = compiled(&COMMENT, r"(?s)<!--.*?-->")
        .replace_all(html, " ")
        .into_owned();

    for element in excluded_elements() {
        text = element.replace_all(&text, " ").into_owned();
    }

    let text = compiled(&TAG, r"(?s)<[^>]*>").replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = compiled(&WHITESPACE, r"\s+").replace_all(&text, " ");

    text.trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_chars)
        .collect()
}

fn decode_entities(text: &str) -> String {
    compiled(&ENTITY, r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "copy" => '©',
        "reg" => '®',
        "euro" => '€',
        _ => return None,
    };
    Some(c)
}
