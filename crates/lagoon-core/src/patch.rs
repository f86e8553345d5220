//! String-level patching of compiler-generated SVG markup.
//!
//! The compiler output is opaque; we only ever append annotations at two well-known anchors:
//! the first `</defs>` when one exists, otherwise a fresh `<defs>` right after the root `<svg ...>`
//! opening tag. Parsing stays cheap and non-validating.

use regex::{Captures, Regex};
use std::sync::LazyLock;

const DEFS_CLOSE: &str = "</defs>";

static PATH_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<path\b[^>]*>").unwrap());

/// Byte range of the root `<svg ...>` opening tag.
fn root_open_tag(markup: &str) -> Option<(usize, usize)> {
    let start = find_tag_start(markup, "<svg")?;
    let end = tag_end(markup, start)?;
    Some((start, end))
}

fn find_tag_start(markup: &str, needle: &str) -> Option<usize> {
    let mut from = 0usize;
    while let Some(rel) = markup[from..].find(needle) {
        let at = from + rel;
        let next = markup[at + needle.len()..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(at);
        }
        from = at + needle.len();
    }
    None
}

/// Index one past the `>` closing the tag starting at `start`, skipping quoted attribute values.
fn tag_end(markup: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in markup.as_bytes()[start..].iter().enumerate() {
        match (quote, b) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'>') => return Some(start + i + 1),
            _ => {}
        }
    }
    None
}

/// Inserts `fragment` into the definitions block: before the first `</defs>` when present,
/// otherwise inside a new `<defs>` placed first in the root element.
///
/// Markup without a recognizable root opening tag (or with a self-closing root) is returned as-is.
pub fn insert_into_defs(markup: &str, fragment: &str) -> String {
    if fragment.is_empty() {
        return markup.to_string();
    }
    if let Some(at) = markup.find(DEFS_CLOSE) {
        let mut out = String::with_capacity(markup.len() + fragment.len());
        out.push_str(&markup[..at]);
        out.push_str(fragment);
        out.push_str(&markup[at..]);
        return out;
    }

    let Some((start, end)) = root_open_tag(markup) else {
        tracing::trace!("no root <svg> tag; skipping defs injection");
        return markup.to_string();
    };
    if markup[start..end].trim_end_matches('>').trim_end().ends_with('/') {
        return markup.to_string();
    }
    let mut out = String::with_capacity(markup.len() + fragment.len() + 16);
    out.push_str(&markup[..end]);
    out.push_str("<defs>");
    out.push_str(fragment);
    out.push_str(DEFS_CLOSE);
    out.push_str(&markup[end..]);
    out
}

/// Escapes text content for embedding in XML. Quotes are left alone since the text never lands
/// inside an attribute value.
pub fn escape_xml_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Injects a `<style>` block carrying `css` using the same two-path insertion as defs content.
/// The CSS is escaped as XML text so user-supplied values (font names, ids) keep the markup
/// well-formed.
pub fn insert_style(markup: &str, css: &str) -> String {
    if css.trim().is_empty() {
        return markup.to_string();
    }
    insert_into_defs(markup, &format!("<style>{}</style>", escape_xml_text(css)))
}

fn class_tokens(tag: &str) -> impl Iterator<Item = &str> {
    parse_attr_str(tag, "class")
        .unwrap_or_default()
        .split_whitespace()
}

/// Adds `stroke-dasharray="<pattern>"` to every `<path>` whose class list contains one of
/// `edge_classes`. Paths that already carry a dash array are left untouched.
pub fn force_dash_array(markup: &str, edge_classes: &[&str], pattern: &str) -> String {
    if edge_classes.is_empty() {
        return markup.to_string();
    }
    PATH_TAG_RE
        .replace_all(markup, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let is_edge = class_tokens(tag).any(|c| edge_classes.contains(&c));
            if !is_edge || parse_attr_str(tag, "stroke-dasharray").is_some() {
                return tag.to_string();
            }
            format!(
                r#"<path stroke-dasharray="{pattern}"{}"#,
                &tag["<path".len()..]
            )
        })
        .into_owned()
}

/// Reads a double-quoted attribute from a single tag. The key must be preceded by whitespace so
/// `width` does not match `stroke-width`.
pub fn parse_attr_str<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!(r#"{key}=""#);
    let mut from = 0usize;
    while let Some(rel) = tag[from..].find(&needle) {
        let at = from + rel;
        let preceded_by_space = tag[..at].chars().next_back().is_some_and(char::is_whitespace);
        if preceded_by_space {
            let rest = &tag[at + needle.len()..];
            let end = rest.find('"')?;
            return Some(rest[..end].trim());
        }
        from = at + needle.len();
    }
    None
}

fn parse_length_px(value: &str) -> Option<f32> {
    let v = value.trim();
    let v = v.strip_suffix("px").unwrap_or(v).trim();
    let n = v.parse::<f32>().ok()?;
    (n.is_finite() && n > 0.0).then_some(n)
}

/// Intrinsic size of the root element: numeric `width`/`height` attributes, falling back to the
/// `viewBox` dimensions (the compiler commonly emits `width="100%"`).
pub fn intrinsic_size(markup: &str) -> Option<(f32, f32)> {
    let (start, end) = root_open_tag(markup)?;
    let tag = &markup[start..end];

    let width = parse_attr_str(tag, "width").and_then(parse_length_px);
    let height = parse_attr_str(tag, "height").and_then(parse_length_px);
    if let (Some(w), Some(h)) = (width, height) {
        return Some((w, h));
    }

    let raw = parse_attr_str(tag, "viewBox")?;
    let mut it = raw.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
    let _min_x = it.next()?.parse::<f32>().ok()?;
    let _min_y = it.next()?.parse::<f32>().ok()?;
    let vb_w = it.next()?.parse::<f32>().ok()?;
    let vb_h = it.next()?.parse::<f32>().ok()?;
    if !(vb_w.is_finite() && vb_h.is_finite() && vb_w > 0.0 && vb_h > 0.0) {
        return None;
    }
    Some((width.unwrap_or(vb_w), height.unwrap_or(vb_h)))
}
