//! Per-node color overrides.
//!
//! Flowcharts get a `style` directive written into their source; every other grammar gets a
//! CSS overlay keyed by the element's raw id and applied after each compile.

use crate::color::{Rgb, STROKE_DARKEN_FACTOR, escape_css_ident, quote_id};
use crate::error::ColorError;
use crate::grammar::{DiagramGrammar, OverrideStrategy};
use crate::resolve::{IdAttribute, NodeMatch};
use indexmap::IndexMap;
use regex::RegexBuilder;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeColors {
    pub fill: String,
    pub stroke: String,
}

impl NodeColors {
    /// Normalized `#rrggbb` fill plus its darkened stroke.
    pub fn from_fill(fill: &str) -> Result<Self, ColorError> {
        let rgb = Rgb::parse_hex(fill)?;
        Ok(Self {
            fill: rgb.to_hex(),
            stroke: rgb.scaled(STROKE_DARKEN_FACTOR).to_hex(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OverlayEntry {
    attribute: IdAttribute,
    colors: NodeColors,
}

/// Raw-id keyed overlay colors, kept in insertion order so generated CSS is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideRecord {
    entries: IndexMap<String, OverlayEntry>,
}

impl OverrideRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records colors for the element whose `id` is `raw_id`.
    pub fn upsert(&mut self, raw_id: impl Into<String>, colors: NodeColors) {
        self.upsert_on(IdAttribute::Id, raw_id, colors);
    }

    /// Records colors for the element whose `attribute` equals `raw_id`.
    pub fn upsert_on(&mut self, attribute: IdAttribute, raw_id: impl Into<String>, colors: NodeColors) {
        self.entries
            .insert(raw_id.into(), OverlayEntry { attribute, colors });
    }

    pub fn get(&self, raw_id: &str) -> Option<&NodeColors> {
        self.entries.get(raw_id).map(|entry| &entry.colors)
    }

    pub fn remove(&mut self, raw_id: &str) -> Option<NodeColors> {
        self.entries.shift_remove(raw_id).map(|entry| entry.colors)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeColors)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), &v.colors))
    }

    /// Drops entries whose backing element no longer appears in `markup`.
    pub fn retain_present(&mut self, markup: &str) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|raw_id, entry| has_attribute(markup, entry.attribute.name(), raw_id));
        before - self.entries.len()
    }

    /// One `!important` rule block per entry, scoped under the element's id.
    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for (raw_id, entry) in &self.entries {
            let sel = selector(entry.attribute, raw_id);
            let colors = &entry.colors;
            let _ = writeln!(
                &mut css,
                "{sel}, {sel} rect, {sel} circle, {sel} ellipse, {sel} polygon, {sel} path {{ \
                 fill: {fill} !important; stroke: {stroke} !important; }}",
                fill = colors.fill,
                stroke = colors.stroke,
            );
            let _ = writeln!(
                &mut css,
                "{sel} text, {sel} tspan {{ fill: {stroke} !important; stroke: none !important; }}",
                stroke = colors.stroke,
            );
        }
        css
    }
}

fn selector(attribute: IdAttribute, raw_id: &str) -> String {
    match attribute {
        IdAttribute::Id => format!("#{}", escape_css_ident(raw_id)),
        IdAttribute::DataId => format!(
            r#"[{}="{}"]"#,
            attribute.name(),
            raw_id.replace('\\', "\\\\").replace('"', "\\\"")
        ),
    }
}

/// True when some tag in `markup` carries `name="value"`. The attribute name must start after
/// whitespace so `id` does not match inside `data-id`.
fn has_attribute(markup: &str, name: &str, value: &str) -> bool {
    let needle = format!(r#"{name}="{value}""#);
    markup
        .match_indices(&needle)
        .any(|(at, _)| markup[..at].chars().next_back().is_some_and(char::is_whitespace))
}

/// What `apply_color` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// The diagram source was rewritten; it must be rescheduled for compilation.
    SourceRewritten(String),
    /// The overlay record changed; the last markup must be post-processed again.
    OverlayUpdated,
}

/// Applies a fill color to a resolved node using the strategy the grammar supports.
///
/// `source` is only read for flowchart-like grammars; `overrides` is only written for the rest.
pub fn apply_color(
    grammar: DiagramGrammar,
    node: &NodeMatch,
    fill: &str,
    source: &str,
    overrides: &mut OverrideRecord,
) -> Result<OverrideOutcome, ColorError> {
    let colors = NodeColors::from_fill(fill)?;
    match grammar.override_strategy() {
        OverrideStrategy::SourceDirective => {
            let directive = style_directive(&node.logical_id, &colors.fill, &colors.stroke);
            tracing::debug!(logical_id = %node.logical_id, %directive, "rewriting style directive");
            Ok(OverrideOutcome::SourceRewritten(upsert_style_directive(
                source,
                &node.logical_id,
                &directive,
            )))
        }
        OverrideStrategy::VisualOverlay => {
            tracing::debug!(raw_id = %node.raw_id, fill = %colors.fill, stroke = %colors.stroke, "recording overlay color");
            overrides.upsert_on(node.id_attribute, node.raw_id.clone(), colors);
            Ok(OverrideOutcome::OverlayUpdated)
        }
    }
}

pub fn style_directive(logical_id: &str, fill: &str, stroke: &str) -> String {
    format!(
        "style {} fill:{fill},stroke:{stroke},stroke-width:2px",
        quote_id(logical_id)
    )
}

/// Replaces the existing `style <id> ...` line for `logical_id`, or appends `directive` after the
/// last non-blank line. Trailing blank lines and the source's line endings are preserved.
pub fn upsert_style_directive(source: &str, logical_id: &str, directive: &str) -> String {
    let escaped = regex::escape(logical_id);
    let quoted = regex::escape(&quote_id(logical_id));
    let pattern = format!(r#"^\s*style\s+(?:{quoted}|"{escaped}"|{escaped})(?:\s|$)"#);
    // `escaped` comes from regex::escape, so the pattern is always valid.
    let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return source.to_string();
    };

    let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    let had_trailing_newline = source.ends_with('\n');

    if let Some(line) = lines.iter_mut().find(|l| re.is_match(l)) {
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        *line = format!("{indent}{directive}");
    } else {
        match lines.iter().rposition(|l| !l.trim().is_empty()) {
            Some(last) => {
                let indent: String = if last == 0 {
                    "    ".to_string()
                } else {
                    lines[last].chars().take_while(|c| c.is_whitespace()).collect()
                };
                lines.insert(last + 1, format!("{indent}{directive}"));
            }
            None => lines.insert(0, directive.to_string()),
        }
    }

    let mut out = lines.join(newline);
    if had_trailing_newline {
        out.push_str(newline);
    }
    out
}
