//! Fixed-order augmentation of compiler output before it is published.
//!
//! 1. dash patterns for edge paths under specific theme/background signatures
//! 2. decorative filter definitions for themes that ask for one
//! 3. font override CSS
//! 4. per-node override CSS

use crate::grammar::DiagramGrammar;
use crate::overrides::OverrideRecord;
use crate::patch;
use crate::theme::{BackgroundStyle, DecorativeFilter, FontOverride, ThemeConfig, font_css_rule};

pub const GLOW_FILTER_ID: &str = "lagoon-glow";
pub const SOFT_SHADOW_FILTER_ID: &str = "lagoon-soft-shadow";

/// Shapes the decorative filter is applied to.
const FILTERED_SHAPES: &str = ".node rect, .node circle, .node polygon, .node path, .actor, .note";

/// A theme line color and background that together call for dashed edges.
#[derive(Debug, Clone, Copy)]
pub struct DashSignature {
    pub line_color: &'static str,
    pub background_class: &'static str,
    pub pattern: &'static str,
}

pub const DASH_SIGNATURES: &[DashSignature] = &[DashSignature {
    line_color: "#ffffff",
    background_class: "bg-[#1a1a1a]",
    pattern: "10,8",
}];

/// Everything post-processing needs besides the markup itself.
#[derive(Debug, Clone, Copy)]
pub struct PostProcessContext<'a> {
    pub grammar: DiagramGrammar,
    pub theme: &'a ThemeConfig,
    pub background: &'a BackgroundStyle,
    pub font: &'a FontOverride,
}

pub fn dash_pattern(theme: &ThemeConfig, background: &BackgroundStyle) -> Option<&'static str> {
    let line_color = theme.line_color()?;
    DASH_SIGNATURES
        .iter()
        .find(|sig| {
            sig.line_color.eq_ignore_ascii_case(line_color) && sig.background_class == background.class
        })
        .map(|sig| sig.pattern)
}

pub fn filter_definition(filter: &DecorativeFilter) -> (&'static str, String) {
    match filter {
        DecorativeFilter::Glow { color } => (
            GLOW_FILTER_ID,
            format!(
                r#"<filter id="{GLOW_FILTER_ID}" x="-50%" y="-50%" width="200%" height="200%"><feGaussianBlur in="SourceAlpha" stdDeviation="4" result="blur"/><feFlood flood-color="{color}" flood-opacity="0.6"/><feComposite in2="blur" operator="in" result="glow"/><feMerge><feMergeNode in="glow"/><feMergeNode in="SourceGraphic"/></feMerge></filter>"#
            ),
        ),
        DecorativeFilter::SoftShadow { color, opacity } => (
            SOFT_SHADOW_FILTER_ID,
            format!(
                r#"<filter id="{SOFT_SHADOW_FILTER_ID}" x="-20%" y="-20%" width="140%" height="160%"><feDropShadow dx="0" dy="2" stdDeviation="4" flood-color="{color}" flood-opacity="{opacity}"/></filter>"#
            ),
        ),
    }
}

pub fn post_process(markup: &str, ctx: &PostProcessContext<'_>, overrides: &OverrideRecord) -> String {
    let mut out = markup.to_string();

    if let Some(pattern) = dash_pattern(ctx.theme, ctx.background) {
        out = patch::force_dash_array(&out, ctx.grammar.edge_path_classes(), pattern);
    }

    if let Some(filter) = &ctx.theme.decorative_filter {
        let (id, definition) = filter_definition(filter);
        let apply = format!("<style>{FILTERED_SHAPES} {{ filter: url(#{id}); }}</style>");
        out = patch::insert_into_defs(&out, &format!("{definition}{apply}"));
    }

    if let Some(family) = ctx.font.family() {
        out = patch::insert_style(&out, &font_css_rule(family));
    }

    if !overrides.is_empty() {
        out = patch::insert_style(&out, &overrides.to_css());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::NodeColors;
    use crate::theme::{BackgroundOverride, builtin_theme};

    const FLOW: &str = r#"<svg id="r" viewBox="0 0 10 10"><g><path class="path" d="M0"/></g></svg>"#;
    const FLOW_WITH_DEFS: &str =
        r#"<svg id="r" viewBox="0 0 10 10"><defs><marker id="m"/></defs><g><path class="path" d="M0"/></g></svg>"#;

    fn ctx<'a>(
        theme: &'a ThemeConfig,
        background: &'a BackgroundStyle,
        font: &'a FontOverride,
    ) -> PostProcessContext<'a> {
        PostProcessContext {
            grammar: DiagramGrammar::Flowchart,
            theme,
            background,
            font,
        }
    }

    #[test]
    fn dark_minimal_dashes_edges_only_on_its_own_background() {
        let theme = builtin_theme("darkMinimal").unwrap();
        let font = FontOverride::Default;

        let bg = BackgroundOverride::Default.resolve(&theme);
        let out = post_process(FLOW, &ctx(&theme, &bg, &font), &OverrideRecord::new());
        assert!(out.contains(r#"<path stroke-dasharray="10,8" class="path""#));

        let other_bg = BackgroundOverride::parse("#ffffff").resolve(&theme);
        let out = post_process(FLOW, &ctx(&theme, &other_bg, &font), &OverrideRecord::new());
        assert_eq!(out, FLOW);
    }

    #[test]
    fn glow_filter_lands_in_defs_either_way() {
        let theme = builtin_theme("cyberpunk").unwrap();
        let bg = theme.background.clone();
        let font = FontOverride::Default;
        for markup in [FLOW, FLOW_WITH_DEFS] {
            let out = post_process(markup, &ctx(&theme, &bg, &font), &OverrideRecord::new());
            let defs_start = out.find("<defs>").unwrap();
            let defs_end = out.find("</defs>").unwrap();
            let filter_at = out.find(r#"<filter id="lagoon-glow""#).unwrap();
            assert!(defs_start < filter_at && filter_at < defs_end);
            assert!(out.contains("filter: url(#lagoon-glow);"));
            assert_eq!(out.matches("<defs>").count(), 1);
        }
    }

    #[test]
    fn steps_run_in_order() {
        let theme = builtin_theme("ghibli").unwrap();
        let bg = theme.background.clone();
        let font = FontOverride::parse("Georgia");
        let mut overrides = OverrideRecord::new();
        overrides.upsert(
            "flowchart-A-0",
            NodeColors {
                fill: "#ff0000".to_string(),
                stroke: "#990000".to_string(),
            },
        );
        let out = post_process(FLOW_WITH_DEFS, &ctx(&theme, &bg, &font), &overrides);
        let filter_at = out.find(SOFT_SHADOW_FILTER_ID).unwrap();
        let font_at = out.find("font-family: Georgia !important;").unwrap();
        let override_at = out.find("#flowchart-A-0 rect").unwrap();
        assert!(filter_at < font_at && font_at < override_at);
        assert!(out.ends_with("</defs><g><path class=\"path\" d=\"M0\"/></g></svg>"));
    }

    #[test]
    fn font_names_with_markup_characters_stay_well_formed() {
        let theme = builtin_theme("linearLight").unwrap();
        let bg = theme.background.clone();
        let font = FontOverride::parse("Tom & Jerry");
        let out = post_process(FLOW, &ctx(&theme, &bg, &font), &OverrideRecord::new());
        assert!(out.contains("font-family: Tom &amp; Jerry !important;"));
        assert!(roxmltree::Document::parse(&out).is_ok());
    }

    #[test]
    fn plain_theme_leaves_markup_untouched() {
        let theme = builtin_theme("linearLight").unwrap();
        let bg = theme.background.clone();
        let font = FontOverride::Default;
        let out = post_process(FLOW, &ctx(&theme, &bg, &font), &OverrideRecord::new());
        assert_eq!(out, FLOW);
    }
}
