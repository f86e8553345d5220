//! Theme configuration plus the background/font overrides layered on top of it.

use crate::config::CompilerOptions;
use crate::error::ThemeError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sentinel accepted by background/font overrides meaning "use the theme's own value".
pub const DEFAULT_SENTINEL: &str = "default";

/// Selectors that carry text in compiler output; font overrides target all of them.
pub const TEXT_SELECTORS: &str = "text, tspan, .label, .nodeLabel, .edgeLabel, .cluster-label, \
.messageText, .noteText, .labelText, .loopText, .actor, .taskText, .sectionTitle, .titleText, \
.legend, foreignObject div, foreignObject span, foreignObject p";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundStyle {
    /// Utility class applied to the preview container (e.g. `bg-[#1a1a1a]`).
    pub class: String,
    /// Solid color behind the diagram, when known.
    pub color: Option<String>,
    /// Extra inline CSS (patterns, gradients) in declaration order.
    pub css: IndexMap<String, String>,
}

impl BackgroundStyle {
    pub fn solid(color: impl Into<String>) -> Self {
        let color = color.into();
        Self {
            class: format!("bg-[{color}]"),
            color: Some(color),
            css: IndexMap::new(),
        }
    }

    /// CSS properties describing this background, `background-color` first.
    pub fn css_properties(&self) -> IndexMap<String, String> {
        let mut out = IndexMap::new();
        if let Some(color) = &self.color {
            out.insert("background-color".to_string(), color.clone());
        }
        for (k, v) in &self.css {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

/// Decorative SVG filter a theme wants injected into every render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecorativeFilter {
    /// Neon outer glow around node shapes.
    Glow { color: String },
    /// Soft drop shadow under node shapes.
    SoftShadow { color: String, opacity: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeConfig {
    pub name: String,
    #[serde(default)]
    pub compiler_options: CompilerOptions,
    #[serde(default)]
    pub background: BackgroundStyle,
    #[serde(default)]
    pub decorative_filter: Option<DecorativeFilter>,
}

impl ThemeConfig {
    pub fn from_json(text: &str) -> Result<Self, ThemeError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn line_color(&self) -> Option<&str> {
        self.compiler_options.get_str("themeVariables.lineColor")
    }

    /// Compiler options for one compile call: theme options with an optional font override
    /// injected both as `themeVariables.fontFamily` and as a textual CSS rule.
    ///
    /// The structured variable alone is not honored by every diagram type, so the CSS rule is
    /// always added as well.
    pub fn effective_compiler_options(&self, font: &FontOverride) -> CompilerOptions {
        let mut options = self.compiler_options.clone();
        if let Some(family) = font.family() {
            options.set_value("themeVariables.fontFamily", Value::String(family.to_string()));
            options.append_theme_css(&font_css_rule(family));
        }
        options
    }
}

/// `font-family` rule covering every text-bearing selector, with `!important`.
pub fn font_css_rule(family: &str) -> String {
    format!("{TEXT_SELECTORS} {{ font-family: {family} !important; }}")
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackgroundOverride {
    #[default]
    Default,
    Color(String),
}

impl BackgroundOverride {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(DEFAULT_SENTINEL) {
            Self::Default
        } else {
            Self::Color(value.to_string())
        }
    }

    /// The background in effect: the override when set, the theme's otherwise.
    pub fn resolve(&self, theme: &ThemeConfig) -> BackgroundStyle {
        match self {
            Self::Default => theme.background.clone(),
            Self::Color(color) => BackgroundStyle::solid(color.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FontOverride {
    #[default]
    Default,
    Family(String),
}

impl FontOverride {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(DEFAULT_SENTINEL) {
            Self::Default
        } else {
            Self::Family(value.to_string())
        }
    }

    pub fn family(&self) -> Option<&str> {
        match self {
            Self::Default => None,
            Self::Family(f) => Some(f.as_str()),
        }
    }
}

/// Names of the built-in themes, in menu order.
pub const BUILTIN_THEMES: &[&str] = &[
    "linearLight",
    "linearDark",
    "notion",
    "cyberpunk",
    "monochrome",
    "ghibli",
    "softPop",
    "darkMinimal",
];

fn css(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn base_theme(name: &str, variables: Value, theme_css: &str, background: BackgroundStyle) -> ThemeConfig {
    ThemeConfig {
        name: name.to_string(),
        compiler_options: CompilerOptions::from_value(json!({
            "theme": "base",
            "themeVariables": variables,
            "themeCSS": theme_css,
        })),
        background,
        decorative_filter: None,
    }
}

/// Looks up a built-in theme by its key (e.g. `darkMinimal`).
pub fn builtin_theme(key: &str) -> Result<ThemeConfig, ThemeError> {
    let theme = match key {
        "linearLight" => base_theme(
            "Linear Light",
            json!({
                "background": "#ffffff",
                "primaryColor": "#ffffff",
                "primaryTextColor": "#171717",
                "primaryBorderColor": "#e5e5e5",
                "lineColor": "#737373",
                "secondaryColor": "#fafafa",
                "tertiaryColor": "#f5f5f5",
                "fontFamily": "Inter, system-ui, sans-serif",
                "fontSize": "14px",
            }),
            ".node rect, .node circle, .node polygon, .node path { stroke-width: 1.5px; }\n\
             .edgePath .path { stroke-width: 1.5px; }\n\
             .cluster rect { stroke-dasharray: 4 4; stroke: #d4d4d4; fill: #fafafa; }",
            BackgroundStyle {
                class: "bg-white".to_string(),
                color: Some("#ffffff".to_string()),
                css: css(&[
                    ("background-image", "radial-gradient(#e5e5e5 1px, transparent 1px)"),
                    ("background-size", "20px 20px"),
                ]),
            },
        ),
        "linearDark" => base_theme(
            "Linear Dark",
            json!({
                "darkMode": true,
                "background": "#09090b",
                "primaryColor": "#18181b",
                "primaryTextColor": "#f4f4f5",
                "primaryBorderColor": "#27272a",
                "lineColor": "#52525b",
                "secondaryColor": "#27272a",
                "tertiaryColor": "#27272a",
                "fontFamily": "Inter, system-ui, sans-serif",
                "fontSize": "14px",
            }),
            ".node rect, .node circle, .node polygon, .node path { stroke-width: 1.5px; }\n\
             .edgePath .path { stroke-width: 1.5px; }",
            BackgroundStyle {
                class: "bg-[#09090b]".to_string(),
                color: Some("#09090b".to_string()),
                css: css(&[
                    ("background-image", "radial-gradient(#27272a 1px, transparent 1px)"),
                    ("background-size", "20px 20px"),
                ]),
            },
        ),
        "notion" => base_theme(
            "Notion",
            json!({
                "background": "#ffffff",
                "primaryColor": "#f1f5f9",
                "primaryTextColor": "#334155",
                "primaryBorderColor": "#cbd5e1",
                "lineColor": "#94a3b8",
                "secondaryColor": "#e2e8f0",
                "tertiaryColor": "#cbd5e1",
                "fontFamily": "-apple-system, BlinkMacSystemFont, \"Segoe UI\", Helvetica, Arial, sans-serif",
                "fontSize": "15px",
            }),
            ".node rect, .node polygon { rx: 4px !important; ry: 4px !important; }\n\
             .edgeLabel { color: #64748b; font-size: 13px; }\n\
             .actor { fill: #f1f5f9 !important; stroke: #cbd5e1 !important; stroke-width: 1px !important; }\n\
             .note { fill: #fef3c7 !important; stroke: #fbbf24 !important; stroke-width: 1px !important; }",
            BackgroundStyle {
                class: "bg-white".to_string(),
                color: Some("#ffffff".to_string()),
                css: IndexMap::new(),
            },
        ),
        "cyberpunk" => {
            let mut theme = base_theme(
                "Cyberpunk",
                json!({
                    "darkMode": true,
                    "background": "#051423",
                    "primaryColor": "#051423",
                    "primaryTextColor": "#00f2ff",
                    "primaryBorderColor": "#00f2ff",
                    "lineColor": "#00f2ff",
                    "secondaryColor": "#051423",
                    "tertiaryColor": "#051423",
                    "fontFamily": "Inter, system-ui, sans-serif",
                    "fontSize": "16px",
                    "mainBkg": "#051423",
                    "nodeBorder": "#00f2ff",
                    "clusterBkg": "#051423",
                    "clusterBorder": "#00f2ff",
                    "edgeLabelBackground": "#051423",
                }),
                ".node rect, .node circle, .node polygon, .node path { stroke: #00f2ff !important; stroke-width: 3px !important; fill: #051423 !important; }\n\
                 .edgePath .path { stroke: #00f2ff !important; stroke-width: 2px !important; }\n\
                 .arrowheadPath { fill: #00f2ff !important; stroke: #00f2ff !important; }\n\
                 .edgeLabel, .label { color: #00f2ff !important; font-weight: 600; }",
                BackgroundStyle {
                    class: "bg-[#051423]".to_string(),
                    color: Some("#051423".to_string()),
                    css: css(&[
                        (
                            "background-image",
                            "linear-gradient(rgba(0, 242, 255, 0.03) 1px, transparent 1px), \
                             linear-gradient(90deg, rgba(0, 242, 255, 0.03) 1px, transparent 1px)",
                        ),
                        ("background-size", "40px 40px, 40px 40px"),
                    ]),
                },
            );
            theme.decorative_filter = Some(DecorativeFilter::Glow {
                color: "#00f2ff".to_string(),
            });
            theme
        }
        "monochrome" => base_theme(
            "Monochrome",
            json!({
                "background": "#ffffff",
                "primaryColor": "#ffffff",
                "primaryTextColor": "#000000",
                "primaryBorderColor": "#000000",
                "lineColor": "#000000",
                "secondaryColor": "#ffffff",
                "tertiaryColor": "#ffffff",
                "fontFamily": "Inter, sans-serif",
                "mainBkg": "#ffffff",
                "nodeBorder": "#000000",
                "clusterBkg": "#ffffff",
                "clusterBorder": "#000000",
            }),
            ".node rect, .node circle { stroke-width: 2px; fill: #fff; }\n\
             .edgePath .path { stroke-width: 2px; }\n\
             .cluster rect { stroke-width: 2px; fill: #fff; }",
            BackgroundStyle {
                class: "bg-white".to_string(),
                color: Some("#ffffff".to_string()),
                css: IndexMap::new(),
            },
        ),
        "ghibli" => {
            let mut theme = base_theme(
                "Ghibli",
                json!({
                    "background": "#FDF6E3",
                    "primaryColor": "#ffffff",
                    "primaryTextColor": "#3A2E2C",
                    "primaryBorderColor": "#D2B48C",
                    "lineColor": "#3A2E2C",
                    "secondaryColor": "#fff3e0",
                    "tertiaryColor": "#e8f5e9",
                    "fontFamily": "\"Open Sans\", \"Noto Sans SC\", sans-serif",
                    "fontSize": "16px",
                    "edgeLabelBackground": "#FDF6E3",
                }),
                ".node rect, .node circle, .node polygon { fill: #ffffff !important; stroke: none !important; rx: 8px !important; ry: 8px !important; }\n\
                 .edgePath .path { stroke: #3A2E2C !important; stroke-width: 1.5px !important; opacity: 0.8; }\n\
                 .actor { fill: #ffffff !important; stroke: none !important; }\n\
                 .actor-line { stroke: #D2B48C !important; stroke-width: 2px !important; }",
                BackgroundStyle {
                    class: "bg-[#FDF6E3]".to_string(),
                    color: Some("#FDF6E3".to_string()),
                    css: css(&[
                        (
                            "background-image",
                            "linear-gradient(45deg, rgba(210, 180, 140, 0.03) 25%, transparent 25%), \
                             linear-gradient(-45deg, rgba(210, 180, 140, 0.03) 25%, transparent 25%)",
                        ),
                        ("background-size", "20px 20px"),
                    ]),
                },
            );
            theme.decorative_filter = Some(DecorativeFilter::SoftShadow {
                color: "#3A2E2C".to_string(),
                opacity: 0.05,
            });
            theme
        }
        "softPop" => {
            let mut theme = base_theme(
                "Soft Pop",
                json!({
                    "background": "#EFF1F5",
                    "primaryColor": "#73D1C8",
                    "primaryTextColor": "#ffffff",
                    "primaryBorderColor": "#73D1C8",
                    "secondaryColor": "#FCD34D",
                    "secondaryTextColor": "#4B5563",
                    "tertiaryColor": "#5D6D7E",
                    "tertiaryTextColor": "#ffffff",
                    "lineColor": "#566573",
                    "fontFamily": "\"JetBrains Mono\", monospace",
                    "fontSize": "15px",
                }),
                ".node rect, .node circle, .node polygon { stroke: none !important; rx: 8px !important; ry: 8px !important; }\n\
                 .edgePath .path { stroke: #566573 !important; stroke-width: 3px !important; stroke-dasharray: 8 5; stroke-linecap: round; }\n\
                 .node rect { fill: #73D1C8 !important; }\n\
                 .node polygon { fill: #FCD34D !important; }\n\
                 .node circle { fill: #5D6D7E !important; }",
                BackgroundStyle {
                    class: "bg-[#EFF1F5]".to_string(),
                    color: Some("#EFF1F5".to_string()),
                    css: IndexMap::new(),
                },
            );
            theme.decorative_filter = Some(DecorativeFilter::SoftShadow {
                color: "#000000".to_string(),
                opacity: 0.12,
            });
            theme
        }
        "darkMinimal" => base_theme(
            "Dark Minimal",
            json!({
                "darkMode": true,
                "background": "#1a1a1a",
                "primaryColor": "#1a1a1a",
                "primaryTextColor": "#e5e5e5",
                "primaryBorderColor": "#404040",
                "lineColor": "#ffffff",
                "secondaryColor": "#1a1a1a",
                "tertiaryColor": "#1a1a1a",
                "fontFamily": "Inter, system-ui, sans-serif",
                "fontSize": "15px",
            }),
            ".node rect, .node circle, .node polygon { fill: #1a1a1a !important; stroke: #404040 !important; stroke-width: 1px !important; }\n\
             .edgePath .path { stroke: #ffffff !important; stroke-width: 3px !important; stroke-dasharray: 10 8 !important; }\n\
             .arrowheadPath { fill: #ffffff !important; stroke: #ffffff !important; }",
            BackgroundStyle {
                class: "bg-[#1a1a1a]".to_string(),
                color: Some("#1a1a1a".to_string()),
                css: IndexMap::new(),
            },
        ),
        other => {
            return Err(ThemeError::UnknownTheme {
                name: other.to_string(),
            });
        }
    };
    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_resolves() {
        for key in BUILTIN_THEMES {
            let theme = builtin_theme(key).unwrap();
            assert!(!theme.name.is_empty());
            assert_eq!(theme.compiler_options.get_str("theme"), Some("base"));
        }
        assert!(matches!(
            builtin_theme("vaporwave"),
            Err(ThemeError::UnknownTheme { .. })
        ));
    }

    #[test]
    fn font_override_is_injected_twice() {
        let theme = builtin_theme("linearLight").unwrap();
        let opts = theme.effective_compiler_options(&FontOverride::parse("Comic Sans MS"));
        assert_eq!(
            opts.get_str("themeVariables.fontFamily"),
            Some("Comic Sans MS")
        );
        let css = opts.get_str("themeCSS").unwrap();
        assert!(css.contains(".cluster rect"));
        assert!(css.contains("font-family: Comic Sans MS !important;"));
    }

    #[test]
    fn default_sentinel_defers_to_theme() {
        let theme = builtin_theme("darkMinimal").unwrap();
        assert_eq!(FontOverride::parse("default"), FontOverride::Default);
        assert_eq!(
            theme.effective_compiler_options(&FontOverride::Default),
            theme.compiler_options
        );
        assert_eq!(BackgroundOverride::parse(" Default ").resolve(&theme), theme.background);
        let custom = BackgroundOverride::parse("#123456").resolve(&theme);
        assert_eq!(custom.class, "bg-[#123456]");
        assert_eq!(custom.color.as_deref(), Some("#123456"));
    }

    #[test]
    fn theme_round_trips_through_json() {
        let theme = builtin_theme("cyberpunk").unwrap();
        let text = serde_json::to_string(&theme).unwrap();
        assert_eq!(ThemeConfig::from_json(&text).unwrap(), theme);
        assert!(matches!(
            ThemeConfig::from_json("{"),
            Err(ThemeError::Json(_))
        ));
    }
}
