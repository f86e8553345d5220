//! Color and identifier helpers shared by the override engine and markup patching.

use crate::error::ColorError;
use std::fmt::Write as _;

/// Multiplier applied to each channel of a fill color to derive its stroke color.
pub const STROKE_DARKEN_FACTOR: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parses `#rrggbb` or `#rgb` (case-insensitive, leading `#` optional).
    pub fn parse_hex(text: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::InvalidHex {
            input: text.to_string(),
        };
        let hex = text.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(invalid());
        }

        fn nibble(c: u8) -> Option<u8> {
            (c as char).to_digit(16).map(|v| v as u8)
        }

        let bytes = hex.as_bytes();
        match bytes.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, &c) in out.iter_mut().zip(bytes) {
                    let v = nibble(c).ok_or_else(invalid)?;
                    *slot = (v << 4) | v;
                }
                Ok(Self {
                    r: out[0],
                    g: out[1],
                    b: out[2],
                })
            }
            6 => {
                let mut out = [0u8; 3];
                for (slot, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                    let hi = nibble(pair[0]).ok_or_else(invalid)?;
                    let lo = nibble(pair[1]).ok_or_else(invalid)?;
                    *slot = (hi << 4) | lo;
                }
                Ok(Self {
                    r: out[0],
                    g: out[1],
                    b: out[2],
                })
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Scales every channel by `factor` and floors the result.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |c: u8| (f64::from(c) * factor).floor().clamp(0.0, 255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }
}

/// Darkens a hex color by multiplying each RGB channel by `factor`.
///
/// `darken("#FF0000", 0.6)` yields `#990000`.
pub fn darken(color: &str, factor: f64) -> Result<String, ColorError> {
    Ok(Rgb::parse_hex(color)?.scaled(factor).to_hex())
}

/// Stroke color paired with a user-chosen fill.
pub fn stroke_for_fill(fill: &str) -> Result<String, ColorError> {
    darken(fill, STROKE_DARKEN_FACTOR)
}

/// True when an identifier contains anything outside `[A-Za-z0-9_]`.
pub fn needs_quoting(id: &str) -> bool {
    !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quotes an identifier for use in a `style` directive when it is not a plain word.
///
/// Embedded double quotes use Mermaid's `#quot;` entity so the directive stays parseable.
pub fn quote_id(id: &str) -> String {
    if needs_quoting(id) {
        format!("\"{}\"", id.replace('"', "#quot;"))
    } else {
        id.to_string()
    }
}

/// Escapes a string for use as a CSS identifier (the `CSS.escape` algorithm).
pub fn escape_css_ident(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 8);
    let chars: Vec<char> = ident.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        let code = ch as u32;
        if code == 0 {
            out.push('\u{FFFD}');
        } else if (0x01..=0x1f).contains(&code)
            || code == 0x7f
            || (i == 0 && ch.is_ascii_digit())
            || (i == 1 && ch.is_ascii_digit() && chars[0] == '-')
        {
            let _ = write!(&mut out, "\\{code:x} ");
        } else if i == 0 && ch == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if code >= 0x80 || ch == '-' || ch == '_' || ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('\\');
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darken_red() {
        assert_eq!(darken("#FF0000", 0.6).unwrap(), "#990000");
    }

    #[test]
    fn darken_floors_each_channel() {
        // 0x80 * 0.6 = 76.8 -> 76 (0x4c)
        assert_eq!(darken("#80ff00", 0.6).unwrap(), "#4c9900");
        assert_eq!(stroke_for_fill("#fff").unwrap(), "#999999");
    }

    #[test]
    fn darken_rejects_garbage() {
        assert!(matches!(
            darken("red", 0.6),
            Err(ColorError::InvalidHex { .. })
        ));
        assert!(darken("#12345", 0.6).is_err());
        assert!(darken("#gg0000", 0.6).is_err());
    }

    #[test]
    fn quoting_follows_word_characters() {
        assert_eq!(quote_id("A"), "A");
        assert_eq!(quote_id("node_12"), "node_12");
        assert_eq!(quote_id("my node"), "\"my node\"");
        assert_eq!(quote_id("已建立"), "\"已建立\"");
        assert_eq!(quote_id("a-b"), "\"a-b\"");
        assert_eq!(quote_id("say \"hi\""), "\"say #quot;hi#quot;\"");
    }

    #[test]
    fn css_escape_matches_browser_behavior() {
        assert_eq!(escape_css_ident("flowchart-A-0"), "flowchart-A-0");
        assert_eq!(escape_css_ident("state-已建立-2"), "state-已建立-2");
        assert_eq!(escape_css_ident("1abc"), "\\31 abc");
        assert_eq!(escape_css_ident("-1"), "-\\31 ");
        assert_eq!(escape_css_ident("-"), "\\-");
        assert_eq!(escape_css_ident("a b.c"), "a\\ b\\.c");
    }
}
