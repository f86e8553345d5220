use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Options handed to the external compiler for one compile call.
///
/// This is a plain JSON object (`theme`, `themeVariables`, `themeCSS`, ...). It is passed by value
/// into every compile so concurrent or superseded cycles never share mutable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerOptions(Value);

impl Default for CompilerOptions {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl CompilerOptions {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get(dotted_path)?.as_str()
    }

    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        // Compiler options are objects; coerce anything else so this never panics on user input.
        if !self.0.is_object() {
            self.0 = Value::Object(Map::new());
        }

        let Value::Object(ref mut root) = self.0 else {
            return;
        };
        let mut cur: &mut Map<String, Value> = root;
        let mut segments = dotted_path.split('.').peekable();
        while let Some(seg) = segments.next() {
            if segments.peek().is_none() {
                cur.insert(seg.to_string(), value);
                return;
            }
            let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let Some(next) = slot.as_object_mut() else {
                return;
            };
            cur = next;
        }
    }

    pub fn deep_merge(&mut self, other: &Value) {
        deep_merge_value(&mut self.0, other);
    }

    /// Appends raw CSS to the `themeCSS` string, keeping whatever the theme already supplies.
    pub fn append_theme_css(&mut self, css: &str) {
        let merged = match self.get_str("themeCSS") {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}\n{css}"),
            _ => css.to_string(),
        };
        self.set_value("themeCSS", Value::String(merged));
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

/// Tunables for the preview pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewSettings {
    pub debounce_ms: u64,
    pub export_pixel_ratio: f32,
    /// Added to each intrinsic dimension of the markup when sizing an export.
    pub export_margin_px: f32,
    pub export_quality: f32,
    /// Pause after a successful export before the viewport styling is restored.
    pub export_completion_delay_ms: u64,
    pub export_settle_frames: u32,
    pub reset_scale: f64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 600,
            export_pixel_ratio: 3.0,
            export_margin_px: 96.0,
            export_quality: 0.98,
            export_completion_delay_ms: 1000,
            export_settle_frames: 3,
            reset_scale: 1.2,
        }
    }
}

impl PreviewSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn export_completion_delay(&self) -> Duration {
        Duration::from_millis(self.export_completion_delay_ms)
    }
}
