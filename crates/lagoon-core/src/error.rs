#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("Invalid hex color: {input:?} (expected #rrggbb or #rgb)")]
    InvalidHex { input: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("Unknown theme: {name}")]
    UnknownTheme { name: String },

    #[error("Invalid theme JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejection reported by the external diagram compiler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Diagram compile failed: {message}")]
pub struct CompileFailure {
    pub message: String,
}

impl CompileFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error kind published in place of markup when a compile cycle fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Syntax Error: Please check your Mermaid syntax.")]
    Syntax { detail: String },
}

impl From<CompileFailure> for CompileError {
    fn from(value: CompileFailure) -> Self {
        Self::Syntax {
            detail: value.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rasterization failed: {message}")]
pub struct RasterFailure {
    pub message: String,
}

impl RasterFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to save {file_name}: {message}")]
pub struct DownloadFailure {
    pub file_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    #[error("Nothing to export: no diagram has been rendered yet")]
    NothingToExport,

    #[error(transparent)]
    Raster(#[from] RasterFailure),

    #[error(transparent)]
    Download(#[from] DownloadFailure),
}

impl ExportError {
    /// Text shown to the user when an export fails.
    pub fn alert_text(&self) -> &'static str {
        match self {
            ExportError::NothingToExport => "Nothing to export yet.",
            ExportError::Raster(_) | ExportError::Download(_) => {
                "Export failed. See console for details."
            }
        }
    }
}
