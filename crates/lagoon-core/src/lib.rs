#![forbid(unsafe_code)]

//! Headless live-preview pipeline for Mermaid diagrams.
//!
//! Design goals:
//! - the diagram compiler, rasterizer and download target are host-provided traits
//! - deterministic scheduling (callers pass the clock in), so every behavior is testable
//! - runtime-agnostic async APIs (no specific executor required)

pub mod color;
pub mod config;
pub mod error;
pub mod export;
pub mod grammar;
pub mod overrides;
pub mod patch;
pub mod postprocess;
pub mod preview;
pub mod resolve;
pub mod schedule;
pub mod surface;
pub mod theme;
pub mod viewport;

pub use config::{CompilerOptions, PreviewSettings};
pub use error::{
    ColorError, CompileError, CompileFailure, DownloadFailure, ExportError, RasterFailure,
    ThemeError,
};
pub use export::{
    DownloadSink, EncodedImage, ExportPipeline, ExportReport, ExportRequest, ImageFormat,
    PreviewSurface, RasterRequest, Rasterizer, ResourceFilter, Size, SurfaceStyle,
};
pub use grammar::DiagramGrammar;
pub use overrides::{NodeColors, OverrideOutcome, OverrideRecord};
pub use preview::{PreviewCommand, PreviewSession, PreviewView};
pub use resolve::{IdAttribute, MarkupNode, NodeMatch, NodeResolver};
pub use schedule::{
    CompileJob, Compiled, CycleOutcome, DiagramCompiler, RenderConfig, RenderResult,
    RenderScheduler,
};
pub use surface::HeadlessSurface;
pub use theme::{
    BUILTIN_THEMES, BackgroundOverride, BackgroundStyle, DecorativeFilter, FontOverride,
    ThemeConfig, builtin_theme,
};
pub use viewport::{EventDisposition, Point, PointerButton, TransformStyle, ViewportController};
