//! Rasterizes the current preview to a downloadable image.
//!
//! The viewport transform is suspended for the duration of the capture so the image shows the
//! diagram at its natural size, then restored whether or not the capture succeeded.

use crate::config::PreviewSettings;
use crate::error::{DownloadFailure, ExportError, RasterFailure};
use crate::patch;
use crate::theme::BackgroundStyle;
use crate::viewport::TransformStyle;
use base64::Engine as _;
use indexmap::IndexMap;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Inline `transform`/`transition` of the preview content element. `None` means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceStyle {
    pub transform: Option<String>,
    pub transition: Option<String>,
}

impl SurfaceStyle {
    /// Identity transform with animations off, used while capturing.
    pub fn frozen() -> Self {
        Self {
            transform: Some("none".to_string()),
            transition: Some("none".to_string()),
        }
    }
}

impl From<&TransformStyle> for SurfaceStyle {
    fn from(style: &TransformStyle) -> Self {
        Self {
            transform: Some(style.transform.clone()),
            transition: Some(style.transition.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// The element hosting the rendered diagram.
pub trait PreviewSurface {
    fn set_markup(&mut self, markup: &str);
    fn inline_style(&self) -> SurfaceStyle;
    fn set_inline_style(&mut self, style: SurfaceStyle);
    /// Untransformed layout box of the content element.
    fn box_size(&self) -> Size;
    /// Resolves after the host has laid out and painted the next frame.
    fn next_frame(&self) -> impl Future<Output = ()>;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRef<'a> {
    pub tag: &'a str,
    pub rel: Option<&'a str>,
    pub href: Option<&'a str>,
}

static LINK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link\b[^>]*>").unwrap());
static CSS_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?[^;]*;"#).unwrap()
});

/// Decides which external resources may be inlined into a capture. Stylesheets from another
/// origin cannot be read back by the capture step and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    page: Option<Url>,
}

impl ResourceFilter {
    pub fn new(page: Option<Url>) -> Self {
        Self { page }
    }

    pub fn page(&self) -> Option<&Url> {
        self.page.as_ref()
    }

    pub fn is_cross_origin(&self, href: &str) -> bool {
        let resolved = match &self.page {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        let Ok(url) = resolved else {
            // A relative reference with no page to resolve against stays in the document.
            return false;
        };
        let origin = url.origin();
        if !origin.is_tuple() {
            return false;
        }
        match &self.page {
            Some(page) => origin != page.origin(),
            None => true,
        }
    }

    pub fn allows(&self, resource: &ResourceRef<'_>) -> bool {
        let is_stylesheet = resource.tag.eq_ignore_ascii_case("link")
            && resource.rel.is_some_and(|rel| {
                rel.split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            });
        if !is_stylesheet {
            return true;
        }
        resource.href.is_none_or(|href| !self.is_cross_origin(href))
    }

    /// Removes stylesheet references the capture step must not fetch: `<link rel="stylesheet">`
    /// tags and CSS `@import` rules.
    pub fn filter_markup(&self, markup: &str) -> String {
        let without_links = LINK_TAG_RE.replace_all(markup, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let resource = ResourceRef {
                tag: "link",
                rel: patch::parse_attr_str(tag, "rel"),
                href: patch::parse_attr_str(tag, "href"),
            };
            if self.allows(&resource) {
                tag.to_string()
            } else {
                tracing::debug!(href = ?resource.href, "skipping cross-origin stylesheet");
                String::new()
            }
        });
        CSS_IMPORT_RE
            .replace_all(&without_links, |caps: &regex::Captures<'_>| {
                let resource = ResourceRef {
                    tag: "link",
                    rel: Some("stylesheet"),
                    href: Some(&caps[1]),
                };
                if self.allows(&resource) {
                    caps[0].to_string()
                } else {
                    tracing::debug!(href = %&caps[1], "skipping cross-origin @import");
                    String::new()
                }
            })
            .into_owned()
    }
}

/// Parameters for one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterRequest {
    pub format: ImageFormat,
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    /// Encoder quality in `0.0..=1.0`; only meaningful for lossy formats.
    pub quality: f32,
    /// Opaque fill behind the diagram. `None` keeps the capture transparent.
    pub background_color: Option<String>,
    /// CSS properties applied to the captured element.
    pub style: IndexMap<String, String>,
    pub resource_filter: ResourceFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Turns the live surface into encoded image bytes.
pub trait Rasterizer<S: PreviewSurface> {
    fn rasterize(
        &self,
        surface: &S,
        request: &RasterRequest,
    ) -> impl Future<Output = Result<EncodedImage, RasterFailure>>;
}

/// Hands a finished image to the user (browser download, file on disk, ...).
pub trait DownloadSink {
    fn save(&self, image: &EncodedImage, file_name: &str) -> Result<(), DownloadFailure>;
}

/// What to capture. Built from the last published render, never from pending edits.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub transparent: bool,
    pub markup: String,
    pub background: BackgroundStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub file_name: String,
    pub format: ImageFormat,
    pub width: f32,
    pub height: f32,
    pub byte_len: usize,
}

/// Milliseconds since the Unix epoch, used to stamp file names.
pub type Clock = fn() -> i64;

fn wall_clock_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Suspends the surface transform while alive; restores the saved style on drop.
struct FrozenSurface<'s, S: PreviewSurface> {
    surface: &'s mut S,
    saved: Option<SurfaceStyle>,
}

impl<'s, S: PreviewSurface> FrozenSurface<'s, S> {
    fn freeze(surface: &'s mut S) -> Self {
        let saved = surface.inline_style();
        surface.set_inline_style(SurfaceStyle::frozen());
        Self {
            surface,
            saved: Some(saved),
        }
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.surface.set_inline_style(saved);
        }
    }
}

impl<S: PreviewSurface> Drop for FrozenSurface<'_, S> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[derive(Debug, Clone)]
pub struct ExportPipeline {
    settings: PreviewSettings,
    resource_filter: ResourceFilter,
    clock: Clock,
}

impl ExportPipeline {
    pub fn new(settings: PreviewSettings) -> Self {
        Self {
            settings,
            resource_filter: ResourceFilter::default(),
            clock: wall_clock_millis,
        }
    }

    pub fn with_page_url(mut self, page: Url) -> Self {
        self.resource_filter = ResourceFilter::new(Some(page));
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn file_name(&self, format: ImageFormat) -> String {
        format!("diagram-{}.{}", (self.clock)(), format.extension())
    }

    /// Capture parameters for `request`. Sized from the markup's intrinsic dimensions plus a
    /// margin; the surface box is only used when the markup does not declare a size.
    pub fn plan(&self, request: &ExportRequest, surface_box: Size) -> RasterRequest {
        let margin = self.settings.export_margin_px;
        let (width, height) = match patch::intrinsic_size(&request.markup) {
            Some((w, h)) => (w + margin, h + margin),
            None => (surface_box.width, surface_box.height),
        };

        let mut style = IndexMap::new();
        style.insert("transform".to_string(), "none".to_string());
        let (format, background_color) = if request.transparent {
            style.insert("background".to_string(), "none".to_string());
            (ImageFormat::Png, None)
        } else {
            style.extend(request.background.css_properties());
            (ImageFormat::Jpeg, request.background.color.clone())
        };

        RasterRequest {
            format,
            width,
            height,
            pixel_ratio: self.settings.export_pixel_ratio,
            quality: self.settings.export_quality,
            background_color,
            style,
            resource_filter: self.resource_filter.clone(),
        }
    }

    /// Captures the surface and hands the image to `sink`.
    ///
    /// The surface's inline style is restored on every path, including when this future is
    /// dropped before completion.
    pub async fn export<S, R, D>(
        &self,
        request: &ExportRequest,
        surface: &mut S,
        rasterizer: &R,
        sink: &D,
    ) -> Result<ExportReport, ExportError>
    where
        S: PreviewSurface,
        R: Rasterizer<S>,
        D: DownloadSink,
    {
        if request.markup.trim().is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let mut frozen = FrozenSurface::freeze(surface);
        for _ in 0..self.settings.export_settle_frames {
            frozen.surface.next_frame().await;
        }

        let raster = self.plan(request, frozen.surface.box_size());
        tracing::debug!(
            format = ?raster.format,
            width = raster.width,
            height = raster.height,
            pixel_ratio = raster.pixel_ratio,
            "capturing preview"
        );

        let image = match rasterizer.rasterize(&*frozen.surface, &raster).await {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(error = %err, "export failed");
                return Err(err.into());
            }
        };

        let file_name = self.file_name(image.format);
        if let Err(err) = sink.save(&image, &file_name) {
            tracing::warn!(error = %err, "export failed");
            return Err(err.into());
        }
        tracing::info!(%file_name, bytes = image.bytes.len(), "exported diagram");

        frozen
            .surface
            .sleep(self.settings.export_completion_delay())
            .await;
        frozen.restore();

        Ok(ExportReport {
            file_name,
            format: image.format,
            width: raster.width,
            height: raster.height,
            byte_len: image.bytes.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use futures::executor::block_on;
    use std::cell::RefCell;

    struct FakeRasterizer {
        fail: bool,
        seen: RefCell<Vec<(SurfaceStyle, RasterRequest)>>,
    }

    impl FakeRasterizer {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl Rasterizer<HeadlessSurface> for FakeRasterizer {
        async fn rasterize(
            &self,
            surface: &HeadlessSurface,
            request: &RasterRequest,
        ) -> Result<EncodedImage, RasterFailure> {
            self.seen
                .borrow_mut()
                .push((surface.inline_style(), request.clone()));
            if self.fail {
                return Err(RasterFailure::new("canvas tainted"));
            }
            Ok(EncodedImage {
                format: request.format,
                bytes: vec![1, 2, 3],
            })
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: RefCell<Vec<String>>,
    }

    impl DownloadSink for MemorySink {
        fn save(&self, _image: &EncodedImage, file_name: &str) -> Result<(), DownloadFailure> {
            self.saved.borrow_mut().push(file_name.to_string());
            Ok(())
        }
    }

    fn fixed_clock() -> i64 {
        1_700_000_000_000
    }

    fn transformed_surface(markup: &str) -> HeadlessSurface {
        let mut surface = HeadlessSurface::new();
        surface.set_markup(markup);
        surface.set_inline_style(SurfaceStyle {
            transform: Some("translate(10px, 5px) scale(2)".to_string()),
            transition: Some("transform 0.1s ease-out".to_string()),
        });
        surface
    }

    fn request(transparent: bool) -> ExportRequest {
        ExportRequest {
            transparent,
            markup: r#"<svg width="200" height="100"><g/></svg>"#.to_string(),
            background: BackgroundStyle::solid("#1a1a1a"),
        }
    }

    #[test]
    fn export_captures_untransformed_and_restores() {
        let pipeline = ExportPipeline::new(PreviewSettings::default()).with_clock(fixed_clock);
        let mut surface = transformed_surface(r#"<svg width="200" height="100"><g/></svg>"#);
        let before = surface.inline_style();
        let rasterizer = FakeRasterizer::new(false);
        let sink = MemorySink::default();

        let report = block_on(pipeline.export(&request(false), &mut surface, &rasterizer, &sink)).unwrap();

        assert_eq!(report.file_name, "diagram-1700000000000.jpg");
        assert_eq!((report.width, report.height), (296.0, 196.0));
        assert_eq!(sink.saved.borrow().as_slice(), ["diagram-1700000000000.jpg"]);

        let seen = rasterizer.seen.borrow();
        assert_eq!(seen[0].0, SurfaceStyle::frozen());
        assert_eq!(seen[0].1.background_color.as_deref(), Some("#1a1a1a"));
        assert_eq!(seen[0].1.pixel_ratio, 3.0);

        assert_eq!(surface.frames_waited(), 3);
        assert_eq!(surface.sleeps(), vec![Duration::from_secs(1)]);
        assert_eq!(surface.inline_style(), before);
    }

    #[test]
    fn transparent_export_is_png_without_background() {
        let pipeline = ExportPipeline::new(PreviewSettings::default()).with_clock(fixed_clock);
        let plan = pipeline.plan(&request(true), Size::default());
        assert_eq!(plan.format, ImageFormat::Png);
        assert_eq!(plan.background_color, None);
        assert_eq!(plan.style.get("background").map(String::as_str), Some("none"));
        assert_eq!(pipeline.file_name(plan.format), "diagram-1700000000000.png");
    }

    #[test]
    fn failure_restores_and_reports() {
        let pipeline = ExportPipeline::new(PreviewSettings::default());
        let mut surface = transformed_surface(r#"<svg width="200" height="100"><g/></svg>"#);
        let before = surface.inline_style();
        let sink = MemorySink::default();

        let err = block_on(pipeline.export(&request(false), &mut surface, &FakeRasterizer::new(true), &sink))
            .unwrap_err();

        assert_eq!(err.alert_text(), "Export failed. See console for details.");
        assert_eq!(surface.inline_style(), before);
        assert!(surface.sleeps().is_empty());
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn nothing_rendered_means_nothing_to_export() {
        let pipeline = ExportPipeline::new(PreviewSettings::default());
        let mut surface = transformed_surface("");
        let empty = ExportRequest {
            markup: String::new(),
            ..request(false)
        };
        let err = block_on(pipeline.export(&empty, &mut surface, &FakeRasterizer::new(false), &MemorySink::default()))
            .unwrap_err();
        assert_eq!(err, ExportError::NothingToExport);
        assert_eq!(surface.frames_waited(), 0);
    }

    #[test]
    fn size_falls_back_to_surface_box() {
        let pipeline = ExportPipeline::new(PreviewSettings::default());
        let req = ExportRequest {
            markup: "<svg><g/></svg>".to_string(),
            ..request(false)
        };
        let plan = pipeline.plan(&req, Size { width: 640.0, height: 480.0 });
        assert_eq!((plan.width, plan.height), (640.0, 480.0));
    }

    #[test]
    fn cross_origin_stylesheets_are_filtered() {
        let filter = ResourceFilter::new(Some(Url::parse("https://app.example.com/editor").unwrap()));
        let link = |href| ResourceRef {
            tag: "link",
            rel: Some("stylesheet"),
            href: Some(href),
        };
        assert!(filter.allows(&link("/assets/app.css")));
        assert!(filter.allows(&link("https://app.example.com/x.css")));
        assert!(!filter.allows(&link("https://fonts.googleapis.com/css2?family=Inter")));
        assert!(filter.allows(&ResourceRef {
            tag: "img",
            rel: None,
            href: Some("https://cdn.example.org/a.png"),
        }));

        let markup = r#"<svg><style>@import url("https://fonts.googleapis.com/css2?family=Inter");.a{}</style><link rel="stylesheet" href="https://cdn.other.net/x.css"/><link rel="stylesheet" href="/local.css"/></svg>"#;
        assert_eq!(
            filter.filter_markup(markup),
            r#"<svg><style>.a{}</style><link rel="stylesheet" href="/local.css"/></svg>"#
        );
    }

    #[test]
    fn data_url_carries_mime_type() {
        let image = EncodedImage {
            format: ImageFormat::Png,
            bytes: b"hi".to_vec(),
        };
        assert_eq!(image.data_url(), "data:image/png;base64,aGk=");
    }
}
