//! Pure-Rust export rasterizer for [`HeadlessSurface`]: usvg parses the published markup,
//! resvg draws it onto a tiny-skia canvas sized by the export plan, and the canvas is encoded as
//! PNG (alpha kept) or JPEG (flattened onto the export background).

use lagoon_core::color::Rgb;
use lagoon_core::{EncodedImage, HeadlessSurface, ImageFormat, RasterFailure, RasterRequest, Rasterizer};

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("markup is not renderable SVG: {0}")]
    Parse(String),
    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("unsupported background color {0:?}")]
    Background(String),
    #[error("JPEG export needs an opaque background, got {0:?}")]
    TranslucentBackground(String),
    #[error("{format:?} encoding failed: {message}")]
    Encode { format: ImageFormat, message: String },
}

impl From<RasterError> for RasterFailure {
    fn from(err: RasterError) -> Self {
        RasterFailure::new(err.to_string())
    }
}

/// Renders the surface markup centered on a canvas of the requested size.
#[derive(Debug, Clone)]
pub struct ResvgRasterizer {
    font_family: String,
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self {
            // Used when a text element names no family usvg can resolve.
            font_family: "Arial".to_string(),
        }
    }
}

impl ResvgRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn rasterize_svg(&self, svg: &str, request: &RasterRequest) -> Result<EncodedImage, RasterError> {
        let svg = request.resource_filter.filter_markup(svg);
        let background = request
            .background_color
            .as_deref()
            .map(|text| background_color(text).map(|color| (text, color)))
            .transpose()?;

        let bytes = match request.format {
            ImageFormat::Png => {
                let canvas = self.draw(&svg, request, background.map(|(_, color)| color))?;
                canvas.encode_png().map_err(|err| RasterError::Encode {
                    format: ImageFormat::Png,
                    message: err.to_string(),
                })?
            }
            ImageFormat::Jpeg => {
                let (text, color) = background.unwrap_or(("white", tiny_skia::Color::WHITE));
                if !color.is_opaque() {
                    return Err(RasterError::TranslucentBackground(text.to_string()));
                }
                let canvas = self.draw(&svg, request, Some(color))?;
                encode_jpeg(&canvas, request.quality)?
            }
        };
        Ok(EncodedImage {
            format: request.format,
            bytes,
        })
    }

    fn draw(
        &self,
        svg: &str,
        request: &RasterRequest,
        background: Option<tiny_skia::Color>,
    ) -> Result<tiny_skia::Pixmap, RasterError> {
        let mut options = usvg::Options::default();
        options.fontdb_mut().load_system_fonts();
        options.font_family = self.font_family.clone();
        let tree = usvg::Tree::from_str(svg, &options).map_err(|err| RasterError::Parse(err.to_string()))?;

        let diagram = tree.size();
        let scale = request.pixel_ratio.max(f32::EPSILON);
        let canvas_w = request.width.max(diagram.width());
        let canvas_h = request.height.max(diagram.height());
        let width = (canvas_w * scale).ceil().max(1.0) as u32;
        let height = (canvas_h * scale).ceil().max(1.0) as u32;

        let mut canvas = tiny_skia::Pixmap::new(width, height).ok_or(RasterError::Canvas { width, height })?;
        if let Some(color) = background {
            canvas.fill(color);
        }

        // The space around the diagram is the export margin; split it evenly.
        let dx = (canvas_w - diagram.width()) / 2.0 * scale;
        let dy = (canvas_h - diagram.height()) / 2.0 * scale;
        let transform = tiny_skia::Transform::from_scale(scale, scale).post_translate(dx, dy);
        resvg::render(&tree, transform, &mut canvas.as_mut());
        Ok(canvas)
    }
}

impl Rasterizer<HeadlessSurface> for ResvgRasterizer {
    async fn rasterize(
        &self,
        surface: &HeadlessSurface,
        request: &RasterRequest,
    ) -> Result<EncodedImage, RasterFailure> {
        Ok(self.rasterize_svg(surface.markup(), request)?)
    }
}

/// Drops the alpha channel of an opaque canvas and encodes it as baseline JPEG.
fn encode_jpeg(canvas: &tiny_skia::Pixmap, quality: f32) -> Result<Vec<u8>, RasterError> {
    let encode_err = |message: String| RasterError::Encode {
        format: ImageFormat::Jpeg,
        message,
    };
    let rgba = image::RgbaImage::from_raw(canvas.width(), canvas.height(), canvas.data().to_vec())
        .ok_or_else(|| encode_err("canvas buffer size mismatch".to_string()))?;
    let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality))
        .encode_image(&rgb)
        .map_err(|err| encode_err(err.to_string()))?;
    Ok(out)
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Export backgrounds are theme hex colors, optionally with a trailing alpha byte or nibble, or
/// one of a few keywords.
fn background_color(text: &str) -> Result<tiny_skia::Color, RasterError> {
    let value = text.trim();
    match value.to_ascii_lowercase().as_str() {
        "transparent" | "none" => return Ok(tiny_skia::Color::TRANSPARENT),
        "white" => return Ok(tiny_skia::Color::WHITE),
        "black" => return Ok(tiny_skia::Color::BLACK),
        _ => {}
    }

    let unsupported = || RasterError::Background(text.to_string());
    let hex = value.strip_prefix('#').unwrap_or(value);
    let (rgb, alpha) = match hex.len() {
        3 | 6 => (hex, 0xff),
        4 | 8 if hex.is_ascii() => {
            let split = hex.len() / 4 * 3;
            let alpha = &hex[split..];
            let alpha = u8::from_str_radix(alpha, 16).map_err(|_| unsupported())?;
            (&hex[..split], if hex.len() == 4 { alpha * 0x11 } else { alpha })
        }
        _ => return Err(unsupported()),
    };
    let Rgb { r, g, b } = Rgb::parse_hex(rgb).map_err(|_| unsupported())?;
    Ok(tiny_skia::Color::from_rgba8(r, g, b, alpha))
}
