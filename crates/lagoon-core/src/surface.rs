//! In-memory [`PreviewSurface`] for hosts without a DOM (CLI, tests).

use crate::export::{PreviewSurface, Size, SurfaceStyle};
use crate::patch;
use std::cell::{Cell, RefCell};
use std::future::{Future, ready};
use std::time::Duration;

/// Padding around the diagram inside the content element (`p-12`).
pub const CONTENT_PADDING_PX: f32 = 48.0;

/// Frames and sleeps resolve immediately; both are counted so callers can observe them.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    markup: String,
    style: SurfaceStyle,
    padding: f32,
    frames: Cell<u32>,
    sleeps: RefCell<Vec<Duration>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self {
            padding: CONTENT_PADDING_PX,
            ..Self::default()
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn frames_waited(&self) -> u32 {
        self.frames.get()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl PreviewSurface for HeadlessSurface {
    fn set_markup(&mut self, markup: &str) {
        self.markup = markup.to_string();
    }

    fn inline_style(&self) -> SurfaceStyle {
        self.style.clone()
    }

    fn set_inline_style(&mut self, style: SurfaceStyle) {
        self.style = style;
    }

    fn box_size(&self) -> Size {
        patch::intrinsic_size(&self.markup)
            .map(|(w, h)| Size {
                width: w + 2.0 * self.padding,
                height: h + 2.0 * self.padding,
            })
            .unwrap_or_default()
    }

    fn next_frame(&self) -> impl Future<Output = ()> {
        self.frames.set(self.frames.get() + 1);
        ready(())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.sleeps.borrow_mut().push(duration);
        ready(())
    }
}
