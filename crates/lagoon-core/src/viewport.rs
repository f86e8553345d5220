//! Pan/zoom state for the preview surface. Independent of what is rendered.

pub const MIN_SCALE: f64 = 0.5;
pub const MAX_SCALE: f64 = 5.0;
pub const DEFAULT_SCALE: f64 = 1.2;
pub const WHEEL_STEP: f64 = 0.1;
pub const BUTTON_STEP: f64 = 0.2;

/// CSS transition applied to the transform when not dragging.
pub const EASED_TRANSITION: &str = "transform 0.1s ease-out";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Idle,
    Dragging { start: Point, origin: Point },
}

/// Inline style the content element should carry for the current viewport state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformStyle {
    pub transform: String,
    pub transform_origin: &'static str,
    pub transition: &'static str,
}

/// Whether the host should suppress the platform's default handling of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum EventDisposition {
    PreventDefault,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportController {
    scale: f64,
    translation: Point,
    drag: DragState,
    reset_scale: f64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::with_reset_scale(DEFAULT_SCALE)
    }
}

fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return DEFAULT_SCALE;
    }
    scale.clamp(MIN_SCALE, MAX_SCALE)
}

impl ViewportController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reset_scale(reset_scale: f64) -> Self {
        let reset_scale = clamp_scale(reset_scale);
        Self {
            scale: reset_scale,
            translation: Point::ORIGIN,
            drag: DragState::Idle,
            reset_scale,
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translation(&self) -> Point {
        self.translation
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    /// Zoom level as a whole percentage, e.g. `120` for a scale of 1.2.
    pub fn zoom_percent(&self) -> u32 {
        (self.scale * 100.0).round() as u32
    }

    pub fn cursor(&self) -> &'static str {
        if self.is_dragging() { "grabbing" } else { "grab" }
    }

    pub fn pointer_down(&mut self, button: PointerButton, at: Point) -> EventDisposition {
        if button != PointerButton::Primary {
            return EventDisposition::Ignored;
        }
        self.drag = DragState::Dragging {
            start: at,
            origin: self.translation,
        };
        EventDisposition::PreventDefault
    }

    pub fn pointer_move(&mut self, at: Point) {
        if let DragState::Dragging { start, origin } = self.drag {
            self.translation = Point {
                x: origin.x + (at.x - start.x),
                y: origin.y + (at.y - start.y),
            };
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.drag = DragState::Idle;
    }

    /// One wheel notch: scrolling down (positive delta) zooms out, up zooms in.
    pub fn wheel(&mut self, delta_y: f64) -> EventDisposition {
        if delta_y > 0.0 {
            self.set_scale(self.scale - WHEEL_STEP);
        } else if delta_y < 0.0 {
            self.set_scale(self.scale + WHEEL_STEP);
        }
        EventDisposition::PreventDefault
    }

    pub fn zoom_in(&mut self) {
        self.set_scale(self.scale + BUTTON_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_scale(self.scale - BUTTON_STEP);
    }

    pub fn reset(&mut self) {
        self.scale = self.reset_scale;
        self.translation = Point::ORIGIN;
    }

    fn set_scale(&mut self, scale: f64) {
        self.scale = clamp_scale(scale);
    }

    pub fn transform_style(&self) -> TransformStyle {
        TransformStyle {
            transform: format!(
                "translate({}px, {}px) scale({})",
                self.translation.x, self.translation.y, self.scale
            ),
            transform_origin: "center",
            transition: if self.is_dragging() {
                "none"
            } else {
                EASED_TRANSITION
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn drag_moves_relative_to_snapshot() {
        let mut vp = ViewportController::new();
        assert_eq!(
            vp.pointer_down(PointerButton::Primary, Point::new(10.0, 10.0)),
            EventDisposition::PreventDefault
        );
        vp.pointer_move(Point::new(30.0, 5.0));
        assert_eq!(vp.translation(), Point::new(20.0, -5.0));
        vp.pointer_up();
        vp.pointer_move(Point::new(100.0, 100.0));
        assert_eq!(vp.translation(), Point::new(20.0, -5.0));

        let _ = vp.pointer_down(PointerButton::Primary, Point::new(0.0, 0.0));
        vp.pointer_move(Point::new(1.0, 1.0));
        vp.pointer_leave();
        assert_eq!(vp.translation(), Point::new(21.0, -4.0));
        assert!(!vp.is_dragging());
    }

    #[test]
    fn non_primary_buttons_do_not_drag() {
        let mut vp = ViewportController::new();
        assert_eq!(
            vp.pointer_down(PointerButton::Secondary, Point::ORIGIN),
            EventDisposition::Ignored
        );
        vp.pointer_move(Point::new(50.0, 50.0));
        assert_eq!(vp.translation(), Point::ORIGIN);
    }

    #[test]
    fn wheel_and_buttons_step_and_clamp() {
        let mut vp = ViewportController::new();
        let _ = vp.wheel(-1.0);
        assert!((vp.scale() - 1.3).abs() < 1e-9);
        vp.zoom_out();
        assert!((vp.scale() - 1.1).abs() < 1e-9);
        for _ in 0..100 {
            vp.zoom_in();
        }
        assert_eq!(vp.scale(), MAX_SCALE);
        for _ in 0..100 {
            let _ = vp.wheel(3.0);
        }
        assert_eq!(vp.scale(), MIN_SCALE);
        assert_eq!(vp.zoom_percent(), 50);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut vp = ViewportController::new();
        vp.zoom_in();
        let _ = vp.pointer_down(PointerButton::Primary, Point::ORIGIN);
        vp.pointer_move(Point::new(5.0, 5.0));
        vp.pointer_up();
        vp.reset();
        assert_eq!(vp.scale(), DEFAULT_SCALE);
        assert_eq!(vp.translation(), Point::ORIGIN);
        assert_eq!(vp.zoom_percent(), 120);
    }

    #[test]
    fn transition_is_suppressed_while_dragging() {
        let mut vp = ViewportController::new();
        assert_eq!(vp.transform_style().transition, EASED_TRANSITION);
        assert_eq!(vp.transform_style().transform, "translate(0px, 0px) scale(1.2)");
        let _ = vp.pointer_down(PointerButton::Primary, Point::ORIGIN);
        assert_eq!(vp.transform_style().transition, "none");
        assert_eq!(vp.cursor(), "grabbing");
    }

    #[derive(Debug, Clone)]
    enum ZoomOp {
        Wheel(f64),
        In,
        Out,
        Reset,
    }

    fn zoom_op() -> impl Strategy<Value = ZoomOp> {
        prop_oneof![
            (-1.0e6f64..1.0e6).prop_map(ZoomOp::Wheel),
            Just(ZoomOp::In),
            Just(ZoomOp::Out),
            Just(ZoomOp::Reset),
        ]
    }

    proptest! {
        #[test]
        fn scale_never_leaves_bounds(ops in prop::collection::vec(zoom_op(), 0..300)) {
            let mut vp = ViewportController::new();
            for op in ops {
                match op {
                    ZoomOp::Wheel(d) => { let _ = vp.wheel(d); }
                    ZoomOp::In => vp.zoom_in(),
                    ZoomOp::Out => vp.zoom_out(),
                    ZoomOp::Reset => vp.reset(),
                }
                prop_assert!(vp.scale() >= MIN_SCALE && vp.scale() <= MAX_SCALE);
            }
        }
    }
}
