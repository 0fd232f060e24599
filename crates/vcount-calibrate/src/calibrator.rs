//! Two-click counting-line calibration.
//!
//! ```text
//! NoImage -> NotDrawing -> Drawing { start } -> Defined { line }
//!                 ^                                  |
//!                 +------------- clear --------------+
//! ```
//!
//! Loading a fresh frame resets to `NotDrawing` from any state. A click
//! while `Defined` starts a new line from that point.

use tracing::{debug, info};

use vcount_models::{CountingLine, PixelPoint};

use crate::error::{CalibrationError, CalibrationResult};
use crate::frame::ReferenceFrame;
use crate::geometry::{DisplayPoint, DisplaySize, ScaleMapping};
use crate::surface::{Stroke, Surface};

const LINE_LABEL: &str = "counting line";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationState {
    NoImage,
    NotDrawing,
    Drawing { start: PixelPoint },
    Defined { line: CountingLine },
}

/// Lets an operator place a counting line on a reference frame.
///
/// All stored coordinates are native frame pixels; display positions are
/// mapped through the current [`ScaleMapping`] before they are kept.
pub struct LineCalibrator<S: Surface> {
    surface: S,
    frame: Option<ReferenceFrame>,
    mapping: Option<ScaleMapping>,
    state: CalibrationState,
}

impl<S: Surface> LineCalibrator<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            frame: None,
            mapping: None,
            state: CalibrationState::NoImage,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn frame(&self) -> Option<&ReferenceFrame> {
        self.frame.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// The defined line, if the second point has been placed.
    pub fn line(&self) -> Option<CountingLine> {
        match self.state {
            CalibrationState::Defined { line } => Some(line),
            _ => None,
        }
    }

    /// Load a reference frame, displayed at its natural size until
    /// [`set_display_size`](Self::set_display_size) says otherwise.
    pub fn load_image(&mut self, frame: ReferenceFrame) -> CalibrationResult<()> {
        let (width, height) = frame.dimensions();
        self.mapping = Some(ScaleMapping::new(width, height, DisplaySize::native(width, height))?);
        self.surface.draw_frame(&frame);
        self.frame = Some(frame);
        self.state = CalibrationState::NotDrawing;

        info!(width, height, "Loaded calibration frame");
        Ok(())
    }

    /// Update the on-screen size of the frame. Stored points are unaffected.
    pub fn set_display_size(&mut self, display: DisplaySize) -> CalibrationResult<()> {
        let frame = self.frame.as_ref().ok_or(CalibrationError::NoImage)?;
        let (width, height) = frame.dimensions();
        self.mapping = Some(ScaleMapping::new(width, height, display)?);
        Ok(())
    }

    /// Handle a pointer click at a display position.
    pub fn click(&mut self, at: DisplayPoint) -> CalibrationResult<CalibrationState> {
        let point = self.map(at)?;

        self.state = match self.state {
            CalibrationState::NoImage => return Err(CalibrationError::NoImage),
            CalibrationState::NotDrawing | CalibrationState::Defined { .. } => {
                debug!(x = point.x, y = point.y, "Counting line started");
                CalibrationState::Drawing { start: point }
            }
            CalibrationState::Drawing { start } => {
                let line = CountingLine::from_points(start, point);
                info!(
                    x1 = line.x1,
                    y1 = line.y1,
                    x2 = line.x2,
                    y2 = line.y2,
                    "Counting line defined"
                );
                CalibrationState::Defined { line }
            }
        };

        self.render(None);
        Ok(self.state)
    }

    /// Redraw the dashed preview towards the cursor while drawing.
    ///
    /// Never changes state. Positions outside the frame are ignored.
    pub fn pointer_move(&mut self, at: DisplayPoint) -> CalibrationResult<()> {
        if self.frame.is_none() {
            return Err(CalibrationError::NoImage);
        }
        if !matches!(self.state, CalibrationState::Drawing { .. }) {
            return Ok(());
        }

        if let Ok(cursor) = self.map(at) {
            self.render(Some(cursor));
        }
        Ok(())
    }

    /// Discard any pending or defined line and redraw the bare frame.
    pub fn clear(&mut self) {
        if self.state == CalibrationState::NoImage {
            return;
        }
        self.state = CalibrationState::NotDrawing;
        self.render(None);
        debug!("Counting line cleared");
    }

    /// Accept the defined line for submission.
    ///
    /// Zero-length lines are rejected here rather than while drawing.
    pub fn confirm(&self) -> CalibrationResult<CountingLine> {
        let line = self.line().ok_or(CalibrationError::NotDefined)?;
        let frame = self.frame.as_ref().ok_or(CalibrationError::NoImage)?;
        line.validate_within(frame.width(), frame.height())?;
        Ok(line)
    }

    fn map(&self, at: DisplayPoint) -> CalibrationResult<PixelPoint> {
        self.mapping.ok_or(CalibrationError::NoImage)?.to_native(at)
    }

    fn render(&mut self, cursor: Option<PixelPoint>) {
        let Some(frame) = &self.frame else {
            return;
        };
        self.surface.draw_frame(frame);

        match self.state {
            CalibrationState::NoImage | CalibrationState::NotDrawing => {}
            CalibrationState::Drawing { start } => {
                self.surface.draw_marker(start);
                if let Some(cursor) = cursor {
                    self.surface.draw_segment(start, cursor, Stroke::Dashed);
                }
            }
            CalibrationState::Defined { line } => {
                self.surface.draw_segment(line.start(), line.end(), Stroke::Solid);
                self.surface.draw_label(LINE_LABEL, line.midpoint());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use vcount_models::ValidationError;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Frame,
        Segment(PixelPoint, PixelPoint, Stroke),
        Marker(PixelPoint),
        Label(String),
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
    }

    impl Surface for RecordingSurface {
        fn draw_frame(&mut self, _frame: &ReferenceFrame) {
            self.ops.push(Op::Frame);
        }

        fn draw_segment(&mut self, from: PixelPoint, to: PixelPoint, stroke: Stroke) {
            self.ops.push(Op::Segment(from, to, stroke));
        }

        fn draw_marker(&mut self, at: PixelPoint) {
            self.ops.push(Op::Marker(at));
        }

        fn draw_label(&mut self, text: &str, _at: PixelPoint) {
            self.ops.push(Op::Label(text.to_string()));
        }
    }

    fn frame(width: u32, height: u32) -> ReferenceFrame {
        ReferenceFrame::from_image(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])))
    }

    fn loaded(width: u32, height: u32) -> LineCalibrator<RecordingSurface> {
        let mut calibrator = LineCalibrator::new(RecordingSurface::default());
        calibrator.load_image(frame(width, height)).unwrap();
        calibrator
    }

    #[test]
    fn test_two_clicks_define_line_in_native_pixels() {
        let mut calibrator = loaded(400, 300);

        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();
        let state = calibrator.click(DisplayPoint::new(200.0, 150.0)).unwrap();

        let expected = CountingLine::new(10.0, 10.0, 200.0, 150.0);
        assert_eq!(state, CalibrationState::Defined { line: expected });
        assert_eq!(calibrator.confirm().unwrap(), expected);
    }

    #[test]
    fn test_scaled_display_clicks() {
        let mut calibrator = loaded(400, 300);
        calibrator
            .set_display_size(DisplaySize::new(800.0, 600.0))
            .unwrap();

        calibrator.click(DisplayPoint::new(20.0, 20.0)).unwrap();
        calibrator.click(DisplayPoint::new(400.0, 300.0)).unwrap();

        assert_eq!(
            calibrator.line(),
            Some(CountingLine::new(10.0, 10.0, 200.0, 150.0))
        );
    }

    #[test]
    fn test_clear_returns_to_not_drawing() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();
        calibrator.click(DisplayPoint::new(200.0, 150.0)).unwrap();

        calibrator.clear();
        assert_eq!(calibrator.state(), CalibrationState::NotDrawing);
        assert_eq!(calibrator.line(), None);
        assert!(matches!(calibrator.confirm(), Err(CalibrationError::NotDefined)));
        assert_eq!(calibrator.surface().ops.last(), Some(&Op::Frame));
    }

    #[test]
    fn test_single_click_stays_drawing() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(50.0, 60.0)).unwrap();

        assert_eq!(
            calibrator.state(),
            CalibrationState::Drawing {
                start: PixelPoint::new(50.0, 60.0)
            }
        );
        assert_eq!(calibrator.line(), None);
    }

    #[test]
    fn test_pointer_move_only_renders() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(50.0, 60.0)).unwrap();
        let before = calibrator.state();

        calibrator.pointer_move(DisplayPoint::new(120.0, 90.0)).unwrap();

        assert_eq!(calibrator.state(), before);
        assert_eq!(
            calibrator.surface().ops.last(),
            Some(&Op::Segment(
                PixelPoint::new(50.0, 60.0),
                PixelPoint::new(120.0, 90.0),
                Stroke::Dashed
            ))
        );
    }

    #[test]
    fn test_pointer_move_ignored_when_not_drawing() {
        let mut calibrator = loaded(400, 300);
        let ops_before = calibrator.surface().ops.len();

        calibrator.pointer_move(DisplayPoint::new(120.0, 90.0)).unwrap();
        assert_eq!(calibrator.surface().ops.len(), ops_before);
    }

    #[test]
    fn test_defined_line_rendered_solid_with_label() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();
        calibrator.click(DisplayPoint::new(200.0, 150.0)).unwrap();

        let ops = &calibrator.surface().ops;
        assert!(ops.contains(&Op::Segment(
            PixelPoint::new(10.0, 10.0),
            PixelPoint::new(200.0, 150.0),
            Stroke::Solid
        )));
        assert_eq!(ops.last(), Some(&Op::Label(LINE_LABEL.to_string())));
    }

    #[test]
    fn test_click_without_image() {
        let mut calibrator = LineCalibrator::new(RecordingSurface::default());
        assert!(matches!(
            calibrator.click(DisplayPoint::new(1.0, 1.0)),
            Err(CalibrationError::NoImage)
        ));
        assert_eq!(calibrator.state(), CalibrationState::NoImage);
    }

    #[test]
    fn test_click_outside_frame_keeps_state() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();

        assert!(matches!(
            calibrator.click(DisplayPoint::new(450.0, 10.0)),
            Err(CalibrationError::OutOfBounds { .. })
        ));
        assert!(matches!(calibrator.state(), CalibrationState::Drawing { .. }));
    }

    #[test]
    fn test_zero_length_line_rejected_at_confirm() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(30.0, 30.0)).unwrap();
        calibrator.click(DisplayPoint::new(30.0, 30.0)).unwrap();

        assert!(calibrator.line().is_some());
        assert!(matches!(
            calibrator.confirm(),
            Err(CalibrationError::Invalid(ValidationError::ZeroLengthLine))
        ));
    }

    #[test]
    fn test_click_while_defined_starts_new_line() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();
        calibrator.click(DisplayPoint::new(200.0, 150.0)).unwrap();

        let state = calibrator.click(DisplayPoint::new(5.0, 5.0)).unwrap();
        assert_eq!(
            state,
            CalibrationState::Drawing {
                start: PixelPoint::new(5.0, 5.0)
            }
        );
    }

    #[test]
    fn test_fresh_load_resets_drawing() {
        let mut calibrator = loaded(400, 300);
        calibrator.click(DisplayPoint::new(10.0, 10.0)).unwrap();

        calibrator.load_image(frame(640, 480)).unwrap();
        assert_eq!(calibrator.state(), CalibrationState::NotDrawing);
        assert_eq!(calibrator.frame().map(|f| f.dimensions()), Some((640, 480)));
    }
}
