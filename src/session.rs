//! Edit session: the active buffer, selected color, and undo/redo history.
//!
//! A session is either `Empty` (no image) or `Loaded`; the state is implicit
//! in the stacks — the undo stack is non-empty exactly while an image is
//! loaded and always keeps the "Initial" snapshot at its bottom. All mutating
//! operations go through `&mut self`, which is the serialization point the
//! concurrency contract requires: an embedding app may run long operations on
//! a worker thread, but must commit or discard one result before starting the
//! next.

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{self, ClassifierSettings};
use crate::error::{Error, Result};
use crate::ops::brush::{self, BrushSettings};
use crate::ops::fill;
use crate::ops::lineart::{self, LineArtSettings};
use crate::ops::segment::{self, SegmentSettings};

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// The operation a snapshot was taken for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Initial,
    Fill,
    BrushStroke,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Initial => "Initial",
            Action::Fill => "Fill",
            Action::BrushStroke => "Brush Stroke",
        }
    }
}

/// Immutable copy of the pixel buffer plus the action that produced it and
/// when it was captured. Owned by the session's history, never mutated.
#[derive(Clone)]
pub struct Snapshot {
    action: Action,
    pixels: RgbaImage,
    created_at: DateTime<Utc>,
}

impl Snapshot {
    fn capture(action: Action, pixels: &RgbaImage) -> Self {
        Self {
            action,
            pixels: pixels.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Numeric knobs for the session's interactive operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSettings {
    pub fill_tolerance: u8,
    pub brush: BrushSettings,
    pub line_art: LineArtSettings,
    pub segmentation: SegmentSettings,
    pub classifier: ClassifierSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSettings {
    pub fn new() -> Self {
        Self {
            fill_tolerance: 30,
            brush: BrushSettings::default(),
            line_art: LineArtSettings::default(),
            segmentation: SegmentSettings::default(),
            classifier: ClassifierSettings::default(),
        }
    }
}

/// How `load_image` prepares a source buffer before it becomes editable.
#[derive(Clone, Debug)]
pub enum Preparation {
    /// Classify, then pick: already line art → as-is; near-grayscale →
    /// line-art conversion; colorful photo → color segmentation.
    Auto,
    /// Force the line-art pipeline with explicit parameters (the adjustment
    /// screen's live-preview commit).
    LineArt(LineArtSettings),
    /// Force color segmentation.
    Segment(SegmentSettings),
    /// Use the decoded buffer untouched.
    AsIs,
}

// ============================================================================
// EDIT SESSION
// ============================================================================

pub struct EditSession {
    buffer: Option<RgbaImage>,
    selected_color: Rgba<u8>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    session_id: Uuid,
    settings: SessionSettings,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(SessionSettings::new())
    }
}

impl EditSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            buffer: None,
            selected_color: Rgba([255, 0, 0, 255]),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            session_id: Uuid::new_v4(),
            settings,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Load a decoded source image, preparing it per `preparation`. Clears
    /// the history, pushes the "Initial" snapshot, and starts a fresh
    /// session id. Zero-sized buffers are rejected.
    pub fn load_image(&mut self, source: RgbaImage, preparation: &Preparation) -> Result<()> {
        let (w, h) = source.dimensions();
        if w == 0 || h == 0 {
            return Err(Error::EmptyBuffer {
                width: w,
                height: h,
            });
        }

        let prepared = match preparation {
            Preparation::AsIs => source,
            Preparation::LineArt(settings) => {
                lineart::to_line_art(&source, settings, &self.settings.classifier)?
            }
            Preparation::Segment(settings) => {
                segment::segment_by_color(&source, settings, &self.settings.classifier)?
            }
            Preparation::Auto => self.prepare_auto(source)?,
        };

        self.undo_stack.clear();
        self.redo_stack.clear();
        self.undo_stack
            .push(Snapshot::capture(Action::Initial, &prepared));
        self.buffer = Some(prepared);
        self.session_id = Uuid::new_v4();
        log::info!("loaded image {}x{}, session {}", w, h, self.session_id);
        Ok(())
    }

    fn prepare_auto(&self, source: RgbaImage) -> Result<RgbaImage> {
        let line_art = classify::probe_line_art(&source, &self.settings.classifier);
        if line_art.matched {
            log::debug!(
                "source already a coloring page ({} colors)",
                line_art.statistic
            );
            return Ok(source);
        }
        let grayscale = classify::probe_grayscale(&source, &self.settings.classifier);
        if grayscale.matched {
            return lineart::to_line_art(&source, &self.settings.line_art, &self.settings.classifier);
        }
        segment::segment_by_color(
            &source,
            &self.settings.segmentation,
            &self.settings.classifier,
        )
    }

    /// Drop the buffer and both stacks; the session becomes `Empty`.
    pub fn clear_image(&mut self) {
        self.buffer = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Flood fill with the selected color at `(x, y)`. Coordinates are
    /// clamped to the buffer here, at the caller boundary; no-op when no
    /// image is loaded.
    pub fn fill(&mut self, x: u32, y: u32) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        let cx = x.min(buffer.width() - 1);
        let cy = y.min(buffer.height() - 1);

        self.push_snapshot(Action::Fill);
        if let Some(buffer) = self.buffer.as_mut() {
            fill::flood_fill(buffer, cx, cy, self.selected_color, self.settings.fill_tolerance);
        }
    }

    /// Begin a brush stroke: snapshot once and clear the redo stack. Called
    /// once per stroke, not per point, so a drag doesn't flood the history.
    pub fn start_brush_stroke(&mut self) {
        if self.buffer.is_some() {
            self.push_snapshot(Action::BrushStroke);
        }
    }

    /// Stamp the brush at `(x, y)`, continuing the stroke started by
    /// `start_brush_stroke`. Mutates the buffer without snapshotting.
    pub fn brush_draw(&mut self, x: f32, y: f32) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        brush::stamp(buffer, x, y, self.selected_color, &self.settings.brush);
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Restore the buffer that existed immediately before the last mutating
    /// operation. No-op while only the initial snapshot remains.
    pub fn undo(&mut self) {
        if self.undo_stack.len() <= 1 {
            return;
        }
        let Some(popped) = self.undo_stack.pop() else {
            return;
        };
        if let Some(current) = self.buffer.take() {
            self.redo_stack
                .push(Snapshot::capture(popped.action, &current));
        }
        self.buffer = Some(popped.pixels);
    }

    /// Restore the buffer that existed immediately after the last undone
    /// operation. No-op when nothing has been undone.
    pub fn redo(&mut self) {
        let Some(popped) = self.redo_stack.pop() else {
            return;
        };
        if let Some(current) = self.buffer.take() {
            self.undo_stack
                .push(Snapshot::capture(popped.action, &current));
        }
        self.buffer = Some(popped.pixels);
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo history, oldest first ("Initial" at index 0).
    pub fn history(&self) -> &[Snapshot] {
        &self.undo_stack
    }

    fn push_snapshot(&mut self, action: Action) {
        if let Some(buffer) = self.buffer.as_ref() {
            self.undo_stack.push(Snapshot::capture(action, buffer));
            self.redo_stack.clear();
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Read-only view of the active buffer for display or export. Callers
    /// never receive a live mutable alias.
    pub fn buffer(&self) -> Option<&RgbaImage> {
        self.buffer.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Identity of the current image session; changes on every successful
    /// `load_image`.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn selected_color(&self) -> Rgba<u8> {
        self.selected_color
    }

    pub fn set_selected_color(&mut self, color: Rgba<u8>) {
        self.selected_color = color;
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);

    /// 4×4 white page with a black border pixel pattern: enough structure to
    /// fill against, loaded as-is so tests control the exact pixels.
    fn page() -> RgbaImage {
        let mut buffer = RgbaImage::from_pixel(4, 4, WHITE);
        for y in 2..4 {
            for x in 2..4 {
                buffer.put_pixel(x, y, BLACK);
            }
        }
        buffer
    }

    fn loaded_session() -> EditSession {
        let mut session = EditSession::default();
        session.settings_mut().fill_tolerance = 0;
        session.load_image(page(), &Preparation::AsIs).unwrap();
        session
    }

    #[test]
    fn test_empty_session_operations_are_noops() {
        let mut session = EditSession::default();
        assert!(!session.is_loaded());
        session.fill(0, 0);
        session.brush_draw(1.0, 1.0);
        session.start_brush_stroke();
        session.undo();
        session.redo();
        assert!(session.buffer().is_none());
        assert!(!session.can_undo());
        assert!(!session.can_redo());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_load_pushes_initial_snapshot() {
        let session = loaded_session();
        assert!(session.is_loaded());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].action(), Action::Initial);
        assert!(!session.can_undo());
        assert!(!session.can_redo());
    }

    #[test]
    fn test_load_rejects_empty_buffer() {
        let mut session = EditSession::default();
        let result = session.load_image(RgbaImage::new(0, 5), &Preparation::AsIs);
        assert!(matches!(result, Err(Error::EmptyBuffer { .. })));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_load_changes_session_id() {
        let mut session = EditSession::default();
        session.load_image(page(), &Preparation::AsIs).unwrap();
        let first = session.session_id();
        session.load_image(page(), &Preparation::AsIs).unwrap();
        assert_ne!(first, session.session_id());
    }

    #[test]
    fn test_fill_then_undo_restores_previous_buffer() {
        let mut session = loaded_session();
        let before = session.buffer().unwrap().clone();
        session.fill(0, 0);
        assert_ne!(*session.buffer().unwrap(), before);
        assert_eq!(*session.buffer().unwrap().get_pixel(0, 0), RED);
        assert!(session.can_undo());

        session.undo();
        assert_eq!(*session.buffer().unwrap(), before);
        assert!(!session.can_undo());
        assert!(session.can_redo());
    }

    #[test]
    fn test_undo_redo_inverse_law() {
        let mut session = loaded_session();
        session.fill(0, 0);
        let after_fill = session.buffer().unwrap().clone();

        session.undo();
        session.redo();
        assert_eq!(*session.buffer().unwrap(), after_fill);
        assert!(session.can_undo());
        assert!(!session.can_redo());
    }

    #[test]
    fn test_two_fills_two_undos_restore_initial() {
        let mut session = loaded_session();
        let initial = session.buffer().unwrap().clone();

        session.fill(0, 0); // white region → red
        session.set_selected_color(GREEN);
        session.fill(3, 3); // black square → green
        assert_ne!(*session.buffer().unwrap(), initial);

        session.undo();
        session.undo();
        assert_eq!(*session.buffer().unwrap(), initial);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_new_action_clears_redo() {
        let mut session = loaded_session();
        session.fill(0, 0);
        session.undo();
        assert!(session.can_redo());

        session.set_selected_color(GREEN);
        session.fill(3, 3);
        assert!(!session.can_redo());
    }

    #[test]
    fn test_brush_stroke_snapshots_once() {
        let mut session = loaded_session();
        let before = session.buffer().unwrap().clone();

        session.start_brush_stroke();
        session.brush_draw(1.0, 1.0);
        session.brush_draw(2.0, 1.0);
        session.brush_draw(3.0, 1.0);

        // One stroke, one history entry past the initial snapshot.
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].action(), Action::BrushStroke);
        assert_ne!(*session.buffer().unwrap(), before);

        session.undo();
        assert_eq!(*session.buffer().unwrap(), before);
    }

    #[test]
    fn test_fill_coordinates_clamped() {
        let mut session = loaded_session();
        // Way out of range: clamps to (3, 3), filling the black square.
        session.fill(100, 100);
        assert_eq!(*session.buffer().unwrap().get_pixel(3, 3), RED);
        assert_eq!(*session.buffer().unwrap().get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_clear_image_empties_session() {
        let mut session = loaded_session();
        session.fill(0, 0);
        session.clear_image();
        assert!(!session.is_loaded());
        assert!(session.history().is_empty());
        assert!(!session.can_undo());
        assert!(!session.can_redo());
    }

    #[test]
    fn test_undo_restores_before_each_operation() {
        // Interleaved fill and brush; every undo steps back exactly one
        // operation, bit for bit.
        let mut session = loaded_session();
        let mut states = vec![session.buffer().unwrap().clone()];

        session.fill(0, 0);
        states.push(session.buffer().unwrap().clone());

        session.set_selected_color(GREEN);
        session.start_brush_stroke();
        session.brush_draw(1.0, 1.0);
        states.push(session.buffer().unwrap().clone());

        session.set_selected_color(Rgba([0, 0, 255, 255]));
        session.fill(3, 3);
        states.push(session.buffer().unwrap().clone());

        for expected in states.iter().rev().skip(1) {
            session.undo();
            assert_eq!(session.buffer().unwrap(), expected);
        }
        assert!(!session.can_undo());

        for expected in states.iter().skip(1) {
            session.redo();
            assert_eq!(session.buffer().unwrap(), expected);
        }
        assert!(!session.can_redo());
    }

    #[test]
    fn test_auto_preparation_keeps_line_art() {
        let mut session = EditSession::default();
        let source = page();
        session.load_image(source.clone(), &Preparation::Auto).unwrap();
        // Two distinct colors: classified as line art, loaded untouched.
        assert_eq!(*session.buffer().unwrap(), source);
    }
}
