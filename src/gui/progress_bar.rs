//! Video position indicator drawn as raw lines in normalized device coordinates

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct GuiProgressBar {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
    progress: f32,
    visible_until: Option<Instant>,
}

impl GuiProgressBar {
    pub fn new(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
            progress: 0.0,
            visible_until: None,
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Clamped to `[0, 1]`; NaN counts as zero
    pub fn set_progress(&mut self, progress: f32) {
        self.progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
    }

    /// Shows the bar for `duration` from `now`, extending any running display
    pub fn show(&mut self, now: Instant, duration: Duration) {
        self.visible_until = Some(now + duration);
    }

    pub fn hide(&mut self) {
        self.visible_until = None;
    }

    /// Drops visibility once the display time has run out; returns whether still visible
    pub fn update_visibility(&mut self, now: Instant) -> bool {
        match self.visible_until {
            Some(deadline) if now < deadline => true,
            Some(_) => {
                self.visible_until = None;
                false
            }
            None => false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible_until.is_some()
    }

    /// Line list: the outline rectangle followed by the filled fraction as
    /// vertical strokes. Every pair of vertices is one segment.
    pub fn line_vertices(&self) -> Vec<[f32; 3]> {
        let left = self.x_center - self.width / 2.0;
        let right = self.x_center + self.width / 2.0;
        let top = self.y_center + self.height / 2.0;
        let bottom = self.y_center - self.height / 2.0;
        let z = 0.5;

        let mut lines = vec![
            [left, top, z], [right, top, z],
            [right, top, z], [right, bottom, z],
            [right, bottom, z], [left, bottom, z],
            [left, bottom, z], [left, top, z],
        ];

        let filled = left + self.width * self.progress;
        let strokes = (self.progress * FILL_STROKES as f32).ceil() as usize;
        for i in 0..strokes {
            let x = if strokes == 1 {
                filled
            } else {
                left + (filled - left) * i as f32 / (strokes - 1) as f32
            };
            lines.push([x, top, z]);
            lines.push([x, bottom, z]);
        }

        lines
    }
}

/// Strokes drawn for a full bar
const FILL_STROKES: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped() {
        let mut bar = GuiProgressBar::new(0.0, -0.5, 1.0, 0.1);
        bar.set_progress(1.5);
        assert_eq!(bar.progress(), 1.0);
        bar.set_progress(-0.2);
        assert_eq!(bar.progress(), 0.0);
        bar.set_progress(f32::NAN);
        assert_eq!(bar.progress(), 0.0);
    }

    #[test]
    fn empty_bar_is_just_the_outline() {
        let bar = GuiProgressBar::new(0.0, 0.0, 1.0, 0.1);
        assert_eq!(bar.line_vertices().len(), 8);
    }

    #[test]
    fn filled_strokes_stop_at_progress() {
        let mut bar = GuiProgressBar::new(0.0, 0.0, 1.0, 0.1);
        bar.set_progress(0.5);
        let lines = bar.line_vertices();
        assert_eq!(lines.len() % 2, 0);
        let max_x = lines[8..].iter().map(|v| v[0]).fold(f32::MIN, f32::max);
        assert!((max_x - 0.0).abs() < 1e-6);
    }

    #[test]
    fn display_expires() {
        let start = Instant::now();
        let mut bar = GuiProgressBar::new(0.0, 0.0, 1.0, 0.1);
        assert!(!bar.update_visibility(start));

        bar.show(start, Duration::from_secs(3));
        assert!(bar.update_visibility(start + Duration::from_secs(2)));
        assert!(!bar.update_visibility(start + Duration::from_secs(3)));
        assert!(!bar.is_visible());
    }
}
