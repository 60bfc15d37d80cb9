//! Declarative placement of the gaze menu
//!
//! Buttons sit on a grid around theta = PI (straight ahead of the menu) just
//! below the horizon. Column and row offsets count grid cells.

use std::f32::consts::PI;

use super::button::{ButtonAction, ButtonBehavior, GuiButton};
use super::progress_bar::GuiProgressBar;
use crate::config::Z_FAR;

pub const BUTTON_GRID: f32 = PI * 8.0 / 180.0;
pub const BUTTON_SIZE: f32 = PI * 7.0 / 180.0;
pub const BUTTON_PHI_0: f32 = -0.5 * BUTTON_GRID;
pub const GUI_DISTANCE: f32 = Z_FAR * 0.99;

struct ButtonSlot {
    column: f32,
    row: f32,
    texture: (u32, u32),
    action: ButtonAction,
    behavior: ButtonBehavior,
    visible: bool,
}

const fn slot(
    column: f32,
    row: f32,
    texture: (u32, u32),
    action: ButtonAction,
    behavior: ButtonBehavior,
    visible: bool,
) -> ButtonSlot {
    ButtonSlot { column, row, texture, action, behavior, visible }
}

use super::button::ButtonAction as A;
use super::button::ButtonBehavior::{AutoRepeat, DelayedTrigger};

#[rustfmt::skip]
const LAYOUT: [ButtonSlot; 10] = [
    slot(-1.0, -1.0, (0, 0),     A::Recenter2d,  DelayedTrigger, true),
    slot( 0.0,  0.0, (256, 0),   A::RecenterYaw, DelayedTrigger, true),
    slot(-2.0,  0.0, (512, 0),   A::VolumeDown,  AutoRepeat,     true),
    slot(-1.0,  0.0, (768, 0),   A::VolumeUp,    AutoRepeat,     true),
    slot(-2.0, -1.0, (0, 256),   A::OpenFile,    DelayedTrigger, true),
    // Play and Pause share a slot; dispatch swaps which one is shown
    slot( 1.0,  0.0, (256, 256), A::Play,        DelayedTrigger, false),
    slot( 1.0, -1.0, (512, 256), A::Back,        AutoRepeat,     true),
    slot( 2.0, -1.0, (768, 256), A::Forward,     AutoRepeat,     true),
    slot( 2.0,  0.0, (0, 512),   A::Rewind,      DelayedTrigger, true),
    slot( 1.0,  0.0, (256, 512), A::Pause,       DelayedTrigger, true),
];

/// Builds the menu from the layout table
pub fn default_buttons() -> Vec<GuiButton> {
    LAYOUT
        .iter()
        .map(|s| {
            GuiButton::new(
                PI + s.column * BUTTON_GRID,
                BUTTON_PHI_0 + s.row * BUTTON_GRID,
                GUI_DISTANCE,
                BUTTON_SIZE,
                s.texture.0,
                s.texture.1,
                s.action,
                s.behavior,
                s.visible,
            )
        })
        .collect()
}

/// Progress bar along the lower part of each eye's viewport
pub fn default_progress_bar() -> GuiProgressBar {
    GuiProgressBar::new(0.0, -0.6, 1.2, 0.08)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_buttons_do_not_overlap() {
        let buttons = default_buttons();
        let visible: Vec<_> = buttons.iter().filter(|b| b.is_visible()).collect();
        for (i, a) in visible.iter().enumerate() {
            for b in &visible[i + 1..] {
                assert_ne!(a.vertex_positions(), b.vertex_positions(), "{:?} overlaps {:?}", a.action(), b.action());
            }
        }
    }

    #[test]
    fn play_starts_hidden_in_pause_slot() {
        let buttons = default_buttons();
        let play = buttons.iter().find(|b| b.action() == ButtonAction::Play).unwrap();
        let pause = buttons.iter().find(|b| b.action() == ButtonAction::Pause).unwrap();
        assert!(!play.is_visible());
        assert!(pause.is_visible());
        assert_eq!(play.vertex_positions(), pause.vertex_positions());
    }

    #[test]
    fn recenter_button_is_straight_ahead() {
        let buttons = default_buttons();
        let recenter = buttons.iter().find(|b| b.action() == ButtonAction::RecenterYaw).unwrap();
        assert!(recenter.contains(PI, BUTTON_PHI_0));
    }
}
