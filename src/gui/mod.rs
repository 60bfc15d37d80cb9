//! In-VR gaze menu: spherical buttons and the progress bar

pub mod button;
pub mod layout;
pub mod progress_bar;

pub use button::{ButtonAction, ButtonBehavior, GuiButton, ACTIVATION_DELAY};
pub use layout::{default_buttons, default_progress_bar};
pub use progress_bar::GuiProgressBar;
