//! Control commands from the Java side, queued until the render thread runs
//!
//! JNI exports can be invoked from any Java thread. They push a
//! [`HostCommand`] onto the global queue, and the host drains it at the start
//! of every frame so the renderer is only ever touched from one thread.

use std::sync::Mutex;

use lazy_static::lazy_static;
use log::warn;

use crate::gpu::RenderBackend;
use crate::renderer::Renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Raw layout, mode and output codes as sent by the settings menu
    SetOptions { layout: i32, mode: i32, output: i32 },
    SetVideoSize { width: u32, height: u32 },
    ScanCalibration,
    ShowProgressBar,
}

impl HostCommand {
    pub fn apply<B: RenderBackend>(self, renderer: &mut Renderer<B>) {
        match self {
            HostCommand::SetOptions { layout, mode, output } => {
                if let Err(e) = renderer.set_options_raw(layout, mode, output) {
                    warn!("HostCommand: ignoring options: {}", e);
                }
            }
            HostCommand::SetVideoSize { width, height } => renderer.set_video_size(width, height),
            HostCommand::ScanCalibration => renderer.scan_cardboard_calibration(),
            HostCommand::ShowProgressBar => renderer.show_progress_bar(),
        }
    }
}

lazy_static! {
    static ref COMMANDS: Mutex<Vec<HostCommand>> = Mutex::new(Vec::new());
}

pub fn push_command(command: HostCommand) {
    match COMMANDS.lock() {
        Ok(mut queue) => queue.push(command),
        Err(poisoned) => poisoned.into_inner().push(command),
    }
}

/// Takes every queued command, oldest first
pub fn drain_commands() -> Vec<HostCommand> {
    match COMMANDS.lock() {
        Ok(mut queue) => std::mem::take(&mut *queue),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

/// Settings that outlive a renderer. The host recreates the renderer with
/// each surface and replays these onto it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StickySettings {
    options: Option<HostCommand>,
    video_size: Option<HostCommand>,
}

impl StickySettings {
    pub fn remember(&mut self, command: HostCommand) {
        match command {
            HostCommand::SetOptions { .. } => self.options = Some(command),
            HostCommand::SetVideoSize { .. } => self.video_size = Some(command),
            HostCommand::ScanCalibration | HostCommand::ShowProgressBar => {}
        }
    }

    /// Commands restoring the remembered state, in application order
    pub fn replay(&self) -> impl Iterator<Item = HostCommand> + '_ {
        self.options.iter().chain(self.video_size.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drains_in_order_and_empties() {
        // The queue is global; this is the only test touching it
        drain_commands();
        push_command(HostCommand::ShowProgressBar);
        push_command(HostCommand::SetVideoSize { width: 1920, height: 1080 });

        assert_eq!(
            drain_commands(),
            vec![HostCommand::ShowProgressBar, HostCommand::SetVideoSize { width: 1920, height: 1080 }]
        );
        assert!(drain_commands().is_empty());
    }

    #[test]
    fn sticky_settings_keep_latest_state_only() {
        let mut sticky = StickySettings::default();
        sticky.remember(HostCommand::SetVideoSize { width: 640, height: 480 });
        sticky.remember(HostCommand::SetOptions { layout: 0, mode: 0, output: 0 });
        sticky.remember(HostCommand::SetOptions { layout: 1, mode: 2, output: 3 });
        sticky.remember(HostCommand::ShowProgressBar);

        let replayed: Vec<_> = sticky.replay().collect();
        assert_eq!(
            replayed,
            vec![
                HostCommand::SetOptions { layout: 1, mode: 2, output: 3 },
                HostCommand::SetVideoSize { width: 640, height: 480 },
            ]
        );
    }
}
