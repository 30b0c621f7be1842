pub(crate) mod events;

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::capture::{CaptureReceivers, PalettedFrame};

use super::model::{FrameOutcome, LootOutcome, IDLE_POLL_INTERVAL};
use super::RecorderShared;

use self::events::{emit_initial_loot_captured, emit_loot_captured, emit_weather_reminder};

/// Runs the capture loop on its own thread until a stop signal arrives or
/// the stop sender is dropped. Stop is checked first, then loot, then
/// frames, so a burst of frames never delays loot or shutdown.
pub(crate) fn spawn_capture_loop(
    shared: Arc<RecorderShared>,
    mut receivers: CaptureReceivers,
    mut stop_rx: mpsc::Receiver<()>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        tracing::debug!("Recorder capture loop started");

        loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            if let Ok(clipboard_text) = receivers.loot.try_recv() {
                handle_loot(&shared, clipboard_text);
                continue;
            }

            if let Ok(frame) = receivers.frames.try_recv() {
                handle_frame(&shared, frame);
                continue;
            }

            thread::sleep(IDLE_POLL_INTERVAL);
        }

        tracing::debug!("Recorder capture loop stopped");
    })
}

fn handle_loot(shared: &RecorderShared, clipboard_text: String) {
    let mut core = shared.lock_core();
    let loot_length = clipboard_text.len();

    match core.session.accept_loot(clipboard_text) {
        LootOutcome::Baseline => {
            tracing::info!(loot_length, "Initial cargo captured, recording running");
            emit_initial_loot_captured(shared.notifier.as_ref());
        }
        LootOutcome::Appended { frame } => {
            tracing::info!(frame, loot_length, "Loot record appended");
            emit_loot_captured(shared.notifier.as_ref());
        }
        LootOutcome::Discarded => {
            tracing::warn!(loot_length, "Not recording, loot capture dropped");
        }
    }
}

fn handle_frame(shared: &RecorderShared, frame: PalettedFrame) {
    let mut core = shared.lock_core();

    match core.session.accept_frame(frame) {
        FrameOutcome::Buffered { weather_reminder } => {
            if weather_reminder {
                tracing::info!("Weather strength still unset, reminding operator");
                emit_weather_reminder(shared.notifier.as_ref());
            }
        }
        FrameOutcome::Discarded => {
            tracing::trace!("Recorder not running, frame discarded");
        }
    }
}
