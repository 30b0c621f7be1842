mod artifact;
pub(crate) mod model;
pub(crate) mod session;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::{Local, Utc};
use tokio::sync::mpsc;

use crate::capture::{
    capture_channels, FrameSender, LootSender, FRAME_QUEUE_CAPACITY, LOOT_QUEUE_CAPACITY,
};
use crate::combat_log::CombatLogReader;
use crate::encoding::EncodingError;
use crate::fittings::FittingLookup;
use crate::settings::RecorderSettings;

pub use model::{RecorderState, RecorderStatus, StopOutcome, WeatherStrength};
pub use session::events::{
    notification_channel, ChannelNotificationSink, LogNotificationSink, Notification,
    NotificationSink,
};

use self::model::Session;
use self::session::events::{
    emit_nothing_captured, emit_recording_encoded, emit_recording_failed, emit_session_starting,
    emit_weather_strength_set,
};

#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("Recording already in progress")]
    AlreadyRecording,
    #[error("No active recording to stop")]
    NotRecording,
    #[error("No characters selected for recording")]
    NoCharactersSelected,
    #[error("{selected} characters selected, at most {max} can be tracked")]
    TooManyCharacters { selected: usize, max: usize },
    #[error("Failed to create output directory '{}': {source}", .path.display())]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode recording: {0}")]
    Encode(#[from] EncodingError),
    #[error("Failed to write recording '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub(crate) struct RecorderCore {
    pub(crate) session: Session,
    pub(crate) reader: CombatLogReader,
    pub(crate) settings: RecorderSettings,
}

/// State shared between the public handle and the capture loop. Every
/// session mutation happens under the single `core` lock.
pub(crate) struct RecorderShared {
    core: Mutex<RecorderCore>,
    pub(crate) notifier: Arc<dyn NotificationSink>,
    fittings: Arc<dyn FittingLookup>,
}

impl RecorderShared {
    pub(crate) fn lock_core(&self) -> MutexGuard<'_, RecorderCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Records one abyss run at a time from the frame and loot queues it owns.
pub struct Recorder {
    shared: Arc<RecorderShared>,
    frame_sender: FrameSender,
    loot_sender: LootSender,
    stop_tx: Option<mpsc::Sender<()>>,
    loop_handle: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(
        settings: RecorderSettings,
        notifier: Arc<dyn NotificationSink>,
        fittings: Arc<dyn FittingLookup>,
    ) -> Self {
        Self::with_queue_capacity(
            settings,
            notifier,
            fittings,
            FRAME_QUEUE_CAPACITY,
            LOOT_QUEUE_CAPACITY,
        )
    }

    pub fn with_queue_capacity(
        settings: RecorderSettings,
        notifier: Arc<dyn NotificationSink>,
        fittings: Arc<dyn FittingLookup>,
        frame_capacity: usize,
        loot_capacity: usize,
    ) -> Self {
        let reader = CombatLogReader::new(&settings.game_logs_folder);
        let shared = Arc::new(RecorderShared {
            core: Mutex::new(RecorderCore {
                session: Session::new(),
                reader,
                settings,
            }),
            notifier,
            fittings,
        });

        let (frame_sender, loot_sender, receivers) =
            capture_channels(frame_capacity, loot_capacity);
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let loop_handle = session::spawn_capture_loop(Arc::clone(&shared), receivers, stop_rx);

        Self {
            shared,
            frame_sender,
            loot_sender,
            stop_tx: Some(stop_tx),
            loop_handle: Some(loop_handle),
        }
    }

    /// Producer handle for the screen-capture ticker.
    pub fn frame_sender(&self) -> FrameSender {
        self.frame_sender.clone()
    }

    /// Producer handle for the clipboard-change listener.
    pub fn loot_sender(&self) -> LootSender {
        self.loot_sender.clone()
    }

    /// Clipboard-change callback: queues the new clipboard text as loot.
    pub fn clipboard_listener(&self, clipboard_text: impl Into<String>) -> bool {
        self.loot_sender.submit(clipboard_text)
    }

    /// Applies new settings. Folders and constants take effect at the next
    /// `start`.
    pub fn update_settings(&self, settings: RecorderSettings) {
        let mut core = self.shared.lock_core();
        core.reader.set_log_directory(&settings.game_logs_folder);
        core.settings = settings;
    }

    pub fn start(&self, selected_characters: &[String]) -> Result<RecorderStatus, RecorderError> {
        let mut guard = self.shared.lock_core();
        let core = &mut *guard;

        if core.session.state() != RecorderState::Stopped {
            return Err(RecorderError::AlreadyRecording);
        }

        let selected: BTreeSet<&str> = selected_characters
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if selected.is_empty() {
            return Err(RecorderError::NoCharactersSelected);
        }
        if selected.len() > core.settings.max_tracked_characters {
            return Err(RecorderError::TooManyCharacters {
                selected: selected.len(),
                max: core.settings.max_tracked_characters,
            });
        }

        let recordings_folder = core.settings.recordings_folder.clone();
        std::fs::create_dir_all(&recordings_folder).map_err(|error| {
            tracing::error!(
                recordings_folder = %recordings_folder.display(),
                io_error = %error,
                "Failed to create recordings folder"
            );
            RecorderError::OutputDirectory {
                path: recordings_folder.clone(),
                source: error,
            }
        })?;

        let log_files = match core
            .reader
            .discover_files(Utc::now(), core.settings.log_discovery_window())
        {
            Ok(log_files) => log_files,
            Err(error) => {
                tracing::warn!(
                    logs_folder = %core.reader.log_directory().display(),
                    combat_log_error = %error,
                    "Failed to discover combat logs"
                );
                Vec::new()
            }
        };

        let mut tracked_characters = core.reader.classify(&log_files);
        tracked_characters.retain(|character, _| selected.contains(character.as_str()));

        for character in &selected {
            if !tracked_characters.contains_key(*character) {
                tracing::warn!(character = %character, "No combat log found for selected character");
            }
        }

        core.reader.mark_offsets(&tracked_characters);

        let recording_path = artifact::next_recording_path(&recordings_folder, Local::now());
        tracing::info!(
            recording_path = %recording_path.display(),
            tracked_characters = ?tracked_characters.keys().collect::<Vec<_>>(),
            "Recording starting"
        );

        core.session.begin(
            tracked_characters,
            recording_path,
            core.settings.frame_delay_centiseconds,
            core.settings.weather_reminder_interval_frames,
        );
        emit_session_starting(self.shared.notifier.as_ref());

        Ok(core.session.status())
    }

    /// Ends the session and, when frames were captured, writes the artifact.
    /// Blocks until encoding has finished.
    pub fn stop(&self) -> Result<StopOutcome, RecorderError> {
        let mut guard = self.shared.lock_core();
        let core = &mut *guard;

        if core.session.state() == RecorderState::Stopped {
            return Err(RecorderError::NotRecording);
        }

        let finished = core.session.finish();

        if finished.frames.is_empty() {
            core.reader.discard_offsets();
            tracing::info!("No frames captured, skipping recording of abyss run");
            emit_nothing_captured(self.shared.notifier.as_ref());
            return Ok(StopOutcome::NothingCaptured);
        }

        let combat_log = match core.reader.extract_since(&finished.tracked_characters) {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(combat_log_error = %error, "Recording without combat log");
                Vec::new()
            }
        };

        let written = artifact::assemble_recording(
            &finished,
            combat_log,
            &core.settings,
            self.shared.fittings.as_ref(),
        )
        .map_err(RecorderError::from)
        .and_then(|recording| artifact::write_artifact(&finished.recording_path, &recording));

        if let Err(error) = written {
            tracing::error!(
                recording_path = %finished.recording_path.display(),
                recording_error = %error,
                "Failed to record abyss run"
            );
            emit_recording_failed(self.shared.notifier.as_ref(), &error.to_string());
            return Err(error);
        }

        let recording_path_label = finished.recording_path.display().to_string();
        tracing::info!(
            frame_count = finished.frames.len(),
            loot_record_count = finished.loot_records.len(),
            recording_path = %recording_path_label,
            "Recording written"
        );
        emit_recording_encoded(self.shared.notifier.as_ref(), &recording_path_label);

        Ok(StopOutcome::Recorded {
            frame_count: finished.frames.len(),
            loot_record_count: finished.loot_records.len(),
            path: finished.recording_path,
        })
    }

    pub fn status(&self) -> RecorderStatus {
        self.shared.lock_core().session.status()
    }

    /// Records the weather tier. Ignored unless running and not yet set.
    pub fn set_weather_strength(&self, strength: WeatherStrength) -> bool {
        let mut core = self.shared.lock_core();
        if !core.session.set_weather_strength(strength) {
            tracing::debug!(
                weather_strength = strength.percent(),
                "Weather strength not applied"
            );
            return false;
        }

        tracing::info!(weather_strength = strength.percent(), "Weather strength set");
        emit_weather_strength_set(self.shared.notifier.as_ref(), strength);
        true
    }

    /// Stops the capture loop and waits for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            if let Err(error) = stop_tx.try_send(()) {
                tracing::debug!("Capture loop stop signal not delivered: {error}");
            }
        }

        if let Some(loop_handle) = self.loop_handle.take() {
            if loop_handle.join().is_err() {
                tracing::error!("Recorder capture loop panicked");
            }
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
