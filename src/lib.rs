pub mod capture;
pub mod combat_log;
pub mod encoding;
pub mod fittings;
pub mod recording;
pub mod settings;

pub use capture::{FrameSender, LootSender, PalettedFrame, FRAME_PALETTE_SIZE};
pub use combat_log::{CombatLogError, CombatLogFile, CombatLogReader, CombatLogRecord, LanguageCode};
pub use encoding::{
    decode, encode, encode_to_vec, read_artifact, AbyssRecording, AbyssShipType, EncodingError,
    Fit, LootRecord,
};
pub use fittings::{Fitting, FittingLookup, NoFittings};
pub use recording::{
    notification_channel, ChannelNotificationSink, LogNotificationSink, Notification,
    NotificationSink, Recorder, RecorderError, RecorderState, RecorderStatus, StopOutcome,
    WeatherStrength,
};
pub use settings::{AbyssTypeOverride, RecorderSettings};

/// Installs the fmt subscriber, filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    if let Err(error) = result {
        tracing::debug!("Tracing subscriber already installed: {error}");
    }
}
