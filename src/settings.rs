use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::encoding::{AbyssShipType, ARTIFACT_EXTENSION};

pub(crate) const DEFAULT_FRAME_DELAY_CENTISECONDS: u16 = 10;
pub(crate) const DEFAULT_WEATHER_REMINDER_INTERVAL_FRAMES: usize = 180;
pub(crate) const DEFAULT_LOG_DISCOVERY_WINDOW_HOURS: u32 = 24;
pub(crate) const DEFAULT_MAX_TRACKED_CHARACTERS: usize = 3;
pub(crate) const DEFAULT_LOOT_RECORD_DISCRIMINATOR: &str = "Quafe";

/// Manual classification of a run, used when automatic detection from the
/// recording is not wanted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbyssTypeOverride {
    pub ship_type: i32,
    pub tier: i32,
    pub weather: String,
}

impl AbyssTypeOverride {
    pub fn ship_type(&self) -> AbyssShipType {
        AbyssShipType::try_from(self.ship_type).unwrap_or(AbyssShipType::Cruiser)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    pub recordings_folder: PathBuf,
    pub game_logs_folder: PathBuf,
    pub test_server: bool,
    pub loot_record_discriminator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abyss_type_override: Option<AbyssTypeOverride>,
    pub frame_delay_centiseconds: u16,
    pub weather_reminder_interval_frames: usize,
    pub log_discovery_window_hours: u32,
    pub max_tracked_characters: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            recordings_folder: default_recordings_folder(),
            game_logs_folder: default_game_logs_folder(),
            test_server: false,
            loot_record_discriminator: DEFAULT_LOOT_RECORD_DISCRIMINATOR.to_string(),
            abyss_type_override: None,
            frame_delay_centiseconds: DEFAULT_FRAME_DELAY_CENTISECONDS,
            weather_reminder_interval_frames: DEFAULT_WEATHER_REMINDER_INTERVAL_FRAMES,
            log_discovery_window_hours: DEFAULT_LOG_DISCOVERY_WINDOW_HOURS,
            max_tracked_characters: DEFAULT_MAX_TRACKED_CHARACTERS,
        }
    }
}

impl RecorderSettings {
    pub fn with_folders(
        recordings_folder: impl Into<PathBuf>,
        game_logs_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            recordings_folder: recordings_folder.into(),
            game_logs_folder: game_logs_folder.into(),
            ..Self::default()
        }
    }

    pub(crate) fn log_discovery_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.log_discovery_window_hours))
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecordingInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub created_at: u64,
}

fn home_directory() -> PathBuf {
    std::env::var("USERPROFILE")
        .or_else(|_| std::env::var("HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn default_recordings_folder() -> PathBuf {
    home_directory()
        .join("Documents")
        .join("abyss-blackbox")
        .join("recordings")
}

pub fn default_game_logs_folder() -> PathBuf {
    home_directory()
        .join("Documents")
        .join("EVE")
        .join("logs")
        .join("Gamelogs")
}

/// Loads settings from `path`, falling back to defaults when the file does
/// not exist yet. Missing fields take their default values.
pub fn load_settings(path: &Path) -> Result<RecorderSettings, String> {
    let raw_json = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Ok(RecorderSettings::default())
        }
        Err(error) => {
            return Err(format!(
                "Failed to read settings '{}': {error}",
                path.display()
            ));
        }
    };

    serde_json::from_str::<RecorderSettings>(&raw_json).map_err(|error| {
        format!("Failed to parse settings '{}': {error}", path.display())
    })
}

pub fn save_settings(path: &Path, settings: &RecorderSettings) -> Result<(), String> {
    if let Some(parent_directory) = path.parent() {
        std::fs::create_dir_all(parent_directory).map_err(|error| {
            format!(
                "Failed to create settings directory '{}': {error}",
                parent_directory.display()
            )
        })?;
    }

    let serialized = serde_json::to_string_pretty(settings)
        .map_err(|error| format!("Failed to serialize settings: {error}"))?;
    let temp_path = path.with_extension("json.tmp");

    std::fs::write(&temp_path, serialized).map_err(|error| {
        format!(
            "Failed to write temporary settings '{}': {error}",
            temp_path.display()
        )
    })?;

    std::fs::rename(&temp_path, path).map_err(|error| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to finalize settings '{}': {error}", path.display())
    })
}

/// Recordings in `folder`, oldest first.
pub fn list_recordings(folder: &Path) -> Result<Vec<RecordingInfo>, String> {
    if !folder.exists() {
        return Ok(Vec::new());
    }

    let mut recordings = Vec::new();

    for entry in std::fs::read_dir(folder).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();

        if !path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| e.to_string())?;
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|duration| duration.as_secs())
            .unwrap_or(0);

        let Some(filename) = path.file_name() else {
            continue;
        };

        recordings.push(RecordingInfo {
            filename: filename.to_string_lossy().to_string(),
            size_bytes: metadata.len(),
            created_at,
        });
    }

    recordings.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then_with(|| left.filename.cmp(&right.filename))
    });

    Ok(recordings)
}
