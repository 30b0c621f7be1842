use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::combat_log::CombatLogRecord;
use crate::encoding::{
    encode, encode_overview, AbyssRecording, EncodingError, Fit, ARTIFACT_EXTENSION,
    ARTIFACT_SCHEMA_VERSION,
};
use crate::fittings::FittingLookup;
use crate::settings::RecorderSettings;

use super::model::FinishedSession;
use super::RecorderError;

const RECORDING_NAME_FORMAT: &str = "%Y-%b-%-d-%H-%M-%S";

pub(crate) fn recorder_version() -> String {
    format!("abyss-blackbox {}", env!("CARGO_PKG_VERSION"))
}

/// `<folder>/<start time>.abyss`, suffixed with `_N` when a recording with
/// that name already exists.
pub(crate) fn next_recording_path(folder: &Path, started_at: DateTime<Local>) -> PathBuf {
    let stem = started_at.format(RECORDING_NAME_FORMAT).to_string();
    let mut candidate = folder.join(format!("{stem}.{ARTIFACT_EXTENSION}"));
    let mut suffix = 1_u32;

    while candidate.exists() {
        candidate = folder.join(format!("{stem}_{suffix}.{ARTIFACT_EXTENSION}"));
        suffix = suffix.saturating_add(1);
    }

    candidate
}

pub(crate) fn assemble_recording(
    finished: &FinishedSession,
    combat_log: Vec<CombatLogRecord>,
    settings: &RecorderSettings,
    fittings: &dyn FittingLookup,
) -> Result<AbyssRecording, EncodingError> {
    let overview = encode_overview(&finished.frames, &finished.delays)?;

    let mut run_fittings = BTreeMap::new();
    for character in finished.tracked_characters.keys() {
        if let Some(fitting) = fittings.fitting_for_pilot(character) {
            run_fittings.insert(character.clone(), Fit::from(&fitting));
        }
    }

    let mut recording = AbyssRecording {
        overview,
        loot: finished.loot_records.clone(),
        combat_log,
        test_server: settings.test_server,
        weather_strength: finished
            .weather_strength
            .map(|strength| strength.percent())
            .unwrap_or(0),
        loot_record_discriminator: settings.loot_record_discriminator.clone(),
        recorder_version: recorder_version(),
        fittings: run_fittings,
        schema_version: ARTIFACT_SCHEMA_VERSION,
        ..AbyssRecording::default()
    };

    if let Some(type_override) = &settings.abyss_type_override {
        recording.manual_abyss_type_override = true;
        recording.abyss_ship_type = type_override.ship_type() as i32;
        recording.abyss_tier = type_override.tier;
        recording.abyss_weather = type_override.weather.clone();
    }

    Ok(recording)
}

/// Encodes into a temporary file next to `recording_path` and renames it
/// into place. A failed write leaves no `.abyss` file behind.
pub(crate) fn write_artifact(
    recording_path: &Path,
    recording: &AbyssRecording,
) -> Result<(), RecorderError> {
    let temp_path = temporary_artifact_path(recording_path);

    if let Err(error) = write_encoded(&temp_path, recording) {
        remove_temporary_artifact(&temp_path);
        return Err(error);
    }

    if let Err(error) = std::fs::rename(&temp_path, recording_path) {
        remove_temporary_artifact(&temp_path);
        return Err(RecorderError::Write {
            path: recording_path.to_path_buf(),
            source: error,
        });
    }

    Ok(())
}

fn write_encoded(temp_path: &Path, recording: &AbyssRecording) -> Result<(), RecorderError> {
    let file = File::create(temp_path).map_err(|error| RecorderError::Write {
        path: temp_path.to_path_buf(),
        source: error,
    })?;

    let mut writer = encode(recording, BufWriter::new(file))?;
    writer.flush().map_err(|error| RecorderError::Write {
        path: temp_path.to_path_buf(),
        source: error,
    })?;

    Ok(())
}

fn remove_temporary_artifact(temp_path: &Path) {
    if let Err(error) = std::fs::remove_file(temp_path) {
        if error.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                temp_path = %temp_path.display(),
                io_error = %error,
                "Failed to remove temporary recording file"
            );
        }
    }
}

fn temporary_artifact_path(recording_path: &Path) -> PathBuf {
    let Some(file_name) = recording_path.file_name().and_then(|value| value.to_str()) else {
        return recording_path.with_extension("abyss.tmp");
    };

    recording_path.with_file_name(format!("{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::{next_recording_path, temporary_artifact_path, write_artifact};
    use crate::encoding::{read_artifact, AbyssRecording, LootRecord};
    use chrono::{Local, TimeZone};
    use std::path::{Path, PathBuf};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_directory() -> PathBuf {
        let timestamp_nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos())
            .unwrap_or(0);
        let process_id = std::process::id();
        let directory = std::env::temp_dir().join(format!(
            "abyss_blackbox_artifact_test_{process_id}_{timestamp_nanos}"
        ));
        std::fs::create_dir_all(&directory).expect("Failed to create artifact test directory");
        directory
    }

    #[test]
    fn names_recordings_after_start_time_and_avoids_collisions() {
        let directory = unique_temp_directory();
        let started_at = Local
            .with_ymd_and_hms(2024, 1, 5, 20, 15, 11)
            .single()
            .expect("Expected unambiguous local time");

        let first = next_recording_path(&directory, started_at);
        assert_eq!(first, directory.join("2024-Jan-5-20-15-11.abyss"));

        std::fs::write(&first, b"taken").expect("Failed to occupy recording name");
        let second = next_recording_path(&directory, started_at);
        assert_eq!(second, directory.join("2024-Jan-5-20-15-11_1.abyss"));

        std::fs::remove_dir_all(&directory).expect("Failed to remove artifact test directory");
    }

    #[test]
    fn derives_temporary_path_next_to_recording() {
        let temp_path = temporary_artifact_path(Path::new("/recordings/run.abyss"));
        assert_eq!(temp_path, PathBuf::from("/recordings/run.abyss.tmp"));
    }

    #[test]
    fn writes_artifact_atomically() {
        let directory = unique_temp_directory();
        let recording_path = directory.join("run.abyss");
        let recording = AbyssRecording {
            overview: vec![1, 2, 3],
            loot: vec![LootRecord {
                frame: 0,
                loot: "cargo".to_string(),
            }],
            ..AbyssRecording::default()
        };

        write_artifact(&recording_path, &recording).expect("Expected artifact write to succeed");

        assert!(!temporary_artifact_path(&recording_path).exists());
        let decoded = read_artifact(&recording_path).expect("Expected artifact to decode");
        assert_eq!(decoded, recording);

        std::fs::remove_dir_all(&directory).expect("Failed to remove artifact test directory");
    }

    #[test]
    fn failed_write_leaves_no_files() {
        let directory = unique_temp_directory();
        let recording_path = directory.join("missing-subdirectory").join("run.abyss");

        let result = write_artifact(&recording_path, &AbyssRecording::default());
        assert!(result.is_err());
        assert!(!recording_path.exists());
        assert!(!temporary_artifact_path(&recording_path).exists());

        std::fs::remove_dir_all(&directory).expect("Failed to remove artifact test directory");
    }
}
