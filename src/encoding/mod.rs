//! `.abyss` artifact format: a protobuf `AbyssRecording` message wrapped in
//! a gzip stream. The captured frames travel inside it as an animated GIF.

mod animation;
mod schema;

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;

pub use animation::encode_overview;
pub use schema::{AbyssRecording, AbyssShipType, Fit, LootRecord, ARTIFACT_SCHEMA_VERSION};

pub const ARTIFACT_EXTENSION: &str = "abyss";

#[derive(thiserror::Error, Debug)]
pub enum EncodingError {
    #[error("no frames to encode")]
    EmptyAnimation,
    #[error("{frames} frames but {delays} frame delays")]
    DelayCountMismatch { frames: usize, delays: usize },
    #[error(
        "frame {index} is {width}x{height}, larger than the {expected_width}x{expected_height} canvas"
    )]
    FrameSizeMismatch {
        index: usize,
        expected_width: u16,
        expected_height: u16,
        width: u16,
        height: u16,
    },
    #[error("frame {index} uses palette index {value}")]
    PaletteIndexOutOfRange { index: usize, value: u8 },
    #[error("failed to encode overview animation: {0}")]
    Gif(#[from] gif::EncodingError),
    #[error("artifact i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode recording message: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Serializes and compresses `recording` into `writer`. Output is
/// byte-for-byte stable for equal input.
pub fn encode<W: Write>(recording: &AbyssRecording, writer: W) -> Result<W, EncodingError> {
    let message = recording.encode_to_vec();
    let mut compressor = GzEncoder::new(writer, Compression::default());
    compressor.write_all(&message)?;
    Ok(compressor.finish()?)
}

pub fn encode_to_vec(recording: &AbyssRecording) -> Result<Vec<u8>, EncodingError> {
    encode(recording, Vec::new())
}

/// Decompresses and decodes an artifact. Fields the message does not carry
/// come back as their defaults and unknown fields are skipped.
pub fn decode<R: Read>(reader: R) -> Result<AbyssRecording, EncodingError> {
    let mut decompressor = GzDecoder::new(reader);
    let mut message = Vec::new();
    decompressor.read_to_end(&mut message)?;
    Ok(AbyssRecording::decode(message.as_slice())?)
}

pub fn read_artifact(path: &Path) -> Result<AbyssRecording, EncodingError> {
    let file = std::fs::File::open(path)?;
    decode(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::{
        decode, encode_to_vec, AbyssRecording, AbyssShipType, EncodingError, Fit, LootRecord,
        ARTIFACT_SCHEMA_VERSION,
    };
    use crate::combat_log::{CombatLogRecord, LanguageCode};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use prost::Message;
    use std::io::Write;

    fn gzip(message: &[u8]) -> Vec<u8> {
        let mut compressor = GzEncoder::new(Vec::new(), Compression::default());
        compressor
            .write_all(message)
            .expect("Failed to compress test message");
        compressor.finish().expect("Failed to finish test gzip stream")
    }

    fn recording_with_loot(loot: Vec<LootRecord>) -> AbyssRecording {
        AbyssRecording {
            overview: vec![0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 1, 2, 3],
            loot,
            combat_log: vec![
                CombatLogRecord::new(
                    "runner1",
                    LanguageCode::English,
                    vec!["line1".to_string(), "line2".to_string()],
                ),
                CombatLogRecord::new("Коля", LanguageCode::Russian, Vec::new()),
            ],
            test_server: true,
            weather_strength: 50,
            loot_record_discriminator: "Quafe".to_string(),
            recorder_version: "abyss-blackbox 0.1.0".to_string(),
            schema_version: ARTIFACT_SCHEMA_VERSION,
            ..AbyssRecording::default()
        }
    }

    #[test]
    fn roundtrips_sessions_with_zero_one_and_many_loot_records() {
        let many: Vec<LootRecord> = (0..25)
            .map(|index| LootRecord {
                frame: index * 7,
                loot: format!("Quafe Zero\t{index}\tBooster\n"),
            })
            .collect();

        for loot in [
            Vec::new(),
            vec![LootRecord {
                frame: 0,
                loot: "Baseline cargo".to_string(),
            }],
            many,
        ] {
            let recording = recording_with_loot(loot);
            let bytes = encode_to_vec(&recording).expect("Expected encode to succeed");
            let decoded = decode(bytes.as_slice()).expect("Expected decode to succeed");

            assert_eq!(decoded.overview, recording.overview);
            assert_eq!(decoded.loot, recording.loot);
            assert_eq!(decoded.combat_log, recording.combat_log);
            assert_eq!(decoded, recording);
        }
    }

    #[test]
    fn roundtrips_fittings_and_manual_override() {
        let mut recording = recording_with_loot(Vec::new());
        recording.manual_abyss_type_override = true;
        recording.abyss_ship_type = AbyssShipType::Frigate as i32;
        recording.abyss_tier = 4;
        recording.abyss_weather = "Electrical".to_string();
        recording.fittings.insert(
            "runner1".to_string(),
            Fit {
                fitting_name: "Gila Abyss".to_string(),
                ship_name: "Gila".to_string(),
                ship_type_id: 17715,
                price: 512_000_000.0,
                ..Fit::default()
            },
        );

        let bytes = encode_to_vec(&recording).expect("Expected encode to succeed");
        let decoded = decode(bytes.as_slice()).expect("Expected decode to succeed");

        assert_eq!(decoded.ship_type(), AbyssShipType::Frigate);
        assert_eq!(decoded.manual_type_label().as_deref(), Some("Frigates T4 Electrical"));
        assert_eq!(decoded.fittings, recording.fittings);
    }

    #[test]
    fn encoding_is_deterministic() {
        let recording = recording_with_loot(vec![LootRecord {
            frame: 3,
            loot: "loot".to_string(),
        }]);

        let first = encode_to_vec(&recording).expect("Expected encode to succeed");
        let second = encode_to_vec(&recording).expect("Expected encode to succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_message_decodes_to_defaults() {
        let decoded = decode(gzip(&[]).as_slice()).expect("Expected empty message to decode");

        assert!(decoded.overview.is_empty());
        assert!(decoded.loot.is_empty());
        assert_eq!(decoded.weather_strength, 0);
        assert_eq!(decoded.schema_version, 0);
        assert_eq!(decoded.ship_type(), AbyssShipType::Unknown);
        assert!(decoded.manual_type_label().is_none());
    }

    #[test]
    fn tolerates_fields_and_enum_values_from_newer_writers() {
        let mut record = CombatLogRecord::new("runner1", LanguageCode::English, Vec::new());
        record.language_code = 42;
        let recording = AbyssRecording {
            combat_log: vec![record],
            abyss_ship_type: 9,
            ..AbyssRecording::default()
        };

        let mut message = recording.encode_to_vec();
        prost::encoding::encode_key(99, prost::encoding::WireType::Varint, &mut message);
        prost::encoding::encode_varint(7, &mut message);
        prost::encoding::encode_key(100, prost::encoding::WireType::LengthDelimited, &mut message);
        prost::encoding::encode_varint(3, &mut message);
        message.extend_from_slice(b"new");

        let decoded = decode(gzip(&message).as_slice()).expect("Expected decode to tolerate unknown fields");
        assert_eq!(decoded.combat_log[0].language(), LanguageCode::English);
        assert_eq!(decoded.combat_log[0].language_code, 42);
        assert_eq!(decoded.ship_type(), AbyssShipType::Unknown);
    }

    #[test]
    fn rejects_data_that_is_not_gzip() {
        let result = decode(&b"definitely not an artifact"[..]);
        assert!(matches!(result, Err(EncodingError::Io(_))));
    }

    #[test]
    fn rejects_corrupt_message() {
        let result = decode(gzip(&[0x0a, 0xff, 0xff]).as_slice());
        assert!(matches!(result, Err(EncodingError::Decode(_))));
    }
}
