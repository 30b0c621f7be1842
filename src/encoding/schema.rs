use std::collections::BTreeMap;

use crate::combat_log::CombatLogRecord;
use crate::fittings::Fitting;

/// Bumped whenever fields are added. Artifacts written before the field
/// existed decode it as 0.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AbyssShipType {
    Unknown = 0,
    Cruiser = 1,
    Destroyer = 2,
    Frigate = 3,
}

impl AbyssShipType {
    pub fn label(self) -> &'static str {
        match self {
            AbyssShipType::Unknown => "Unknown",
            AbyssShipType::Cruiser => "Cruiser",
            AbyssShipType::Destroyer => "Destroyers",
            AbyssShipType::Frigate => "Frigates",
        }
    }
}

/// Clipboard snapshot tagged with the frame it was captured near.
#[derive(Clone, PartialEq, prost::Message)]
pub struct LootRecord {
    #[prost(int32, tag = "1")]
    pub frame: i32,
    #[prost(string, tag = "2")]
    pub loot: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Fit {
    #[prost(string, tag = "1")]
    pub source: String,
    #[prost(string, tag = "2")]
    pub foreign_id: String,
    #[prost(string, tag = "3")]
    pub fitting_name: String,
    #[prost(string, tag = "4")]
    pub eft: String,
    #[prost(string, tag = "5")]
    pub ffh: String,
    #[prost(double, tag = "6")]
    pub price: f64,
    #[prost(string, tag = "7")]
    pub ship_name: String,
    #[prost(int32, tag = "8")]
    pub ship_type_id: i32,
}

impl From<&Fitting> for Fit {
    fn from(fitting: &Fitting) -> Self {
        Self {
            source: fitting.source.clone(),
            foreign_id: fitting.foreign_id.clone(),
            fitting_name: fitting.fitting_name.clone(),
            eft: fitting.eft.clone(),
            ffh: fitting.ffh.clone(),
            price: fitting.price,
            ship_name: fitting.ship_name.clone(),
            ship_type_id: fitting.ship_type_id,
        }
    }
}

/// Top-level message of an `.abyss` artifact. Fields are only ever added.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AbyssRecording {
    /// Animated GIF of the captured frames.
    #[prost(bytes = "vec", tag = "1")]
    pub overview: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub loot: Vec<LootRecord>,
    #[prost(message, repeated, tag = "3")]
    pub combat_log: Vec<CombatLogRecord>,
    #[prost(bool, tag = "4")]
    pub test_server: bool,
    #[prost(int32, tag = "5")]
    pub weather_strength: i32,
    #[prost(string, tag = "6")]
    pub loot_record_discriminator: String,
    #[prost(string, tag = "7")]
    pub recorder_version: String,
    #[prost(bool, tag = "8")]
    pub manual_abyss_type_override: bool,
    #[prost(enumeration = "AbyssShipType", tag = "9")]
    pub abyss_ship_type: i32,
    #[prost(int32, tag = "10")]
    pub abyss_tier: i32,
    #[prost(string, tag = "11")]
    pub abyss_weather: String,
    #[prost(btree_map = "string, message", tag = "12")]
    pub fittings: BTreeMap<String, Fit>,
    #[prost(uint32, tag = "13")]
    pub schema_version: u32,
}

impl AbyssRecording {
    pub fn ship_type(&self) -> AbyssShipType {
        AbyssShipType::try_from(self.abyss_ship_type).unwrap_or(AbyssShipType::Unknown)
    }

    /// Human-readable manual classification, e.g. `Cruiser T5 Dark`.
    pub fn manual_type_label(&self) -> Option<String> {
        if !self.manual_abyss_type_override {
            return None;
        }

        Some(format!(
            "{} T{} {}",
            self.ship_type().label(),
            self.abyss_tier,
            self.abyss_weather
        ))
    }
}
