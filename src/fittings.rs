use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ship loadout a character flew during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fitting {
    pub source: String,
    pub foreign_id: String,
    pub fitting_name: String,
    pub eft: String,
    pub ffh: String,
    pub price: f64,
    pub ship_name: String,
    pub ship_type_id: i32,
}

/// Resolves the fitting assigned to a character, consulted when a
/// recording is finalized.
pub trait FittingLookup: Send + Sync {
    fn fitting_for_pilot(&self, character_name: &str) -> Option<Fitting>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFittings;

impl FittingLookup for NoFittings {
    fn fitting_for_pilot(&self, _character_name: &str) -> Option<Fitting> {
        None
    }
}

impl FittingLookup for BTreeMap<String, Fitting> {
    fn fitting_for_pilot(&self, character_name: &str) -> Option<Fitting> {
        self.get(character_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{Fitting, FittingLookup, NoFittings};
    use std::collections::BTreeMap;

    #[test]
    fn map_lookup_finds_fitting_by_character() {
        let fittings = BTreeMap::from([(
            "Runner1".to_string(),
            Fitting {
                ship_name: "Gila".to_string(),
                ..Fitting::default()
            },
        )]);

        assert_eq!(
            fittings
                .fitting_for_pilot("Runner1")
                .map(|fitting| fitting.ship_name),
            Some("Gila".to_string())
        );
        assert!(fittings.fitting_for_pilot("Runner2").is_none());
        assert!(NoFittings.fitting_for_pilot("Runner1").is_none());
    }

    #[test]
    fn partial_fitting_json_uses_defaults() {
        let fitting: Fitting = serde_json::from_str(r#"{"shipName":"Gila","shipTypeId":17715}"#)
            .expect("Expected fitting JSON to parse");

        assert_eq!(fitting.ship_name, "Gila");
        assert_eq!(fitting.ship_type_id, 17715);
        assert!(fitting.eft.is_empty());
    }
}
