//! Stations served by the bridge
//!
//! Each station has its own webhook route, its own assistant, and its own
//! pair of collections (`sessions_{id}`, `submissions_{id}`).

use serde::Deserialize;

use crate::{Error, Result};

/// A station the bridge answers for
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Station {
    /// Short identifier used in routes and collection names (e.g. "n6")
    pub id: String,
    /// Display name
    pub name: String,
    /// Assistant that answers this station's conversations
    #[serde(default)]
    pub assistant_id: String,
}

impl Station {
    #[must_use]
    pub fn new(id: &str, name: &str, assistant_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            assistant_id: assistant_id.to_string(),
        }
    }

    /// Collection holding this station's sessions
    #[must_use]
    pub fn sessions_collection(&self) -> String {
        format!("sessions_{}", self.id)
    }

    /// Collection holding this station's submissions
    #[must_use]
    pub fn submissions_collection(&self) -> String {
        format!("submissions_{}", self.id)
    }
}

/// Lookup table of configured stations
#[derive(Debug, Clone, Default)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    #[must_use]
    pub const fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    /// Resolve a station by id
    ///
    /// # Errors
    ///
    /// Returns `UnknownStation` when the id is not configured
    pub fn get(&self, id: &str) -> Result<&Station> {
        self.stations
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::UnknownStation(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_are_station_scoped() {
        let station = Station::new("n9", "News 9", "asst_9");
        assert_eq!(station.sessions_collection(), "sessions_n9");
        assert_eq!(station.submissions_collection(), "submissions_n9");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = StationRegistry::new(vec![
            Station::new("n6", "News On 6", "asst_6"),
            Station::new("n9", "News 9", "asst_9"),
        ]);
        assert_eq!(registry.get("n6").unwrap().assistant_id, "asst_6");
        assert!(matches!(registry.get("n7"), Err(Error::UnknownStation(_))));
        assert_eq!(registry.len(), 2);
    }
}
