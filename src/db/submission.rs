//! Submission repository: story tips and feedback forwarded to the newsroom

use serde::{Deserialize, Serialize};

use super::store::{DocumentStore, FilterOp, Query};
use crate::station::Station;
use crate::Result;

/// A recorded submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Submission kind label (e.g. "story", "digital feedback")
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-text description supplied by the user
    pub content: String,
    /// Outcome of forwarding to the forms relay
    pub relay_response: String,
    pub session_id: String,
    pub user_id: String,
    /// Epoch milliseconds
    pub created: i64,
}

/// Submission repository
#[derive(Clone)]
pub struct SubmissionRepo {
    store: DocumentStore,
}

impl SubmissionRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Store a submission, returning its generated id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, station: &Station, submission: &Submission) -> Result<String> {
        self.store.add(&station.submissions_collection(), submission)
    }

    /// All submissions for a station
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or a body is malformed
    pub fn list(&self, station: &Station) -> Result<Vec<Submission>> {
        self.store
            .query(&station.submissions_collection(), &Query::new())?
            .iter()
            .map(super::Document::parse)
            .collect()
    }

    /// Ids of submissions created in `[start_ms, end_ms)`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn ids_created_between(
        &self,
        station: &Station,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<String>> {
        let query = Query::new()
            .filter("created", FilterOp::Gte, start_ms)
            .filter("created", FilterOp::Lt, end_ms);

        Ok(self
            .store
            .query(&station.submissions_collection(), &query)?
            .into_iter()
            .map(|doc| doc.id)
            .collect())
    }

    /// Delete submissions by id in store-sized batches
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete_many(&self, station: &Station, ids: &[String]) -> Result<usize> {
        self.store.delete_many(&station.submissions_collection(), ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn submission(created: i64) -> Submission {
        Submission {
            kind: "story".to_string(),
            content: "Water main break on 5th".to_string(),
            relay_response: "Success".to_string(),
            session_id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            created,
        }
    }

    #[test]
    fn test_create_and_window_query() {
        let repo = SubmissionRepo::new(DocumentStore::new(init_memory().unwrap()));
        let station = Station::new("n9", "News 9", "asst_9");

        repo.create(&station, &submission(100)).unwrap();
        let inside = repo.create(&station, &submission(200)).unwrap();
        repo.create(&station, &submission(300)).unwrap();

        let ids = repo.ids_created_between(&station, 150, 300).unwrap();
        assert_eq!(ids, vec![inside]);
        assert_eq!(repo.list(&station).unwrap().len(), 3);
    }

    #[test]
    fn test_stored_shape_uses_type_key() {
        let json = serde_json::to_value(submission(1)).unwrap();
        assert_eq!(json["type"], "story");
        assert_eq!(json["relayResponse"], "Success");
        assert_eq!(json["sessionId"], "s-1");
    }
}
