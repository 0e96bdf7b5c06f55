//! Station repository and write-through operations.
//!
//! Stations are created optimistically under a temporary id so the screen
//! reflects the new station immediately; the server record replaces the
//! placeholder on confirmation and the placeholder is removed on failure.
//! Pause toggling goes through the generic optimistic controller.

use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::mutate::{self, FieldToggle};
use crate::normalize::{normalize_station, Station};
use crate::reconcile::StationBoard;

impl FieldToggle for StationBoard {
    type Value = bool;

    fn get_value(&self, id: &str) -> Option<bool> {
        self.get(id).map(|s| s.is_paused)
    }

    fn set_value(&mut self, id: &str, value: bool) -> bool {
        self.set_paused(id, value)
    }

    fn note_write_resolved(&mut self, id: &str) {
        self.note_local_write(id);
    }
}

/// Station operations for one store.
pub struct StationService {
    api: ApiClient,
    store_id: String,
}

impl StationService {
    pub fn new(api: ApiClient, store_id: impl Into<String>) -> Self {
        Self {
            api,
            store_id: store_id.into(),
        }
    }

    fn require_store(&self) -> Result<&str> {
        let trimmed = self.store_id.trim();
        if trimmed.is_empty() {
            return Err(Error::Config {
                field: "selectedStoreId",
            });
        }
        Ok(trimmed)
    }

    /// Fetch all stations for the store.
    pub async fn fetch_stations(&self) -> Result<Vec<Station>> {
        let store_id = self.require_store()?;
        let resp = self.api.get(&format!("/owner/getstations/{store_id}")).await?;

        let records = crate::normalize::unwrap_collection(&resp, &["stations"])
            .ok_or_else(|| Error::fetch(None, "Station response is not an array"))?;

        Ok(records.iter().filter_map(normalize_station).collect())
    }

    /// Create a station. The board shows a placeholder under a temporary id
    /// until the server answers; the placeholder is swapped for the server
    /// record on success and removed on failure.
    pub async fn create_station(
        &self,
        board: &mut StationBoard,
        name: &str,
        is_paused: bool,
    ) -> Result<Station> {
        let store_id = self.require_store()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::mutation("station", "name must not be empty"));
        }

        let temp_id = format!("temp-{}", Uuid::new_v4());
        board.insert_if_absent(Station {
            id: temp_id.clone(),
            name: name.to_string(),
            is_paused,
        });

        let body = json!({ "name": name, "storeid": store_id, "is_paused": is_paused });
        match self.api.post("/owner/stations", &body).await {
            Ok(resp) => {
                let created = normalize_station(&resp)
                    .ok_or_else(|| Error::fetch(None, "Created station response missing id"));
                board.remove(&temp_id);
                match created {
                    Ok(station) => {
                        // A stationAdded event may have landed first.
                        board.insert_if_absent(station.clone());
                        board.note_local_write(&station.id);
                        Ok(station)
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => {
                warn!(name, error = %e, "station creation failed, removing placeholder");
                board.remove(&temp_id);
                Err(Error::mutation("station", e.to_string()))
            }
        }
    }

    /// Rename a station, optimistically. The previous name is restored
    /// verbatim when the write fails.
    pub async fn rename_station(
        &self,
        board: &mut StationBoard,
        id: &str,
        name: &str,
    ) -> Result<Station> {
        let snapshot = board
            .get(id)
            .cloned()
            .ok_or_else(|| Error::mutation("station", format!("unknown id {id}")))?;

        board.update_fields(id, Some(name.trim()), None);

        let body = json!({ "name": name.trim() });
        match self.api.put(&format!("/owner/stations/{id}"), &body).await {
            Ok(resp) => {
                if let Some(updated) = normalize_station(&resp) {
                    board.update_fields(id, Some(&updated.name), Some(updated.is_paused));
                }
                board.note_local_write(id);
                Ok(board.get(id).cloned().unwrap_or(snapshot))
            }
            Err(e) => {
                board.update_fields(id, Some(&snapshot.name), None);
                board.note_local_write(id);
                Err(Error::mutation("station", e.to_string()))
            }
        }
    }

    /// Toggle the pause flag through the optimistic controller. Returns the
    /// server's resulting flag.
    pub async fn set_paused(
        &self,
        board: &mut StationBoard,
        id: &str,
        is_paused: bool,
    ) -> Result<bool> {
        let api = self.api.clone();
        mutate::toggle_field(board, id, is_paused, "station", move |id, value| {
            let api = api.clone();
            async move {
                let resp = api
                    .put(
                        &format!("/owner/stations/{id}/pause"),
                        &json!({ "is_paused": value }),
                    )
                    .await
                    .map_err(|e| Error::mutation("station", e.to_string()))?;
                Ok(resp
                    .get("is_paused")
                    .or_else(|| resp.get("isPaused"))
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(value))
            }
        })
        .await
    }

    /// Delete a station. The board entry is removed only once the server
    /// confirms; a concurrent `stationDeleted` event makes the removal a
    /// no-op.
    pub async fn delete_station(&self, board: &mut StationBoard, id: &str) -> Result<()> {
        self.api
            .delete(&format!("/owner/stations/{id}"))
            .await
            .map_err(|e| Error::mutation("station", e.to_string()))?;
        board.remove(id);
        board.note_local_write(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(stations: &[(&str, &str, bool)]) -> StationBoard {
        let mut board = StationBoard::new();
        board.replace_all(
            stations
                .iter()
                .map(|(id, name, paused)| Station {
                    id: id.to_string(),
                    name: name.to_string(),
                    is_paused: *paused,
                })
                .collect(),
        );
        board
    }

    #[test]
    fn board_toggles_pause_through_the_field_trait() {
        let mut board = board_with(&[("s1", "Pizza", false)]);
        assert_eq!(board.get_value("s1"), Some(false));
        assert!(board.set_value("s1", true));
        assert!(board.get("s1").unwrap().is_paused);
        assert!(!board.set_value("ghost", true));
    }

    #[tokio::test]
    async fn operations_without_store_id_fail_before_the_network() {
        let api = ApiClient::new("https://server.eatorder.fr:8000", None).unwrap();
        let service = StationService::new(api, "");

        let err = service.fetch_stations().await.expect_err("missing store");
        assert!(matches!(err, Error::Config { .. }));

        let mut board = StationBoard::new();
        let err = service
            .create_station(&mut board, "Grill", false)
            .await
            .expect_err("missing store");
        assert!(matches!(err, Error::Config { .. }));
        assert!(board.stations().is_empty(), "no placeholder on config error");
    }

    #[tokio::test]
    async fn create_station_rejects_empty_names_without_a_placeholder() {
        let api = ApiClient::new("https://server.eatorder.fr:8000", None).unwrap();
        let service = StationService::new(api, "store-1");
        let mut board = StationBoard::new();

        let err = service
            .create_station(&mut board, "   ", false)
            .await
            .expect_err("empty name");
        assert!(matches!(err, Error::Mutation { .. }));
        assert!(board.stations().is_empty());
    }

    #[tokio::test]
    async fn pause_of_unknown_station_is_a_mutation_error() {
        let api = ApiClient::new("https://server.eatorder.fr:8000", None).unwrap();
        let service = StationService::new(api, "store-1");
        let mut board = StationBoard::new();

        let err = service
            .set_paused(&mut board, "ghost", true)
            .await
            .expect_err("unknown id");
        assert!(matches!(err, Error::Mutation { .. }));
    }
}
