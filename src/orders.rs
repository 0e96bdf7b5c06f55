//! Paginated order repository.
//!
//! Fetches one page of orders for the selected store, maps the raw records
//! through the normalization boundary and hands the page to the caller. The
//! fetch is a thin shell around the pure `map_order_page` transform so the
//! interesting logic stays testable without a server.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::mutate::{self, FieldToggle};
use crate::normalize::{normalize_order, Order, OrderStatus};

/// Map one page of raw order records into canonical orders.
///
/// Display numbers are computed from the fetch position
/// (`(page-1)*page_size + index + 1`) before the recency sort, matching the
/// numbering the kitchen screens show. They are presentation artifacts and
/// are not stable across re-fetches.
pub fn map_order_page(records: &[Value], page: u32, page_size: u32) -> Vec<Order> {
    let page = page.max(1);
    let mut orders: Vec<Order> = records
        .iter()
        .filter_map(normalize_order)
        .enumerate()
        .map(|(index, mut order)| {
            order.display_number = format!("ORDER-{}", (page - 1) * page_size + index as u32 + 1);
            order
        })
        .collect();

    if orders.len() != records.len() {
        warn!(
            dropped = records.len() - orders.len(),
            "order page contained records without ids"
        );
    }

    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Fetches order pages for one store. Holds no order state; the owning view
/// decides what to do with each returned page.
pub struct OrderRepository {
    api: ApiClient,
    store_id: String,
    page_size: u32,
}

impl OrderRepository {
    pub fn new(api: ApiClient, store_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            api,
            store_id: store_id.into(),
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch one page of orders, newest first.
    ///
    /// Each successful fetch is a full replacement for the page-scoped
    /// collection; pages are never merged, so a re-fetch after an
    /// `orderUpdate` notification converges on server state in one round
    /// trip. Fails with `Config` before any network call when no store is
    /// selected; no internal retry on `Fetch` failures.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<Order>> {
        if self.store_id.trim().is_empty() {
            return Err(Error::Config {
                field: "selectedStoreId",
            });
        }

        let path = format!(
            "/owner/orders/{}?page={}&limit={}",
            self.store_id,
            page.max(1),
            self.page_size
        );
        let resp = self.api.get(&path).await?;

        let records = crate::normalize::unwrap_collection(&resp, &["orders"])
            .ok_or_else(|| Error::fetch(None, "Order response is not an array"))?;

        let orders = map_order_page(&records, page.max(1), self.page_size);
        debug!(page, count = orders.len(), "fetched order page");
        Ok(orders)
    }

    /// Write an order status change through to the server, optimistically
    /// updating `board`. Returns the server's resulting status.
    pub async fn set_status(
        &self,
        board: &mut OrderBoard,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<OrderStatus> {
        let api = self.api.clone();
        mutate::toggle_field(board, order_id, status, "order", move |id, value| {
            let api = api.clone();
            async move {
                let path = format!("/owner/orders/{id}/status");
                let resp = api
                    .put(&path, &json!({ "status": value.to_wire() }))
                    .await
                    .map_err(|e| Error::mutation("order", e.to_string()))?;
                // The response may carry the updated record; adopt its status
                // when present, otherwise the request was accepted as-is.
                Ok(resp
                    .get("status")
                    .and_then(Value::as_str)
                    .map(OrderStatus::normalize)
                    .unwrap_or(value))
            }
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Order board
// ---------------------------------------------------------------------------

/// Page-scoped order collection owned by a single active view. The revision
/// counter serves the same purpose as on the station board: a pending
/// optimistic write supersedes interleaved refreshes deterministically.
#[derive(Debug, Default)]
pub struct OrderBoard {
    orders: Vec<Order>,
    revision: u64,
}

impl OrderBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    /// Replace the current page with a freshly fetched one.
    pub fn replace_page(&mut self, orders: Vec<Order>) {
        self.orders = orders;
        self.revision += 1;
    }
}

impl FieldToggle for OrderBoard {
    type Value = OrderStatus;

    fn get_value(&self, id: &str) -> Option<OrderStatus> {
        self.get(id).map(|o| o.status.clone())
    }

    fn set_value(&mut self, id: &str, value: OrderStatus) -> bool {
        match self.orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.status = value;
                self.revision += 1;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, status: &str, created_at: &str) -> Value {
        json!({
            "_id": id,
            "status": status,
            "createdAt": created_at,
            "price_total": 12.0,
            "items": [{ "name": "Dish", "quantity": 1, "station": "Pizza" }]
        })
    }

    #[test]
    fn page_mapping_numbers_by_fetch_position_then_sorts_by_recency() {
        let records = vec![
            record("o1", "pending", "2026-08-01T10:00:00Z"),
            record("o2", "pending", "2026-08-01T12:00:00Z"),
            record("o3", "pending", "2026-08-01T11:00:00Z"),
        ];

        let page = map_order_page(&records, 2, 10);

        // Newest first.
        let ids: Vec<&str> = page.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o2", "o3", "o1"]);

        // Numbers follow the fetch position on page 2, not the sorted order.
        let by_id = |id: &str| page.iter().find(|o| o.id == id).unwrap();
        assert_eq!(by_id("o1").display_number, "ORDER-11");
        assert_eq!(by_id("o2").display_number, "ORDER-12");
        assert_eq!(by_id("o3").display_number, "ORDER-13");
    }

    #[test]
    fn page_mapping_skips_records_without_ids() {
        let records = vec![
            record("o1", "pending", "2026-08-01T10:00:00Z"),
            json!({ "status": "pending" }),
        ];
        assert_eq!(map_order_page(&records, 1, 10).len(), 1);
    }

    #[test]
    fn unparseable_timestamps_sort_last() {
        let records = vec![
            json!({ "_id": "bad", "status": "pending", "createdAt": "not-a-date" }),
            record("o1", "pending", "2026-08-01T10:00:00Z"),
        ];
        let page = map_order_page(&records, 1, 10);
        assert_eq!(page.last().unwrap().id, "bad");
    }

    #[tokio::test]
    async fn fetch_without_store_id_fails_before_any_network_call() {
        let api = ApiClient::new("https://server.eatorder.fr:8000", None).unwrap();
        let repo = OrderRepository::new(api, "  ", 10);

        let err = repo.fetch_page(1).await.expect_err("missing store id");
        assert!(matches!(
            err,
            Error::Config {
                field: "selectedStoreId"
            }
        ));
    }

    #[test]
    fn board_replace_page_bumps_revision() {
        let mut board = OrderBoard::new();
        let rev = board.revision();
        board.replace_page(map_order_page(
            &[record("o1", "pending", "2026-08-01T10:00:00Z")],
            1,
            10,
        ));
        assert_eq!(board.revision(), rev + 1);
        assert_eq!(board.get("o1").unwrap().status, OrderStatus::Pending);
    }
}
