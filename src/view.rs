//! View derivation: filters and pagination.
//!
//! `derive_view` is a pure function from the reconciled order collection and
//! the current filters to the visible slice. `ViewState` carries the filter
//! and page selections for one screen and enforces the page-reset rule when
//! a filter changes.

use serde::Serialize;

use crate::normalize::{station_matches, Order, OrderStatus};

/// The slice of orders a screen renders, plus the pagination facts it needs.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSlice {
    pub visible: Vec<Order>,
    pub total_pages: u32,
    /// The effective page after clamping into `[1, max(total_pages, 1)]`.
    pub page: u32,
}

/// Derive the visible slice for `(station filter, status filter, page)`.
///
/// An order matches a station filter when at least one of its items is for
/// that station, compared case- and whitespace-insensitively. The status
/// filter is an exact match on the normalized status; `None` passes
/// everything. Deterministic: same inputs, same output.
pub fn derive_view(
    orders: &[Order],
    station_filter: Option<&str>,
    status_filter: Option<&OrderStatus>,
    page: u32,
    page_size: u32,
) -> ViewSlice {
    let mut filtered: Vec<&Order> = orders
        .iter()
        .filter(|order| match station_filter {
            Some(station) => order
                .items
                .iter()
                .any(|item| station_matches(&item.station, station)),
            None => true,
        })
        .filter(|order| match status_filter {
            Some(status) => order.status == *status,
            None => true,
        })
        .collect();

    filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let page_size = page_size.max(1);
    let total_pages = (filtered.len() as u32).div_ceil(page_size);
    let page = page.clamp(1, total_pages.max(1));

    let start = ((page - 1) * page_size) as usize;
    let visible = filtered
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();

    ViewSlice {
        visible,
        total_pages,
        page,
    }
}

// ---------------------------------------------------------------------------
// Per-screen view state
// ---------------------------------------------------------------------------

/// Filter and page selections for one screen. Changing either filter resets
/// the page to 1; the page size is fixed at construction.
#[derive(Debug, Clone)]
pub struct ViewState {
    station_filter: Option<String>,
    status_filter: Option<OrderStatus>,
    page: u32,
    page_size: u32,
}

impl ViewState {
    pub fn new(page_size: u32) -> Self {
        Self {
            station_filter: None,
            status_filter: None,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn station_filter(&self) -> Option<&str> {
        self.station_filter.as_deref()
    }

    pub fn status_filter(&self) -> Option<&OrderStatus> {
        self.status_filter.as_ref()
    }

    /// Select a station filter (`None` = All). Resets the page.
    pub fn set_station_filter(&mut self, station: Option<String>) {
        self.station_filter = station;
        self.page = 1;
    }

    /// Select a status filter (`None` = All). Resets the page.
    pub fn set_status_filter(&mut self, status: Option<OrderStatus>) {
        self.status_filter = status;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Derive the visible slice for the current selections. The effective
    /// page is written back so out-of-range selections self-correct.
    pub fn derive(&mut self, orders: &[Order]) -> ViewSlice {
        let slice = derive_view(
            orders,
            self.station_filter.as_deref(),
            self.status_filter.as_ref(),
            self.page,
            self.page_size,
        );
        self.page = slice.page;
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::OrderItem;
    use chrono::{TimeZone, Utc};

    fn order(id: &str, status: OrderStatus, station: &str, minute: u32) -> Order {
        Order {
            id: id.to_string(),
            display_number: String::new(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap(),
            status,
            items: vec![OrderItem {
                name: "Dish".to_string(),
                quantity: 1,
                station: station.to_string(),
            }],
            total_price: 10.0,
            client_name: String::new(),
        }
    }

    /// 25 orders, o1 newest .. o25 oldest, first 18 Pending, rest Missed.
    fn fixture() -> Vec<Order> {
        (1..=25)
            .map(|n| {
                let status = if n <= 18 {
                    OrderStatus::Pending
                } else {
                    OrderStatus::Missed
                };
                order(&format!("o{n}"), status, "Pizza", 59 - n as u32)
            })
            .collect()
    }

    #[test]
    fn pagination_is_deterministic() {
        let orders = fixture();

        let slice = derive_view(&orders, None, Some(&OrderStatus::Pending), 2, 10);

        // 18 pending orders: ceil(18/10) = 2 pages, page 2 holds o11..o18.
        assert_eq!(slice.total_pages, 2);
        assert_eq!(slice.page, 2);
        let ids: Vec<&str> = slice.visible.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o11", "o12", "o13", "o14", "o15", "o16", "o17", "o18"]);
    }

    #[test]
    fn station_filter_matches_items_case_insensitively() {
        let mut orders = fixture();
        orders.push(order("grill", OrderStatus::Pending, "Grill", 0));

        let slice = derive_view(&orders, Some(" pizza "), None, 1, 50);
        assert!(slice.visible.iter().all(|o| o.id != "grill"));
        assert_eq!(slice.visible.len(), 25);

        // The legacy screens pass the display label through as the filter.
        let slice = derive_view(&orders, Some("Chef de Grill"), None, 1, 50);
        assert_eq!(slice.visible.len(), 1);
        assert_eq!(slice.visible[0].id, "grill");
    }

    #[test]
    fn unknown_status_never_matches_a_closed_filter() {
        let orders = vec![
            order("o1", OrderStatus::Unknown("Preparing".into()), "Pizza", 1),
            order("o2", OrderStatus::Ready, "Pizza", 2),
        ];

        let slice = derive_view(&orders, None, Some(&OrderStatus::Ready), 1, 10);
        assert_eq!(slice.visible.len(), 1);
        assert_eq!(slice.visible[0].id, "o2");
    }

    #[test]
    fn out_of_range_page_is_clamped() {
        let orders = fixture();

        let slice = derive_view(&orders, None, None, 99, 10);
        assert_eq!(slice.total_pages, 3);
        assert_eq!(slice.page, 3);
        assert_eq!(slice.visible.len(), 5);

        // An empty result set still reports page 1 of max(0, 1).
        let slice = derive_view(&[], None, None, 7, 10);
        assert_eq!(slice.total_pages, 0);
        assert_eq!(slice.page, 1);
        assert!(slice.visible.is_empty());
    }

    #[test]
    fn changing_a_filter_resets_the_page() {
        let orders = fixture();
        let mut state = ViewState::new(10);

        state.set_page(3);
        state.derive(&orders);
        assert_eq!(state.page(), 3);

        state.set_status_filter(Some(OrderStatus::Ready));
        assert_eq!(state.page(), 1, "status filter change resets the page");

        state.set_page(2);
        state.set_station_filter(Some("Pizza".to_string()));
        assert_eq!(state.page(), 1, "station filter change resets the page");
    }

    #[test]
    fn derive_writes_back_the_effective_page() {
        let orders = fixture();
        let mut state = ViewState::new(10);
        state.set_page(50);

        let slice = state.derive(&orders);
        assert_eq!(slice.page, 3);
        assert_eq!(state.page(), 3);
    }
}
