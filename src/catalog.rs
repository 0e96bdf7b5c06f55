//! Menu catalog: categories and products.
//!
//! Exists mostly to exercise the generic mutation controller beyond
//! stations: product availability is a plain boolean toggle, category
//! activation is the exclusive-activation group mutation, and station
//! assignment is a snapshot/rollback field write.

use serde_json::{json, Value};
use tracing::warn;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::mutate::{self, FieldToggle};
use crate::normalize::{normalize_category, normalize_product, Category, Product};

/// In-memory menu collections for a single active view.
#[derive(Debug, Default)]
pub struct MenuBoard {
    categories: Vec<Category>,
    products: Vec<Product>,
    revision: u64,
}

impl MenuBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn replace_all(&mut self, categories: Vec<Category>, products: Vec<Product>) {
        self.categories = categories;
        self.products = products;
        self.revision += 1;
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    fn categories_mut(&mut self) -> &mut Vec<Category> {
        self.revision += 1;
        &mut self.categories
    }
}

impl FieldToggle for MenuBoard {
    type Value = bool;

    fn get_value(&self, id: &str) -> Option<bool> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.is_available)
    }

    fn set_value(&mut self, id: &str, value: bool) -> bool {
        match self.products.iter_mut().find(|p| p.id == id) {
            Some(product) => {
                product.is_available = value;
                self.revision += 1;
                true
            }
            None => false,
        }
    }
}

/// Menu operations for one store.
pub struct CatalogService {
    api: ApiClient,
    store_id: String,
}

impl CatalogService {
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

    /// Fetch the store menu. The server spells the category collection both
    /// `categories` and `categorys` depending on the endpoint version.
    pub async fn fetch_menu(&self) -> Result<(Vec<Category>, Vec<Product>)> {
        let store_id = self.require_store()?;
        let resp = self
            .api
            .get(&format!("/client/getMenuByStore/{store_id}"))
            .await?;

        let categories = crate::normalize::unwrap_collection(&resp, &["categories", "categorys"])
            .map(|records| records.iter().filter_map(normalize_category).collect())
            .unwrap_or_else(|| {
                warn!("menu response has no category collection");
                Vec::new()
            });
        let products = resp
            .get("products")
            .and_then(Value::as_array)
            .map(|records| records.iter().filter_map(normalize_product).collect())
            .unwrap_or_default();

        Ok((categories, products))
    }

    /// Toggle a product's availability through the optimistic controller.
    pub async fn set_product_availability(
        &self,
        board: &mut MenuBoard,
        product_id: &str,
        available: bool,
    ) -> Result<bool> {
        let api = self.api.clone();
        mutate::toggle_field(board, product_id, available, "product", move |id, value| {
            let api = api.clone();
            async move {
                let resp = api
                    .put(
                        &format!("/owner/products/{id}/toggle-availability"),
                        &json!({ "isAvailable": value }),
                    )
                    .await
                    .map_err(|e| Error::mutation("product", e.to_string()))?;
                Ok(resp
                    .get("isAvailable")
                    .or_else(|| resp.get("is_available"))
                    .and_then(Value::as_bool)
                    .unwrap_or(value))
            }
        })
        .await
    }

    /// Activate one category; its siblings are deactivated as a group. One
    /// `PATCH` per changed category, all-or-nothing on failure.
    pub async fn activate_category(&self, board: &mut MenuBoard, category_id: &str) -> Result<()> {
        let store_id = self.require_store()?.to_string();
        let api = self.api.clone();

        mutate::activate_exclusive(board.categories_mut(), category_id, move |id, active| {
            let api = api.clone();
            let store_id = store_id.clone();
            async move {
                api.patch(
                    &format!("/client/getMenuByStore/{store_id}/updateCategory/{id}"),
                    &json!({ "isActive": active }),
                )
                .await
                .map_err(|e| Error::mutation("category", e.to_string()))?;
                Ok(())
            }
        })
        .await
    }

    /// Assign a station to a category, optimistically.
    pub async fn assign_station(
        &self,
        board: &mut MenuBoard,
        category_id: &str,
        station_id: Option<String>,
    ) -> Result<()> {
        let snapshot = board
            .category(category_id)
            .map(|c| c.assigned_station_id.clone())
            .ok_or_else(|| Error::mutation("category", format!("unknown id {category_id}")))?;

        set_assignment(board.categories_mut(), category_id, station_id.clone());

        let body = json!({ "stationId": station_id });
        match self
            .api
            .patch(&format!("/client/getMenuByStore/{category_id}/assign-station"), &body)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                set_assignment(board.categories_mut(), category_id, snapshot);
                Err(Error::mutation("category", e.to_string()))
            }
        }
    }
}

fn set_assignment(categories: &mut [Category], id: &str, station_id: Option<String>) {
    if let Some(category) = categories.iter_mut().find(|c| c.id == id) {
        category.assigned_station_id = station_id;
    }
}
