//! Manager authentication.
//!
//! Logs the account in against `POST /manager/login-`, validates that the
//! selected store belongs to the account, and persists the session strings
//! through the injected provider. The core never refreshes a token; a 401
//! anywhere surfaces as a `Fetch` error and the caller re-authenticates.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::normalize::entity_id;
use crate::session::SessionStore;

/// What a successful login yields; the same strings are persisted in the
/// session provider.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub role: String,
    pub store_id: String,
}

/// Authenticate and persist the session.
///
/// Validation failures are `Config` errors raised before any network call.
/// Persistence failures are logged but do not fail the login; the session
/// simply will not survive a restart.
pub async fn login(
    server_url: &str,
    email: &str,
    password: &str,
    selected_store_id: &str,
    session: &dyn SessionStore,
) -> Result<LoginOutcome> {
    if email.trim().is_empty() {
        return Err(Error::Config { field: "email" });
    }
    if password.is_empty() {
        return Err(Error::Config { field: "password" });
    }
    if selected_store_id.trim().is_empty() {
        return Err(Error::Config {
            field: "selectedStoreId",
        });
    }

    let api = ApiClient::new(server_url, None)?;
    let resp = api
        .post(
            "/manager/login-",
            &json!({ "email": email.trim(), "password": password }),
        )
        .await?;

    let outcome = parse_login_response(&resp, selected_store_id)?;

    if let Err(e) = session.store_session(&outcome.token, &outcome.role, &outcome.store_id) {
        warn!(error = %e, "failed to persist session, continuing in-memory");
    }
    info!(role = %outcome.role, store_id = %outcome.store_id, "login succeeded");
    Ok(outcome)
}

/// Extract token/role from the login response and check the selected store
/// against the account's store list when the server provides one.
fn parse_login_response(resp: &Value, selected_store_id: &str) -> Result<LoginOutcome> {
    let token = resp
        .get("token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::fetch(None, "Login response missing token"))?;

    let role = resp
        .get("role")
        .or_else(|| resp.get("user").and_then(|u| u.get("role")))
        .and_then(Value::as_str)
        .unwrap_or("staff");

    if let Some(stores) = resp.get("stores").and_then(Value::as_array) {
        let allowed = stores
            .iter()
            .filter_map(entity_id)
            .any(|id| id == selected_store_id);
        if !allowed {
            return Err(Error::fetch(
                None,
                "Selected store is not available for this account",
            ));
        }
    }

    Ok(LoginOutcome {
        token: token.to_string(),
        role: role.to_string(),
        store_id: selected_store_id.to_string(),
    })
}

/// Clear the persisted session. The caller redirects to the login screen.
pub fn logout(session: &dyn SessionStore) {
    session.clear_session();
    info!("session cleared");
}
