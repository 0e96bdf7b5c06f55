//! EatOrder KDS sync core.
//!
//! Client-side model shared by the kitchen-display screens: a paginated
//! order repository, a live-event reconciler for station pushes, an
//! optimistic mutation controller with snapshot rollback, and a pure view
//! filter/pagination engine. The REST API and the push transport are
//! external collaborators; this crate consumes them and owns nothing but
//! in-memory state plus three persisted session strings.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod live;
pub mod mutate;
pub mod normalize;
pub mod orders;
pub mod reconcile;
pub mod session;
pub mod stations;
pub mod view;

pub use error::{Error, Result};
pub use normalize::{Category, Order, OrderItem, OrderStatus, Product, Station};

/// Initialize structured logging for the embedding app. `RUST_LOG` overrides
/// the default filter. Safe to call once per process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,eatorder_kds=debug"));

    let console_layer = fmt::layer().with_target(true);
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}
