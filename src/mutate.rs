//! Optimistic mutation controller.
//!
//! Every toggle follows the same contract: capture the pre-mutation value,
//! apply the new value locally, issue the write-through call, then either
//! adopt the server's authoritative value or restore the captured snapshot
//! verbatim. Boards that also receive live events record the resolution
//! instant through [`FieldToggle::note_write_resolved`] so events that
//! arrived while the write was in flight can be recognized as superseded.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::normalize::Category;

/// A collection with one mutable field addressable by entity id. Each board
/// implements this for the field its screens toggle (station pause, product
/// availability, order status).
pub trait FieldToggle {
    type Value: Clone + PartialEq;

    fn get_value(&self, id: &str) -> Option<Self::Value>;

    /// Apply `value` to the entity. Returns false when the id is unknown.
    fn set_value(&mut self, id: &str, value: Self::Value) -> bool;

    /// Called once the write for `id` has resolved (adopted or rolled back).
    /// Boards fed by a live feed record the instant so events received
    /// before it can be dropped as superseded. Default: no-op.
    fn note_write_resolved(&mut self, _id: &str) {}
}

/// Toggle a field optimistically.
///
/// `write_through` receives the entity id and the requested value and must
/// return the server's authoritative value, which may differ from the
/// request (server-side business rules). The local field always ends at the
/// server's value on success and at the pre-mutation snapshot on failure;
/// there is no automatic retry.
pub async fn toggle_field<B, F, Fut>(
    board: &mut B,
    id: &str,
    new_value: B::Value,
    entity: &'static str,
    write_through: F,
) -> Result<B::Value>
where
    B: FieldToggle,
    F: FnOnce(String, B::Value) -> Fut,
    Fut: Future<Output = Result<B::Value>>,
{
    let snapshot = board
        .get_value(id)
        .ok_or_else(|| Error::mutation(entity, format!("unknown id {id}")))?;

    if snapshot == new_value {
        debug!(entity, id, "field already at requested value");
        return Ok(snapshot);
    }

    board.set_value(id, new_value.clone());

    match write_through(id.to_string(), new_value).await {
        Ok(server_value) => {
            // The server's value wins, even over the optimistic guess.
            board.set_value(id, server_value.clone());
            board.note_write_resolved(id);
            Ok(server_value)
        }
        Err(e) => {
            warn!(entity, id, error = %e, "write-through failed, rolling back");
            board.set_value(id, snapshot);
            board.note_write_resolved(id);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Exclusive activation
// ---------------------------------------------------------------------------

/// Activate one category and deactivate its siblings (at most one category
/// may be active at a time).
///
/// The whole group is mutated locally up front, then one write-through call
/// is issued per changed entity. Any failure restores the entire group to
/// its pre-mutation snapshot: the group either fully transitions or is left
/// exactly as it started.
pub async fn activate_exclusive<F, Fut>(
    categories: &mut Vec<Category>,
    id: &str,
    write_through: F,
) -> Result<()>
where
    F: Fn(String, bool) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if !categories.iter().any(|c| c.id == id) {
        return Err(Error::mutation("category", format!("unknown id {id}")));
    }

    let snapshot = categories.clone();

    // Ids whose active flag actually changes; untouched siblings get no call.
    let affected: Vec<(String, bool)> = categories
        .iter()
        .filter(|c| c.is_active != (c.id == id))
        .map(|c| (c.id.clone(), c.id == id))
        .collect();

    if affected.is_empty() {
        debug!(id, "category already exclusively active");
        return Ok(());
    }

    for category in categories.iter_mut() {
        category.is_active = category.id == id;
    }

    for (entity_id, active) in &affected {
        if let Err(e) = write_through(entity_id.clone(), *active).await {
            warn!(
                category = %entity_id,
                error = %e,
                "exclusive activation failed, rolling back the group"
            );
            *categories = snapshot;
            return Err(e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::normalize::Category;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Minimal board for controller tests: named boolean flags.
    struct FlagBoard(Vec<(String, bool)>);

    impl FieldToggle for FlagBoard {
        type Value = bool;

        fn get_value(&self, id: &str) -> Option<bool> {
            self.0.iter().find(|(i, _)| i == id).map(|(_, v)| *v)
        }

        fn set_value(&mut self, id: &str, value: bool) -> bool {
            match self.0.iter_mut().find(|(i, _)| i == id) {
                Some((_, v)) => {
                    *v = value;
                    true
                }
                None => false,
            }
        }
    }

    fn category(id: &str, active: bool) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            is_active: active,
            assigned_station_id: None,
        }
    }

    #[tokio::test]
    async fn successful_toggle_adopts_server_value() {
        let mut board = FlagBoard(vec![("s1".to_string(), false)]);

        // Server rejects the pause and answers with the authoritative false.
        let value = toggle_field(&mut board, "s1", true, "station", |_, _| async {
            Ok(false)
        })
        .await
        .expect("write-through succeeds");

        assert!(!value);
        assert_eq!(board.get_value("s1"), Some(false));
    }

    #[tokio::test]
    async fn failed_toggle_restores_the_snapshot() {
        let mut board = FlagBoard(vec![("s1".to_string(), false)]);

        let err = toggle_field(&mut board, "s1", true, "station", |_, _| async {
            Err(Error::mutation("station", "HTTP 500"))
        })
        .await
        .expect_err("write-through fails");

        assert!(matches!(err, Error::Mutation { .. }));
        assert_eq!(
            board.get_value("s1"),
            Some(false),
            "final value must equal the pre-mutation value, not the guess"
        );
    }

    #[tokio::test]
    async fn toggle_for_unknown_id_never_calls_through() {
        let mut board = FlagBoard(vec![]);
        let calls = AtomicUsize::new(0);

        let result = toggle_field(&mut board, "ghost", true, "station", |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn noop_toggle_skips_the_network() {
        let mut board = FlagBoard(vec![("s1".to_string(), true)]);
        let calls = AtomicUsize::new(0);

        let value = toggle_field(&mut board, "s1", true, "station", |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        })
        .await
        .expect("noop succeeds");

        assert!(value);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exclusive_activation_flips_the_group() {
        let mut categories = vec![category("a", false), category("b", true)];

        activate_exclusive(&mut categories, "a", |_, _| async { Ok(()) })
            .await
            .expect("activation succeeds");

        assert!(categories[0].is_active);
        assert!(!categories[1].is_active);
    }

    #[tokio::test]
    async fn exclusive_activation_rolls_back_the_whole_group() {
        let mut categories = vec![category("a", false), category("b", true)];
        let snapshot = categories.clone();
        let calls = AtomicUsize::new(0);

        // First sibling write succeeds, second fails.
        let err = activate_exclusive(&mut categories, "a", |_, _| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Ok(())
                } else {
                    Err(Error::mutation("category", "HTTP 500"))
                }
            }
        })
        .await
        .expect_err("second sibling write fails");

        assert!(matches!(err, Error::Mutation { .. }));
        assert_eq!(
            categories, snapshot,
            "group must be restored to its pre-mutation state"
        );
    }

    #[tokio::test]
    async fn exclusive_activation_only_writes_changed_siblings() {
        // "c" is already inactive and must not receive a call.
        let mut categories = vec![category("a", false), category("b", true), category("c", false)];
        let calls = AtomicUsize::new(0);

        activate_exclusive(&mut categories, "a", |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .expect("activation succeeds");

        assert_eq!(calls.load(Ordering::SeqCst), 2, "only a and b change");
    }

    #[tokio::test]
    async fn exclusive_activation_of_sole_active_is_a_noop() {
        let mut categories = vec![category("a", true), category("b", false)];
        let calls = AtomicUsize::new(0);

        activate_exclusive(&mut categories, "a", |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .expect("noop succeeds");

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
