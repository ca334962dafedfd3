use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{is_foreign_key_violation, AppError};
use crate::models::deal::{DealCounter, DealListing};
use crate::models::saved_deal::ToggleRow;
use crate::models::{Deal, SavedDeal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub saved: bool,
    pub state: &'static str,
}

impl From<ToggleRow> for ToggleOutcome {
    /// A toggle that neither removed nor inserted lost an insert race to a
    /// concurrent toggle, so the deal is saved.
    fn from(row: ToggleRow) -> Self {
        let saved = !row.removed;
        Self {
            saved,
            state: if saved { "saved" } else { "removed" },
        }
    }
}

#[tracing::instrument(skip(pool))]
pub async fn toggle_save(
    pool: &PgPool,
    user_id: Uuid,
    deal_id: Uuid,
) -> Result<ToggleOutcome, AppError> {
    match SavedDeal::toggle(pool, user_id, deal_id).await {
        Ok(row) => Ok(row.into()),
        Err(e) if is_foreign_key_violation(&e) => Err(AppError::not_found("Deal")),
        Err(e) => Err(e.into()),
    }
}

pub async fn saved_deals(pool: &PgPool, user_id: Uuid) -> Result<Vec<DealListing>, AppError> {
    Ok(SavedDeal::list_deals(pool, user_id).await?)
}

/// Counts a view or click. Tracking never fails the request: errors are
/// logged and swallowed.
pub async fn track(pool: &PgPool, deal_id: Uuid, counter: DealCounter) {
    match Deal::increment_counter(pool, deal_id, counter, 1).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(deal_id = %deal_id, ?counter, "Tracked deal does not exist"),
        Err(e) => tracing::warn!(deal_id = %deal_id, ?counter, error = %e, "Failed to track deal event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::unreachable_pool;

    #[test]
    fn test_toggle_outcomes() {
        let removed = ToggleOutcome::from(ToggleRow { removed: true, inserted: false });
        assert_eq!(removed, ToggleOutcome { saved: false, state: "removed" });

        let inserted = ToggleOutcome::from(ToggleRow { removed: false, inserted: true });
        assert_eq!(inserted, ToggleOutcome { saved: true, state: "saved" });

        let raced = ToggleOutcome::from(ToggleRow { removed: false, inserted: false });
        assert_eq!(raced, ToggleOutcome { saved: true, state: "saved" });
    }

    #[tokio::test]
    async fn test_tracking_swallows_database_errors() {
        track(&unreachable_pool(), Uuid::new_v4(), DealCounter::Views).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_toggle_parity(pool: PgPool) {
        let (user_id, deal_id) = crate::services::testing::seed_live_deal(&pool).await;

        for n in 1..=5 {
            let outcome = toggle_save(&pool, user_id, deal_id).await.unwrap();
            assert_eq!(outcome.saved, n % 2 == 1);
            assert_eq!(
                SavedDeal::exists(&pool, user_id, deal_id).await.unwrap(),
                n % 2 == 1
            );
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_clicks_are_all_counted(pool: PgPool) {
        let (_, deal_id) = crate::services::testing::seed_live_deal(&pool).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { track(&pool, deal_id, DealCounter::Clicks).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let deal = Deal::find_by_id(&pool, deal_id).await.unwrap().unwrap();
        assert_eq!(deal.clicks, 25);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_toggle_unknown_deal(pool: PgPool) {
        let (user_id, _) = crate::services::testing::seed_live_deal(&pool).await;
        let result = toggle_save(&pool, user_id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
