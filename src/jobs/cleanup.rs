use sqlx::PgPool;

use crate::models::{Ticket, VerificationCode};

#[derive(Debug, Default)]
pub struct CleanupStats {
    pub codes_deleted: u64,
    pub tickets_expired: u64,
    pub errors: usize,
}

/// Background sweep over time-limited records
///
/// 1. Deletes verification codes past their expiry
/// 2. Marks ISSUED tickets EXPIRED once their deal has ended
///
/// A failing step is logged and counted; the other step still runs.
pub async fn run_cleanup(pool: &PgPool) -> CleanupStats {
    let mut stats = CleanupStats::default();

    match VerificationCode::delete_expired(pool).await {
        Ok(deleted) => stats.codes_deleted = deleted,
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete expired verification codes");
            stats.errors += 1;
        }
    }

    match Ticket::expire_for_ended_deals(pool).await {
        Ok(expired) => stats.tickets_expired = expired,
        Err(e) => {
            tracing::error!(error = %e, "Failed to expire tickets of ended deals");
            stats.errors += 1;
        }
    }

    tracing::info!(?stats, "Cleanup job completed");
    stats
}
