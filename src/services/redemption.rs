use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ticket::TicketDetails;
use crate::models::{Ticket, TicketStatus};

/// ISSUED or EXPIRED → REDEEMED. A ticket is redeemed at most once and its
/// `used_at` is never rewritten.
#[tracing::instrument(skip(pool))]
pub async fn redeem(pool: &PgPool, ticket_id: Uuid) -> Result<Ticket, AppError> {
    if let Some(ticket) = Ticket::redeem_unless_redeemed(pool, ticket_id).await? {
        tracing::info!(ticket_id = %ticket.id, deal_id = %ticket.deal_id, "Ticket redeemed");
        return Ok(ticket);
    }

    match Ticket::find_by_id(pool, ticket_id).await? {
        None => Err(AppError::not_found("Ticket")),
        Some(_) => Err(AppError::Conflict("Ticket already redeemed".to_string())),
    }
}

/// Any status → EXPIRED, clearing `used_at`.
#[tracing::instrument(skip(pool))]
pub async fn void(pool: &PgPool, ticket_id: Uuid) -> Result<Ticket, AppError> {
    let previous = Ticket::find_by_id(pool, ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;

    if previous.status != TicketStatus::Issued {
        tracing::warn!(
            ticket_id = %ticket_id,
            previous_status = ?previous.status,
            "Voiding a ticket that was not ISSUED"
        );
    }

    let ticket = Ticket::void(pool, ticket_id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;

    tracing::info!(ticket_id = %ticket.id, "Ticket voided");
    Ok(ticket)
}

/// Loads a ticket only if it belongs to one of the business's deals.
/// Tickets of other businesses are reported as missing.
pub async fn owned_ticket(
    pool: &PgPool,
    business_id: Uuid,
    ticket_id: Uuid,
) -> Result<TicketDetails, AppError> {
    Ticket::find_details(pool, ticket_id)
        .await?
        .filter(|details| details.business_id == business_id)
        .ok_or_else(|| AppError::not_found("Ticket"))
}

pub async fn owned_ticket_by_code(
    pool: &PgPool,
    business_id: Uuid,
    code: &str,
) -> Result<TicketDetails, AppError> {
    Ticket::find_details_by_code(pool, &code.trim().to_uppercase())
        .await?
        .filter(|details| details.business_id == business_id)
        .ok_or_else(|| AppError::not_found("Ticket"))
}

pub async fn redeem_for_business(
    pool: &PgPool,
    business_id: Uuid,
    ticket_id: Uuid,
) -> Result<Ticket, AppError> {
    owned_ticket(pool, business_id, ticket_id).await?;
    redeem(pool, ticket_id).await
}

pub async fn void_for_business(
    pool: &PgPool,
    business_id: Uuid,
    ticket_id: Uuid,
) -> Result<Ticket, AppError> {
    owned_ticket(pool, business_id, ticket_id).await?;
    void(pool, ticket_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::seed_live_deal;
    use crate::services::voucher::issue_or_retrieve;

    async fn issued_ticket(pool: &PgPool) -> Ticket {
        let (user_id, deal_id) = seed_live_deal(pool).await;
        let claim = issue_or_retrieve(pool, user_id, deal_id).await.unwrap();
        Ticket::find_details_by_code(pool, &claim.voucher.code)
            .await
            .unwrap()
            .unwrap()
            .ticket
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_redeem_twice_conflicts_and_keeps_used_at(pool: PgPool) {
        let ticket = issued_ticket(&pool).await;

        let redeemed = redeem(&pool, ticket.id).await.unwrap();
        assert_eq!(redeemed.status, TicketStatus::Redeemed);
        let used_at = redeemed.used_at.unwrap();

        let again = redeem(&pool, ticket.id).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let reloaded = Ticket::find_by_id(&pool, ticket.id).await.unwrap().unwrap();
        assert_eq!(reloaded.used_at, Some(used_at));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_void_clears_used_at(pool: PgPool) {
        let ticket = issued_ticket(&pool).await;
        redeem(&pool, ticket.id).await.unwrap();

        let voided = void(&pool, ticket.id).await.unwrap();
        assert_eq!(voided.status, TicketStatus::Expired);
        assert!(voided.used_at.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_missing_ticket(pool: PgPool) {
        assert!(matches!(
            redeem(&pool, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            void(&pool, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_other_business_cannot_redeem(pool: PgPool) {
        let ticket = issued_ticket(&pool).await;
        let result = redeem_for_business(&pool, Uuid::new_v4(), ticket.id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
