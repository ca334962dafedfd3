use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::business::BusinessTransition;
use crate::models::deal::DealTransition;
use crate::models::{Business, BusinessStatus, Deal, DealStatus};

pub const MAX_PRIORITY: i32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationAction {
    Approve,
    Reject,
    Ban,
    Suspend,
    Delete,
}

/// What a moderation action does to a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan<T> {
    Transition(T),
    Delete,
}

#[derive(Debug)]
pub enum Outcome<T> {
    Updated(T),
    Deleted,
}

fn required_reason(reason: Option<&str>) -> Result<String, AppError> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation("A rejection reason is required"))
}

pub fn plan_business(
    action: ModerationAction,
    reason: Option<&str>,
) -> Result<Plan<BusinessTransition>, AppError> {
    let transition = match action {
        ModerationAction::Delete => return Ok(Plan::Delete),
        ModerationAction::Approve => BusinessTransition {
            status: BusinessStatus::Active,
            is_verified: Some(true),
            rejection_reason: None,
        },
        ModerationAction::Reject => BusinessTransition {
            status: BusinessStatus::Rejected,
            is_verified: None,
            rejection_reason: Some(required_reason(reason)?),
        },
        ModerationAction::Ban => BusinessTransition {
            status: BusinessStatus::Banned,
            is_verified: None,
            rejection_reason: None,
        },
        ModerationAction::Suspend => BusinessTransition {
            status: BusinessStatus::Suspended,
            is_verified: None,
            rejection_reason: None,
        },
    };

    Ok(Plan::Transition(transition))
}

pub fn plan_deal(
    action: ModerationAction,
    reason: Option<&str>,
) -> Result<Plan<DealTransition>, AppError> {
    let transition = match action {
        ModerationAction::Delete => return Ok(Plan::Delete),
        ModerationAction::Approve => DealTransition {
            status: DealStatus::Approved,
            rejection_reason: None,
            priority_score: None,
        },
        ModerationAction::Reject => DealTransition {
            status: DealStatus::Rejected,
            rejection_reason: Some(required_reason(reason)?),
            priority_score: Some(0),
        },
        ModerationAction::Ban | ModerationAction::Suspend => {
            return Err(AppError::validation(format!(
                "{:?} is not a valid action for a deal",
                action
            )))
        }
    };

    Ok(Plan::Transition(transition))
}

pub fn validate_priority(score: i32) -> Result<i32, AppError> {
    if (0..=MAX_PRIORITY).contains(&score) {
        Ok(score)
    } else {
        Err(AppError::validation(format!(
            "Priority must be between 0 and {}",
            MAX_PRIORITY
        )))
    }
}

#[tracing::instrument(skip(pool, reason))]
pub async fn moderate_business(
    pool: &PgPool,
    id: Uuid,
    action: ModerationAction,
    reason: Option<&str>,
) -> Result<Outcome<Business>, AppError> {
    match plan_business(action, reason)? {
        Plan::Delete => {
            if !Business::delete(pool, id).await? {
                return Err(AppError::not_found("Business"));
            }
            tracing::info!(business_id = %id, "Business deleted");
            Ok(Outcome::Deleted)
        }
        Plan::Transition(transition) => {
            let business = Business::apply_transition(pool, id, &transition)
                .await?
                .ok_or_else(|| AppError::not_found("Business"))?;
            tracing::info!(business_id = %id, status = ?business.status, "Business moderated");
            Ok(Outcome::Updated(business))
        }
    }
}

#[tracing::instrument(skip(pool, reason))]
pub async fn moderate_deal(
    pool: &PgPool,
    id: Uuid,
    action: ModerationAction,
    reason: Option<&str>,
) -> Result<Outcome<Deal>, AppError> {
    match plan_deal(action, reason)? {
        Plan::Delete => {
            if !Deal::delete(pool, id).await? {
                return Err(AppError::not_found("Deal"));
            }
            tracing::info!(deal_id = %id, "Deal deleted");
            Ok(Outcome::Deleted)
        }
        Plan::Transition(transition) => {
            let deal = Deal::apply_transition(pool, id, &transition)
                .await?
                .ok_or_else(|| AppError::not_found("Deal"))?;
            tracing::info!(deal_id = %id, status = ?deal.status, "Deal moderated");
            Ok(Outcome::Updated(deal))
        }
    }
}

pub async fn bulk_approve_businesses(pool: &PgPool, ids: &[Uuid]) -> Result<u64, AppError> {
    if ids.is_empty() {
        return Err(AppError::validation("No businesses selected"));
    }

    let approved = Business::bulk_approve(pool, ids).await?;
    tracing::info!(requested = ids.len(), approved, "Bulk approved businesses");
    Ok(approved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_business_verifies_and_clears_reason() {
        let plan = plan_business(ModerationAction::Approve, Some("ignored")).unwrap();
        assert_eq!(
            plan,
            Plan::Transition(BusinessTransition {
                status: BusinessStatus::Active,
                is_verified: Some(true),
                rejection_reason: None,
            })
        );
    }

    #[test]
    fn test_reject_business_requires_reason() {
        assert!(matches!(
            plan_business(ModerationAction::Reject, None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            plan_business(ModerationAction::Reject, Some("   ")),
            Err(AppError::Validation(_))
        ));

        let Plan::Transition(t) = plan_business(ModerationAction::Reject, Some(" no license ")).unwrap() else {
            panic!("expected a transition");
        };
        assert_eq!(t.status, BusinessStatus::Rejected);
        assert_eq!(t.rejection_reason.as_deref(), Some("no license"));
    }

    #[test]
    fn test_ban_and_suspend_business() {
        let Plan::Transition(ban) = plan_business(ModerationAction::Ban, Some("spam")).unwrap() else {
            panic!("expected a transition");
        };
        assert_eq!(ban.status, BusinessStatus::Banned);
        assert!(ban.rejection_reason.is_none());

        let Plan::Transition(suspend) = plan_business(ModerationAction::Suspend, None).unwrap() else {
            panic!("expected a transition");
        };
        assert_eq!(suspend.status, BusinessStatus::Suspended);
    }

    #[test]
    fn test_delete_short_circuits() {
        assert_eq!(plan_business(ModerationAction::Delete, None).unwrap(), Plan::Delete);
        assert_eq!(plan_deal(ModerationAction::Delete, None).unwrap(), Plan::Delete);
    }

    #[test]
    fn test_reject_deal_resets_priority() {
        let plan = plan_deal(ModerationAction::Reject, Some("out of stock")).unwrap();
        assert_eq!(
            plan,
            Plan::Transition(DealTransition {
                status: DealStatus::Rejected,
                rejection_reason: Some("out of stock".to_string()),
                priority_score: Some(0),
            })
        );
    }

    #[test]
    fn test_approve_deal_clears_reason() {
        let Plan::Transition(t) = plan_deal(ModerationAction::Approve, None).unwrap() else {
            panic!("expected a transition");
        };
        assert_eq!(t.status, DealStatus::Approved);
        assert!(t.rejection_reason.is_none());
        assert!(t.priority_score.is_none());
    }

    #[test]
    fn test_ban_is_invalid_for_deals() {
        assert!(matches!(
            plan_deal(ModerationAction::Ban, None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            plan_deal(ModerationAction::Suspend, None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_action_wire_format() {
        let action: ModerationAction = serde_json::from_str("\"APPROVE\"").unwrap();
        assert_eq!(action, ModerationAction::Approve);
        assert!(serde_json::from_str::<ModerationAction>("\"approve\"").is_err());
    }

    #[test]
    fn test_priority_bounds() {
        assert_eq!(validate_priority(0).unwrap(), 0);
        assert_eq!(validate_priority(1000).unwrap(), 1000);
        assert!(validate_priority(-1).is_err());
        assert!(validate_priority(1001).is_err());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_reject_then_approve_deal(pool: PgPool) {
        let (_, deal_id) = crate::services::testing::seed_live_deal(&pool).await;
        Deal::set_priority(&pool, deal_id, 500).await.unwrap();

        let Outcome::Updated(rejected) =
            moderate_deal(&pool, deal_id, ModerationAction::Reject, Some("out of stock"))
                .await
                .unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(rejected.status, DealStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("out of stock"));
        assert_eq!(rejected.priority_score, 0);

        let Outcome::Updated(approved) = moderate_deal(&pool, deal_id, ModerationAction::Approve, None)
            .await
            .unwrap()
        else {
            panic!("expected update");
        };
        assert!(approved.rejection_reason.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_approve_business(pool: PgPool) {
        let business = crate::services::testing::seed_business(&pool, BusinessStatus::Rejected).await;

        let Outcome::Updated(approved) =
            moderate_business(&pool, business.id, ModerationAction::Approve, None)
                .await
                .unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(approved.status, BusinessStatus::Active);
        assert!(approved.is_verified);
        assert!(approved.rejection_reason.is_none());
    }
}
