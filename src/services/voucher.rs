use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{is_unique_violation, AppError};
use crate::models::{Deal, User, Voucher};

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Result of a claim: the student's voucher, and whether this call created it.
#[derive(Debug, Clone)]
pub struct Claim {
    pub voucher: Voucher,
    pub newly_issued: bool,
}

pub fn random_suffix<R: Rng>(rng: &mut R) -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// `{user prefix}{deal prefix}-{suffix}`, where each prefix is the first four
/// hex digits of the id.
pub fn format_code(user_id: Uuid, deal_id: Uuid, suffix: &str) -> String {
    let user = user_id.simple().to_string();
    let deal = deal_id.simple().to_string();
    format!("{}{}-{}", &user[..4], &deal[..4], suffix).to_uppercase()
}

/// A student may claim once their email is verified and they are not banned.
pub fn ensure_can_claim(user: &User) -> Result<(), AppError> {
    if user.is_banned {
        return Err(AppError::Forbidden("Account is banned".to_string()));
    }
    if !user.is_verified {
        return Err(AppError::Forbidden(
            "Verify your email before claiming deals".to_string(),
        ));
    }
    Ok(())
}

/// Returns the student's voucher for the deal, issuing one the first time.
///
/// Concurrent claims for the same pair converge on one voucher: the insert
/// skips on conflict and the loser re-reads the winner's row.
#[tracing::instrument(skip(pool))]
pub async fn issue_or_retrieve(
    pool: &PgPool,
    user_id: Uuid,
    deal_id: Uuid,
) -> Result<Claim, AppError> {
    if let Some(voucher) = Voucher::find_by_pair(pool, user_id, deal_id).await? {
        return Ok(Claim {
            voucher,
            newly_issued: false,
        });
    }

    if Deal::find_live(pool, deal_id).await?.is_none() {
        return Err(AppError::not_found("Deal"));
    }

    let code = format_code(user_id, deal_id, &random_suffix(&mut rand::thread_rng()));

    match Voucher::create_with_ticket(pool, user_id, deal_id, &code).await {
        Ok(Some(voucher)) => {
            tracing::info!(voucher_id = %voucher.id, code = %voucher.code, "Voucher issued");
            Ok(Claim {
                voucher,
                newly_issued: true,
            })
        }
        Ok(None) => existing(pool, user_id, deal_id).await,
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(error = %e, "Voucher insert raced, re-reading");
            existing(pool, user_id, deal_id).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn existing(pool: &PgPool, user_id: Uuid, deal_id: Uuid) -> Result<Claim, AppError> {
    let voucher = Voucher::find_by_pair(pool, user_id, deal_id)
        .await?
        .ok_or_else(|| {
            AppError::Conflict("Voucher code collision, please try again".to_string())
        })?;

    Ok(Claim {
        voucher,
        newly_issued: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn user(is_verified: bool, is_banned: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "s@uni.edu".to_string(),
            password_hash: String::new(),
            full_name: "Student".to_string(),
            university_id: None,
            campus_id: None,
            city_id: None,
            is_verified,
            is_banned,
            push_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_format_code() {
        let user_id = Uuid::parse_str("ab12cd34-0000-4000-8000-000000000000").unwrap();
        let deal_id = Uuid::parse_str("9f8e7d6c-0000-4000-8000-000000000000").unwrap();

        assert_eq!(format_code(user_id, deal_id, "x7k2qp"), "AB129F8E-X7K2QP");
    }

    #[test]
    fn test_suffix_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let suffix = random_suffix(&mut rng);
            assert_eq!(suffix.len(), SUFFIX_LEN);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_claim_eligibility() {
        assert!(ensure_can_claim(&user(true, false)).is_ok());
        assert!(matches!(
            ensure_can_claim(&user(false, false)),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            ensure_can_claim(&user(true, true)),
            Err(AppError::Forbidden(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_claiming_twice_returns_same_voucher(pool: PgPool) {
        let (user_id, deal_id) = crate::services::testing::seed_live_deal(&pool).await;

        let first = issue_or_retrieve(&pool, user_id, deal_id).await.unwrap();
        let second = issue_or_retrieve(&pool, user_id, deal_id).await.unwrap();

        assert!(first.newly_issued);
        assert!(!second.newly_issued);
        assert_eq!(first.voucher.id, second.voucher.id);
        assert_eq!(first.voucher.code, second.voucher.code);

        let deal = Deal::find_by_id(&pool, deal_id).await.unwrap().unwrap();
        assert_eq!(deal.claimed, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_claims_converge(pool: PgPool) {
        let (user_id, deal_id) = crate::services::testing::seed_live_deal(&pool).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { issue_or_retrieve(&pool, user_id, deal_id).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().voucher.id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let deal = Deal::find_by_id(&pool, deal_id).await.unwrap().unwrap();
        assert_eq!(deal.claimed, 1);
    }
}
