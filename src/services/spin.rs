use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Deal, PrizeType, SpinPrize, SpinRecord, User, Voucher};
use crate::services::voucher::{ensure_can_claim, format_code, random_suffix};

#[derive(Debug, Serialize)]
pub struct SpinResult {
    pub outcome: PrizeType,
    pub prize: Option<SpinPrize>,
    pub voucher: Option<Voucher>,
}

/// Weighted draw over the prizes that still have weight and stock.
/// Weights are summed as `u64` so any stored `i32` weights fit.
pub fn pick_prize<'a, R: Rng>(prizes: &'a [SpinPrize], rng: &mut R) -> Option<&'a SpinPrize> {
    let drawable: Vec<&SpinPrize> = prizes.iter().filter(|p| p.is_drawable()).collect();
    let weights = WeightedIndex::new(drawable.iter().map(|p| p.weight as u64)).ok()?;
    Some(drawable[weights.sample(rng)])
}

pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// One spin per student per UTC day.
#[tracing::instrument(skip(pool, user), fields(user_id = %user.id))]
pub async fn spin(pool: &PgPool, user: &User) -> Result<SpinResult, AppError> {
    ensure_can_claim(user)?;

    if SpinRecord::exists_since(pool, user.id, start_of_utc_day(Utc::now())).await? {
        return Err(AppError::Conflict("You have already spun today".to_string()));
    }

    let prizes = SpinPrize::list_drawable(pool).await?;
    let picked = pick_prize(&prizes, &mut rand::thread_rng()).cloned();

    settle(pool, user.id, picked).await
}

/// Takes stock, issues the prize voucher and records the spin in one
/// transaction. Nothing is kept when any step fails.
async fn settle(
    pool: &PgPool,
    user_id: Uuid,
    picked: Option<SpinPrize>,
) -> Result<SpinResult, AppError> {
    let mut tx = pool.begin().await?;

    let prize = match picked {
        Some(prize) if prize.prize_type == PrizeType::Win && prize.has_finite_stock() => {
            if SpinPrize::take_one(&mut *tx, prize.id).await? {
                Some(prize)
            } else {
                tracing::debug!(prize_id = %prize.id, "Prize ran out during the draw");
                None
            }
        }
        other => other,
    };

    let outcome = prize.as_ref().map_or(PrizeType::Lose, |p| p.prize_type);

    let voucher = match prize.as_ref().and_then(|p| p.deal_id) {
        Some(deal_id) if outcome == PrizeType::Win => {
            award_voucher(&mut tx, user_id, deal_id).await?
        }
        _ => None,
    };

    SpinRecord::create(&mut *tx, user_id, prize.as_ref().map(|p| p.id), outcome).await?;
    tx.commit().await?;

    tracing::info!(outcome = ?outcome, "Spin recorded");

    Ok(SpinResult {
        outcome,
        prize,
        voucher,
    })
}

/// The student's voucher for the prize deal, issued if needed. `None` when
/// the deal is no longer live.
async fn award_voucher(
    conn: &mut PgConnection,
    user_id: Uuid,
    deal_id: Uuid,
) -> Result<Option<Voucher>, sqlx::Error> {
    if let Some(voucher) = Voucher::find_by_pair(&mut *conn, user_id, deal_id).await? {
        return Ok(Some(voucher));
    }

    if Deal::find_live(&mut *conn, deal_id).await?.is_none() {
        tracing::warn!(deal_id = %deal_id, "Prize deal is no longer live, no voucher issued");
        return Ok(None);
    }

    let code = format_code(user_id, deal_id, &random_suffix(&mut rand::thread_rng()));
    match Voucher::insert_with_ticket(&mut *conn, user_id, deal_id, &code).await? {
        Some(voucher) => {
            tracing::info!(voucher_id = %voucher.id, "Prize voucher issued");
            Ok(Some(voucher))
        }
        None => Voucher::find_by_pair(&mut *conn, user_id, deal_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spin_prize::UNLIMITED;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn prize(name: &str, prize_type: PrizeType, weight: i32, quantity: i32) -> SpinPrize {
        SpinPrize {
            id: Uuid::new_v4(),
            deal_id: None,
            name: name.to_string(),
            prize_type,
            weight,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_nothing_drawable() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pick_prize(&[], &mut rng).is_none());

        let prizes = vec![
            prize("zero weight", PrizeType::Win, 0, UNLIMITED),
            prize("sold out", PrizeType::Win, 10, 0),
        ];
        assert!(pick_prize(&prizes, &mut rng).is_none());
    }

    #[test]
    fn test_only_drawable_prizes_are_picked() {
        let prizes = vec![
            prize("sold out", PrizeType::Win, 100, 0),
            prize("coffee", PrizeType::Win, 1, 5),
        ];
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(pick_prize(&prizes, &mut rng).unwrap().name, "coffee");
        }
    }

    #[test]
    fn test_draw_follows_weights() {
        let prizes = vec![
            prize("common", PrizeType::Lose, 9, UNLIMITED),
            prize("rare", PrizeType::Win, 1, UNLIMITED),
        ];
        let mut rng = StdRng::seed_from_u64(2024);
        let rare = (0..10_000)
            .filter(|_| pick_prize(&prizes, &mut rng).unwrap().name == "rare")
            .count();

        assert!((700..1300).contains(&rare), "rare drawn {} times", rare);
    }

    #[test]
    fn test_large_weights_do_not_overflow() {
        let prizes = vec![
            prize("a", PrizeType::Win, i32::MAX, UNLIMITED),
            prize("b", PrizeType::Win, i32::MAX, UNLIMITED),
            prize("c", PrizeType::Lose, i32::MAX, UNLIMITED),
        ];
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            assert!(pick_prize(&prizes, &mut rng).is_some());
        }
    }

    #[test]
    fn test_start_of_utc_day() {
        let now = Utc.with_ymd_and_hms(2024, 9, 15, 17, 42, 5).unwrap();
        assert_eq!(
            start_of_utc_day(now),
            Utc.with_ymd_and_hms(2024, 9, 15, 0, 0, 0).unwrap()
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_one_spin_per_day(pool: PgPool) {
        let user = crate::services::testing::seed_verified_student(&pool).await;

        let first = spin(&pool, &user).await.unwrap();
        assert_eq!(first.outcome, PrizeType::Lose);

        let second = spin(&pool, &user).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_prize_sold_out_during_draw_becomes_lose(pool: PgPool) {
        let user = crate::services::testing::seed_verified_student(&pool).await;
        let last_unit = SpinPrize::create(
            &pool,
            crate::models::spin_prize::SpinPrizeData {
                deal_id: None,
                name: "Last coffee".to_string(),
                prize_type: PrizeType::Win,
                weight: 1,
                quantity: 1,
            },
        )
        .await
        .unwrap();

        // Another spin takes the last unit after this one drew the prize.
        assert!(SpinPrize::take_one(&pool, last_unit.id).await.unwrap());

        let result = settle(&pool, user.id, Some(last_unit)).await.unwrap();
        assert_eq!(result.outcome, PrizeType::Lose);
        assert!(result.prize.is_none());
        assert!(result.voucher.is_none());

        let recorded = SpinRecord::exists_since(&pool, user.id, start_of_utc_day(Utc::now()))
            .await
            .unwrap();
        assert!(recorded);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_winning_deal_prize_issues_voucher(pool: PgPool) {
        let (user_id, deal_id) = crate::services::testing::seed_live_deal(&pool).await;
        let prize = SpinPrize::create(
            &pool,
            crate::models::spin_prize::SpinPrizeData {
                deal_id: Some(deal_id),
                name: "Free burrito".to_string(),
                prize_type: PrizeType::Win,
                weight: 1,
                quantity: 2,
            },
        )
        .await
        .unwrap();

        let result = settle(&pool, user_id, Some(prize.clone())).await.unwrap();
        assert_eq!(result.outcome, PrizeType::Win);
        let voucher = result.voucher.unwrap();
        assert_eq!(voucher.deal_id, deal_id);

        let stock: i32 = sqlx::query_scalar("SELECT quantity FROM spin_prizes WHERE id = $1")
            .bind(prize.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stock, 1);

        let claimed: i64 = sqlx::query_scalar("SELECT claimed FROM deals WHERE id = $1")
            .bind(deal_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(claimed, 1);
    }
}
