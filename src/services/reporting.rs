use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::UserCounts;
use crate::models::{Business, BusinessStatus, Deal, DealStatus, Ticket, TicketStatus, User, Voucher};

pub const DEFAULT_TOP_N: i64 = 5;
pub const MAX_TOP_N: i64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount<S> {
    pub status: S,
    pub count: i64,
}

fn status_counts<S>(rows: Vec<(S, i64)>) -> Vec<StatusCount<S>> {
    rows.into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct EngagementTotals {
    pub views: i64,
    pub clicks: i64,
    pub claimed: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub users: UserCounts,
    pub businesses: Vec<StatusCount<BusinessStatus>>,
    pub deals: Vec<StatusCount<DealStatus>>,
    pub vouchers_issued: i64,
    pub tickets: Vec<StatusCount<TicketStatus>>,
    pub engagement: EngagementTotals,
}

#[tracing::instrument(skip(pool))]
pub async fn dashboard(pool: &PgPool) -> Result<DashboardStats, AppError> {
    let engagement = sqlx::query_as::<_, EngagementTotals>(
        r#"
        SELECT
            COALESCE(SUM(views), 0)::BIGINT AS views,
            COALESCE(SUM(clicks), 0)::BIGINT AS clicks,
            COALESCE(SUM(claimed), 0)::BIGINT AS claimed
        FROM deals
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        users: User::counts(pool).await?,
        businesses: status_counts(Business::count_by_status(pool).await?),
        deals: status_counts(Deal::count_by_status(pool).await?),
        vouchers_issued: Voucher::count(pool).await?,
        tickets: status_counts(Ticket::count_by_status(pool, None).await?),
        engagement,
    })
}

/// `count / total * 100`, rounded to one decimal. Zero when there is no total.
pub fn percentage(count: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

pub fn clamp_top_n(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_TOP_N).clamp(1, MAX_TOP_N)
}

#[derive(Debug, Clone, FromRow)]
struct GroupCount {
    id: Uuid,
    name: String,
    count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudienceSlice {
    pub id: Uuid,
    pub name: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct Audience {
    pub total_users: i64,
    pub cities: Vec<AudienceSlice>,
    pub universities: Vec<AudienceSlice>,
}

fn slices(rows: Vec<GroupCount>, total: i64) -> Vec<AudienceSlice> {
    rows.into_iter()
        .map(|row| AudienceSlice {
            percentage: percentage(row.count, total),
            id: row.id,
            name: row.name,
            count: row.count,
        })
        .collect()
}

/// Top cities and universities by number of students.
#[tracing::instrument(skip(pool))]
pub async fn audience(pool: &PgPool, top_n: Option<i64>) -> Result<Audience, AppError> {
    let limit = clamp_top_n(top_n);
    let total_users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let cities = sqlx::query_as::<_, GroupCount>(
        r#"
        SELECT c.id, c.name, COUNT(*) AS count
        FROM users u
        JOIN cities c ON c.id = u.city_id
        GROUP BY c.id, c.name
        ORDER BY count DESC, c.name
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let universities = sqlx::query_as::<_, GroupCount>(
        r#"
        SELECT un.id, un.name, COUNT(*) AS count
        FROM users u
        JOIN universities un ON un.id = u.university_id
        GROUP BY un.id, un.name
        ORDER BY count DESC, un.name
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(Audience {
        total_users,
        cities: slices(cities, total_users),
        universities: slices(universities, total_users),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intensity {
    High,
    Medium,
    Low,
}

impl Intensity {
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Intensity::High,
            1 | 2 => Intensity::Medium,
            _ => Intensity::Low,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct CityCount {
    id: Uuid,
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatPoint {
    pub city_id: Uuid,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub users: i64,
    pub intensity: Intensity,
}

/// Cities with students, busiest first.
#[tracing::instrument(skip(pool))]
pub async fn heatmap(pool: &PgPool) -> Result<Vec<HeatPoint>, AppError> {
    let rows = sqlx::query_as::<_, CityCount>(
        r#"
        SELECT c.id, c.name, c.latitude, c.longitude, COUNT(*) AS count
        FROM users u
        JOIN cities c ON c.id = u.city_id
        GROUP BY c.id, c.name, c.latitude, c.longitude
        ORDER BY count DESC, c.name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(rank, row)| HeatPoint {
            city_id: row.id,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            users: row.count,
            intensity: Intensity::from_rank(rank),
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DealPerformance {
    pub deal_id: Uuid,
    pub title: String,
    pub status: DealStatus,
    pub views: i64,
    pub clicks: i64,
    pub claimed: i64,
    pub issued: i64,
    pub redeemed: i64,
    pub expired: i64,
}

#[derive(Debug, Serialize)]
pub struct BusinessAnalytics {
    pub deals: Vec<DealPerformance>,
    pub totals: EngagementTotals,
    pub redeemed: i64,
    pub click_through_rate: f64,
    pub tickets: Vec<StatusCount<TicketStatus>>,
}

pub fn totals(deals: &[DealPerformance]) -> EngagementTotals {
    deals.iter().fold(EngagementTotals::default(), |acc, d| EngagementTotals {
        views: acc.views + d.views,
        clicks: acc.clicks + d.clicks,
        claimed: acc.claimed + d.claimed,
    })
}

#[tracing::instrument(skip(pool))]
pub async fn business_analytics(
    pool: &PgPool,
    business_id: Uuid,
) -> Result<BusinessAnalytics, AppError> {
    let deals = sqlx::query_as::<_, DealPerformance>(
        r#"
        SELECT
            d.id AS deal_id, d.title, d.status, d.views, d.clicks, d.claimed,
            COUNT(t.id) FILTER (WHERE t.status = 'ISSUED') AS issued,
            COUNT(t.id) FILTER (WHERE t.status = 'REDEEMED') AS redeemed,
            COUNT(t.id) FILTER (WHERE t.status = 'EXPIRED') AS expired
        FROM deals d
        LEFT JOIN tickets t ON t.deal_id = d.id
        WHERE d.business_id = $1
        GROUP BY d.id
        ORDER BY d.created_at DESC
        "#,
    )
    .bind(business_id)
    .fetch_all(pool)
    .await?;

    let totals = totals(&deals);
    let redeemed: i64 = deals.iter().map(|d| d.redeemed).sum();

    Ok(BusinessAnalytics {
        click_through_rate: percentage(totals.clicks, totals.views),
        tickets: status_counts(Ticket::count_by_status(pool, Some(business_id)).await?),
        totals,
        redeemed,
        deals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(5, 5), 100.0);
        assert_eq!(percentage(0, 10), 0.0);
    }

    #[test]
    fn test_percentage_of_empty_total_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(4, 0), 0.0);
    }

    #[test]
    fn test_top_n_bounds() {
        assert_eq!(clamp_top_n(None), 5);
        assert_eq!(clamp_top_n(Some(12)), 12);
        assert_eq!(clamp_top_n(Some(500)), 50);
        assert_eq!(clamp_top_n(Some(0)), 1);
    }

    #[test]
    fn test_intensity_cutpoints() {
        assert_eq!(Intensity::from_rank(0), Intensity::High);
        assert_eq!(Intensity::from_rank(1), Intensity::Medium);
        assert_eq!(Intensity::from_rank(2), Intensity::Medium);
        assert_eq!(Intensity::from_rank(3), Intensity::Low);
        assert_eq!(Intensity::from_rank(40), Intensity::Low);
    }

    #[test]
    fn test_slices_carry_percentages() {
        let id = Uuid::new_v4();
        let result = slices(
            vec![GroupCount {
                id,
                name: "Lisbon".to_string(),
                count: 3,
            }],
            8,
        );
        assert_eq!(
            result,
            vec![AudienceSlice {
                id,
                name: "Lisbon".to_string(),
                count: 3,
                percentage: 37.5,
            }]
        );
    }

    #[test]
    fn test_business_totals_and_ctr() {
        let perf = |views, clicks, claimed| DealPerformance {
            deal_id: Uuid::new_v4(),
            title: "Deal".to_string(),
            status: DealStatus::Approved,
            views,
            clicks,
            claimed,
            issued: 0,
            redeemed: 0,
            expired: 0,
        };

        let sum = totals(&[perf(100, 10, 2), perf(60, 6, 1)]);
        assert_eq!(sum.views, 160);
        assert_eq!(sum.clicks, 16);
        assert_eq!(sum.claimed, 3);
        assert_eq!(percentage(sum.clicks, sum.views), 10.0);

        let empty = totals(&[]);
        assert_eq!(percentage(empty.clicks, empty.views), 0.0);
    }

    #[test]
    fn test_intensity_wire_format() {
        assert_eq!(serde_json::to_value(Intensity::Medium).unwrap(), "MEDIUM");
    }
}
