//! Dashboard aggregates over the intelligence tables.

use serde::Serialize;
use sqlx::{FromRow, Row, SqlitePool};

use super::Result;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardKpis {
    pub total_market_usd_mn: f64,
    pub avg_cagr_percent: f64,
    pub active_patents: i64,
    pub total_trials: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MarketSummary {
    pub molecule: String,
    pub therapy_area: String,
    pub indication: Option<String>,
    pub market_size_usd_mn: f64,
    pub cagr_percent: f64,
    pub competition_level: f64,
    pub patient_burden: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PatentSummary {
    pub molecule: String,
    pub patent_number: String,
    pub expiry_date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrialSummary {
    pub nct_id: String,
    pub drug_name: Option<String>,
    pub indication: Option<String>,
    pub phase: Option<String>,
    pub sponsor: Option<String>,
    pub unmet_need: Option<f64>,
}

pub struct DashboardRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DashboardRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn kpis(&self) -> Result<DashboardKpis> {
        let market = sqlx::query(
            "SELECT COALESCE(SUM(market_size_usd_mn), 0.0) AS total, \
                    COALESCE(AVG(cagr_percent), 0.0) AS avg_cagr \
             FROM market_data",
        )
        .fetch_one(self.pool)
        .await?;

        let (active_patents,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM patents WHERE status = 'active'")
                .fetch_one(self.pool)
                .await?;

        let (total_trials,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinical_trials")
            .fetch_one(self.pool)
            .await?;

        Ok(DashboardKpis {
            total_market_usd_mn: market.get("total"),
            avg_cagr_percent: market.get("avg_cagr"),
            active_patents,
            total_trials,
        })
    }

    pub async fn markets(&self) -> Result<Vec<MarketSummary>> {
        Ok(sqlx::query_as::<_, MarketSummary>(
            "SELECT molecule, therapy_area, indication, market_size_usd_mn, \
                    cagr_percent, competition_level, patient_burden \
             FROM market_data ORDER BY market_size_usd_mn DESC",
        )
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn patents(&self) -> Result<Vec<PatentSummary>> {
        Ok(sqlx::query_as::<_, PatentSummary>(
            "SELECT molecule, patent_number, expiry_date, status \
             FROM patents ORDER BY expiry_date ASC",
        )
        .fetch_all(self.pool)
        .await?)
    }

    pub async fn trials(&self) -> Result<Vec<TrialSummary>> {
        Ok(sqlx::query_as::<_, TrialSummary>(
            "SELECT nct_id, drug_name, indication, phase, sponsor, unmet_need \
             FROM clinical_trials ORDER BY unmet_need DESC",
        )
        .fetch_all(self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn kpis_reflect_seed_data() {
        let pool = test_pool().await;
        let repo = DashboardRepo::new(&pool);

        let kpis = repo.kpis().await.unwrap();
        assert!((kpis.total_market_usd_mn - 62800.0).abs() < 0.01);
        assert_eq!(kpis.active_patents, 3);
        assert_eq!(kpis.total_trials, 6);

        let markets = repo.markets().await.unwrap();
        assert_eq!(markets.len(), 8);
        assert_eq!(markets[0].molecule, "Pembrolizumab");

        let trials = repo.trials().await.unwrap();
        assert_eq!(trials[0].nct_id, "NCT04567891");
    }
}
