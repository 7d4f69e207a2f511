//! Clinical trial monitoring service.
//!
//! Polls ClinicalTrials.gov for tracked molecules, stores new trials
//! as alerts, and broadcasts them to websocket subscribers. Falls back
//! to the local clinical_trials table when the API is unreachable.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::db::repos::alerts::{AlertRepo, NewAlert, TrialAlert};
use crate::db::repos::DbError;

const API_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
const STATUS_FILTER: &str = "RECRUITING|ACTIVE_NOT_RECRUITING|COMPLETED";
const PAGE_SIZE: u32 = 20;

/// One poll per hour by default.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

const DEFAULT_MOLECULES: &[&str] = &["metformin", "sitagliptin", "rivaroxaban", "pembrolizumab"];

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub tracked_molecules: Vec<String>,
    pub interval_secs: u64,
}

struct Inner {
    pool: SqlitePool,
    alerts_tx: broadcast::Sender<TrialAlert>,
    http: reqwest::Client,
    tracked: RwLock<HashSet<String>>,
    running: AtomicBool,
    interval: Duration,
}

/// Cloneable handle to the monitoring service.
#[derive(Clone)]
pub struct TrialMonitor {
    inner: Arc<Inner>,
}

#[derive(Deserialize)]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Study>,
}

#[derive(Deserialize)]
struct Study {
    #[serde(rename = "protocolSection")]
    protocol: ProtocolSection,
}

#[derive(Deserialize)]
struct ProtocolSection {
    #[serde(rename = "identificationModule")]
    identification: IdentificationModule,
    #[serde(rename = "statusModule")]
    status: StatusModule,
    #[serde(rename = "designModule", default)]
    design: Option<DesignModule>,
}

#[derive(Deserialize)]
struct IdentificationModule {
    #[serde(rename = "nctId")]
    nct_id: String,
    #[serde(rename = "briefTitle", default)]
    brief_title: Option<String>,
}

#[derive(Deserialize)]
struct StatusModule {
    #[serde(rename = "overallStatus", default)]
    overall_status: Option<String>,
    #[serde(rename = "startDateStruct", default)]
    start_date: Option<StartDateStruct>,
}

#[derive(Deserialize)]
struct StartDateStruct {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct DesignModule {
    #[serde(default)]
    phases: Vec<String>,
}

impl TrialMonitor {
    pub fn new(pool: SqlitePool, alerts_tx: broadcast::Sender<TrialAlert>) -> Self {
        Self::with_interval(pool, alerts_tx, DEFAULT_INTERVAL)
    }

    pub fn with_interval(
        pool: SqlitePool,
        alerts_tx: broadcast::Sender<TrialAlert>,
        interval: Duration,
    ) -> Self {
        let tracked = DEFAULT_MOLECULES.iter().map(|m| m.to_string()).collect();
        Self {
            inner: Arc::new(Inner {
                pool,
                alerts_tx,
                http: reqwest::Client::new(),
                tracked: RwLock::new(tracked),
                running: AtomicBool::new(false),
                interval,
            }),
        }
    }

    /// Start the polling loop. A second call is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("trial monitor started");
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.inner.interval);
            while monitor.inner.running.load(Ordering::SeqCst) {
                ticker.tick().await;
                monitor.poll_all().await;
            }
            info!("trial monitor stopped");
        });
    }

    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    pub async fn status(&self) -> MonitorStatus {
        let mut tracked: Vec<String> =
            self.inner.tracked.read().await.iter().cloned().collect();
        tracked.sort();
        MonitorStatus {
            running: self.inner.running.load(Ordering::SeqCst),
            tracked_molecules: tracked,
            interval_secs: self.inner.interval.as_secs(),
        }
    }

    pub async fn track(&self, molecule: &str) -> bool {
        self.inner
            .tracked
            .write()
            .await
            .insert(molecule.trim().to_lowercase())
    }

    pub async fn untrack(&self, molecule: &str) -> bool {
        self.inner
            .tracked
            .write()
            .await
            .remove(&molecule.trim().to_lowercase())
    }

    async fn poll_all(&self) {
        let molecules: Vec<String> =
            self.inner.tracked.read().await.iter().cloned().collect();
        for molecule in molecules {
            if let Err(e) = self.poll_molecule(&molecule).await {
                warn!(molecule = %molecule, "trial poll failed: {}", e);
            }
        }
    }

    /// Poll one molecule and alert on unseen trials.
    pub async fn poll_molecule(&self, molecule: &str) -> Result<usize, DbError> {
        let candidates = match self.fetch_remote(molecule).await {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(molecule = %molecule, "api unavailable, using local data: {}", e);
                self.fetch_local(molecule).await?
            }
        };

        let repo = AlertRepo::new(&self.inner.pool);
        let mut inserted = 0;
        for candidate in candidates {
            if repo.insert(&candidate).await? {
                inserted += 1;
                let stored = repo.for_molecule(molecule).await?;
                if let Some(alert) = stored.into_iter().find(|a| a.nct_id == candidate.nct_id) {
                    // Receiver count of zero just means nobody is connected.
                    let _ = self.inner.alerts_tx.send(alert);
                }
            }
        }
        if inserted > 0 {
            info!(molecule = %molecule, count = inserted, "new trial alerts");
        }
        Ok(inserted)
    }

    async fn fetch_remote(&self, molecule: &str) -> Result<Vec<NewAlert>, reqwest::Error> {
        let response: StudiesResponse = self
            .inner
            .http
            .get(API_URL)
            .query(&[
                ("query.cond", molecule),
                ("filter.overallStatus", STATUS_FILTER),
                ("pageSize", &PAGE_SIZE.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .studies
            .into_iter()
            .map(|study| {
                let nct_id = study.protocol.identification.nct_id;
                NewAlert {
                    url: Some(format!("https://clinicaltrials.gov/study/{nct_id}")),
                    nct_id,
                    molecule: molecule.to_lowercase(),
                    title: study.protocol.identification.brief_title,
                    status: study.protocol.status.overall_status,
                    phase: study
                        .protocol
                        .design
                        .and_then(|d| d.phases.into_iter().next()),
                    start_date: study.protocol.status.start_date.and_then(|s| s.date),
                }
            })
            .collect())
    }

    async fn fetch_local(&self, molecule: &str) -> Result<Vec<NewAlert>, sqlx::Error> {
        let rows: Vec<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT nct_id, indication, phase FROM clinical_trials \
             WHERE drug_name = ? COLLATE NOCASE",
        )
        .bind(molecule)
        .fetch_all(&self.inner.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(nct_id, indication, phase)| NewAlert {
                url: Some(format!("https://clinicaltrials.gov/study/{nct_id}")),
                nct_id,
                molecule: molecule.to_lowercase(),
                title: indication.map(|i| format!("{i} study")),
                status: Some("RECRUITING".to_string()),
                phase,
                start_date: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    fn monitor(pool: SqlitePool) -> (TrialMonitor, broadcast::Receiver<TrialAlert>) {
        let (tx, rx) = broadcast::channel(16);
        (TrialMonitor::new(pool, tx), rx)
    }

    #[tokio::test]
    async fn tracking_is_case_insensitive() {
        let pool = test_pool().await;
        let (monitor, _rx) = monitor(pool);

        assert!(monitor.track("Semaglutide").await);
        assert!(!monitor.track("semaglutide ").await);
        assert!(monitor.untrack("SEMAGLUTIDE").await);

        let status = monitor.status().await;
        assert!(!status.running);
        assert_eq!(status.tracked_molecules.len(), DEFAULT_MOLECULES.len());
    }

    #[tokio::test]
    async fn local_fallback_produces_alerts_once() {
        let pool = test_pool().await;
        let (monitor, mut rx) = monitor(pool);

        // Seeded metformin trials become alerts on first sight only.
        let inserted = monitor.fetch_local("metformin").await.unwrap();
        assert_eq!(inserted.len(), 3);

        let repo = AlertRepo::new(&monitor.inner.pool);
        for alert in &inserted {
            repo.insert(alert).await.unwrap();
        }
        assert_eq!(repo.unviewed().await.unwrap().len(), 3);

        // Broadcast channel delivers poll results to subscribers.
        let stored = repo.for_molecule("metformin").await.unwrap();
        monitor.inner.alerts_tx.send(stored[0].clone()).unwrap();
        assert_eq!(rx.recv().await.unwrap().molecule, "metformin");
    }

    #[tokio::test]
    async fn polling_same_molecule_twice_inserts_nothing_new() {
        let pool = test_pool().await;
        let (monitor, _rx) = monitor(pool);

        let first = monitor.poll_molecule("rivaroxaban").await.unwrap();
        let second = monitor.poll_molecule("rivaroxaban").await.unwrap();
        assert_eq!(second, 0);

        let repo = AlertRepo::new(&monitor.inner.pool);
        assert!(repo.for_molecule("rivaroxaban").await.unwrap().len() >= first);
    }
}
