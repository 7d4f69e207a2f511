//! Schema creation and seed data.
//!
//! Idempotent: `CREATE TABLE IF NOT EXISTS` plus `INSERT OR IGNORE`
//! seeds, run at every startup.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

/// Create all tables and seed demo data.
pub async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_tables(pool).await?;
    seed(pool).await?;
    info!("database schema ready");
    Ok(())
}

async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'analyst',
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            agents TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS market_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            molecule TEXT NOT NULL,
            region TEXT NOT NULL,
            therapy_area TEXT NOT NULL,
            indication TEXT,
            market_size_usd_mn REAL,
            cagr_percent REAL,
            top_competitors TEXT,
            generic_penetration REAL,
            patient_burden REAL,
            competition_level REAL,
            UNIQUE(molecule, region)
        )",
        "CREATE TABLE IF NOT EXISTS patents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            molecule TEXT NOT NULL,
            patent_number TEXT NOT NULL UNIQUE,
            patent_type TEXT,
            expiry_date TEXT,
            status TEXT
        )",
        "CREATE TABLE IF NOT EXISTS clinical_trials (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nct_id TEXT NOT NULL UNIQUE,
            indication TEXT,
            therapy_area TEXT,
            phase TEXT,
            drug_name TEXT,
            sponsor TEXT,
            patient_burden_score REAL,
            competition_density REAL,
            unmet_need REAL
        )",
        "CREATE TABLE IF NOT EXISTS query_tracking (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER,
            query_text TEXT NOT NULL,
            agents_used TEXT,
            response_time_ms INTEGER,
            success INTEGER NOT NULL DEFAULT 1,
            error_message TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS api_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            api_name TEXT NOT NULL,
            user_id INTEGER,
            date TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS clinical_trial_alerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nct_id TEXT NOT NULL,
            molecule TEXT NOT NULL,
            title TEXT,
            status TEXT,
            phase TEXT,
            start_date TEXT,
            url TEXT,
            alert_time TEXT NOT NULL,
            viewed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(nct_id, molecule)
        )",
        "CREATE INDEX IF NOT EXISTS idx_alerts_molecule ON clinical_trial_alerts(molecule)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_viewed ON clinical_trial_alerts(viewed)",
        "CREATE INDEX IF NOT EXISTS idx_alerts_time ON clinical_trial_alerts(alert_time)",
        "CREATE TABLE IF NOT EXISTS workflows (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            steps TEXT NOT NULL,
            schedule TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            user_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'idle',
            last_run TEXT,
            next_run TEXT,
            run_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS query_suggestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            suggestion TEXT NOT NULL UNIQUE
        )",
        "CREATE TABLE IF NOT EXISTS sentiment_analysis (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            molecule TEXT NOT NULL,
            source TEXT NOT NULL,
            content TEXT,
            sentiment_score REAL,
            sentiment_label TEXT,
            keywords TEXT,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS contact_submissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

async fn seed(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_users(pool).await?;
    seed_market_data(pool).await?;
    seed_patents(pool).await?;
    seed_clinical_trials(pool).await?;
    seed_suggestions(pool).await?;
    Ok(())
}

async fn seed_users(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Demo accounts; all passwords follow the <username>123 convention.
    let users = [
        ("admin", "admin@repurposeiq.com", "admin123", "admin"),
        ("analyst", "analyst@repurposeiq.com", "analyst123", "analyst"),
        ("manager", "manager@repurposeiq.com", "manager123", "manager"),
        ("demo", "demo@repurposeiq.com", "demo123", "analyst"),
    ];

    for (username, email, password, role) in users {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;
        if exists.is_some() {
            continue;
        }

        // Hashing is slow on purpose; only pay for it on first boot.
        let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
            .map_err(|e| sqlx::Error::Protocol(format!("bcrypt: {e}")))?;
        sqlx::query(
            "INSERT OR IGNORE INTO users (username, email, password_hash, role, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(hash)
        .bind(role)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_market_data(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows: &[(&str, &str, &str, &str, f64, f64, &str, f64, f64, f64)] = &[
        ("Metformin", "Global", "Diabetes", "Type 2 Diabetes", 3500.0, 5.2,
         "Teva,Sandoz,Sun Pharma", 0.85, 0.70, 0.25),
        ("Sitagliptin", "Global", "Diabetes", "Type 2 Diabetes", 2800.0, -2.3,
         "Merck,Novartis,Teva", 0.45, 0.60, 0.55),
        ("Pembrolizumab", "Global", "Oncology", "Multiple Cancers", 20000.0, 15.5,
         "BMS,Roche,AstraZeneca", 0.0, 0.90, 0.80),
        ("Rivaroxaban", "Global", "Cardiovascular", "Anticoagulation", 4500.0, 8.1,
         "Boehringer,Pfizer,Daiichi", 0.20, 0.75, 0.60),
        ("Atorvastatin", "Global", "Cardiovascular", "Hyperlipidemia", 12000.0, -1.5,
         "Teva,Ranbaxy,Mylan", 0.90, 0.55, 0.30),
        ("Lisinopril", "Global", "Cardiovascular", "Hypertension", 8000.0, 3.2,
         "Lupin,Teva,Sandoz", 0.88, 0.65, 0.28),
        ("Amlodipine", "Global", "Cardiovascular", "Hypertension", 6500.0, 2.8,
         "Pfizer,Teva,Zydus", 0.82, 0.60, 0.35),
        ("Omeprazole", "Global", "Gastroenterology", "GERD", 5500.0, 4.5,
         "AstraZeneca,Teva,Dr Reddy's", 0.80, 0.50, 0.40),
    ];

    for row in rows {
        sqlx::query(
            "INSERT OR IGNORE INTO market_data \
             (molecule, region, therapy_area, indication, market_size_usd_mn, cagr_percent, \
              top_competitors, generic_penetration, patient_burden, competition_level) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.0)
        .bind(row.1)
        .bind(row.2)
        .bind(row.3)
        .bind(row.4)
        .bind(row.5)
        .bind(row.6)
        .bind(row.7)
        .bind(row.8)
        .bind(row.9)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_patents(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows = [
        ("Sitagliptin", "US7128924", "composition", "2027-04-15", "active"),
        ("Pembrolizumab", "US8802091", "composition", "2028-09-04", "active"),
        ("Rivaroxaban", "US7659253", "composition", "2026-11-20", "active"),
        ("Metformin", "US4522811", "composition", "2000-06-04", "expired"),
        ("Atorvastatin", "US5273995", "composition", "2011-06-28", "expired"),
    ];

    for (molecule, number, ptype, expiry, status) in rows {
        sqlx::query(
            "INSERT OR IGNORE INTO patents (molecule, patent_number, patent_type, expiry_date, status) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(molecule)
        .bind(number)
        .bind(ptype)
        .bind(expiry)
        .bind(status)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_clinical_trials(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows: &[(&str, &str, &str, &str, &str, &str, f64, f64, f64)] = &[
        ("NCT04567890", "Pancreatic Cancer", "Oncology", "Phase 2", "Metformin",
         "MD Anderson", 0.90, 0.30, 0.85),
        ("NCT04567891", "Alzheimer's Disease", "Neurology", "Phase 3", "Metformin",
         "NIH", 0.95, 0.20, 0.90),
        ("NCT04567892", "Melanoma", "Oncology", "Phase 1", "Pembrolizumab",
         "Merck", 0.80, 0.85, 0.40),
        ("NCT04567893", "Polycystic Ovary Syndrome", "Endocrinology", "Phase 3", "Metformin",
         "Mayo Clinic", 0.70, 0.40, 0.65),
        ("NCT04567894", "Atrial Fibrillation", "Cardiovascular", "Phase 4", "Rivaroxaban",
         "Bayer", 0.75, 0.70, 0.45),
        ("NCT04567895", "Cancer-Associated Thrombosis", "Oncology", "Phase 3", "Rivaroxaban",
         "Janssen", 0.85, 0.35, 0.80),
    ];

    for row in rows {
        sqlx::query(
            "INSERT OR IGNORE INTO clinical_trials \
             (nct_id, indication, therapy_area, phase, drug_name, sponsor, \
              patient_burden_score, competition_density, unmet_need) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(row.0)
        .bind(row.1)
        .bind(row.2)
        .bind(row.3)
        .bind(row.4)
        .bind(row.5)
        .bind(row.6)
        .bind(row.7)
        .bind(row.8)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_suggestions(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows = [
        ("market", "What is the market size and CAGR for metformin?"),
        ("market", "Find whitespace opportunities in cardiovascular"),
        ("patent", "When does the sitagliptin patent expire?"),
        ("patent", "Run a freedom to operate check for rivaroxaban"),
        ("clinical", "What repurposing trials exist for metformin?"),
        ("clinical", "Show the pipeline by phase for oncology"),
        ("trade", "Analyze import dependency for metformin API"),
        ("strategy", "Build a product story for an innovative metformin product"),
    ];

    for (category, suggestion) in rows {
        sqlx::query(
            "INSERT OR IGNORE INTO query_suggestions (category, suggestion) VALUES (?, ?)",
        )
        .bind(category)
        .bind(suggestion)
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let pool = pool().await;
        init(&pool).await.unwrap();
        init(&pool).await.unwrap();

        let (users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users, 4);

        let (markets,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM market_data")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(markets, 8);

        let (trials,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinical_trials")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(trials, 6);
    }

    #[tokio::test]
    async fn alert_dedupe_constraint_holds() {
        let pool = pool().await;
        init(&pool).await.unwrap();

        for _ in 0..2 {
            sqlx::query(
                "INSERT OR IGNORE INTO clinical_trial_alerts \
                 (nct_id, molecule, title, status, phase, alert_time) \
                 VALUES ('NCT1', 'metformin', 't', 'RECRUITING', 'Phase 1', ?)",
            )
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap();
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clinical_trial_alerts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
