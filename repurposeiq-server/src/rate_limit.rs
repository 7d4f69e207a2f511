//! Per-role daily API budgets backed by the api_usage table.

use sqlx::SqlitePool;

use crate::db::repos::usage::UsageRepo;
use crate::http::error::{ApiError, ApiResult};

/// Daily ceiling shared by all users of one API.
fn global_limit(api: &'static str) -> i64 {
    match api {
        "groq" => 5000,
        _ => 1000,
    }
}

/// Daily per-user budget for one role.
fn role_limit(api: &'static str, role: &str) -> i64 {
    match (api, role) {
        ("groq", "admin") => 1000,
        ("groq", "executive") => 500,
        ("groq", "manager") => 200,
        ("groq", _) => 100,
        ("tavily", "admin") => 500,
        ("tavily", "executive") => 200,
        ("tavily", "manager") => 100,
        ("tavily", _) => 50,
        _ => 50,
    }
}

/// Check the caller's remaining budget for `api`, then the global one.
pub async fn check(pool: &SqlitePool, api: &'static str, user_id: i64, role: &str) -> ApiResult<()> {
    let repo = UsageRepo::new(pool);

    let limit = role_limit(api, role);
    let used = repo.user_count_today(api, user_id).await?;
    if used >= limit {
        return Err(ApiError::RateLimited { api, used, limit });
    }

    let global_used = repo.global_count_today(api).await?;
    let global = global_limit(api);
    if global_used >= global {
        return Err(ApiError::RateLimited {
            api,
            used: global_used,
            limit: global,
        });
    }
    Ok(())
}

/// Record one call against the caller's budget.
pub async fn record(pool: &SqlitePool, api: &'static str, user_id: i64) -> ApiResult<()> {
    UsageRepo::new(pool).record(api, user_id).await?;
    Ok(())
}
