//! Query builders for the operations warehouse.
//!
//! Every builder returns a `NativeQuery` whose SQL references caller values only
//! through template tags. Row readers turn results back into portfolio records.

use crate::domain::{
    AccountHealth, HealthStatus, NativeQuery, PortfolioStats, QueryResult, Row, escape_like,
};
use serde_json::Value;

const MAX_ROWS: u32 = 500;

fn limit(n: u32) -> i64 {
    i64::from(n.clamp(1, MAX_ROWS))
}

/// Case-insensitive substring match over operator name. `%` and `_` in `term`
/// match literally.
pub fn search_operators(term: &str, max: u32) -> NativeQuery {
    NativeQuery::new(
        "SELECT o.id, o.name, o.email, o.plan, o.created_at \
         FROM operator o \
         WHERE LOWER(o.name) LIKE '%' || LOWER({{term}}) || '%' ESCAPE '\\' \
         ORDER BY o.name \
         LIMIT {{limit}}",
    )
    .bind_text("term", escape_like(term.trim()))
    .bind_integer("limit", limit(max))
}

pub fn operator_by_id(id: &str) -> NativeQuery {
    NativeQuery::new(
        "SELECT o.id, o.name, o.email, o.plan, o.stripe_account_id, o.hubspot_company_id, o.created_at \
         FROM operator o \
         WHERE o.id = {{operator_id}}",
    )
    .bind_text("operator_id", id)
}

pub fn operator_charges(operator_id: &str, max: u32) -> NativeQuery {
    NativeQuery::new(
        "SELECT c.id, c.amount, c.currency, c.status, c.created_at \
         FROM charge c \
         WHERE c.operator_id = {{operator_id}} \
         ORDER BY c.created_at DESC \
         LIMIT {{limit}}",
    )
    .bind_text("operator_id", operator_id)
    .bind_integer("limit", limit(max))
}

pub fn operator_disputes(operator_id: &str) -> NativeQuery {
    NativeQuery::new(
        "SELECT d.id, d.charge_id, d.amount, d.reason, d.status, d.created_at \
         FROM dispute d \
         WHERE d.operator_id = {{operator_id}} \
         ORDER BY d.created_at DESC",
    )
    .bind_text("operator_id", operator_id)
}

/// Succeeded charge volume per calendar month over the trailing `months`.
pub fn monthly_revenue(operator_id: &str, months: u32) -> NativeQuery {
    NativeQuery::new(
        "SELECT DATE_TRUNC('month', c.created_at) AS month, \
                SUM(c.amount) AS revenue, COUNT(*) AS charges \
         FROM charge c \
         WHERE c.operator_id = {{operator_id}} \
           AND c.status = 'succeeded' \
           AND c.created_at >= DATE_TRUNC('month', NOW()) - ({{months}} * INTERVAL '1 month') \
         GROUP BY 1 \
         ORDER BY 1",
    )
    .bind_text("operator_id", operator_id)
    .bind_integer("months", i64::from(months.clamp(1, 60)))
}

/// Lowest scores first, so the riskiest accounts survive the limit.
pub fn account_health_scores(max: u32) -> NativeQuery {
    NativeQuery::new(
        "SELECT o.id, o.name, h.health_score \
         FROM operator o \
         LEFT JOIN operator_health h ON h.operator_id = o.id \
         ORDER BY h.health_score ASC NULLS LAST \
         LIMIT {{limit}}",
    )
    .bind_integer("limit", limit(max))
}

/// Every account's health, unbounded. Change detection must see accounts leave
/// the risky end of the portfolio as well as enter it.
pub fn account_health_all() -> NativeQuery {
    NativeQuery::new(
        "SELECT o.id, o.name, h.health_score \
         FROM operator o \
         LEFT JOIN operator_health h ON h.operator_id = o.id \
         ORDER BY o.id",
    )
}

pub fn portfolio_stats() -> NativeQuery {
    NativeQuery::new(
        "SELECT COUNT(*) AS total_accounts, \
                COUNT(*) FILTER (WHERE h.health_score >= 70) AS healthy, \
                COUNT(*) FILTER (WHERE h.health_score >= 40 AND h.health_score < 70) AS at_risk, \
                COUNT(*) FILTER (WHERE h.health_score < 40) AS critical, \
                SUM(o.mrr) AS mrr \
         FROM operator o \
         LEFT JOIN operator_health h ON h.operator_id = o.id",
    )
}

/// Per-month bookings, fees and disputes for one operator.
pub fn roi_report(operator_id: &str) -> NativeQuery {
    NativeQuery::new(
        "SELECT DATE_TRUNC('month', c.created_at) AS month, \
                COUNT(*) AS bookings, \
                SUM(c.amount) AS gross_volume, \
                SUM(c.application_fee_amount) AS platform_fees, \
                COUNT(d.id) AS disputes \
         FROM charge c \
         LEFT JOIN dispute d ON d.charge_id = c.id \
         WHERE c.operator_id = {{operator_id}} AND c.status = 'succeeded' \
         GROUP BY 1 \
         ORDER BY 1",
    )
    .bind_text("operator_id", operator_id)
}

fn number(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count(row: &Row, column: &str) -> i64 {
    number(row.get(column)).map(|n| n as i64).unwrap_or(0)
}

/// Rows of `account_health_scores`. Rows without an id are skipped.
pub fn health_from_result(result: &QueryResult) -> Vec<AccountHealth> {
    result
        .rows
        .iter()
        .filter_map(|row| {
            let account = QueryResult::row_source(row, "id")?;
            let score = number(row.get("health_score"));
            Some(AccountHealth {
                account,
                name: row.get("name").and_then(Value::as_str).map(str::to_string),
                score,
                status: HealthStatus::from_score(score),
            })
        })
        .collect()
}

/// First row of `portfolio_stats`, or `None` for an empty result.
pub fn stats_from_result(result: &QueryResult) -> Option<PortfolioStats> {
    let row = result.rows.first()?;
    Some(PortfolioStats {
        total_accounts: count(row, "total_accounts"),
        healthy: count(row, "healthy"),
        at_risk: count(row, "at_risk"),
        critical: count(row, "critical"),
        mrr: number(row.get("mrr")),
    })
}
