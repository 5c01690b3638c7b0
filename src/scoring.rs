use chrono::NaiveDate;

use crate::models::{AccountHealth, Customer, Sentiment, Tier};

pub const CRITICAL_CHURN_THRESHOLD: f64 = 0.65;
pub const AT_RISK_CHURN_THRESHOLD: f64 = 0.4;

const LOGIN_WINDOW_DAYS: f64 = 60.0;
const TICKET_CEILING: f64 = 5.0;
const UPLIFT_CEILING: f64 = 300.0;
const FEATURE_COUNT: f64 = 5.0;

pub fn days_between(from: NaiveDate, today: NaiveDate) -> i64 {
    (today - from).num_days()
}

/// Share of the monthly conversation limit used so far. A zero limit reads as 0%.
pub fn usage_percentage(customer: &Customer) -> f64 {
    if customer.monthly_conversation_limit == 0 {
        return 0.0;
    }
    customer.conversations_used_this_month as f64 / customer.monthly_conversation_limit as f64
        * 100.0
}

pub fn churn_risk_score(customer: &Customer, today: NaiveDate) -> f64 {
    let days_since_login = days_between(customer.last_login_date, today) as f64;
    let usage = usage_percentage(customer);
    let tickets = customer.support_tickets_last_month as f64;

    let recency_factor = (days_since_login / LOGIN_WINDOW_DAYS).min(1.0) * 0.4;

    // Tickets only count fully when sentiment is negative.
    let ticket_factor = if customer.sentiment == Sentiment::Negative {
        (tickets / TICKET_CEILING).min(1.0) * 0.3
    } else if customer.support_tickets_last_month > 3 {
        0.15
    } else {
        0.0
    };

    let low_usage_factor = (100.0 - usage).max(0.0) / 100.0 * 0.3;

    (recency_factor + ticket_factor + low_usage_factor).clamp(0.0, 1.0)
}

pub fn expansion_score(customer: &Customer) -> f64 {
    let usage = usage_percentage(customer);

    let usage_factor = ((usage - 50.0).max(0.0) / 50.0).min(1.0) * 0.4;

    let uplift = potential_mrr(customer) - customer.monthly_recurring_revenue;
    let revenue_factor = (uplift / UPLIFT_CEILING).min(1.0) * 0.4;

    let unused_factor = customer.features_not_used.len() as f64 / FEATURE_COUNT * 0.2;

    (usage_factor + revenue_factor + unused_factor).clamp(0.0, 1.0)
}

/// Monthly revenue after moving the customer up one plan.
pub fn potential_mrr(customer: &Customer) -> f64 {
    let current = customer.monthly_recurring_revenue;
    match customer.tier {
        Tier::Startup => 55.0,
        Tier::Growth => 119.0,
        Tier::Scale => 319.0,
        Tier::Enterprise => current * 1.5,
        Tier::Free => current * 2.0,
    }
}

pub fn account_health(churn_risk_score: f64) -> AccountHealth {
    if churn_risk_score >= CRITICAL_CHURN_THRESHOLD {
        AccountHealth::Critical
    } else if churn_risk_score >= AT_RISK_CHURN_THRESHOLD {
        AccountHealth::AtRisk
    } else {
        AccountHealth::Healthy
    }
}
