use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{AccountHealth, EnrichedCustomer, Priority, PriorityItem, Sentiment};

pub const DEFAULT_AT_RISK_THRESHOLD: f64 = 0.5;
pub const DEFAULT_EXPANSION_THRESHOLD: f64 = 0.3;
pub const DEFAULT_TOP_COUNT: usize = 10;

const PRIORITY_LIST_LIMIT: usize = 20;
const BUCKET_CAP: usize = 5;

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn sort_by_churn_risk(customers: &mut [EnrichedCustomer]) {
    customers.sort_by(|a, b| descending(a.churn_risk_score, b.churn_risk_score));
}

pub fn sort_by_expansion(customers: &mut [EnrichedCustomer]) {
    customers.sort_by(|a, b| descending(a.expansion_score, b.expansion_score));
}

pub fn filter_at_risk(customers: Vec<EnrichedCustomer>, threshold: f64) -> Vec<EnrichedCustomer> {
    customers
        .into_iter()
        .filter(|c| c.churn_risk_score >= threshold)
        .collect()
}

pub fn filter_expansion_opportunities(
    customers: Vec<EnrichedCustomer>,
    threshold: f64,
) -> Vec<EnrichedCustomer> {
    customers
        .into_iter()
        .filter(|c| c.expansion_score >= threshold)
        .collect()
}

pub fn filter_healthy(customers: Vec<EnrichedCustomer>) -> Vec<EnrichedCustomer> {
    customers
        .into_iter()
        .filter(|c| c.account_health == AccountHealth::Healthy)
        .collect()
}

pub fn top_churn_risks(customers: &[EnrichedCustomer], count: usize) -> Vec<EnrichedCustomer> {
    let mut sorted = customers.to_vec();
    sort_by_churn_risk(&mut sorted);
    sorted.truncate(count);
    sorted
}

pub fn top_expansion_opportunities(
    customers: &[EnrichedCustomer],
    count: usize,
) -> Vec<EnrichedCustomer> {
    let mut sorted = customers.to_vec();
    sort_by_expansion(&mut sorted);
    sorted.truncate(count);
    sorted
}

pub fn total_mrr(customers: &[EnrichedCustomer]) -> f64 {
    customers
        .iter()
        .map(|c| c.customer.monthly_recurring_revenue)
        .sum()
}

pub fn average_usage(customers: &[EnrichedCustomer]) -> f64 {
    if customers.is_empty() {
        return 0.0;
    }
    customers.iter().map(|c| c.usage_percentage).sum::<f64>() / customers.len() as f64
}

pub fn churn_reason(customer: &EnrichedCustomer) -> String {
    if customer.days_since_login >= 45 {
        format!("Inactive {} days", customer.days_since_login)
    } else if customer.days_since_login >= 30 {
        format!("Not logged in for {} days", customer.days_since_login)
    } else if customer.customer.sentiment == Sentiment::Negative {
        "Negative sentiment in recent tickets".to_string()
    } else if customer.usage_percentage < 30.0 {
        format!("Low usage ({:.0}%)", customer.usage_percentage.round())
    } else {
        "Multiple churn risk factors".to_string()
    }
}

pub fn expansion_reason(customer: &EnrichedCustomer) -> String {
    let unused = customer.customer.features_not_used.len();
    if customer.usage_percentage >= 80.0 {
        format!("Using {:.0}% of monthly limit", customer.usage_percentage.round())
    } else if unused >= 3 {
        format!("{unused} unused features available")
    } else if customer.uplift() >= 100.0 {
        format!("+${:.0}/mo revenue potential", customer.uplift().round())
    } else {
        "Ready for tier upgrade".to_string()
    }
}

struct Bucket {
    priority: Priority,
    action: &'static str,
    time_estimate_minutes: u32,
    cap: Option<usize>,
}

const CRITICAL_CHURN: Bucket = Bucket {
    priority: Priority::Critical,
    action: "Check-in call",
    time_estimate_minutes: 15,
    cap: None,
};

const HIGH_CHURN: Bucket = Bucket {
    priority: Priority::High,
    action: "Check-in call",
    time_estimate_minutes: 15,
    cap: Some(BUCKET_CAP),
};

const HIGH_VALUE_EXPANSION: Bucket = Bucket {
    priority: Priority::High,
    action: "Upgrade call",
    time_estimate_minutes: 30,
    cap: Some(BUCKET_CAP),
};

const MEDIUM_EXPANSION: Bucket = Bucket {
    priority: Priority::Medium,
    action: "Feature demo",
    time_estimate_minutes: 10,
    cap: Some(BUCKET_CAP),
};

struct QueueBuilder<'a> {
    customers: &'a [EnrichedCustomer],
    queued: HashSet<&'a str>,
    items: Vec<PriorityItem>,
}

impl<'a> QueueBuilder<'a> {
    fn append<P, S, R>(&mut self, bucket: &Bucket, matches: P, order: S, reason: R)
    where
        P: Fn(&EnrichedCustomer) -> bool,
        S: Fn(&EnrichedCustomer, &EnrichedCustomer) -> Ordering,
        R: Fn(&EnrichedCustomer) -> String,
    {
        let customers = self.customers;
        let mut members: Vec<&'a EnrichedCustomer> = customers
            .iter()
            .filter(|c| !self.queued.contains(c.customer.customer_id.as_str()))
            .filter(|c| matches(c))
            .collect();
        members.sort_by(|a, b| order(a, b));
        if let Some(cap) = bucket.cap {
            members.truncate(cap);
        }

        for customer in members {
            self.queued.insert(customer.customer.customer_id.as_str());
            self.items.push(PriorityItem {
                rank: self.items.len() + 1,
                customer: customer.clone(),
                reason: reason(customer),
                action: bucket.action,
                time_estimate_minutes: bucket.time_estimate_minutes,
                priority: bucket.priority,
            });
        }
    }
}

/// Builds the outreach queue: churn buckets first, then expansion buckets.
///
/// Buckets are concatenated in a fixed order, each sorted on its own key, so
/// the result is not a global ordering by any single score. A customer queued
/// by an earlier bucket is not considered by later ones.
pub fn priority_list(customers: &[EnrichedCustomer]) -> Vec<PriorityItem> {
    let mut queue = QueueBuilder {
        customers,
        queued: HashSet::new(),
        items: Vec::new(),
    };

    queue.append(
        &CRITICAL_CHURN,
        |c| c.days_since_login >= 45,
        |a, b| b.days_since_login.cmp(&a.days_since_login),
        |c| format!("Critical: Inactive {} days", c.days_since_login),
    );

    queue.append(
        &HIGH_CHURN,
        |c| (30..45).contains(&c.days_since_login),
        |a, b| descending(a.churn_risk_score, b.churn_risk_score),
        |c| format!("High risk: Inactive {} days", c.days_since_login),
    );

    queue.append(
        &HIGH_VALUE_EXPANSION,
        |c| c.uplift() >= 100.0 && c.expansion_score >= 0.5,
        |a, b| descending(a.uplift(), b.uplift()),
        |c| format!("High value: +${:.0}/mo potential", c.uplift().round()),
    );

    queue.append(
        &MEDIUM_EXPANSION,
        |c| c.expansion_score >= 0.3 && c.expansion_score < 0.5 && c.uplift() < 100.0,
        |a, b| descending(a.expansion_score, b.expansion_score),
        |c| match c.customer.features_not_used.len() {
            0 => format!("{:.0}% usage", c.usage_percentage.round()),
            unused => format!("{unused} unused features"),
        },
    );

    let mut items = queue.items;
    items.truncate(PRIORITY_LIST_LIMIT);
    items
}

pub fn total_time_minutes(items: &[PriorityItem]) -> u32 {
    items.iter().map(|item| item.time_estimate_minutes).sum()
}
