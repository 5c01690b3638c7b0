use chrono::NaiveDate;

use crate::models::{Customer, EnrichedCustomer};
use crate::scoring;

/// Attaches every derived field to a stored record, as seen on `today`.
pub fn enrich(customer: &Customer, today: NaiveDate) -> EnrichedCustomer {
    let churn_risk_score = scoring::churn_risk_score(customer, today);

    EnrichedCustomer {
        churn_risk_score,
        expansion_score: scoring::expansion_score(customer),
        account_health: scoring::account_health(churn_risk_score),
        potential_mrr: scoring::potential_mrr(customer),
        days_since_login: scoring::days_between(customer.last_login_date, today),
        days_since_last_contact: scoring::days_between(customer.last_contact_date, today),
        usage_percentage: scoring::usage_percentage(customer),
        customer: customer.clone(),
    }
}

pub fn enrich_all(customers: &[Customer], today: NaiveDate) -> Vec<EnrichedCustomer> {
    customers
        .iter()
        .map(|customer| enrich(customer, today))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountHealth;
    use crate::scoring::tests::{customer_fixture, fixture_today};

    #[test]
    fn derives_day_counts_and_usage() {
        let enriched = enrich(&customer_fixture(), fixture_today());
        assert_eq!(enriched.days_since_login, 3);
        assert_eq!(enriched.days_since_last_contact, 20);
        assert!((enriched.usage_percentage - 50.0).abs() < 0.001);
        assert_eq!(enriched.potential_mrr, 119.0);
        assert!((enriched.uplift() - 64.0).abs() < 0.001);
        assert_eq!(enriched.account_health, AccountHealth::Healthy);
    }

    #[test]
    fn enriching_twice_yields_identical_fields() {
        let customer = customer_fixture();
        let first = enrich(&customer, fixture_today());
        let second = enrich(&first.customer, fixture_today());
        assert_eq!(first, second);
    }

    #[test]
    fn reflects_record_changes_on_next_read() {
        let mut customer = customer_fixture();
        let before = enrich(&customer, fixture_today());
        customer.last_login_date = fixture_today() - chrono::Duration::days(59);
        let after = enrich(&customer, fixture_today());
        assert!(after.churn_risk_score > before.churn_risk_score);
        assert_eq!(after.days_since_login, 59);
    }
}
