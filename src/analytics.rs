use crate::models::{AccountHealth, Analytics, EnrichedCustomer, HealthDistribution};
use crate::ranking::{self, DEFAULT_EXPANSION_THRESHOLD};

pub fn health_distribution(customers: &[EnrichedCustomer]) -> HealthDistribution {
    let mut distribution = HealthDistribution::default();
    for customer in customers {
        match customer.account_health {
            AccountHealth::Healthy => distribution.healthy += 1,
            AccountHealth::AtRisk => distribution.at_risk += 1,
            AccountHealth::Critical => distribution.critical += 1,
        }
    }
    distribution
}

pub fn build_analytics(customers: &[EnrichedCustomer], contacted_this_week: usize) -> Analytics {
    let total_customers = customers.len();
    let health_distribution = health_distribution(customers);
    let customers_at_risk = health_distribution.at_risk + health_distribution.critical;

    let churn_rate = if total_customers == 0 {
        0.0
    } else {
        (customers_at_risk as f64 / total_customers as f64 * 1000.0).round() / 10.0
    };

    let opportunities: Vec<&EnrichedCustomer> = customers
        .iter()
        .filter(|c| c.expansion_score >= DEFAULT_EXPANSION_THRESHOLD)
        .collect();
    let expansion_revenue = opportunities.iter().map(|c| c.uplift()).sum::<f64>().round();

    Analytics {
        total_customers,
        customers_at_risk,
        churn_rate,
        expansion_opportunities: opportunities.len(),
        expansion_revenue,
        total_mrr: ranking::total_mrr(customers),
        average_usage: ranking::average_usage(customers),
        contacted_this_week,
        health_distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_all;
    use crate::models::Tier;
    use crate::scoring::tests::{fixture_today, scored_customer};

    #[test]
    fn aggregates_health_and_expansion() {
        let customers = enrich_all(
            &[
                scored_customer("a", 2, 95, Tier::Growth, 119.0, 0),
                scored_customer("b", 58, 10, Tier::Startup, 29.0, 4),
                scored_customer("d", 12, 70, Tier::Scale, 119.0, 2),
            ],
            fixture_today(),
        );
        let analytics = build_analytics(&customers, 2);

        assert_eq!(analytics.total_customers, 3);
        assert_eq!(analytics.customers_at_risk, 1);
        assert_eq!(analytics.churn_rate, 33.3);
        assert_eq!(analytics.health_distribution.critical, 1);
        assert_eq!(analytics.health_distribution.healthy, 2);
        // a (0.36, no uplift) and d (0.51, +$200) qualify.
        assert_eq!(analytics.expansion_opportunities, 2);
        assert_eq!(analytics.expansion_revenue, 200.0);
        assert_eq!(analytics.total_mrr, 267.0);
        assert!((analytics.average_usage - 175.0 / 3.0).abs() < 0.001);
        assert_eq!(analytics.contacted_this_week, 2);
    }

    #[test]
    fn empty_book_reports_zero_churn() {
        let analytics = build_analytics(&[], 0);
        assert_eq!(analytics.total_customers, 0);
        assert_eq!(analytics.churn_rate, 0.0);
        assert_eq!(analytics.average_usage, 0.0);
    }
}
