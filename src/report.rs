use std::fmt::Write;

use chrono::NaiveDate;

use crate::analytics;
use crate::models::EnrichedCustomer;
use crate::ranking::{self, DEFAULT_AT_RISK_THRESHOLD, DEFAULT_EXPANSION_THRESHOLD};

pub fn build_report(
    generated_on: NaiveDate,
    customers: &[EnrichedCustomer],
    contacted_this_week: usize,
    top: usize,
) -> String {
    let summary = analytics::build_analytics(customers, contacted_this_week);
    let churn_risks = ranking::top_churn_risks(
        &ranking::filter_at_risk(customers.to_vec(), DEFAULT_AT_RISK_THRESHOLD),
        top,
    );
    let opportunities = ranking::top_expansion_opportunities(
        &ranking::filter_expansion_opportunities(customers.to_vec(), DEFAULT_EXPANSION_THRESHOLD),
        top,
    );
    let queue = ranking::priority_list(customers);

    let mut output = String::new();

    let _ = writeln!(output, "# Customer Success Report");
    let _ = writeln!(
        output,
        "Generated on {} across {} customers",
        generated_on, summary.total_customers
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Account Health");
    let _ = writeln!(
        output,
        "- Healthy: {}",
        summary.health_distribution.healthy
    );
    let _ = writeln!(output, "- At risk: {}", summary.health_distribution.at_risk);
    let _ = writeln!(
        output,
        "- Critical: {}",
        summary.health_distribution.critical
    );
    let _ = writeln!(output, "- Churn rate: {:.1}%", summary.churn_rate);
    let _ = writeln!(
        output,
        "- Expansion opportunities: {} worth ${:.0}/mo",
        summary.expansion_opportunities, summary.expansion_revenue
    );
    let _ = writeln!(
        output,
        "- Total MRR ${:.0}, average usage {:.0}%, {} contacted this week",
        summary.total_mrr.round(),
        summary.average_usage.round(),
        summary.contacted_this_week
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Churn Risk");

    if churn_risks.is_empty() {
        let _ = writeln!(output, "No customers above the churn threshold.");
    } else {
        for customer in churn_risks.iter() {
            let _ = writeln!(
                output,
                "- {} ({}, {}) churn {:.2}: {}",
                customer.customer.company_name,
                customer.customer.tier,
                customer.account_health,
                customer.churn_risk_score,
                ranking::churn_reason(customer)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Expansion Opportunities");

    if opportunities.is_empty() {
        let _ = writeln!(output, "No customers above the expansion threshold.");
    } else {
        for customer in opportunities.iter() {
            let _ = writeln!(
                output,
                "- {} ({}) expansion {:.2}: {}",
                customer.customer.company_name,
                customer.customer.tier,
                customer.expansion_score,
                ranking::expansion_reason(customer)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outreach Queue");

    if queue.is_empty() {
        let _ = writeln!(output, "Nothing queued.");
    } else {
        for item in queue.iter() {
            let _ = writeln!(
                output,
                "{}. [{}] {}: {} ({}, {} min)",
                item.rank,
                item.priority.as_str(),
                item.customer.customer.company_name,
                item.reason,
                item.action,
                item.time_estimate_minutes
            );
        }
        let _ = writeln!(
            output,
            "Estimated time: {} min",
            ranking::total_time_minutes(&queue)
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_all;
    use crate::models::Tier;
    use crate::scoring::tests::{fixture_today, scored_customer};

    #[test]
    fn report_lists_sections_and_queue() {
        let customers = enrich_all(
            &[
                scored_customer("idle", 58, 10, Tier::Startup, 29.0, 4),
                scored_customer("busy", 12, 70, Tier::Scale, 119.0, 2),
            ],
            fixture_today(),
        );
        let report = build_report(fixture_today(), &customers, 0, 10);

        assert!(report.starts_with("# Customer Success Report"));
        assert!(report.contains("Generated on 2026-03-02 across 2 customers"));
        assert!(report.contains("- Critical: 1"));
        assert!(report.contains("- Churn rate: 50.0%"));
        assert!(report.contains("Company idle (Startup, critical) churn 0.66: Inactive 58 days"));
        assert!(report.contains("1. [critical] Company idle: Critical: Inactive 58 days (Check-in call, 15 min)"));
        assert!(report.contains("2. [high] Company busy: High value: +$200/mo potential (Upgrade call, 30 min)"));
        assert!(report.contains("Estimated time: 45 min"));
    }

    #[test]
    fn empty_book_renders_placeholders() {
        let report = build_report(fixture_today(), &[], 0, 10);
        assert!(report.contains("No customers above the churn threshold."));
        assert!(report.contains("Nothing queued."));
    }
}
