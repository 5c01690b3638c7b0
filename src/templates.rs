use std::fmt::Write;

use crate::models::{EmailTemplate, EnrichedCustomer, Feature, TemplateKind, Tier};

const PRODUCT_NAME: &str = "Molin";
pub const DEFAULT_CSM_NAME: &str = "Your CSM";

fn with_thousands(value: u32) -> String {
    let digits = value.to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn upgrade_benefits(current: Tier, next: Tier) -> String {
    match next {
        Tier::Enterprise => [
            "- Unlimited monthly conversations",
            "- Priority support with dedicated success manager",
            "- Custom integrations tailored to your needs",
            "- Advanced analytics and reporting",
            "- White-label options",
        ]
        .join("\n"),
        Tier::Scale => format!(
            "- {} monthly conversations (up from {})\n\
             - Access to advanced personalization features\n\
             - Priority support response times\n\
             - Advanced analytics dashboard",
            with_thousands(next.conversation_limit()),
            with_thousands(current.conversation_limit()),
        ),
        Tier::Growth => format!(
            "- {} monthly conversations (up from {})\n\
             - Multi-language support\n\
             - Enhanced AI capabilities\n\
             - Email support",
            with_thousands(next.conversation_limit()),
            with_thousands(current.conversation_limit()),
        ),
        Tier::Free | Tier::Startup => [
            "- Higher conversation limits",
            "- More advanced features",
            "- Better support options",
        ]
        .join("\n"),
    }
}

fn feature_description(feature: Feature) -> &'static str {
    match feature {
        Feature::SupportAi => "Support AI automatically answers common customer questions 24/7, reducing your support team's workload by up to 70%.",
        Feature::SalesAi => "Sales AI engages potential customers in real-time, qualifying leads and guiding them through your sales funnel.",
        Feature::LeadGen => "Lead Gen AI automatically collects emails & phone numbers from interested website visitors, building your contact list while you sleep.",
        Feature::Personalization => "Personalization AI adapts responses based on user behavior, location, and preferences to create tailored experiences for each visitor.",
        Feature::Ninja => "Ninja mode provides advanced customization options, letting you fine-tune AI behavior with custom prompts and logic flows.",
    }
}

fn feature_benefit(feature: Feature) -> &'static str {
    match feature {
        Feature::SupportAi => "This could save your team several hours per week on repetitive questions.",
        Feature::SalesAi => "Companies using Sales AI typically see a 35% increase in qualified leads.",
        Feature::LeadGen => "On average, Lead Gen captures 15-20 new contacts per week automatically.",
        Feature::Personalization => "Personalized experiences increase conversion rates by up to 25%.",
        Feature::Ninja => "Advanced users leverage Ninja to create highly specific workflows unique to their business.",
    }
}

fn join_features(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn check_in(customer: &EnrichedCustomer, csm_name: &str) -> EmailTemplate {
    let mut body = String::new();
    let _ = writeln!(body, "Hi there,");
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "I noticed we haven't chatted in a while and wanted to see how things are going with {} for {}.",
        PRODUCT_NAME, customer.customer.company_name
    );
    let _ = writeln!(body);
    let _ = write!(
        body,
        "I saw that you haven't logged in for about {} days",
        customer.days_since_login
    );
    if customer.usage_percentage < 50.0 {
        let _ = write!(
            body,
            " and your conversation usage has dropped to {:.0}%",
            customer.usage_percentage.round()
        );
    }
    let _ = writeln!(body, ".");
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Are you still getting value from the platform? Is there anything we can help with or improve? We're here to make sure {PRODUCT_NAME} works well for your team."
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Would love to catch up this week if you have 15 minutes.");
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = write!(body, "{csm_name}");

    EmailTemplate {
        kind: TemplateKind::CheckIn,
        subject: format!("Just checking in on your {PRODUCT_NAME} experience"),
        body,
    }
}

pub fn upgrade(customer: &EnrichedCustomer, csm_name: &str) -> EmailTemplate {
    let record = &customer.customer;
    let next = record.tier.next();

    let mut body = String::new();
    let _ = writeln!(body, "Hi there,");
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Great news! I noticed you're using {:.0}% of your monthly conversation limit on the {} plan.",
        customer.usage_percentage.round(), record.tier
    );
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Your current tier ({}) handles {} conversations/month, but with your growth, you might benefit from {} ({} conversations/month).",
        record.tier,
        with_thousands(record.monthly_conversation_limit),
        next,
        with_thousands(next.conversation_limit())
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Upgrading would give you:");
    let _ = writeln!(body, "{}", upgrade_benefits(record.tier, next));
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "This would cost an additional ${:.0}/month but would ensure you never hit your conversation limits.",
        customer.uplift().round()
    );
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Interested in a 15-min call to see if it makes sense for {}?",
        record.company_name
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = write!(body, "{csm_name}");

    EmailTemplate {
        kind: TemplateKind::Upgrade,
        subject: format!(
            "Quick idea: Scale {}'s chatbot to the next level",
            record.company_name
        ),
        body,
    }
}

pub fn feature_demo(customer: &EnrichedCustomer, csm_name: &str) -> EmailTemplate {
    let record = &customer.customer;
    let top_unused = record
        .features_not_used
        .first()
        .copied()
        .unwrap_or(Feature::LeadGen);

    let mut body = String::new();
    let _ = writeln!(body, "Hi there,");
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "You're doing amazing with {}{}! I wanted to introduce you to another powerful capability: {}.",
        join_features(&record.features_used),
        if record.features_used.len() > 1 { " features" } else { "" },
        top_unused
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "{}", feature_description(top_unused));
    let _ = writeln!(body);
    let _ = writeln!(body, "{}", feature_benefit(top_unused));
    if record.features_not_used.len() > 1 {
        let _ = writeln!(body);
        let _ = writeln!(
            body,
            "You also have access to {} which could further enhance your setup.",
            join_features(&record.features_not_used[1..])
        );
    }
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Would you like a quick 10-minute walkthrough? I can show you how {} could benefit.",
        record.company_name
    );
    let _ = writeln!(body);
    let _ = writeln!(body, "Best regards,");
    let _ = write!(body, "{csm_name}");

    EmailTemplate {
        kind: TemplateKind::FeatureDemo,
        subject: format!(
            "New feature to explore: {} for {}",
            top_unused, record.company_name
        ),
        body,
    }
}

pub fn render(kind: TemplateKind, customer: &EnrichedCustomer, csm_name: &str) -> EmailTemplate {
    match kind {
        TemplateKind::CheckIn => check_in(customer, csm_name),
        TemplateKind::Upgrade => upgrade(customer, csm_name),
        TemplateKind::FeatureDemo => feature_demo(customer, csm_name),
    }
}

pub fn all_templates(customer: &EnrichedCustomer, csm_name: &str) -> Vec<EmailTemplate> {
    [
        TemplateKind::CheckIn,
        TemplateKind::Upgrade,
        TemplateKind::FeatureDemo,
    ]
    .into_iter()
    .map(|kind| render(kind, customer, csm_name))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich;
    use crate::scoring::tests::{fixture_today, scored_customer};

    #[test]
    fn formats_thousands() {
        assert_eq!(with_thousands(50), "50");
        assert_eq!(with_thousands(1_250), "1,250");
        assert_eq!(with_thousands(999_999), "999,999");
    }

    #[test]
    fn check_in_mentions_usage_drop_only_when_low() {
        let low = enrich(&scored_customer("c", 40, 20, Tier::Growth, 55.0, 1), fixture_today());
        let template = check_in(&low, "Dana");
        assert!(template.body.contains("about 40 days and your conversation usage has dropped to 20%."));
        assert!(template.body.ends_with("Dana"));

        let busy = enrich(&scored_customer("c", 40, 75, Tier::Growth, 55.0, 1), fixture_today());
        assert!(!check_in(&busy, "Dana").body.contains("dropped"));
    }

    #[test]
    fn usage_in_body_rounds_half_up() {
        let mut customer = scored_customer("c", 40, 25, Tier::Growth, 55.0, 1);
        customer.monthly_conversation_limit = 200;
        let template = check_in(&enrich(&customer, fixture_today()), "Dana");
        assert!(template.body.contains("dropped to 13%."));
    }

    #[test]
    fn upgrade_quotes_next_tier_and_uplift() {
        let mut customer = scored_customer("c", 3, 90, Tier::Growth, 55.0, 1);
        customer.monthly_conversation_limit = 500;
        customer.conversations_used_this_month = 450;
        let template = upgrade(&enrich(&customer, fixture_today()), DEFAULT_CSM_NAME);

        assert_eq!(template.kind, TemplateKind::Upgrade);
        assert!(template.body.contains("handles 500 conversations/month"));
        assert!(template.body.contains("from Scale (1,250 conversations/month)"));
        assert!(template.body.contains("1,250 monthly conversations (up from 500)"));
        assert!(template.body.contains("additional $64/month"));
    }

    #[test]
    fn feature_demo_leads_with_first_unused_feature() {
        let customer = scored_customer("c", 3, 60, Tier::Growth, 55.0, 3);
        let template = feature_demo(&enrich(&customer, fixture_today()), "Dana");
        assert!(template.subject.starts_with("New feature to explore: Support AI"));
        assert!(template.body.contains("You also have access to Sales AI, Lead Gen"));
    }

    #[test]
    fn renders_all_three_kinds() {
        let customer = enrich(&scored_customer("c", 3, 60, Tier::Free, 0.0, 0), fixture_today());
        let kinds: Vec<TemplateKind> = all_templates(&customer, "Dana")
            .into_iter()
            .map(|template| template.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![TemplateKind::CheckIn, TemplateKind::Upgrade, TemplateKind::FeatureDemo]
        );
    }
}
