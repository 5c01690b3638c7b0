use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Startup,
    Growth,
    Scale,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::Free,
        Tier::Startup,
        Tier::Growth,
        Tier::Scale,
        Tier::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Startup => "Startup",
            Tier::Growth => "Growth",
            Tier::Scale => "Scale",
            Tier::Enterprise => "Enterprise",
        }
    }

    /// The plan a customer would move to on upgrade. Enterprise is the ceiling.
    pub fn next(&self) -> Tier {
        match self {
            Tier::Free => Tier::Startup,
            Tier::Startup => Tier::Growth,
            Tier::Growth => Tier::Scale,
            Tier::Scale | Tier::Enterprise => Tier::Enterprise,
        }
    }

    pub fn conversation_limit(&self) -> u32 {
        match self {
            Tier::Free => 50,
            Tier::Startup => 125,
            Tier::Growth => 500,
            Tier::Scale => 1_250,
            Tier::Enterprise => 999_999,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown tier: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl FromStr for Sentiment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => anyhow::bail!("unknown sentiment: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    #[serde(rename = "Support AI")]
    SupportAi,
    #[serde(rename = "Sales AI")]
    SalesAi,
    #[serde(rename = "Lead Gen")]
    LeadGen,
    Personalization,
    Ninja,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::SupportAi,
        Feature::SalesAi,
        Feature::LeadGen,
        Feature::Personalization,
        Feature::Ninja,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::SupportAi => "Support AI",
            Feature::SalesAi => "Sales AI",
            Feature::LeadGen => "Lead Gen",
            Feature::Personalization => "Personalization",
            Feature::Ninja => "Ninja",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown feature: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountHealth {
    Healthy,
    AtRisk,
    Critical,
}

impl AccountHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountHealth::Healthy => "healthy",
            AccountHealth::AtRisk => "at-risk",
            AccountHealth::Critical => "critical",
        }
    }
}

impl fmt::Display for AccountHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer account as stored. Scores are never kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub company_name: String,
    pub tier: Tier,
    pub signup_date: NaiveDate,
    pub last_login_date: NaiveDate,
    pub monthly_conversation_limit: u32,
    pub conversations_used_this_month: u32,
    pub conversation_trend: Vec<u32>,
    pub monthly_recurring_revenue: f64,
    pub features_used: Vec<Feature>,
    pub features_not_used: Vec<Feature>,
    pub support_tickets_last_month: u32,
    pub language: String,
    pub team_members: u32,
    pub industry: String,
    pub country: String,
    pub last_contact_date: NaiveDate,
    pub sentiment: Sentiment,
}

/// Partial field changes for a stored customer. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerUpdate {
    pub company_name: Option<String>,
    pub tier: Option<Tier>,
    pub last_login_date: Option<NaiveDate>,
    pub monthly_conversation_limit: Option<u32>,
    pub conversations_used_this_month: Option<u32>,
    pub conversation_trend: Option<Vec<u32>>,
    pub monthly_recurring_revenue: Option<f64>,
    pub features_used: Option<Vec<Feature>>,
    pub features_not_used: Option<Vec<Feature>>,
    pub support_tickets_last_month: Option<u32>,
    pub language: Option<String>,
    pub team_members: Option<u32>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub last_contact_date: Option<NaiveDate>,
    pub sentiment: Option<Sentiment>,
}

impl CustomerUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.company_name {
            if name.trim().is_empty() {
                return Err("company_name must not be empty".to_string());
            }
        }
        if let Some(mrr) = self.monthly_recurring_revenue {
            if !mrr.is_finite() || mrr < 0.0 {
                return Err(format!(
                    "monthly_recurring_revenue must be a non-negative amount, got {mrr}"
                ));
            }
        }

        let counts = [
            ("monthly_conversation_limit", self.monthly_conversation_limit),
            ("conversations_used_this_month", self.conversations_used_this_month),
            ("support_tickets_last_month", self.support_tickets_last_month),
            ("team_members", self.team_members),
        ];
        for (field, value) in counts {
            if let Some(value) = value {
                check_count(field, value)?;
            }
        }
        if let Some(trend) = &self.conversation_trend {
            for value in trend.iter() {
                check_count("conversation_trend", *value)?;
            }
        }

        if let Some(used) = &self.features_used {
            check_distinct("features_used", used)?;
        }
        if let Some(not_used) = &self.features_not_used {
            check_distinct("features_not_used", not_used)?;
        }
        if let (Some(used), Some(not_used)) = (&self.features_used, &self.features_not_used) {
            if let Some(feature) = used.iter().find(|feature| not_used.contains(feature)) {
                return Err(format!(
                    "{feature} cannot be both in features_used and features_not_used"
                ));
            }
        }
        Ok(())
    }

    pub fn apply(self, customer: &mut Customer) {
        if let Some(value) = self.company_name {
            customer.company_name = value;
        }
        if let Some(value) = self.tier {
            customer.tier = value;
        }
        if let Some(value) = self.last_login_date {
            customer.last_login_date = value;
        }
        if let Some(value) = self.monthly_conversation_limit {
            customer.monthly_conversation_limit = value;
        }
        if let Some(value) = self.conversations_used_this_month {
            customer.conversations_used_this_month = value;
        }
        if let Some(value) = self.conversation_trend {
            customer.conversation_trend = value;
        }
        if let Some(value) = self.monthly_recurring_revenue {
            customer.monthly_recurring_revenue = value;
        }
        // The two feature lists partition the catalog; patching one side
        // rebuilds the other.
        match (self.features_used, self.features_not_used) {
            (Some(used), Some(not_used)) => {
                customer.features_used = used;
                customer.features_not_used = not_used;
            }
            (Some(used), None) => {
                customer.features_not_used = Feature::ALL
                    .into_iter()
                    .filter(|feature| !used.contains(feature))
                    .collect();
                customer.features_used = used;
            }
            (None, Some(not_used)) => {
                customer
                    .features_used
                    .retain(|feature| !not_used.contains(feature));
                customer.features_not_used = not_used;
            }
            (None, None) => {}
        }
        if let Some(value) = self.support_tickets_last_month {
            customer.support_tickets_last_month = value;
        }
        if let Some(value) = self.language {
            customer.language = value;
        }
        if let Some(value) = self.team_members {
            customer.team_members = value;
        }
        if let Some(value) = self.industry {
            customer.industry = value;
        }
        if let Some(value) = self.country {
            customer.country = value;
        }
        if let Some(value) = self.last_contact_date {
            customer.last_contact_date = value;
        }
        if let Some(value) = self.sentiment {
            customer.sentiment = value;
        }
    }
}

// Counts are stored as Postgres INTEGER.
fn check_count(field: &str, value: u32) -> Result<(), String> {
    if value > i32::MAX as u32 {
        return Err(format!("{field} must be at most {}, got {value}", i32::MAX));
    }
    Ok(())
}

fn check_distinct(field: &str, features: &[Feature]) -> Result<(), String> {
    for (i, feature) in features.iter().enumerate() {
        if features[..i].contains(feature) {
            return Err(format!("{field} lists {feature} more than once"));
        }
    }
    Ok(())
}

/// A customer with every derived field recomputed for a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedCustomer {
    #[serde(flatten)]
    pub customer: Customer,
    pub churn_risk_score: f64,
    pub expansion_score: f64,
    pub account_health: AccountHealth,
    pub potential_mrr: f64,
    pub days_since_login: i64,
    pub days_since_last_contact: i64,
    pub usage_percentage: f64,
}

impl EnrichedCustomer {
    pub fn uplift(&self) -> f64 {
        self.potential_mrr - self.customer.monthly_recurring_revenue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityItem {
    pub rank: usize,
    pub customer: EnrichedCustomer,
    pub reason: String,
    pub action: &'static str,
    pub time_estimate_minutes: u32,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthDistribution {
    pub healthy: usize,
    pub at_risk: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub total_customers: usize,
    pub customers_at_risk: usize,
    pub churn_rate: f64,
    pub expansion_opportunities: usize,
    pub expansion_revenue: f64,
    pub total_mrr: f64,
    pub average_usage: f64,
    pub contacted_this_week: usize,
    pub health_distribution: HealthDistribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactChannel {
    Email,
    Call,
    Meeting,
}

impl ContactChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactChannel::Email => "email",
            ContactChannel::Call => "call",
            ContactChannel::Meeting => "meeting",
        }
    }
}

impl FromStr for ContactChannel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ContactChannel::Email),
            "call" => Ok(ContactChannel::Call),
            "meeting" => Ok(ContactChannel::Meeting),
            other => anyhow::bail!("unknown contact channel: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactLog {
    pub id: Uuid,
    pub customer_id: String,
    pub contacted_at: DateTime<Utc>,
    pub channel: ContactChannel,
    pub subject: String,
    pub notes: String,
    pub csm_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    CheckIn,
    Upgrade,
    FeatureDemo,
}

impl FromStr for TemplateKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "check-in" => Ok(TemplateKind::CheckIn),
            "upgrade" => Ok(TemplateKind::Upgrade),
            "feature-demo" => Ok(TemplateKind::FeatureDemo),
            other => anyhow::bail!("unknown template type: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailTemplate {
    pub kind: TemplateKind,
    pub subject: String,
    pub body: String,
}
