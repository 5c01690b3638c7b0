use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analytics;
use crate::enrich::{enrich, enrich_all};
use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    Analytics, ContactChannel, ContactLog, CustomerUpdate, EmailTemplate, EnrichedCustomer,
    PriorityItem, Task, TemplateKind,
};
use crate::ranking::{self, DEFAULT_AT_RISK_THRESHOLD, DEFAULT_EXPANSION_THRESHOLD};
use crate::store::CustomerStore;
use crate::templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ListFilter {
    AtRisk,
    Expansion,
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ListSort {
    Risk,
    Expansion,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
}

/// Read and update operations over a store. Scores are recomputed on every read.
pub struct Dashboard<S> {
    store: S,
}

impl<S: CustomerStore> Dashboard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn list(
        &self,
        filter: Option<ListFilter>,
        sort: Option<ListSort>,
    ) -> DashboardResult<Vec<EnrichedCustomer>> {
        self.list_on(Self::today(), filter, sort).await
    }

    pub async fn list_on(
        &self,
        today: NaiveDate,
        filter: Option<ListFilter>,
        sort: Option<ListSort>,
    ) -> DashboardResult<Vec<EnrichedCustomer>> {
        let customers = self.store.list_customers().await?;
        let mut enriched = enrich_all(&customers, today);

        enriched = match filter {
            Some(ListFilter::AtRisk) => ranking::filter_at_risk(enriched, DEFAULT_AT_RISK_THRESHOLD),
            Some(ListFilter::Expansion) => {
                ranking::filter_expansion_opportunities(enriched, DEFAULT_EXPANSION_THRESHOLD)
            }
            Some(ListFilter::Healthy) => ranking::filter_healthy(enriched),
            None => enriched,
        };

        match sort {
            Some(ListSort::Risk) => ranking::sort_by_churn_risk(&mut enriched),
            Some(ListSort::Expansion) => ranking::sort_by_expansion(&mut enriched),
            None => {}
        }

        debug!(count = enriched.len(), ?filter, ?sort, "listed customers");
        Ok(enriched)
    }

    pub async fn get(&self, customer_id: &str) -> DashboardResult<EnrichedCustomer> {
        self.get_on(Self::today(), customer_id).await
    }

    pub async fn get_on(
        &self,
        today: NaiveDate,
        customer_id: &str,
    ) -> DashboardResult<EnrichedCustomer> {
        let customer = self
            .store
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| DashboardError::NotFound(customer_id.to_string()))?;
        Ok(enrich(&customer, today))
    }

    /// Parses and validates a JSON patch before merging it.
    pub async fn update_json(
        &self,
        customer_id: &str,
        payload: &str,
    ) -> DashboardResult<EnrichedCustomer> {
        let update: CustomerUpdate = serde_json::from_str(payload)?;
        self.update(customer_id, update).await
    }

    pub async fn update(
        &self,
        customer_id: &str,
        update: CustomerUpdate,
    ) -> DashboardResult<EnrichedCustomer> {
        update.validate().map_err(DashboardError::InvalidUpdate)?;

        let customer = self
            .store
            .update_customer(customer_id, update)
            .await?
            .ok_or_else(|| DashboardError::NotFound(customer_id.to_string()))?;

        info!(customer_id, "customer updated");
        Ok(enrich(&customer, Self::today()))
    }

    pub async fn priorities(&self) -> DashboardResult<Vec<PriorityItem>> {
        let customers = self.list(None, None).await?;
        Ok(ranking::priority_list(&customers))
    }

    pub async fn analytics(&self) -> DashboardResult<Analytics> {
        let customers = self.list(None, None).await?;
        let since = Utc::now() - Duration::days(7);
        let contacted = self.store.count_contacted_since(since).await?;
        Ok(analytics::build_analytics(&customers, contacted))
    }

    pub async fn email_templates(
        &self,
        customer_id: &str,
        kind: Option<TemplateKind>,
        csm_name: &str,
    ) -> DashboardResult<Vec<EmailTemplate>> {
        let customer = self.get(customer_id).await?;
        Ok(match kind {
            Some(kind) => vec![templates::render(kind, &customer, csm_name)],
            None => templates::all_templates(&customer, csm_name),
        })
    }

    /// Logs an outreach and moves the customer's last contact date to today.
    pub async fn mark_contacted(
        &self,
        customer_id: &str,
        channel: ContactChannel,
        notes: Option<String>,
        csm_name: Option<String>,
    ) -> DashboardResult<ContactLog> {
        let log = ContactLog {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            contacted_at: Utc::now(),
            channel,
            subject: "Customer check-in".to_string(),
            notes: notes.unwrap_or_else(|| "Marked as contacted from dashboard".to_string()),
            csm_name: csm_name.unwrap_or_else(|| "CSM Team".to_string()),
        };
        self.store
            .record_contact(&log)
            .await?
            .ok_or_else(|| DashboardError::NotFound(customer_id.to_string()))?;

        info!(customer_id, channel = channel.as_str(), "customer marked as contacted");
        Ok(log)
    }

    pub async fn add_task(&self, customer_id: &str, new_task: NewTask) -> DashboardResult<Task> {
        if new_task.title.trim().is_empty() {
            return Err(DashboardError::InvalidUpdate(
                "task title must not be empty".to_string(),
            ));
        }
        if self.store.find_customer(customer_id).await?.is_none() {
            return Err(DashboardError::NotFound(customer_id.to_string()));
        }

        let task = Task {
            id: Uuid::new_v4(),
            customer_id: customer_id.to_string(),
            title: new_task.title,
            description: new_task.description,
            created_at: Utc::now(),
            due_date: new_task.due_date,
            completed: false,
        };
        self.store.insert_task(&task).await?;

        info!(customer_id, task_id = %task.id, "task created");
        Ok(task)
    }

    pub async fn tasks(&self, customer_id: &str) -> DashboardResult<Vec<Task>> {
        Ok(self.store.tasks_for(customer_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountHealth, Tier};
    use crate::scoring::tests::{fixture_today, scored_customer};
    use crate::store::memory::MemoryStore;

    fn dashboard() -> Dashboard<MemoryStore> {
        Dashboard::new(MemoryStore::with_customers(vec![
            scored_customer("a", 2, 95, Tier::Growth, 119.0, 0),
            scored_customer("b", 58, 10, Tier::Startup, 29.0, 4),
            scored_customer("d", 12, 70, Tier::Scale, 119.0, 2),
        ]))
    }

    #[tokio::test]
    async fn list_applies_filter_and_sort() {
        let dashboard = dashboard();
        let today = fixture_today();

        let at_risk = dashboard
            .list_on(today, Some(ListFilter::AtRisk), None)
            .await
            .unwrap();
        assert_eq!(at_risk.len(), 1);
        assert_eq!(at_risk[0].customer.customer_id, "b");

        let by_expansion = dashboard
            .list_on(today, Some(ListFilter::Expansion), Some(ListSort::Expansion))
            .await
            .unwrap();
        let ids: Vec<&str> = by_expansion
            .iter()
            .map(|c| c.customer.customer_id.as_str())
            .collect();
        assert_eq!(ids, vec!["d", "a"]);

        let healthy = dashboard
            .list_on(today, Some(ListFilter::Healthy), Some(ListSort::Risk))
            .await
            .unwrap();
        assert!(healthy
            .iter()
            .all(|c| c.account_health == AccountHealth::Healthy));
    }

    #[tokio::test]
    async fn missing_customer_is_not_found() {
        let dashboard = dashboard();
        assert!(matches!(
            dashboard.get("nope").await,
            Err(DashboardError::NotFound(id)) if id == "nope"
        ));
        assert!(matches!(
            dashboard.update("nope", CustomerUpdate::default()).await,
            Err(DashboardError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_merges_and_rescores() {
        let dashboard = dashboard();
        let before = dashboard.get_on(fixture_today(), "b").await.unwrap();

        let payload = format!(r#"{{"last_login_date": "{}"}}"#, Utc::now().date_naive());
        let after = dashboard.update_json("b", &payload).await.unwrap();

        assert_eq!(after.days_since_login, 0);
        assert!(after.churn_risk_score < before.churn_risk_score);
        assert_eq!(after.customer.company_name, before.customer.company_name);
    }

    #[tokio::test]
    async fn malformed_update_is_rejected_without_applying() {
        let dashboard = dashboard();
        let err = dashboard
            .update_json("a", r#"{"tier": "Platinum"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpdate(_)));

        let err = dashboard
            .update_json("a", r#"{"company_name": "Renamed", "monthly_recurring_revenue": -1}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpdate(_)));
        let unchanged = dashboard.get("a").await.unwrap();
        assert_eq!(unchanged.customer.company_name, "Company a");
    }

    #[tokio::test]
    async fn feature_lists_must_stay_disjoint() {
        let dashboard = dashboard();
        let before = dashboard.get_on(fixture_today(), "d").await.unwrap();

        let padded = format!(
            r#"{{"features_used": ["Ninja"], "features_not_used": [{}]}}"#,
            vec![r#""Ninja""#; 10].join(", ")
        );
        let err = dashboard.update_json("d", &padded).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpdate(_)));

        let overlap = r#"{"features_used": ["Lead Gen"], "features_not_used": ["Lead Gen"]}"#;
        let err = dashboard.update_json("d", overlap).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpdate(_)));

        let after = dashboard.get_on(fixture_today(), "d").await.unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn oversized_counts_are_invalid_not_storage_errors() {
        let dashboard = dashboard();
        let payload = format!(r#"{{"conversations_used_this_month": {}}}"#, u32::MAX);
        let err = dashboard.update_json("a", &payload).await.unwrap_err();
        assert!(matches!(err, DashboardError::InvalidUpdate(_)));

        let unchanged = dashboard.get("a").await.unwrap();
        assert_eq!(unchanged.customer.conversations_used_this_month, 95);
    }

    #[tokio::test]
    async fn contacting_unknown_customer_logs_nothing() {
        let dashboard = dashboard();
        let missing = dashboard
            .mark_contacted("nope", ContactChannel::Email, None, None)
            .await;
        assert!(matches!(missing, Err(DashboardError::NotFound(id)) if id == "nope"));

        let analytics = dashboard.analytics().await.unwrap();
        assert_eq!(analytics.contacted_this_week, 0);
    }

    #[tokio::test]
    async fn contact_and_tasks_feed_analytics() {
        let dashboard = dashboard();
        let log = dashboard
            .mark_contacted("b", ContactChannel::Call, None, Some("Dana".to_string()))
            .await
            .unwrap();
        assert_eq!(log.csm_name, "Dana");
        assert_eq!(log.notes, "Marked as contacted from dashboard");

        let refreshed = dashboard.get("b").await.unwrap();
        assert_eq!(refreshed.days_since_last_contact, 0);

        let task = dashboard
            .add_task(
                "b",
                NewTask {
                    title: "Schedule QBR".to_string(),
                    description: String::new(),
                    due_date: None,
                },
            )
            .await
            .unwrap();
        assert!(!task.completed);
        assert_eq!(dashboard.tasks("b").await.unwrap(), vec![task]);
        assert!(dashboard.tasks("a").await.unwrap().is_empty());

        let analytics = dashboard.analytics().await.unwrap();
        assert_eq!(analytics.total_customers, 3);
        assert_eq!(analytics.contacted_this_week, 1);
    }

    #[tokio::test]
    async fn tasks_require_known_customer_and_title() {
        let dashboard = dashboard();
        let missing = dashboard
            .add_task(
                "nope",
                NewTask {
                    title: "Call".to_string(),
                    description: String::new(),
                    due_date: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(DashboardError::NotFound(_))));

        let blank = dashboard
            .add_task(
                "a",
                NewTask {
                    title: " ".to_string(),
                    description: String::new(),
                    due_date: None,
                },
            )
            .await;
        assert!(matches!(blank, Err(DashboardError::InvalidUpdate(_))));
    }

    #[tokio::test]
    async fn email_templates_by_kind() {
        let dashboard = dashboard();
        let all = dashboard.email_templates("a", None, "Dana").await.unwrap();
        assert_eq!(all.len(), 3);

        let upgrade = dashboard
            .email_templates("a", Some(TemplateKind::Upgrade), "Dana")
            .await
            .unwrap();
        assert_eq!(upgrade.len(), 1);
        assert_eq!(upgrade[0].kind, TemplateKind::Upgrade);
    }
}
