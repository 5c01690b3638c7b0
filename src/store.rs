use chrono::{DateTime, Utc};

use crate::models::{ContactLog, Customer, CustomerUpdate, Task};

/// Persistence boundary for customer records and the outreach history around them.
///
/// `update_customer` and `record_contact` must write atomically per customer id.
pub trait CustomerStore {
    async fn list_customers(&self) -> anyhow::Result<Vec<Customer>>;

    async fn find_customer(&self, customer_id: &str) -> anyhow::Result<Option<Customer>>;

    /// Merges `update` into the stored record. Returns `None` when no record matches.
    async fn update_customer(
        &self,
        customer_id: &str,
        update: CustomerUpdate,
    ) -> anyhow::Result<Option<Customer>>;

    /// Stores `log` and moves the customer's last contact date to the day it was
    /// taken, both or neither. Returns `None` when no record matches.
    async fn record_contact(&self, log: &ContactLog) -> anyhow::Result<Option<Customer>>;

    async fn count_contacted_since(&self, since: DateTime<Utc>) -> anyhow::Result<usize>;

    async fn insert_task(&self, task: &Task) -> anyhow::Result<()>;

    async fn tasks_for(&self, customer_id: &str) -> anyhow::Result<Vec<Task>>;
}
