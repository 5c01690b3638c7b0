use anyhow::Context;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};

use crate::models::{ContactLog, Customer, CustomerUpdate, Feature, Sentiment, Task, Tier};
use crate::store::CustomerStore;

const CUSTOMER_COLUMNS: &str = "customer_id, company_name, tier, signup_date, last_login_date, \
     monthly_conversation_limit, conversations_used_this_month, conversation_trend, \
     monthly_recurring_revenue, features_used, features_not_used, support_tickets_last_month, \
     language, team_members, industry, country, last_contact_date, sentiment";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn to_db_int(value: u32, column: &str) -> anyhow::Result<i32> {
    i32::try_from(value).with_context(|| format!("{column} out of range: {value}"))
}

fn from_db_int(value: i32, column: &str) -> anyhow::Result<u32> {
    u32::try_from(value).with_context(|| format!("{column} must not be negative: {value}"))
}

fn feature_labels(features: &[Feature]) -> Vec<String> {
    features.iter().map(|f| f.as_str().to_string()).collect()
}

fn parse_features(labels: &[String]) -> anyhow::Result<Vec<Feature>> {
    labels.iter().map(|label| label.parse::<Feature>()).collect()
}

fn customer_from_row(row: &PgRow) -> anyhow::Result<Customer> {
    let tier: String = row.try_get("tier")?;
    let sentiment: String = row.try_get("sentiment")?;
    let trend: Vec<i32> = row.try_get("conversation_trend")?;
    let features_used: Vec<String> = row.try_get("features_used")?;
    let features_not_used: Vec<String> = row.try_get("features_not_used")?;

    Ok(Customer {
        customer_id: row.try_get("customer_id")?,
        company_name: row.try_get("company_name")?,
        tier: tier.parse()?,
        signup_date: row.try_get("signup_date")?,
        last_login_date: row.try_get("last_login_date")?,
        monthly_conversation_limit: from_db_int(
            row.try_get("monthly_conversation_limit")?,
            "monthly_conversation_limit",
        )?,
        conversations_used_this_month: from_db_int(
            row.try_get("conversations_used_this_month")?,
            "conversations_used_this_month",
        )?,
        conversation_trend: trend
            .into_iter()
            .map(|value| from_db_int(value, "conversation_trend"))
            .collect::<anyhow::Result<_>>()?,
        monthly_recurring_revenue: row.try_get("monthly_recurring_revenue")?,
        features_used: parse_features(&features_used)?,
        features_not_used: parse_features(&features_not_used)?,
        support_tickets_last_month: from_db_int(
            row.try_get("support_tickets_last_month")?,
            "support_tickets_last_month",
        )?,
        language: row.try_get("language")?,
        team_members: from_db_int(row.try_get("team_members")?, "team_members")?,
        industry: row.try_get("industry")?,
        country: row.try_get("country")?,
        last_contact_date: row.try_get("last_contact_date")?,
        sentiment: sentiment.parse()?,
    })
}

async fn upsert_customer(conn: &mut PgConnection, customer: &Customer) -> anyhow::Result<()> {
    let trend = customer
        .conversation_trend
        .iter()
        .map(|value| to_db_int(*value, "conversation_trend"))
        .collect::<anyhow::Result<Vec<i32>>>()?;

    sqlx::query(
        r#"
        INSERT INTO customer_success.customers
        (customer_id, company_name, tier, signup_date, last_login_date,
         monthly_conversation_limit, conversations_used_this_month, conversation_trend,
         monthly_recurring_revenue, features_used, features_not_used, support_tickets_last_month,
         language, team_members, industry, country, last_contact_date, sentiment)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (customer_id) DO UPDATE
        SET company_name = EXCLUDED.company_name,
            tier = EXCLUDED.tier,
            signup_date = EXCLUDED.signup_date,
            last_login_date = EXCLUDED.last_login_date,
            monthly_conversation_limit = EXCLUDED.monthly_conversation_limit,
            conversations_used_this_month = EXCLUDED.conversations_used_this_month,
            conversation_trend = EXCLUDED.conversation_trend,
            monthly_recurring_revenue = EXCLUDED.monthly_recurring_revenue,
            features_used = EXCLUDED.features_used,
            features_not_used = EXCLUDED.features_not_used,
            support_tickets_last_month = EXCLUDED.support_tickets_last_month,
            language = EXCLUDED.language,
            team_members = EXCLUDED.team_members,
            industry = EXCLUDED.industry,
            country = EXCLUDED.country,
            last_contact_date = EXCLUDED.last_contact_date,
            sentiment = EXCLUDED.sentiment
        "#,
    )
    .bind(&customer.customer_id)
    .bind(&customer.company_name)
    .bind(customer.tier.as_str())
    .bind(customer.signup_date)
    .bind(customer.last_login_date)
    .bind(to_db_int(
        customer.monthly_conversation_limit,
        "monthly_conversation_limit",
    )?)
    .bind(to_db_int(
        customer.conversations_used_this_month,
        "conversations_used_this_month",
    )?)
    .bind(trend)
    .bind(customer.monthly_recurring_revenue)
    .bind(feature_labels(&customer.features_used))
    .bind(feature_labels(&customer.features_not_used))
    .bind(to_db_int(
        customer.support_tickets_last_month,
        "support_tickets_last_month",
    )?)
    .bind(&customer.language)
    .bind(to_db_int(customer.team_members, "team_members")?)
    .bind(&customer.industry)
    .bind(&customer.country)
    .bind(customer.last_contact_date)
    .bind(customer.sentiment.as_str())
    .execute(conn)
    .await?;

    Ok(())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CustomerStore for PgStore {
    async fn list_customers(&self) -> anyhow::Result<Vec<Customer>> {
        let query = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_success.customers ORDER BY customer_id"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        debug!(count = rows.len(), "loaded customers");
        rows.iter().map(customer_from_row).collect()
    }

    async fn find_customer(&self, customer_id: &str) -> anyhow::Result<Option<Customer>> {
        let query = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_success.customers WHERE customer_id = $1"
        );
        let row = sqlx::query(&query)
            .bind(customer_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        update: CustomerUpdate,
    ) -> anyhow::Result<Option<Customer>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent merges into the same customer.
        let query = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_success.customers \
             WHERE customer_id = $1 FOR UPDATE"
        );
        let Some(row) = sqlx::query(&query)
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut customer = customer_from_row(&row)?;
        update.apply(&mut customer);
        upsert_customer(&mut tx, &customer).await?;
        tx.commit().await?;

        Ok(Some(customer))
    }

    async fn record_contact(&self, log: &ContactLog) -> anyhow::Result<Option<Customer>> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer_success.customers \
             WHERE customer_id = $1 FOR UPDATE"
        );
        let Some(row) = sqlx::query(&query)
            .bind(&log.customer_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut customer = customer_from_row(&row)?;
        customer.last_contact_date = log.contacted_at.date_naive();
        sqlx::query(
            "UPDATE customer_success.customers SET last_contact_date = $2 WHERE customer_id = $1",
        )
        .bind(&customer.customer_id)
        .bind(customer.last_contact_date)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO customer_success.contact_logs
            (id, customer_id, contacted_at, channel, subject, notes, csm_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(&log.customer_id)
        .bind(log.contacted_at)
        .bind(log.channel.as_str())
        .bind(&log.subject)
        .bind(&log.notes)
        .bind(&log.csm_name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(customer))
    }

    async fn count_contacted_since(&self, since: DateTime<Utc>) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(DISTINCT customer_id) AS contacted \
             FROM customer_success.contact_logs WHERE contacted_at >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?
        .try_get("contacted")?;
        Ok(usize::try_from(count)?)
    }

    async fn insert_task(&self, task: &Task) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO customer_success.tasks
            (id, customer_id, title, description, created_at, due_date, completed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.id)
        .bind(&task.customer_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.created_at)
        .bind(task.due_date)
        .bind(task.completed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn tasks_for(&self, customer_id: &str) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT id, customer_id, title, description, created_at, due_date, completed \
             FROM customer_success.tasks WHERE customer_id = $1 ORDER BY created_at",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(Task {
                id: row.try_get("id")?,
                customer_id: row.try_get("customer_id")?,
                title: row.try_get("title")?,
                description: row.try_get("description")?,
                created_at: row.try_get("created_at")?,
                due_date: row.try_get("due_date")?,
                completed: row.try_get("completed")?,
            });
        }
        Ok(tasks)
    }
}

#[allow(clippy::too_many_arguments)]
fn seed_customer(
    today: NaiveDate,
    customer_id: &str,
    company_name: &str,
    tier: Tier,
    (limit, used): (u32, u32),
    mrr: f64,
    (days_since_login, days_since_contact): (i64, i64),
    tickets: u32,
    sentiment: Sentiment,
    features_used: &[Feature],
    (industry, country): (&str, &str),
) -> Customer {
    let features_not_used = Feature::ALL
        .into_iter()
        .filter(|f| !features_used.contains(f))
        .collect();

    Customer {
        customer_id: customer_id.to_string(),
        company_name: company_name.to_string(),
        tier,
        signup_date: today - Duration::days(365),
        last_login_date: today - Duration::days(days_since_login),
        monthly_conversation_limit: limit,
        conversations_used_this_month: used,
        conversation_trend: vec![used * 9 / 10, used * 19 / 20, used],
        monthly_recurring_revenue: mrr,
        features_used: features_used.to_vec(),
        features_not_used,
        support_tickets_last_month: tickets,
        language: "en".to_string(),
        team_members: 5,
        industry: industry.to_string(),
        country: country.to_string(),
        last_contact_date: today - Duration::days(days_since_contact),
        sentiment,
    }
}

pub fn seed_customers(today: NaiveDate) -> Vec<Customer> {
    use Feature::*;

    vec![
        seed_customer(
            today,
            "cust_001",
            "Brightside Dental",
            Tier::Startup,
            (125, 18),
            29.0,
            (52, 70),
            4,
            Sentiment::Negative,
            &[SupportAi],
            ("Healthcare", "US"),
        ),
        seed_customer(
            today,
            "cust_002",
            "Lumen Outfitters",
            Tier::Growth,
            (500, 470),
            119.0,
            (1, 12),
            1,
            Sentiment::Positive,
            &[SupportAi, SalesAi],
            ("Retail", "GB"),
        ),
        seed_customer(
            today,
            "cust_003",
            "Harbor Logistics",
            Tier::Scale,
            (1_250, 1_180),
            119.0,
            (3, 25),
            0,
            Sentiment::Positive,
            &[SupportAi, SalesAi, LeadGen],
            ("Logistics", "NL"),
        ),
        seed_customer(
            today,
            "cust_004",
            "Quillwork Studio",
            Tier::Growth,
            (500, 120),
            55.0,
            (36, 40),
            2,
            Sentiment::Neutral,
            &[SupportAi],
            ("Design", "DE"),
        ),
        seed_customer(
            today,
            "cust_005",
            "Pinecrest Realty",
            Tier::Enterprise,
            (999_999, 410_000),
            899.0,
            (6, 9),
            5,
            Sentiment::Neutral,
            &[SupportAi, SalesAi, LeadGen, Personalization],
            ("Real Estate", "US"),
        ),
        seed_customer(
            today,
            "cust_006",
            "Cobalt Fitness",
            Tier::Free,
            (50, 4),
            0.0,
            (75, 90),
            0,
            Sentiment::Neutral,
            &[],
            ("Fitness", "AU"),
        ),
        seed_customer(
            today,
            "cust_007",
            "Verdant Grocers",
            Tier::Growth,
            (500, 395),
            119.0,
            (2, 6),
            1,
            Sentiment::Positive,
            &[SupportAi, LeadGen],
            ("Grocery", "CA"),
        ),
        seed_customer(
            today,
            "cust_008",
            "Atlas Legal",
            Tier::Startup,
            (125, 60),
            29.0,
            (14, 30),
            6,
            Sentiment::Negative,
            &[SupportAi],
            ("Legal", "IE"),
        ),
    ]
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let customers = seed_customers(Utc::now().date_naive());
    let mut tx = pool.begin().await?;
    for customer in &customers {
        upsert_customer(&mut tx, customer).await?;
    }
    tx.commit().await?;

    info!(count = customers.len(), "seeded customers");
    Ok(customers.len())
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    customer_id: String,
    company_name: String,
    tier: String,
    signup_date: NaiveDate,
    last_login_date: NaiveDate,
    monthly_conversation_limit: u32,
    conversations_used_this_month: u32,
    monthly_recurring_revenue: f64,
    features_used: Option<String>,
    support_tickets_last_month: u32,
    language: Option<String>,
    team_members: Option<u32>,
    industry: Option<String>,
    country: Option<String>,
    last_contact_date: NaiveDate,
    sentiment: String,
}

/// Features are `;`-separated in CSV cells; the unused list is the remainder of the vocabulary.
fn split_features(cell: Option<&str>) -> anyhow::Result<Vec<Feature>> {
    cell.unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(|label| label.parse::<Feature>())
        .collect()
}

impl TryFrom<CsvRow> for Customer {
    type Error = anyhow::Error;

    fn try_from(row: CsvRow) -> anyhow::Result<Self> {
        let features_used = split_features(row.features_used.as_deref())
            .with_context(|| format!("invalid features for {}", row.customer_id))?;
        let features_not_used = Feature::ALL
            .into_iter()
            .filter(|f| !features_used.contains(f))
            .collect();

        Ok(Customer {
            tier: row
                .tier
                .parse()
                .with_context(|| format!("invalid tier for {}", row.customer_id))?,
            sentiment: row
                .sentiment
                .parse()
                .with_context(|| format!("invalid sentiment for {}", row.customer_id))?,
            company_name: row.company_name,
            signup_date: row.signup_date,
            last_login_date: row.last_login_date,
            monthly_conversation_limit: row.monthly_conversation_limit,
            conversations_used_this_month: row.conversations_used_this_month,
            conversation_trend: vec![row.conversations_used_this_month],
            monthly_recurring_revenue: row.monthly_recurring_revenue,
            features_used,
            features_not_used,
            support_tickets_last_month: row.support_tickets_last_month,
            language: row.language.unwrap_or_else(|| "en".to_string()),
            team_members: row.team_members.unwrap_or(1),
            industry: row.industry.unwrap_or_default(),
            country: row.country.unwrap_or_default(),
            last_contact_date: row.last_contact_date,
            customer_id: row.customer_id,
        })
    }
}

pub fn read_csv<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<Customer>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut customers = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV record {}", index + 1))?;
        customers.push(Customer::try_from(row)?);
    }
    Ok(customers)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let customers = read_csv(file)?;

    let mut tx = pool.begin().await?;
    for customer in &customers {
        upsert_customer(&mut tx, customer).await?;
    }
    tx.commit().await?;

    info!(count = customers.len(), path = %csv_path.display(), "imported customers");
    Ok(customers.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::enrich_all;
    use crate::ranking::priority_list;

    #[test]
    fn reads_customers_from_csv() {
        let data = "\
customer_id,company_name,tier,signup_date,last_login_date,monthly_conversation_limit,conversations_used_this_month,monthly_recurring_revenue,features_used,support_tickets_last_month,language,team_members,industry,country,last_contact_date,sentiment
cust_101,Maple Cafe,growth,2025-01-10,2026-02-20,500,410,55,Support AI;Lead Gen,2,en,4,Food,CA,2026-02-01,positive
cust_102,Orbit Labs,Startup,2025-06-01,2026-01-01,125,10,29,,0,,,,,2025-12-15,negative
";
        let customers = read_csv(data.as_bytes()).unwrap();
        assert_eq!(customers.len(), 2);

        let maple = &customers[0];
        assert_eq!(maple.tier, Tier::Growth);
        assert_eq!(maple.features_used, vec![Feature::SupportAi, Feature::LeadGen]);
        assert_eq!(
            maple.features_not_used,
            vec![Feature::SalesAi, Feature::Personalization, Feature::Ninja]
        );

        let orbit = &customers[1];
        assert!(orbit.features_used.is_empty());
        assert_eq!(orbit.features_not_used.len(), 5);
        assert_eq!(orbit.language, "en");
        assert_eq!(orbit.team_members, 1);
    }

    #[test]
    fn rejects_unknown_tier_in_csv() {
        let data = "\
customer_id,company_name,tier,signup_date,last_login_date,monthly_conversation_limit,conversations_used_this_month,monthly_recurring_revenue,features_used,support_tickets_last_month,language,team_members,industry,country,last_contact_date,sentiment
cust_103,Nova,Platinum,2025-01-10,2026-02-20,500,410,55,,0,en,1,,,2026-02-01,neutral
";
        assert!(read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn seed_book_covers_every_outreach_bucket() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let customers = enrich_all(&seed_customers(today), today);
        let items = priority_list(&customers);
        let actions: Vec<&str> = items.iter().map(|item| item.action).collect();

        assert!(actions.contains(&"Check-in call"));
        assert!(actions.contains(&"Upgrade call"));
        assert!(actions.contains(&"Feature demo"));
    }
}
