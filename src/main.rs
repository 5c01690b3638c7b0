use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod analytics;
mod db;
mod enrich;
mod error;
mod models;
mod ranking;
mod report;
mod scoring;
mod service;
mod store;
mod telemetry;
mod templates;

use db::PgStore;
use models::{ContactChannel, EnrichedCustomer, TemplateKind};
use service::{Dashboard, ListFilter, ListSort, NewTask};

#[derive(Parser)]
#[command(name = "cs-scoring")]
#[command(about = "Churn and expansion scoring for customer success teams", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a sample book of customers
    Seed,
    /// Import customers from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List customers with their scores
    List {
        #[arg(long, value_enum)]
        filter: Option<ListFilter>,
        #[arg(long, value_enum)]
        sort: Option<ListSort>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Show one customer with its scores
    Show {
        #[arg(long)]
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Merge field changes into a customer, e.g. --set '{"tier": "Scale"}'
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        set: String,
    },
    /// Print the prioritized outreach queue
    Priority {
        #[arg(long)]
        json: bool,
    },
    /// Print aggregate churn and expansion metrics
    Analytics {
        #[arg(long)]
        json: bool,
    },
    /// Render outreach emails for a customer
    Email {
        #[arg(long)]
        id: String,
        /// check-in, upgrade or feature-demo; all three when omitted
        #[arg(long)]
        kind: Option<TemplateKind>,
        #[arg(long, default_value = templates::DEFAULT_CSM_NAME)]
        csm_name: String,
    },
    /// Record an outreach to a customer
    Contact {
        #[arg(long)]
        id: String,
        #[arg(long, default_value = "email")]
        channel: ContactChannel,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        csm_name: Option<String>,
    },
    /// Manage follow-up tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = ranking::DEFAULT_TOP_COUNT)]
        top: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create a task for a customer
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// List tasks for a customer
    List {
        #[arg(long)]
        id: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_customer(customer: &EnrichedCustomer) {
    println!(
        "- {} {} ({}, ${:.0}/mo) {} | churn {:.2} | expansion {:.2} | usage {:.0}% | login {}d ago | contact {}d ago",
        customer.customer.customer_id,
        customer.customer.company_name,
        customer.customer.tier,
        customer.customer.monthly_recurring_revenue.round(),
        customer.account_health,
        customer.churn_risk_score,
        customer.expansion_score,
        customer.usage_percentage.round(),
        customer.days_since_login,
        customer.days_since_last_contact
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let dashboard = Dashboard::new(PgStore::new(pool.clone()));

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let seeded = db::seed(&pool).await?;
            println!("Seeded {seeded} customers.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} customers from {}.", csv.display());
        }
        Commands::List {
            filter,
            sort,
            limit,
            json,
        } => {
            let mut customers = dashboard.list(filter, sort).await?;
            if let Some(limit) = limit {
                customers.truncate(limit);
            }

            if json {
                return print_json(&customers);
            }
            if customers.is_empty() {
                println!("No customers match.");
                return Ok(());
            }
            for customer in customers.iter() {
                print_customer(customer);
            }
        }
        Commands::Show { id, json } => {
            let customer = dashboard.get(&id).await?;
            if json {
                return print_json(&customer);
            }
            print_customer(&customer);
            println!("  churn: {}", ranking::churn_reason(&customer));
            println!("  expansion: {}", ranking::expansion_reason(&customer));
        }
        Commands::Update { id, set } => {
            let customer = dashboard.update_json(&id, &set).await?;
            println!("Updated {id}.");
            print_customer(&customer);
        }
        Commands::Priority { json } => {
            let items = dashboard.priorities().await?;
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("No customers need outreach right now.");
                return Ok(());
            }
            for item in items.iter() {
                println!(
                    "{:>2}. [{}] {} - {} -> {} ({} min)",
                    item.rank,
                    item.priority.as_str(),
                    item.customer.customer.company_name,
                    item.reason,
                    item.action,
                    item.time_estimate_minutes
                );
            }
            println!(
                "Estimated time: {} min",
                ranking::total_time_minutes(&items)
            );
        }
        Commands::Analytics { json } => {
            let summary = dashboard.analytics().await?;
            if json {
                return print_json(&summary);
            }
            println!("Customers: {}", summary.total_customers);
            println!(
                "Health: {} healthy, {} at risk, {} critical",
                summary.health_distribution.healthy,
                summary.health_distribution.at_risk,
                summary.health_distribution.critical
            );
            println!(
                "Churn rate: {:.1}% ({} at risk)",
                summary.churn_rate, summary.customers_at_risk
            );
            println!(
                "Expansion: {} opportunities worth ${:.0}/mo",
                summary.expansion_opportunities, summary.expansion_revenue
            );
            println!(
                "MRR: ${:.0}, average usage {:.0}%, contacted this week: {}",
                summary.total_mrr.round(),
                summary.average_usage.round(),
                summary.contacted_this_week
            );
        }
        Commands::Email { id, kind, csm_name } => {
            let emails = dashboard.email_templates(&id, kind, &csm_name).await?;
            for email in emails.iter() {
                println!("Subject: {}", email.subject);
                println!();
                println!("{}", email.body);
                println!();
            }
        }
        Commands::Contact {
            id,
            channel,
            notes,
            csm_name,
        } => {
            let log = dashboard.mark_contacted(&id, channel, notes, csm_name).await?;
            println!(
                "Logged {} with {} by {} ({}).",
                log.channel.as_str(),
                id,
                log.csm_name,
                log.id
            );
        }
        Commands::Task { action } => match action {
            TaskCommand::Add {
                id,
                title,
                description,
                due,
            } => {
                let task = dashboard
                    .add_task(
                        &id,
                        NewTask {
                            title,
                            description,
                            due_date: due,
                        },
                    )
                    .await?;
                println!("Created task {} for {id}.", task.id);
            }
            TaskCommand::List { id } => {
                let tasks = dashboard.tasks(&id).await?;
                if tasks.is_empty() {
                    println!("No tasks for {id}.");
                }
                for task in tasks.iter() {
                    let due = task
                        .due_date
                        .map(|date| format!(" due {date}"))
                        .unwrap_or_default();
                    let status = if task.completed { "done" } else { "open" };
                    println!("- [{status}] {}{due}", task.title);
                }
            }
        },
        Commands::Report { top, out } => {
            let customers = dashboard.list(None, None).await?;
            let summary = dashboard.analytics().await?;
            let report = report::build_report(
                Utc::now().date_naive(),
                &customers,
                summary.contacted_this_week,
                top,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(path = %out.display(), "report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
