use std::{sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "smartbudget={level},server={level},engine={level},integrations={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let timeout = Duration::from_secs(settings.paystack.timeout_secs);

    let gateway = integrations::PaystackClient::new(
        &settings.paystack.base_url,
        settings.paystack.secret_key.clone(),
        timeout,
    )?;
    let notifier = integrations::HttpNotifier::new(
        settings.notifications.sendgrid_api_key.clone(),
        settings.notifications.from_email.clone(),
        settings.notifications.discord_webhook_url.as_deref(),
        timeout,
    )?;

    let engine = engine::Engine::builder()
        .database(db)
        .gateway(Arc::new(gateway))
        .notifier(Arc::new(notifier))
        .gateway_timeout(timeout)
        .webhook_secret(settings.webhook_secret().as_bytes().to_vec())
        .build()
        .await?;
    let engine = Arc::new(engine);

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let server_engine = Arc::clone(&engine);
    tasks.spawn(async move {
        server::run(server_engine, &addr).await;
    });

    if settings.jobs.enabled {
        let tick = Duration::from_secs(settings.jobs.tick_secs.max(1));
        let jobs_engine = Arc::clone(&engine);
        tasks.spawn(async move {
            tracing::info!("settlement jobs every {}s", tick.as_secs());
            run_jobs(jobs_engine, tick).await;
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn run_jobs(engine: Arc<engine::Engine>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let summary = engine.run_settlement_jobs(chrono::Utc::now()).await;
        tracing::info!(
            renewed_budgets = summary.renewed_budgets,
            reminders = summary.reminders_sent,
            auto_paid = summary.auto_pay.paid.len(),
            auto_pay_failed = summary.auto_pay.failed.len(),
            recurring = summary.recurring.processed.len(),
            recurring_failed = summary.recurring.failed.len(),
            budget_alerts = summary.budget_alerts,
            "settlement jobs finished"
        );
    }
}

async fn parse_database(config: &Database) -> Result<sea_orm::DatabaseConnection, BoxError> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
