pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use std::sync::Arc;

use services::availability::AvailabilityService;
use services::blocks::BlackoutRegistry;
use services::calendar::OperatingCalendar;
use services::ledger::ReservationLedger;
use services::notify::{NotificationSink, NullNotifier, WebhookNotifier};
use services::payment::{HttpPaymentGateway, PaymentGateway};
use services::slots::SlotGenerator;
use store::{PgStore, ReservationStore};

// Shared state for the whole application
pub struct AppState {
    pub config: config::Config,
    pub calendar: Arc<OperatingCalendar>,
    pub store: Arc<dyn ReservationStore>,
    pub slots: SlotGenerator,
    pub availability: AvailabilityService,
    pub blocks: BlackoutRegistry,
    pub ledger: ReservationLedger,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;

        db.run_migrations().await?;

        let store: Arc<dyn ReservationStore> = Arc::new(PgStore::new(db));
        let calendar = Arc::new(match &config.calendar.hours_file {
            Some(path) => OperatingCalendar::load(path)?,
            None => OperatingCalendar::default(),
        });
        let payments: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::from_config(
            &config.payment,
            &config.circuit_breaker,
        ));
        let notifier: Arc<dyn NotificationSink> = match &config.notification.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)),
            None => Arc::new(NullNotifier),
        };

        let state = Arc::new(Self {
            slots: SlotGenerator::new(calendar.clone()),
            availability: AvailabilityService::new(store.clone()),
            blocks: BlackoutRegistry::new(store.clone()),
            ledger: ReservationLedger::new(store.clone(), calendar.clone(), payments, notifier),
            calendar,
            store,
            config,
        });

        Ok(state)
    }
}
