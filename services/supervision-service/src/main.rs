use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing::{info, Level};

mod config;
mod engine;
mod handlers;
mod supervision_service;

use supervision_common::adapters::{HmacSigningAdapter, InMemoryCounterStore, InMemoryDataStore, InMemoryNotifier, SigningAdapter};
use supervision_service::SupervisionService;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    dotenv::dotenv().ok();
    let config = config::load()?;
    let server_config = config::load_server()?;

    info!("Starting supervision-service on {}:{}", server_config.host, server_config.port);

    // Dev-mode fallbacks: the durable store, atomic counter, signing key,
    // and notification channel are all external collaborators this crate
    // only specifies the interface of. In `dev_mode` they run in-process.
    // Kept as concrete types here so the same objects can be coerced into
    // both their functional trait (`DataStore`, `CounterStore`, ...) and
    // `Adapter`, for `SupervisionService::health_check` to fan out to.
    let data_store_concrete = Arc::new(InMemoryDataStore::new());
    let counter_store_concrete = Arc::new(InMemoryCounterStore::new());
    let signer_concrete = Arc::new(HmacSigningAdapter::new(
        &config.audit_signing_key_id,
        std::env::var("L08_AUDIT_SIGNING_KEY").unwrap_or_else(|_| "dev-only-signing-key".to_string()).into_bytes(),
    ));
    let notifier_concrete = Arc::new(InMemoryNotifier::new());

    let health_adapters: Vec<Arc<dyn supervision_common::adapters::Adapter>> = vec![
        data_store_concrete.clone(),
        counter_store_concrete.clone(),
        signer_concrete.clone(),
        notifier_concrete.clone(),
    ];

    let data_store: Arc<dyn supervision_common::adapters::DataStore> = data_store_concrete;
    let counter_store: Arc<dyn supervision_common::adapters::CounterStore> = counter_store_concrete;
    let signer: Option<Arc<dyn SigningAdapter>> = Some(signer_concrete);
    let notifier: Arc<dyn supervision_common::adapters::NotifierAdapter> = notifier_concrete;

    let service = web::Data::new(SupervisionService::new(
        &config,
        data_store,
        counter_store,
        signer,
        notifier,
        health_adapters,
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind((server_config.host.as_str(), server_config.port))?
    .run()
    .await?;
    Ok(())
}
