use std::sync::Arc;

use concierge_core::{
    config::Config,
    ports::{CompletionPort, SearchPort, StoragePort},
};
use concierge_gemini::GeminiClient;
use concierge_search::DuckDuckGoClient;
use concierge_storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), concierge_core::Error> {
    concierge_core::logging::init("concierge")?;

    let cfg = Arc::new(Config::load()?);

    // One store handle and one client per service, built here and injected;
    // nothing reaches them through globals.
    let store: Arc<dyn StoragePort> =
        Arc::new(SqliteStore::open(&cfg.database_path.to_string_lossy()).await?);
    let completion: Arc<dyn CompletionPort> = Arc::new(GeminiClient::new(
        cfg.gemini_api_key.clone(),
        cfg.gemini_model.clone(),
        cfg.query_timeout,
    ));
    let search: Arc<dyn SearchPort> = Arc::new(DuckDuckGoClient::new(
        cfg.search_endpoint.clone(),
        cfg.query_timeout,
    ));

    concierge_telegram::router::run_polling(cfg, completion, search, store)
        .await
        .map_err(|e| concierge_core::Error::ServiceUnavailable(format!("telegram bot failed: {e}")))?;

    Ok(())
}
