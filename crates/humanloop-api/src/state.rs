//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST API.
//! The coordinator and sweeper are generic over repository and callback
//! traits; AppState pins them to the SQLite and HTTP implementations.

use std::path::PathBuf;
use std::sync::Arc;

use humanloop_core::event::EventBus;
use humanloop_core::ledger::InputRequestLedger;
use humanloop_core::resume::ResumeCoordinator;
use humanloop_core::sweeper::ExpirySweeper;
use humanloop_core::tracker::ExecutionTracker;
use humanloop_infra::callback::http::HttpResumeCallback;
use humanloop_infra::config::{
    Timings, load_form_secret, load_global_config, resolve_data_dir, resolve_timings,
};
use humanloop_infra::crypto::token::FormTokenSigner;
use humanloop_infra::sqlite::api_key::SqliteApiKeyStore;
use humanloop_infra::sqlite::execution::SqliteExecutionRepository;
use humanloop_infra::sqlite::input_request::SqliteInputRequestRepository;
use humanloop_infra::sqlite::pool::{DatabasePool, database_url};
use humanloop_types::config::GlobalConfig;
use secrecy::SecretString;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteLedger = InputRequestLedger<SqliteInputRequestRepository>;

pub type ConcreteTracker = ExecutionTracker<SqliteExecutionRepository, SqliteInputRequestRepository>;

pub type ConcreteCoordinator = ResumeCoordinator<
    SqliteExecutionRepository,
    SqliteInputRequestRepository,
    HttpResumeCallback,
>;

pub type ConcreteSweeper = ExpirySweeper<SqliteExecutionRepository, SqliteInputRequestRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ConcreteCoordinator>,
    pub sweeper: Arc<ConcreteSweeper>,
    pub api_keys: Arc<SqliteApiKeyStore>,
    pub form_tokens: Arc<FormTokenSigner>,
    pub events: EventBus,
    pub config: Arc<GlobalConfig>,
    pub timings: Timings,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state from the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::init_at(resolve_data_dir()).await
    }

    /// Connect to `{data_dir}/humanloop.db` and wire services.
    pub async fn init_at(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_global_config(&data_dir).await;
        let timings = resolve_timings(&config);
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let ledger = Arc::new(InputRequestLedger::new(
            SqliteInputRequestRepository::new(db_pool.clone()),
            chrono::Duration::from_std(timings.claim_ttl)?,
        ));
        let tracker = Arc::new(ExecutionTracker::new(
            SqliteExecutionRepository::new(db_pool.clone()),
            ledger.clone(),
        ));

        let signing_secret = config
            .resume
            .signing_secret
            .clone()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);
        let callback = HttpResumeCallback::new(timings.resume_timeout, signing_secret)?;

        let events = EventBus::default();
        let coordinator = ResumeCoordinator::new(
            tracker.clone(),
            ledger.clone(),
            callback,
            events.clone(),
        );
        let sweeper = ExpirySweeper::new(tracker, ledger, events.clone());

        let form_secret = load_form_secret(&data_dir, &config).await?;

        Ok(Self {
            coordinator: Arc::new(coordinator),
            sweeper: Arc::new(sweeper),
            api_keys: Arc::new(SqliteApiKeyStore::new(db_pool.clone())),
            form_tokens: Arc::new(FormTokenSigner::new(form_secret)),
            events,
            config: Arc::new(config),
            timings,
            data_dir,
            db_pool,
        })
    }
}
