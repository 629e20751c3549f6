//! Daemon - the main bridge service
//!
//! Wires configuration into the document store, the assistant client, the
//! function dispatcher and the HTTP server, and schedules maintenance jobs.

use std::path::Path;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::api::ApiServerBuilder;
use crate::assistant::{AssistantApi, OpenAiClient, Orchestrator, VectorStoreApi};
use crate::db::{self, DbPool, DocumentStore, SessionRepo, SubmissionRepo};
use crate::functions::{DocumentSearch, FunctionDispatcher};
use crate::integrations::{FormsRelay, WeatherClient};
use crate::jobs::vector_store::seed_store_id;
use crate::jobs::{
    CleanupJob, CleanupReport, DocumentSync, OptimizeOutcome, SyncReport, VectorStoreOptimizer,
    spawn_periodic,
};
use crate::session::SessionManager;
use crate::station::StationRegistry;
use crate::{Config, Error, Result};

/// The bridge daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
    store: DocumentStore,
    stations: StationRegistry,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened
    pub fn new(config: Config) -> Result<Self> {
        let db = db::init(&config.server.db_path)?;
        tracing::info!(path = %config.server.db_path.display(), "database opened");

        let store = DocumentStore::new(db.clone());
        let stations = StationRegistry::new(config.stations.clone());

        if let Some(id) = &config.openai.vector_store_id {
            seed_store_id(&store, id)?;
        }

        Ok(Self {
            config,
            db,
            store,
            stations,
        })
    }

    fn openai(&self) -> Result<Arc<OpenAiClient>> {
        let key = self
            .config
            .openai
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Arc::new(OpenAiClient::new(
            SecretString::from(key.expose_secret().to_string()),
            self.config.openai.base_url.clone(),
        )))
    }

    fn doc_assistant_id(&self) -> Result<&str> {
        self.config
            .openai
            .doc_assistant_id
            .as_deref()
            .ok_or_else(|| Error::Config("DOC_ASSISTANT_ID is not set".to_string()))
    }

    fn sessions(&self) -> SessionManager {
        SessionManager::new(
            SessionRepo::new(self.store.clone(), self.config.timezone),
            self.config.session,
        )
    }

    fn dispatcher(&self, assistant: Arc<dyn AssistantApi>) -> FunctionDispatcher {
        let mut dispatcher =
            FunctionDispatcher::new(SubmissionRepo::new(self.store.clone()), self.config.timezone);

        match &self.config.weather {
            Some(weather) => {
                dispatcher = dispatcher.with_weather(WeatherClient::new(
                    SecretString::from(weather.api_key.expose_secret().to_string()),
                    weather.base_url.clone(),
                ));
            }
            None => tracing::warn!("WEATHER_API_KEY not set, get_weather unavailable"),
        }

        match &self.config.forms_webhook_url {
            Some(url) => dispatcher = dispatcher.with_relay(FormsRelay::new(url.clone())),
            None => tracing::warn!("FORMS_WEBHOOK_URL not set, submissions will not be relayed"),
        }

        match self.doc_assistant_id() {
            Ok(id) => {
                dispatcher = dispatcher.with_document_search(DocumentSearch::new(
                    assistant,
                    id,
                    self.config.poller(),
                ));
            }
            Err(_) => tracing::warn!("DOC_ASSISTANT_ID not set, document_search unavailable"),
        }

        dispatcher
    }

    fn cleanup_job(&self) -> CleanupJob {
        CleanupJob::new(
            SessionRepo::new(self.store.clone(), self.config.timezone),
            SubmissionRepo::new(self.store.clone()),
            self.stations.clone(),
            self.config.timezone,
        )
    }

    fn optimizer(&self, api: Arc<dyn VectorStoreApi>) -> Result<VectorStoreOptimizer> {
        Ok(VectorStoreOptimizer::new(
            api,
            self.store.clone(),
            self.doc_assistant_id()?,
        ))
    }

    /// Delete last week's conversation data once
    ///
    /// # Errors
    ///
    /// Returns error if any station cleanup fails
    pub async fn cleanup(&self) -> Result<Vec<CleanupReport>> {
        self.cleanup_job().run().await
    }

    /// Check and, if needed, rebuild the document vector store once
    ///
    /// # Errors
    ///
    /// Returns error if the assistant API is not configured or a rebuild step fails
    pub async fn optimize_vector_store(&self) -> Result<OptimizeOutcome> {
        let client: Arc<dyn VectorStoreApi> = self.openai()?;
        self.optimizer(client)?.run().await
    }

    /// Upload a directory of `.txt` documents for the document assistant
    ///
    /// # Errors
    ///
    /// Returns error if the assistant API is not configured or the sync fails
    pub async fn sync_documents(&self, dir: &Path) -> Result<SyncReport> {
        let client: Arc<dyn VectorStoreApi> = self.openai()?;
        DocumentSync::new(client, self.store.clone(), self.doc_assistant_id()?)
            .run(dir)
            .await
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the daemon encounters a fatal error
    pub async fn run(self) -> Result<()> {
        let client = self.openai()?;
        let assistant: Arc<dyn AssistantApi> = client.clone();

        let sessions = self.sessions();
        let orchestrator = Orchestrator::new(
            Arc::clone(&assistant),
            sessions.clone(),
            self.dispatcher(Arc::clone(&assistant)),
            self.config.poller(),
        );

        let mut jobs = Vec::new();

        if let Some(period) = self.config.jobs.cleanup_interval {
            let job = self.cleanup_job();
            jobs.push(spawn_periodic("cleanup", period, move || {
                let job = job.clone();
                async move { job.run().await.map(|_| ()) }
            }));
        }

        if let Some(period) = self.config.jobs.vector_store_interval {
            let vector_api: Arc<dyn VectorStoreApi> = client.clone();
            match self.optimizer(vector_api) {
                Ok(optimizer) => jobs.push(spawn_periodic("vector_store", period, move || {
                    let optimizer = optimizer.clone();
                    async move { optimizer.run().await.map(|_| ()) }
                })),
                Err(e) => tracing::warn!(error = %e, "vector store job disabled"),
            }
        }

        let server = ApiServerBuilder::new(
            self.db.clone(),
            self.stations.clone(),
            sessions,
            orchestrator,
            self.config.server.port,
        )
        .webhook_secret(
            self.config
                .server
                .webhook_secret
                .as_ref()
                .map(|s| SecretString::from(s.expose_secret().to_string())),
        )
        .rate_limit(self.config.server.rate_limit_per_minute)
        .build();

        tracing::info!(
            port = self.config.server.port,
            stations = self.stations.len(),
            timezone = %self.config.timezone,
            "daemon running"
        );

        let server_handle = server.spawn();

        let result = tokio::select! {
            res = server_handle => match res {
                Ok(inner) => inner,
                Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                Ok(())
            }
        };

        for job in jobs {
            job.abort();
        }

        tracing::info!("daemon stopped");
        result
    }
}
