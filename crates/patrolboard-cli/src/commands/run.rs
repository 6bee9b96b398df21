use async_trait::async_trait;
use clap::Args;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

use patrolboard_core::{
    ApiError, BoardConfig, DeviceApiClient, FetchOutcome, Orchestrator, OrchestratorConfig,
    Reauthenticator, ScoreSource, TokenStore, WsTransport,
};

use crate::console::ConsoleDisplay;

#[derive(Args)]
pub struct RunArgs {
    /// Disable the realtime push channel for this run
    #[arg(long)]
    pub no_realtime: bool,
}

/// Binds the API client to the orchestrator's seams. Holds the current
/// bearer token so a re-authentication is picked up by subsequent fetches.
struct BoardService {
    client: DeviceApiClient,
    store: TokenStore,
    bearer: Mutex<String>,
}

#[async_trait]
impl ScoreSource for BoardService {
    async fn fetch_scores(&self) -> FetchOutcome {
        let bearer = self.bearer.lock().unwrap().clone();
        self.client.fetch_scores(&bearer).await
    }
}

#[async_trait]
impl Reauthenticator for BoardService {
    async fn reauthenticate(&self) -> Result<String, ApiError> {
        let grant = self.client.authenticate(print_code).await?;
        if let Err(e) = self.store.save(&grant.access_token) {
            tracing::warn!(error = %e, "could not persist new token");
        }
        *self.bearer.lock().unwrap() = grant.access_token.clone();
        Ok(grant.access_token)
    }
}

fn print_code(auth: &patrolboard_core::api::DeviceAuthorization) {
    println!("To link this board, visit:");
    println!(
        "  {}",
        auth.verification_uri_complete
            .as_deref()
            .unwrap_or(&auth.verification_uri)
    );
    println!("and enter code: {}", auth.user_code);
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BoardConfig::load()?;
    if args.no_realtime {
        config.realtime_enabled = false;
    }

    let store = TokenStore::new(&config.token_file);
    let client = DeviceApiClient::new(&config.api_base_url, &config.client_id)?;

    let bearer = match store.load() {
        Some(token) => token,
        None => {
            info!("no saved token; starting device authorization");
            let grant = client.authenticate(print_code).await?;
            store.save(&grant.access_token)?;
            grant.access_token
        }
    };

    let service = Arc::new(BoardService {
        client,
        store,
        bearer: Mutex::new(bearer.clone()),
    });

    let orchestrator = Orchestrator::new(
        service.clone(),
        service,
        Arc::new(ConsoleDisplay::new()),
        Arc::new(WsTransport),
        bearer,
        OrchestratorConfig {
            realtime_url: config.realtime_url()?,
            ..OrchestratorConfig::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    orchestrator.run(shutdown_rx).await;
    Ok(())
}
