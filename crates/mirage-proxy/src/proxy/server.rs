//! ProxyServer struct and main run loop.
//!
//! Holds the shared pipeline state and serves connections: one tokio task
//! per inbound connection, one logical task per request. When a client
//! disconnects, hyper drops the in-flight service future, abandoning any
//! pending upstream or middleware await for that request.

use super::client::{create_http_client, ClientConfig};
use super::forwarding::HyperUpstream;
use super::handler::handle_request;
use super::network::create_reusable_listener;
use crate::config::Config;
use crate::journal::Journal;
use crate::middleware::{HttpMiddleware, Middleware};
use crate::modes::{ControllerOptions, ModeController};
use crate::simulation::{persistence, SimulationStore};
use crate::state::StateStore;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Shared pipeline state. This is the surface management collaborators call:
/// simulation CRUD on `store`, mode get/set on `controller`, journal
/// get/query/clear on `journal`, scenario state on `scenario_state`.
pub struct ProxyState {
    pub store: Arc<SimulationStore>,
    pub journal: Arc<Journal>,
    pub scenario_state: Arc<StateStore>,
    pub controller: Arc<ModeController>,
}

/// The main proxy server struct.
pub struct ProxyServer {
    config: Arc<Config>,
    state: Arc<ProxyState>,
}

impl ProxyServer {
    /// Create a new ProxyServer from configuration.
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let store = Arc::new(SimulationStore::new());
        let journal = Arc::new(Journal::new(config.journal.capacity));
        let scenario_state = Arc::new(StateStore::new());

        // Preload a simulation when configured; version/validation failures
        // abort startup rather than serving an empty store silently
        if let Some(path) = &config.simulation_file {
            let simulation = persistence::load_from_file(path)?;
            store.replace_all(simulation)?;
        }

        let client_config = ClientConfig::default();
        let client = create_http_client(&client_config);

        let upstream = Arc::new(HyperUpstream::new(
            client.clone(),
            Duration::from_secs(config.upstream.timeout_secs),
            config.upstream.destination.clone(),
        ));

        let middleware: Option<Arc<dyn Middleware>> = match &config.middleware {
            Some(mw) => Some(Arc::new(HttpMiddleware::new(
                mw.url.clone(),
                client,
                Duration::from_secs(mw.timeout_secs),
            ))),
            None => None,
        };

        let controller = Arc::new(ModeController::new(
            Arc::clone(&store),
            Arc::clone(&journal),
            Arc::clone(&scenario_state),
            upstream,
            middleware,
            ControllerOptions {
                no_match_status: config.no_match.status,
                no_match_body: config.no_match.body.clone(),
                capture_headers: config.capture.headers.clone(),
            },
        ));
        controller.set_mode(config.mode);

        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(ProxyState {
                store,
                journal,
                scenario_state,
                controller,
            }),
        })
    }

    /// The shared state handle for management collaborators.
    pub fn state(&self) -> Arc<ProxyState> {
        Arc::clone(&self.state)
    }

    /// Run the proxy server, accepting connections and handling requests.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr: SocketAddr = format!("{}:{}", self.config.listen.host, self.config.listen.port)
            .parse()?;
        let listener = create_reusable_listener(addr)?;

        info!("listening on http://{addr}");
        info!(
            "mode: {}, journal capacity: {:?}",
            self.state.controller.mode().as_str(),
            self.config.journal.capacity
        );
        if let Some(destination) = &self.config.upstream.destination {
            info!("forwarding to {destination}");
        }

        let state = Arc::clone(&self.state);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let controller = Arc::clone(&state.controller);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let controller = Arc::clone(&controller);
                    async move { handle_request(&controller, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("error serving connection from {remote_addr}: {err}");
                }
            });
        }
    }
}
