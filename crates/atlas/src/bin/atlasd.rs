//! The Atlas daemon: a Unix-domain-socket JSON-RPC server wrapping
//! [`atlas::AtlasService`].
//!
//! Startup shape follows `bulk-ingester/src/main.rs` (parse args, init
//! tracing, build the service, run-or-exit) and
//! `storage/src/tcp_server.rs`'s `serve`/`serve_with_shutdown` accept loop,
//! adapted from length-prefixed TCP framing to newline-delimited JSON over
//! a Unix socket.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use atlas::{AtlasService, HashEmbeddingBackend, LocalJsonLlm};
use atlas_context::{AtlasConfig, BackendRegistry};
use atlas_protocol::{
    error_codes, AtlasEvent, AtlasRequest, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};
use atlas_qntm::{GenerationOptions, LlmKeyGenerator};
use atlas_storage::{ensure_collection, MemoryBackend};
use atlas_types::{AtlasError, Result};

/// Dimension of the reference hash embedder when no real embedding
/// backend is configured.
const REFERENCE_EMBEDDING_DIMENSION: usize = 256;

#[derive(Parser, Debug)]
#[command(name = "atlasd", about = "Atlas semantic memory daemon")]
struct Args {
    /// Unix socket path to listen on.
    #[arg(long, default_value = "/tmp/atlas.sock")]
    socket: PathBuf,

    /// TOML configuration file; built-in defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt::init();

    let config = match AtlasConfig::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    match run(args.socket, config).await {
        Ok(()) => {}
        Err(e) => {
            error!(error = %e, "atlasd exited with an error");
            std::process::exit(1);
        }
    }
}

async fn run(socket_path: PathBuf, config: AtlasConfig) -> Result<()> {
    // No real embedding/LLM client is configured here: "backend internals"
    // are out of scope, so the reference binary always runs on the
    // deterministic local stand-ins. A production deployment would read
    // `config.embedding`/`config.llm`/`config.storage` and construct real
    // clients in their place.
    let registry = BackendRegistry {
        text_embedding: Arc::new(HashEmbeddingBackend::new(REFERENCE_EMBEDDING_DIMENSION)),
        code_embedding: None,
        contextualized_embedding: None,
        json_llm: Arc::new(LocalJsonLlm),
        text_llm: None,
        vector_storage: Arc::new(MemoryBackend::new()),
    };
    let primary_store = registry.vector_storage.clone();

    let key_generator = Arc::new(LlmKeyGenerator::new(
        registry.json_llm.clone(),
        GenerationOptions::default(),
    ));

    let service = Arc::new(AtlasService::initialize(registry, config, key_generator).await?);

    ensure_collection(
        &primary_store,
        atlas_ingest::DEFAULT_PRIMARY_COLLECTION,
        REFERENCE_EMBEDDING_DIMENSION,
    )
    .await?;

    let _ = std::fs::remove_file(&socket_path);
    let listener = UnixListener::bind(&socket_path)
        .map_err(|e| AtlasError::config(format!("failed to bind {socket_path:?}: {e}")))?;
    info!(socket = %socket_path.display(), "atlasd listening");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let service = service.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(stream, service).await {
                                warn!(error = %e, "connection ended with an error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

async fn handle_client(stream: UnixStream, service: Arc<AtlasService>) -> atlas_protocol::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut events = service.subscribe_events();
    let mut subscriptions: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            line = atlas_protocol::read_line::<_, JsonRpcRequest>(&mut reader) => {
                match line? {
                    Some(request) => {
                        if matches!(request.call, AtlasRequest::Subscribe(_) | AtlasRequest::Unsubscribe(_)) {
                            apply_subscription(&request.call, &mut subscriptions);
                        }
                        let response = dispatch(&service, request).await;
                        atlas_protocol::write_line(&mut write_half, &response).await?;
                    }
                    None => return Ok(()),
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if subscriptions.is_empty() || subscriptions.contains(event_type_name(&event)) => {
                        let notification = JsonRpcNotification::new(event);
                        atlas_protocol::write_line(&mut write_half, &notification).await?;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged, notifications were dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                }
            }
        }
    }
}

fn apply_subscription(call: &AtlasRequest, subscriptions: &mut HashSet<String>) {
    match call {
        AtlasRequest::Subscribe(params) => subscriptions.extend(params.events.iter().cloned()),
        AtlasRequest::Unsubscribe(params) => {
            for event in &params.events {
                subscriptions.remove(event);
            }
        }
        _ => {}
    }
}

fn event_type_name(event: &AtlasEvent) -> &'static str {
    match event {
        AtlasEvent::IngestProgress(_) => "ingest.progress",
        AtlasEvent::IngestComplete(_) => "ingest.complete",
        AtlasEvent::ConsolidateProgress(_) => "consolidate.progress",
        AtlasEvent::WatchFileChanged(_) => "watch.file_changed",
    }
}

async fn dispatch(service: &AtlasService, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    let outcome = match request.call {
        AtlasRequest::Ingest(params) => service.ingest(params).await.and_then(to_value),
        AtlasRequest::Search(params) => service.search(params).await.and_then(to_value),
        AtlasRequest::Consolidate(params) => service.consolidate(params).await.and_then(to_value),
        AtlasRequest::Timeline(params) => service.timeline(params).await.and_then(to_value),
        AtlasRequest::GenerateQntm(params) => service.generate_qntm(params).await.and_then(to_value),
        AtlasRequest::Health => to_value(service.health().await),
        AtlasRequest::Status => service.status().await.and_then(to_value),
        // Subscription bookkeeping happens in the connection loop; here we
        // only need to acknowledge the call.
        AtlasRequest::Subscribe(_) | AtlasRequest::Unsubscribe(_) => to_value(()),
    };

    match outcome {
        Ok(value) => JsonRpcResponse {
            jsonrpc: atlas_protocol::PROTOCOL_VERSION.to_string(),
            id,
            result: Some(value),
            error: None,
        },
        Err(e) => JsonRpcResponse::err(id, to_rpc_error(&e)),
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AtlasError::config(format!("response serialization error: {e}")))
}

fn to_rpc_error(error: &AtlasError) -> JsonRpcError {
    let code = match error {
        AtlasError::Config(_) => error_codes::CONFIG_ERROR,
        AtlasError::BackendUnavailable(_) => error_codes::BACKEND_UNAVAILABLE,
        AtlasError::BackendFatal(_) => error_codes::BACKEND_FATAL,
        AtlasError::Validation(_) => error_codes::VALIDATION_ERROR,
        AtlasError::Ingest { .. } | AtlasError::Consolidation { .. } => error_codes::INTERNAL_ERROR,
        AtlasError::NotFound(_) => error_codes::NOT_FOUND,
        AtlasError::Cancelled => error_codes::CANCELLED,
    };
    JsonRpcError::new(code, error.to_string())
}
