use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::net::UnixStream;

use anyhow::Result;
use atlas_protocol::{
    AtlasRequest, ConsolidateParams, GenerateQntmParams, IngestParams, JsonRpcRequest,
    JsonRpcResponse, SearchParams, TimelineParams,
};

#[derive(Parser)]
#[command(name = "atlas-cli")]
#[command(about = "Reference CLI client for the Atlas semantic memory daemon", long_about = None)]
struct Cli {
    /// Unix socket the daemon is listening on.
    #[arg(short, long, default_value = "/tmp/atlas.sock")]
    socket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one or more files or directories.
    Ingest {
        /// Paths to ingest.
        paths: Vec<String>,

        #[arg(short, long)]
        recursive: bool,

        #[arg(long)]
        watch: bool,
    },

    /// Search stored memory by natural-language query.
    Search {
        query: String,

        #[arg(short, long, default_value = "10")]
        limit: usize,

        #[arg(long)]
        qntm_key: Option<String>,
    },

    /// Run consolidation over the collection.
    Consolidate {
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Show chunks created since a given RFC 3339 timestamp.
    Timeline {
        since: chrono::DateTime<chrono::Utc>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Generate QNTM keys for a piece of text without storing it.
    GenerateQntm {
        text: String,

        #[arg(long)]
        context: Option<String>,
    },

    /// Report per-backend health.
    Health,

    /// Report collection and storage statistics.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let stream = UnixStream::connect(&cli.socket).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let call = match cli.command {
        Commands::Ingest { paths, recursive, watch } => AtlasRequest::Ingest(IngestParams {
            paths,
            recursive: Some(recursive),
            watch: Some(watch),
            ..Default::default()
        }),
        Commands::Search { query, limit, qntm_key } => AtlasRequest::Search(SearchParams {
            query,
            limit: Some(limit),
            qntm_key,
            ..Default::default()
        }),
        Commands::Consolidate { dry_run, threshold } => {
            AtlasRequest::Consolidate(ConsolidateParams {
                dry_run: Some(dry_run),
                threshold,
            })
        }
        Commands::Timeline { since, limit } => AtlasRequest::Timeline(TimelineParams {
            since,
            limit: Some(limit),
        }),
        Commands::GenerateQntm { text, context } => AtlasRequest::GenerateQntm(GenerateQntmParams {
            text,
            existing_keys: None,
            context,
        }),
        Commands::Health => AtlasRequest::Health,
        Commands::Status => AtlasRequest::Status,
    };

    let request = JsonRpcRequest::new(1u64, call);
    atlas_protocol::write_line(&mut write_half, &request).await?;

    let response: JsonRpcResponse = atlas_protocol::read_line(&mut reader)
        .await?
        .ok_or_else(|| anyhow::anyhow!("daemon closed the connection without a response"))?;

    match response.error {
        Some(err) => eprintln!("❌ Error [{}]: {}", err.code, err.message),
        None => {
            let pretty = serde_json::to_string_pretty(&response.result.unwrap_or(serde_json::Value::Null))?;
            println!("✅ {pretty}");
        }
    }

    Ok(())
}
