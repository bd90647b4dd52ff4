//! Festive Photo - Christmas photo transformations with a daily quota.
//!
//! Wires the quota counter, result stores and generation backend chosen on
//! the command line into the HTTP server.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use redis::aio::ConnectionManager;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use festive_photo::{
    config::{CheckConfig, Cli, Command, GeneratorKind, ServeConfig},
    create_s3_client,
    server::{create_router, AppState, RouterConfig},
    BlobStore, DryRunBackend, GeminiBackend, GenerationBackend, GenerationClient,
    GenerationPipeline, MemoryBlobStore, MemoryQuotaCounter, MemoryRecordStore, QuotaCounter,
    RateLimiter, RecordStore, RedisQuotaCounter, RedisRecordStore, ResultStore, S3BlobStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    match Cli::parse().into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();
    log_settings(&config);

    let (counter, records) = match open_state_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let (blobs, memory_blobs) = match open_blob_store(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let backend = match open_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = GenerationPipeline::new(
        RateLimiter::new(counter, config.rate_limit_policy()),
        config.preprocessor(),
        GenerationClient::with_timeout(backend, config.generation_timeout()),
        ResultStore::new(blobs, records).with_ttl(config.result_ttl()),
    );

    let mut state = AppState::new(pipeline, config.public_url.clone())
        .with_max_upload_bytes(config.max_upload_bytes);
    if let Some(store) = memory_blobs {
        state = state.with_memory_blobs(store);
    }

    let router = create_router(state, router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Cannot listen on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("Ready on http://{}", addr);
    info!("  GET  /health        liveness");
    info!("  GET  /api/quota     remaining generations today");
    info!("  POST /api/upload    multipart field 'image'");
    info!("  POST /api/generate  JSON {{ prompt, image: {{ data, mimeType }} }}");
    info!("  GET  /result/{{id}}   share page");
    info!("");

    let service = router.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        error!("Server stopped: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn print_banner() {
    info!("");
    info!("          *          ");
    info!("         /.\\         ");
    info!("        /..'\\        ");
    info!("        /'.'\\        ");
    info!("       /.''.'\\       ");
    info!("       /.'.'.\\       ");
    info!("      /'.''.'.\\      ");
    info!("      ^^^[_]^^^      ");
    info!("");
    info!("    FESTIVE PHOTO v{}", env!("CARGO_PKG_VERSION"));
    info!("");
}

fn log_settings(config: &ServeConfig) {
    info!("Settings:");
    info!("  Public URL:   {}", config.public_url);
    info!(
        "  Quota:        {} per {}s (prefix '{}')",
        config.rate_limit, config.rate_limit_window, config.rate_limit_prefix
    );
    info!(
        "  Images:       max {}px, quality {}, uploads up to {} bytes",
        config.max_dimension, config.quality, config.max_upload_bytes
    );
    info!("  Result TTL:   {}s", config.result_ttl);
}

/// Quota counter and result records, on Redis when configured.
async fn open_state_stores(
    config: &ServeConfig,
) -> Result<(Arc<dyn QuotaCounter>, Arc<dyn RecordStore>), String> {
    let Some(url) = config.redis_url.as_deref() else {
        warn!("Redis not configured: quotas and results live in this process only");
        return Ok((
            Arc::new(MemoryQuotaCounter::new()),
            Arc::new(MemoryRecordStore::new()),
        ));
    };

    // One multiplexed connection serves both stores
    let conn = connect_redis(url)
        .await
        .map_err(|e| format!("Redis unreachable at {}: {}", url, e))?;
    info!("Redis connected");

    Ok((
        Arc::new(RedisQuotaCounter::new(conn.clone())),
        Arc::new(RedisRecordStore::new(conn)),
    ))
}

/// Image store, plus the in-memory store to serve under `/blobs` when S3 is
/// not configured.
async fn open_blob_store(
    config: &ServeConfig,
) -> Result<(Arc<dyn BlobStore>, Option<Arc<MemoryBlobStore>>), String> {
    let Some((bucket, public_base)) = config
        .s3_bucket
        .as_deref()
        .zip(config.s3_public_base_url())
    else {
        warn!(
            "S3 not configured: images are kept in memory for {}s and lost on restart",
            config.result_ttl
        );
        let store = MemoryBlobStore::new(config.public_url.clone())
            .with_retention(config.result_ttl());
        let store = Arc::new(store);
        return Ok((store.clone(), Some(store)));
    };

    let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
    let store = S3BlobStore::new(client, bucket, public_base.as_str());

    if let Err(e) = store.check().await {
        let endpoint = config
            .s3_endpoint
            .as_deref()
            .map(|endpoint| format!(" and that {} is reachable", endpoint))
            .unwrap_or_default();
        return Err(format!(
            "S3 bucket '{}' unreachable: {}. Verify AWS credentials, region '{}'{}",
            bucket, e, config.s3_region, endpoint
        ));
    }

    info!(
        "S3 connected: bucket '{}', images served from {}",
        bucket, public_base
    );
    Ok((Arc::new(store), None))
}

fn open_backend(config: &ServeConfig) -> Result<Arc<dyn GenerationBackend>, String> {
    match config.generator {
        GeneratorKind::Gemini => {
            let gemini = config
                .gemini_config()
                .ok_or_else(|| "The gemini generator needs an API key".to_string())?;
            let model = gemini.model.clone();
            let backend = GeminiBackend::new(gemini)
                .map_err(|e| format!("Cannot build the Gemini client: {}", e))?;
            info!("Generator: gemini ({})", model);
            Ok(Arc::new(backend))
        }
        GeneratorKind::DryRun => {
            warn!("Generator: dry run, uploads are returned unchanged");
            Ok(Arc::new(DryRunBackend::new()))
        }
    }
}

fn router_config(config: &ServeConfig) -> RouterConfig {
    let router_config = RouterConfig::new()
        .with_max_upload_bytes(config.max_upload_bytes)
        .with_tracing(!config.no_tracing);

    match config.cors_origins {
        Some(ref origins) => router_config.with_cors_origins(origins.clone()),
        None => router_config,
    }
}

async fn connect_redis(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;
    ConnectionManager::new(client).await
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "festive_photo=debug,tower_http=debug"
    } else {
        "festive_photo=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Check
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Festive Photo dependency check");
    println!();

    let mut healthy = true;

    match config.redis_url.as_deref() {
        Some(url) => match ping_redis(url).await {
            Ok(()) => println!("  [ok]   Redis at {}", url),
            Err(e) => {
                println!("  [fail] Redis at {}: {}", url, e);
                healthy = false;
            }
        },
        None => println!("  [skip] Redis not configured, in-memory quotas and results"),
    }

    match config.s3_bucket.as_deref() {
        Some(bucket) => {
            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            let target = match config.s3_endpoint.as_deref() {
                Some(endpoint) => format!("'{}' via {}", bucket, endpoint),
                None => format!("'{}' in {}", bucket, config.s3_region),
            };
            match S3BlobStore::new(client, bucket, "").check().await {
                Ok(()) => println!("  [ok]   S3 bucket {}", target),
                Err(e) => {
                    println!("  [fail] S3 bucket {}: {}", target, e);
                    println!("         Verify AWS credentials and that the bucket exists");
                    healthy = false;
                }
            }
        }
        None => println!("  [skip] S3 not configured, in-memory images"),
    }

    println!();
    if healthy {
        println!("All checks passed");
        ExitCode::SUCCESS
    } else {
        println!("Some checks failed");
        ExitCode::FAILURE
    }
}

async fn ping_redis(url: &str) -> Result<(), redis::RedisError> {
    let mut conn = connect_redis(url).await?;
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(())
}
