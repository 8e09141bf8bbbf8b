use clap::{Parser, Subcommand};
use ledger_receipt::db::ensure_schema;
use ledger_receipt::image::{load_from_path, ImageFetcher};
use ledger_receipt::llm::OpenAiVisionModel;
use ledger_receipt::{api, create_pool, rpc, AppConfig, Extractor, LedgerService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger-receipt", version, about = "Receipt image -> ledger JSON")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 启动 HTTP + gRPC 服务 (默认)
    Serve,
    /// 识别本地图片并输出合并后的 JSON
    Extract {
        /// 同一张小票的图片, 按顺序合并
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Loaded config: {:?}", config.server);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Extract { images } => extract(config, images).await,
    }
}

async fn build_service(
    config: &AppConfig,
    persist: bool,
) -> Result<Arc<LedgerService>, Box<dyn std::error::Error>> {
    let model = Arc::new(OpenAiVisionModel::new(config.model.clone())?);
    info!("Vision model: {:?}", config.model);
    let extractor = Extractor::new(model, config.prompts.clone())?;
    let fetcher = ImageFetcher::new(Duration::from_secs(config.model.timeout_secs))?;

    let pool = match (&config.database.url, persist) {
        (Some(url), true) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            info!("Database pool created");
            Some(pool)
        }
        _ => None,
    };

    Ok(Arc::new(LedgerService::new(extractor, fetcher, pool)))
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config, true).await?;
    info!("Ledger service ready (model: {})", service.model_name());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let grpc_addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.grpc_port).parse()?;

    let app = api::router(service.clone());
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!("HTTP server listening on {}", http_addr);
    info!("API Endpoints:");
    info!("  POST /ledger_receipt         - JSON {{\"image_data\": [url, ...]}}");
    info!("  POST /ledger_receipt/upload  - multipart, field `files`");
    info!("  gRPC ledger.LedgerService    - {}", grpc_addr);

    let http = async {
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for(shutdown_rx.clone()))
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    };
    let grpc = async {
        rpc::serve(grpc_addr, service, wait_for(shutdown_rx.clone()))
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    };

    tokio::try_join!(http, grpc)?;
    Ok(())
}

async fn extract(config: AppConfig, paths: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(&config, false).await?;

    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        images.push(load_from_path(path).await?);
    }

    let combined = service.process_images(images).await?;
    println!("{}", serde_json::to_string_pretty(&combined)?);
    Ok(())
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
