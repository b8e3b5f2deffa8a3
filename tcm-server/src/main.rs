//! 中医诊所服务主程序

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tcm_analysis::{AnalysisService, FallbackGateway, HttpModelGateway, ModelGateway, StaticGateway};
use tcm_core::SnowflakeIdGenerator;
use tcm_database::{ClinicRepository, DatabasePool, DatabaseQueries, MemoryRepository};
use tcm_storage::ImageStore;
use tcm_web::{AppState, WebServer};
use tracing::{info, warn};

use crate::config::{AppConfig, CliOverrides, ConfigValidator, DatabaseBackend};

const WORKER_ID: i64 = 1;
const DATACENTER_ID: i64 = 1;

/// 服务命令行参数
#[derive(Parser, Debug)]
#[command(name = "tcm-server")]
#[command(about = "中医诊所管理与AI辅助诊断服务")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听主机
    #[arg(long)]
    host: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = CliOverrides {
        host: args.host,
        port: args.port,
        log_level: args.log_level,
    };
    let config = AppConfig::load(args.config.as_deref(), &overrides)?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("Starting TCM clinic server...");
    ConfigValidator::new().validate(&config)?;

    let ids = Arc::new(SnowflakeIdGenerator::new(WORKER_ID, DATACENTER_ID)?);

    match config.database.backend {
        DatabaseBackend::Memory => {
            warn!("Using in-memory repository, data will not survive a restart");
            serve(Arc::new(MemoryRepository::new(ids)), &config).await
        }
        DatabaseBackend::Postgres => {
            let pool = DatabasePool::connect(
                &config.database.url,
                config.database.max_connections,
                Duration::from_secs(config.database.connect_timeout_secs),
            )
            .await?;
            let queries = DatabaseQueries::new(pool, ids);
            if config.database.create_tables {
                queries.create_tables().await?;
            }
            serve(Arc::new(queries), &config).await
        }
    }
}

async fn serve<R>(repository: Arc<R>, config: &AppConfig) -> Result<()>
where
    R: ClinicRepository + 'static,
{
    let settings = config.gateway_settings();
    let gateway = build_gateway(config).await?;
    let analysis = AnalysisService::new(repository.clone(), gateway, settings);
    let images = ImageStore::new(&config.storage.upload_dir, config.storage.max_upload_bytes);
    let state = AppState::new(repository, analysis, images);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!("Invalid listen address {}:{}", config.server.host, config.server.port)
        })?;

    info!("Model endpoint: {} ({})", config.ai_model.endpoint, config.ai_model.model);
    info!("Upload directory: {}", config.storage.upload_dir);

    WebServer::new(addr, state).run().await?;
    Ok(())
}

/// 构造模型网关，配置了备用响应文件时包一层降级
async fn build_gateway(config: &AppConfig) -> Result<Arc<dyn ModelGateway>> {
    let primary: Arc<dyn ModelGateway> = Arc::new(HttpModelGateway::new(&config.gateway_settings())?);

    match &config.ai_model.fallback_response_path {
        Some(path) => {
            let fallback = StaticGateway::from_file(path).await?;
            Ok(Arc::new(FallbackGateway::new(primary, Arc::new(fallback))))
        }
        None => Ok(primary),
    }
}
