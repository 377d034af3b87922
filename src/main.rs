//! Race weekend API 主入口

use race_weekend_api::{
    config::AppConfig,
    db,
    middleware::AppState,
    rate_limit::store::{MemoryCounterStore, RedisCounterStore},
    repository::Repositories,
    routes,
    services::bootstrap,
    telemetry,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();
    let mut seed_only = false;

    if args.len() > 1 {
        match args[1].as_str() {
            "--seed" => seed_only = true,
            "--version" => {
                println!("race-weekend-api {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量，不依赖 .env 文件
    if let Ok(env) = std::env::var("RACE_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Race weekend API starting...");

    // 3. 数据库连接池与迁移
    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;
    let repos = Repositories::postgres(pool);

    if seed_only {
        return run_seed(config, repos).await;
    }

    // 4. 计数存储
    let counter_store = RedisCounterStore::connect(
        config.redis.url.expose_secret(),
        Duration::from_millis(config.redis.command_timeout_ms),
    )
    .await?;

    // 5. 构建应用状态并引导管理员
    let app_state = Arc::new(AppState::new(config.clone(), repos, Arc::new(counter_store))?);
    bootstrap::bootstrap_admin(&app_state.auth_service, &config.bootstrap).await?;

    // 6. 构建路由
    let app = routes::create_router(app_state);

    // 7. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 8. 优雅关闭：收到信号后最多等待 graceful_shutdown_timeout_secs
    let shutdown_timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            result??;
            tracing::info!("Server stopped");
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(shutdown_timeout, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!("Graceful shutdown timeout reached, forcing exit"),
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// `--seed`：引导管理员并写入演示周末后退出
async fn run_seed(config: AppConfig, repos: Repositories) -> anyhow::Result<()> {
    // 播种不经过限流，不连接 Redis
    let state = AppState::new(config.clone(), repos.clone(), Arc::new(MemoryCounterStore::new()))?;

    let admin = bootstrap::bootstrap_admin(&state.auth_service, &config.bootstrap)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "--seed requires RACE_BOOTSTRAP__ADMIN_EMAIL and RACE_BOOTSTRAP__ADMIN_PASSWORD"
            )
        })?;
    let event = bootstrap::seed_demo_weekend(&repos, &admin).await?;

    println!("Seed complete: event {} ({}), admin {}", event.id, event.name, admin.email);
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 打印帮助信息
fn print_help() {
    println!("race-weekend-api {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: race-weekend-api [选项]");
    println!();
    println!("选项:");
    println!("  --seed        引导管理员、写入演示数据后退出");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 RACE_ 前缀的环境变量完成");
    println!("  RACE_DATABASE__URL                    PostgreSQL 连接串（必填）");
    println!("  RACE_SECURITY__JWT_SECRET             JWT 签名密钥，至少 32 字符（必填）");
    println!("  RACE_RATE_LIMIT__STORE_FAILURE_POLICY 必须显式设置为 open 或 closed");
    println!("  RACE_BOOTSTRAP__ADMIN_EMAIL           启动时创建或提升的管理员邮箱");
    println!("  RACE_BOOTSTRAP__ADMIN_PASSWORD        该管理员的初始密码");
}
