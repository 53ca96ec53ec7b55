use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use static_cache::center::{NotifySource, ResourceCenter};
use static_cache::config::{AppState, Config};
use static_cache::logger;
use static_cache::server::{self, SignalHandler};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Worker count from config, CPU cores otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers.max(1));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    let center = Arc::new(ResourceCenter::new(cfg.static_files.to_options()));
    {
        let center = Arc::clone(&center);
        tokio::task::spawn_blocking(move || center.initialize()).await?;
    }

    let reload_task = if cfg.static_files.watch {
        match center.start_watching(&NotifySource) {
            Ok(task) => Some(task),
            Err(e) => {
                logger::log_warning(&format!("File watcher unavailable: {e}"));
                None
            }
        }
    } else {
        None
    };

    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(AppState::new(&cfg, Arc::clone(&center)));
    let active_connections = Arc::new(AtomicUsize::new(0));

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals), Arc::clone(&center));

    logger::log_server_start(&addr, &cfg);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            server::start_server_loop(
                listener,
                state,
                Arc::clone(&active_connections),
                Arc::clone(&signals.shutdown),
            )
            .await;

            let grace = Duration::from_secs(cfg.performance.write_timeout);
            let remaining = server::drain_connections(&active_connections, grace).await;
            if remaining > 0 {
                logger::log_warning(&format!("{remaining} connections still open at exit"));
            }
        })
        .await;

    if let Some(task) = reload_task {
        task.shutdown().await;
    }
    Ok(())
}
