use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod relay;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::Config::load()?;
    logger::init(&cfg)?;

    // Size the Tokio runtime from `server.workers`, CPU count otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("[CONFIG] Using {workers} worker threads"));
    } else {
        logger::log_info("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    let upstream = Arc::new(relay::ReqwestUpstream::new()?);
    logger::log_server_start(&addr, &cfg);
    let state = Arc::new(config::AppState::new(cfg, upstream));

    server::run_server(listener, state, server::shutdown_signal()).await?;
    Ok(())
}
