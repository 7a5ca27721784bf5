use actix_web::{dev::Service, web, App, HttpServer};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;

use feed_ranking::bootstrap;
use feed_ranking::config::Config;
use feed_ranking::handlers;
use feed_ranking::jobs::start_hot_score_worker;
use feed_ranking::metrics::{observe_http_request, route_label};
use feed_ranking::telemetry;

#[actix_web::main]
async fn main() -> io::Result<()> {
    telemetry::init_tracing();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting feed-ranking-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Environment: {}", config.app.env);

    let app = match bootstrap::build_state(&config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Service bootstrap failed: {:#}", e);
            eprintln!("ERROR: Failed to initialise services: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let worker_handle = if config.hot_score.worker_interval_secs > 0 {
        let worker = app.worker.clone();
        let every = Duration::from_secs(config.hot_score.worker_interval_secs);
        let shutdown_rx = shutdown_tx.subscribe();
        info!(
            interval_secs = config.hot_score.worker_interval_secs,
            "In-process hot score worker enabled"
        );
        Some(tokio::spawn(async move {
            start_hot_score_worker(worker, every, shutdown_rx).await;
        }))
    } else {
        info!("In-process hot score worker disabled, run hot-score-worker from cron");
        None
    };

    let state = web::Data::new(app.state);
    let bind_addr = (config.app.host.clone(), config.app.port);
    info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    // actix handles SIGTERM / Ctrl-C with a graceful stop
    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = route_label(req.match_pattern());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            observe_http_request(
                                &method,
                                &path,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            observe_http_request(&method, &path, 500, start.elapsed());
                            Err(err)
                        }
                    }
                }
            })
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await;

    info!("HTTP server stopped, shutting down background tasks");
    let _ = shutdown_tx.send(());
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Hot score worker task panicked");
        }
    }
    app.pool.close().await;

    result
}
