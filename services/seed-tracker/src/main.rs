use actix_cors::Cors;
use actix_web::dev::Service;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use seed_tracker::{config::Config, handlers, metrics, services::InventoryService};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    info!(
        "Starting Seed Tracker on {}:{} (recommendation window {} days)",
        config.server.host, config.server.port, config.inventory.recommend_window_days
    );

    let service = Arc::new(
        InventoryService::from_config(&config)
            .await
            .context("Failed to initialise inventory store")?,
    );

    let jwt_secret = config.auth.jwt_secret.clone();

    HttpServer::new(move || {
        let cors = Cors::permissive();
        let jwt_secret = jwt_secret.clone();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    metrics::HTTP_REQUESTS_TOTAL
                        .with_label_values(&[method.as_str(), res.status().as_str()])
                        .inc();
                    Ok(res)
                }
            })
            .app_data(web::Data::new(service.clone()))
            .configure(move |cfg| handlers::configure_routes(cfg, &jwt_secret))
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
