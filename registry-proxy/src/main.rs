//! Docker Registry v2 reverse proxy: server binary.

#[macro_use]
extern crate log;

use actix_web::{middleware, web, App, HttpServer};
use commons::metrics::{self, HasRegistry};
use commons::prelude_errors::*;
use futures::future;
use prometheus::Registry;
use registry_proxy::config::AppSettings;
use registry_proxy::{service, status, AppState};

#[actix_web::main]
async fn main() -> Result<(), Error> {
    let settings = AppSettings::assemble()?;
    env_logger::Builder::from_default_env()
        .filter(Some(module_path!()), settings.verbosity)
        .filter(Some("commons"), settings.verbosity)
        .init();
    info!("application settings:\n{:#?}", &settings);

    // Metrics service.
    let registry: &'static Registry = Box::leak(Box::new(metrics::new_registry(Some(
        registry_proxy::metrics::METRICS_PREFIX.to_string(),
    ))?));

    // Shared state.
    let state = AppState::try_new(&settings, registry)?;
    registry_proxy::metrics::register_metrics(state.registry())?;

    let status_state = state.clone();
    let status_server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(status_state.clone()))
            .service(web::resource("/metrics").route(web::get().to(metrics::serve::<AppState>)))
            .service(web::resource("/livez").route(web::get().to(status::serve_liveness)))
            .service(web::resource("/readyz").route(web::get().to(status::serve_readiness)))
    })
    .bind((settings.status_address, settings.status_port))
    .context(format!(
        "binding status service to {}:{}",
        settings.status_address, settings.status_port
    ))?
    .run();
    state.set_live(true);

    let main_state = state.clone();
    let main_server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(main_state.clone()))
            .configure(service::configure)
    })
    .client_request_timeout(settings.client_timeout)
    .bind((settings.address, settings.port))
    .context(format!(
        "binding main service to {}:{}",
        settings.address, settings.port
    ))?
    .run();
    state.set_ready(true);
    info!(
        "serving {} route(s) on {}:{}",
        settings.routes.len(),
        settings.address,
        settings.port
    );

    future::try_join(status_server, main_server).await?;
    Ok(())
}
