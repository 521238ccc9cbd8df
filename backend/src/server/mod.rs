//! Server construction and wiring.

mod config;
mod state_builders;

pub use config::ServerConfig;
use state_builders::{build_http_state, drain_events};

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use skilltrade_backend::inbound::http::challenges;
use skilltrade_backend::inbound::http::health::{HealthState, live, ready};
use skilltrade_backend::inbound::http::state::HttpState;

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        http_state,
    } = deps;

    App::new()
        .app_data(health_state)
        .app_data(http_state)
        .service(web::scope("/api").configure(challenges::configure))
        .service(ready)
        .service(live)
}

/// Build and start the HTTP server.
///
/// Readiness is flagged only after the listener is bound and the engine
/// state (including any demo seed data) is in place.
pub async fn run(server_config: ServerConfig) -> std::io::Result<Server> {
    let health_state = web::Data::new(HealthState::new());
    let (http_state, event_receiver) = build_http_state(&server_config).await?;
    let http_state = web::Data::new(http_state);

    // Until a delivery pipeline consumes this channel, drain it so emitters
    // never block on a full buffer.
    tokio::spawn(drain_events(event_receiver));

    let bind_addr = server_config.bind_addr();
    let server_health_state = health_state.clone();
    let server = HttpServer::new(move || {
        build_app(AppDependencies {
            health_state: server_health_state.clone(),
            http_state: http_state.clone(),
        })
    })
    .bind(bind_addr)?
    .run();

    health_state.mark_ready();
    Ok(server)
}
