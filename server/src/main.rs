use actix_cors::Cors;
use actix_web::{middleware, App, HttpServer};

use server::config::ServerConfig;
use server::handlers;
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::from_env().map_err(|err| {
        log::error!("Invalid configuration: {}", err);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    })?;

    let srv_tx = spawn_server(&config);
    let bind_address = config.bind_address();
    log::info!("Session relay listening on {}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .data(srv_tx.clone())
            .data(config.clone())
            .configure(handlers::root)
    })
    .bind(bind_address)?
    .run()
    .await
}
