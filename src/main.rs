use actix_web::{App, HttpServer, web::Data};
use actix_files as fs;
use dotenv::dotenv;
use log::{info, error};

use kisan_ai::config::Config;
use kisan_ai::web::routes;
use kisan_ai::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting Kisan-AI web application");

    let config = Config::from_env();
    info!(
        "Chat limits: {} characters, {}s cooldown",
        config.chat.character_limit,
        config.chat.cooldown.as_secs()
    );

    let app_state = match AppState::from_config(&config) {
        Ok(state) => Data::new(state),
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Listening on {}:{}", config.host, config.port);

    // Start web server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(fs::Files::new("/static", "./static"))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
