#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use fbsr::{
    handlers::configure_services,
    oauth::{CallbackOrchestrator, GraphClient, ProviderConfig},
    settings::FbsrSettings,
    utils::logging::LoggingHelper,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = FbsrSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    let orchestrator =
        build_orchestrator(&settings).map_err(|e| std::io::Error::other(format!("{e:#}")))?;

    start_server(orchestrator, settings).await
}

/// Wire the provider configuration and Graph API client into the orchestrator
///
/// # Errors
///
/// Returns an error if the provider configuration is invalid or the HTTP client
/// cannot be built
fn build_orchestrator(settings: &FbsrSettings) -> anyhow::Result<CallbackOrchestrator> {
    let config = Arc::new(
        ProviderConfig::from_settings(settings)
            .context("Failed to initialize the facebook provider")?,
    );
    LoggingHelper::log_provider_configured(&config);

    let client = Arc::new(
        GraphClient::new(Arc::clone(&config)).context("Failed to build the Graph API client")?,
    );
    Ok(CallbackOrchestrator::new(config, client.clone(), client))
}

/// Start the HTTP server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(
    orchestrator: CallbackOrchestrator,
    settings: FbsrSettings,
) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    // JS SDK pages post to the callback from the application's origin
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(orchestrator.clone()))
            .app_data(web::Data::new(settings.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn print_startup_info(bind_address: &str, settings: &FbsrSettings) {
    println!("Starting fbsr Facebook login service on http://{bind_address}");
    println!();
    println!("Endpoints:");
    println!("  GET      /auth/facebook          - Redirect to the Facebook login dialog");
    println!("  GET|POST /auth/facebook/callback - Login callback (code, access_token or fbsr_ cookie)");
    println!("  GET      /auth/failure           - Failure details");
    println!("  GET      /ping                   - Health check");
    println!();
    println!("Callback URL to register with Facebook:");
    println!("  {}", settings.get_callback_url());
}
