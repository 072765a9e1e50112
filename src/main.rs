use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use codedesk::config::AppConfig;
use codedesk::github::GitHubClient;
use codedesk::handlers;
use codedesk::llm::LlmClient;
use codedesk::session::AppState;
use log::{info, warn};
use rustls::ServerConfig;
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    // Override the log level with the RUST_LOG environment variable,
    // e.g. `RUST_LOG=debug cargo run`.
    env::set_var("RUST_LOG", env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()));
    env_logger::init();

    let config = AppConfig::from_env();
    let addr = format!("0.0.0.0:{}", config.port);

    if config.llm_api_key.is_empty() {
        warn!("LLM_API_KEY is not set; chat turns will fail upstream");
    }
    if config.github_token.is_none() {
        warn!("GITHUB_TOKEN is not set; private repos, listing and push are unavailable");
    }

    let github = GitHubClient::new(config.github_token.clone());
    let llm = LlmClient::new(
        config.llm_api_url.clone(),
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    );
    let state = web::Data::new(AppState::new(github, Arc::new(llm)));

    info!("Server running at http://{}", addr);
    let mut http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .service(handlers::connect)
            .service(handlers::import_repo)
            .service(handlers::get_file_content)
            .service(handlers::chat)
            .service(handlers::get_messages)
            .service(handlers::apply_code_change)
            .service(handlers::push_repo)
            .service(handlers::list_repos)
            .service(handlers::execute)
            .default_service(web::to(handlers::static_handler))
    });

    if let (Some(cert_path), Some(key_path)) = (config.cert_path.clone(), config.key_path.clone()) {
        if !Path::new(&cert_path).exists() || !Path::new(&key_path).exists() {
            warn!("CERT_PATH or KEY_PATH points to a non-existent file. Starting without HTTPS.");
            http_server = http_server.bind(addr)?;
        } else {
            info!("Attempting to start HTTPS server...");
            let cert_file = &mut BufReader::new(File::open(cert_path)?);
            let key_file = &mut BufReader::new(File::open(key_path)?);
            let cert_chain = certs(cert_file).collect::<Result<Vec<_>, _>>()?;
            let mut keys = pkcs8_private_keys(key_file).collect::<Result<Vec<_>, _>>()?;

            if keys.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "No private keys found in key file",
                ));
            }

            let tls_config = ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(cert_chain, keys.remove(0).into())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

            info!("Successfully configured TLS. Binding to https://{}", addr);
            http_server = http_server.bind_rustls_0_23(addr, tls_config)?;
        }
    } else {
        info!("No CERT_PATH or KEY_PATH found in env. Starting plain HTTP server.");
        http_server = http_server.bind(addr)?;
    }

    http_server.run().await
}
