use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::{Router, routing::get};
use clap::Parser;
use librovault::config::{Cli, Config, default_config_dir, default_config_path};
use librovault::gemini::TextModel;
use librovault::handler::{AppState, healthcheck};
use librovault::mailer::Mailer;
use librovault::razorpay::PaymentGateway;
use librovault::supabase::Supabase;
use librovault::{admin, books, discover, library, payment};
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let config_path = match args.config_path {
        Some(path) => std::path::PathBuf::from(path),
        None => {
            if let Err(e) = std::fs::create_dir_all(default_config_dir()) {
                eprintln!("failed to create config directory: {}", e);
                std::process::exit(1);
            }
            default_config_path()
        }
    };

    tracing_subscriber::fmt().json().init();
    tracing::info!("librovault.svc starting");

    let cfg = Config::new(config_path.to_str().unwrap()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let supabase = Arc::new(Supabase::new(&cfg).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup datastore client");
        std::process::exit(1);
    }));
    let payments = Arc::new(PaymentGateway::new(&cfg).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup payment gateway");
        std::process::exit(1);
    }));
    let ai = Arc::new(TextModel::new(&cfg).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup ai bridge");
        std::process::exit(1);
    }));
    let mailer = Arc::new(Mailer::new(cfg.smtp.as_ref()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup mailer");
        std::process::exit(1);
    }));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());

    let allow_origin = if cfg.app.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = cfg
            .app
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(healthcheck))
        .nest("/api/books", books::routes())
        .nest("/api/payment", payment::routes())
        .nest("/api/admin", admin::routes())
        .nest("/api/ai", discover::routes())
        .merge(library::routes())
        .layer(cors)
        .with_state(AppState {
            supabase,
            payments,
            ai,
            mailer,
        });

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("librovault.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, shutting down");
        }
    }

    tracing::info!("librovault.svc going off");
}
