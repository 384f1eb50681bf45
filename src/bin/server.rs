use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    process::ExitCode,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledger_rs::{
    AppEnvironment, AppState, Config, build_router, config::load_env_file, graceful_shutdown,
    logging_middleware, open_db,
};

/// The REST API server for ledger_rs.
///
/// The server is configured with the environment variables NODE_ENV,
/// DATABASE_CLIENT, DATABASE_URL, PORT and SESSION_SECRET, which may also be
/// set in a dotenv file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to a dotenv file, defaults to `.env` or `.env.test` when NODE_ENV is `test`.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// The address to serve the API from.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(error) = load_env_file(args.env_file.as_deref()) {
        eprintln!("{error}");
        return ExitCode::FAILURE;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("⚠ {error}");
            return ExitCode::FAILURE;
        }
    };

    setup_logging(config.environment);

    let conn = match open_db(&config) {
        Ok(conn) => conn,
        Err(error) => {
            tracing::error!("Could not open the database {}: {error}", config.database_url);
            return ExitCode::FAILURE;
        }
    };

    let app_state = match AppState::new(conn, &config) {
        Ok(app_state) => app_state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            return ExitCode::FAILURE;
        }
    };

    let router = add_tracing_layer(build_router(app_state));
    let router = if config.environment == AppEnvironment::Development {
        router.layer(middleware::from_fn(logging_middleware))
    } else {
        router
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let addr = SocketAddr::new(args.host, config.port);
    tracing::info!(
        "HTTP server listening on {} ({} environment)",
        addr,
        config.environment
    );

    if let Err(error) = axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
    {
        tracing::error!("Server error: {error}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn setup_logging(environment: AppEnvironment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
