use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::process::Command;
use tracing::{error, info};

/// The command `/run-scraper` executes: normally this binary with `run`.
#[derive(Debug, Clone)]
pub struct ScraperCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ScraperCommand {
    pub fn current_exe(config: Option<PathBuf>) -> Result<Self> {
        let mut args = Vec::new();
        if let Some(path) = config {
            args.push("--config".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        args.push("run".to_string());
        Ok(Self {
            program: std::env::current_exe()?,
            args,
        })
    }
}

pub fn router(command: ScraperCommand) -> Router {
    Router::new()
        .route("/run-scraper", get(run_scraper))
        .route("/health", get(|| async { "ok" }))
        .with_state(Arc::new(command))
}

pub async fn serve(addr: &str, command: ScraperCommand) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Launcher listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(command)).await?;
    Ok(())
}

/// Run the scraper to completion and hand back its stdout. A non-zero exit
/// or anything on stderr is reported as a 500.
async fn run_scraper(State(command): State<Arc<ScraperCommand>>) -> Response {
    info!("Running scraper: {:?} {:?}", command.program, command.args);
    let output = match Command::new(&command.program).args(&command.args).output().await {
        Ok(output) => output,
        Err(e) => {
            error!("exec error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error running scraper").into_response();
        }
    };

    if !output.status.success() {
        error!("Scraper exited with {}", output.status);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error running scraper").into_response();
    }
    if !output.stderr.is_empty() {
        error!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        return (StatusCode::INTERNAL_SERVER_ERROR, "Error with scraper output").into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        String::from_utf8_lossy(&output.stdout).into_owned(),
    )
        .into_response()
}
