use anyhow::Result;
use axum::Router;
use media_sanitizer::{
    config::{AppConfig, OneShot},
    models::invocation::FunctionRequest,
    routes,
    services::pipeline::Pipeline,
    store::appwrite::AppwriteConnector,
};
use serde_json::Value;
use std::{env, io::ErrorKind, process::ExitCode, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + one-shot flag ---
    let (cfg, one_shot) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-sanitizer with config: {:?}", cfg);

    let pipeline = Pipeline::from_config(Arc::new(AppwriteConnector), &cfg);

    // --- Handle one-shot mode ---
    if let Some(one_shot) = one_shot {
        return run_once(&pipeline, one_shot).await;
    }

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(pipeline);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(ExitCode::SUCCESS)
}

/// Run a single invocation with the process environment as its variables.
async fn run_once(pipeline: &Pipeline, one_shot: OneShot) -> Result<ExitCode> {
    let payload = one_shot
        .payload
        .map(|raw| serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)));
    let req = FunctionRequest {
        variables: env::vars().collect(),
        payload,
    };

    let result = pipeline.run(req).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
