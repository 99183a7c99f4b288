use crate::{errors::SanitizeError, models::invocation::FunctionRequest};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

pub const ENDPOINT_VAR: &str = "APPWRITE_FUNCTION_ENDPOINT";
pub const PROJECT_ID_VAR: &str = "APPWRITE_FUNCTION_PROJECT_ID";
pub const API_KEY_VAR: &str = "APPWRITE_FUNCTION_API_KEY";
pub const TRIGGER_VAR: &str = "APPWRITE_FUNCTION_TRIGGER";
pub const EVENT_DATA_VAR: &str = "APPWRITE_FUNCTION_EVENT_DATA";

/// Variables every invocation must carry, in reporting order.
pub const REQUIRED_VARS: [&str; 3] = [ENDPOINT_VAR, PROJECT_ID_VAR, API_KEY_VAR];

/// Centralized service configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Store settings applied to invocations that do not carry their own.
    pub endpoint: Option<String>,
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    /// Stage a copy before deleting in the delete-then-recreate strategy.
    pub stage_copies: bool,
    /// Bucket for staging copies; the original's bucket when unset.
    pub staging_bucket: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Strips embedded metadata from stored images")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_SANITIZER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_SANITIZER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Store API endpoint (overrides APPWRITE_FUNCTION_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Store project id (overrides APPWRITE_FUNCTION_PROJECT_ID)
    #[arg(long)]
    pub project_id: Option<String>,

    /// Store API key (overrides APPWRITE_FUNCTION_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Delete the original before uploading the replacement, without a staging copy
    #[arg(long)]
    pub no_staging: bool,

    /// Bucket to hold staging copies (overrides MEDIA_SANITIZER_STAGING_BUCKET)
    #[arg(long)]
    pub staging_bucket: Option<String>,

    /// Run a single invocation using the process environment and exit
    #[arg(long)]
    pub invoke: bool,

    /// Request payload for --invoke (JSON)
    #[arg(long, requires = "invoke")]
    pub payload: Option<String>,
}

/// One-shot invocation requested on the command line.
#[derive(Debug, Clone)]
pub struct OneShot {
    pub payload: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the optional one-shot run.
    pub fn from_env_and_args() -> Result<(Self, Option<OneShot>)> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge CLI arguments over values looked up by `lookup`.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<(Self, Option<OneShot>)>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Environment fallback ---
        let env_host = lookup("MEDIA_SANITIZER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("MEDIA_SANITIZER_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing MEDIA_SANITIZER_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_stage = lookup("MEDIA_SANITIZER_STAGE_COPIES")
            .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            endpoint: args.endpoint.or_else(|| lookup(ENDPOINT_VAR)),
            project_id: args.project_id.or_else(|| lookup(PROJECT_ID_VAR)),
            api_key: args.api_key.or_else(|| lookup(API_KEY_VAR)),
            stage_copies: env_stage && !args.no_staging,
            staging_bucket: args
                .staging_bucket
                .or_else(|| lookup("MEDIA_SANITIZER_STAGING_BUCKET"))
                .filter(|b| !b.is_empty()),
        };

        let one_shot = args.invoke.then_some(OneShot {
            payload: args.payload,
        });

        Ok((cfg, one_shot))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Store variables to fill into invocations that lack them.
    pub fn variable_defaults(&self) -> Vec<(&'static str, &str)> {
        [
            (ENDPOINT_VAR, self.endpoint.as_deref()),
            (PROJECT_ID_VAR, self.project_id.as_deref()),
            (API_KEY_VAR, self.api_key.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("stage_copies", &self.stage_copies)
            .field("staging_bucket", &self.staging_bucket)
            .finish()
    }
}

/// Credentials and endpoint for one invocation's store client.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
}

impl StoreSettings {
    /// Read the required variables, naming every missing one.
    pub fn from_request(req: &FunctionRequest) -> Result<Self, SanitizeError> {
        let missing: Vec<&'static str> = REQUIRED_VARS
            .into_iter()
            .filter(|name| req.variable(name).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(SanitizeError::Config { missing });
        }

        let value = |name: &str| req.variable(name).unwrap_or_default().to_string();
        Ok(Self {
            endpoint: value(ENDPOINT_VAR),
            project_id: value(PROJECT_ID_VAR),
            api_key: value(API_KEY_VAR),
        })
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}
