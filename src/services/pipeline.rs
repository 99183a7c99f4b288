//! One sanitization run, from invocation to result.
//!
//! Stages run strictly in order and the first failure ends the run:
//! configuration, client setup, reference resolution, metadata fetch and
//! image check, download, stripping, write-back. No failure escapes as an
//! error; every run ends in a [`PipelineResult`].

use crate::{
    config::{AppConfig, StoreSettings},
    errors::{SanitizeError, SyncStep},
    models::{invocation::FunctionRequest, reference::ObjectReference, result::PipelineResult},
    services::{classifier, resolver, stripper, synchronizer::Synchronizer},
    store::StoreConnector,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct Pipeline {
    connector: Arc<dyn StoreConnector>,
    synchronizer: Synchronizer,
    /// Variables filled into invocations that do not set them.
    defaults: Arc<Vec<(String, String)>>,
}

impl Pipeline {
    pub fn new(connector: Arc<dyn StoreConnector>, stage_copies: bool) -> Self {
        Self {
            connector,
            synchronizer: Synchronizer::new(stage_copies),
            defaults: Arc::new(Vec::new()),
        }
    }

    /// Build a pipeline from service configuration.
    pub fn from_config(connector: Arc<dyn StoreConnector>, cfg: &AppConfig) -> Self {
        let defaults = cfg
            .variable_defaults()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self {
            connector,
            synchronizer: Synchronizer::new(cfg.stage_copies)
                .with_staging_bucket(cfg.staging_bucket.clone()),
            defaults: Arc::new(defaults),
        }
    }

    /// Execute one invocation and describe its outcome.
    pub async fn run(&self, req: FunctionRequest) -> PipelineResult {
        let req = req.with_defaults(
            self.defaults
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        let mut resolved = None;
        match self.execute(&req, &mut resolved).await {
            Ok(reference) => {
                info!("Stripped metadata from {}", reference);
                PipelineResult::success(&reference)
            }
            Err(err) => {
                match &resolved {
                    Some(reference) => error!("{} ({}): {}", err.message(), reference, err),
                    None => error!("{}: {}", err.message(), err),
                }
                PipelineResult::failure(&err, resolved.as_ref())
            }
        }
    }

    /// `resolved` is filled as soon as the target is known so failures can name it.
    async fn execute(
        &self,
        req: &FunctionRequest,
        resolved: &mut Option<ObjectReference>,
    ) -> Result<ObjectReference, SanitizeError> {
        let settings = StoreSettings::from_request(req)?;
        let store = self
            .connector
            .connect(&settings)
            .map_err(SanitizeError::ClientInit)?;

        let source = resolver::trigger_source(req);
        let reference = resolver::resolve(source, req)?;
        let reference = resolved.insert(reference);
        info!("Processing file {} ({:?} trigger)", reference, source);

        let metadata = store
            .get_file(reference)
            .await
            .map_err(|e| SanitizeError::storage(SyncStep::GetFile, e))?;
        classifier::ensure_image(&metadata.mime_type)?;

        let original = store
            .download_file(reference)
            .await
            .map_err(|e| SanitizeError::storage(SyncStep::Download, e))?;
        let stripped = stripper::strip_metadata(original).await?;
        info!(
            "Re-encoded {} as {} ({}x{}), removed {:?}",
            reference,
            stripper::format_mime(stripped.format),
            stripped.width,
            stripped.height,
            stripped.removed
        );

        let strategy = source.strategy();
        info!("Writing {} back using {} strategy", reference, strategy);
        self.synchronizer
            .sync(
                store.as_ref(),
                strategy,
                reference,
                &metadata,
                stripped.bytes,
            )
            .await?;

        Ok(reference.clone())
    }
}
