//! Writes stripped bytes back to the store under the original identity.
//!
//! - **Update**: one content replace on the existing id. If it fails the
//!   original is presumed untouched.
//! - **Delete-then-recreate**: the original is deleted and created again
//!   with the same id, name and permission lists. With staging enabled the
//!   stripped bytes are first uploaded under a fresh id, so a failed
//!   recreate still leaves the content recoverable from that copy; the copy
//!   is removed once the recreate succeeds. Copies go to the original's
//!   bucket unless a staging bucket is set. A create in a bucket the
//!   function listens on fires one more event for the copy.

use crate::{
    errors::{SanitizeError, SyncStep},
    models::{
        file::ObjectMetadata,
        reference::{ObjectReference, SyncStrategy},
    },
    store::ObjectStore,
};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Synchronizer {
    stage_copies: bool,
    staging_bucket: Option<String>,
}

impl Synchronizer {
    pub fn new(stage_copies: bool) -> Self {
        Self {
            stage_copies,
            staging_bucket: None,
        }
    }

    /// Put staging copies in `bucket` instead of the original's bucket.
    pub fn with_staging_bucket(mut self, bucket: Option<String>) -> Self {
        self.staging_bucket = bucket;
        self
    }

    pub async fn sync(
        &self,
        store: &dyn ObjectStore,
        strategy: SyncStrategy,
        reference: &ObjectReference,
        metadata: &ObjectMetadata,
        stripped: Bytes,
    ) -> Result<(), SanitizeError> {
        match strategy {
            SyncStrategy::Update => update(store, reference, stripped).await,
            SyncStrategy::DeleteRecreate => {
                self.delete_recreate(store, reference, metadata, stripped)
                    .await
            }
        }
    }

    async fn delete_recreate(
        &self,
        store: &dyn ObjectStore,
        reference: &ObjectReference,
        metadata: &ObjectMetadata,
        stripped: Bytes,
    ) -> Result<(), SanitizeError> {
        let staged = if self.stage_copies {
            let bucket = self
                .staging_bucket
                .as_deref()
                .unwrap_or(reference.bucket_id.as_str());
            Some(stage(store, bucket, reference, metadata, stripped.clone()).await?)
        } else {
            None
        };

        info!("Deleting file {}", reference);
        if let Err(err) = store.delete_file(reference).await {
            discard_stage(store, staged.as_ref()).await;
            return Err(SanitizeError::storage(SyncStep::Delete, err));
        }

        info!("Recreating file {}", reference);
        if let Err(err) = store
            .create_file(
                reference,
                stripped,
                &metadata.name,
                &metadata.read_permissions,
                &metadata.write_permissions,
            )
            .await
        {
            match &staged {
                Some(copy) => warn!(
                    "File {} was deleted but could not be recreated; stripped content kept as {}",
                    reference, copy
                ),
                None => warn!(
                    "File {} was deleted but could not be recreated; content is lost",
                    reference
                ),
            }
            return Err(SanitizeError::Storage {
                source: err,
                step: SyncStep::Recreate,
                original_removed: true,
                staged,
            });
        }

        discard_stage(store, staged.as_ref()).await;
        Ok(())
    }
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new(true)
    }
}

async fn update(
    store: &dyn ObjectStore,
    reference: &ObjectReference,
    stripped: Bytes,
) -> Result<(), SanitizeError> {
    info!("Updating file {}", reference);
    store
        .update_file_content(reference, stripped)
        .await
        .map_err(|err| SanitizeError::storage(SyncStep::Update, err))
}

/// Upload the stripped bytes under a fresh id with no permissions.
async fn stage(
    store: &dyn ObjectStore,
    bucket_id: &str,
    reference: &ObjectReference,
    metadata: &ObjectMetadata,
    stripped: Bytes,
) -> Result<ObjectReference, SanitizeError> {
    let staged = ObjectReference::new(bucket_id, Uuid::new_v4().simple().to_string());
    info!("Staging stripped copy of {} as {}", reference, staged);
    store
        .create_file(&staged, stripped, &metadata.name, &[], &[])
        .await
        .map_err(|err| SanitizeError::storage(SyncStep::Stage, err))?;
    Ok(staged)
}

/// Best-effort removal of the staging copy.
async fn discard_stage(store: &dyn ObjectStore, staged: Option<&ObjectReference>) {
    let Some(staged) = staged else {
        return;
    };
    if let Err(err) = store.delete_file(staged).await {
        warn!("Failed to remove staging copy {}: {}", staged, err);
    }
}
