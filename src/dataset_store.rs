//! Dataset storage.
//!
//! Raw CSV blobs live on disk under `<data-dir>/blobs`, one file per dataset
//! keyed by its UUID. Metadata records live in an embedded sled tree so that
//! listings and retention never touch the blobs. Mutations are serialised
//! behind a mutex and the per-owner retention cap is applied after each
//! successful write, evicting the owner's oldest datasets.

use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{event, Level};
use uuid::Uuid;

use crate::cli::CommandLineArgs;
use crate::error::EquistatError;
use crate::metrics::DATASET_EVICTIONS;
use crate::models::{DatasetInfo, OwnerInfo};

/// Stored metadata for one dataset.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DatasetMeta {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: String,
    /// File name supplied with the upload.
    pub filename: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub size_bytes: u64,
    /// Store-assigned monotonic sequence number; higher is more recent.
    /// Recency ordering uses this rather than `uploaded_at`, so same-second
    /// uploads still order deterministically.
    pub seq: u64,
}

impl DatasetMeta {
    /// Convert to the wire representation.
    pub fn to_info(&self) -> DatasetInfo {
        DatasetInfo {
            id: self.id,
            filename: self.filename.clone(),
            uploaded_at: self.uploaded_at,
            size_bytes: self.size_bytes,
            owner: OwnerInfo {
                id: self.owner_id,
                username: self.owner_username.clone(),
            },
        }
    }
}

/// Blob and metadata store for uploaded datasets.
pub struct DatasetStore {
    /// Handle to the embedded database, used for sequence numbers and flushing.
    db: sled::Db,

    /// Metadata tree, dataset id -> JSON-encoded [DatasetMeta].
    datasets: sled::Tree,

    /// Directory holding one blob file per dataset.
    blobs_dir: PathBuf,

    /// Per-owner retention cap.
    capacity: usize,

    /// Serialises mutations so the retention invariant cannot race.
    write_lock: Mutex<()>,
}

impl DatasetStore {
    /// Open or create a store under the configured data directory.
    pub fn new(args: &CommandLineArgs) -> Result<Self, EquistatError> {
        let data_dir = PathBuf::from(&args.data_dir);
        let blobs_dir = data_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)?;
        let db = sled::open(data_dir.join("index"))?;
        let datasets = db.open_tree("datasets")?;
        Ok(Self {
            db,
            datasets,
            blobs_dir,
            capacity: args.max_datasets_per_user,
            write_lock: Mutex::new(()),
        })
    }

    /// Store a validated upload and apply the owner's retention cap.
    ///
    /// The blob is written before the metadata record, so a failed write
    /// never leaves a record pointing at a missing file. Returns the new
    /// metadata together with any evicted datasets.
    pub async fn create(
        &self,
        owner_id: Uuid,
        owner_username: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<(DatasetMeta, Vec<DatasetMeta>), EquistatError> {
        let _guard = self.write_lock.lock().await;
        let meta = DatasetMeta {
            id: Uuid::new_v4(),
            owner_id,
            owner_username: owner_username.to_string(),
            filename: filename.to_string(),
            uploaded_at: OffsetDateTime::now_utc(),
            size_bytes: data.len() as u64,
            seq: self.db.generate_id()?,
        };
        tokio::fs::write(self.blob_path(meta.id), data.as_ref()).await?;
        self.datasets
            .insert(meta.id.to_string().as_bytes(), serde_json::to_vec(&meta)?)?;

        // Keep the newest `capacity` datasets for this owner.
        let mut owned = self.list_for_owner(owner_id)?;
        let mut evicted = Vec::new();
        while owned.len() > self.capacity {
            // Listings are most recent first, so the oldest is at the back.
            if let Some(oldest) = owned.pop() {
                self.remove(&oldest).await?;
                evicted.push(oldest);
            }
        }
        self.db.flush_async().await?;

        for dataset in &evicted {
            DATASET_EVICTIONS.inc();
            event!(
                Level::INFO,
                dataset_id = %dataset.id,
                owner = %dataset.owner_username,
                "evicted dataset beyond retention cap"
            );
        }
        Ok((meta, evicted))
    }

    /// Return the metadata for a dataset.
    pub fn get(&self, id: Uuid) -> Result<DatasetMeta, EquistatError> {
        match self.datasets.get(id.to_string().as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(EquistatError::DatasetNotFound { dataset_id: id }),
        }
    }

    /// Read the raw CSV blob for a dataset.
    pub async fn read(&self, meta: &DatasetMeta) -> Result<Bytes, EquistatError> {
        match tokio::fs::read(self.blob_path(meta.id)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(EquistatError::DatasetFileMissing {
                    dataset_id: meta.id,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// All datasets, most recent first.
    pub fn list(&self) -> Result<Vec<DatasetMeta>, EquistatError> {
        let mut datasets: Vec<DatasetMeta> = Vec::new();
        for entry in self.datasets.iter() {
            let (_, raw) = entry?;
            datasets.push(serde_json::from_slice(&raw)?);
        }
        datasets.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(datasets)
    }

    /// One owner's datasets, most recent first.
    pub fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<DatasetMeta>, EquistatError> {
        let mut datasets = self.list()?;
        datasets.retain(|dataset| dataset.owner_id == owner_id);
        Ok(datasets)
    }

    /// Delete one dataset, blob included.
    pub async fn delete(&self, id: Uuid) -> Result<(), EquistatError> {
        let _guard = self.write_lock.lock().await;
        let meta = self.get(id)?;
        self.remove(&meta).await?;
        self.db.flush_async().await?;
        Ok(())
    }

    /// Delete all of an owner's datasets. Used when the owner is deleted.
    ///
    /// Returns the number of datasets removed.
    pub async fn delete_for_owner(&self, owner_id: Uuid) -> Result<usize, EquistatError> {
        let _guard = self.write_lock.lock().await;
        let owned = self.list_for_owner(owner_id)?;
        for dataset in &owned {
            self.remove(dataset).await?;
        }
        self.db.flush_async().await?;
        Ok(owned.len())
    }

    /// Path of the blob file for a dataset.
    fn blob_path(&self, id: Uuid) -> PathBuf {
        self.blobs_dir.join(format!("{}.csv", id))
    }

    /// Remove a metadata record and its blob. An already missing blob is not
    /// an error.
    async fn remove(&self, meta: &DatasetMeta) -> Result<(), EquistatError> {
        self.datasets.remove(meta.id.to_string().as_bytes())?;
        match tokio::fs::remove_file(self.blob_path(meta.id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
