use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::engine::{Engines, EvidenceSettings, ReconcileSettings};
use common::page::PageRegistry;
use common::storage::filesystem::FilesystemObjectStore;
use common::storage::s3::S3ObjectStore;
use common::storage::{ObjectStore, UrlSigner};
use sea_orm::DatabaseConnection;

use crate::config::{AppConfig, StorageBackend};
use crate::store::{SeaEvidenceIndex, SeaRecordStore};

/// Path under which filesystem downloads are served.
pub const FILES_ROUTE: &str = "/api/v1/files";

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub engines: Engines,
    pub pages: Arc<PageRegistry>,
    pub objects: Arc<dyn ObjectStore>,
    /// Present only for the filesystem backend.
    pub signer: Option<UrlSigner>,
}

impl AppState {
    /// Wire stores, object storage and engines from configuration.
    pub async fn build(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<Self> {
        let storage = &config.storage;
        let (objects, signer): (Arc<dyn ObjectStore>, Option<UrlSigner>) = match storage.backend {
            StorageBackend::Filesystem => {
                let signer = UrlSigner::new(
                    format!(
                        "{}{FILES_ROUTE}",
                        storage.public_base_url.trim_end_matches('/')
                    ),
                    config.url_secret(),
                )
                .context("failed to initialise url signer")?;
                let store = FilesystemObjectStore::new(
                    storage.root.clone(),
                    storage.max_object_size,
                    signer.clone(),
                )
                .await
                .context("failed to initialise filesystem storage")?;
                (Arc::new(store), Some(signer))
            }
            StorageBackend::S3 => {
                let settings = storage
                    .s3
                    .as_ref()
                    .context("storage.backend is s3 but [storage.s3] is missing")?;
                let store = S3ObjectStore::new(settings, storage.max_object_size)
                    .context("failed to initialise s3 storage")?;
                (Arc::new(store), None)
            }
        };

        let pages = Arc::new(PageRegistry::builtin());
        let engines = Engines::new(
            Arc::new(SeaRecordStore::new(db.clone())),
            Arc::new(SeaEvidenceIndex::new(db.clone())),
            objects.clone(),
            pages.clone(),
            EvidenceSettings {
                max_file_size: storage.max_object_size,
                signed_url_ttl: Duration::from_secs(storage.signed_url_ttl_secs),
                allowed_types: storage.allowed_types.clone(),
            },
            ReconcileSettings {
                grace: chrono::Duration::seconds(config.reconcile.grace_secs),
                dry_run: config.reconcile.dry_run,
                prefix: String::new(),
            },
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            engines,
            pages,
            objects,
            signer,
        })
    }
}
