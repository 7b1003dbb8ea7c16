//! Device store handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::Database;

use crate::catalog::{self, Catalog};
use crate::error::Result;
use crate::schema;

/// Embedded store holding the catalog, device models, devices, and their
/// observation history.
///
/// All operations are synchronous. Every logical write runs in a single
/// write transaction, so a failure part way through leaves no partial rows.
pub struct DeviceStore {
    db: Database,
    path: PathBuf,
    catalog: Catalog,
}

impl DeviceStore {
    /// Open or create a store at the given path.
    ///
    /// Creates every table and seeds the catalog.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path_ref = path.as_ref();
        let db = if path_ref.exists() {
            Database::open(path_ref)?
        } else {
            if let Some(parent) = path_ref.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Database::create(path_ref)?
        };

        let write_txn = db.begin_write()?;
        schema::create_tables(&write_txn)?;
        let catalog = catalog::seed(&write_txn)?;
        write_txn.commit()?;

        tracing::info!(
            path = %path_ref.display(),
            controlled_properties = catalog.len(),
            "Device store initialized"
        );

        Ok(Arc::new(DeviceStore {
            db,
            path: path_ref.to_path_buf(),
            catalog,
        }))
    }

    /// Create a store on a fresh temporary file.
    pub fn memory() -> Result<Arc<Self>> {
        let temp_path =
            std::env::temp_dir().join(format!("devreg_test_{}.redb", uuid::Uuid::new_v4()));
        Self::open(temp_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore")
            .field("path", &self.path)
            .field("catalog", &self.catalog)
            .finish()
    }
}
