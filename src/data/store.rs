use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::error::{LoadError, StoreError};
use super::loader::{self, LoadOptions};
use super::model::Dataset;

type LoadFn = dyn Fn() -> Result<Dataset, LoadError> + Send + Sync;

/// Owner of the loaded dataset.
///
/// Built once at startup and handed to every consumer by reference.  The
/// first [`load`](Self::load) reads the source; every later call returns the
/// same `Arc`.  Concurrent first calls block until the single read finishes.
/// A failed read leaves the store empty.
pub struct DatasetStore {
    source: Box<LoadFn>,
    dataset: OnceCell<Arc<Dataset>>,
}

impl DatasetStore {
    /// A store reading `path` with the given options.
    pub fn open(path: impl Into<PathBuf>, options: LoadOptions) -> Self {
        let path = path.into();
        Self::from_loader(move || {
            log::info!("Reading dataset from {}", path.display());
            loader::load_file(&path, &options)
        })
    }

    /// A store backed by an arbitrary loader.
    pub fn from_loader<F>(load: F) -> Self
    where
        F: Fn() -> Result<Dataset, LoadError> + Send + Sync + 'static,
    {
        DatasetStore {
            source: Box::new(load),
            dataset: OnceCell::new(),
        }
    }

    /// The normalised dataset, read on first use.
    pub fn load(&self) -> Result<Arc<Dataset>, LoadError> {
        self.dataset
            .get_or_try_init(|| {
                let dataset = (self.source)()?;
                log::info!(
                    "Loaded {} records with columns {:?}",
                    dataset.len(),
                    dataset.schema().column_names()
                );
                Ok(Arc::new(dataset))
            })
            .cloned()
    }

    /// Whether the dataset has been read.
    pub fn is_loaded(&self) -> bool {
        self.dataset.get().is_some()
    }

    /// Non-null distinct labels of a field.
    pub fn distinct_values(&self, field: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.load()?.distinct_values(field)?)
    }
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
