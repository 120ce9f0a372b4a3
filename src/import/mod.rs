//! Log-file import pipeline
//!
//! Streams a log source through the parser, enriches rows that carry a
//! client address with a country from the geo range table, and persists
//! each file as one replaceable batch keyed by the file's base name.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::geoip::GeoRangeTable;
use crate::models::RequestRecord;
use crate::parser;
use crate::storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StorageError),
}

pub struct ImportPipeline {
    storage: Arc<dyn Storage>,
    geoip_dataset: PathBuf,
    geo: OnceCell<GeoRangeTable>,
}

impl ImportPipeline {
    pub fn new(storage: Arc<dyn Storage>, geoip_dataset: PathBuf) -> Self {
        Self {
            storage,
            geoip_dataset,
            geo: OnceCell::new(),
        }
    }

    /// The shared geo table, loaded on first use.
    ///
    /// A load failure degrades to the empty table: records keep importing
    /// without a country instead of blocking the run. The OnceCell also
    /// rules out a concurrent double-load.
    async fn geo(&self) -> &GeoRangeTable {
        self.geo
            .get_or_init(|| async {
                match GeoRangeTable::load(&self.geoip_dataset).await {
                    Ok(table) => {
                        info!("loaded {} geo ranges", table.len());
                        table
                    }
                    Err(e) => {
                        warn!("geo dataset unavailable, importing without countries: {e}");
                        GeoRangeTable::empty()
                    }
                }
            })
            .await
    }

    /// Import a single log file, replacing any prior batch with the same
    /// ident.
    ///
    /// Returns the number of input lines consumed. Malformed lines count
    /// too; they persist with zero-valued fields. Only blank lines are
    /// skipped. Delete-old-batch and insert-new-batch run inside one
    /// store transaction, so a failure is never partial success.
    pub async fn import(&self, path: &Path) -> Result<usize, ImportError> {
        match tokio::fs::metadata(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ImportError::PathNotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ImportError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
            Ok(_) => {}
        }

        let ident = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let geo = self.geo().await;

        let data = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ImportError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut records = Vec::new();
        for line in data.lines() {
            let Some(parsed) = parser::parse_line(line) else {
                continue;
            };
            let country = parsed
                .client
                .as_deref()
                .and_then(parser::ipv4_to_u32)
                .and_then(|addr| geo.lookup(addr))
                .map(str::to_owned);
            records.push(RequestRecord {
                ident: ident.clone(),
                resource: parsed.resource,
                timestamp_utc: parsed.timestamp.unwrap_or(0),
                country,
            });
        }

        self.storage.replace_batch(&ident, &records).await?;
        Ok(records.len())
    }

    /// Import every `*.log` file in `dir`, sequentially, in directory
    /// enumeration order.
    ///
    /// One file's failure is logged and does not stop the remaining
    /// files. Returns the per-file record counts of the files that
    /// imported successfully.
    pub async fn import_dir(&self, dir: &Path) -> Result<Vec<(PathBuf, usize)>, ImportError> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ImportError::PathNotFound(dir.to_path_buf()),
            _ => ImportError::Io {
                path: dir.to_path_buf(),
                source: e,
            },
        })?;

        let mut imported = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(ImportError::Io {
                        path: dir.to_path_buf(),
                        source: e,
                    });
                }
            };

            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "log") {
                continue;
            }

            match self.import(&path).await {
                Ok(count) => {
                    info!("Imported {} records from {}", count, path.display());
                    imported.push((path, count));
                }
                Err(e) => warn!("import failed for {}: {e}", path.display()),
            }
        }

        Ok(imported)
    }
}
