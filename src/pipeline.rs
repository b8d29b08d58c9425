//! The ingest run: fetch, normalize, back up, upload, announce.

use std::path::PathBuf;

use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::fetch::{HourlyRequest, WeatherApi};
use crate::normalize::normalize_indexed;
use crate::notify::{Publisher, announce};
use crate::output::{series_to_csv, write_series_file};
use crate::store::{ObjectStore, gzip};

/// Where one ingest run writes its results.
#[derive(Debug, Clone)]
pub struct IngestTarget {
    /// Local copy of the backup, written before upload.
    pub local_path: Option<PathBuf>,
    pub bucket: String,
    pub key: String,
    pub gzip: bool,
    pub topic: Option<String>,
}

impl IngestTarget {
    /// Object key actually used; gzip uploads get a `.gz` suffix.
    pub fn object_key(&self) -> String {
        if self.gzip {
            format!("{}.gz", self.key)
        } else {
            self.key.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub retained: usize,
    pub object_key: String,
    pub published: usize,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.fetched - self.retained
    }
}

/// Runs one ingest.
///
/// A fetch failure stops the run before anything is written, an upload
/// failure stops it before publishing, and publish failures are only logged.
#[tracing::instrument(skip_all, fields(bucket = %target.bucket, key = %target.key))]
pub async fn run_ingest(
    api: &dyn WeatherApi,
    store: &dyn ObjectStore,
    publisher: Option<&dyn Publisher>,
    request: &HourlyRequest,
    target: &IngestTarget,
) -> Result<IngestReport> {
    let raw = api.fetch_hourly(request).await?;
    let fetched = raw.len();

    let (series, source_index) = normalize_indexed(raw);
    info!(
        fetched,
        retained = series.len(),
        dropped = fetched - series.len(),
        "Removed empty hours"
    );

    if let Some(path) = &target.local_path {
        write_series_file(path, &series)
            .map_err(|e| PipelineError::collaborator("local file", e))?;
    }

    let csv = series_to_csv(&series).map_err(|e| PipelineError::collaborator("CSV encoder", e))?;
    let body = if target.gzip {
        gzip(&csv).map_err(|e| PipelineError::collaborator("gzip", e))?
    } else {
        csv.into()
    };

    let object_key = target.object_key();
    store
        .upload(&target.bucket, &object_key, body)
        .await
        .map_err(|e| {
            error!(error = %e, "Upload failed, nothing will be published");
            PipelineError::collaborator("object store", e)
        })?;
    info!(bucket = %target.bucket, key = %object_key, "Backup uploaded");

    let published = match (publisher, &target.topic) {
        (Some(publisher), Some(topic)) => announce(publisher, topic, &series, &source_index).await,
        _ => {
            info!("No topic configured, skipping announcements");
            0
        }
    };

    Ok(IngestReport {
        fetched,
        retained: series.len(),
        object_key,
        published,
    })
}
