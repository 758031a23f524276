//! Delta detection between the repository and the ledger

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::deploy::pipeline::Pipeline;
use crate::errors::MonitorError;
use crate::http::artifactory::DEPLOY_EXTENSION;
use crate::ledger::{DeployRecord, DeployStatus};
use crate::models::deployment::DeployJob;
use crate::models::repository::RepositoryEntry;
use crate::storage::layout::plain_segment;

/// Find the applications whose latest listed version still has to be deployed.
///
/// Versions are compared as plain strings, so `1.0.10` sorts before `1.0.2`.
/// Failing to list the top level aborts detection. Failing to read one
/// application skips it for this cycle, unless the listing could not be
/// decoded at all. Names and versions that are not a single plain path
/// segment are skipped, since both end up in staging paths.
pub async fn detect(pipeline: &Pipeline) -> Result<Vec<DeployJob>, MonitorError> {
    let apps = pipeline
        .repository
        .list_entries(&pipeline.deploy_repo, true)
        .await?;

    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for app in apps {
        let name = normalize_segment(&app.uri);
        if name.is_empty() || !seen.insert(name.clone()) {
            continue;
        }
        if plain_segment(&name).is_err() {
            warn!("Ignoring application {:?}: not a plain directory name", name);
            continue;
        }

        let dir = format!("{}/{}", pipeline.deploy_repo, name);
        let versions = match pipeline.repository.list_entries(&dir, false).await {
            Ok(versions) => versions,
            Err(MonitorError::JsonError(e)) => return Err(MonitorError::JsonError(e)),
            Err(e) => {
                error!("Unable to read directory {}: {}", dir, e);
                continue;
            }
        };

        let Some(latest) = latest_version(&versions) else {
            debug!("No deploy requests for {}", name);
            continue;
        };
        if plain_segment(&latest).is_err() {
            warn!("Ignoring version {:?} of {}: not a plain file name", latest, name);
            continue;
        }

        let key = pipeline.key(&name);
        let last = match pipeline.ledger.query_last_deploy(&key).await {
            Ok(last) => last,
            Err(e) => {
                error!("Unable to read deploy from ledger for {}: {}", key, e);
                continue;
            }
        };

        if needs_deploy(last.as_ref(), &latest) {
            info!("Scheduling deploy of {} {}", name, latest);
            jobs.push(DeployJob::new(name, latest));
        }
    }

    Ok(jobs)
}

/// Lexically greatest entry, normalized. `None` when nothing usable is listed.
pub fn latest_version(entries: &[RepositoryEntry]) -> Option<String> {
    entries
        .iter()
        .map(|entry| entry.uri.as_str())
        .max()
        .map(normalize_segment)
        .filter(|version| !version.is_empty())
}

/// Strip path separators and the deploy request extension from a listed uri
pub fn normalize_segment(uri: &str) -> String {
    let segment = uri.trim_matches('/');
    let suffix = format!(".{}", DEPLOY_EXTENSION);
    segment.strip_suffix(&suffix).unwrap_or(segment).to_string()
}

/// Deploy when nothing was tried, when the ledger is behind, or when the
/// latest version failed last time.
pub fn needs_deploy(last: Option<&DeployRecord>, latest: &str) -> bool {
    match last {
        None => true,
        Some(record) => {
            record.version.as_str() < latest
                || (record.version == latest && record.status == DeployStatus::Failed)
        }
    }
}
