// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end user journeys composed from envstore client operations.
//!
//! A journey walks the canonical lifecycle against a live server: create a
//! fresh namespace, submit a specification and wait for the build, then
//! tear the environment and namespace back down. Build failures are part
//! of the journey outcome, not errors; only transport and parse failures
//! abort.

use std::path::Path;

use anyhow::{Context, Result};
use envstore_client::{BuildStatus, EnvstoreClient, PollPolicy};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

/// What happened during an environment journey.
#[derive(Debug, Clone, Serialize)]
pub struct JourneyReport {
    /// Namespace the journey ran in (randomly generated).
    pub namespace: String,
    /// Terminal status the build reached.
    pub build_status: BuildStatus,
    /// Whether the environment was deleted. Only attempted after a
    /// `COMPLETED` build; a failed build leaves nothing to delete.
    pub environment_deleted: bool,
    pub namespace_deleted: bool,
}

/// Run the full environment lifecycle: namespace creation, specification
/// submission with build polling, then teardown. `environment_name` must
/// match the name declared inside the specification file, since the server
/// derives the environment's identity from the specification.
pub async fn run_environment_journey(
    client: &EnvstoreClient,
    environment_name: &str,
    specification_path: &Path,
    policy: &PollPolicy,
) -> Result<JourneyReport> {
    let namespace = EnvstoreClient::gen_random_namespace();
    info!(target: "journeys", namespace = %namespace, "starting environment journey");

    client
        .create_namespace(Some(&namespace), policy)
        .await
        .context("namespace creation did not reach a terminal status")?;
    info!(target: "journeys", namespace = %namespace, "namespace ready");

    let build_response = client
        .create_environment(&namespace, specification_path, policy)
        .await
        .context("environment build did not reach a terminal status")?;
    let build_status = terminal_build_status(&build_response.json_value()?)?;
    info!(target: "journeys", namespace = %namespace, %build_status, "build finished");

    let environment_deleted = if build_status == BuildStatus::Completed {
        client
            .delete_environment(&namespace, environment_name)
            .await
            .context("environment deletion failed")?;
        true
    } else {
        false
    };

    client
        .delete_namespace(&namespace)
        .await
        .context("namespace deletion failed")?;
    info!(target: "journeys", namespace = %namespace, "journey complete");

    Ok(JourneyReport {
        namespace,
        build_status,
        environment_deleted,
        namespace_deleted: true,
    })
}

fn terminal_build_status(value: &Value) -> Result<BuildStatus> {
    let status = value
        .get("data")
        .and_then(|data| data.get("status"))
        .and_then(Value::as_str)
        .context("build response is missing data.status")?;
    Ok(status.parse::<BuildStatus>()?)
}
