//! JSON state file backing the in-memory cloud

use std::path::Path;
use tripwire_engine::CloudState;

use crate::error::{CliError, CliResult};

/// Read the resources and alarms recorded at `path`
pub async fn load_state(path: &Path) -> CliResult<CloudState> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&contents).map_err(|e| CliError::parse(path, e))
}

/// Write `state` to `path` as pretty-printed JSON
///
/// The file is replaced through a sibling temporary file so a failed write
/// never leaves a truncated state behind.
pub async fn save_state(path: &Path, state: &CloudState) -> CliResult<()> {
    let json = serde_json::to_string_pretty(state)?;
    let staging = path.with_extension("json.tmp");

    let write_err = |source| CliError::Write {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&staging, json).await.map_err(write_err)?;
    tokio::fs::rename(&staging, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_types::{ExistingAlarm, ResourceDescriptor, ResourceType};

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = CloudState {
            resources: vec![ResourceDescriptor::new(
                ResourceType::SnsTopic,
                "arn:aws:sns:us-east-1:123456789012:alerts",
            )],
            alarms: vec![ExistingAlarm::named("tw-sns-alerts-NumberOfNotificationsFailed")],
        };

        save_state(&path, &state).await.unwrap();
        assert_eq!(load_state(&path).await.unwrap(), state);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_sections_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{}").await.unwrap();

        assert_eq!(load_state(&path).await.unwrap(), CloudState::default());
    }

    #[tokio::test]
    async fn test_malformed_state_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        assert!(matches!(load_state(&path).await, Err(CliError::Parse { .. })));
    }
}
