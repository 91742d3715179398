//! Snapshot of the alarms this tool owns

use futures::TryStreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use tripwire_types::ExistingAlarm;

use crate::cloud::AlarmApi;
use crate::error::CloudResult;
use crate::paginate::paginate;

/// Reads every alarm carrying the ownership prefix
pub struct ExistingAlarmFetcher {
    alarms: Arc<dyn AlarmApi>,
}

impl ExistingAlarmFetcher {
    pub fn new(alarms: Arc<dyn AlarmApi>) -> Self {
        Self { alarms }
    }

    /// Owned alarms keyed by name
    ///
    /// Any page error fails the whole fetch. Alarms returned by the API
    /// without the prefix are dropped.
    pub async fn fetch_owned(&self, prefix: &str) -> CloudResult<BTreeMap<String, ExistingAlarm>> {
        let alarms = &self.alarms;
        let listed: Vec<ExistingAlarm> =
            paginate(|token| alarms.describe_alarms(prefix, token))
                .try_concat()
                .await?;

        let owned: BTreeMap<String, ExistingAlarm> = listed
            .into_iter()
            .filter(|alarm| alarm.name.starts_with(prefix))
            .map(|alarm| (alarm.name.clone(), alarm))
            .collect();

        debug!(prefix, count = owned.len(), "Fetched owned alarms");
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{CloudState, InMemoryCloud};
    use crate::error::CloudError;

    fn seeded(names: &[&str]) -> InMemoryCloud {
        InMemoryCloud::from_state(CloudState {
            resources: vec![],
            alarms: names.iter().map(|n| ExistingAlarm::named(*n)).collect(),
        })
    }

    #[tokio::test]
    async fn test_reads_all_pages() {
        let names: Vec<String> = (0..7).map(|i| format!("tw-lambda-f{}-Errors", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let cloud = Arc::new(seeded(&refs).with_page_size(3));
        let fetcher = ExistingAlarmFetcher::new(cloud.clone());

        let owned = fetcher.fetch_owned("tw-").await.unwrap();
        assert_eq!(owned.len(), 7);
        assert_eq!(
            cloud.calls_of(crate::cloud::ApiCallKind::DescribeAlarms).await.len(),
            3
        );
    }

    #[tokio::test]
    async fn test_ignores_alarms_without_prefix() {
        let cloud = Arc::new(seeded(&["tw-a", "manual-alarm", "tw"]));
        let fetcher = ExistingAlarmFetcher::new(cloud);

        let owned = fetcher.fetch_owned("tw-").await.unwrap();
        assert_eq!(owned.keys().collect::<Vec<_>>(), vec!["tw-a"]);
    }

    #[tokio::test]
    async fn test_page_error_fails_fetch() {
        let cloud = Arc::new(seeded(&["tw-a", "tw-b", "tw-c"]).with_page_size(1));
        cloud
            .fail_describe_at_page(2, CloudError::transport("connection reset"))
            .await;
        let fetcher = ExistingAlarmFetcher::new(cloud);

        assert_eq!(
            fetcher.fetch_owned("tw-").await,
            Err(CloudError::transport("connection reset"))
        );
    }
}
