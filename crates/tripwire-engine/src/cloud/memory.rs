//! In-memory cloud implementation
//!
//! Backs both ports with plain collections. Used by the test suites and by
//! the CLI's state-file backend. Failures can be injected per call kind.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tripwire_types::{
    AlarmSpec, ExistingAlarm, ResourceDescriptor, ResourceType, MAX_ALARM_NAME_LEN,
};

use super::{AlarmApi, BatchItemError, InventoryApi, Page, MAX_DELETE_BATCH};
use crate::error::{CloudError, CloudResult};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Serializable contents of the in-memory cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudState {
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,

    #[serde(default)]
    pub alarms: Vec<ExistingAlarm>,
}

/// Kind of API call recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCallKind {
    ListResources,
    DescribeAlarms,
    PutMetricAlarm,
    DeleteAlarms,
}

/// One recorded API call
#[derive(Debug, Clone)]
pub struct ApiCall {
    pub kind: ApiCallKind,
    /// Resource type, alarm name, or first name of a delete batch
    pub target: String,
    /// Number of names in a delete batch, 1 otherwise
    pub items: usize,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Faults {
    listing: HashMap<ResourceType, CloudError>,
    describe: Option<(usize, CloudError)>,
    put: HashMap<String, VecDeque<CloudError>>,
    delete_calls: VecDeque<CloudError>,
    delete_items: HashMap<String, CloudError>,
}

/// Cloud backed by in-memory collections
#[derive(Debug)]
pub struct InMemoryCloud {
    resources: RwLock<Vec<ResourceDescriptor>>,
    alarms: RwLock<BTreeMap<String, ExistingAlarm>>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<ApiCall>>,
    page_size: usize,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::from_state(CloudState::default())
    }

    /// Create a cloud seeded with resources and alarms
    pub fn from_state(state: CloudState) -> Self {
        let alarms = state
            .alarms
            .into_iter()
            .map(|alarm| (alarm.name.clone(), alarm))
            .collect();

        Self {
            resources: RwLock::new(state.resources),
            alarms: RwLock::new(alarms),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the number of items per list page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Copy the current contents out
    pub async fn snapshot(&self) -> CloudState {
        CloudState {
            resources: self.resources.read().await.clone(),
            alarms: self.alarms.read().await.values().cloned().collect(),
        }
    }

    pub async fn add_resource(&self, descriptor: ResourceDescriptor) {
        self.resources.write().await.push(descriptor);
    }

    /// Remove every resource whose ARN matches
    pub async fn remove_resource(&self, arn: &str) {
        self.resources.write().await.retain(|r| r.arn != arn);
    }

    pub async fn insert_alarm(&self, alarm: ExistingAlarm) {
        self.alarms.write().await.insert(alarm.name.clone(), alarm);
    }

    pub async fn alarm_names(&self) -> Vec<String> {
        self.alarms.read().await.keys().cloned().collect()
    }

    /// Calls made so far, in order
    pub async fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().await.clone()
    }

    pub async fn calls_of(&self, kind: ApiCallKind) -> Vec<ApiCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Fail every listing of `resource_type`
    pub async fn fail_listing(&self, resource_type: ResourceType, error: CloudError) {
        self.faults.lock().await.listing.insert(resource_type, error);
    }

    /// Fail the describe call that would return page `page` (0-based)
    pub async fn fail_describe_at_page(&self, page: usize, error: CloudError) {
        self.faults.lock().await.describe = Some((page, error));
    }

    /// Fail the next `times` puts of the alarm `name`
    pub async fn fail_put(&self, name: &str, error: CloudError, times: usize) {
        let mut faults = self.faults.lock().await;
        let queue = faults.put.entry(name.to_string()).or_default();
        queue.extend(std::iter::repeat(error).take(times));
    }

    /// Fail the next delete call as a whole
    pub async fn fail_next_delete_call(&self, error: CloudError) {
        self.faults.lock().await.delete_calls.push_back(error);
    }

    /// Report `name` as failed whenever it is part of a delete batch
    pub async fn fail_delete_item(&self, name: &str, error: CloudError) {
        self.faults
            .lock()
            .await
            .delete_items
            .insert(name.to_string(), error);
    }

    async fn record(&self, kind: ApiCallKind, target: impl Into<String>, items: usize) {
        self.calls.lock().await.push(ApiCall {
            kind,
            target: target.into(),
            items,
            at: Instant::now(),
        });
    }

    fn parse_token(token: Option<String>) -> CloudResult<usize> {
        match token.as_deref() {
            None | Some("") => Ok(0),
            Some(t) => t
                .parse()
                .map_err(|_| CloudError::api("InvalidNextToken", format!("Unknown token {}", t))),
        }
    }

    fn page_of<T: Clone>(&self, items: &[T], offset: usize) -> Page<T> {
        let end = (offset + self.page_size).min(items.len());
        let page = items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default();
        if end < items.len() {
            Page::with_next(page, end.to_string())
        } else {
            Page::last(page)
        }
    }
}

#[async_trait]
impl InventoryApi for InMemoryCloud {
    async fn list_resources(
        &self,
        resource_type: ResourceType,
        tag_filter: &BTreeMap<String, String>,
        page_token: Option<String>,
    ) -> CloudResult<Page<ResourceDescriptor>> {
        self.record(ApiCallKind::ListResources, resource_type.key(), 1)
            .await;

        if let Some(error) = self.faults.lock().await.listing.get(&resource_type) {
            return Err(error.clone());
        }

        let offset = Self::parse_token(page_token)?;
        let resources = self.resources.read().await;
        let matching: Vec<ResourceDescriptor> = resources
            .iter()
            .filter(|r| r.resource_type == resource_type)
            .filter(|r| tag_filter.iter().all(|(k, v)| r.tags.get(k) == Some(v)))
            .cloned()
            .collect();

        Ok(self.page_of(&matching, offset))
    }
}

#[async_trait]
impl AlarmApi for InMemoryCloud {
    async fn describe_alarms(
        &self,
        name_prefix: &str,
        page_token: Option<String>,
    ) -> CloudResult<Page<ExistingAlarm>> {
        self.record(ApiCallKind::DescribeAlarms, name_prefix, 1).await;

        let offset = Self::parse_token(page_token)?;
        if let Some((page, error)) = &self.faults.lock().await.describe {
            if offset / self.page_size == *page {
                return Err(error.clone());
            }
        }

        let alarms = self.alarms.read().await;
        let owned: Vec<ExistingAlarm> = alarms
            .range(name_prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(name_prefix))
            .map(|(_, alarm)| alarm.clone())
            .collect();

        Ok(self.page_of(&owned, offset))
    }

    async fn put_metric_alarm(&self, spec: &AlarmSpec) -> CloudResult<()> {
        self.record(ApiCallKind::PutMetricAlarm, spec.name.as_str(), 1)
            .await;

        if let Some(queue) = self.faults.lock().await.put.get_mut(&spec.name) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        if spec.name.is_empty() || spec.name.chars().count() > MAX_ALARM_NAME_LEN {
            return Err(CloudError::api(
                "ValidationError",
                format!("Alarm name length must be between 1 and {}", MAX_ALARM_NAME_LEN),
            ));
        }

        self.alarms
            .write()
            .await
            .insert(spec.name.clone(), ExistingAlarm::from(spec));
        Ok(())
    }

    async fn delete_alarms(&self, names: &[String]) -> CloudResult<Vec<BatchItemError>> {
        let first = names.first().cloned().unwrap_or_default();
        self.record(ApiCallKind::DeleteAlarms, first, names.len()).await;

        if names.len() > MAX_DELETE_BATCH {
            return Err(CloudError::api(
                "LimitExceeded",
                format!("At most {} alarm names per call", MAX_DELETE_BATCH),
            ));
        }

        let faults = {
            let mut faults = self.faults.lock().await;
            if let Some(error) = faults.delete_calls.pop_front() {
                return Err(error);
            }
            faults.delete_items.clone()
        };

        let mut alarms = self.alarms.write().await;
        let mut failures = Vec::new();
        for name in names {
            if let Some(error) = faults.get(name) {
                failures.push(BatchItemError {
                    name: name.clone(),
                    error: error.clone(),
                });
            } else if alarms.remove(name).is_none() {
                failures.push(BatchItemError {
                    name: name.clone(),
                    error: CloudError::api("ResourceNotFound", format!("Alarm {} does not exist", name)),
                });
            }
        }

        Ok(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lambda(name: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(
            ResourceType::LambdaFunction,
            format!("arn:aws:lambda:us-east-1:123456789012:function:{}", name),
        )
    }

    fn spec_named(name: &str) -> AlarmSpec {
        AlarmSpec {
            name: name.to_string(),
            description: String::new(),
            namespace: "AWS/Lambda".to_string(),
            metric_name: "Errors".to_string(),
            dimensions: vec![],
            params: Default::default(),
            actions: vec![],
            tags: BTreeMap::new(),
            resource_key: "lambda".to_string(),
            resource_type: ResourceType::LambdaFunction,
            resource_name: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn test_list_resources_pages_and_filters_by_type() {
        let cloud = InMemoryCloud::new().with_page_size(2);
        for name in ["a", "b", "c"] {
            cloud.add_resource(lambda(name)).await;
        }
        cloud
            .add_resource(ResourceDescriptor::new(
                ResourceType::SqsQueue,
                "arn:aws:sqs:us-east-1:123456789012:q",
            ))
            .await;

        let no_tags = BTreeMap::new();
        let first = cloud
            .list_resources(ResourceType::LambdaFunction, &no_tags, None)
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let second = cloud
            .list_resources(ResourceType::LambdaFunction, &no_tags, first.next_token)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_describe_filters_by_prefix() {
        let cloud = InMemoryCloud::from_state(CloudState {
            resources: vec![],
            alarms: vec![
                ExistingAlarm::named("other-alarm"),
                ExistingAlarm::named("tw-lambda-a-Errors"),
                ExistingAlarm::named("tw-lambda-b-Errors"),
                ExistingAlarm::named("tx-unrelated"),
            ],
        });

        let page = cloud.describe_alarms("tw-", None).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["tw-lambda-a-Errors", "tw-lambda-b-Errors"]);
    }

    #[tokio::test]
    async fn test_put_fault_is_consumed_per_call() {
        let cloud = InMemoryCloud::new();
        cloud
            .fail_put("tw-x", CloudError::throttled("slow down"), 1)
            .await;

        let spec = spec_named("tw-x");
        assert!(cloud.put_metric_alarm(&spec).await.is_err());
        assert!(cloud.put_metric_alarm(&spec).await.is_ok());
        assert_eq!(cloud.alarm_names().await, vec!["tw-x".to_string()]);
    }

    #[tokio::test]
    async fn test_put_limits_name_length_in_characters() {
        let cloud = InMemoryCloud::new();

        let accented = format!("tw-é-{}", "x".repeat(250));
        assert_eq!(accented.chars().count(), MAX_ALARM_NAME_LEN);
        assert!(accented.len() > MAX_ALARM_NAME_LEN);
        assert!(cloud.put_metric_alarm(&spec_named(&accented)).await.is_ok());

        let too_long = format!("{}x", accented);
        let err = cloud.put_metric_alarm(&spec_named(&too_long)).await.unwrap_err();
        assert!(matches!(err, CloudError::Api { ref code, .. } if code == "ValidationError"));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_names() {
        let cloud = InMemoryCloud::new();
        cloud.insert_alarm(ExistingAlarm::named("tw-a")).await;

        let failures = cloud
            .delete_alarms(&["tw-a".to_string(), "tw-missing".to_string()])
            .await
            .unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "tw-missing");
        assert!(cloud.alarm_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_state() {
        let state = CloudState {
            resources: vec![lambda("a")],
            alarms: vec![ExistingAlarm::named("tw-a")],
        };
        let cloud = InMemoryCloud::from_state(state.clone());
        assert_eq!(cloud.snapshot().await, state);
    }
}
