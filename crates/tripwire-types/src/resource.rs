//! Supported resource types
//!
//! Everything that differs between resource types (default namespace,
//! dimension name, how to read a resource name out of an ARN) lives in
//! [`RESOURCE_TYPE_TABLE`]. Code that needs per-type behaviour looks the
//! type up instead of branching on it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A cloud resource type that alarms can be generated for
///
/// Discriminants index into [`RESOURCE_TYPE_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    #[serde(rename = "lambda:function")]
    LambdaFunction = 0,
    #[serde(rename = "states:stateMachine")]
    StateMachine = 1,
    #[serde(rename = "apigateway:restapi")]
    RestApi = 2,
    #[serde(rename = "sns:topic")]
    SnsTopic = 3,
    #[serde(rename = "sqs:queue")]
    SqsQueue = 4,
    #[serde(rename = "events:rule")]
    EventRule = 5,
}

/// How the resource name is read from an ARN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// Everything after `arn:partition:service:region:account:type:`
    AfterResourceType,
    /// Everything after `arn:partition:service:region:account:`
    AfterAccount,
    /// Everything after the last `/` of the resource part
    AfterLastSlash,
    /// The identifier already is the name
    Verbatim,
}

/// Which identifier feeds the alarm dimension value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionSource {
    Name,
    Arn,
}

/// Static facts about one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTypeInfo {
    pub resource_type: ResourceType,
    /// Key used in configuration files
    pub key: &'static str,
    /// Short token embedded in alarm names
    pub token: &'static str,
    /// Metric namespace used when the configuration omits one
    pub namespace: &'static str,
    pub dimension_name: &'static str,
    pub name_source: NameSource,
    pub dimension_source: DimensionSource,
}

/// Per-type lookup table, ordered by [`ResourceType`] discriminant
pub static RESOURCE_TYPE_TABLE: [ResourceTypeInfo; 6] = [
    ResourceTypeInfo {
        resource_type: ResourceType::LambdaFunction,
        key: "lambda:function",
        token: "lambda",
        namespace: "AWS/Lambda",
        dimension_name: "FunctionName",
        name_source: NameSource::AfterResourceType,
        dimension_source: DimensionSource::Name,
    },
    ResourceTypeInfo {
        resource_type: ResourceType::StateMachine,
        key: "states:stateMachine",
        token: "sfn",
        namespace: "AWS/States",
        dimension_name: "StateMachineArn",
        name_source: NameSource::AfterResourceType,
        dimension_source: DimensionSource::Arn,
    },
    ResourceTypeInfo {
        resource_type: ResourceType::RestApi,
        key: "apigateway:restapi",
        token: "apigw",
        namespace: "AWS/ApiGateway",
        dimension_name: "ApiName",
        name_source: NameSource::Verbatim,
        dimension_source: DimensionSource::Name,
    },
    ResourceTypeInfo {
        resource_type: ResourceType::SnsTopic,
        key: "sns:topic",
        token: "sns",
        namespace: "AWS/SNS",
        dimension_name: "TopicName",
        name_source: NameSource::AfterAccount,
        dimension_source: DimensionSource::Name,
    },
    ResourceTypeInfo {
        resource_type: ResourceType::SqsQueue,
        key: "sqs:queue",
        token: "sqs",
        namespace: "AWS/SQS",
        dimension_name: "QueueName",
        name_source: NameSource::AfterAccount,
        dimension_source: DimensionSource::Name,
    },
    ResourceTypeInfo {
        resource_type: ResourceType::EventRule,
        key: "events:rule",
        token: "events",
        namespace: "AWS/Events",
        dimension_name: "RuleName",
        name_source: NameSource::AfterLastSlash,
        dimension_source: DimensionSource::Name,
    },
];

impl ResourceType {
    /// All supported types in table order
    pub const ALL: [ResourceType; 6] = [
        ResourceType::LambdaFunction,
        ResourceType::StateMachine,
        ResourceType::RestApi,
        ResourceType::SnsTopic,
        ResourceType::SqsQueue,
        ResourceType::EventRule,
    ];

    /// Look up the static facts for this type
    pub fn info(self) -> &'static ResourceTypeInfo {
        &RESOURCE_TYPE_TABLE[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.info().key
    }

    pub fn token(self) -> &'static str {
        self.info().token
    }

    pub fn default_namespace(self) -> &'static str {
        self.info().namespace
    }

    /// Derive the resource name from an ARN (or API name for verbatim types)
    ///
    /// Identifiers that do not look like an ARN are returned unchanged.
    pub fn resource_name_from_arn(self, arn: &str) -> String {
        let resource = match self.info().name_source {
            NameSource::Verbatim => return arn.to_string(),
            _ => match arn_resource_part(arn) {
                Some(resource) => resource,
                None => return arn.to_string(),
            },
        };

        let name = match self.info().name_source {
            NameSource::AfterAccount => Some(resource),
            NameSource::AfterResourceType => resource.split_once(':').map(|(_, name)| name),
            NameSource::AfterLastSlash => resource.rsplit_once('/').map(|(_, name)| name),
            NameSource::Verbatim => None,
        };

        name.filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| arn.to_string())
    }
}

/// The resource part of `arn:partition:service:region:account:resource`
fn arn_resource_part(arn: &str) -> Option<&str> {
    let mut parts = arn.splitn(6, ':');
    if parts.next()? != "arn" {
        return None;
    }
    // partition, service, region, account
    for _ in 0..4 {
        parts.next()?;
    }
    parts.next()
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RESOURCE_TYPE_TABLE
            .iter()
            .find(|info| info.key == s)
            .map(|info| info.resource_type)
            .ok_or_else(|| format!("unsupported resource type: {}", s))
    }
}

/// A resource as reported by the inventory API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,

    /// ARN, or the API name for types listed by name
    pub arn: String,

    /// Explicit name when the inventory reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: ResourceType, arn: impl Into<String>) -> Self {
        Self {
            resource_type,
            arn: arn.into(),
            name: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// A resource selected for alarming during one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetResource {
    pub arn: String,
    pub name: String,
    pub resource_type: ResourceType,
    pub tags: BTreeMap<String, String>,
}

impl TargetResource {
    /// Build a target from an inventory descriptor
    pub fn from_descriptor(descriptor: ResourceDescriptor) -> Self {
        let name = descriptor
            .name
            .clone()
            .unwrap_or_else(|| descriptor.resource_type.resource_name_from_arn(&descriptor.arn));

        Self {
            arn: descriptor.arn,
            name,
            resource_type: descriptor.resource_type,
            tags: descriptor.tags,
        }
    }

    /// Value of the single alarm dimension for this resource
    pub fn dimension_value(&self) -> &str {
        match self.resource_type.info().dimension_source {
            DimensionSource::Name => &self.name,
            DimensionSource::Arn => &self.arn,
        }
    }
}
