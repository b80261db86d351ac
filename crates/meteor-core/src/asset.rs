//! The metadata asset model.
//!
//! An [`Asset`] is the payload moving through a pipeline: one table, topic,
//! dashboard, bucket, user, and so on, together with its ownership, labels,
//! free-form attributes, and lineage. The variant-specific payload lives in
//! [`AssetData`]; the asset's `type` on the wire is the serde tag of that
//! enum, so the type always matches the payload by construction.
//!
//! # Wire shape
//!
//! ```yaml
//! urn: postgres::db.company.com/warehouse/orders
//! name: orders
//! service: postgres
//! type: table
//! data:
//!   columns:
//!     - name: id
//!       data_type: bigint
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Asset Type
// =============================================================================

/// The closed set of asset types the runtime routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Table,
    Topic,
    Dashboard,
    Bucket,
    Group,
    Job,
    User,
    Model,
    FeatureTable,
    Application,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Table => "table",
            Self::Topic => "topic",
            Self::Dashboard => "dashboard",
            Self::Bucket => "bucket",
            Self::Group => "group",
            Self::Job => "job",
            Self::User => "user",
            Self::Model => "model",
            Self::FeatureTable => "feature_table",
            Self::Application => "application",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Facets
// =============================================================================

/// One entry in an asset's ordered ownership list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    pub urn: String,
    pub name: String,
    pub role: String,
    pub email: String,
}

/// A reference to another asset in a lineage edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRef {
    pub urn: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub service: String,
}

/// Upstream and downstream edges attached to an asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lineage {
    pub upstreams: Vec<LineageRef>,
    pub downstreams: Vec<LineageRef>,
}

impl Lineage {
    pub fn is_empty(&self) -> bool {
        self.upstreams.is_empty() && self.downstreams.is_empty()
    }
}

// =============================================================================
// Variant Payloads
// =============================================================================

/// A column of a table asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub is_nullable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableData {
    pub columns: Vec<Column>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicData {
    pub partitions: u64,
}

/// A chart on a dashboard asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub urn: String,
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardData {
    pub charts: Vec<Chart>,
}

/// An object stored in a bucket asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blob {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketData {
    pub location: String,
    pub storage_type: String,
    pub blobs: Vec<Blob>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupData {
    /// URNs of the group's members.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobData {
    /// Cron-style schedule expression.
    pub schedule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub email: String,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelData {
    pub version: String,
    pub algorithm: String,
}

/// A feature served by a feature table asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureTableData {
    pub entities: Vec<String>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationData {
    pub version: String,
}

// =============================================================================
// Asset Data
// =============================================================================

/// The variant-specific payload of an asset, tagged with the asset type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AssetData {
    Table(TableData),
    Topic(TopicData),
    Dashboard(DashboardData),
    Bucket(BucketData),
    Group(GroupData),
    Job(JobData),
    User(UserData),
    Model(ModelData),
    FeatureTable(FeatureTableData),
    Application(ApplicationData),
}

impl AssetData {
    /// The asset type implied by the payload variant.
    pub fn asset_type(&self) -> AssetType {
        match self {
            Self::Table(_) => AssetType::Table,
            Self::Topic(_) => AssetType::Topic,
            Self::Dashboard(_) => AssetType::Dashboard,
            Self::Bucket(_) => AssetType::Bucket,
            Self::Group(_) => AssetType::Group,
            Self::Job(_) => AssetType::Job,
            Self::User(_) => AssetType::User,
            Self::Model(_) => AssetType::Model,
            Self::FeatureTable(_) => AssetType::FeatureTable,
            Self::Application(_) => AssetType::Application,
        }
    }
}

// =============================================================================
// Asset
// =============================================================================

/// One typed metadata record.
///
/// The `urn` must be non-empty and is expected to be unique within a run;
/// extractors are responsible for uniqueness, the runtime rejects empty
/// URNs at the emit boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable identifier, e.g. `postgres::db.company.com/warehouse/orders`.
    pub urn: String,
    pub name: String,
    /// Identifier of the origin system, e.g. `postgres`, `kafka`.
    pub service: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<Owner>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Lineage::is_empty")]
    pub lineage: Lineage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub data: AssetData,
}

impl Asset {
    /// Creates an asset with the identifying fields and payload; facets
    /// start empty and are filled in with the `with_*` builders.
    pub fn new(
        urn: impl Into<String>,
        name: impl Into<String>,
        service: impl Into<String>,
        data: AssetData,
    ) -> Self {
        Self {
            urn: urn.into(),
            name: name.into(),
            service: service.into(),
            description: String::new(),
            owners: Vec::new(),
            labels: BTreeMap::new(),
            attributes: BTreeMap::new(),
            lineage: Lineage::default(),
            create_time: None,
            update_time: None,
            delete_time: None,
            data,
        }
    }

    /// The asset type, always consistent with the payload variant.
    pub fn asset_type(&self) -> AssetType {
        self.data.asset_type()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owners.push(owner);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_lineage(mut self, lineage: Lineage) -> Self {
        self.lineage = lineage;
        self
    }

    pub fn with_update_time(mut self, at: DateTime<Utc>) -> Self {
        self.update_time = Some(at);
        self
    }
}

// =============================================================================
// URN builders
// =============================================================================

/// `{service}::{host}/{database}/{name}`
pub fn table_urn(service: &str, host: &str, database: &str, name: &str) -> String {
    format!("{service}::{host}/{database}/{name}")
}

/// `{service}::{host}/{id}`
pub fn dashboard_urn(service: &str, host: &str, id: &str) -> String {
    format!("{service}::{host}/{id}")
}

/// `{service}::{host}/{id}`
pub fn job_urn(service: &str, host: &str, id: &str) -> String {
    format!("{service}::{host}/{id}")
}

/// `{service}::{host}/{name}`
pub fn bucket_urn(service: &str, host: &str, name: &str) -> String {
    format!("{service}::{host}/{name}")
}

/// `{service}::{host}/{name}`
pub fn topic_urn(service: &str, host: &str, name: &str) -> String {
    format!("{service}::{host}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_matches_data_variant() {
        let asset = Asset::new(
            "kafka::broker:9092/orders",
            "orders",
            "kafka",
            AssetData::Topic(TopicData { partitions: 12 }),
        );
        assert_eq!(asset.asset_type(), AssetType::Topic);
    }

    #[test]
    fn serializes_with_type_tag_and_data_blob() {
        let asset = Asset::new(
            table_urn("postgres", "db.local", "warehouse", "orders"),
            "orders",
            "postgres",
            AssetData::Table(TableData {
                columns: vec![Column {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    ..Column::default()
                }],
                row_count: None,
            }),
        )
        .with_label("env", "prod");

        let json = serde_json::to_value(&asset).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["urn"], "postgres::db.local/warehouse/orders");
        assert_eq!(json["data"]["columns"][0]["name"], "id");
        assert_eq!(json["labels"]["env"], "prod");
        // Empty facets stay off the wire.
        assert!(json.get("owners").is_none());
        assert!(json.get("lineage").is_none());
    }

    #[test]
    fn deserializes_yaml_document() {
        let yaml = r#"
urn: csv::/data/users.csv
name: users
service: csv
type: table
data:
  columns:
    - name: email
      data_type: string
"#;
        let asset: Asset = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(asset.asset_type(), AssetType::Table);
        match &asset.data {
            AssetData::Table(table) => assert_eq!(table.columns[0].name, "email"),
            other => panic!("expected table data, got {other:?}"),
        }
    }
}
