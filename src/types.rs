use serde::Deserialize;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_master_token: bool,
    #[serde(default)]
    pub can_manage_buckets: bool,
    #[serde(default)]
    pub owner: Option<TokenOwner>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOwner {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub default_backend: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    pub stage: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub rows_count: Option<u64>,
    #[serde(default)]
    pub data_size_bytes: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(alias = "uuid")]
    pub id: serde_json::Value,
    pub event: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

/// Lifecycle state of an asynchronous storage job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Processing,
    Success,
    Error,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: serde_json::Value,
    pub status: JobStatus,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub results: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JobError>,
}

impl Job {
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
    #[serde(default)]
    pub exception_id: Option<String>,
}

/// Bucket stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    In,
    Out,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// Options for dropping buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DropOptions {
    /// Drop the bucket together with its tables.
    pub force: bool,
    /// Run as a storage job and wait for it to finish.
    pub is_async: bool,
}
