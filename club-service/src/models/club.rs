use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Club member as kept in the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Member {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            active: true,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Training group with its current roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingGroup {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub trainer_ids: Vec<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

impl TrainingGroup {
    pub fn has_member(&self, member_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == member_id)
    }
}

/// One scheduled training of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub group_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
}

impl TrainingSession {
    pub fn new(id: impl Into<String>, group_id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            group_id: group_id.into(),
            date,
            title: None,
            location: None,
            cancelled: false,
        }
    }
}
