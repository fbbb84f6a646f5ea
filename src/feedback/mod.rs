/// User feedback filed against features

mod manager;

pub use manager::FeedbackManager;

use crate::{
    account::User,
    error::{PulseError, PulseResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Display name stored in place of the author's for anonymous feedback
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Bug,
    Feature,
    Ui,
    Performance,
    #[default]
    Other,
}

impl FeedbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::Bug => "bug",
            FeedbackCategory::Feature => "feature",
            FeedbackCategory::Ui => "ui",
            FeedbackCategory::Performance => "performance",
            FeedbackCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "bug" => Ok(FeedbackCategory::Bug),
            "feature" => Ok(FeedbackCategory::Feature),
            "ui" => Ok(FeedbackCategory::Ui),
            "performance" => Ok(FeedbackCategory::Performance),
            "other" => Ok(FeedbackCategory::Other),
            _ => Err(PulseError::Validation(format!("Invalid feedback category: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl FeedbackPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackPriority::Low => "low",
            FeedbackPriority::Medium => "medium",
            FeedbackPriority::High => "high",
            FeedbackPriority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "low" => Ok(FeedbackPriority::Low),
            "medium" => Ok(FeedbackPriority::Medium),
            "high" => Ok(FeedbackPriority::High),
            "urgent" => Ok(FeedbackPriority::Urgent),
            _ => Err(PulseError::Validation(format!("Invalid feedback priority: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::Pending => "pending",
            FeedbackStatus::InProgress => "in_progress",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Closed => "closed",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "pending" => Ok(FeedbackStatus::Pending),
            "in_progress" => Ok(FeedbackStatus::InProgress),
            "resolved" => Ok(FeedbackStatus::Resolved),
            "closed" => Ok(FeedbackStatus::Closed),
            _ => Err(PulseError::Validation(format!("Invalid feedback status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub size: Option<i64>,
}

/// Feedback record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub feature_id: String,
    pub feature_name: String,
    pub title: String,
    pub description: String,
    pub category: FeedbackCategory,
    pub priority: FeedbackPriority,
    pub rating: i64,
    pub status: FeedbackStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_email: String,
    pub author_name: String,
    pub anonymous: bool,
    pub tags: Vec<String>,
    pub attachments: Vec<Attachment>,
    pub developer_notes: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feedback {
    /// Strip the author's identity from anonymous feedback unless the viewer
    /// wrote it or is a developer
    pub fn redact_for(mut self, viewer: Option<&User>) -> Self {
        let privileged =
            viewer.is_some_and(|user| user.id == self.author_id || user.role.is_developer());
        if self.anonymous && !privileged {
            self.author_id.clear();
            self.author_email.clear();
        }
        self
    }
}

/// Create feedback request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub feature_id: Option<String>,
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<FeedbackCategory>,
    pub priority: Option<FeedbackPriority>,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<i64>,
    #[serde(alias = "isAnonymous")]
    pub anonymous: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

/// Author-side edit; authorship, feature linkage and triage fields are not writable
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "must be 1 to 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<FeedbackCategory>,
    pub priority: Option<FeedbackPriority>,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

/// Triage update
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeedbackStatusRequest {
    pub status: Option<FeedbackStatus>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub developer_notes: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub estimated_hours: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub actual_hours: Option<f64>,
}

/// Sortable listing columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedbackSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Rating,
    Priority,
    Status,
}

impl FeedbackSortField {
    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "createdAt" => Ok(FeedbackSortField::CreatedAt),
            "updatedAt" => Ok(FeedbackSortField::UpdatedAt),
            "rating" => Ok(FeedbackSortField::Rating),
            "priority" => Ok(FeedbackSortField::Priority),
            "status" => Ok(FeedbackSortField::Status),
            _ => Err(PulseError::Validation(format!("Cannot sort feedback by {}", s))),
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            FeedbackSortField::CreatedAt => "created_at",
            FeedbackSortField::UpdatedAt => "updated_at",
            FeedbackSortField::Rating => "rating",
            FeedbackSortField::Priority => {
                "CASE priority WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END"
            }
            FeedbackSortField::Status => "status",
        }
    }
}

/// Query string of the feedback listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFeedbackQuery {
    pub category: Option<FeedbackCategory>,
    pub priority: Option<FeedbackPriority>,
    pub status: Option<FeedbackStatus>,
    pub user_id: Option<String>,
    pub feature_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub include_archived: Option<bool>,
}
