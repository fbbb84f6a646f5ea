/// Feature catalog
///
/// Features carry an embedded, ordered list of references to the feedback
/// filed against them. The list and the `userRequests` counter are only ever
/// written together with the feedback row itself (see `crate::feedback`).
/// Feedback count and average rating are derived on every read.

mod manager;

pub use manager::{compute_stats, FeatureManager};
pub(crate) use manager::{attach_feedback, detach_feedback};

use crate::error::{PulseError, PulseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Upper bound on page size
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    Feature,
    Story,
    Bug,
    Documentation,
}

impl FeatureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureCategory::Feature => "feature",
            FeatureCategory::Story => "story",
            FeatureCategory::Bug => "bug",
            FeatureCategory::Documentation => "documentation",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "feature" => Ok(FeatureCategory::Feature),
            "story" => Ok(FeatureCategory::Story),
            "bug" => Ok(FeatureCategory::Bug),
            "documentation" => Ok(FeatureCategory::Documentation),
            _ => Err(PulseError::Validation(format!("Invalid feature category: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    #[default]
    Planned,
    InDevelopment,
    Testing,
    Completed,
    Cancelled,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Planned => "planned",
            FeatureStatus::InDevelopment => "in_development",
            FeatureStatus::Testing => "testing",
            FeatureStatus::Completed => "completed",
            FeatureStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "planned" => Ok(FeatureStatus::Planned),
            "in_development" => Ok(FeatureStatus::InDevelopment),
            "testing" => Ok(FeatureStatus::Testing),
            "completed" => Ok(FeatureStatus::Completed),
            "cancelled" => Ok(FeatureStatus::Cancelled),
            _ => Err(PulseError::Validation(format!("Invalid feature status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeaturePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FeaturePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeaturePriority::Low => "low",
            FeaturePriority::Medium => "medium",
            FeaturePriority::High => "high",
            FeaturePriority::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "low" => Ok(FeaturePriority::Low),
            "medium" => Ok(FeaturePriority::Medium),
            "high" => Ok(FeaturePriority::High),
            "critical" => Ok(FeaturePriority::Critical),
            _ => Err(PulseError::Validation(format!("Invalid feature priority: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    Blocks,
    #[default]
    DependsOn,
}

/// Edge to another feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub feature_id: String,
    #[serde(default, rename = "type", alias = "relation")]
    pub relation: DependencyRelation,
}

/// Back-reference from a feature to one of its feedback entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRef {
    pub feedback_id: String,
    #[serde(default)]
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMetrics {
    pub user_requests: i64,
    pub votes: i64,
    pub complexity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_plan_url: Option<String>,
}

/// Feature record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: FeatureCategory,
    pub status: FeatureStatus,
    pub priority: FeaturePriority,
    pub version: Option<String>,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub target_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub feedback_refs: Vec<FeedbackRef>,
    pub metrics: FeatureMetrics,
    pub documentation: Option<Documentation>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived feedback aggregate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub feedback_count: i64,
    pub avg_rating: f64,
}

/// Feature as returned by read endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureWithStats {
    #[serde(flatten)]
    pub feature: Feature,
    #[serde(flatten)]
    pub stats: FeedbackStats,
}

/// Adjustable metric fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MetricsInput {
    #[validate(range(min = 0, message = "must not be negative"))]
    pub votes: Option<i64>,
    #[validate(range(min = 1, max = 10, message = "must be between 1 and 10"))]
    pub complexity: Option<i64>,
}

/// Create feature request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeatureRequest {
    #[validate(length(max = 200, message = "must be at most 200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<FeatureCategory>,
    pub status: Option<FeatureStatus>,
    pub priority: Option<FeaturePriority>,
    pub version: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub estimated_hours: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub target_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub assigned_to: Option<String>,
    pub dependencies: Option<Vec<Dependency>>,
    pub documentation: Option<Documentation>,
    #[validate(nested)]
    pub metrics: Option<MetricsInput>,
}

/// Partial feature update; back-references and request counters are not writable
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeatureRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "must be 1 to 2000 characters"))]
    pub description: Option<String>,
    pub category: Option<FeatureCategory>,
    pub status: Option<FeatureStatus>,
    pub priority: Option<FeaturePriority>,
    pub version: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub estimated_hours: Option<f64>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub actual_hours: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub target_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<String>,
    pub tags: Option<Vec<String>>,
    pub dependencies: Option<Vec<Dependency>>,
    pub documentation: Option<Documentation>,
    #[validate(nested)]
    pub metrics: Option<MetricsInput>,
}

/// Sortable listing columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeatureSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Priority,
    Status,
    TargetDate,
}

impl FeatureSortField {
    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s {
            "createdAt" => Ok(FeatureSortField::CreatedAt),
            "updatedAt" => Ok(FeatureSortField::UpdatedAt),
            "name" => Ok(FeatureSortField::Name),
            "priority" => Ok(FeatureSortField::Priority),
            "status" => Ok(FeatureSortField::Status),
            "targetDate" => Ok(FeatureSortField::TargetDate),
            _ => Err(PulseError::Validation(format!("Cannot sort features by {}", s))),
        }
    }

    /// SQL ordering expression; priority sorts by rank rather than by name
    pub(crate) fn column(&self) -> &'static str {
        match self {
            FeatureSortField::CreatedAt => "created_at",
            FeatureSortField::UpdatedAt => "updated_at",
            FeatureSortField::Name => "name",
            FeatureSortField::Priority => {
                "CASE priority WHEN 'critical' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END"
            }
            FeatureSortField::Status => "status",
            FeatureSortField::TargetDate => "target_date",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_str(s: &str) -> PulseResult<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(PulseError::Validation(format!("Invalid sort order: {}", s))),
        }
    }

    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Query string of the feature listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFeaturesQuery {
    pub category: Option<FeatureCategory>,
    pub status: Option<FeatureStatus>,
    pub priority: Option<FeaturePriority>,
    pub assigned_to: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub include_archived: Option<bool>,
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// 1-indexed page, page size capped at `MAX_PAGE_SIZE`
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

/// Pagination block of a listing response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub pages: i64,
}

impl Pagination {
    pub fn new(total: i64, request: PageRequest) -> Self {
        let limit = request.limit as i64;
        Self {
            total,
            page: request.page,
            limit: request.limit,
            pages: (total + limit - 1) / limit,
        }
    }
}
