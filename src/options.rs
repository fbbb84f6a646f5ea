/// Static option lists that drive client dropdowns
///
/// Values are taken from the model enums so a list can never offer a value
/// the stores would reject.
use crate::{
    features::{FeatureCategory, FeatureStatus},
    feedback::{FeedbackCategory, FeedbackPriority},
};
use serde::Serialize;

/// Labelled choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigOption {
    pub value: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u8>,
}

impl ConfigOption {
    fn new(value: &'static str, name: &'static str, description: &'static str, color: &'static str) -> Self {
        Self {
            value,
            name,
            description,
            color,
            order: None,
        }
    }

    fn ordered(mut self, order: u8) -> Self {
        self.order = Some(order);
        self
    }
}

/// Point on the 1-5 rating scale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingOption {
    pub value: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub emoji: &'static str,
    pub color: &'static str,
}

/// Every list in one payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Configurations {
    pub feedback_categories: Vec<ConfigOption>,
    pub priority_options: Vec<ConfigOption>,
    pub rating_options: Vec<RatingOption>,
    pub feature_categories: Vec<ConfigOption>,
    pub feature_statuses: Vec<ConfigOption>,
}

pub fn feedback_categories() -> Vec<ConfigOption> {
    vec![
        ConfigOption::new(
            FeedbackCategory::Bug.as_str(),
            "Bug Report",
            "Report issues, errors, or unexpected behavior",
            "#EF4444",
        ),
        ConfigOption::new(
            FeedbackCategory::Feature.as_str(),
            "Feature Request",
            "Suggest new features or enhancements",
            "#3B82F6",
        ),
        ConfigOption::new(
            FeedbackCategory::Ui.as_str(),
            "UI/UX Feedback",
            "Comments on user interface and experience",
            "#8B5CF6",
        ),
        ConfigOption::new(
            FeedbackCategory::Performance.as_str(),
            "Performance",
            "Speed, loading, or performance-related feedback",
            "#F59E0B",
        ),
        ConfigOption::new(
            FeedbackCategory::Other.as_str(),
            "Other",
            "General feedback that doesn't fit other categories",
            "#6B7280",
        ),
    ]
}

pub fn priority_options() -> Vec<ConfigOption> {
    vec![
        ConfigOption::new(
            FeedbackPriority::Low.as_str(),
            "Low",
            "Nice to have, not urgent",
            "#10B981",
        )
        .ordered(1),
        ConfigOption::new(
            FeedbackPriority::Medium.as_str(),
            "Medium",
            "Important but not critical",
            "#F59E0B",
        )
        .ordered(2),
        ConfigOption::new(
            FeedbackPriority::High.as_str(),
            "High",
            "Important and should be addressed soon",
            "#EF4444",
        )
        .ordered(3),
        ConfigOption::new(
            FeedbackPriority::Urgent.as_str(),
            "Urgent",
            "Critical issue requiring immediate attention",
            "#DC2626",
        )
        .ordered(4),
    ]
}

pub fn rating_options() -> Vec<RatingOption> {
    vec![
        RatingOption {
            value: 1,
            name: "Very Poor",
            description: "Extremely dissatisfied",
            emoji: "😞",
            color: "#DC2626",
        },
        RatingOption {
            value: 2,
            name: "Poor",
            description: "Dissatisfied",
            emoji: "😔",
            color: "#EF4444",
        },
        RatingOption {
            value: 3,
            name: "Okay",
            description: "Neutral/Average",
            emoji: "😐",
            color: "#F59E0B",
        },
        RatingOption {
            value: 4,
            name: "Good",
            description: "Satisfied",
            emoji: "😊",
            color: "#3B82F6",
        },
        RatingOption {
            value: 5,
            name: "Excellent",
            description: "Very satisfied",
            emoji: "😍",
            color: "#10B981",
        },
    ]
}

pub fn feature_categories() -> Vec<ConfigOption> {
    vec![
        ConfigOption::new(
            FeatureCategory::Feature.as_str(),
            "Feature",
            "New functionality or enhancements",
            "#3B82F6",
        ),
        ConfigOption::new(
            FeatureCategory::Story.as_str(),
            "User Story",
            "Work described from the user's point of view",
            "#8B5CF6",
        ),
        ConfigOption::new(
            FeatureCategory::Bug.as_str(),
            "Bug",
            "Defects to be fixed",
            "#EF4444",
        ),
        ConfigOption::new(
            FeatureCategory::Documentation.as_str(),
            "Documentation",
            "Guides, references, and other written material",
            "#059669",
        ),
    ]
}

pub fn feature_statuses() -> Vec<ConfigOption> {
    vec![
        ConfigOption::new(
            FeatureStatus::Planned.as_str(),
            "Planned",
            "Feature is planned for development",
            "#6B7280",
        ),
        ConfigOption::new(
            FeatureStatus::InDevelopment.as_str(),
            "In Development",
            "Currently being developed",
            "#F59E0B",
        ),
        ConfigOption::new(
            FeatureStatus::Testing.as_str(),
            "Testing",
            "Under testing and quality assurance",
            "#8B5CF6",
        ),
        ConfigOption::new(
            FeatureStatus::Completed.as_str(),
            "Completed",
            "Feature has been completed and deployed",
            "#10B981",
        ),
        ConfigOption::new(
            FeatureStatus::Cancelled.as_str(),
            "Cancelled",
            "Feature development has been cancelled",
            "#EF4444",
        ),
    ]
}

/// All lists composed in-process
pub fn all_configurations() -> Configurations {
    Configurations {
        feedback_categories: feedback_categories(),
        priority_options: priority_options(),
        rating_options: rating_options(),
        feature_categories: feature_categories(),
        feature_statuses: feature_statuses(),
    }
}
