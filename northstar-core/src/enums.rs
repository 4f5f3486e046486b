//! Enum types for Northstar entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Tier of an objective in the OKR tree.
/// The tree is a forest of at most three levels; `parent_level` encodes the
/// mandatory "exactly one tier above" relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectiveLevel {
    Company,
    Department,
    Individual,
}

impl ObjectiveLevel {
    /// The level a parent objective must have, `None` for roots.
    pub fn parent_level(&self) -> Option<ObjectiveLevel> {
        match self {
            ObjectiveLevel::Company => None,
            ObjectiveLevel::Department => Some(ObjectiveLevel::Company),
            ObjectiveLevel::Individual => Some(ObjectiveLevel::Department),
        }
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ObjectiveLevel::Company => "company",
            ObjectiveLevel::Department => "department",
            ObjectiveLevel::Individual => "individual",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_lowercase().as_str() {
            "company" => Ok(ObjectiveLevel::Company),
            "department" => Ok(ObjectiveLevel::Department),
            "individual" => Ok(ObjectiveLevel::Individual),
            _ => Err(EnumParseError {
                enum_name: "ObjectiveLevel",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ObjectiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ObjectiveLevel {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Derived health of an objective or KPI.
///
/// `OnTrack`/`AtRisk`/`Behind` are pure functions of progress (see
/// [`crate::progress::status_for_progress`]). `Archived` is an explicit
/// override applied only to objectives; KPIs never take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    OnTrack,
    AtRisk,
    Behind,
    Archived,
}

impl ProgressStatus {
    /// Whether this status is the archival override.
    pub fn is_archived(&self) -> bool {
        matches!(self, ProgressStatus::Archived)
    }

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProgressStatus::OnTrack => "on-track",
            ProgressStatus::AtRisk => "at-risk",
            ProgressStatus::Behind => "behind",
            ProgressStatus::Archived => "archived",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_lowercase().as_str() {
            "on-track" => Ok(ProgressStatus::OnTrack),
            "at-risk" => Ok(ProgressStatus::AtRisk),
            "behind" => Ok(ProgressStatus::Behind),
            "archived" => Ok(ProgressStatus::Archived),
            _ => Err(EnumParseError {
                enum_name: "ProgressStatus",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Scheduling quarter metadata. Not used in aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quarter::Q1 => write!(f, "Q1"),
            Quarter::Q2 => write!(f, "Q2"),
            Quarter::Q3 => write!(f, "Q3"),
            Quarter::Q4 => write!(f, "Q4"),
        }
    }
}

/// Entity type discriminator for errors and write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Objective,
    Kpi,
}

// ============================================================================
// NOTIFICATION ENUMS
// ============================================================================

/// Category of a notification record handed to the notification collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationType {
    /// An objective crossed a status threshold during re-aggregation.
    StatusChanged,
    /// A user was added as a contributor to an objective.
    Assignment,
    /// An appraisal review was submitted.
    AppraisalReview,
}

/// Delivery priority of a notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} value: {}", self.enum_name, self.value)
    }
}

impl std::error::Error for EnumParseError {}
