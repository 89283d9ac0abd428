use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::LifecycleError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Terminal for the current approval cycle. A rejected document may
    /// still be edited and resubmitted, re-entering `pending`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    pub fn allows_edit(&self) -> bool {
        matches!(self, Self::Draft | Self::Rejected)
    }

    pub fn allows_attachments(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed catalog of document kinds the portal accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    AttendanceReport,
    ApprovalRoute,
    DeviceApplication,
    CareerReview,
    SelfAssessment,
    ContractInfo,
    ExtensionRegistration,
    PcLedger,
    CareerInfo,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 9] = [
        Self::AttendanceReport,
        Self::ApprovalRoute,
        Self::DeviceApplication,
        Self::CareerReview,
        Self::SelfAssessment,
        Self::ContractInfo,
        Self::ExtensionRegistration,
        Self::PcLedger,
        Self::CareerInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttendanceReport => "attendance_report",
            Self::ApprovalRoute => "approval_route",
            Self::DeviceApplication => "device_application",
            Self::CareerReview => "career_review",
            Self::SelfAssessment => "self_assessment",
            Self::ContractInfo => "contract_info",
            Self::ExtensionRegistration => "extension_registration",
            Self::PcLedger => "pc_ledger",
            Self::CareerInfo => "career_info",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == value)
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = LifecycleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            LifecycleError::Validation(format!("unknown document type `{value}`"))
        })
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub created_by: i64,
    pub status: DocumentStatus,
    pub approved_by: Option<i64>,
    pub rejected_by: Option<i64>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub attachment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self.status, next),
            (DocumentStatus::Draft, DocumentStatus::Pending)
                | (DocumentStatus::Rejected, DocumentStatus::Pending)
                | (DocumentStatus::Pending, DocumentStatus::Approved)
                | (DocumentStatus::Pending, DocumentStatus::Rejected)
        )
    }

    pub fn transition_to(&mut self, next: DocumentStatus) -> Result<(), LifecycleError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(LifecycleError::Conflict {
            id: self.id.0.clone(),
            detail: format!("cannot move from `{}` to `{next}`", self.status),
        })
    }

    /// Exactly one of {approved_by, rejected_by} is set iff the status is
    /// approved/rejected respectively; neither is set while draft or pending.
    pub fn decision_marks_consistent(&self) -> bool {
        match self.status {
            DocumentStatus::Draft | DocumentStatus::Pending => {
                self.approved_by.is_none() && self.rejected_by.is_none()
            }
            DocumentStatus::Approved => {
                self.approved_by.is_some() && self.rejected_by.is_none()
            }
            DocumentStatus::Rejected => {
                self.rejected_by.is_some() && self.approved_by.is_none()
            }
        }
    }
}
