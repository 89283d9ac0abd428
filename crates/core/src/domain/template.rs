use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reusable form definition for one document type. Templates are plain
/// configuration records with a soft-delete flag; they do not participate
/// in the approval lifecycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub id: TemplateId,
    pub name: String,
    pub template_type: String,
    pub template_data: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
