use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed set of attachment kinds; an unknown value is rejected at
/// deserialization rather than silently ignored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Report,
    Image,
    Other,
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttachmentKind::Report => "report",
            AttachmentKind::Image => "image",
            AttachmentKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AttachmentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(AttachmentKind::Report),
            "image" => Ok(AttachmentKind::Image),
            "other" => Ok(AttachmentKind::Other),
            _ => Err(anyhow::anyhow!("Unknown attachment kind: {s}")),
        }
    }
}

/// File metadata only — the bytes live in external storage and have an
/// independent lifecycle from the consultation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub camp_id: Uuid,
    pub visit_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub kind: String,
    pub file_url: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAttachmentRequest {
    pub visit_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub kind: AttachmentKind,
    pub file_url: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
}
