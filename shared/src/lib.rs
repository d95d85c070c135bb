use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The business documents watched by the SLA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    LeaveRequest,
    PurchaseRequest,
    ServiceTicket,
    DocumentRequest,
    ExpenseClaim,
    Complaint,
    MaintenanceRequest,
}

impl DocumentKind {
    /// Evaluation order used by the aggregate checks.
    pub const ALL: [DocumentKind; 7] = [
        DocumentKind::LeaveRequest,
        DocumentKind::PurchaseRequest,
        DocumentKind::ServiceTicket,
        DocumentKind::DocumentRequest,
        DocumentKind::ExpenseClaim,
        DocumentKind::Complaint,
        DocumentKind::MaintenanceRequest,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            DocumentKind::LeaveRequest => "leave_requests",
            DocumentKind::PurchaseRequest => "purchase_requests",
            DocumentKind::ServiceTicket => "service_tickets",
            DocumentKind::DocumentRequest => "document_requests",
            DocumentKind::ExpenseClaim => "expense_claims",
            DocumentKind::Complaint => "complaints",
            DocumentKind::MaintenanceRequest => "maintenance_requests",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentKind::LeaveRequest => "Leave request",
            DocumentKind::PurchaseRequest => "Purchase request",
            DocumentKind::ServiceTicket => "Service ticket",
            DocumentKind::DocumentRequest => "Document request",
            DocumentKind::ExpenseClaim => "Expense claim",
            DocumentKind::Complaint => "Complaint",
            DocumentKind::MaintenanceRequest => "Maintenance request",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String, // sla_breach, sla_warning
    pub reference_table: Option<String>,
    pub reference_id: Option<Uuid>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert form of [`Notification`]; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: Uuid,
    pub title: String,
    pub body: String,
    pub category: String,
    pub reference_table: Option<String>,
    pub reference_id: Option<Uuid>,
}

/// Envelope pushed to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub event_type: String,
    pub role: Option<String>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
