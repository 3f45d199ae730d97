use crate::entities::audit_logs;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    FileUpload,
    FileDownload,
    FileDelete,
    AccessDenied,
    ShareGrant,
    ShareRevoke,
    LinkIssue,
    LinkConsume,
    LinkSweep,
    RoleChange,
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone)]
pub struct AuditService {
    db: DatabaseConnection,
}

impl AuditService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Emits the event on the `audit` tracing target and persists it in the
    /// background. Persistence failures never fail the audited operation.
    pub fn log(
        &self,
        event_type: AuditEventType,
        user_id: Option<&str>,
        resource_id: Option<&str>,
        action: &str,
        status: &str,
        details: Option<Value>,
    ) {
        let event_type_str = event_type.to_string();
        let user_id = user_id.map(str::to_string);
        let resource_id = resource_id.map(str::to_string);

        info!(
            target: "audit",
            event_type = %event_type_str,
            user_id = ?user_id,
            resource_id = ?resource_id,
            action = %action,
            status = %status,
            "Audit Event Occurred"
        );

        let log = audit_logs::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            timestamp: Set(chrono::Utc::now()),
            event_type: Set(event_type_str),
            user_id: Set(user_id),
            resource_id: Set(resource_id),
            action: Set(action.to_string()),
            status: Set(status.to_string()),
            details: Set(details.map(|v| v.to_string())),
        };
        let db = self.db.clone();

        tokio::spawn(async move {
            if let Err(e) = log.insert(&db).await {
                error!("Failed to persist audit log: {}", e);
            }
        });
    }
}
