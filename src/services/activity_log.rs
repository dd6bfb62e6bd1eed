use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ConnectionTrait};
use tracing::debug;

use crate::{
    entities::activity_log,
    errors::{LedgerStage, ServiceError, StageExt},
    models::DocumentType,
};

/// Audit trail of completed create/cancel operations.
///
/// Display only: nothing in the engines reads it back.
#[derive(Clone, Default)]
pub struct ActivityLog;

impl ActivityLog {
    pub fn new() -> Self {
        Self
    }

    /// Category written for an operation on a document type, e.g. `PurchaseReceipt.Cancel`.
    pub fn category(doc_type: DocumentType, operation: &str) -> String {
        format!("{doc_type}.{operation}")
    }

    pub async fn append<C>(
        &self,
        conn: &C,
        actor: &str,
        code: &str,
        category: &str,
    ) -> Result<activity_log::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        debug!(actor, code, category, "Appending activity");
        activity_log::ActiveModel {
            id: NotSet,
            actor: Set(actor.to_string()),
            code: Set(code.to_string()),
            category: Set(category.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(conn)
        .await
        .stage(LedgerStage::Activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_type_and_operation() {
        assert_eq!(
            ActivityLog::category(DocumentType::MaterialTransfer, "Create"),
            "MaterialTransfer.Create"
        );
    }
}
