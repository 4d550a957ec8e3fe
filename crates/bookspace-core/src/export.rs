//! JSON backup of the whole working set, shared by all clients.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ConfigRecord, EntityRecord, WorkspaceData};
use crate::util::now_iso8601;

/// Backup schema version stamped into every export.
pub const BACKUP_VERSION: &str = "1.0";

/// Self-describing backup file: every collection flattened next to the
/// config scalar. Missing arrays decode as empty so older or trimmed
/// backups still import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub transactions: Vec<EntityRecord>,
    #[serde(default)]
    pub clients: Vec<EntityRecord>,
    #[serde(default)]
    pub providers: Vec<EntityRecord>,
    #[serde(default)]
    pub employees: Vec<EntityRecord>,
    #[serde(default)]
    pub leads: Vec<EntityRecord>,
    #[serde(default)]
    pub invoices: Vec<EntityRecord>,
    #[serde(default)]
    pub meetings: Vec<EntityRecord>,
    #[serde(default)]
    pub config: ConfigRecord,
}

impl BackupDocument {
    /// Snapshot the working set with a fresh export stamp.
    #[must_use]
    pub fn from_workspace(data: &WorkspaceData) -> Self {
        Self {
            exported_at: now_iso8601(),
            version: BACKUP_VERSION.to_string(),
            transactions: data.transactions.clone(),
            clients: data.clients.clone(),
            providers: data.providers.clone(),
            employees: data.employees.clone(),
            leads: data.leads.clone(),
            invoices: data.invoices.clone(),
            meetings: data.meetings.clone(),
            config: data.config.clone(),
        }
    }

    /// Unpack into a working set, dropping the export metadata.
    #[must_use]
    pub fn into_workspace(self) -> WorkspaceData {
        WorkspaceData {
            transactions: self.transactions,
            clients: self.clients,
            providers: self.providers,
            employees: self.employees,
            leads: self.leads,
            invoices: self.invoices,
            meetings: self.meetings,
            config: self.config,
        }
    }
}

/// Render the working set as a pretty-printed backup document.
pub fn render_backup(data: &WorkspaceData) -> Result<String> {
    Ok(serde_json::to_string_pretty(&BackupDocument::from_workspace(data))?)
}

/// Parse a backup document back into a working set. Anything that is
/// not a JSON object is rejected.
pub fn parse_backup(raw: &str) -> Result<WorkspaceData> {
    let document: BackupDocument = serde_json::from_str(raw)?;
    Ok(document.into_workspace())
}

/// Deterministic date-stamped default file name for backup flows.
#[must_use]
pub fn suggested_backup_file_name(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || format!("bookspace-backup-{timestamp_ms}.json"),
        |datetime| format!("bookspace-backup-{}.json", datetime.format("%Y-%m-%d")),
    )
}
