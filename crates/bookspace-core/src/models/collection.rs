//! Entity collection names and the in-memory working set.

use serde::{Deserialize, Serialize};

use super::record::{ConfigRecord, EntityRecord};

/// The synced entity collections, in a fixed order.
///
/// Read/write/subscribe logic is generic over this list; adding a
/// collection means adding a variant here and a field to
/// [`WorkspaceData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Transactions,
    Clients,
    Providers,
    Employees,
    Leads,
    Invoices,
    Meetings,
}

impl CollectionKind {
    /// All synced collections.
    pub const ALL: [Self; 7] = [
        Self::Transactions,
        Self::Clients,
        Self::Providers,
        Self::Employees,
        Self::Leads,
        Self::Invoices,
        Self::Meetings,
    ];

    /// Remote collection name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::Clients => "clients",
            Self::Providers => "providers",
            Self::Employees => "employees",
            Self::Leads => "leads",
            Self::Invoices => "invoices",
            Self::Meetings => "meetings",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The in-memory authoritative copy of all entity collections plus the
/// config scalar.
///
/// Exclusively owned by the sync engine task; every other component works
/// on snapshots. Insertion order within a collection is not significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceData {
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

impl WorkspaceData {
    #[must_use]
    pub const fn collection(&self, kind: CollectionKind) -> &Vec<EntityRecord> {
        match kind {
            CollectionKind::Transactions => &self.transactions,
            CollectionKind::Clients => &self.clients,
            CollectionKind::Providers => &self.providers,
            CollectionKind::Employees => &self.employees,
            CollectionKind::Leads => &self.leads,
            CollectionKind::Invoices => &self.invoices,
            CollectionKind::Meetings => &self.meetings,
        }
    }

    pub fn collection_mut(&mut self, kind: CollectionKind) -> &mut Vec<EntityRecord> {
        match kind {
            CollectionKind::Transactions => &mut self.transactions,
            CollectionKind::Clients => &mut self.clients,
            CollectionKind::Providers => &mut self.providers,
            CollectionKind::Employees => &mut self.employees,
            CollectionKind::Leads => &mut self.leads,
            CollectionKind::Invoices => &mut self.invoices,
            CollectionKind::Meetings => &mut self.meetings,
        }
    }

    /// Whether every collection and the config scalar are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        CollectionKind::ALL
            .iter()
            .all(|kind| self.collection(*kind).is_empty())
            && self.config.is_empty()
    }

    /// Total record count across all collections.
    #[must_use]
    pub fn record_count(&self) -> usize {
        CollectionKind::ALL
            .iter()
            .map(|kind| self.collection(*kind).len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_accessors_cover_all_kinds() {
        let mut data = WorkspaceData::default();
        for kind in CollectionKind::ALL {
            data.collection_mut(kind)
                .push(serde_json::from_value(json!({ "id": kind.as_str() })).unwrap());
        }
        assert_eq!(data.record_count(), CollectionKind::ALL.len());
        assert_eq!(
            data.collection(CollectionKind::Leads)[0].doc_id().as_deref(),
            Some("leads")
        );
    }

    #[test]
    fn empty_workspace_reports_empty() {
        let mut data = WorkspaceData::default();
        assert!(data.is_empty());
        data.config.insert("empresa".to_string(), json!("Bookspace"));
        assert!(!data.is_empty());
    }
}
