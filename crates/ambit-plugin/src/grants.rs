use ambit_core::{AmbitError, CoreRole, GrantKind, Result, TrustTier};
use serde::Serialize;
use std::collections::HashMap;

/// One plugin's classification as recorded at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
    pub tier: TrustTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_role: Option<CoreRole>,
    /// Requested grants and their approval, in request order.
    pub grants: Vec<(GrantKind, bool)>,
}

impl PluginRecord {
    pub fn is_approved(&self, kind: GrantKind) -> bool {
        self.grants.iter().any(|(k, ok)| *k == kind && *ok)
    }
}

/// The immutable grant table consulted on every capability-sensitive
/// operation. Shared read-only after boot.
#[derive(Debug, Default, Serialize)]
pub struct GrantTable {
    records: Vec<PluginRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl GrantTable {
    /// Approval for `(plugin, kind)`. Anything never recorded is denied.
    pub fn is_approved(&self, plugin: &str, kind: GrantKind) -> bool {
        self.record(plugin).is_some_and(|r| r.is_approved(kind))
    }

    pub fn tier(&self, plugin: &str) -> Option<TrustTier> {
        self.record(plugin).map(|r| r.tier)
    }

    pub fn record(&self, plugin: &str) -> Option<&PluginRecord> {
        self.index.get(plugin).map(|i| &self.records[*i])
    }

    /// Records in declaration order.
    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Write-once builder for [`GrantTable`].
#[derive(Debug, Default)]
pub struct GrantTableBuilder {
    table: GrantTable,
}

impl GrantTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_plugin(
        &mut self,
        name: &str,
        version: &str,
        tier: TrustTier,
        core_role: Option<CoreRole>,
    ) -> Result<()> {
        if self.table.index.contains_key(name) {
            return Err(AmbitError::DuplicatePlugin(name.to_string()));
        }
        self.table
            .index
            .insert(name.to_string(), self.table.records.len());
        self.table.records.push(PluginRecord {
            name: name.to_string(),
            version: version.to_string(),
            tier,
            core_role,
            grants: Vec::new(),
        });
        Ok(())
    }

    /// Record one approval decision. Each `(plugin, kind)` pair can be
    /// recorded once, and a CORE plugin can only hold approved grants.
    pub fn record(&mut self, plugin: &str, kind: GrantKind, approved: bool) -> Result<()> {
        let Some(&i) = self.table.index.get(plugin) else {
            return Err(AmbitError::InvalidPlugin {
                plugin: plugin.to_string(),
                reason: "grant recorded before the plugin was added".into(),
            });
        };
        let record = &mut self.table.records[i];
        if record.grants.iter().any(|(k, _)| *k == kind) {
            return Err(AmbitError::GrantAlreadyRecorded {
                plugin: plugin.to_string(),
                grant: kind,
            });
        }
        if record.tier == TrustTier::Core && !approved {
            return Err(AmbitError::InvalidPlugin {
                plugin: plugin.to_string(),
                reason: format!("core plugin cannot hold denied grant {kind}"),
            });
        }
        record.grants.push((kind, approved));
        Ok(())
    }

    pub fn finish(self) -> GrantTable {
        self.table
    }
}
