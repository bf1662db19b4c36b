//! Role checklist registry.
//!
//! Built once at startup, either from the built-in table or from a TOML file,
//! and handed to whatever needs it. Every registered role must translate to a
//! backend identifier, so a loaded registry can never produce an outbound
//! request with an unmapped role.

mod builtin;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builtin::default_role_workflow;

use crate::domain::role::SignatureRole;
use crate::errors::ValidationFailure;
use crate::normalize::canonical_key;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_approve: bool,
    pub can_reject: bool,
    pub can_view: bool,
    pub can_generate: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChecklist {
    pub role: String,
    pub title: String,
    pub description: String,
    pub capabilities: Capabilities,
    pub checklist: Vec<String>,
    pub approve_text: String,
    pub reject_text: String,
}

impl RoleChecklist {
    pub fn signature_role(&self) -> Option<SignatureRole> {
        SignatureRole::from_label(&self.role).ok()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("role configuration not found for `{requested}` (valid roles: {})", .valid_roles.join(", "))]
pub struct RoleLookupError {
    pub requested: String,
    pub valid_roles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("could not read role registry `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse role registry: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("role registry is empty")]
    Empty,
    #[error("role `{0}` is declared more than once")]
    DuplicateRole(String),
    #[error("role `{0}` has no backend identifier")]
    UnmappedRole(String),
}

#[derive(Clone, Debug)]
pub struct RoleRegistry {
    entries: BTreeMap<String, RoleChecklist>,
    order: Vec<String>,
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    roles: Vec<RoleChecklist>,
}

impl RoleRegistry {
    pub fn builtin() -> Self {
        match Self::from_entries(builtin::builtin_checklists()) {
            Ok(registry) => registry,
            Err(error) => {
                debug_assert!(false, "built-in role table is invalid: {error}");
                Self { entries: BTreeMap::new(), order: Vec::new() }
            }
        }
    }

    pub fn from_entries(entries: Vec<RoleChecklist>) -> Result<Self, RegistryError> {
        if entries.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut registry = Self { entries: BTreeMap::new(), order: Vec::with_capacity(entries.len()) };
        for entry in entries {
            if entry.signature_role().is_none() {
                return Err(RegistryError::UnmappedRole(entry.role));
            }
            let key = canonical_key(&entry.role);
            if registry.entries.contains_key(&key) {
                return Err(RegistryError::DuplicateRole(entry.role));
            }
            registry.order.push(entry.role.clone());
            registry.entries.insert(key, entry);
        }

        Ok(registry)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(raw)?;
        Self::from_entries(file.roles)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| RegistryError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Looks up a role by display label or backend identifier.
    pub fn lookup(&self, role: &str) -> Result<&RoleChecklist, RoleLookupError> {
        let direct = self.entries.get(&canonical_key(role));
        let translated = || {
            let resolved = SignatureRole::from_label(role).ok()?;
            self.entries.get(&canonical_key(resolved.display_name()))
        };

        direct.or_else(translated).ok_or_else(|| RoleLookupError {
            requested: role.to_string(),
            valid_roles: self.order.clone(),
        })
    }

    pub fn roles(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleChecklist> {
        self.order.iter().filter_map(|role| self.entries.get(&canonical_key(role)))
    }
}

/// Which checklist items a signer has confirmed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChecklistProgress {
    total: usize,
    checked: BTreeSet<usize>,
}

impl ChecklistProgress {
    pub fn new(checklist: &RoleChecklist) -> Self {
        Self { total: checklist.checklist.len(), checked: BTreeSet::new() }
    }

    /// Marks an item as confirmed. Indices past the end are ignored.
    pub fn check(&mut self, index: usize) -> bool {
        index < self.total && self.checked.insert(index)
    }

    /// Like `check`, but an index past the end is an error. The error
    /// reports the item by its one-based number.
    pub fn confirm(&mut self, index: usize) -> Result<(), ValidationFailure> {
        if index >= self.total {
            return Err(ValidationFailure::UnknownChecklistItem { item: index + 1, total: self.total });
        }
        self.checked.insert(index);
        Ok(())
    }

    pub fn uncheck(&mut self, index: usize) -> bool {
        self.checked.remove(&index)
    }

    pub fn check_all(&mut self) {
        self.checked = (0..self.total).collect();
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.checked.len() == self.total
    }

    pub fn ensure_complete(&self) -> Result<(), ValidationFailure> {
        if self.is_complete() {
            return Ok(());
        }
        Err(ValidationFailure::IncompleteChecklist {
            checked: self.checked.len(),
            total: self.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::role::SignatureRole;
    use crate::errors::ValidationFailure;

    use super::{default_role_workflow, ChecklistProgress, RegistryError, RoleRegistry};

    #[test]
    fn builtin_registry_covers_every_role() {
        let registry = RoleRegistry::builtin();
        for role in SignatureRole::ALL {
            let entry = registry.lookup(role.display_name()).expect("built-in role");
            assert!(!entry.checklist.is_empty());
        }
    }

    #[test]
    fn lookup_accepts_backend_identifier() {
        let registry = RoleRegistry::builtin();
        let entry = registry.lookup("GERENCIA_FINANZAS").expect("backend id should resolve");
        assert_eq!(entry.role, "Gerencia Finanzas");
    }

    #[test]
    fn missing_role_reports_not_found_and_enumerates_valid_roles() {
        let registry = RoleRegistry::builtin();
        let error = registry.lookup("Auditoria").expect_err("unknown role");

        assert_eq!(error.requested, "Auditoria");
        assert_eq!(error.valid_roles.len(), 5);
        let message = error.to_string();
        assert!(message.starts_with("role configuration not found for `Auditoria`"));
        assert!(message.contains("Jefatura Directa"));
        assert!(message.contains("RRHH"));
    }

    #[test]
    fn toml_registry_rejects_roles_without_backend_identifier() {
        let raw = r#"
[[roles]]
role = "Seguridad"
title = "Seguridad"
description = "Control de acceso"
checklist = ["Carnet devuelto"]
approve_text = "Aprobar"
reject_text = "Rechazar"
capabilities = { can_approve = true, can_reject = true, can_view = true, can_generate = false }
"#;
        let error = RoleRegistry::from_toml_str(raw).expect_err("unmapped role should fail");
        assert!(matches!(error, RegistryError::UnmappedRole(ref role) if role == "Seguridad"));
    }

    #[test]
    fn toml_registry_replaces_builtin_table() {
        let raw = r#"
[[roles]]
role = "TI"
title = "Tecnología"
description = "Devolución de equipos"
checklist = ["Portátil devuelto", "Accesos revocados"]
approve_text = "Firmar"
reject_text = "Rechazar"
capabilities = { can_approve = true, can_reject = false, can_view = true, can_generate = false }
"#;
        let registry = RoleRegistry::from_toml_str(raw).expect("registry should parse");
        assert_eq!(registry.roles(), ["TI".to_string()]);
        assert!(!registry.lookup("ti").expect("TI").capabilities.can_reject);
        assert!(registry.lookup("RRHH").is_err());
    }

    #[test]
    fn checklist_progress_requires_every_item() {
        let registry = RoleRegistry::builtin();
        let entry = registry.lookup("Contabilidad").expect("accounting entry");
        assert_eq!(entry.checklist.len(), 3);

        let mut progress = ChecklistProgress::new(entry);
        progress.check(0);
        progress.check(2);
        assert_eq!(
            progress.ensure_complete(),
            Err(ValidationFailure::IncompleteChecklist { checked: 2, total: 3 })
        );

        progress.check(1);
        assert_eq!(progress.ensure_complete(), Ok(()));
        assert!(!progress.check(7), "out of range index must be ignored");
    }

    #[test]
    fn confirm_rejects_items_past_the_end() {
        let registry = RoleRegistry::builtin();
        let entry = registry.lookup("Contabilidad").expect("accounting entry");
        let mut progress = ChecklistProgress::new(entry);

        assert_eq!(progress.confirm(2), Ok(()));
        assert_eq!(
            progress.confirm(3),
            Err(ValidationFailure::UnknownChecklistItem { item: 4, total: 3 })
        );
        assert_eq!(progress.checked_count(), 1);
    }

    #[test]
    fn builtin_table_passes_registry_validation() {
        let registry = RoleRegistry::from_entries(super::builtin::builtin_checklists())
            .expect("built-in table should validate");
        assert_eq!(registry.roles().len(), SignatureRole::ALL.len());
    }

    #[test]
    fn default_workflow_puts_hr_last() {
        let workflow = default_role_workflow();
        assert_eq!(workflow.len(), 5);
        assert!(workflow.iter().all(|entry| entry.mandatory));
        let last = workflow.iter().max_by_key(|entry| entry.order).expect("non-empty");
        assert_eq!(last.role, SignatureRole::HumanResources);
        assert_eq!(workflow[0].role, SignatureRole::DirectSupervisor);
    }
}
