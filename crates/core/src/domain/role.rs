use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::canonical_key;

/// Organizational function whose signature a clearance document requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    DirectSupervisor,
    HumanResources,
    InformationTechnology,
    Accounting,
    FinanceManagement,
}

impl SignatureRole {
    pub const ALL: [SignatureRole; 5] = [
        SignatureRole::DirectSupervisor,
        SignatureRole::HumanResources,
        SignatureRole::InformationTechnology,
        SignatureRole::Accounting,
        SignatureRole::FinanceManagement,
    ];

    /// Label shown to operators and used as the registry key.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::DirectSupervisor => "Jefatura Directa",
            Self::HumanResources => "RRHH",
            Self::InformationTechnology => "TI",
            Self::Accounting => "Contabilidad",
            Self::FinanceManagement => "Gerencia Finanzas",
        }
    }

    /// Identifier the backend expects in paths and payloads.
    pub fn backend_id(self) -> &'static str {
        match self {
            Self::DirectSupervisor => "JEFE_DIRECTO",
            Self::HumanResources => "RRHH",
            Self::InformationTechnology => "TI",
            Self::Accounting => "CONTABILIDAD",
            Self::FinanceManagement => "GERENCIA_FINANZAS",
        }
    }

    pub fn is_human_resources(self) -> bool {
        matches!(self, Self::HumanResources)
    }

    /// Resolves either vocabulary (display label or backend identifier).
    pub fn from_label(label: &str) -> Result<Self, RoleError> {
        let key = canonical_key(label);
        Self::ALL
            .into_iter()
            .find(|role| {
                canonical_key(role.display_name()) == key || canonical_key(role.backend_id()) == key
            })
            .ok_or_else(|| RoleError::Unmapped { label: label.to_string(), known: known_roles() })
    }
}

impl fmt::Display for SignatureRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for SignatureRole {
    type Err = RoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_label(value)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RoleError {
    #[error("role `{label}` has no backend identifier (known roles: {known})")]
    Unmapped { label: String, known: String },
}

/// Translates a UI role label into the backend identifier.
///
/// Never passes an unknown label through unchanged.
pub fn translate_role(label: &str) -> Result<&'static str, RoleError> {
    SignatureRole::from_label(label).map(SignatureRole::backend_id)
}

pub fn known_roles() -> String {
    SignatureRole::ALL.iter().map(|role| role.display_name()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::{translate_role, RoleError, SignatureRole};

    #[test]
    fn translation_is_total_over_the_role_set() {
        for label in ["Jefatura Directa", "RRHH", "TI", "Contabilidad", "Gerencia Finanzas"] {
            let translated = translate_role(label).expect("known role should translate");
            assert!(!translated.is_empty());
        }
    }

    #[test]
    fn translation_maps_display_labels_to_backend_ids() {
        assert_eq!(translate_role("Jefatura Directa"), Ok("JEFE_DIRECTO"));
        assert_eq!(translate_role("Gerencia Finanzas"), Ok("GERENCIA_FINANZAS"));
        assert_eq!(translate_role("  rrhh "), Ok("RRHH"));
    }

    #[test]
    fn unknown_role_fails_loudly() {
        let error = translate_role("Seguridad Fisica").expect_err("unmapped role must fail");
        let RoleError::Unmapped { label, known } = error;
        assert_eq!(label, "Seguridad Fisica");
        assert!(known.contains("Contabilidad"));
    }

    #[test]
    fn backend_ids_resolve_back_to_roles() {
        for role in SignatureRole::ALL {
            assert_eq!(SignatureRole::from_label(role.backend_id()), Ok(role));
        }
    }
}
