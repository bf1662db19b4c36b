use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::role::SignatureRole;
use crate::errors::DomainError;
use crate::normalize::canonical_key;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Draft,
    InSignature,
    Approved,
    Rejected,
    Closed,
}

impl DocumentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_key(raw).as_str() {
            "borrador" | "draft" => Some(Self::Draft),
            "enfirma" | "enfirmas" | "pendientefirma" | "insignature" | "enproceso" => {
                Some(Self::InSignature)
            }
            "aprobado" | "approved" => Some(Self::Approved),
            "rechazado" | "rejected" => Some(Self::Rejected),
            "cerrado" | "closed" | "finalizado" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn backend_label(self) -> &'static str {
        match self {
            Self::Draft => "Borrador",
            Self::InSignature => "En Firma",
            Self::Approved => "Aprobado",
            Self::Rejected => "Rechazado",
            Self::Closed => "Cerrado",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureState {
    Pending,
    Signed,
    Rejected,
}

impl SignatureState {
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_key(raw).as_str() {
            "pendiente" | "pending" => Some(Self::Pending),
            "firmado" | "firmada" | "aprobado" | "signed" | "approved" => Some(Self::Signed),
            "rechazado" | "rechazada" | "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn backend_label(self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Signed => "Firmado",
            Self::Rejected => "Rechazado",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub id: SignatureId,
    pub role: SignatureRole,
    pub state: SignatureState,
    pub signed_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub signature_hash: Option<String>,
    pub signer_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceDocument {
    pub id: DocumentId,
    pub subject_user_id: String,
    pub subject_name: String,
    pub subject_national_id: String,
    pub exit_date: Option<NaiveDate>,
    pub exit_reason: String,
    pub status: DocumentStatus,
    pub observations: Option<String>,
    pub signatures: Vec<Signature>,
    pub final_pdf_url: Option<String>,
}

impl ClearanceDocument {
    pub fn is_immutable(&self) -> bool {
        self.status == DocumentStatus::Closed
    }

    pub fn signature_for(&self, role: SignatureRole) -> Option<&Signature> {
        self.signatures.iter().find(|signature| signature.role == role)
    }

    pub fn ensure_mutable(&self) -> Result<(), DomainError> {
        if self.is_immutable() {
            return Err(DomainError::DocumentClosed { document_id: self.id.0.clone() });
        }
        Ok(())
    }
}
