use serde::{Deserialize, Serialize};

use crate::normalize::canonical_key;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActaId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMethod {
    Digital,
    UploadedPdf,
}

impl SignatureMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match canonical_key(raw).as_str() {
            "digital" | "firmadigital" => Some(Self::Digital),
            "pdf" | "uploadedpdf" | "pdfsubido" | "manual" => Some(Self::UploadedPdf),
            _ => None,
        }
    }
}

/// Custody acknowledgment for an assigned asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acta {
    pub id: ActaId,
    pub asset_code: String,
    pub asset_description: String,
    pub custodian_name: String,
    pub status: String,
    pub signature_method: Option<SignatureMethod>,
}
