use serde::{Deserialize, Serialize};

use crate::domain::clearance::{ClearanceDocument, DocumentStatus, Signature, SignatureState};
use crate::domain::role::SignatureRole;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAction {
    Sign,
    Reject,
    Observe,
    RequestSignature,
    DownloadSignedPdf,
}

impl SignatureAction {
    pub const ALL: [SignatureAction; 5] = [
        SignatureAction::Sign,
        SignatureAction::Reject,
        SignatureAction::Observe,
        SignatureAction::RequestSignature,
        SignatureAction::DownloadSignedPdf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::Reject => "reject",
            Self::Observe => "observe",
            Self::RequestSignature => "request_signature",
            Self::DownloadSignedPdf => "download_signed_pdf",
        }
    }
}

pub fn validate_signature_transition(
    from: SignatureState,
    to: SignatureState,
) -> Result<(), DomainError> {
    match (from, to) {
        (SignatureState::Pending, SignatureState::Signed)
        | (SignatureState::Pending, SignatureState::Rejected) => Ok(()),
        _ => Err(DomainError::InvalidSignatureTransition { from, to }),
    }
}

pub fn validate_document_transition(
    from: DocumentStatus,
    to: DocumentStatus,
) -> Result<(), DomainError> {
    use DocumentStatus::{Approved, Closed, Draft, InSignature, Rejected};

    match (from, to) {
        (Draft, InSignature)
        | (InSignature, Approved)
        | (InSignature, Rejected)
        | (Approved, Closed) => Ok(()),
        _ => Err(DomainError::InvalidDocumentTransition { from, to }),
    }
}

/// Status the document should show given its signatures.
///
/// Draft and Closed are set explicitly by the backend and are never derived.
pub fn derive_document_status(current: DocumentStatus, signatures: &[Signature]) -> DocumentStatus {
    match current {
        DocumentStatus::Draft | DocumentStatus::Closed => current,
        _ if signatures.iter().any(|signature| signature.state == SignatureState::Rejected) => {
            DocumentStatus::Rejected
        }
        _ if !signatures.is_empty()
            && signatures.iter().all(|signature| signature.state == SignatureState::Signed) =>
        {
            DocumentStatus::Approved
        }
        _ => DocumentStatus::InSignature,
    }
}

/// Checks whether `action` is applicable for `role` on `document`.
///
/// This mirrors the backend state machine for display purposes; the backend
/// remains the authority.
pub fn check_action(
    document: &ClearanceDocument,
    role: SignatureRole,
    action: SignatureAction,
) -> Result<(), DomainError> {
    if action != SignatureAction::DownloadSignedPdf {
        document.ensure_mutable()?;
    }

    let signature = || {
        document.signature_for(role).ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "document `{}` has no signature for role `{role}`",
                document.id.0
            ))
        })
    };

    match action {
        SignatureAction::Sign | SignatureAction::Reject => {
            require_status(document, DocumentStatus::InSignature)?;
            let target = if action == SignatureAction::Sign {
                SignatureState::Signed
            } else {
                SignatureState::Rejected
            };
            validate_signature_transition(signature()?.state, target)
        }
        SignatureAction::Observe => signature().map(|_| ()),
        SignatureAction::RequestSignature => match document.status {
            DocumentStatus::Draft | DocumentStatus::InSignature => {
                let current = signature()?.state;
                if current == SignatureState::Pending {
                    Ok(())
                } else {
                    Err(DomainError::InvalidSignatureTransition {
                        from: current,
                        to: SignatureState::Pending,
                    })
                }
            }
            other => Err(DomainError::InvalidDocumentTransition {
                from: other,
                to: DocumentStatus::InSignature,
            }),
        },
        SignatureAction::DownloadSignedPdf => {
            let current = signature()?.state;
            if current == SignatureState::Signed {
                Ok(())
            } else {
                Err(DomainError::InvariantViolation(format!(
                    "role `{role}` has not signed document `{}`",
                    document.id.0
                )))
            }
        }
    }
}

fn require_status(document: &ClearanceDocument, expected: DocumentStatus) -> Result<(), DomainError> {
    if document.status == expected {
        return Ok(());
    }
    Err(DomainError::InvariantViolation(format!(
        "document `{}` is {:?}, expected {expected:?}",
        document.id.0, document.status
    )))
}

#[cfg(test)]
mod tests {
    use crate::domain::clearance::{
        ClearanceDocument, DocumentId, DocumentStatus, Signature, SignatureId, SignatureState,
    };
    use crate::domain::role::SignatureRole;
    use crate::errors::DomainError;

    use super::{
        check_action, derive_document_status, validate_document_transition,
        validate_signature_transition, SignatureAction,
    };

    fn signature(role: SignatureRole, state: SignatureState) -> Signature {
        Signature {
            id: SignatureId(format!("sig-{}", role.backend_id())),
            role,
            state,
            signed_at: None,
            comment: None,
            signature_hash: None,
            signer_name: None,
        }
    }

    fn document(status: DocumentStatus, signatures: Vec<Signature>) -> ClearanceDocument {
        ClearanceDocument {
            id: DocumentId("PS-1".to_string()),
            subject_user_id: "u-9".to_string(),
            subject_name: "Ana Rojas".to_string(),
            subject_national_id: "1020304050".to_string(),
            exit_date: None,
            exit_reason: "Renuncia".to_string(),
            status,
            observations: None,
            signatures,
            final_pdf_url: None,
        }
    }

    #[test]
    fn signatures_move_only_out_of_pending() {
        use SignatureState::{Pending, Rejected, Signed};

        assert!(validate_signature_transition(Pending, Signed).is_ok());
        assert!(validate_signature_transition(Pending, Rejected).is_ok());
        assert!(validate_signature_transition(Pending, Pending).is_err());
        assert!(validate_signature_transition(Signed, Rejected).is_err());
        assert!(validate_signature_transition(Rejected, Signed).is_err());
    }

    #[test]
    fn document_lifecycle_is_linear() {
        use DocumentStatus::{Approved, Closed, Draft, InSignature, Rejected};

        assert!(validate_document_transition(Draft, InSignature).is_ok());
        assert!(validate_document_transition(InSignature, Approved).is_ok());
        assert!(validate_document_transition(InSignature, Rejected).is_ok());
        assert!(validate_document_transition(Approved, Closed).is_ok());
        assert!(validate_document_transition(Closed, InSignature).is_err());
        assert!(validate_document_transition(Draft, Approved).is_err());
    }

    #[test]
    fn derived_status_follows_signatures() {
        let all_signed = vec![
            signature(SignatureRole::InformationTechnology, SignatureState::Signed),
            signature(SignatureRole::HumanResources, SignatureState::Signed),
        ];
        assert_eq!(
            derive_document_status(DocumentStatus::InSignature, &all_signed),
            DocumentStatus::Approved
        );

        let one_rejected = vec![
            signature(SignatureRole::InformationTechnology, SignatureState::Rejected),
            signature(SignatureRole::HumanResources, SignatureState::Pending),
        ];
        assert_eq!(
            derive_document_status(DocumentStatus::InSignature, &one_rejected),
            DocumentStatus::Rejected
        );
        assert_eq!(
            derive_document_status(DocumentStatus::InSignature, &[]),
            DocumentStatus::InSignature
        );
        assert_eq!(derive_document_status(DocumentStatus::Closed, &[]), DocumentStatus::Closed);
    }

    #[test]
    fn closed_documents_reject_every_mutation() {
        let closed = document(
            DocumentStatus::Closed,
            vec![signature(SignatureRole::Accounting, SignatureState::Signed)],
        );

        let error = check_action(&closed, SignatureRole::Accounting, SignatureAction::Observe)
            .expect_err("closed document is immutable");
        assert!(matches!(error, DomainError::DocumentClosed { .. }));
        assert!(check_action(
            &closed,
            SignatureRole::Accounting,
            SignatureAction::DownloadSignedPdf
        )
        .is_ok());
    }

    #[test]
    fn sign_requires_pending_signature_in_signature_phase() {
        let doc = document(
            DocumentStatus::InSignature,
            vec![
                signature(SignatureRole::Accounting, SignatureState::Pending),
                signature(SignatureRole::InformationTechnology, SignatureState::Signed),
            ],
        );

        assert!(check_action(&doc, SignatureRole::Accounting, SignatureAction::Sign).is_ok());
        assert!(check_action(&doc, SignatureRole::InformationTechnology, SignatureAction::Sign)
            .is_err());
        assert!(matches!(
            check_action(&doc, SignatureRole::FinanceManagement, SignatureAction::Reject),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
