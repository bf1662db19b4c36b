use serde::Serialize;

use crate::domain::clearance::{Signature, SignatureState};
use crate::domain::role::SignatureRole;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SignatureCounts {
    pub signed: usize,
    pub pending: usize,
    pub rejected: usize,
}

impl SignatureCounts {
    pub fn total(&self) -> usize {
        self.signed + self.pending + self.rejected
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoleStanding {
    pub role: SignatureRole,
    pub state: SignatureState,
    pub may_sign: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignatureOverview {
    /// No signatures are configured. Rendered as its own state so it is never
    /// mistaken for "everything signed".
    Empty,
    Summary { counts: SignatureCounts, roles: Vec<RoleStanding> },
}

impl SignatureOverview {
    pub const EMPTY_MESSAGE: &'static str = "no signatures configured";

    pub fn may_sign(&self, role: SignatureRole) -> bool {
        match self {
            Self::Empty => false,
            Self::Summary { roles, .. } => {
                roles.iter().any(|standing| standing.role == role && standing.may_sign)
            }
        }
    }

    pub fn counts(&self) -> Option<SignatureCounts> {
        match self {
            Self::Empty => None,
            Self::Summary { counts, .. } => Some(*counts),
        }
    }
}

pub fn summarize(signatures: Option<&[Signature]>) -> SignatureOverview {
    let signatures = match signatures {
        Some(signatures) if !signatures.is_empty() => signatures,
        _ => return SignatureOverview::Empty,
    };

    let mut counts = SignatureCounts::default();
    for signature in signatures {
        match signature.state {
            SignatureState::Signed => counts.signed += 1,
            SignatureState::Pending => counts.pending += 1,
            SignatureState::Rejected => counts.rejected += 1,
        }
    }

    let roles = signatures
        .iter()
        .map(|signature| RoleStanding {
            role: signature.role,
            state: signature.state,
            may_sign: may_sign(signature.role, signatures),
        })
        .collect();

    SignatureOverview::Summary { counts, roles }
}

/// Advisory "may sign now" for `role`.
///
/// HR signs last: its own signature must be pending, at least one other role
/// must be present, and every other role must have signed. A document with no
/// co-signers never unlocks HR.
pub fn may_sign(role: SignatureRole, signatures: &[Signature]) -> bool {
    let own_pending = signatures
        .iter()
        .find(|signature| signature.role == role)
        .is_some_and(|signature| signature.state == SignatureState::Pending);
    if !own_pending {
        return false;
    }

    if !role.is_human_resources() {
        return true;
    }

    let others: Vec<&Signature> =
        signatures.iter().filter(|signature| !signature.role.is_human_resources()).collect();
    !others.is_empty() && others.iter().all(|signature| signature.state == SignatureState::Signed)
}

#[cfg(test)]
mod tests {
    use crate::domain::clearance::{Signature, SignatureId, SignatureState};
    use crate::domain::role::SignatureRole;

    use super::{may_sign, summarize, SignatureCounts, SignatureOverview};

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

    #[test]
    fn hr_may_sign_once_every_other_role_signed() {
        let signatures = vec![
            signature(SignatureRole::HumanResources, SignatureState::Pending),
            signature(SignatureRole::InformationTechnology, SignatureState::Signed),
            signature(SignatureRole::Accounting, SignatureState::Signed),
        ];
        assert!(may_sign(SignatureRole::HumanResources, &signatures));
    }

    #[test]
    fn hr_is_blocked_while_any_other_role_is_pending() {
        let signatures = vec![
            signature(SignatureRole::HumanResources, SignatureState::Pending),
            signature(SignatureRole::InformationTechnology, SignatureState::Signed),
            signature(SignatureRole::Accounting, SignatureState::Pending),
        ];
        assert!(!may_sign(SignatureRole::HumanResources, &signatures));
        assert!(may_sign(SignatureRole::Accounting, &signatures));
    }

    #[test]
    fn hr_alone_never_unlocks() {
        let signatures = vec![signature(SignatureRole::HumanResources, SignatureState::Pending)];
        assert!(!may_sign(SignatureRole::HumanResources, &signatures));
    }

    #[test]
    fn hr_cannot_sign_twice() {
        let signatures = vec![
            signature(SignatureRole::HumanResources, SignatureState::Signed),
            signature(SignatureRole::Accounting, SignatureState::Signed),
        ];
        assert!(!may_sign(SignatureRole::HumanResources, &signatures));
    }

    #[test]
    fn summary_counts_add_up_to_list_length() {
        let signatures = vec![
            signature(SignatureRole::DirectSupervisor, SignatureState::Signed),
            signature(SignatureRole::InformationTechnology, SignatureState::Rejected),
            signature(SignatureRole::Accounting, SignatureState::Pending),
            signature(SignatureRole::FinanceManagement, SignatureState::Pending),
            signature(SignatureRole::HumanResources, SignatureState::Pending),
        ];

        let overview = summarize(Some(signatures.as_slice()));
        let counts = overview.counts().expect("non-empty list has counts");
        assert_eq!(counts, SignatureCounts { signed: 1, pending: 3, rejected: 1 });
        assert_eq!(counts.total(), signatures.len());
        assert!(overview.may_sign(SignatureRole::Accounting));
        assert!(!overview.may_sign(SignatureRole::HumanResources));
        assert!(!overview.may_sign(SignatureRole::DirectSupervisor));
    }

    #[test]
    fn empty_or_absent_list_is_an_explicit_empty_state() {
        assert_eq!(summarize(Some(&[][..])), SignatureOverview::Empty);
        assert_eq!(summarize(None), SignatureOverview::Empty);
        assert_eq!(summarize(None).counts(), None);
    }
}
