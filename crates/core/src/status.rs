use serde::Serialize;

use crate::normalize::canonical_key;

/// Rendering triple for a backend status string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub icon: &'static str,
    pub color: &'static str,
    pub label: String,
}

const NEUTRAL_COLOR: &str = "bg-gray-100 text-gray-700";
const PENDING_COLOR: &str = "bg-yellow-100 text-yellow-800";
const PROGRESS_COLOR: &str = "bg-blue-100 text-blue-800";
const SUCCESS_COLOR: &str = "bg-green-100 text-green-800";
const DANGER_COLOR: &str = "bg-red-100 text-red-800";
const ASSIGNED_COLOR: &str = "bg-indigo-100 text-indigo-800";
const CLOSED_COLOR: &str = "bg-slate-200 text-slate-800";

fn badge(icon: &'static str, color: &'static str, label: &str) -> StatusBadge {
    StatusBadge { icon, color, label: label.to_string() }
}

fn neutral(raw: &str) -> StatusBadge {
    let trimmed = raw.trim();
    let label = if trimmed.is_empty() { "Sin estado" } else { trimmed };
    badge("help-circle", NEUTRAL_COLOR, label)
}

/// Badge for a clearance document status.
pub fn clearance_status(raw: &str) -> StatusBadge {
    match canonical_key(raw).as_str() {
        "borrador" | "draft" => badge("file-text", NEUTRAL_COLOR, "Borrador"),
        "enfirma" | "enfirmas" | "pendientefirma" | "insignature" | "enproceso" => {
            badge("pen-tool", PROGRESS_COLOR, "En firma")
        }
        "aprobado" | "approved" => badge("check-circle", SUCCESS_COLOR, "Aprobado"),
        "rechazado" | "rejected" => badge("x-circle", DANGER_COLOR, "Rechazado"),
        "cerrado" | "closed" | "finalizado" => badge("lock", CLOSED_COLOR, "Cerrado"),
        _ => neutral(raw),
    }
}

/// Badge for one role's signature state.
pub fn signature_status(raw: &str) -> StatusBadge {
    match canonical_key(raw).as_str() {
        "pendiente" | "pending" => badge("clock", PENDING_COLOR, "Pendiente"),
        "firmado" | "firmada" | "aprobado" | "signed" | "approved" => {
            badge("check-circle", SUCCESS_COLOR, "Firmado")
        }
        "rechazado" | "rechazada" | "rejected" => badge("x-circle", DANGER_COLOR, "Rechazado"),
        _ => neutral(raw),
    }
}

/// Badge for a support ticket status.
pub fn ticket_status(raw: &str) -> StatusBadge {
    match canonical_key(raw).as_str() {
        "pendiente" | "abierto" | "nuevo" | "pending" | "open" => {
            badge("inbox", PENDING_COLOR, "Pendiente")
        }
        "asignado" | "assigned" => badge("user-check", ASSIGNED_COLOR, "Asignado"),
        "enproceso" | "inprogress" => badge("loader", PROGRESS_COLOR, "En Proceso"),
        "resuelto" | "resolved" => badge("check-circle", SUCCESS_COLOR, "Resuelto"),
        "cerrado" | "closed" => badge("lock", CLOSED_COLOR, "Cerrado"),
        _ => neutral(raw),
    }
}

/// Badge for an asset custody acta.
pub fn acta_status(raw: &str) -> StatusBadge {
    match canonical_key(raw).as_str() {
        "pendiente" | "pendientedefirma" | "pending" => {
            badge("clock", PENDING_COLOR, "Pendiente de firma")
        }
        "firmada" | "firmado" | "signed" => badge("check-circle", SUCCESS_COLOR, "Firmada"),
        "rechazada" | "rechazado" | "rejected" => badge("x-circle", DANGER_COLOR, "Rechazada"),
        "anulada" | "anulado" | "voided" => badge("slash", CLOSED_COLOR, "Anulada"),
        _ => neutral(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::{acta_status, clearance_status, signature_status, ticket_status};

    #[test]
    fn known_clearance_statuses_have_specific_badges() {
        let badge = clearance_status("EN_FIRMA");
        assert_eq!(badge.icon, "pen-tool");
        assert_eq!(badge.label, "En firma");
        assert_eq!(clearance_status("Cerrado").icon, "lock");
    }

    #[test]
    fn unknown_status_degrades_to_neutral_badge_with_raw_label() {
        let badge = clearance_status("  Archivado ");
        assert_eq!(badge.icon, "help-circle");
        assert_eq!(badge.color, "bg-gray-100 text-gray-700");
        assert_eq!(badge.label, "Archivado");
    }

    #[test]
    fn empty_status_gets_placeholder_label() {
        assert_eq!(ticket_status("   ").label, "Sin estado");
        assert_eq!(signature_status("").label, "Sin estado");
    }

    #[test]
    fn screens_classify_independently() {
        assert_eq!(ticket_status("En Proceso").label, "En Proceso");
        assert_eq!(signature_status("firmado").icon, "check-circle");
        assert_eq!(acta_status("Pendiente de firma").icon, "clock");
        assert_eq!(acta_status("anulada").label, "Anulada");
    }
}
