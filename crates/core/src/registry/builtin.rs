use crate::domain::delegation::RoleWorkflowEntry;
use crate::domain::role::SignatureRole;
use crate::registry::{Capabilities, RoleChecklist};

fn entry(
    role: SignatureRole,
    title: &str,
    description: &str,
    capabilities: Capabilities,
    checklist: &[&str],
    approve_text: &str,
    reject_text: &str,
) -> RoleChecklist {
    RoleChecklist {
        role: role.display_name().to_string(),
        title: title.to_string(),
        description: description.to_string(),
        capabilities,
        checklist: checklist.iter().map(|item| item.to_string()).collect(),
        approve_text: approve_text.to_string(),
        reject_text: reject_text.to_string(),
    }
}

const SIGNER: Capabilities =
    Capabilities { can_approve: true, can_reject: true, can_view: true, can_generate: false };

const SIGNER_WITH_DOCUMENTS: Capabilities =
    Capabilities { can_approve: true, can_reject: true, can_view: true, can_generate: true };

pub(crate) fn builtin_checklists() -> Vec<RoleChecklist> {
    vec![
        entry(
            SignatureRole::DirectSupervisor,
            "Firma de Jefatura Directa",
            "Confirma la entrega de funciones y pendientes del colaborador.",
            SIGNER,
            &[
                "Entrega de funciones y pendientes documentada",
                "Traspaso de información y archivos del área",
                "Sin procesos o proyectos abiertos a su cargo",
            ],
            "Aprobar salida",
            "Rechazar",
        ),
        entry(
            SignatureRole::InformationTechnology,
            "Verificación de Tecnología",
            "Confirma la devolución de equipos y el cierre de accesos.",
            SIGNER_WITH_DOCUMENTS,
            &[
                "Equipos de cómputo devueltos en buen estado",
                "Cuentas de correo y accesos deshabilitados",
                "Licencias de software liberadas",
                "Actas de custodia de activos cerradas",
            ],
            "Firmar paz y salvo de TI",
            "Rechazar",
        ),
        entry(
            SignatureRole::Accounting,
            "Verificación Contable",
            "Confirma que no existen saldos pendientes con el colaborador.",
            SIGNER,
            &[
                "Sin anticipos ni viáticos pendientes de legalizar",
                "Caja menor entregada y cuadrada",
                "Sin cuentas por cobrar al colaborador",
            ],
            "Firmar paz y salvo contable",
            "Rechazar",
        ),
        entry(
            SignatureRole::FinanceManagement,
            "Aprobación de Gerencia Financiera",
            "Valida la liquidación y las obligaciones financieras.",
            SIGNER,
            &["Liquidación revisada", "Sin obligaciones financieras pendientes con la empresa"],
            "Aprobar",
            "Rechazar",
        ),
        entry(
            SignatureRole::HumanResources,
            "Cierre de Recursos Humanos",
            "Firma final una vez todas las áreas han firmado.",
            SIGNER_WITH_DOCUMENTS,
            &[
                "Todas las áreas firmaron el paz y salvo",
                "Carnet y tarjeta de acceso devueltos",
                "Liquidación de prestaciones generada",
                "Certificado laboral emitido",
            ],
            "Cerrar paz y salvo",
            "Rechazar",
        ),
    ]
}

/// Signing sequence used when the backend exposes no workflow configuration.
pub fn default_role_workflow() -> Vec<RoleWorkflowEntry> {
    [
        (SignatureRole::DirectSupervisor, 1),
        (SignatureRole::InformationTechnology, 2),
        (SignatureRole::Accounting, 3),
        (SignatureRole::FinanceManagement, 4),
        (SignatureRole::HumanResources, 5),
    ]
    .into_iter()
    .map(|(role, order)| RoleWorkflowEntry { role, order, mandatory: true })
    .collect()
}
