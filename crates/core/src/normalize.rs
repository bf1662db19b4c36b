//! Single entry point for backend JSON.
//!
//! The backend serializes the same record in PascalCase, camelCase or
//! snake_case depending on the endpoint, and list endpoints may wrap their
//! payload in an `items` envelope. Everything is mapped here, once, onto the
//! canonical typed records in [`crate::domain`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::acta::{Acta, ActaId, SignatureMethod};
use crate::domain::chat::{ChatMessage, Conversation, ConversationId, MessageId};
use crate::domain::clearance::{
    ClearanceDocument, DocumentId, DocumentStatus, Signature, SignatureId, SignatureState,
};
use crate::domain::delegation::{Delegation, DelegationId, RoleAssignment, RoleWorkflowEntry};
use crate::domain::role::SignatureRole;
use crate::domain::ticket::{Ticket, TicketComment, TicketId};
use crate::errors::RecordError;

/// Lowercases and strips everything but letters and digits, so `FechaSalida`,
/// `fechaSalida` and `fecha_salida` compare equal.
pub fn canonical_key(raw: &str) -> String {
    raw.chars().filter(|ch| ch.is_alphanumeric()).flat_map(char::to_lowercase).collect()
}

struct Record<'a> {
    name: &'static str,
    fields: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    fn new(name: &'static str, value: &'a Value) -> Result<Self, RecordError> {
        value
            .as_object()
            .map(|fields| Self { name, fields })
            .ok_or(RecordError::UnexpectedShape { record: name, expected: "object" })
    }

    fn get(&self, aliases: &[&str]) -> Option<&'a Value> {
        aliases.iter().find_map(|alias| {
            let wanted = canonical_key(alias);
            self.fields
                .iter()
                .find(|(key, value)| !value.is_null() && canonical_key(key) == wanted)
                .map(|(_, value)| value)
        })
    }

    fn text(&self, aliases: &[&str]) -> Option<String> {
        self.get(aliases).and_then(scalar_text).filter(|value| !value.trim().is_empty())
    }

    fn required_text(
        &self,
        field: &'static str,
        aliases: &[&str],
    ) -> Result<String, RecordError> {
        self.text(aliases).ok_or(RecordError::MissingField { record: self.name, field })
    }

    fn flag(&self, aliases: &[&str]) -> Option<bool> {
        match self.get(aliases)? {
            Value::Bool(value) => Some(*value),
            Value::Number(number) => number.as_i64().map(|value| value != 0),
            Value::String(raw) => match canonical_key(raw).as_str() {
                "true" | "si" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn nested(&self, aliases: &[&str]) -> Option<Record<'a>> {
        let value = self.get(aliases)?;
        value.as_object().map(|fields| Record { name: self.name, fields })
    }

    fn list(&self, aliases: &[&str]) -> &'a [Value] {
        self.get(aliases).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
    }

    fn role(&self, field: &'static str, aliases: &[&str]) -> Result<SignatureRole, RecordError> {
        let raw = self.required_text(field, aliases)?;
        Ok(SignatureRole::from_label(&raw)?)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Returns the records of a list payload, with or without an `items` envelope.
pub fn list_items<'a>(record: &'static str, payload: &'a Value) -> Result<&'a [Value], RecordError> {
    if let Some(items) = payload.as_array() {
        return Ok(items);
    }

    let envelope = Record::new(record, payload)?;
    envelope
        .get(&["items", "data", "results"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or(RecordError::UnexpectedShape { record, expected: "array or items envelope" })
}

/// Normalizes every item of a list payload, skipping items that fail.
///
/// One record with a status this client does not know must not hide the
/// rest of the list. Envelope errors still fail the whole call.
fn readable_items<T>(
    record: &'static str,
    payload: &Value,
    parse: impl Fn(&Value) -> Result<T, RecordError>,
) -> Result<Vec<T>, RecordError> {
    let items = list_items(record, payload)?;
    let mut parsed = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        match parse(item) {
            Ok(value) => parsed.push(value),
            Err(error) => warn!(
                event_name = "normalize.record.skipped",
                record,
                position,
                error = %error,
                "skipping unreadable record"
            ),
        }
    }
    Ok(parsed)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    parse_date(raw).and_then(|date| date.and_hms_opt(0, 0, 0)).map(|parsed| parsed.and_utc())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .ok()
}

pub fn signature(value: &Value) -> Result<Signature, RecordError> {
    let record = Record::new("signature", value)?;
    let raw_state = record.required_text("state", &["estado", "state", "status"])?;
    let state = SignatureState::parse(&raw_state).ok_or_else(|| RecordError::InvalidValue {
        record: "signature",
        field: "state",
        value: raw_state.clone(),
    })?;

    Ok(Signature {
        id: SignatureId(record.required_text("id", &["id", "firmaId", "signatureId"])?),
        role: record.role("role", &["rol", "role", "rolFirma"])?,
        state,
        signed_at: record
            .text(&["fechaFirma", "fecha", "signedAt", "timestamp"])
            .and_then(|raw| parse_timestamp(&raw)),
        comment: record.text(&["comentario", "observacion", "comment"]),
        signature_hash: record.text(&["firmaHash", "hashFirma", "signatureHash", "hash"]),
        signer_name: record.text(&["firmanteNombre", "nombreFirmante", "signerName", "usuarioNombre"]),
    })
}

pub fn signatures(payload: &Value) -> Result<Vec<Signature>, RecordError> {
    readable_items("signature list", payload, signature)
}

pub fn clearance_document(value: &Value) -> Result<ClearanceDocument, RecordError> {
    let record = Record::new("clearance document", value)?;
    let raw_status = record.required_text("status", &["estado", "status"])?;
    let status = DocumentStatus::parse(&raw_status).ok_or_else(|| RecordError::InvalidValue {
        record: "clearance document",
        field: "status",
        value: raw_status.clone(),
    })?;

    Ok(ClearanceDocument {
        id: DocumentId(record.required_text("id", &["id", "pazSalvoId", "documentId"])?),
        subject_user_id: record.text(&["usuarioId", "userId", "subjectUserId"]).unwrap_or_default(),
        subject_name: record
            .required_text("subject_name", &["usuarioNombre", "nombreUsuario", "nombre", "subjectName"])?,
        subject_national_id: record
            .text(&["usuarioCedula", "cedula", "documentoIdentidad", "nationalId"])
            .unwrap_or_default(),
        exit_date: record.text(&["fechaSalida", "exitDate"]).and_then(|raw| parse_date(&raw)),
        exit_reason: record.text(&["motivoSalida", "motivo", "exitReason"]).unwrap_or_default(),
        status,
        observations: record.text(&["observaciones", "observations"]),
        signatures: record
            .list(&["firmas", "signatures"])
            .iter()
            .map(signature)
            .collect::<Result<Vec<_>, _>>()?,
        final_pdf_url: record.text(&["pdfFinalUrl", "urlPdf", "pdfUrl", "finalPdfUrl"]),
    })
}

pub fn clearance_documents(payload: &Value) -> Result<Vec<ClearanceDocument>, RecordError> {
    readable_items("clearance document list", payload, clearance_document)
}

pub fn delegation(value: &Value) -> Result<Delegation, RecordError> {
    let record = Record::new("delegation", value)?;
    Ok(Delegation {
        id: DelegationId(record.required_text("id", &["id", "delegacionId"])?),
        delegating_role: record.role("delegating_role", &["rolDelegante", "rol", "delegatingRole"])?,
        delegate_user_id: record.required_text(
            "delegate_user_id",
            &["usuarioDelegadoId", "delegadoId", "delegateUserId"],
        )?,
        delegate_name: record.text(&["usuarioDelegadoNombre", "delegadoNombre", "delegateName"]),
        reason: record.text(&["motivo", "reason"]).unwrap_or_default(),
        end_date: record.text(&["fechaFin", "endDate"]).and_then(|raw| parse_date(&raw)),
        active: record.flag(&["activo", "activa", "active"]).unwrap_or(true),
    })
}

pub fn delegations(payload: &Value) -> Result<Vec<Delegation>, RecordError> {
    list_items("delegation list", payload)?.iter().map(delegation).collect()
}

pub fn role_assignment(value: &Value) -> Result<RoleAssignment, RecordError> {
    let record = Record::new("role assignment", value)?;
    Ok(RoleAssignment {
        department: record.text(&["departamento", "department"]).unwrap_or_default(),
        role: record.role("role", &["rol", "role"])?,
        assigned_user_id: record.required_text(
            "assigned_user_id",
            &["usuarioAsignadoId", "usuarioId", "assignedUserId"],
        )?,
    })
}

pub fn role_workflow_entry(value: &Value) -> Result<RoleWorkflowEntry, RecordError> {
    let record = Record::new("role workflow entry", value)?;
    let raw_order = record.required_text("order", &["orden", "order"])?;
    let order = raw_order.trim().parse::<u8>().map_err(|_| RecordError::InvalidValue {
        record: "role workflow entry",
        field: "order",
        value: raw_order.clone(),
    })?;

    Ok(RoleWorkflowEntry {
        role: record.role("role", &["rol", "role"])?,
        order,
        mandatory: record.flag(&["obligatorio", "mandatory", "required"]).unwrap_or(true),
    })
}

/// Splits the role-configuration payload into assignments and workflow order.
/// A bare array is read as the workflow alone.
pub fn role_configuration(
    payload: &Value,
) -> Result<(Vec<RoleAssignment>, Vec<RoleWorkflowEntry>), RecordError> {
    let (assignments, entries) = match payload.as_array() {
        Some(entries) => (Vec::new(), entries.as_slice()),
        None => {
            let record = Record::new("role configuration", payload)?;
            let assignments = record
                .list(&["asignaciones", "assignments"])
                .iter()
                .map(role_assignment)
                .collect::<Result<Vec<_>, _>>()?;
            (assignments, record.list(&["flujo", "workflow", "roles"]))
        }
    };
    let mut workflow =
        entries.iter().map(role_workflow_entry).collect::<Result<Vec<_>, _>>()?;
    workflow.sort_by_key(|entry| entry.order);
    Ok((assignments, workflow))
}

pub fn ticket(value: &Value) -> Result<Ticket, RecordError> {
    let record = Record::new("ticket", value)?;
    Ok(Ticket {
        id: TicketId(record.required_text("id", &["id", "ticketId"])?),
        title: record.text(&["titulo", "asunto", "title"]).unwrap_or_default(),
        status: record.required_text("status", &["estado", "status"])?,
        assignee: record.text(&["asignadoA", "tecnicoAsignado", "assignee"]),
        comments: record
            .list(&["comentarios", "comments"])
            .iter()
            .map(ticket_comment)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn ticket_comment(value: &Value) -> Result<TicketComment, RecordError> {
    let record = Record::new("ticket comment", value)?;
    Ok(TicketComment {
        id: record.required_text("id", &["id", "comentarioId"])?,
        author: record.text(&["autor", "usuarioNombre", "usuario", "author"]).unwrap_or_default(),
        text: record.text(&["texto", "comentario", "contenido", "text"]).unwrap_or_default(),
        created_at: record
            .text(&["fechaCreacion", "fecha", "createdAt"])
            .and_then(|raw| parse_timestamp(&raw)),
        status_at_creation: record.text(&["estadoCreacion", "statusAtCreation"]),
    })
}

pub fn acta(value: &Value) -> Result<Acta, RecordError> {
    let record = Record::new("acta", value)?;
    let asset = record.nested(&["activo", "asset"]);
    let asset_code = asset
        .as_ref()
        .and_then(|asset| asset.text(&["codigo", "code"]))
        .or_else(|| record.text(&["codigoActivo", "activoCodigo", "assetCode"]))
        .ok_or(RecordError::MissingField { record: "acta", field: "asset_code" })?;
    let asset_description = asset
        .as_ref()
        .and_then(|asset| asset.text(&["descripcion", "nombre", "description"]))
        .or_else(|| record.text(&["descripcionActivo", "assetDescription"]))
        .unwrap_or_default();

    Ok(Acta {
        id: ActaId(record.required_text("id", &["id", "actaId"])?),
        asset_code,
        asset_description,
        custodian_name: record
            .text(&["usuarioNombre", "custodio", "responsable", "custodianName"])
            .unwrap_or_default(),
        status: record.required_text("status", &["estado", "status"])?,
        signature_method: record
            .text(&["tipoFirma", "metodoFirma", "signatureMethod"])
            .and_then(|raw| SignatureMethod::parse(&raw)),
    })
}

pub fn actas(payload: &Value) -> Result<Vec<Acta>, RecordError> {
    list_items("acta list", payload)?.iter().map(acta).collect()
}

pub fn chat_message(value: &Value) -> Result<ChatMessage, RecordError> {
    let record = Record::new("chat message", value)?;
    Ok(ChatMessage {
        id: MessageId(record.required_text("id", &["id", "mensajeId", "messageId"])?),
        conversation_id: ConversationId(record.required_text(
            "conversation_id",
            &["conversacionId", "conversationId"],
        )?),
        author: record.text(&["remitente", "autor", "usuarioNombre", "author"]).unwrap_or_default(),
        body: record.text(&["contenido", "mensaje", "texto", "body"]).unwrap_or_default(),
        sent_at: record
            .text(&["fechaEnvio", "fecha", "sentAt"])
            .and_then(|raw| parse_timestamp(&raw)),
    })
}

pub fn conversation(value: &Value) -> Result<Conversation, RecordError> {
    let record = Record::new("conversation", value)?;
    Ok(Conversation {
        id: ConversationId(record.required_text("id", &["id", "conversacionId"])?),
        title: record.text(&["titulo", "asunto", "title"]).unwrap_or_default(),
        messages: record
            .list(&["mensajes", "messages"])
            .iter()
            .map(chat_message)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

pub fn conversations(payload: &Value) -> Result<Vec<Conversation>, RecordError> {
    list_items("conversation list", payload)?.iter().map(conversation).collect()
}
