use std::time::Duration;

use async_trait::async_trait;
use custodia_core::config::ApiConfig;
use custodia_core::domain::acta::Acta;
use custodia_core::domain::chat::Conversation;
use custodia_core::domain::ticket::{Ticket, TicketId};
use custodia_core::normalize;
use custodia_core::{
    ClearanceDocument, Delegation, DelegationId, DocumentId, RoleAssignment, Signature,
    SignatureId,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::{ApiError, DelegationRequest, PortalApi, RoleConfiguration};
use crate::routes::{self, Route};

const MESSAGE_FIELDS: [&str; 5] = ["message", "mensaje", "error", "detail", "title"];

/// `PortalApi` over the portal's JSON REST backend.
pub struct HttpPortalApi {
    client: Client,
    base_url: Url,
    token: SecretString,
}

impl HttpPortalApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url).map_err(|error| ApiError::Transport {
            route: config.base_url.clone(),
            message: format!("invalid base url: {error}"),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ApiError::Transport {
                route: config.base_url.clone(),
                message: error.to_string(),
            })?;

        Ok(Self { client, base_url, token: config.token.clone() })
    }

    fn url(&self, route: &Route) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport {
                route: route.to_string(),
                message: "base url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(route.segments());
        Ok(url)
    }

    fn request(&self, method: Method, route: &Route) -> Result<RequestBuilder, ApiError> {
        let url = self.url(route)?;
        Ok(self.client.request(method, url).bearer_auth(self.token.expose_secret()))
    }

    async fn send(&self, route: &Route, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(|error| ApiError::Transport {
            route: route.to_string(),
            message: error.to_string(),
        })?;
        let status = response.status();
        debug!(event_name = "api.response", route = %route, status = status.as_u16());

        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound { route: route.to_string() });
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            route: route.to_string(),
            status: status.as_u16(),
            message: extract_message(&body),
        })
    }

    async fn get_json(&self, route: Route) -> Result<Value, ApiError> {
        let builder = self.request(Method::GET, &route)?;
        let response = self.send(&route, builder).await?;
        response.json::<Value>().await.map_err(|error| ApiError::Decode {
            route: route.to_string(),
            message: error.to_string(),
        })
    }

    async fn execute(&self, method: Method, route: Route, body: Option<Value>) -> Result<(), ApiError> {
        let mut builder = self.request(method, &route)?;
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        self.send(&route, builder).await.map(|_| ())
    }
}

/// Pulls a human-readable message out of an error body, if it has one.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(fields)) => MESSAGE_FIELDS.iter().find_map(|wanted| {
            fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
                .and_then(|(_, value)| value.as_str())
                .map(str::trim)
                .filter(|message| !message.is_empty())
                .map(str::to_string)
        }),
        Ok(Value::String(message)) if !message.trim().is_empty() => Some(message.trim().to_string()),
        Ok(_) => None,
        Err(_) if !trimmed.starts_with('<') => Some(trimmed.to_string()),
        Err(_) => None,
    }
}

fn comment_body(comment: Option<&str>) -> Value {
    match comment.map(str::trim).filter(|comment| !comment.is_empty()) {
        Some(comment) => json!({ "comentario": comment }),
        None => json!({}),
    }
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn list_documents(&self) -> Result<Vec<ClearanceDocument>, ApiError> {
        let payload = self.get_json(routes::documents()).await?;
        Ok(normalize::clearance_documents(&payload)?)
    }

    async fn get_document(&self, document_id: &DocumentId) -> Result<ClearanceDocument, ApiError> {
        let payload = self.get_json(routes::document(&document_id.0)).await?;
        Ok(normalize::clearance_document(&payload)?)
    }

    async fn list_signatures(&self, document_id: &DocumentId) -> Result<Vec<Signature>, ApiError> {
        let payload = self.get_json(routes::signatures(&document_id.0)).await?;
        Ok(normalize::signatures(&payload)?)
    }

    async fn sign(
        &self,
        document_id: &DocumentId,
        role_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        self.execute(Method::POST, routes::sign(&document_id.0, role_id), Some(comment_body(comment)))
            .await
    }

    async fn reject(
        &self,
        document_id: &DocumentId,
        role_id: &str,
        reason: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "motivo": reason, "comentario": reason });
        self.execute(Method::POST, routes::reject(&document_id.0, role_id), Some(body)).await
    }

    async fn observe(
        &self,
        document_id: &DocumentId,
        signature_id: &SignatureId,
        comment: &str,
    ) -> Result<(), ApiError> {
        let body = json!({ "observacion": comment });
        self.execute(Method::POST, routes::observe(&document_id.0, &signature_id.0), Some(body))
            .await
    }

    async fn request_role_signature(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<(), ApiError> {
        self.execute(Method::POST, routes::request_signature(&document_id.0, role_id), None).await
    }

    async fn send_to_signature(&self, document_id: &DocumentId) -> Result<(), ApiError> {
        self.execute(Method::POST, routes::send_to_signature(&document_id.0), None).await
    }

    async fn download_signed_pdf(
        &self,
        document_id: &DocumentId,
        role_id: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let route = routes::signed_pdf(&document_id.0, role_id);
        let builder = self.request(Method::GET, &route)?;
        let response = self.send(&route, builder).await?;
        let bytes = response.bytes().await.map_err(|error| ApiError::Decode {
            route: route.to_string(),
            message: error.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn list_delegations(&self) -> Result<Vec<Delegation>, ApiError> {
        let payload = self.get_json(routes::delegations()).await?;
        Ok(normalize::delegations(&payload)?)
    }

    async fn create_delegation(&self, request: &DelegationRequest) -> Result<(), ApiError> {
        let route = routes::delegations();
        let builder = self.request(Method::POST, &route)?.json(request);
        self.send(&route, builder).await.map(|_| ())
    }

    async fn revoke_delegation(&self, delegation_id: &DelegationId) -> Result<(), ApiError> {
        self.execute(Method::DELETE, routes::delegation(&delegation_id.0), None).await
    }

    async fn role_configuration(&self) -> Result<RoleConfiguration, ApiError> {
        let payload = self.get_json(routes::role_configuration()).await?;
        let (assignments, workflow) = normalize::role_configuration(&payload)?;
        Ok(RoleConfiguration { assignments, workflow })
    }

    async fn update_role_assignment(&self, assignment: &RoleAssignment) -> Result<(), ApiError> {
        let body = json!({
            "departamento": assignment.department,
            "rol": assignment.role.backend_id(),
            "usuarioAsignadoId": assignment.assigned_user_id,
        });
        self.execute(Method::PUT, routes::role_configuration(), Some(body)).await
    }

    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<Ticket, ApiError> {
        let payload = self.get_json(routes::ticket(&ticket_id.0)).await?;
        Ok(normalize::ticket(&payload)?)
    }

    async fn list_actas(&self) -> Result<Vec<Acta>, ApiError> {
        let payload = self.get_json(routes::actas()).await?;
        Ok(normalize::actas(&payload)?)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let payload = self.get_json(routes::conversations()).await?;
        Ok(normalize::conversations(&payload)?)
    }
}
