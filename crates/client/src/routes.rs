//! Backend paths. Owned by the backend; kept in one place so a path change
//! touches a single file.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    segments: Vec<String>,
}

impl Route {
    fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

const CLEARANCE: [&str; 2] = ["api", "paz-y-salvo"];

fn clearance(rest: &[&str]) -> Route {
    Route::new(CLEARANCE.iter().chain(rest.iter()).copied())
}

pub fn documents() -> Route {
    clearance(&[])
}

pub fn document(document_id: &str) -> Route {
    clearance(&[document_id])
}

pub fn signatures(document_id: &str) -> Route {
    clearance(&[document_id, "firmas"])
}

pub fn sign(document_id: &str, role_id: &str) -> Route {
    clearance(&[document_id, "firmas", role_id, "firmar"])
}

pub fn reject(document_id: &str, role_id: &str) -> Route {
    clearance(&[document_id, "firmas", role_id, "rechazar"])
}

pub fn observe(document_id: &str, signature_id: &str) -> Route {
    clearance(&[document_id, "firmas", signature_id, "observaciones"])
}

pub fn request_signature(document_id: &str, role_id: &str) -> Route {
    clearance(&[document_id, "firmas", role_id, "solicitar"])
}

pub fn send_to_signature(document_id: &str) -> Route {
    clearance(&[document_id, "enviar-firma"])
}

pub fn signed_pdf(document_id: &str, role_id: &str) -> Route {
    clearance(&[document_id, "firmas", role_id, "pdf"])
}

pub fn delegations() -> Route {
    clearance(&["delegaciones"])
}

pub fn delegation(delegation_id: &str) -> Route {
    clearance(&["delegaciones", delegation_id])
}

pub fn role_configuration() -> Route {
    clearance(&["configuracion-roles"])
}

pub fn ticket(ticket_id: &str) -> Route {
    Route::new(["api", "tickets", ticket_id])
}

pub fn actas() -> Route {
    Route::new(["api", "actas"])
}

pub fn conversations() -> Route {
    Route::new(["api", "chat", "conversaciones"])
}

#[cfg(test)]
mod tests {
    use super::{request_signature, send_to_signature, ticket};

    #[test]
    fn routes_render_as_paths() {
        assert_eq!(
            request_signature("PS-7", "RRHH").to_string(),
            "/api/paz-y-salvo/PS-7/firmas/RRHH/solicitar"
        );
        assert_eq!(send_to_signature("PS-7").to_string(), "/api/paz-y-salvo/PS-7/enviar-firma");
        assert_eq!(ticket("T-1").segments().len(), 3);
    }
}
