//! Workspace extractor.
//!
//! Authentication and session management live in a separate service; by the
//! time a request reaches this API the gateway has resolved the caller's
//! workspace and forwards it in the `X-Workspace-Id` header. Handlers take
//! this extractor to scope every operation.

use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header::HeaderMap};
use crosspost_shared::ErrorResponse;
use uuid::Uuid;

/// Header carrying the caller's workspace.
pub static WORKSPACE_HEADER: &str = "X-Workspace-Id";
/// Header carrying the acting user, when the gateway forwards one.
pub static AUTHOR_HEADER: &str = "X-Author-Id";

/// The workspace a request operates in.
///
/// ```ignore
/// async fn list(workspace: WorkspaceContext) -> impl Responder {
///     format!("workspace {}", workspace.id)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceContext {
    pub id: Uuid,
    /// Acting user; falls back to the workspace id for single-user
    /// workspaces where the gateway sends no author header.
    pub author_id: Uuid,
}

/// Rejection for a missing or malformed workspace header.
#[derive(Debug)]
pub struct WorkspaceRejection(String);

impl std::fmt::Display for WorkspaceRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl actix_web::ResponseError for WorkspaceRejection {
    fn status_code(&self) -> actix_web::http::StatusCode {
        actix_web::http::StatusCode::BAD_REQUEST
    }

    fn error_response(&self) -> actix_web::HttpResponse {
        actix_web::HttpResponse::build(self.status_code())
            .json(ErrorResponse::bad_request(self.0.clone()))
    }
}

fn workspace_from_headers(headers: &HeaderMap) -> Result<WorkspaceContext, WorkspaceRejection> {
    let value = headers
        .get(WORKSPACE_HEADER)
        .ok_or_else(|| WorkspaceRejection(format!("Missing {} header", WORKSPACE_HEADER)))?;
    let raw = value
        .to_str()
        .map_err(|_| WorkspaceRejection(format!("Invalid {} header", WORKSPACE_HEADER)))?;
    let id = Uuid::parse_str(raw).map_err(|_| {
        WorkspaceRejection(format!("{} must be a UUID, got {:?}", WORKSPACE_HEADER, raw))
    })?;

    let author_id = match headers.get(AUTHOR_HEADER) {
        None => id,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| WorkspaceRejection(format!("{} must be a UUID", AUTHOR_HEADER)))?,
    };

    Ok(WorkspaceContext { id, author_id })
}

impl FromRequest for WorkspaceContext {
    type Error = WorkspaceRejection;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(workspace_from_headers(req.headers()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_a_valid_workspace_id() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((WORKSPACE_HEADER, id.to_string()))
            .to_http_request();
        let workspace = workspace_from_headers(req.headers()).unwrap();
        assert_eq!(workspace.id, id);
    }

    #[test]
    fn missing_header_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(workspace_from_headers(req.headers()).is_err());
    }

    #[test]
    fn malformed_header_is_rejected() {
        let req = TestRequest::default()
            .insert_header((WORKSPACE_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(workspace_from_headers(req.headers()).is_err());
    }
}
