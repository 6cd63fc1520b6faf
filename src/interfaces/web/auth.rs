use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use tracing::{debug, warn};

use super::AppState;
use crate::core::history::IdentityUser;

/// Administrators; admitted only where a gate lists this group.
pub const ADMIN_GROUP: &str = "admin";

/// Groups allowed to validate a bulk upload.
pub const BULK_VALIDATE_GROUPS: &[&str] =
    &["Circlecoordinator", "Surveycoordinator", "designcoordinator"];

/// Groups allowed to start processes from a bulk upload.
pub const BULK_START_GROUPS: &[&str] = &[ADMIN_GROUP, "Circlecoordinator", "Surveycoordinator"];

/// Groups allowed to delete, export and browse process data.
pub const DESIGN_COORDINATOR_GROUPS: &[&str] = &["designcoordinator"];

/// The authenticated engine user, attached to every authed request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub IdentityUser);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn in_any(&self, groups: &[&str]) -> bool {
        self.0
            .groups
            .iter()
            .any(|g| groups.contains(&g.as_str()))
    }
}

/// Role gate for handlers: `Err` carries the 403 response.
pub fn require_groups(user: &CurrentUser, groups: &[&str]) -> Result<(), Response> {
    if user.in_any(groups) {
        return Ok(());
    }
    debug!(user = %user.id(), "Role gate refused request");
    Err((
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "success": false, "error": "Access denied" })),
    )
        .into_response())
}

/// `(username, password)` from a `Basic` authorization header.
fn basic_credentials(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?.trim();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn unauthorized(message: &str) -> Response {
    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "success": false, "error": message })),
    )
        .into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"qed\""),
    );
    response
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let credentials = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_credentials);

    let Some((username, password)) = credentials else {
        return unauthorized("Missing or invalid Authorization header. Use: Basic <credentials>");
    };

    match state.history.authenticate(&username, &password).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Ok(None) => unauthorized("Invalid username or password"),
        Err(e) => {
            warn!("Authentication lookup failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "success": false, "error": "Identity store unavailable" })),
            )
                .into_response()
        }
    }
}
