use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use casewell_core::{AppError, DomainName, UserIdentity};

use crate::error::ApiResult;
use crate::state::AppState;

/// Header carrying the subject the calling service acts for.
pub const SUBJECT_HEADER: &str = "x-casewell-subject";

/// Subject authenticated by [`require_service_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject(pub String);

impl AuthenticatedSubject {
    /// Binds the subject to the domain addressed by the request path.
    pub fn identity_in(&self, domain: &str) -> ApiResult<UserIdentity> {
        let domain = DomainName::new(domain)?;
        Ok(UserIdentity::new(self.0.as_str(), self.0.as_str(), domain))
    }
}

pub async fn require_service_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let subject = authenticate(request.headers(), &state.api_shared_secret)?;

    request.extensions_mut().insert(subject);
    Ok(next.run(request).await)
}

fn authenticate(headers: &HeaderMap, shared_secret: &str) -> Result<AuthenticatedSubject, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("bearer token required".to_owned()))?;

    if !secrets_match(token.as_bytes(), shared_secret.as_bytes()) {
        return Err(AppError::Unauthorized("invalid bearer token".to_owned()));
    }

    let subject = headers
        .get(SUBJECT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{SUBJECT_HEADER} header required")))?;

    Ok(AuthenticatedSubject(subject.to_owned()))
}

fn secrets_match(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
            == 0
}
