use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use http::StatusCode;
use http::header::AUTHORIZATION;

use crate::util::constant_time_cmp;
use crate::util::env::Var;
use crate::var;

/// Gates the write routes: only internal services holding the shared
/// token may award points or record challenge progress. End users never
/// talk to this service directly. The credential may be the bare token
/// or carry an RFC 6750 `Bearer` scheme.
pub async fn verify_internal_ident(req: Request, next: Next) -> Result<Response, StatusCode> {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(presented_token)
        .map(str::to_owned)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let expected = var!(Var::InternalToken)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if constant_time_cmp(&presented, expected) {
        Ok(next.run(req).await)
    } else {
        tracing::warn!("rejected write with a bad internal token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

/// Strips an optional `Bearer ` scheme; an empty credential is treated
/// the same as a missing header
fn presented_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod test {
    use super::presented_token;

    #[test]
    fn test_presented_token_accepts_bare_and_bearer_forms() {
        assert_eq!(presented_token("sekrit"), Some("sekrit"));
        assert_eq!(presented_token("Bearer sekrit"), Some("sekrit"));
        assert_eq!(presented_token("Bearer  sekrit "), Some("sekrit"));
    }

    #[test]
    fn test_presented_token_rejects_empty_credentials() {
        assert_eq!(presented_token(""), None);
        assert_eq!(presented_token("   "), None);
        assert_eq!(presented_token("Bearer "), None);
    }
}
