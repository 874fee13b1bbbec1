//! Session token authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::config::SessionConfig;
use crate::ticket::UserId;

/// Authenticator that resolves a session token to the user it was issued for.
///
/// Accepts the token in either:
/// - `Authorization: Bearer <token>` header
/// - `X-Session-Token: <token>` header
pub struct SessionTokenAuthenticator {
    sessions: Vec<(String, UserId)>,
}

impl SessionTokenAuthenticator {
    pub fn new(sessions: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
        }
    }

    pub fn from_config(sessions: &[SessionConfig]) -> Self {
        Self::new(
            sessions
                .iter()
                .map(|s| (s.token.clone(), UserId::new(s.user_id.clone()))),
        )
    }

    fn extract_token<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(auth_header) = request.headers.get("authorization") {
            if let Some(token) = auth_header
                .strip_prefix("Bearer ")
                .or_else(|| auth_header.strip_prefix("bearer "))
            {
                return Some(token.trim());
            }
        }

        request
            .headers
            .get("x-session-token")
            .map(|token| token.trim())
    }

    /// Look up the user for a token. Every configured token is compared so
    /// the time taken does not depend on which one matched.
    fn lookup(&self, token: &str) -> Option<&UserId> {
        let mut found = None;
        for (candidate, user_id) in &self.sessions {
            if constant_time_eq(candidate.as_bytes(), token.as_bytes()) {
                found = Some(user_id);
            }
        }
        found
    }
}

#[async_trait]
impl Authenticator for SessionTokenAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let token = self
            .extract_token(request)
            .ok_or(AuthError::MissingToken)?;

        match self.lookup(token) {
            Some(user_id) => Ok(Identity::new(user_id.clone(), self.method_name())),
            None => Err(AuthError::UnknownSession(
                "Unknown or expired session".to_string(),
            )),
        }
    }

    fn method_name(&self) -> &'static str {
        "session_token"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn authenticator() -> SessionTokenAuthenticator {
        SessionTokenAuthenticator::new(vec![
            ("tok-alice".to_string(), UserId::new("alice")),
            ("tok-bob".to_string(), UserId::new("bob")),
        ])
    }

    fn make_request(headers: Vec<(&str, &str)>) -> AuthRequest {
        AuthRequest {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_resolves_user() {
        let request = make_request(vec![("Authorization", "Bearer tok-bob")]);

        let identity = authenticator().authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id.as_str(), "bob");
        assert_eq!(identity.method, "session_token");
    }

    #[tokio::test]
    async fn test_session_header_resolves_user() {
        let request = make_request(vec![("X-Session-Token", "tok-alice")]);

        let identity = authenticator().authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_bearer_lowercase() {
        let request = make_request(vec![("Authorization", "bearer tok-alice")]);
        let identity = authenticator().authenticate(&request).await.unwrap();
        assert_eq!(identity.user_id.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let request = make_request(vec![("Authorization", "Bearer tok-mallory")]);

        let result = authenticator().authenticate(&request).await;

        assert!(matches!(result, Err(AuthError::UnknownSession(_))));
    }

    #[tokio::test]
    async fn test_missing_header() {
        let result = authenticator().authenticate(&make_request(vec![])).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[test]
    fn test_from_config() {
        let auth = SessionTokenAuthenticator::from_config(&[SessionConfig {
            token: "t".to_string(),
            user_id: "carol".to_string(),
        }]);
        assert_eq!(auth.lookup("t").map(UserId::as_str), Some("carol"));
        assert!(auth.lookup("x").is_none());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
