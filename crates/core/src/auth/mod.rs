mod none;
mod resolver;
mod session_token;
mod traits;
mod types;

pub use none::*;
pub use resolver::*;
pub use session_token::*;
pub use traits::*;
pub use types::*;

use crate::config::AuthConfig;

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::SessionToken => {
            if config.sessions.is_empty() {
                return Err(AuthError::Misconfigured(
                    "sessions must be set when using SessionToken auth method".to_string(),
                ));
            }
            Ok(Box::new(SessionTokenAuthenticator::from_config(
                &config.sessions,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthMethod, SessionConfig};

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            sessions: vec![],
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_session_token() {
        let config = AuthConfig {
            method: AuthMethod::SessionToken,
            sessions: vec![SessionConfig {
                token: "tok".to_string(),
                user_id: "admin".to_string(),
            }],
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "session_token");
    }

    #[test]
    fn test_create_authenticator_session_token_without_sessions() {
        let config = AuthConfig {
            method: AuthMethod::SessionToken,
            sessions: vec![],
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::Misconfigured(_))));
    }
}
