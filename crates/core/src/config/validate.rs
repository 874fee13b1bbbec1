use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - Session-token auth has at least one session, none with blank fields
/// - Server port is not 0
/// - Engine namespace and buffers are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth.method == AuthMethod::SessionToken {
        if config.auth.sessions.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.sessions must not be empty when using session_token auth".to_string(),
            ));
        }
        if config
            .auth
            .sessions
            .iter()
            .any(|s| s.token.trim().is_empty() || s.user_id.trim().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "auth.sessions entries need a token and a user_id".to_string(),
            ));
        }
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.engine.application_id.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.application_id cannot be empty".to_string(),
        ));
    }

    if config.engine.command_buffer == 0 || config.engine.snapshot_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "engine buffers must be at least 1".to_string(),
        ));
    }

    Ok(())
}
