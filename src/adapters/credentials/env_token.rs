use crate::core::errors::{CaptureError, Result};
use crate::core::traits::credentials::{AccessToken, CredentialProvider};

/// Default variable holding the bearer token.
pub const DEFAULT_TOKEN_ENV: &str = "QHLOG_ACCESS_TOKEN";

/// Reads the token from an environment variable on every request, so a
/// token refreshed by an external helper is picked up without a restart.
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_ENV)
    }
}

impl CredentialProvider for EnvTokenProvider {
    fn bearer_token(&self) -> Result<AccessToken> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(AccessToken::new(value.trim())),
            Ok(_) => Err(CaptureError::Authentication {
                reason: format!("environment variable {} is empty", self.var),
            }),
            Err(_) => Err(CaptureError::Authentication {
                reason: format!("environment variable {} is not set", self.var),
            }),
        }
    }
}

/// A fixed token, e.g. one read from the config file.
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_an_authentication_error() {
        let provider = EnvTokenProvider::new("QHLOG_TEST_TOKEN_THAT_IS_NEVER_SET_7F3A");
        let err = provider.bearer_token().unwrap_err();
        assert!(matches!(err, CaptureError::Authentication { .. }));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn static_token_is_returned_as_is() {
        let provider = StaticTokenProvider::new("abc123");
        assert_eq!(provider.bearer_token().unwrap().secret(), "abc123");
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let token = AccessToken::new("super-secret");
        assert!(!format!("{token:?}").contains("super-secret"));
    }
}
