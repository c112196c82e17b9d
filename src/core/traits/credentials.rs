use std::fmt;

use crate::core::errors::Result;

/// A bearer token handed to a source adapter.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Port for acquiring credentials. Sources that talk to an authenticated
/// endpoint depend on this; the capture loop never does.
pub trait CredentialProvider: Send + Sync {
    /// Return a token valid for the next request.
    fn bearer_token(&self) -> Result<AccessToken>;
}

impl<T: CredentialProvider + ?Sized> CredentialProvider for Box<T> {
    fn bearer_token(&self) -> Result<AccessToken> {
        (**self).bearer_token()
    }
}
