//! Bearer-token authentication for outbound requests.

use reqwest::RequestBuilder;

/// Opaque API token. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Decorates requests with `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: Credential,
}

impl Authenticator {
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// Adds the authorization header, marked sensitive, and leaves everything else untouched.
    pub fn decorate(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.credential.expose())
    }
}
