use axum::http::HeaderMap;
use drugsy::personalization::Caller;

use crate::configuration::AuthSettings;

/// Resolves the caller for a request. Token issuance and verification are an
/// external collaborator's concern; this trait is the seam the server
/// consumes. An unresolved caller means an anonymous session with the
/// default instruction.
pub trait Identity: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Caller>;
}

/// Every request is anonymous.
pub struct NoIdentity;

impl Identity for NoIdentity {
    fn resolve(&self, _headers: &HeaderMap) -> Option<Caller> {
        None
    }
}

/// Maps one static bearer token to one configured caller. A development
/// stand-in for the real JWT verifier.
pub struct TokenIdentity {
    token: String,
    caller: Caller,
}

impl TokenIdentity {
    pub fn new(token: String, caller: Caller) -> Self {
        Self { token, caller }
    }

    /// Build from settings; `None` when no token is configured.
    pub fn from_settings(settings: &AuthSettings) -> Option<Self> {
        let token = settings.token.clone()?;
        Some(TokenIdentity::new(
            token,
            Caller {
                id: settings.caller_id,
                name: settings
                    .caller_name
                    .clone()
                    .unwrap_or_else(|| "Doctor".to_string()),
            },
        ))
    }
}

impl Identity for TokenIdentity {
    fn resolve(&self, headers: &HeaderMap) -> Option<Caller> {
        let header = headers.get("Authorization")?.to_str().ok()?;
        let presented = header.strip_prefix("Bearer ")?;
        if presented == self.token {
            Some(self.caller.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> TokenIdentity {
        TokenIdentity::new(
            "secret".into(),
            Caller {
                id: 7,
                name: "Alex Doe".into(),
            },
        )
    }

    #[test]
    fn matching_token_resolves_the_caller() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer secret".parse().unwrap());
        let caller = identity().resolve(&headers).unwrap();
        assert_eq!(caller.id, 7);
        assert_eq!(caller.name, "Alex Doe");
    }

    #[test]
    fn wrong_or_missing_token_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer wrong".parse().unwrap());
        assert!(identity().resolve(&headers).is_none());
        assert!(identity().resolve(&HeaderMap::new()).is_none());
    }
}
