//! Opaque bearer credential shared by the Lark and Keycloak clients

use std::fmt;

/// Bearer token fetched fresh for every sync operation.
///
/// Never cached across events; expiry is the issuer's concern.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}
