//! Token verification hook.
//!
//! The relay consults a [`TokenVerifier`] while a connection is still in the
//! connecting state. [`AllowAll`] is the default and accepts every
//! connection, with or without a token.

use std::collections::HashSet;

/// Decides whether a connection's token is acceptable.
pub trait TokenVerifier: Send + Sync {
    /// `token` is `None` when the connection URL carried no token.
    fn verify(&self, token: Option<&str>) -> bool;
}

/// Accepts every connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl TokenVerifier for AllowAll {
    fn verify(&self, _token: Option<&str>) -> bool {
        true
    }
}

/// Accepts only tokens from a fixed set. A missing token is rejected.
#[derive(Clone, Debug, Default)]
pub struct StaticTokens {
    tokens: HashSet<String>,
}

impl StaticTokens {
    /// Build a verifier from the accepted tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl TokenVerifier for StaticTokens {
    fn verify(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| self.tokens.contains(t))
    }
}
