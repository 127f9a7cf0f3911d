//! Authentication hook.
//!
//! Gridlock does not implement authentication itself — identity lives in
//! an external provider. The server calls this trait during the handshake
//! with whatever token the client presented; production wires it to a real
//! verifier, tests and the demo binary use permissive stand-ins.

use gridlock_protocol::PlayerId;

use crate::SessionError;

/// Validates a client's auth token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator instance is shared
/// by every connection-handler task for the server's lifetime.
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the player it belongs to.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] when the token is invalid, expired,
    /// or rejected by the provider.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<PlayerId, SessionError>> + Send;
}
