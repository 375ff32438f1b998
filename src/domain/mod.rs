//! Domain layer: business-level error taxonomy, money helpers, request context.

pub mod errors;
pub mod money;

pub use errors::ServiceError;

/// Explicit request context, filled in by the HTTP layer from headers set by
/// the upstream session middleware (which is outside this service).
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user_id: Option<i32>,
    pub role: Option<String>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }

    /// Fails with `Forbidden` unless the caller carries the admin role.
    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden)
        }
    }
}
