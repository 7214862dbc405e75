use async_trait::async_trait;

/// Outcome of a capture authorization request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// Refused, and the platform will not prompt again.
    PermanentlyDenied,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Obtains capture authorization from the platform.
#[async_trait]
pub trait PermissionHandler: Send + Sync + 'static {
    async fn request_capture_permission(&self) -> PermissionStatus;
}

/// Permission handler for hosts without a capture permission model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoGrant;

#[async_trait]
impl PermissionHandler for AutoGrant {
    async fn request_capture_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }
}
