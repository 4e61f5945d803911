//! Runtime permission port.

/// Host permission state, queried fresh on every decision.
pub trait PermissionProvider: Send + Sync {
    fn is_location_granted(&self) -> bool;
    fn is_notification_granted(&self) -> bool;

    /// Monitoring needs both grants.
    fn is_all_granted(&self) -> bool {
        self.is_location_granted() && self.is_notification_granted()
    }
}

/// Permission-prompt collaborator.
///
/// Called when monitoring is needed but grants are missing. The core never
/// retries on its own after a prompt.
pub trait PermissionPrompt: Send + Sync {
    fn request_permissions(&self);
}
