//! Lifecycle switches.

/// Behaviour switches for the order lifecycle engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Reject orders containing prescription-only medicines when no
    /// `prescriptionUrl` is given. Off by default: the mobile client checks it.
    pub enforce_prescription: bool,

    /// Make driver self-assignment force the order back to `confirmed`, as the
    /// legacy backend did. Off by default, which keeps the order `ready`.
    pub assign_driver_resets_status: bool,
}

impl LifecycleConfig {
    pub fn with_prescription_enforcement(mut self, enabled: bool) -> Self {
        self.enforce_prescription = enabled;
        self
    }

    pub fn with_assign_driver_reset(mut self, enabled: bool) -> Self {
        self.assign_driver_resets_status = enabled;
        self
    }
}
