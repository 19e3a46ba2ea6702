//! Device lifecycle state.

/// `Uninitialized -> Created -> Lost -> Created -> Destroyed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeviceState {
    #[default]
    Uninitialized,
    Created,
    /// Native resources are gone; waiting for `on_device_restored`.
    Lost,
    Destroyed,
}

impl DeviceState {
    /// Native calls are valid.
    pub fn is_ready(self) -> bool {
        self == Self::Created
    }

    pub fn can_create(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        assert!(DeviceState::default().can_create());
        assert!(!DeviceState::Created.can_create());
        assert!(!DeviceState::Lost.can_create());
        assert!(DeviceState::Destroyed.can_create());
        assert!(DeviceState::Created.is_ready());
        assert!(!DeviceState::Lost.is_ready());
    }
}
