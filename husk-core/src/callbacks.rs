//! Device-event callback list
//!
//! An unordered set of C callback pointers notified on graphics-context
//! lifecycle transitions. Removal swaps with the last entry, so it is O(1)
//! but does not preserve the order of what remains.

use husk_plugin_api::DeviceEventCallback;

/// Registered device-event callbacks.
///
/// Duplicate registrations are allowed and each fires. Identity is by
/// function address.
#[derive(Default)]
pub struct DeviceEventCallbacks {
    callbacks: Vec<DeviceEventCallback>,
}

impl DeviceEventCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback`. Registering the same callback twice makes it fire
    /// twice.
    pub fn add(&mut self, callback: DeviceEventCallback) {
        self.callbacks.push(callback);
    }

    /// Remove the first entry matching `callback` by address, swapping the
    /// last entry into its place. No-op when the callback is not registered.
    pub fn remove(&mut self, callback: DeviceEventCallback) {
        if let Some(position) = self
            .callbacks
            .iter()
            .position(|&registered| std::ptr::fn_addr_eq(registered, callback))
        {
            self.callbacks.swap_remove(position);
        }
    }

    /// Whether `callback` is currently registered.
    #[cfg(test)]
    pub fn contains(&self, callback: DeviceEventCallback) -> bool {
        self.callbacks
            .iter()
            .any(|&registered| std::ptr::fn_addr_eq(registered, callback))
    }

    /// Copy of the current list, in current order. Notification iterates a
    /// snapshot so a callback that mutates the list mid-notification cannot
    /// corrupt the iteration (its mutation takes effect for the next
    /// notification).
    pub fn snapshot(&self) -> Vec<DeviceEventCallback> {
        self.callbacks.clone()
    }

    /// Number of registered callbacks, duplicates included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}
