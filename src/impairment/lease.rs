//! Exclusive interface ownership across controllers in one process

use crate::error::LeaseError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Registry of interfaces currently owned by an impairment controller.
#[derive(Debug, Clone, Default)]
pub struct InterfaceLeases {
    held: Arc<Mutex<HashSet<String>>>,
}

impl InterfaceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive ownership of `interface` until the lease is dropped.
    pub fn acquire(&self, interface: &str) -> Result<InterfaceLease, LeaseError> {
        let mut held = self.held.lock();
        if !held.insert(interface.to_string()) {
            return Err(LeaseError::InterfaceBusy(interface.to_string()));
        }
        debug!(interface, "interface lease acquired");
        Ok(InterfaceLease {
            interface: interface.to_string(),
            held: self.held.clone(),
        })
    }

    pub fn is_held(&self, interface: &str) -> bool {
        self.held.lock().contains(interface)
    }
}

#[derive(Debug)]
pub struct InterfaceLease {
    interface: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl InterfaceLease {
    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Drop for InterfaceLease {
    fn drop(&mut self) {
        self.held.lock().remove(&self.interface);
        debug!(interface = %self.interface, "interface lease released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let leases = InterfaceLeases::new();
        let lease = leases.acquire("tun0").unwrap();
        assert_eq!(
            leases.acquire("tun0").unwrap_err(),
            LeaseError::InterfaceBusy("tun0".into())
        );
        assert!(leases.acquire("tun1").is_ok());

        drop(lease);
        assert!(!leases.is_held("tun0"));
        assert!(leases.acquire("tun0").is_ok());
    }
}
