//! Port identity, direction, and the per-client registry.
//!
//! The registry keeps two views: an `ArcSwap` snapshot of serviced ports the
//! period callback reads lock-free, and a locked list for application-side
//! queries.

use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use patchline_midi::PortId;
use std::sync::Arc;

/// The most ports one client will service; registration past this fails.
pub const MAX_PORTS_PER_CLIENT: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

#[derive(Clone, Debug)]
pub struct PortInfo {
    pub id: PortId,
    pub name: String,
    pub direction: PortDirection,
    /// Registered by this client and serviced every period, as opposed to a
    /// discovered port usable only as a connection endpoint.
    pub owned: bool,
}

/// Identity and direction of one serviced port, as read by the callback.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ServicedPort {
    pub id: PortId,
    pub direction: PortDirection,
}

pub(crate) struct PortRegistry {
    serviced: Arc<ArcSwap<Vec<ServicedPort>>>,
    owned: RwLock<Vec<PortInfo>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            serviced: Arc::new(ArcSwap::from_pointee(Vec::new())),
            owned: RwLock::new(Vec::new()),
        }
    }

    /// Add an owned port to the serviced set.
    pub fn register(&self, info: PortInfo) -> Result<()> {
        let mut owned = self.owned.write();
        if owned.len() >= MAX_PORTS_PER_CLIENT {
            return Err(Error::TooManyPorts {
                max: MAX_PORTS_PER_CLIENT,
            });
        }
        let current = self.serviced.load();
        let mut next = (**current).clone();
        next.push(ServicedPort {
            id: info.id,
            direction: info.direction,
        });
        self.serviced.store(Arc::new(next));
        owned.push(info);
        Ok(())
    }

    /// Shared handle to the serviced-port snapshot, for the callback.
    pub fn serviced_handle(&self) -> Arc<ArcSwap<Vec<ServicedPort>>> {
        Arc::clone(&self.serviced)
    }

    pub fn owned_ports(&self) -> Vec<PortInfo> {
        self.owned.read().clone()
    }

    pub fn is_owned(&self, id: PortId) -> bool {
        self.owned.read().iter().any(|info| info.id == id)
    }

    pub fn owned_count(&self) -> usize {
        self.owned.read().len()
    }
}
