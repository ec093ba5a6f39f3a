use crate::models::{PortAllocation, ServiceDescriptor};

/// Listening port of a subservice: the base port plus its fixed offset.
///
/// Not range-checked; a result above 65535 is reported by the launcher as
/// that subservice's startup failure.
pub fn derive(base_port: u16, offset: u16) -> u32 {
    u32::from(base_port) + u32::from(offset)
}

/// Derives per-subservice ports from one base port.
#[derive(Debug, Clone, Copy)]
pub struct PortAllocator {
    base_port: u16,
}

impl PortAllocator {
    pub fn new(base_port: u16) -> Self {
        Self { base_port }
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn port_for(&self, descriptor: &ServiceDescriptor) -> u32 {
        derive(self.base_port, descriptor.port_offset)
    }

    pub fn allocate(&self, descriptors: &[ServiceDescriptor]) -> Vec<PortAllocation> {
        descriptors
            .iter()
            .map(|d| PortAllocation {
                name: d.name.to_string(),
                env_var: d.env_var.to_string(),
                port: self.port_for(d),
            })
            .collect()
    }
}

/// Expose a subservice's port through its environment variable.
pub fn publish(env_var: &str, port: u32) {
    std::env::set_var(env_var, port.to_string());
}
