use serde::{Deserialize, Serialize};

/// Static description of one subservice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub port_offset: u16,
    /// Environment variable the subservice reads its listening port from.
    pub env_var: &'static str,
    /// Path segment of the subservice's public websocket address.
    pub route: &'static str,
}

pub const SLOTS: ServiceDescriptor = ServiceDescriptor {
    name: "slots",
    port_offset: 0,
    env_var: "SLOTS_PORT",
    route: "slots",
};

pub const CASINO: ServiceDescriptor = ServiceDescriptor {
    name: "casino",
    port_offset: 34,
    env_var: "SERVER_PORT",
    route: "casino",
};

pub const ARCADE: ServiceDescriptor = ServiceDescriptor {
    name: "arcade",
    port_offset: 43,
    env_var: "ARCADE_PORT",
    route: "arcade",
};

pub const DESCRIPTORS: [ServiceDescriptor; 3] = [SLOTS, CASINO, ARCADE];

const fn offsets_are_distinct(descriptors: &[ServiceDescriptor]) -> bool {
    let mut i = 0;
    while i < descriptors.len() {
        let mut j = i + 1;
        while j < descriptors.len() {
            if descriptors[i].port_offset == descriptors[j].port_offset {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    offsets_are_distinct(&DESCRIPTORS),
    "subservice port offsets must be distinct"
);

/// Largest offset among the known subservices.
pub const fn max_port_offset() -> u16 {
    let mut max = 0;
    let mut i = 0;
    while i < DESCRIPTORS.len() {
        if DESCRIPTORS[i].port_offset > max {
            max = DESCRIPTORS[i].port_offset;
        }
        i += 1;
    }
    max
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PortAllocation {
    pub name: String,
    pub env_var: String,
    pub port: u32,
}
