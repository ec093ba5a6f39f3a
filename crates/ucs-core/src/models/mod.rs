pub mod outcome;
pub mod policy;
pub mod runtime_config;
pub mod service;
pub mod settings;
pub mod state;

pub use outcome::{ReadinessMode, StartupOutcome, StartupReport};
pub use policy::StartupPolicy;
pub use runtime_config::RuntimeConfig;
pub use service::{PortAllocation, ServiceDescriptor, ARCADE, CASINO, DESCRIPTORS, SLOTS};
pub use settings::SupervisorSettings;
pub use state::SupervisorState;
