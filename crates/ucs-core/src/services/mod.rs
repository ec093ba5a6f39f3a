pub mod launcher;
pub mod ports;
pub mod process;
pub mod provisioner;
pub mod redirector;
pub mod shutdown;
pub mod supervisor;
