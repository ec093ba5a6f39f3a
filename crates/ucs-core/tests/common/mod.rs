// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ucs_core::models::{ServiceDescriptor, SupervisorSettings, ARCADE, CASINO, DESCRIPTORS, SLOTS};
use ucs_core::services::launcher::{LaunchContext, Readiness, Subservice};
use ucs_core::SupervisorError;

pub const SETTLE: Duration = Duration::from_millis(1000);

/// Settings rooted in `dir` that leave the process environment alone.
pub fn isolated_settings(dir: &Path) -> SupervisorSettings {
    SupervisorSettings {
        config_path: dir.join("socket_config.json"),
        settle_delay: SETTLE,
        process_hooks: false,
        ..SupervisorSettings::default()
    }
}

/// Entry point that starts fine and counts its invocations.
pub fn healthy(descriptor: ServiceDescriptor, calls: &Arc<AtomicUsize>) -> Subservice {
    let calls = Arc::clone(calls);
    Subservice::from_fn(descriptor, move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Readiness::Unsignaled)
    })
}

/// Entry point that fails synchronously with `message`.
pub fn broken(descriptor: ServiceDescriptor, message: &'static str) -> Subservice {
    Subservice::from_fn(descriptor, move |ctx| {
        Err(SupervisorError::launch(ctx.service.name, message))
    })
}

/// Entry point that records the context it was started with.
pub fn recording(descriptor: ServiceDescriptor, seen: &Arc<Mutex<Vec<LaunchContext>>>) -> Subservice {
    let seen = Arc::clone(seen);
    Subservice::from_fn(descriptor, move |ctx| {
        seen.lock().unwrap().push(ctx.clone());
        Ok(Readiness::Unsignaled)
    })
}

pub fn all_healthy(calls: &Arc<AtomicUsize>) -> Vec<Subservice> {
    DESCRIPTORS.iter().map(|d| healthy(*d, calls)).collect()
}

/// Slots and Arcade healthy, Casino broken.
pub fn casino_broken(calls: &Arc<AtomicUsize>) -> Vec<Subservice> {
    vec![
        healthy(SLOTS, calls),
        broken(CASINO, "cannot load game tables"),
        healthy(ARCADE, calls),
    ]
}
