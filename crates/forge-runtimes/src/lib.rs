//! Sandbox runtimes for Forge previews

mod native;
mod simulated;

pub use native::{detect_server_ready, strip_ansi, NodeRuntime};
pub use simulated::SimulatedRuntime;

use forge_core::{Orchestrator, OrchestratorOptions, RuntimeChoice, SandboxRuntime, SandboxSettings};
use tracing::{info, warn};

/// Pick a runtime for the configured choice.
///
/// `auto` probes the native toolchain and falls back to the simulated
/// runtime; `native` is returned as is so an unsupported environment shows
/// up as a failed session.
pub async fn create_runtime(settings: &SandboxSettings) -> Box<dyn SandboxRuntime> {
    let native = || NodeRuntime::new(settings.workdir.as_deref());
    match settings.runtime {
        RuntimeChoice::Native => Box::new(native()),
        RuntimeChoice::Simulated => Box::new(SimulatedRuntime::new()),
        RuntimeChoice::Auto => {
            let runtime = native();
            match runtime.check_support().await {
                Ok(()) => {
                    info!("Using native runtime in {}", runtime.workdir().display());
                    Box::new(runtime)
                }
                Err(e) => {
                    warn!("Native runtime unavailable ({}), using simulated runtime", e);
                    Box::new(SimulatedRuntime::new())
                }
            }
        }
    }
}

/// Orchestrator over the configured runtime
pub async fn create_orchestrator(settings: &SandboxSettings) -> Orchestrator {
    let runtime = create_runtime(settings).await;
    let options = OrchestratorOptions::from_settings(settings, runtime.kind());
    Orchestrator::new(runtime, options)
}
