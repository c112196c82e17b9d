use crate::core::errors::Result;
use crate::core::services::stop_signal::StopHandle;

/// What a host supervisor (service manager, scheduler, container runtime)
/// needs from a long-running capture process.
pub trait Supervised {
    type Summary;

    /// Run in the foreground until stopped.
    fn start(&mut self) -> Result<Self::Summary>;

    /// Handle that can ask a running `start()` to return.
    fn stop_handle(&self) -> StopHandle;
}
