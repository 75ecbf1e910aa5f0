//! Ownership of creator-owned native handles.
//!
//! [`OwnedHandle`] is the single lifecycle implementation shared by every
//! resource kind: it releases exactly once, treats a second release as a
//! no-op, refuses native access afterwards and releases on drop when the
//! owner never did.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clnet_sys::{ClApi, InfoTarget, NativeHandle, ResourceKind};
use tracing::{debug, warn};

use crate::error::{ClError, Result};
use crate::property::InfoContainer;

/// A native handle owning one native reference.
///
/// Concurrent [`OwnedHandle::release`] calls are resolved by a
/// compare-and-swap on the release flag: exactly one of them reaches the
/// native layer. Any other native call racing with a release remains the
/// caller's responsibility.
pub struct OwnedHandle {
    api: Arc<dyn ClApi>,
    kind: ResourceKind,
    handle: NativeHandle,
    released: AtomicBool,
}

impl OwnedHandle {
    /// Take ownership of a handle fresh from a successful native create.
    pub(crate) fn new(api: Arc<dyn ClApi>, kind: ResourceKind, handle: NativeHandle) -> Self {
        debug!(%kind, %handle, "created");
        Self { api, kind, handle, released: AtomicBool::new(false) }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn api(&self) -> &Arc<dyn ClApi> {
        &self.api
    }

    /// The native handle, or [`ClError::UseAfterRelease`] once released.
    pub fn handle(&self) -> Result<NativeHandle> {
        if self.is_released() {
            return Err(ClError::UseAfterRelease { kind: self.kind });
        }
        Ok(self.handle)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Info container for `target(handle)`, guarded by the release flag.
    pub(crate) fn container(
        &self,
        target: impl FnOnce(NativeHandle) -> InfoTarget,
    ) -> Result<InfoContainer<'_>> {
        Ok(InfoContainer::new(self.api.as_ref(), target(self.handle()?)))
    }

    /// Release the native reference.
    ///
    /// The first call performs the native release and reports its failure as
    /// [`ClError::ReleaseFailed`]. The flag is set either way, so every later
    /// call is a silent no-op.
    pub fn release(&self) -> Result<()> {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }
        let status = self.api.release(self.kind, self.handle);
        if !status.is_success() {
            return Err(ClError::ReleaseFailed { kind: self.kind, status });
        }
        debug!(kind = %self.kind, handle = %self.handle, "released");
        Ok(())
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if *self.released.get_mut() {
            return;
        }
        *self.released.get_mut() = true;
        let status = self.api.release(self.kind, self.handle);
        if !status.is_success() {
            warn!(kind = %self.kind, handle = %self.handle, %status, "release on drop failed");
        }
    }
}

impl fmt::Debug for OwnedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("kind", &self.kind)
            .field("handle", &self.handle)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clnet_sys::Status;
    use clnet_test_support::{SimulatedCl, simulated};

    fn context(sim: &SimulatedCl, api: &Arc<dyn ClApi>) -> OwnedHandle {
        let raw = api.create_context(None, &sim.device_handles()).unwrap();
        OwnedHandle::new(api.clone(), ResourceKind::Context, raw)
    }

    #[test]
    fn second_release_is_silent() {
        let (sim, api) = simulated(SimulatedCl::default());
        let owned = context(&sim, &api);
        owned.release().unwrap();
        owned.release().unwrap();
        assert_eq!(sim.release_calls(ResourceKind::Context), 1);
    }

    #[test]
    fn failed_release_is_reported_once() {
        let (sim, api) = simulated(SimulatedCl::default());
        let owned = context(&sim, &api);
        sim.fail_releases(ResourceKind::Context, Status::INVALID_CONTEXT);
        let err = owned.release().unwrap_err();
        assert!(matches!(
            err,
            ClError::ReleaseFailed { kind: ResourceKind::Context, status: Status::INVALID_CONTEXT }
        ));
        owned.release().unwrap();
        drop(owned);
        assert_eq!(sim.release_calls(ResourceKind::Context), 1);
    }

    #[test]
    fn drop_releases_unreleased_handle() {
        let (sim, api) = simulated(SimulatedCl::default());
        let owned = context(&sim, &api);
        let raw = owned.handle().unwrap();
        drop(owned);
        assert!(!sim.is_live(raw));
        assert_eq!(sim.release_calls(ResourceKind::Context), 1);
    }

    #[test]
    fn handle_is_refused_after_release() {
        let (sim, api) = simulated(SimulatedCl::default());
        let owned = context(&sim, &api);
        owned.release().unwrap();
        assert!(matches!(
            owned.handle(),
            Err(ClError::UseAfterRelease { kind: ResourceKind::Context })
        ));
        assert!(owned.container(InfoTarget::Context).is_err());
    }

    #[test]
    fn concurrent_release_reaches_native_once() {
        let (sim, api) = simulated(SimulatedCl::default());
        let owned = Arc::new(context(&sim, &api));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let owned = Arc::clone(&owned);
                std::thread::spawn(move || owned.release())
            })
            .collect();
        for t in threads {
            t.join().unwrap().unwrap();
        }
        assert_eq!(sim.release_calls(ResourceKind::Context), 1);
    }
}
