use std::sync::atomic::{AtomicBool, Ordering};

use chatsync_common::Service;

/// Per-direction relay switches, keyed by destination service: pausing
/// `RuneScape` stops Discord → RuneScape forwarding.
#[derive(Debug, Default)]
pub struct PauseFlags {
    to_runescape: AtomicBool,
    to_discord: AtomicBool,
}

impl PauseFlags {
    fn flag(&self, destination: Service) -> &AtomicBool {
        match destination {
            Service::RuneScape => &self.to_runescape,
            Service::Discord => &self.to_discord,
        }
    }

    /// Returns `true` when the direction was not already paused.
    pub fn pause(&self, destination: Service) -> bool {
        !self.flag(destination).swap(true, Ordering::AcqRel)
    }

    /// Returns `true` when the direction was paused.
    pub fn resume(&self, destination: Service) -> bool {
        self.flag(destination).swap(false, Ordering::AcqRel)
    }

    pub fn is_paused(&self, destination: Service) -> bool {
        self.flag(destination).load(Ordering::Acquire)
    }
}
