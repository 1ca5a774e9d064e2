use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Read side of the pause capability, as the orchestrator sees it.
pub trait PauseState: Send + Sync {
    fn is_paused(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct PauseSwitch {
    paused: AtomicBool,
}

impl PauseSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if already paused.
    pub fn pause(&self) -> bool {
        let changed = !self.paused.swap(true, Ordering::AcqRel);
        if changed {
            info!("Purchases paused");
        }
        changed
    }

    /// Returns false if not paused.
    pub fn unpause(&self) -> bool {
        let changed = self.paused.swap(false, Ordering::AcqRel);
        if changed {
            info!("Purchases resumed");
        }
        changed
    }
}

impl PauseState for PauseSwitch {
    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_toggle() {
        let switch = PauseSwitch::new();
        assert!(!switch.is_paused());
        assert!(switch.pause());
        assert!(!switch.pause());
        assert!(switch.is_paused());
        assert!(switch.unpause());
        assert!(!switch.unpause());
    }
}
