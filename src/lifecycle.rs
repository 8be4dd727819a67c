//! Render surface lifecycle.
//!
//! The surface is either usable or lost. Losing it only stops draws; the render
//! loop keeps ticking. Once the host reports the context as restored the
//! application is reloaded from scratch instead of patching GPU state back in
//! place, so every resource is recreated against the new context.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Active,
    Lost,
}

/// What the host has to do after a lifecycle event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    None,
    Reload,
}

#[derive(Debug)]
pub struct Lifecycle {
    state: SurfaceState,
    losses: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SurfaceState::Active,
            losses: 0,
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn can_draw(&self) -> bool {
        self.state == SurfaceState::Active
    }

    /// How often the surface went away during this session.
    pub fn losses(&self) -> u32 {
        self.losses
    }

    pub fn surface_lost(&mut self) {
        if self.state == SurfaceState::Lost {
            return;
        }
        log::warn!("Render surface lost. Skipping draws until it is restored");
        self.state = SurfaceState::Lost;
        self.losses += 1;
    }

    pub fn surface_restored(&mut self) -> LifecycleAction {
        match self.state {
            SurfaceState::Lost => {
                log::info!("Render surface restored. Reloading");
                LifecycleAction::Reload
            }
            SurfaceState::Active => {
                log::debug!("Ignoring restore for a surface that was never lost");
                LifecycleAction::None
            }
        }
    }
}
