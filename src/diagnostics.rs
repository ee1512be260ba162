//! Live GPU resource accounting.
//!
//! Every asset-level GPU handle the engine hands out (shaders, textures,
//! meshes, models) carries a [`Tracked`] token registered with the context's
//! [`ResourceLedger`]. The token is released when the owning handle drops, so
//! the ledger always reflects what is still alive on the GPU side. Tests use
//! [`ResourceLedger::snapshot`] to check that setup/teardown cycles return to
//! their baseline.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Shader,
    Texture,
    Mesh,
    Model,
}

impl ResourceKind {
    const ALL: [ResourceKind; 4] = [
        ResourceKind::Shader,
        ResourceKind::Texture,
        ResourceKind::Mesh,
        ResourceKind::Model,
    ];

    fn slot(self) -> usize {
        match self {
            ResourceKind::Shader => 0,
            ResourceKind::Texture => 1,
            ResourceKind::Mesh => 2,
            ResourceKind::Model => 3,
        }
    }
}

/// Point-in-time copy of the live counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub shaders: usize,
    pub textures: usize,
    pub meshes: usize,
    pub models: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.shaders + self.textures + self.meshes + self.models
    }
}

#[derive(Debug, Default)]
pub struct ResourceLedger {
    live: [AtomicUsize; 4],
}

impl ResourceLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new live resource. The count drops again when the returned
    /// token is dropped.
    pub fn track(self: &Arc<Self>, kind: ResourceKind, label: &str) -> Tracked {
        let live = self.live[kind.slot()].fetch_add(1, Ordering::SeqCst) + 1;
        log::trace!("+{:?} '{}' ({} live)", kind, label, live);
        Tracked {
            ledger: Arc::clone(self),
            kind,
            label: label.to_string(),
        }
    }

    pub fn live(&self, kind: ResourceKind) -> usize {
        self.live[kind.slot()].load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ResourceCounts {
        ResourceCounts {
            shaders: self.live(ResourceKind::Shader),
            textures: self.live(ResourceKind::Texture),
            meshes: self.live(ResourceKind::Mesh),
            models: self.live(ResourceKind::Model),
        }
    }

    /// Log the current counts, warning about anything still alive.
    pub fn report(&self) {
        for kind in ResourceKind::ALL {
            let live = self.live(kind);
            if live > 0 {
                log::warn!("{} {:?} resource(s) still alive", live, kind);
            }
        }
        log::info!("GPU resources: {:?}", self.snapshot());
    }
}

/// Ledger entry owned by exactly one GPU handle.
#[derive(Debug)]
pub struct Tracked {
    ledger: Arc<ResourceLedger>,
    kind: ResourceKind,
    label: String,
}

impl Tracked {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let live = self.ledger.live[self.kind.slot()].fetch_sub(1, Ordering::SeqCst) - 1;
        log::trace!("-{:?} '{}' ({} live)", self.kind, self.label, live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_count_until_dropped() {
        let ledger = ResourceLedger::new();
        let shader = ledger.track(ResourceKind::Shader, "skybox");
        let cubemap = ledger.track(ResourceKind::Texture, "cubemap");
        let panorama = ledger.track(ResourceKind::Texture, "panorama");

        assert_eq!(ledger.live(ResourceKind::Texture), 2);
        drop(panorama);
        assert_eq!(
            ledger.snapshot(),
            ResourceCounts {
                shaders: 1,
                textures: 1,
                meshes: 0,
                models: 0
            }
        );

        drop(shader);
        drop(cubemap);
        assert_eq!(ledger.snapshot(), ResourceCounts::default());
        assert_eq!(ledger.snapshot().total(), 0);
    }

    #[test]
    fn token_remembers_kind_and_label() {
        let ledger = ResourceLedger::new();
        let token = ledger.track(ResourceKind::Mesh, "cube");
        assert_eq!(token.kind(), ResourceKind::Mesh);
        assert_eq!(token.label(), "cube");
    }

    #[test]
    fn ledgers_are_independent() {
        let a = ResourceLedger::new();
        let b = ResourceLedger::new();
        let _model = a.track(ResourceKind::Model, "skybox");
        assert_eq!(a.live(ResourceKind::Model), 1);
        assert_eq!(b.live(ResourceKind::Model), 0);
    }
}
