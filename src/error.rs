//! Error types
//!
//! Rotation rejection and partial portal penetration are ordinary outcomes and
//! never show up here. These variants mean a broken invariant in the link or
//! portal graph, or a bad lookup.

use thiserror::Error;

use crate::sim::{AtomRef, Side, WorldId};

/// Fatal simulation faults.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// An atom touched a second portal on a side that is already mid-transit.
    #[error("atom {atom} tried to go through two portals on its {side} side")]
    DoublePortal { atom: AtomRef, side: Side },
    /// Portal pairs whose orientations differ by 180° or 270°.
    #[error("unimplemented fling type {0}")]
    UnimplementedFling(u8),
    /// The child already has an owning link.
    #[error("atom {0} is already linked to a parent")]
    AlreadyLinked(AtomRef),
    /// The link would make the owner its own descendant.
    #[error("linking {owner} to {child} would create a cycle")]
    LinkCycle { owner: AtomRef, child: AtomRef },
    #[error("unknown world {0}")]
    UnknownWorld(WorldId),
    #[error("unknown atom {0}")]
    UnknownAtom(AtomRef),
}

pub type SimResult<T> = Result<T, SimError>;

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the settings file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed settings JSON.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
