//! Identifiers for authored entities and the entities of the host scene.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-unique identifier carried by every authored entity
/// (tree, group, node, link, parameter, condition, animation).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(pub u64);

impl Uid {
    pub const INVALID: Uid = Uid(u64::MAX);
    /// Reserved id of the built-in empty animation.
    pub const EMPTY_ANIMATION: Uid = Uid(0);

    /// Draw a fresh id. Random 64-bit ids keep newly authored entities from
    /// colliding with ids that were loaded from documents.
    #[inline]
    pub fn generate() -> Self {
        loop {
            let (hi, _) = Uuid::new_v4().as_u64_pair();
            let id = Uid(hi);
            if id != Self::INVALID && id != Self::EMPTY_ANIMATION {
                return id;
            }
        }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-side entity identifier. The runtime never owns entities; it only
/// addresses them through the scene collaborator traits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash, used to key component types by name.
pub fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
