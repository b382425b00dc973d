use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for stream ids derived from natural keys.
const STREAM_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_4d3a_5e90_8a41_c2f7_0b9d_13e5);

/// Identifier of an event stream (one aggregate instance).
///
/// Most streams get a random id. Streams that are addressed by a natural key
/// (a buyer's cart, the stock counter of a product) use [`AggregateId::derived`]
/// so every node computes the same id without a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id for `key` within `kind` (e.g. `("stock", "option:42")`).
    pub fn derived(kind: &str, key: &str) -> Self {
        let name = format!("{kind}/{key}");
        Self(Uuid::new_v5(&STREAM_NAMESPACE, name.as_bytes()))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}
