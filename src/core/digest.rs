use std::fmt;

use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

// Wrapper for the blake2s digest of a circuit.
#[derive(Clone, Copy, PartialEq, Default, Eq, Hash, Deserialize, Serialize)]
pub struct CircuitDigest(pub [u8; 32]);

impl From<CircuitDigest> for [u8; 32] {
    fn from(val: CircuitDigest) -> Self {
        val.0
    }
}

impl AsRef<[u8]> for CircuitDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CircuitDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for CircuitDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <CircuitDigest as fmt::Display>::fmt(self, f)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Blake2sHasher {
    state: Blake2s256,
}

impl Blake2sHasher {
    pub fn new() -> Self {
        Self {
            state: Blake2s256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.state, data);
    }

    pub fn update_u64(&mut self, value: u64) {
        self.update(&value.to_le_bytes());
    }

    /// Absorbs a length-prefixed byte string so adjacent fields cannot run into each other.
    pub fn update_prefixed(&mut self, data: &[u8]) {
        self.update_u64(data.len() as u64);
        self.update(data);
    }

    pub fn finalize(self) -> CircuitDigest {
        CircuitDigest(self.state.finalize().into())
    }

    pub fn hash(data: &[u8]) -> CircuitDigest {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}
