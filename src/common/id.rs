//! Kademlia node Id or a lookup target
use rand::Rng;
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};
use uuid::Uuid;

use crate::common::Distance;
use crate::{Error, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
/// Kademlia node Id or a lookup target.
///
/// Ids have no ordering of their own, compare their [Distance] to a target instead.
pub struct Id(pub [u8; ID_SIZE]);

impl Id {
    pub fn random() -> Id {
        let mut rng = rand::thread_rng();
        let random_bytes: [u8; ID_SIZE] = rng.gen();

        Id(random_bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE](crate::common::ID_SIZE).
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    /// Xor distance between this Id and another Id.
    ///
    /// Symmetric, and the distance to self is all zeros.
    pub fn distance(&self, other: &Id) -> Distance {
        let mut xor = [0_u8; ID_SIZE];

        for (i, byte) in xor.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Distance::from_bytes(xor)
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(bytes)
    }
}

impl FromStr for Id {
    type Err = Error;

    /// Parse the canonical (hyphenated uuid) form, for example
    /// `00000000-0000-0000-0000-000000000001`.
    fn from_str(s: &str) -> Result<Id> {
        let uuid = Uuid::parse_str(s)?;

        Ok(Id(uuid.into_bytes()))
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}
