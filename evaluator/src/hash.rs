use std::fmt;
use std::hash::Hasher;

use siphasher::sip128::{Hasher128, SipHasher13};

/// Digest of a document's full text. Two versions with equal hashes are
/// treated as the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash(pub u128);

/// A pure function from document text to its digest.
pub type ContentHasher = fn(&str) -> ContentHash;

/// Produce a 128-bit SipHash of a document's text.
pub fn sip_hash(content: &str) -> ContentHash {
    let mut state = SipHasher13::new();
    state.write(content.as_bytes());
    ContentHash(state.finish128().as_u128())
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}
