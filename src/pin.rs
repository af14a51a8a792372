//! Key pinning: reorder an identity list so one key comes first
//!
//! Many SSH clients simply try the agent's keys in the order offered.
//! Moving a key to the front of the list is therefore enough to pin it.

use crate::protocol::Identity;

/// Move the identity whose key blob equals `target_key` to the front.
///
/// Pure and deterministic: the relative order of all non-matching
/// identities is preserved (a stable partition, not a sort). If no
/// identity matches, the list is returned unchanged. This runs fresh on
/// every intercepted response; results are never cached.
pub fn pin_first(mut identities: Vec<Identity>, target_key: &[u8]) -> Vec<Identity> {
    if let Some(idx) = identities
        .iter()
        .position(|id| id.key_blob.as_ref() == target_key)
    {
        let target = identities.remove(idx);
        identities.insert(0, target);
    }
    identities
}
