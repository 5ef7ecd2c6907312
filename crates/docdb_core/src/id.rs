//! Document id generation.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHANUM: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generates a 12-character document id: 8 characters of the
/// seconds-granularity clock in base-62, then 4 uniformly random
/// alphanumerics.
///
/// Collisions are not detected; callers that need collision resistance
/// must supply their own ids.
#[must_use]
pub fn generate_id() -> String {
    let mut id = String::with_capacity(12);

    let mut seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    for _ in 0..8 {
        id.push(ALPHANUM[(seconds % 62) as usize] as char);
        seconds /= 62;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..4 {
        id.push(ALPHANUM[rng.gen_range(0..62)] as char);
    }

    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_and_charset() {
        let id = generate_id();
        assert_eq!(id.len(), 12);
        assert!(id.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn same_second_shares_prefix() {
        let a = generate_id();
        let b = generate_id();
        // The clock prefix only changes across second boundaries.
        if a[..8] == b[..8] {
            return;
        }
        let c = generate_id();
        assert_eq!(b[..8], c[..8]);
    }

    #[test]
    fn random_suffix_varies() {
        let ids: std::collections::HashSet<String> =
            (0..64).map(|_| generate_id()).collect();
        // 4 random base-62 chars; 64 draws colliding entirely is
        // vanishingly unlikely.
        assert!(ids.len() > 1);
    }
}
