use sha2::{Digest, Sha256};

/// Deterministically shuffle a round's participants.
///
/// The seed is the SHA-256 of the decimal round number, re-hashed after every
/// four swaps. Each pass of four swaps is followed by one untouched index.
pub fn shuffle_for_round<T>(round: u64, items: &mut [T]) {
    let count = items.len();
    if count == 0 {
        return;
    }

    let mut seed: [u8; 32] = Sha256::digest(round.to_string().as_bytes()).into();
    let mut i = 0;
    while i < count {
        let mut x = 0;
        while x < 4 && i < count {
            let target = usize::from(seed[x]) % count;
            items.swap(target, i);
            i += 1;
            x += 1;
        }
        seed = Sha256::digest(seed).into();
        i += 1;
    }
}
