use crate::{hash_preimage, pow::meets_difficulty};
use rayon::prelude::*;

/// Nonces each pool thread gets per search window.
const WINDOW_PER_THREAD: u64 = 4096;

/// Searches nonces after `start` across the rayon pool, wrapping around the
/// `u64` range, and returns the first one whose digest meets `difficulty`
/// together with that digest. `None` only if no other nonce qualifies.
pub(crate) fn search_parallel(prefix: &[u8], start: u64, difficulty: u32) -> Option<(u64, String)> {
    let nonce = first_match(start, |nonce| {
        meets_difficulty(&hash_preimage(prefix, nonce), difficulty)
    })?;
    Some((nonce, hash_preimage(prefix, nonce)))
}

/// Lowest offset from `start` whose nonce satisfies `hit`, scanned in windows
/// small enough that every thread works below the eventual winner.
fn first_match<F>(start: u64, hit: F) -> Option<u64>
where
    F: Fn(u64) -> bool + Sync,
{
    let window = WINDOW_PER_THREAD * rayon::current_num_threads().max(1) as u64;
    let mut lo = 1u64;
    loop {
        let hi = lo.saturating_add(window - 1);
        let found = (lo..=hi)
            .into_par_iter()
            .find_first(|offset| hit(start.wrapping_add(*offset)));
        if let Some(offset) = found {
            return Some(start.wrapping_add(offset));
        }
        if hi == u64::MAX {
            return None;
        }
        lo = hi + 1;
    }
}
