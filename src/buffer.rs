// ── Adaptive buffers ──────────────────────────────────────────────────────────
//
// Many OS queries cannot say up front how much room they need: they fill what
// they are given and report a count.  A count equal to the capacity is
// ambiguous (exact fit or truncation), so the buffer doubles and the query is
// repeated until the count comes back strictly smaller.
//
// Fillers must report a count strictly smaller than the capacity once they
// are fully satisfied.  Growth is capped at `max` elements so that a filler
// which always saturates turns into `Error::CapacityExceeded` instead of
// unbounded allocation.

use tracing::trace;

use crate::error::{Error, Result};

/// Fill `buf` through `filler`, doubling its length until the filler reports
/// a count below the capacity it was given.
///
/// `buf` is first grown to `seed` elements if shorter.  Returns the final
/// count; `0` means the callee had nothing to report (or failed in a way it
/// signals with zero).
pub fn grow_and_retry_fill<T, F>(
    buf: &mut Vec<T>,
    seed: usize,
    max: usize,
    mut filler: F,
) -> Result<usize>
where
    T: Clone + Default,
    F: FnMut(&mut [T]) -> usize,
{
    try_grow_and_retry_fill(buf, seed, max, |slice| Ok(filler(slice)))
}

/// Fallible form of [`grow_and_retry_fill`]: an `Err` from the filler stops
/// the loop and is returned unchanged.
pub fn try_grow_and_retry_fill<T, F>(
    buf: &mut Vec<T>,
    seed: usize,
    max: usize,
    mut filler: F,
) -> Result<usize>
where
    T: Clone + Default,
    F: FnMut(&mut [T]) -> Result<usize>,
{
    if seed == 0 {
        return Err(Error::Misuse("adaptive buffer seed capacity must be non-zero"));
    }

    if buf.len() < seed {
        buf.resize(seed, T::default());
    }

    loop {
        let capacity = buf.len();
        let count = filler(buf.as_mut_slice())?;

        if count == 0 || count < capacity {
            return Ok(count);
        }

        let next = capacity.saturating_mul(2).min(max);
        if next <= capacity {
            return Err(Error::CapacityExceeded {
                requested: capacity.saturating_mul(2),
                limit: max,
            });
        }

        trace!(from = capacity, to = next, reported = count, "growing adaptive buffer");
        buf.resize(next, T::default());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
