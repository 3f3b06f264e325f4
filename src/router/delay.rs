//! Deterministic hold-off delay computation.

use std::hash::Hasher;
use std::time::Duration;

use rustc_hash::FxHasher;

/// Computes the hold-off delay for a fingerprint under a given instance
/// salt: a keyed 64-bit digest of the salt followed by the fingerprint,
/// reduced modulo the window, in whole seconds.
///
/// The digest is not cryptographic; it only has to be uniformly distributed
/// and stable per `(fingerprint, salt)` pair. Instances with different salts
/// draw different delays for the same alert, which is what breaks the
/// symmetry of the population without any negotiation. A zero `hold_window`
/// always yields a zero delay.
pub fn compute_delay(fingerprint: &str, salt: &str, hold_window: Duration) -> Duration {
    let window_secs = hold_window.as_secs();
    if window_secs == 0 {
        return Duration::ZERO;
    }
    let mut hasher = FxHasher::default();
    hasher.write(salt.as_bytes());
    hasher.write(fingerprint.as_bytes());
    Duration::from_secs(hasher.finish() % window_secs)
}
