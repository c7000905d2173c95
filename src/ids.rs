//! Record identifiers: `<prefix>-<random digits>`, redrawn on collision.

use rand::Rng;
use tracing::debug;

const MAX_ATTEMPTS: u32 = 64;

/// Generate an id not accepted by `taken`.
///
/// Draws a random `digits`-wide number (no leading zero). After
/// `MAX_ATTEMPTS` collisions the width grows by one digit, so a crowded
/// range can't loop forever.
pub fn generate_id(prefix: &str, digits: u32, taken: impl Fn(&str) -> bool) -> String {
    let mut rng = rand::thread_rng();
    let mut digits = digits.clamp(1, 18);

    loop {
        let low = 10u64.pow(digits - 1);
        let high = 10u64.pow(digits);
        for _ in 0..MAX_ATTEMPTS {
            let candidate = format!("{}-{}", prefix, rng.gen_range(low..high));
            if !taken(&candidate) {
                return candidate;
            }
        }
        debug!(prefix, digits, "Id range crowded, widening");
        digits = (digits + 1).min(18);
    }
}
