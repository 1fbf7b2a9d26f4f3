pub mod env;
pub mod telemetry;

use std::hint::black_box;

/// Performs `&str` comparisons in constant time so the internal token
/// middleware doesn't leak key material through a timing side-channel
pub fn constant_time_cmp(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut res = 0u8;

    // black_box each byte so the fold can't short-circuit once `res`
    // goes non-zero
    for i in 0..a.len() {
        res |= black_box(a[i]) ^ black_box(b[i]);
    }

    black_box(res) == 0
}
