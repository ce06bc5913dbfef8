//! Checksum generation for pool credentials.
//!
//! Each token gets an opaque checksum at add time, sent to the upstream in a
//! custom header. The layout is fixed (prefix, two random alphanumeric
//! segments joined by a slash); the content is random.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Fixed prefix of every generated checksum.
pub const CHECKSUM_PREFIX: &str = "zo";

/// Length of the first random segment.
const FIRST_SEGMENT_LEN: usize = 70;

/// Length of the second random segment.
const SECOND_SEGMENT_LEN: usize = 64;

/// Generate a fresh checksum: `zo` + 70 alphanumeric + `/` + 64 alphanumeric.
///
/// The segments are drawn from the thread RNG over 62 characters each, so
/// collisions between checksums in the same pool are practically impossible.
pub fn generate_checksum() -> String {
    format!(
        "{}{}/{}",
        CHECKSUM_PREFIX,
        random_alnum(FIRST_SEGMENT_LEN),
        random_alnum(SECOND_SEGMENT_LEN)
    )
}

fn random_alnum(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
