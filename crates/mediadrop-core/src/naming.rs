//! Storage name generation.

use chrono::Utc;
use rand::RngCore;

/// Generate a unique storage name that keeps `extension` verbatim.
///
/// Format: `{unix seconds}-{128 random bits as hex}{extension}`. Randomness
/// comes from the thread-local CSPRNG, so concurrent callers never contend.
pub fn generate_name(extension: &str) -> String {
    let mut entropy = [0u8; 16];
    rand::rng().fill_bytes(&mut entropy);
    format!(
        "{}-{}{}",
        Utc::now().timestamp(),
        hex::encode(entropy),
        extension
    )
}
