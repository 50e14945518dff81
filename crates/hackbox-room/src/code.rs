//! Room code generation.

use hackbox_protocol::RoomCode;
use rand::Rng;

use crate::RoomError;

/// Attempts made before [`unique_code`] gives up. With 26^4 codes this is
/// only reachable when nearly every code is in use.
pub const MAX_CODE_ATTEMPTS: usize = 10_000;

/// A code of [`RoomCode::LEN`] letters drawn uniformly from `A..=Z`.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    let code: String = (0..RoomCode::LEN)
        .map(|_| char::from(b'A' + rng.random_range(0..26u8)))
        .collect();
    RoomCode::new(code)
}

/// Draws codes until `in_use` rejects one.
pub fn unique_code<R, F>(rng: &mut R, in_use: F) -> Result<RoomCode, RoomError>
where
    R: Rng + ?Sized,
    F: Fn(&RoomCode) -> bool,
{
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = random_code(rng);
        if !in_use(&code) {
            return Ok(code);
        }
    }
    Err(RoomError::CodeSpaceExhausted)
}
