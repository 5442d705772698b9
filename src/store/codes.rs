//! Short game-code generation.

use async_trait::async_trait;
use rand::Rng;

use crate::error::GameError;

/// Alphabet for game codes: uppercase letters and digits.
const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LENGTH: usize = 6;

/// Retry cap for the uniqueness loop. A defensive bound, not a correctness
/// guarantee; the 36^6 space makes collisions rare at any realistic scale.
const MAX_ATTEMPTS: usize = 10;

/// Uniqueness check for candidate codes, answered by the backend.
#[async_trait]
pub trait CodeProbe: Send + Sync {
    async fn code_in_use(&self, code: &str) -> Result<bool, GameError>;
}

/// Draw a random 6-character code. Not collision-checked by itself.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Draw codes until the probe reports one as unused, failing with
/// [`GameError::CodeExhausted`] after [`MAX_ATTEMPTS`] collisions.
pub async fn generate_unique<P: CodeProbe + ?Sized>(probe: &P) -> Result<String, GameError> {
    for _ in 0..MAX_ATTEMPTS {
        let code = generate();
        if !probe.code_in_use(&code).await? {
            return Ok(code);
        }
    }
    Err(GameError::CodeExhausted)
}
