use thiserror::Error;

/// Failures of the account collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("password must contain at least {0} characters")]
    WeakPassword(usize),
    #[error("email address already in use")]
    EmailInUse,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("too many failed attempts")]
    RateLimited,
    #[error("not signed in")]
    NotSignedIn,
}

/// Everything the session can fail with. All variants are recovered at the
/// session boundary: mapped to a short message, stored in the error slot and
/// shown as a banner. Nothing here is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Unknown game code
    #[error("game not found")]
    NotFound,
    /// Game at capacity
    #[error("game is full")]
    Full,
    /// Game has been deactivated
    #[error("game is no longer active")]
    Inactive,
    /// Code-uniqueness retries exceeded
    #[error("unable to generate a unique game code")]
    CodeExhausted,
    /// Generic backend/network failure
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl GameError {
    /// Short human-readable message for the UI error banner.
    pub fn user_message(&self) -> String {
        match self {
            GameError::Auth(AuthError::InvalidCredentials) => {
                "Incorrect email or password".to_string()
            }
            GameError::Auth(AuthError::WeakPassword(min)) => {
                format!("Password must contain at least {min} characters")
            }
            GameError::Auth(AuthError::EmailInUse) => {
                "This email address is already in use".to_string()
            }
            GameError::Auth(AuthError::InvalidEmail) => "Invalid email address".to_string(),
            GameError::Auth(AuthError::RateLimited) => {
                "Too many attempts. Please try again later".to_string()
            }
            GameError::Auth(AuthError::NotSignedIn) => {
                "You must be signed in to do that".to_string()
            }
            GameError::NotFound => "Game not found. Check the game code".to_string(),
            GameError::Full => "This game is full".to_string(),
            GameError::Inactive => "This game is no longer active".to_string(),
            GameError::CodeExhausted => {
                "Could not create the game, please try again".to_string()
            }
            GameError::Backend(_) => "Connection to the server failed".to_string(),
        }
    }
}
