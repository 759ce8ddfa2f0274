use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in a game code.
pub const GAME_CODE_LENGTH: usize = 6;
const GAME_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Short, human-typeable identifier shared as invite code and storage key.
///
/// Codes are case-insensitive: parsing trims surrounding whitespace and
/// normalizes to uppercase, so `ab12cd` and `AB12CD` name the same game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameCode(String);

/// Rejection returned when a string cannot be used as a [`GameCode`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameCodeError {
    #[error("game code must be {GAME_CODE_LENGTH} characters long (got {0})")]
    Length(usize),
    #[error("game code must only contain letters and digits")]
    Charset,
}

impl GameCode {
    /// Draw a fresh random code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..GAME_CODE_LENGTH)
            .map(|_| GAME_CODE_ALPHABET[rng.random_range(0..GAME_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize and validate user input.
    pub fn parse(input: &str) -> Result<Self, GameCodeError> {
        let normalized = input.trim().to_ascii_uppercase();
        let length = normalized.chars().count();
        if length != GAME_CODE_LENGTH {
            return Err(GameCodeError::Length(length));
        }
        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GameCodeError::Charset);
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameCode {
    type Err = GameCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GameCode {
    type Error = GameCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GameCode> for String {
    fn from(value: GameCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..64 {
            let code = GameCode::generate();
            assert_eq!(GameCode::parse(code.as_str()), Ok(code));
        }
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = GameCode::parse("  ab12cd ").unwrap();
        assert_eq!(code.as_str(), "AB12CD");
        assert_eq!(code, GameCode::parse("AB12CD").unwrap());
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(GameCode::parse("ABC"), Err(GameCodeError::Length(3)));
        assert_eq!(GameCode::parse("ABCDEFG"), Err(GameCodeError::Length(7)));
        assert_eq!(GameCode::parse("AB-2CD"), Err(GameCodeError::Charset));
        assert_eq!(GameCode::parse("ÀB12CD"), Err(GameCodeError::Charset));
    }
}
