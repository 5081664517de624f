// Malformed-input errors. A turn that fails validation is never evaluated;
// the serving layer answers it with a fallback move instead.

use thiserror::Error;

use crate::types::Coord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("invalid board dimensions {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },

    #[error("snake '{id}' has an empty body")]
    EmptyBody { id: String },

    #[error("snake id '{0}' appears more than once")]
    DuplicateSnake(String),

    #[error("snake '{id}' has a segment at ({}, {}) outside the board", .coord.x, .coord.y)]
    OutOfBounds { id: String, coord: Coord },

    #[error("snake '{id}' has non-adjacent segments at index {index}")]
    DisjointBody { id: String, index: usize },

    #[error("own snake '{0}' is not on the board")]
    MissingSelf(String),

    #[error("more than one snake is flagged as self")]
    MultipleSelf,

    #[error("food at ({}, {}) is outside the board", .0.x, .0.y)]
    FoodOutOfBounds(Coord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_descriptive() {
        let err = StateError::OutOfBounds {
            id: "a".to_string(),
            coord: Coord::new(11, 3),
        };
        assert_eq!(err.to_string(), "snake 'a' has a segment at (11, 3) outside the board");
        assert_eq!(
            StateError::FoodOutOfBounds(Coord::new(-1, 0)).to_string(),
            "food at (-1, 0) is outside the board"
        );
    }
}
