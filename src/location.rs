//! Where the dispatcher is, for the "My Location" button.

use thiserror::Error;

use crate::projection::GeoPos;

/// Errors reported by a [`Locator`].
#[derive(Error, Debug, PartialEq)]
pub enum LocateError {
    /// The position source did not answer.
    #[error("Position unavailable: {0}")]
    Unavailable(String),
}

/// A source for the dispatcher's own position.
pub trait Locator {
    /// Returns the current position.
    fn current_position(&self) -> Result<GeoPos, LocateError>;
}

/// A [`Locator`] that always reports the same configured position.
#[derive(Clone, Copy, Debug)]
pub struct FixedLocator(pub GeoPos);

impl Locator for FixedLocator {
    fn current_position(&self) -> Result<GeoPos, LocateError> {
        Ok(self.0)
    }
}
