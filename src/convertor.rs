//! Type-erasing conversion functions.
//!
//! Convertors keep the index layer decoupled from caller types: the index
//! hands backend-native documents and terms to a [`Convertor`], and the
//! caller decides what ends up in the result collection. Any closure of the
//! right shape is a convertor.
//!
//! ```
//! use lucerna::convertor::{Convertor, Step, StoppableConvertor};
//! use lucerna::error::Result;
//!
//! let upper = |s: String| -> Result<String> { Ok(s.to_uppercase()) };
//! assert_eq!(upper.convert("abc".to_string()).unwrap(), "ABC");
//!
//! let until_z = |s: String| -> Result<Step<String>> {
//!     Ok(if s.starts_with('z') { Step::Stop } else { Step::Emit(s) })
//! };
//! assert!(matches!(until_z.step("zeta".to_string()).unwrap(), Step::Stop));
//! ```

use crate::error::Result;

/// Converts a value of type `P` into a value of type `R`.
pub trait Convertor<P, R>: Send + Sync {
    /// Perform the conversion.
    fn convert(&self, value: P) -> Result<R>;
}

impl<P, R, F> Convertor<P, R> for F
where
    F: Fn(P) -> Result<R> + Send + Sync,
{
    fn convert(&self, value: P) -> Result<R> {
        self(value)
    }
}

/// Outcome of a [`StoppableConvertor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<R> {
    /// Keep the converted value and continue.
    Emit(R),
    /// Drop this value and continue.
    Skip,
    /// End the iteration. Not an error.
    Stop,
}

impl<R> Step<R> {
    /// Whether this step ends the iteration.
    pub fn is_stop(&self) -> bool {
        matches!(self, Step::Stop)
    }
}

/// A convertor that may end the iteration driving it.
///
/// Used by term enumeration to implement prefix and range scans without
/// materializing the whole dictionary.
pub trait StoppableConvertor<P, R>: Send + Sync {
    /// Convert `value`, or decide to skip it or to stop.
    fn step(&self, value: P) -> Result<Step<R>>;
}

impl<P, R, F> StoppableConvertor<P, R> for F
where
    F: Fn(P) -> Result<Step<R>> + Send + Sync,
{
    fn step(&self, value: P) -> Result<Step<R>> {
        self(value)
    }
}

/// The identity convertor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T> Convertor<T, T> for Identity {
    fn convert(&self, value: T) -> Result<T> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::LucernaError;

    #[test]
    fn test_closure_convertor() {
        let len = |s: String| -> Result<usize> { Ok(s.len()) };
        assert_eq!(Convertor::convert(&len, "four".to_string()).unwrap(), 4);
    }

    #[test]
    fn test_failing_convertor() {
        let fail = |_: u32| -> Result<u32> { Err(LucernaError::invalid_argument("nope")) };
        assert!(Convertor::convert(&fail, 1).is_err());
    }

    #[test]
    fn test_identity() {
        assert_eq!(Identity.convert(7u8).unwrap(), 7);
    }

    #[test]
    fn test_step() {
        assert!(Step::<()>::Stop.is_stop());
        assert!(!Step::Emit(1).is_stop());
        assert!(!Step::<u8>::Skip.is_stop());
    }
}
