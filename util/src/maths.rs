//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into `[min, max]`, returning the clamped value and whether
/// clamping took place.
///
/// NaN is mapped to `min` and reported as limited.
pub fn clamp_flagged<T>(value: T, min: T, max: T) -> (T, bool)
where
    T: Float
{
    if value.is_nan() {
        (min, true)
    }
    else if value > max {
        (max, true)
    }
    else if value < min {
        (min, true)
    }
    else {
        (value, false)
    }
}

/// Arithmetic mean of a slice, or `None` if it is empty.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float
{
    if values.is_empty() {
        return None;
    }

    let sum = values.iter().fold(T::zero(), |acc, v| acc + *v);

    T::from(values.len()).map(|n| sum / n)
}
