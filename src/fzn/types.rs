//! Flatzinc types.

/// Flatzinc integer value.
///
/// ```flatzinc
/// int: p = 14;
/// ```
pub type Int = i64;

/// Sentinel for an unbounded lower bound.
pub const INT_MIN: Int = Int::MIN;

/// Sentinel for an unbounded upper bound.
pub const INT_MAX: Int = Int::MAX;

/// Convert the given boolean to [Int].
pub fn as_int(b: bool) -> Int {
    if b { 1 } else { 0 }
}
