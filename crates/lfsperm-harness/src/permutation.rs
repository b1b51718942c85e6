//! Factorial-number-system enumeration of array orderings.
//!
//! [`permutation`] maps an index `i` in `[0, n!)` to one ordering of
//! `0..n`. At step `j` it swaps position `j` with position
//! `j + i % (n - j)` and divides `i` by `n - j`: the digit picks which of
//! the still-unplaced elements lands at `j`. This runs in O(n) with no
//! extra memory and is a bijection, though the order it produces is not
//! lexicographic.

use lfsperm_error::{PermError, Result};

/// `n!`, or [`PermError::FactorialOverflow`] once it no longer fits a `usize`.
pub fn factorial(n: usize) -> Result<usize> {
    (2..=n).try_fold(1_usize, |acc, k| {
        acc.checked_mul(k)
            .ok_or(PermError::FactorialOverflow { n })
    })
}

/// Ordering number `i` of `0..n`.
pub fn permutation(i: usize, n: usize) -> Result<Vec<u32>> {
    let mut buffer = vec![0_u32; n];
    permutation_into(i, &mut buffer)?;
    Ok(buffer)
}

/// Write ordering number `i` of `0..buffer.len()` into `buffer`.
///
/// `i` must be below `buffer.len()!`. Callers sampling beyond the space
/// reduce modulo [`factorial`] first.
pub fn permutation_into(i: usize, buffer: &mut [u32]) -> Result<()> {
    let size = buffer.len();
    let count = factorial(size)?;
    if i >= count {
        return Err(PermError::PermutationOutOfRange { index: i, count });
    }

    for (j, slot) in buffer.iter_mut().enumerate() {
        *slot = u32::try_from(j)
            .map_err(|_| PermError::internal(format!("array index {j} exceeds u32")))?;
    }

    let mut rest = i;
    for j in 0..size {
        let remaining = size - j;
        buffer.swap(j, j + rest % remaining);
        rest /= remaining;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_factorials() {
        assert_eq!(factorial(0).expect("0!"), 1);
        assert_eq!(factorial(1).expect("1!"), 1);
        assert_eq!(factorial(5).expect("5!"), 120);
        assert_eq!(factorial(10).expect("10!"), 3_628_800);
    }

    #[test]
    fn factorial_overflow_is_signalled() {
        let err = factorial(40).expect_err("40! overflows");
        assert!(matches!(err, PermError::FactorialOverflow { n: 40 }));
    }

    #[test]
    fn index_zero_is_identity() {
        assert_eq!(permutation(0, 5).expect("valid"), vec![0, 1, 2, 3, 4]);
        assert_eq!(permutation(0, 0).expect("empty"), Vec::<u32>::new());
    }

    #[test]
    fn all_orderings_of_three() {
        let orderings: Vec<Vec<u32>> = (0..6)
            .map(|i| permutation(i, 3).expect("valid index"))
            .collect();
        assert_eq!(
            orderings,
            vec![
                vec![0, 1, 2],
                vec![1, 0, 2],
                vec![2, 1, 0],
                vec![0, 2, 1],
                vec![1, 2, 0],
                vec![2, 0, 1],
            ]
        );
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let err = permutation(24, 4).expect_err("4! == 24");
        assert!(matches!(
            err,
            PermError::PermutationOutOfRange {
                index: 24,
                count: 24
            }
        ));
    }

    #[test]
    fn oversized_array_is_rejected() {
        let mut buffer = vec![0_u32; 25];
        assert!(matches!(
            permutation_into(0, &mut buffer),
            Err(PermError::FactorialOverflow { n: 25 })
        ));
    }
}
