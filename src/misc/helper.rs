// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use num_traits::Float as NumFloat;

/// Keep the elements of a slice at positions given by a mask.
/// Order of the kept elements is preserved.
///
/// Panics if the mask and the slice have different lengths.
pub fn keep_where<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
    assert_eq!(values.len(), mask.len(), "Mask and values lengths differ");
    values
        .iter()
        .zip(mask.iter())
        .filter_map(|(v, &keep)| if keep { Some(v.clone()) } else { None })
        .collect()
}

/// Median of a set of values, the mean of the two middle values for even sizes.
///
/// Returns `None` for an empty set or if some value is NaN.
pub fn median<T: NumFloat>(values: &[T]) -> Option<T> {
    if values.is_empty() || values.iter().any(|x| x.is_nan()) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let two = T::one() + T::one();
        Some((sorted[mid - 1] + sorted[mid]) / two)
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(Some(2.0), median(&[3.0, 1.0, 2.0]));
        assert_eq!(Some(2.5), median(&[4.0, 1.0, 3.0, 2.0]));
    }

    #[test]
    fn median_of_empty_set_is_none() {
        assert_eq!(None, median::<f64>(&[]));
        assert_eq!(None, median(&[1.0, std::f64::NAN]));
    }

    #[test]
    fn keep_where_preserves_order() {
        let kept = keep_where(&[1, 2, 3, 4], &[true, false, true, true]);
        assert_eq!(vec![1, 3, 4], kept);
    }

    #[quickcheck_macros::quickcheck]
    fn median_is_within_bounds(values: Vec<i32>) -> bool {
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        match median(&values) {
            None => values.is_empty(),
            Some(m) => {
                let min = values.iter().cloned().fold(std::f64::INFINITY, f64::min);
                let max = values.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max);
                min <= m && m <= max
            }
        }
    }
}
