// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Brute force matching of binary descriptors.

use super::{hamming, Descriptor, Match, RatioMatcher};
use crate::misc::type_aliases::Float;

/// Exhaustive two nearest neighbors search with the Hamming distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl BruteForceMatcher {
    /// The two nearest neighbors `(best, second)` of a descriptor in `train`.
    /// `second` is missing if `train` has only one descriptor.
    pub fn two_nearest(query: &Descriptor, train: &[Descriptor]) -> Option<(Match, Option<u32>)> {
        let mut best: Option<(usize, u32)> = None;
        let mut second: Option<u32> = None;
        for (idx, t) in train.iter().enumerate() {
            let d = hamming(query, t);
            match best {
                Some((_, best_d)) if d >= best_d => {
                    if second.map_or(true, |s| d < s) {
                        second = Some(d);
                    }
                }
                _ => {
                    second = best.map(|(_, best_d)| best_d);
                    best = Some((idx, d));
                }
            }
        }
        best.map(|(train, distance)| {
            let m = Match {
                query: 0,
                train,
                distance,
            };
            (m, second)
        })
    }
}

impl RatioMatcher for BruteForceMatcher {
    fn ratio_match(&self, query: &[Descriptor], train: &[Descriptor], ratio: Float) -> Vec<Match> {
        query
            .iter()
            .enumerate()
            .filter_map(|(q_idx, q)| {
                let (m, second) = Self::two_nearest(q, train)?;
                // Without a second candidate the ratio test cannot be applied.
                let second = second?;
                if Float::from(m.distance) < ratio * Float::from(second) {
                    Some(Match { query: q_idx, ..m })
                } else {
                    None
                }
            })
            .collect()
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::DESCRIPTOR_BYTES;

    /// Descriptor with the `n` first bits set.
    fn with_bits(n: usize) -> Descriptor {
        let mut d = [0; DESCRIPTOR_BYTES];
        for i in 0..n {
            d[i / 8] |= 1 << (i % 8);
        }
        d
    }

    #[test]
    fn two_nearest_are_sorted() {
        let train = vec![with_bits(40), with_bits(3), with_bits(100), with_bits(10)];
        let (m, second) = BruteForceMatcher::two_nearest(&with_bits(0), &train).unwrap();
        assert_eq!(1, m.train);
        assert_eq!(3, m.distance);
        assert_eq!(Some(10), second);
    }

    #[test]
    fn ratio_test() {
        let train = vec![with_bits(0), with_bits(200)];
        let query = vec![with_bits(10), with_bits(100), with_bits(190)];
        let matches = BruteForceMatcher.ratio_match(&query, &train, 0.75);
        // 100 is ambiguous: 100 vs 100.
        assert_eq!(2, matches.len());
        assert_eq!((0, 0, 10), (matches[0].query, matches[0].train, matches[0].distance));
        assert_eq!((2, 1, 10), (matches[1].query, matches[1].train, matches[1].distance));
    }

    #[test]
    fn no_second_candidate_no_match() {
        let train = vec![with_bits(0)];
        assert!(BruteForceMatcher
            .ratio_match(&[with_bits(1)], &train, 0.75)
            .is_empty());
        assert!(BruteForceMatcher
            .ratio_match(&[with_bits(1)], &[], 0.75)
            .is_empty());
    }
}
