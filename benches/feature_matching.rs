// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stereo_odometry_rs::core::features::{BruteForceMatcher, DetectAndDescribe, Orb, RatioMatcher};
use stereo_odometry_rs::misc::type_aliases::GrayMatrix;

#[allow(clippy::cast_possible_truncation)]
fn textured(shift: usize) -> GrayMatrix {
    GrayMatrix::from_fn(376, 1241, |y, x| {
        let x = x + shift;
        ((x * 7 + y * 13) % 97 + (x / 24 + y / 24) % 2 * 120) as u8
    })
}

fn criterion_benchmark(c: &mut Criterion) {
    let orb = Orb::default();
    let left = textured(0);
    let right = textured(10);

    c.bench_function("orb detect 376x1241", |b| {
        b.iter(|| black_box(orb.detect_and_describe(&left)))
    });

    let (_, left_desc) = orb.detect_and_describe(&left);
    let (_, right_desc) = orb.detect_and_describe(&right);
    c.bench_function("brute force ratio match", |b| {
        b.iter(|| black_box(BruteForceMatcher.ratio_match(&left_desc, &right_desc, 0.75)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
