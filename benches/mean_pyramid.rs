// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stereo_odometry_rs::core::frame;
use stereo_odometry_rs::core::multires;
use stereo_odometry_rs::misc::type_aliases::GrayMatrix;

fn criterion_benchmark(c: &mut Criterion) {
    // Size of the KITTI gray images.
    let img = GrayMatrix::from_fn(376, 1241, |y, x| ((x * 3 + y * 5) % 256) as u8);

    c.bench_function("orb pyramid 3 levels 376x1241", |b| {
        b.iter(|| black_box(multires::mean_pyramid(3, img.clone())))
    });

    c.bench_function("resize by 2", |b| b.iter(|| black_box(frame::resize(img.clone(), 2))));
    c.bench_function("resize by 3", |b| b.iter(|| black_box(frame::resize(img.clone(), 3))));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
