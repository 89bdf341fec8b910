// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Robust model fitting with an inlier mask.
//!
//! A model type implements `RobustModel` (minimal sample estimation and residuals)
//! and any `RobustFit` implementation, such as `Ransac`, can fit it to noisy data.

use rand::{rngs::StdRng, seq::index, SeedableRng};

use crate::misc::type_aliases::Float;

/// A model that can be estimated from samples of data of type `D`.
pub trait RobustModel<D> {
    /// The estimated model.
    type Model: Clone;

    /// Minimum number of data points required to estimate the model.
    fn min_sample_size(&self) -> usize;

    /// Estimate model from a sample of at least `min_sample_size` data points.
    /// Bigger samples are used for the final refinement on all inliers.
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Squared error (in squared pixels) of a single data point against the model.
    fn residual(&self, model: &Self::Model, data: &D) -> Float;
}

/// Outcome of a successful robust fit.
#[derive(Debug, Clone)]
pub struct Fit<M> {
    /// Model refined on all inliers.
    pub model: M,
    /// One boolean per data point, true for inliers.
    pub inliers: Vec<bool>,
    /// Number of `true` values in `inliers`.
    pub nb_inliers: usize,
}

/// Capability of fitting a model robustly to data containing outliers.
pub trait RobustFit {
    /// Fit the model, or `None` if no model could be estimated
    /// (typically not enough data points).
    fn fit<D, M: RobustModel<D>>(&self, model: &M, data: &[D]) -> Option<Fit<M::Model>>;
}

/// Configuration of the RANSAC algorithm.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inlier threshold (pixels).
    pub threshold: Float,
    /// Upper bound on the number of iterations.
    pub max_iterations: usize,
    /// Desired probability of drawing at least one outlier free sample.
    pub confidence: Float,
    /// Seed of the random generator, runs are reproducible.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threshold: 0.1,
            max_iterations: 2000,
            confidence: 0.999,
            seed: 0,
        }
    }
}

/// RANSAC with an adaptive number of iterations.
#[derive(Debug, Clone, Default)]
pub struct Ransac {
    /// Parameters of the algorithm.
    pub config: Config,
}

impl Ransac {
    /// Create a RANSAC fitter.
    pub fn new(config: Config) -> Self {
        Ransac { config }
    }
}

impl RobustFit for Ransac {
    fn fit<D, M: RobustModel<D>>(&self, estimator: &M, data: &[D]) -> Option<Fit<M::Model>> {
        let n = data.len();
        let k = estimator.min_sample_size();
        if n < k || k == 0 {
            return None;
        }
        let threshold_2 = self.config.threshold * self.config.threshold;
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<Fit<M::Model>> = None;
        let mut nb_iterations = self.config.max_iterations;
        let mut iter = 0;
        while iter < nb_iterations {
            iter += 1;
            let sample: Vec<&D> = index::sample(&mut rng, n, k)
                .into_iter()
                .map(|i| &data[i])
                .collect();
            let model = match estimator.estimate(&sample) {
                Some(model) => model,
                None => continue,
            };
            let inliers = inlier_mask(estimator, &model, data, threshold_2);
            let nb_inliers = inliers.iter().filter(|&&x| x).count();
            let improves = best.as_ref().map_or(true, |b| nb_inliers > b.nb_inliers);
            if improves && nb_inliers >= k {
                nb_iterations = nb_iterations.min(adaptive_iterations(
                    self.config.confidence,
                    nb_inliers as Float / n as Float,
                    k,
                ));
                best = Some(Fit {
                    model,
                    inliers,
                    nb_inliers,
                });
            }
        }

        let best = best?;
        log::trace!(
            "ransac: {}/{} inliers after {} iterations",
            best.nb_inliers,
            n,
            iter
        );
        Some(refine(estimator, data, best, threshold_2))
    }
}

/// Re-estimate the model on all inliers, keep it if it does not lose inliers.
fn refine<D, M: RobustModel<D>>(
    estimator: &M,
    data: &[D],
    best: Fit<M::Model>,
    threshold_2: Float,
) -> Fit<M::Model> {
    let inlier_data: Vec<&D> = data
        .iter()
        .zip(best.inliers.iter())
        .filter_map(|(d, &inlier)| if inlier { Some(d) } else { None })
        .collect();
    if let Some(model) = estimator.estimate(&inlier_data) {
        let inliers = inlier_mask(estimator, &model, data, threshold_2);
        let nb_inliers = inliers.iter().filter(|&&x| x).count();
        if nb_inliers >= best.nb_inliers {
            return Fit {
                model,
                inliers,
                nb_inliers,
            };
        }
    }
    best
}

fn inlier_mask<D, M: RobustModel<D>>(
    estimator: &M,
    model: &M::Model,
    data: &[D],
    threshold_2: Float,
) -> Vec<bool> {
    data.iter()
        .map(|d| estimator.residual(model, d) < threshold_2)
        .collect()
}

/// Number of iterations needed to draw an outlier free sample
/// with the given confidence, knowing the current inlier ratio.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn adaptive_iterations(confidence: Float, inlier_ratio: Float, sample_size: usize) -> usize {
    let outlier_free = inlier_ratio.powi(sample_size as i32);
    if outlier_free >= 1.0 {
        return 1;
    }
    let num = (1.0 - confidence).max(Float::MIN_POSITIVE).ln();
    let denom = (1.0 - outlier_free).ln();
    if denom >= 0.0 || !denom.is_finite() {
        usize::max_value()
    } else {
        (num / denom).ceil().max(1.0) as usize
    }
}

// TESTS #############################################################
