//! # Correction Pipeline
//!
//! Removes spikes from a set of polylines in six strictly ordered stages:
//!
//! 1. **Merge** all input lines into one geometry through the kernel
//! 2. **Detect** vertices whose interior angle is at or below the threshold
//! 3. **Buffer** the spike vertices and union them into an exclusion zone
//! 4. **Explode** the merged geometry into single-part fragments
//! 5. **Difference** each fragment against the exclusion zone
//! 6. **Assemble** the surviving fragments and stage counters
//!
//! Vertices with non-finite coordinates are removed before merging, splitting
//! their part, and counted as degenerate; under
//! [`DegeneratePolicy::Fail`] the first one aborts the run instead.
//!
//! Differencing runs per fragment because a boolean difference against a
//! multipart line can drop parts. When no spike is found, or no buffer could
//! be built, the output is the exploded merged geometry unchanged.
//!
//! A [`Corrector`] holds only configuration and a kernel, so one instance can
//! serve concurrent calls.

use std::borrow::Cow;

use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::detect::{find_spikes, DegeneratePolicy, SpikeScan};
use crate::kernel::{GeoKernel, GeometryKernel};
use crate::progress::{CorrectionObserver, CorrectionStage, NoopObserver, StageControl};
use crate::split::explode_multipart;
use crate::zone::build_exclusion_zone;
use crate::{
    part_length, AngleThreshold, CorrectionConfig, CorrectionError, CorrectionResult, CorrectionStats,
    OptionExt, Polyline, Result,
};

/// Spike correction pipeline over a geometry kernel.
#[derive(Debug, Clone)]
pub struct Corrector<K = GeoKernel> {
    kernel: K,
    config: CorrectionConfig,
}

impl Corrector<GeoKernel> {
    /// Create a corrector using [`GeoKernel`] with the configured circle resolution.
    pub fn new(config: CorrectionConfig) -> Result<Self> {
        let kernel = GeoKernel::with_circle_segments(config.circle_segments);
        Self::with_kernel(kernel, config)
    }
}

impl<K: GeometryKernel> Corrector<K> {
    /// Create a corrector over a custom kernel.
    ///
    /// Fails if the configuration is out of range.
    pub fn with_kernel(kernel: K, config: CorrectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { kernel, config })
    }

    pub fn config(&self) -> &CorrectionConfig {
        &self.config
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Run the full pipeline on `lines`.
    ///
    /// # Errors
    /// - [`CorrectionError::NoInputGeometry`] if `lines` is empty or merges to nothing
    /// - [`CorrectionError::DegenerateGeometry`] under [`DegeneratePolicy::Fail`]
    /// - [`CorrectionError::NoSurvivingGeometry`] if the exclusion zone removes every fragment
    pub fn correct(&self, lines: &[Polyline]) -> Result<CorrectionResult> {
        self.correct_observed(lines, &NoopObserver)
    }

    /// Run the full pipeline, reporting stage transitions to `observer`.
    ///
    /// The observer may cancel between stages, which returns
    /// [`CorrectionError::Cancelled`] without a partial result.
    pub fn correct_observed(
        &self,
        lines: &[Polyline],
        observer: &dyn CorrectionObserver,
    ) -> Result<CorrectionResult> {
        let threshold = AngleThreshold::new(self.config.angle_threshold)?;
        let mut stats = CorrectionStats {
            input_lines: lines.len(),
            ..Default::default()
        };

        // Stage 1: merge
        enter(observer, CorrectionStage::Merge)?;
        let (merged, non_finite) = self.merge(lines)?;
        observer.after_stage(CorrectionStage::Merge, merged.part_count());

        // Stage 2: detect
        enter(observer, CorrectionStage::Detect)?;
        let scan = find_spikes(&merged, threshold, self.config.degenerate_policy)?;
        stats.spike_count = scan.spikes.len();
        stats.skipped_degenerate = scan.skipped_degenerate + non_finite;
        info!(
            "[Corrector] Found {} spikes at or below {:.1}° ({} degenerate vertices skipped)",
            stats.spike_count,
            threshold.degrees(),
            stats.skipped_degenerate
        );
        observer.after_stage(CorrectionStage::Detect, stats.spike_count);

        // Stage 3: buffer
        enter(observer, CorrectionStage::Buffer)?;
        let zone = build_exclusion_zone(&self.kernel, &scan.points(), self.config.buffer_radius);
        stats.buffer_count = zone.as_ref().map_or(0, |z| z.buffer_count);
        match &zone {
            Some(z) => info!(
                "[Corrector] Built exclusion zone from {} buffers ({} polygons, radius {})",
                z.buffer_count,
                z.area.polygon_count(),
                self.config.buffer_radius
            ),
            None => info!("[Corrector] No exclusion zone built, passing lines through"),
        }
        observer.after_stage(CorrectionStage::Buffer, stats.buffer_count);

        // Stage 4: explode
        enter(observer, CorrectionStage::Explode)?;
        let fragments = explode_multipart(&self.kernel, &merged);
        stats.fragment_count = fragments.len();
        info!("[Corrector] Exploded into {} fragments", stats.fragment_count);
        observer.after_stage(CorrectionStage::Explode, stats.fragment_count);

        // Stage 5: difference
        enter(observer, CorrectionStage::Difference)?;
        let cleaned = match &zone {
            Some(zone) => fragments
                .iter()
                .enumerate()
                .filter_map(|(i, fragment)| {
                    let diff = self
                        .kernel
                        .difference(fragment, &zone.area)
                        .and_then(|diff| self.drop_short_parts(diff));
                    if diff.is_none() {
                        debug!("[Corrector] Fragment {} removed by exclusion zone", i);
                    }
                    diff
                })
                .collect(),
            None => fragments,
        };
        observer.after_stage(CorrectionStage::Difference, cleaned.len());

        // Stage 6: assemble
        enter(observer, CorrectionStage::Assemble)?;
        if cleaned.is_empty() {
            return Err(CorrectionError::NoSurvivingGeometry {
                fragment_count: stats.fragment_count,
            });
        }
        stats.final_count = cleaned.len();
        info!(
            "[Corrector] {} input lines -> {} spikes -> {} buffers -> {} fragments -> {} final",
            stats.input_lines,
            stats.spike_count,
            stats.buffer_count,
            stats.fragment_count,
            stats.final_count
        );
        observer.after_stage(CorrectionStage::Assemble, stats.final_count);

        Ok(CorrectionResult {
            fragments: cleaned,
            spikes: scan.spikes,
            stats,
        })
    }

    /// Merge `lines` and scan the result for spikes without correcting.
    ///
    /// Non-finite vertices dropped before merging are included in
    /// [`SpikeScan::skipped_degenerate`].
    pub fn detect(&self, lines: &[Polyline]) -> Result<(Polyline, SpikeScan)> {
        let threshold = AngleThreshold::new(self.config.angle_threshold)?;
        let (merged, non_finite) = self.merge(lines)?;
        let mut scan = find_spikes(&merged, threshold, self.config.degenerate_policy)?;
        scan.skipped_degenerate += non_finite;
        Ok((merged, scan))
    }

    /// Merge `lines` into one polyline, returning it with the number of
    /// non-finite vertices dropped on the way.
    fn merge(&self, lines: &[Polyline]) -> Result<(Polyline, usize)> {
        if lines.is_empty() {
            return Err(CorrectionError::NoInputGeometry);
        }
        let (finite, dropped) = self.drop_non_finite(lines)?;
        let merged = self.kernel.union_lines(&finite).ok_or_no_input()?;
        info!(
            "[Corrector] Merged {} lines into {} parts ({} vertices)",
            lines.len(),
            merged.part_count(),
            merged.point_count()
        );
        Ok((merged, dropped))
    }

    /// Remove vertices with non-finite coordinates, splitting each part
    /// around them. Parts left with fewer than 2 points and lines left with
    /// no part are dropped.
    ///
    /// Under [`DegeneratePolicy::Fail`] the first such vertex is an error,
    /// located by its part position across all input parts and its index
    /// within that part.
    fn drop_non_finite<'a>(
        &self,
        lines: &'a [Polyline],
    ) -> Result<(Cow<'a, [Polyline]>, usize)> {
        if lines.iter().all(Polyline::is_finite) {
            return Ok((Cow::Borrowed(lines), 0));
        }

        let mut dropped = 0;
        let mut part_no = 0;
        let mut cleaned = Vec::with_capacity(lines.len());
        for line in lines {
            let mut runs = Vec::new();
            for part in line.parts() {
                let mut run = Vec::with_capacity(part.len());
                for (index, p) in part.iter().enumerate() {
                    if p.is_finite() {
                        run.push(*p);
                        continue;
                    }
                    if self.config.degenerate_policy == DegeneratePolicy::Fail {
                        return Err(CorrectionError::DegenerateGeometry {
                            part: part_no,
                            index,
                        });
                    }
                    dropped += 1;
                    runs.push(std::mem::take(&mut run));
                }
                runs.push(run);
                part_no += 1;
            }
            if let Some(line) = Polyline::from_parts_lossy(runs) {
                cleaned.push(line);
            }
        }

        warn!("[Corrector] Dropped {} vertices with non-finite coordinates", dropped);
        Ok((Cow::Owned(cleaned), dropped))
    }

    /// Remove zero-length parts and parts shorter than `min_fragment_length`
    /// from a differenced fragment. `None` when nothing is left.
    fn drop_short_parts(&self, fragment: Polyline) -> Option<Polyline> {
        let min = self.config.min_fragment_length;
        Polyline::from_parts_lossy(
            fragment
                .into_parts()
                .into_iter()
                .filter(|part| {
                    let length = part_length(part);
                    length > 0.0 && length >= min
                })
                .collect(),
        )
    }
}

fn enter(observer: &dyn CorrectionObserver, stage: CorrectionStage) -> Result<()> {
    match observer.before_stage(stage) {
        StageControl::Continue => Ok(()),
        StageControl::Cancel => {
            info!("[Corrector] Cancelled before stage {}", stage);
            Err(CorrectionError::Cancelled { stage })
        }
    }
}

/// Correct `lines` with the default kernel and configuration, overriding the
/// angle threshold and buffer radius.
///
/// # Example
/// ```
/// use despike::{correct, CorrectionError, Point2D, Polyline};
///
/// let straight = Polyline::single(vec![
///     Point2D::new(0.0, 0.0),
///     Point2D::new(5.0, 0.0),
///     Point2D::new(10.0, 0.0),
/// ])
/// .unwrap();
///
/// let result = correct(&[straight.clone()], 170.0, 1.5).unwrap();
/// assert_eq!(result.stats.spike_count, 0);
/// assert_eq!(result.fragments, vec![straight]);
///
/// assert!(matches!(correct(&[], 170.0, 1.5), Err(CorrectionError::NoInputGeometry)));
/// ```
pub fn correct(lines: &[Polyline], threshold: f64, buffer_radius: f64) -> Result<CorrectionResult> {
    let config = CorrectionConfig {
        angle_threshold: threshold,
        buffer_radius,
        ..CorrectionConfig::default()
    };
    Corrector::new(config)?.correct(lines)
}

/// Correct independent line sets in parallel, one result per set, in order.
#[cfg(feature = "parallel")]
pub fn correct_batch<K: GeometryKernel>(
    corrector: &Corrector<K>,
    batches: &[Vec<Polyline>],
) -> Vec<Result<CorrectionResult>> {
    batches
        .par_iter()
        .map(|lines| corrector.correct(lines))
        .collect()
}
