//! End-to-end tests for the correction pipeline

use std::sync::Mutex;

use despike::geometry::distance;
use despike::kernel::MAX_CIRCLE_SEGMENTS;
use despike::{
    correct, AtomicProgressTracker, CorrectionConfig, CorrectionError, CorrectionObserver,
    CorrectionStage, Corrector, DegeneratePolicy, Point2D, Polyline, StageControl,
};

fn line(coords: &[(f64, f64)]) -> Polyline {
    Polyline::single(coords.iter().map(|&(x, y)| Point2D::new(x, y)).collect()).unwrap()
}

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Smallest distance from any output vertex to `center`.
fn min_distance_to(fragments: &[Polyline], center: Point2D) -> f64 {
    fragments
        .iter()
        .flat_map(|f| f.points().copied())
        .map(|p| distance(p, center))
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn test_straight_line_passes_through() {
    let input = line(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);

    let result = correct(&[input.clone()], 170.0, 1.5).unwrap();

    assert_eq!(result.stats.input_lines, 1);
    assert_eq!(result.stats.spike_count, 0);
    assert_eq!(result.stats.buffer_count, 0);
    assert_eq!(result.stats.fragment_count, 1);
    assert_eq!(result.stats.final_count, 1);
    assert!(result.is_pass_through());
    assert_eq!(result.fragments, vec![input]);
}

#[test]
fn test_right_angle_leaves_gap() {
    let corner = Point2D::new(5.0, 0.0);
    let input = line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);

    let result = correct(&[input], 100.0, 1.5).unwrap();

    assert_eq!(result.stats.spike_count, 1);
    assert_eq!(result.spikes[0].point, corner);
    assert_eq!(result.stats.buffer_count, 1);
    assert_eq!(result.stats.fragment_count, 1);
    assert_eq!(result.stats.final_count, 1);
    assert!(!result.is_pass_through());

    // Both legs survive, split at the corner
    assert!(result.fragments[0].part_count() >= 2);
    let gap = min_distance_to(&result.fragments, corner);
    assert!(gap >= 1.5 - 1e-6, "Vertex {} from the spike", gap);
    assert!(gap < 1.6, "Gap {} wider than the buffer", gap);

    // 1.5 removed from each leg
    assert!(approx_eq(result.total_length(), 7.0, 0.05));
}

#[test]
fn test_empty_input_fails() {
    let result = correct(&[], 170.0, 1.5);
    assert!(matches!(result, Err(CorrectionError::NoInputGeometry)));
}

#[test]
fn test_zero_length_input_fails() {
    let dot = line(&[(3.0, 3.0), (3.0, 3.0)]);
    let result = correct(&[dot], 170.0, 1.5);
    assert!(matches!(result, Err(CorrectionError::NoInputGeometry)));
}

#[test]
fn test_consumed_fragment_is_dropped() {
    // A short hairpin entirely within 1.5 of its tip
    let hairpin = line(&[(0.0, 0.0), (1.0, 0.2), (0.0, 0.4)]);
    let long = line(&[(10.0, 0.0), (20.0, 0.0)]);

    let result = correct(&[hairpin, long.clone()], 30.0, 1.5).unwrap();

    assert_eq!(result.stats.spike_count, 1);
    assert_eq!(result.stats.fragment_count, 2);
    assert_eq!(result.stats.final_count, 1);
    assert_eq!(result.fragments, vec![long]);
}

#[test]
fn test_only_fragment_consumed_fails() {
    let hairpin = line(&[(0.0, 0.0), (1.0, 0.2), (0.0, 0.4)]);

    let result = correct(&[hairpin], 30.0, 1.5);
    assert!(matches!(
        result,
        Err(CorrectionError::NoSurvivingGeometry { fragment_count: 1 })
    ));
}

#[test]
fn test_spike_at_feature_junction() {
    // Two features meeting at a right angle are merged before detection
    let a = line(&[(0.0, 0.0), (5.0, 0.0)]);
    let b = line(&[(5.0, 0.0), (5.0, 5.0)]);

    let result = correct(&[a, b], 100.0, 1.5).unwrap();

    assert_eq!(result.stats.input_lines, 2);
    assert_eq!(result.stats.spike_count, 1);
    assert_eq!(result.spikes[0].point, Point2D::new(5.0, 0.0));
    assert!(min_distance_to(&result.fragments, Point2D::new(5.0, 0.0)) >= 1.5 - 1e-6);
}

#[test]
fn test_partial_overlap_is_not_doubled() {
    let a = line(&[(0.0, 0.0), (10.0, 0.0)]);
    let b = line(&[(5.0, 0.0), (15.0, 0.0)]);

    let result = correct(&[a, b], 170.0, 1.5).unwrap();

    assert_eq!(result.stats.spike_count, 0);
    assert!(result.is_pass_through());
    assert_eq!(result.stats.fragment_count, 1);
    assert_eq!(result.fragments[0].part_count(), 1);
    assert!(approx_eq(result.total_length(), 15.0, 1e-9));
}

#[test]
fn test_shared_prefix_invents_no_spike() {
    // The second line doubles back over the first line's start
    let a = line(&[(0.0, 0.0), (10.0, 0.0)]);
    let b = line(&[(0.0, 0.0), (5.0, 0.0), (0.5, 0.5)]);

    let result = correct(&[a, b], 30.0, 1.5).unwrap();

    assert!(result
        .spikes
        .iter()
        .all(|s| s.point != Point2D::new(0.0, 0.0)));
    assert_eq!(result.stats.spike_count, 0);
    assert!(result.is_pass_through());
    assert_eq!(result.stats.fragment_count, 3);
    let expected = 10.0 + 4.5f64.hypot(0.5);
    assert!(approx_eq(result.total_length(), expected, 1e-9));
}

#[test]
fn test_non_finite_vertex_is_skipped() {
    let input = line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (f64::NAN, 7.0)]);

    let result = correct(&[input], 100.0, 1.5).unwrap();

    assert_eq!(result.stats.skipped_degenerate, 1);
    assert_eq!(result.stats.spike_count, 1);
    assert_eq!(result.spikes[0].point, Point2D::new(5.0, 0.0));
    assert!(result.fragments.iter().all(Polyline::is_finite));
    assert!(min_distance_to(&result.fragments, Point2D::new(5.0, 0.0)) >= 1.5 - 1e-6);
    assert!(approx_eq(result.total_length(), 7.0, 0.05));
}

#[test]
fn test_non_finite_vertex_splits_its_part() {
    let input = line(&[
        (0.0, 0.0),
        (10.0, 0.0),
        (f64::INFINITY, 0.0),
        (0.0, 5.0),
        (10.0, 5.0),
    ]);

    let result = correct(&[input], 30.0, 1.5).unwrap();

    assert!(result.is_pass_through());
    assert_eq!(result.stats.skipped_degenerate, 1);
    assert_eq!(
        result.fragments,
        vec![
            line(&[(0.0, 0.0), (10.0, 0.0)]),
            line(&[(0.0, 5.0), (10.0, 5.0)])
        ]
    );
}

#[test]
fn test_only_non_finite_geometry_fails() {
    let input = line(&[(f64::NAN, 0.0), (1.0, 1.0), (2.0, f64::NEG_INFINITY)]);
    assert!(matches!(
        correct(&[input], 100.0, 1.5),
        Err(CorrectionError::NoInputGeometry)
    ));
}

#[test]
fn test_fail_policy_reports_non_finite_vertex() {
    let corrector = Corrector::new(CorrectionConfig {
        angle_threshold: 100.0,
        degenerate_policy: DegeneratePolicy::Fail,
        ..CorrectionConfig::default()
    })
    .unwrap();

    let input = line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (f64::NAN, 7.0)]);
    let result = corrector.correct(&[input]);
    assert!(matches!(
        result,
        Err(CorrectionError::DegenerateGeometry { part: 0, index: 3 })
    ));

    // Parts are numbered across all inputs
    let clean = line(&[(20.0, 0.0), (30.0, 0.0)]);
    let multi = Polyline::new(vec![
        vec![Point2D::new(0.0, 10.0), Point2D::new(5.0, 10.0)],
        vec![
            Point2D::new(0.0, 20.0),
            Point2D::new(f64::INFINITY, 20.0),
            Point2D::new(5.0, 20.0),
        ],
    ])
    .unwrap();
    assert!(matches!(
        corrector.correct(&[clean.clone(), multi.clone()]),
        Err(CorrectionError::DegenerateGeometry { part: 2, index: 1 })
    ));
    assert!(matches!(
        corrector.detect(&[clean, multi]),
        Err(CorrectionError::DegenerateGeometry { part: 2, index: 1 })
    ));

    // Finite input is unaffected by the policy
    let ok = corrector
        .correct(&[line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)])])
        .unwrap();
    assert_eq!(ok.stats.spike_count, 1);
    assert_eq!(ok.stats.skipped_degenerate, 0);
}

#[test]
fn test_disjoint_lines_explode_in_order() {
    let a = line(&[(0.0, 0.0), (10.0, 0.0)]);
    let b = line(&[(0.0, 10.0), (10.0, 10.0)]);
    let c = line(&[(0.0, 20.0), (10.0, 20.0)]);

    let result = correct(&[a.clone(), b.clone(), c.clone()], 45.0, 1.5).unwrap();

    assert!(result.is_pass_through());
    assert_eq!(result.fragments, vec![a, b, c]);
}

#[test]
fn test_correction_is_idempotent() {
    let input = vec![
        line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (10.0, 5.0)]),
        line(&[(20.0, 0.0), (30.0, 0.5), (20.0, 1.0), (20.0, 10.0)]),
    ];
    let corrector = Corrector::new(CorrectionConfig {
        angle_threshold: 95.0,
        ..CorrectionConfig::default()
    })
    .unwrap();

    let first = corrector.correct(&input).unwrap();
    let second = corrector.correct(&input).unwrap();

    assert_eq!(first.stats, second.stats);
    assert_eq!(first.fragments, second.fragments);
    assert_eq!(first.spikes, second.spikes);
}

#[test]
fn test_min_fragment_length_filters_slivers() {
    // The first leg keeps under 0.5 units after the 1.5 buffer
    let input = line(&[(3.0, 0.0), (5.0, 0.0), (5.0, 5.0)]);
    let corrector = Corrector::new(CorrectionConfig {
        angle_threshold: 100.0,
        min_fragment_length: 1.0,
        ..CorrectionConfig::default()
    })
    .unwrap();

    let result = corrector.correct(&[input]).unwrap();
    assert_eq!(result.stats.final_count, 1);
    assert_eq!(result.fragments[0].part_count(), 1);
    assert!(approx_eq(result.total_length(), 3.5, 0.05));

    let strict = Corrector::new(CorrectionConfig {
        angle_threshold: 100.0,
        min_fragment_length: 10.0,
        ..CorrectionConfig::default()
    })
    .unwrap();
    assert!(matches!(
        strict.correct(&[line(&[(3.0, 0.0), (5.0, 0.0), (5.0, 5.0)])]),
        Err(CorrectionError::NoSurvivingGeometry { .. })
    ));
}

#[test]
fn test_invalid_configuration_rejected() {
    assert!(matches!(
        correct(&[line(&[(0.0, 0.0), (1.0, 0.0)])], 0.0, 1.5),
        Err(CorrectionError::InvalidThreshold(_))
    ));
    assert!(matches!(
        correct(&[line(&[(0.0, 0.0), (1.0, 0.0)])], 90.0, -1.0),
        Err(CorrectionError::InvalidBufferRadius(_))
    ));
    assert!(Corrector::new(CorrectionConfig {
        circle_segments: 2,
        ..CorrectionConfig::default()
    })
    .is_err());
}

#[test]
fn test_circle_segments_upper_bound() {
    let at_cap = CorrectionConfig {
        circle_segments: MAX_CIRCLE_SEGMENTS,
        ..CorrectionConfig::default()
    };
    assert!(at_cap.validate().is_ok());

    let huge: CorrectionConfig =
        serde_json::from_str(r#"{"circleSegments": 4294967295}"#).unwrap();
    assert!(matches!(huge.validate(), Err(CorrectionError::InvalidInput(_))));
    assert!(Corrector::new(huge).is_err());
}

#[test]
fn test_detect_without_correcting() {
    let corrector = Corrector::new(CorrectionConfig {
        angle_threshold: 100.0,
        ..CorrectionConfig::default()
    })
    .unwrap();
    let (merged, scan) = corrector
        .detect(&[line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)])])
        .unwrap();
    assert_eq!(merged.part_count(), 1);
    assert_eq!(scan.spikes.len(), 1);
}

/// Records stages and cancels before a chosen one.
struct CancelAt {
    stage: CorrectionStage,
    seen: Mutex<Vec<CorrectionStage>>,
}

impl CorrectionObserver for CancelAt {
    fn before_stage(&self, stage: CorrectionStage) -> StageControl {
        if stage == self.stage {
            return StageControl::Cancel;
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(stage);
        }
        StageControl::Continue
    }

    fn after_stage(&self, _stage: CorrectionStage, _count: usize) {}
}

#[test]
fn test_observer_cancels_between_stages() {
    let corrector = Corrector::new(CorrectionConfig::default()).unwrap();
    let observer = CancelAt {
        stage: CorrectionStage::Explode,
        seen: Mutex::new(Vec::new()),
    };

    let result = corrector.correct_observed(&[line(&[(0.0, 0.0), (1.0, 0.0)])], &observer);

    assert!(matches!(
        result,
        Err(CorrectionError::Cancelled {
            stage: CorrectionStage::Explode
        })
    ));
    assert_eq!(
        *observer.seen.lock().unwrap(),
        vec![
            CorrectionStage::Merge,
            CorrectionStage::Detect,
            CorrectionStage::Buffer
        ]
    );
}

#[test]
fn test_progress_tracker() {
    let corrector = Corrector::new(CorrectionConfig::default()).unwrap();
    let tracker = AtomicProgressTracker::new();

    let result = corrector
        .correct_observed(&[line(&[(0.0, 0.0), (1.0, 0.0)])], &tracker)
        .unwrap();
    assert_eq!(result.stats.final_count, 1);
    assert_eq!(
        tracker
            .completed_stages
            .load(std::sync::atomic::Ordering::SeqCst),
        CorrectionStage::ALL.len() as u32
    );

    tracker.cancel();
    assert!(matches!(
        corrector.correct_observed(&[line(&[(0.0, 0.0), (1.0, 0.0)])], &tracker),
        Err(CorrectionError::Cancelled {
            stage: CorrectionStage::Merge
        })
    ));
}

#[test]
fn test_config_from_json() {
    let config: CorrectionConfig =
        serde_json::from_str(r#"{"angleThreshold": 45.0, "degeneratePolicy": "fail"}"#).unwrap();
    assert_eq!(config.angle_threshold, 45.0);
    assert_eq!(config.buffer_radius, 1.5);
    assert_eq!(config.degenerate_policy, despike::DegeneratePolicy::Fail);
    assert!(config.validate().is_ok());
}

#[cfg(feature = "parallel")]
#[test]
fn test_batch_matches_sequential() {
    let corrector = Corrector::new(CorrectionConfig {
        angle_threshold: 100.0,
        ..CorrectionConfig::default()
    })
    .unwrap();
    let batches = vec![
        vec![line(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)])],
        Vec::new(),
        vec![line(&[(0.0, 0.0), (10.0, 0.0)])],
    ];

    let results = despike::correct_batch(&corrector, &batches);
    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().unwrap().fragments,
        corrector.correct(&batches[0]).unwrap().fragments
    );
    assert!(matches!(results[1], Err(CorrectionError::NoInputGeometry)));
    assert!(results[2].as_ref().unwrap().is_pass_through());
}
