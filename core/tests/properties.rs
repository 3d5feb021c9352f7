//! Property-based tests for ranking and preprocessing.
//!
//! Ranking is checked against a straightforward sort-and-truncate
//! reference; preprocessing against the sampling rule and tensor layout.

use proptest::prelude::*;
use sightline_core::classifier::{
    preprocess, rank, resize_nearest, Bitmap, LabelSet, PipelineConfig, PixelSource, UNKNOWN_LABEL,
};

/// Scores drawn partly from a small set so that ties are common.
fn scores() -> impl Strategy<Value = Vec<f32>> {
    let score = prop_oneof![
        0.0f32..=1.0f32,
        prop::sample::select(vec![-0.0f32, 0.0, 0.1, 0.25, 0.5, 0.75, 1.0]),
    ];
    prop::collection::vec(score, 0..64)
}

fn labels(count: usize) -> LabelSet {
    LabelSet::new((0..count).map(|i| format!("class-{}", i)).collect())
}

fn bitmap() -> impl Strategy<Value = Bitmap> {
    (1u32..24, 1u32..24).prop_flat_map(|(width, height)| {
        prop::collection::vec(any::<u32>(), (width * height) as usize)
            .prop_map(move |pixels| Bitmap::from_argb(width, height, pixels).unwrap())
    })
}

/// Sort survivors by descending confidence; the stable sort keeps lower
/// indices first among equals.
fn reference_rank(scores: &[f32], threshold: f32, max_results: usize) -> Vec<(usize, f32)> {
    let mut survivors: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, confidence)| confidence > threshold)
        .collect();
    survivors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    survivors.truncate(max_results);
    survivors
}

proptest! {
    #[test]
    fn ranking_matches_sorted_reference(
        scores in scores(),
        threshold in prop::sample::select(vec![-1.0f32, 0.0, 0.1, 0.3, 0.5, 0.9]),
        max_results in 0usize..8,
        label_count in 0usize..64,
    ) {
        let labels = labels(label_count);
        let results = rank(&scores, &labels, threshold, max_results);
        let expected = reference_rank(&scores, threshold, max_results);

        prop_assert!(results.len() <= max_results);
        prop_assert_eq!(results.len(), expected.len());
        for (result, (index, confidence)) in results.iter().zip(expected) {
            prop_assert_eq!(&result.id, &index.to_string());
            prop_assert_eq!(result.confidence, confidence);
            prop_assert!(result.confidence > threshold);
            let label = labels.get(index).unwrap_or(UNKNOWN_LABEL);
            prop_assert_eq!(result.label.as_str(), label);
        }
    }

    #[test]
    fn ranking_is_non_increasing_with_index_tie_break(
        scores in scores(),
        max_results in 1usize..8,
    ) {
        let results = rank(&scores, &labels(scores.len()), -1.0, max_results);
        for pair in results.windows(2) {
            prop_assert!(pair[0].confidence >= pair[1].confidence);
            if pair[0].confidence == pair[1].confidence {
                let first: usize = pair[0].id.parse().unwrap();
                let second: usize = pair[1].id.parse().unwrap();
                prop_assert!(first < second);
            }
        }
    }

    #[test]
    fn preprocessing_is_deterministic_with_fixed_length(
        image in bitmap(),
        side in 1u32..32,
    ) {
        let config = PipelineConfig::new(side);
        let first = preprocess(&image, &config).unwrap();
        let second = preprocess(&image, &config).unwrap();

        prop_assert_eq!(first.len(), 3 * side as usize * side as usize);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn resize_samples_nearest_pixel_centre(
        image in bitmap(),
        side in 1u32..32,
    ) {
        let resized = resize_nearest(&image, side).unwrap();
        prop_assert_eq!((resized.width(), resized.height()), (side, side));

        for dy in 0..side {
            let sy = (((2 * dy + 1) * image.height()) / (2 * side)).min(image.height() - 1);
            for dx in 0..side {
                let sx = (((2 * dx + 1) * image.width()) / (2 * side)).min(image.width() - 1);
                prop_assert_eq!(resized.pixel(dx, dy), image.pixel(sx, sy));
            }
        }
    }

    #[test]
    fn resize_to_own_size_is_identity(
        side in 1u32..16,
        seed in any::<u32>(),
    ) {
        let pixels: Vec<u32> = (0..side * side).map(|i| i.wrapping_mul(seed)).collect();
        let image = Bitmap::from_argb(side, side, pixels).unwrap();
        prop_assert_eq!(resize_nearest(&image, side).unwrap(), image);
    }
}
