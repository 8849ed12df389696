/// Client-side confidence filtering
///
/// The filtered view is never stored as a source of truth: it is recomputed
/// from the raw set and the current threshold on every redraw.
use crate::detection::Detection;

/// Bounds for the threshold suggested after a new result set arrives.
pub const SUGGEST_MIN: f32 = 0.05;
pub const SUGGEST_MAX: f32 = 0.8;

/// Detections with `confidence >= threshold`, in input order.
pub fn filter(detections: &[Detection], threshold: f32) -> Vec<&Detection> {
    detections
        .iter()
        .filter(|d| passes(d, threshold))
        .collect()
}

pub fn passes(detection: &Detection, threshold: f32) -> bool {
    detection.confidence >= threshold
}

/// Median confidence; 0 for an empty set.
pub fn median_confidence(detections: &[Detection]) -> f32 {
    let mut values: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Initial threshold for a fresh result set: the median, clamped so the
/// default view neither hides nor shows everything.
///
/// Unusable bounds (NaN or `min > max`) leave the median unclamped.
pub fn suggest_threshold(detections: &[Detection], min: f32, max: f32) -> Option<f32> {
    if detections.is_empty() {
        return None;
    }
    let median = median_confidence(detections);
    if min <= max {
        Some(median.max(min).min(max))
    } else {
        Some(median)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Point;

    fn det(class_key: &str, confidence: f32) -> Detection {
        Detection {
            class_key: class_key.to_string(),
            label: class_key.to_string(),
            confidence,
            polygon: [
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ],
        }
    }

    fn dets(confidences: &[f32]) -> Vec<Detection> {
        confidences.iter().map(|c| det("a", *c)).collect()
    }

    #[test]
    fn test_median_confidence() {
        assert_eq!(median_confidence(&[]), 0.0);
        assert!((median_confidence(&dets(&[0.2, 0.8])) - 0.5).abs() < 1e-6);
        assert!((median_confidence(&dets(&[0.9, 0.1, 0.5])) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_filter_is_ordered_subset() {
        let all = vec![det("a", 0.9), det("b", 0.2), det("c", 0.5), det("d", 0.5)];
        let kept = filter(&all, 0.5);
        let keys: Vec<&str> = kept.iter().map(|d| d.class_key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c", "d"]);
        assert!(kept.iter().all(|d| d.confidence >= 0.5));
    }

    #[test]
    fn test_filter_extremes() {
        let all = dets(&[0.0, 0.3, 1.0]);
        let everything: Vec<Detection> = filter(&all, 0.0).into_iter().cloned().collect();
        assert_eq!(everything, all);
        assert!(filter(&all, 1.01).is_empty());
        assert!(filter(&[], 0.5).is_empty());
    }

    #[test]
    fn test_filter_is_repeatable() {
        let all = dets(&[0.1, 0.7, 0.4, 0.9]);
        assert_eq!(filter(&all, 0.4), filter(&all, 0.4));
    }

    #[test]
    fn test_suggest_threshold_clamps() {
        assert_eq!(suggest_threshold(&[], SUGGEST_MIN, SUGGEST_MAX), None);
        assert_eq!(suggest_threshold(&dets(&[0.01, 0.02]), SUGGEST_MIN, SUGGEST_MAX), Some(0.05));
        assert_eq!(suggest_threshold(&dets(&[0.95, 0.99]), SUGGEST_MIN, SUGGEST_MAX), Some(0.8));
        let mid = suggest_threshold(&dets(&[0.3, 0.5, 0.7]), SUGGEST_MIN, SUGGEST_MAX).unwrap();
        assert!((mid - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_suggest_threshold_with_bad_bounds() {
        let all = dets(&[0.3, 0.5, 0.7]);
        assert_eq!(suggest_threshold(&all, SUGGEST_MIN, f32::NAN), Some(0.5));
        assert_eq!(suggest_threshold(&all, f32::NAN, SUGGEST_MAX), Some(0.5));
        assert_eq!(suggest_threshold(&all, 0.8, 0.05), Some(0.5));
    }
}
