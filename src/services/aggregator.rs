use crate::models::Quote;

/// Trust weight for one quote, in [0, 1].
///
/// Base trust comes from the source's priority, scaled down by its recent
/// failure history (floored so a struggling source still counts a little) and
/// halved when the price falls outside the symbol's plausibility band —
/// down-weighted, not rejected, because bands can be wrong.
pub fn confidence(priority: u8, consecutive_failures: u32, in_band: bool) -> f64 {
    let base = priority as f64 / 5.0;
    let reliability = (1.0 - 0.2 * consecutive_failures as f64).max(0.1);
    let band = if in_band { 1.0 } else { 0.5 };
    (base * reliability * band).clamp(0.0, 1.0)
}

/// Confidence-weighted consensus over one fan-out round's quotes.
///
/// Deterministic by construction: same quotes in, same price out. Falls back
/// to the plain mean when every weight is zero so a degenerate round still
/// yields a usable number.
pub fn aggregate(quotes: &[Quote]) -> Option<f64> {
    if quotes.is_empty() {
        return None;
    }

    let weight_sum: f64 = quotes.iter().map(|q| q.confidence).sum();
    if weight_sum <= f64::EPSILON {
        return Some(quotes.iter().map(|q| q.price).sum::<f64>() / quotes.len() as f64);
    }

    Some(quotes.iter().map(|q| q.price * q.confidence).sum::<f64>() / weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quote(price: f64, confidence: f64) -> Quote {
        Quote::new("TEST".to_string(), price, "unit".to_string(), confidence)
    }

    #[test]
    fn empty_round_has_no_consensus() {
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn single_quote_returns_its_own_price() {
        let price = aggregate(&[quote(142.51, 0.7)]).unwrap();
        assert_eq!(price, 142.51);
    }

    #[test]
    fn matches_closed_form_weighted_mean() {
        let quotes = [quote(100.0, 0.8), quote(110.0, 0.2)];
        let expected = (100.0 * 0.8 + 110.0 * 0.2) / (0.8 + 0.2);
        assert_relative_eq!(aggregate(&quotes).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn three_source_consensus() {
        let quotes = [quote(100.0, 0.9), quote(102.0, 0.5), quote(98.0, 0.2)];
        assert_relative_eq!(aggregate(&quotes).unwrap(), 100.375, epsilon = 1e-9);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let quotes = [quote(100.0, 0.9), quote(102.0, 0.5), quote(98.0, 0.2)];
        let first = aggregate(&quotes).unwrap();
        for _ in 0..100 {
            assert_eq!(aggregate(&quotes).unwrap(), first);
        }
    }

    #[test]
    fn zero_weights_fall_back_to_plain_mean() {
        let quotes = [quote(100.0, 0.0), quote(104.0, 0.0)];
        assert_relative_eq!(aggregate(&quotes).unwrap(), 102.0, epsilon = 1e-12);
    }

    #[test]
    fn confidence_formula() {
        assert_relative_eq!(confidence(5, 0, true), 1.0);
        assert_relative_eq!(confidence(5, 2, true), 0.6);
        assert_relative_eq!(confidence(1, 0, true), 0.2);
        assert_relative_eq!(confidence(5, 0, false), 0.5);
        // reliability floor
        assert_relative_eq!(confidence(5, 50, true), 0.1);
    }

    #[test]
    fn confidence_stays_in_unit_interval() {
        for priority in 1..=5u8 {
            for failures in 0..20u32 {
                for in_band in [true, false] {
                    let c = confidence(priority, failures, in_band);
                    assert!((0.0..=1.0).contains(&c));
                }
            }
        }
    }
}
