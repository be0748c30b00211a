#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use approx::assert_relative_eq;

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    fn defined(values: &[Option<f64>]) -> Vec<f64> {
        values.iter().flatten().copied().collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 5);
        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0); // (1+2+3)/3
        assert_relative_eq!(result[3].unwrap(), 3.0);
        assert_relative_eq!(result[4].unwrap(), 4.0);
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result, vec![None, None]);
        assert_eq!(sma(&data, 0), vec![None, None]);
    }

    #[test]
    fn test_sma_real_prices() {
        let prices = sample_prices();
        let result = sma(&prices, 5);

        let expected_first = (44.34 + 44.09 + 44.15 + 43.61 + 44.33) / 5.0;
        assert_relative_eq!(result[4].unwrap(), expected_first, epsilon = 1e-9);
        assert_eq!(defined(&result).len(), prices.len() - 4);
    }

    #[test]
    fn test_rolling_std_population_and_sample() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let population = rolling_std(&data, 8, 0);
        let sample = rolling_std(&data, 8, 1);

        assert_relative_eq!(population[7].unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(sample[7].unwrap(), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        // A one-bar window has no sample deviation.
        assert!(rolling_std(&data, 1, 1).iter().all(Option::is_none));
    }

    #[test]
    fn test_ema_basic() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        // EMA should start with SMA
        let first_sma = (22.0 + 24.0 + 23.0) / 3.0;
        assert_relative_eq!(result[2].unwrap(), first_sma);
        assert_relative_eq!(result[3].unwrap(), (25.0 - first_sma) * 0.5 + first_sma);
    }

    #[test]
    fn test_ema_empty_data() {
        let data: Vec<f64> = vec![];
        assert!(ema(&data, 5).is_empty());
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = defined(&ema(&data, 3));

        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_rsi_bounds() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert_eq!(result.len(), prices.len());
        assert!(result[..14].iter().all(Option::is_none));
        for value in defined(&result) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        assert!(rsi(&data, 14).iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_rolling_mean_value() {
        // Changes over the last 4 bars: +2, -1, +1, -2 → avg gain 0.75, avg loss 0.75.
        let data = vec![10.0, 12.0, 11.0, 12.0, 10.0];
        let result = rsi(&data, 4);
        assert_relative_eq!(result[4].unwrap(), 50.0);
    }

    #[test]
    fn test_rsi_flat_window_undefined() {
        let data = vec![5.0; 10];
        assert!(rsi(&data, 3).iter().all(Option::is_none));
    }

    #[test]
    fn test_macd_alignment() {
        let data: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let result = macd(&data, 12, 26, 9, false);

        assert_eq!(result.macd_line.len(), 60);
        assert_eq!(result.signal_line.len(), 60);
        assert!(result.macd_line[24].is_none());
        assert!(result.macd_line[25].is_some());
        assert!(result.signal_line[32].is_none());
        assert!(result.signal_line[33].is_some());
        let hist = result.histogram[40].unwrap();
        assert_relative_eq!(
            hist,
            result.macd_line[40].unwrap() - result.signal_line[40].unwrap()
        );
    }

    #[test]
    fn test_macd_line_is_sma_difference() {
        let mut data = vec![100.0; 30];
        data.extend([120.0; 10]);
        let result = macd(&data, 12, 26, 9, false);
        let fast = sma(&data, 12);
        let slow = sma(&data, 26);

        // 6 of 12 bars at 120 against 6 of 26.
        assert_relative_eq!(result.macd_line[35].unwrap(), 110.0 - 2720.0 / 26.0, epsilon = 1e-9);
        assert_relative_eq!(result.macd_line[35].unwrap(), 5.384615, epsilon = 1e-6);
        for i in 25..40 {
            assert_relative_eq!(result.macd_line[i].unwrap(), fast[i].unwrap() - slow[i].unwrap());
        }

        let window: Vec<f64> = result.macd_line[27..=35].iter().flatten().copied().collect();
        assert_eq!(window.len(), 9);
        assert_relative_eq!(
            result.signal_line[35].unwrap(),
            window.iter().sum::<f64>() / 9.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_macd_ewm_uses_ema_difference() {
        let mut data = vec![100.0; 30];
        data.extend([120.0; 10]);
        let simple = macd(&data, 12, 26, 9, false);
        let weighted = macd(&data, 12, 26, 9, true);
        let fast = ema(&data, 12);
        let slow = ema(&data, 26);

        assert_relative_eq!(weighted.macd_line[35].unwrap(), fast[35].unwrap() - slow[35].unwrap());
        assert!((weighted.macd_line[35].unwrap() - simple.macd_line[35].unwrap()).abs() > 0.05);
        assert!(weighted.signal_line[32].is_none());
        assert!(weighted.signal_line[33].is_some());
    }

    #[test]
    fn test_macd_zero_periods() {
        let data = sample_prices();
        for (fast, slow, signal) in [(0, 12, 9), (12, 0, 9), (3, 5, 0)] {
            let result = macd(&data, fast, slow, signal, false);
            assert!(result.macd_line.iter().all(Option::is_none));
            assert!(result.signal_line.iter().all(Option::is_none));
            assert_eq!(result.macd_line.len(), data.len());
        }
    }

    #[test]
    fn test_macd_swapped_windows_flip_sign() {
        let data = sample_prices();
        let normal = macd(&data, 3, 6, 4, false);
        let swapped = macd(&data, 6, 3, 4, false);

        assert_eq!(defined(&swapped.macd_line).len(), data.len() - 5);
        for i in 0..data.len() {
            assert_eq!(swapped.macd_line[i].map(|v| -v), normal.macd_line[i]);
            assert_eq!(swapped.signal_line[i].map(|v| -v), normal.signal_line[i]);
        }
    }

    #[test]
    fn test_bollinger_bands_symmetry() {
        let prices = sample_prices();
        let bands = bollinger_bands(&prices, 10, 2.0);

        for i in 9..prices.len() {
            let (u, m, l) = (
                bands.upper[i].unwrap(),
                bands.middle[i].unwrap(),
                bands.lower[i].unwrap(),
            );
            assert!(u >= m && m >= l);
            assert_relative_eq!(u - m, m - l, epsilon = 1e-9);
        }
        assert!(bands.upper[8].is_none());
    }

    #[test]
    fn test_prior_rolling_extremes() {
        let data = vec![3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(
            prior_rolling_max(&data, 2),
            vec![None, None, Some(3.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(
            prior_rolling_min(&data, 2),
            vec![None, None, Some(1.0), Some(1.0), Some(1.0)]
        );
    }

    #[test]
    fn test_pct_change() {
        let data = vec![100.0, 110.0, 99.0];
        let result = pct_change(&data, 1);
        assert_eq!(result[0], None);
        assert_relative_eq!(result[1].unwrap(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(result[2].unwrap(), -0.1, epsilon = 1e-12);
        assert!(pct_change(&data, 5).iter().all(Option::is_none));
    }

    #[test]
    fn test_zscore_zero_dispersion_undefined() {
        let data = vec![1.0, 1.0, 1.0, 4.0];
        let z = zscore(&data, 3);
        assert_eq!(z[2], None);
        // Window [1, 1, 4]: mean 2, sample std sqrt(3).
        assert_relative_eq!(z[3].unwrap(), 2.0 / 3.0f64.sqrt(), epsilon = 1e-12);
    }
}
