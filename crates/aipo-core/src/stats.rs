//! Wilson / Clopper–Pearson confidence intervals and stratified sampling
//! (spec.md §4.9). The regularized incomplete beta function backing
//! Clopper–Pearson has no maintained crate in this workspace's dependency
//! set, so it is implemented here via the standard continued-fraction
//! expansion (Numerical Recipes §6.4).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CiMethod {
    Wilson,
    ClopperPearson,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceInterval {
    pub point: f64,
    pub low: f64,
    pub high: f64,
    pub method: CiMethod,
    pub n: u64,
    pub successes: u64,
}

const Z_95: f64 = 1.959963984540054;

/// Wilson score interval (spec.md §4.9 formulas).
pub fn wilson_interval(successes: u64, n: u64, z: f64) -> (f64, f64, f64) {
    if n == 0 {
        return (0.0, 0.0, 1.0);
    }
    let n_f = n as f64;
    let p = successes as f64 / n_f;
    let z2 = z * z;
    let center = (p + z2 / (2.0 * n_f)) / (1.0 + z2 / n_f);
    let margin = (z / (1.0 + z2 / n_f)) * ((p * (1.0 - p) / n_f) + z2 / (4.0 * n_f * n_f)).sqrt();
    (p, (center - margin).max(0.0), (center + margin).min(1.0))
}

/// Clopper–Pearson exact interval via the beta-quantile identity (spec.md
/// §4.9: lower = BetaQuantile(alpha/2; s, n-s+1), upper =
/// BetaQuantile(1-alpha/2; s+1, n-s)).
pub fn clopper_pearson_interval(successes: u64, n: u64, alpha: f64) -> (f64, f64, f64) {
    if n == 0 {
        return (0.0, 0.0, 1.0);
    }
    let p = successes as f64 / n as f64;
    let low = if successes == 0 {
        0.0
    } else {
        beta_quantile(alpha / 2.0, successes as f64, (n - successes + 1) as f64)
    };
    let high = if successes == n {
        1.0
    } else {
        beta_quantile(1.0 - alpha / 2.0, (successes + 1) as f64, (n - successes) as f64)
    };
    (p, low, high)
}

/// Picks Clopper–Pearson when n<20 or the sample proportion is extreme
/// (successes in {0, n}); Wilson otherwise. Ties at exactly n=20 with a
/// non-extreme proportion resolve to Wilson (spec.md §4.9 "Auto").
pub fn auto_interval(successes: u64, n: u64, alpha: f64) -> ConfidenceInterval {
    let extreme = successes == 0 || successes == n;
    let z = z_for_alpha(alpha);
    let use_exact = n < 20 || extreme;

    let (point, low, high, method) = if use_exact {
        let (p, lo, hi) = clopper_pearson_interval(successes, n, alpha);
        (p, lo, hi, CiMethod::ClopperPearson)
    } else {
        let (p, lo, hi) = wilson_interval(successes, n, z);
        (p, lo, hi, CiMethod::Wilson)
    };

    debug_assert!(low <= point + 1e-9 && point <= high + 1e-9);
    ConfidenceInterval {
        point,
        low: low.clamp(0.0, 1.0),
        high: high.clamp(0.0, 1.0),
        method,
        n,
        successes,
    }
}

fn z_for_alpha(alpha: f64) -> f64 {
    if (alpha - 0.05).abs() < 1e-9 {
        Z_95
    } else {
        // Rational approximation to the inverse normal CDF (Acklam), good
        // enough for the confidence levels this engine is configured with.
        inverse_normal_cdf(1.0 - alpha / 2.0)
    }
}

fn inverse_normal_cdf(p: f64) -> f64 {
    // Beasley-Springer-Moro approximation.
    let a = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    let b = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    let c = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    let d = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    let p_low = 0.02425;
    let p_high = 1.0 - p_low;

    if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
            / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
    } else if p <= p_high {
        let q = p - 0.5;
        let r = q * q;
        (((((a[0] * r + a[1]) * r + a[2]) * r + a[3]) * r + a[4]) * r + a[5]) * q
            / (((((b[0] * r + b[1]) * r + b[2]) * r + b[3]) * r + b[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((c[0] * q + c[1]) * q + c[2]) * q + c[3]) * q + c[4]) * q + c[5])
            / ((((d[0] * q + d[1]) * q + d[2]) * q + d[3]) * q + 1.0)
    }
}

/// Inverse regularized incomplete beta function via bisection over `betai`.
fn beta_quantile(p: f64, a: f64, b: f64) -> f64 {
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..200 {
        let mid = (lo + hi) / 2.0;
        if betai(mid, a, b) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

/// Regularized incomplete beta function I_x(a, b) (Numerical Recipes §6.4).
fn betai(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bt = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * betacf(x, a, b) / a
    } else {
        1.0 - bt * betacf(1.0 - x, b, a) / b
    }
}

fn betacf(x: f64, a: f64, b: f64) -> f64 {
    const MAXIT: u32 = 200;
    const EPS: f64 = 3.0e-12;
    const FPMIN: f64 = 1.0e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAXIT {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let aa = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation to ln(Gamma(x)).
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.99999999999980993,
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];
    if x < 0.5 {
        return (std::f64::consts::PI / (std::f64::consts::PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEFFS[0];
    let t = x + G + 0.5;
    for (i, coeff) in COEFFS.iter().enumerate().skip(1) {
        a += coeff / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Proportional-allocation stratified sampler (spec.md §4.8 "Sampling"):
/// draws `ceil(r * |stratum|)` cases per category uniformly without
/// replacement, seeded so re-runs with the same seed reproduce the sample.
pub fn stratified_sample<T: Clone>(items: &[T], category_of: impl Fn(&T) -> String, rate: f64, seed: u64) -> Vec<T> {
    assert!(rate > 0.0 && rate <= 1.0, "sample rate must be in (0, 1]");
    let mut by_category: BTreeMap<String, Vec<&T>> = BTreeMap::new();
    for item in items {
        by_category.entry(category_of(item)).or_default().push(item);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut selected = Vec::new();
    for (_, mut stratum) in by_category {
        stratum.shuffle(&mut rng);
        let take = (rate * stratum.len() as f64).ceil() as usize;
        selected.extend(stratum.into_iter().take(take).cloned());
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_three_cases_zero_jailbreaks_uses_exact_method() {
        let ci = auto_interval(0, 3, 0.05);
        assert_eq!(ci.method, CiMethod::ClopperPearson);
        assert_eq!(ci.point, 0.0);
        assert!((ci.high - 0.708).abs() < 0.01);
    }

    #[test]
    fn s2_one_of_three_jailbreaks() {
        let ci = auto_interval(1, 3, 0.05);
        assert_eq!(ci.method, CiMethod::ClopperPearson);
        assert!((ci.point - 1.0 / 3.0).abs() < 1e-9);
        assert!((ci.low - 0.008).abs() < 0.02);
        assert!((ci.high - 0.906).abs() < 0.02);
    }

    #[test]
    fn large_non_extreme_sample_uses_wilson() {
        let ci = auto_interval(10, 50, 0.05);
        assert_eq!(ci.method, CiMethod::Wilson);
        assert!(ci.low <= ci.point && ci.point <= ci.high);
    }

    #[test]
    fn n_equals_twenty_non_extreme_ties_to_wilson() {
        let ci = auto_interval(5, 20, 0.05);
        assert_eq!(ci.method, CiMethod::Wilson);
    }

    #[test]
    fn zero_trials_returns_degenerate_full_interval() {
        let ci = auto_interval(0, 0, 0.05);
        assert_eq!(ci.point, 0.0);
        assert_eq!(ci.low, 0.0);
        assert_eq!(ci.high, 1.0);
    }

    #[test]
    fn bounds_always_contain_point() {
        for successes in 0..=50u64 {
            let ci = auto_interval(successes, 50, 0.05);
            assert!(ci.low <= ci.point + 1e-9, "low={} point={}", ci.low, ci.point);
            assert!(ci.point <= ci.high + 1e-9, "point={} high={}", ci.point, ci.high);
        }
    }

    #[test]
    fn stratified_sample_is_deterministic_for_same_seed() {
        let items: Vec<(String, u32)> =
            (0..20).map(|i| (format!("cat{}", i % 3), i)).collect();
        let a = stratified_sample(&items, |it| it.0.clone(), 0.5, 42);
        let b = stratified_sample(&items, |it| it.0.clone(), 0.5, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn stratified_sample_respects_proportional_strata() {
        let items: Vec<(String, u32)> = (0..10).map(|i| ("cat_a".to_string(), i)).collect();
        let sample = stratified_sample(&items, |it| it.0.clone(), 0.5, 1);
        assert_eq!(sample.len(), 5);
    }
}
