//! Pure numeric helpers used by the profiling stages.
//!
//! Every function returns `None` instead of a NaN when its input is too
//! small or degenerate (fewer than the required observations, zero
//! variance, a single category).

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// Descriptive statistics of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    /// Adjusted Fisher-Pearson skewness
    pub skew: Option<f64>,
    /// Bias-corrected excess kurtosis
    pub kurtosis: Option<f64>,
}

/// Summarizes finite values; `None` for empty input.
pub fn summarize(values: &[f64]) -> Option<NumericSummary> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    Some(NumericSummary {
        count: sorted.len(),
        mean: mean(&sorted)?,
        std: std_dev(&sorted),
        min: sorted[0],
        q1: quantile_sorted(&sorted, 0.25)?,
        median: quantile_sorted(&sorted, 0.5)?,
        q3: quantile_sorted(&sorted, 0.75)?,
        max: sorted[sorted.len() - 1],
        skew: skewness(&sorted),
        kurtosis: kurtosis(&sorted),
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance (n - 1 denominator).
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - 1) as f64)
}

pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sorts a copy and returns the requested quantile.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

// Central moments m2, m3, m4 with an n denominator.
fn central_moments(values: &[f64]) -> Option<(f64, f64, f64)> {
    let m = mean(values)?;
    let n = values.len() as f64;
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - m;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    Some((m2 / n, m3 / n, m4 / n))
}

/// Adjusted Fisher-Pearson skewness; zero for constant input.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let (m2, m3, _) = central_moments(values)?;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let n = n as f64;
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (n * (n - 1.0)).sqrt() / (n - 2.0))
}

/// Bias-corrected excess kurtosis; zero for constant input.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 4 {
        return None;
    }
    let (m2, _, m4) = central_moments(values)?;
    if m2 == 0.0 {
        return Some(0.0);
    }
    let n = n as f64;
    let g2 = m4 / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Jarque-Bera statistic and its chi-squared (2 dof) p-value.
pub fn jarque_bera(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 3 {
        return None;
    }
    let (m2, m3, m4) = central_moments(values)?;
    if m2 == 0.0 {
        return None;
    }
    let n = values.len() as f64;
    let s = m3 / m2.powf(1.5);
    let k = m4 / (m2 * m2);
    let jb = n / 6.0 * (s * s + (k - 3.0).powi(2) / 4.0);
    Some((jb, chi_squared_sf(jb, 2.0)))
}

/// Pearson correlation from running sums.
pub fn pearson_from_sums(n: f64, sx: f64, sy: f64, sxx: f64, syy: f64, sxy: f64) -> Option<f64> {
    if n < 2.0 {
        return None;
    }
    let cov = n * sxy - sx * sy;
    let vx = n * sxx - sx * sx;
    let vy = n * syy - sy * sy;
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Pearson correlation of paired observations.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }
    pearson_from_sums(pairs.len() as f64, sx, sy, sxx, syy, sxy)
}

/// Observed counts of a two-way frequency table.
struct Contingency {
    cells: HashMap<(usize, usize), f64>,
    row_totals: Vec<f64>,
    col_totals: Vec<f64>,
    n: f64,
}

impl Contingency {
    fn tally<A, B>(pairs: &[(A, B)]) -> Option<Self>
    where
        A: Eq + Hash,
        B: Eq + Hash,
    {
        if pairs.is_empty() {
            return None;
        }
        let mut rows: HashMap<&A, usize> = HashMap::new();
        let mut cols: HashMap<&B, usize> = HashMap::new();
        let mut cells: HashMap<(usize, usize), f64> = HashMap::new();
        for (a, b) in pairs {
            let next_row = rows.len();
            let r = *rows.entry(a).or_insert(next_row);
            let next_col = cols.len();
            let c = *cols.entry(b).or_insert(next_col);
            *cells.entry((r, c)).or_insert(0.0) += 1.0;
        }

        let mut row_totals = vec![0.0; rows.len()];
        let mut col_totals = vec![0.0; cols.len()];
        for (&(r, c), &count) in &cells {
            row_totals[r] += count;
            col_totals[c] += count;
        }
        Some(Self {
            cells,
            row_totals,
            col_totals,
            n: pairs.len() as f64,
        })
    }

    fn min_dimension(&self) -> usize {
        self.row_totals.len().min(self.col_totals.len())
    }

    fn dof(&self) -> usize {
        (self.row_totals.len() - 1) * (self.col_totals.len() - 1)
    }

    /// Pearson's statistic. With `yates` each observed count moves up to
    /// 0.5 toward its expectation.
    fn chi_squared(&self, yates: bool) -> f64 {
        let mut chi2 = 0.0;
        for (r, row_total) in self.row_totals.iter().enumerate() {
            for (c, col_total) in self.col_totals.iter().enumerate() {
                let expected = row_total * col_total / self.n;
                let observed = self.cells.get(&(r, c)).copied().unwrap_or(0.0);
                let mut diff = (observed - expected).abs();
                if yates {
                    diff -= diff.min(0.5);
                }
                chi2 += diff * diff / expected;
            }
        }
        chi2
    }
}

/// Cramér's V between two categorical variables given as value pairs.
pub fn cramers_v<A, B>(pairs: &[(A, B)]) -> Option<f64>
where
    A: Eq + Hash,
    B: Eq + Hash,
{
    let table = Contingency::tally(pairs)?;
    let k = table.min_dimension();
    if k < 2 {
        return None;
    }
    let v = (table.chi_squared(false) / (table.n * (k - 1) as f64)).sqrt();
    v.is_finite().then(|| v.min(1.0))
}

/// Outcome of a significance test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestStatistic {
    pub statistic: f64,
    pub p_value: f64,
}

/// Chi-squared test of independence between two categorical variables,
/// with Yates' correction on 2x2 tables. Returns the test and its degrees
/// of freedom.
pub fn chi_squared_test<A, B>(pairs: &[(A, B)]) -> Option<(TestStatistic, usize)>
where
    A: Eq + Hash,
    B: Eq + Hash,
{
    let table = Contingency::tally(pairs)?;
    if table.min_dimension() < 2 {
        return None;
    }
    let dof = table.dof();
    let statistic = table.chi_squared(dof == 1);
    statistic.is_finite().then(|| {
        (
            TestStatistic {
                statistic,
                p_value: chi_squared_sf(statistic, dof as f64),
            },
            dof,
        )
    })
}

/// Two-sample Student t-test with pooled variance.
pub fn t_test(a: &[f64], b: &[f64]) -> Option<TestStatistic> {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let dof = n1 + n2 - 2.0;
    if a.is_empty() || b.is_empty() || dof < 1.0 {
        return None;
    }
    let sq = |values: &[f64], m: f64| values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let (m1, m2) = (mean(a)?, mean(b)?);
    let pooled = (sq(a, m1) + sq(b, m2)) / dof;
    if pooled == 0.0 {
        return None;
    }
    let statistic = (m1 - m2) / (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();
    statistic.is_finite().then(|| TestStatistic {
        statistic,
        p_value: student_t_two_sided(statistic, dof),
    })
}

/// One-way ANOVA F-test across groups.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Option<TestStatistic> {
    let k = groups.len();
    let n: usize = groups.iter().map(Vec::len).sum();
    if k < 2 || n <= k || groups.iter().any(Vec::is_empty) {
        return None;
    }
    let overall = groups.iter().flatten().sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let m = mean(group)?;
        ss_between += group.len() as f64 * (m - overall).powi(2);
        ss_within += group.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    }
    if ss_within == 0.0 {
        return None;
    }
    let (d1, d2) = ((k - 1) as f64, (n - k) as f64);
    let statistic = (ss_between / d1) / (ss_within / d2);
    statistic.is_finite().then(|| TestStatistic {
        statistic,
        p_value: f_sf(statistic, d1, d2),
    })
}

/// Correlation ratio (eta) of a numeric variable across categories.
pub fn correlation_ratio<K>(pairs: &[(K, f64)]) -> Option<f64>
where
    K: Eq + Hash,
{
    if pairs.len() < 2 {
        return None;
    }
    let mut groups: HashMap<&K, (f64, usize)> = HashMap::new();
    for (k, v) in pairs {
        let entry = groups.entry(k).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }
    if groups.len() < 2 {
        return None;
    }

    let overall = pairs.iter().map(|(_, v)| v).sum::<f64>() / pairs.len() as f64;
    let ss_total: f64 = pairs.iter().map(|(_, v)| (v - overall).powi(2)).sum();
    if ss_total == 0.0 {
        return None;
    }
    let ss_between: f64 = groups
        .values()
        .map(|(sum, count)| {
            let group_mean = sum / *count as f64;
            *count as f64 * (group_mean - overall).powi(2)
        })
        .sum();

    Some((ss_between / ss_total).sqrt().min(1.0))
}

/// Rounds to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

const MAX_ITERATIONS: usize = 300;
const EPSILON: f64 = 1e-14;
const TINY: f64 = 1e-300;

const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function for `x > 0` (Lanczos, g = 7).
fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = LANCZOS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS[0], |acc, (i, c)| acc + c / (x + i as f64));
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// Upper regularized incomplete gamma function Q(a, x).
fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    let prefix = (-x + a * x.ln() - ln_gamma(a)).exp();
    if x < a + 1.0 {
        let mut term = 1.0 / a;
        let mut sum = term;
        let mut ap = a;
        for _ in 0..MAX_ITERATIONS {
            ap += 1.0;
            term *= x / ap;
            sum += term;
            if term.abs() < sum.abs() * EPSILON {
                break;
            }
        }
        (1.0 - sum * prefix).max(0.0)
    } else {
        // Lentz's continued fraction
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / TINY;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..MAX_ITERATIONS {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < TINY {
                d = TINY;
            }
            c = b + an / c;
            if c.abs() < TINY {
                c = TINY;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < EPSILON {
                break;
            }
        }
        (prefix * h).min(1.0)
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };
    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;
    for m in 1..MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;
        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        h *= d * c;
        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Regularized incomplete beta function I_x(a, b).
fn beta_i(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front =
        (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Survival function of the chi-squared distribution.
pub fn chi_squared_sf(x: f64, dof: f64) -> f64 {
    gamma_q(dof / 2.0, x / 2.0)
}

/// Two-sided tail probability of Student's t distribution.
pub fn student_t_two_sided(t: f64, dof: f64) -> f64 {
    beta_i(dof / (dof + t * t), dof / 2.0, 0.5)
}

/// Survival function of the F distribution.
pub fn f_sf(f: f64, d1: f64, d2: f64) -> f64 {
    if f <= 0.0 {
        return 1.0;
    }
    beta_i(d2 / (d2 + d1 * f), d2 / 2.0, d1 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_summary() {
        let summary = summarize(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(summary.count, 5);
        assert!(close(summary.mean, 3.0));
        assert!(close(summary.std.unwrap(), 2.5f64.sqrt()));
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.q3, 4.0);
        assert_eq!(summary.max, 5.0);
        assert!(close(summary.skew.unwrap(), 0.0));
        assert!(close(summary.kurtosis.unwrap(), -1.2));

        assert!(summarize(&[]).is_none());
        assert!(summarize(&[f64::NAN]).is_none());
    }

    #[test]
    fn test_quantile_interpolates() {
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0], 0.5), Some(2.5));
        assert_eq!(quantile(&[10.0], 0.75), Some(10.0));
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[1.0], 1.5), None);
    }

    #[test]
    fn test_skewness_direction() {
        let right = [1.0, 1.0, 1.0, 2.0, 10.0];
        assert!(skewness(&right).unwrap() > 1.0);
        let left = [-10.0, -2.0, -1.0, -1.0, -1.0];
        assert!(skewness(&left).unwrap() < -1.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), Some(0.0));
        assert_eq!(skewness(&[1.0, 2.0]), None);
    }

    #[test]
    fn test_jarque_bera() {
        let (jb, p) = jarque_bera(&[1.0, 1.0, 1.0, 2.0, 50.0]).unwrap();
        assert!(jb > 0.0);
        assert!(p < 0.5);
        assert!(jarque_bera(&[2.0, 2.0, 2.0]).is_none());
    }

    #[test]
    fn test_pearson() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        assert!(close(pearson(&pairs).unwrap(), 1.0));

        let inverse: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -(i as f64))).collect();
        assert!(close(pearson(&inverse).unwrap(), -1.0));

        let flat: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0)).collect();
        assert_eq!(pearson(&flat), None);
    }

    #[test]
    fn test_cramers_v() {
        let perfect: Vec<(&str, &str)> = vec![("a", "x"), ("b", "y"), ("a", "x"), ("b", "y")];
        assert!(close(cramers_v(&perfect).unwrap(), 1.0));

        let independent: Vec<(&str, &str)> =
            vec![("a", "x"), ("a", "y"), ("b", "x"), ("b", "y")];
        assert!(close(cramers_v(&independent).unwrap(), 0.0));

        let single: Vec<(&str, &str)> = vec![("a", "x"), ("a", "y")];
        assert_eq!(cramers_v(&single), None);
    }

    #[test]
    fn test_correlation_ratio() {
        let separated = vec![("a", 1.0), ("a", 1.0), ("b", 5.0), ("b", 5.0)];
        assert!(close(correlation_ratio(&separated).unwrap(), 1.0));

        let mixed = vec![("a", 1.0), ("a", 5.0), ("b", 1.0), ("b", 5.0)];
        assert!(close(correlation_ratio(&mixed).unwrap(), 0.0));

        assert_eq!(correlation_ratio(&[("a", 1.0), ("a", 2.0)]), None);
    }

    #[test]
    fn test_distribution_tails() {
        assert!((chi_squared_sf(3.841_458_820_694_124, 1.0) - 0.05).abs() < 1e-6);
        assert!((chi_squared_sf(6.0, 2.0) - (-3.0f64).exp()).abs() < 1e-9);
        assert!((chi_squared_sf(9.0, 4.0) - (-4.5f64).exp() * 5.5).abs() < 1e-9);
        assert_eq!(chi_squared_sf(0.0, 3.0), 1.0);

        assert!((student_t_two_sided(2.228_138_851_986_274, 10.0) - 0.05).abs() < 1e-6);
        assert!((student_t_two_sided(0.0, 5.0) - 1.0).abs() < 1e-12);

        assert!((f_sf(12.0, 2.0, 6.0) - 0.008).abs() < 1e-9);
        assert!((f_sf(3.708_264_819, 3.0, 10.0) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_chi_squared_test() {
        let mut associated: Vec<(&str, &str)> = Vec::new();
        for (a, b) in [("a", "x"), ("b", "y"), ("c", "z")] {
            associated.extend(std::iter::repeat_n((a, b), 3));
        }
        let (test, dof) = chi_squared_test(&associated).unwrap();
        assert_eq!(dof, 4);
        assert!(close(test.statistic, 18.0));
        assert!((test.p_value - 10.0 * (-9.0f64).exp()).abs() < 1e-9);

        // 2x2 tables get the continuity correction
        let mut paired: Vec<(&str, &str)> = std::iter::repeat_n(("a", "x"), 10).collect();
        paired.extend(std::iter::repeat_n(("b", "y"), 10));
        let (test, dof) = chi_squared_test(&paired).unwrap();
        assert_eq!(dof, 1);
        assert!(close(test.statistic, 16.2));
        assert!(test.p_value < 1e-3);

        let single: Vec<(&str, &str)> = vec![("a", "x"), ("a", "y")];
        assert!(chi_squared_test(&single).is_none());
    }

    #[test]
    fn test_t_test() {
        let test = t_test(&[1.0, 2.0, 3.0, 4.0, 5.0], &[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        assert!(close(test.statistic, -5.0));
        assert!(test.p_value > 0.0005 && test.p_value < 0.002);

        let same = t_test(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!(close(same.statistic, 0.0));
        assert!(close(same.p_value, 1.0));

        assert!(t_test(&[1.0], &[2.0]).is_none());
        assert!(t_test(&[2.0, 2.0], &[2.0, 2.0]).is_none());
    }

    #[test]
    fn test_one_way_anova() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let test = one_way_anova(&groups).unwrap();
        assert!(close(test.statistic, 27.0));
        assert!((test.p_value - 0.001).abs() < 1e-9);

        assert!(one_way_anova(&[vec![1.0, 2.0]]).is_none());
        assert!(one_way_anova(&[vec![1.0, 1.0], vec![3.0, 3.0]]).is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.34567, 2), 2.35);
        assert_eq!(round_to(97.14, 1), 97.1);
    }
}
