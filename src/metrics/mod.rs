//! Metrics engine (§4.E): pure functions over a company's extracted XBRL
//! time series — no I/O, no async, just arithmetic over `FinancialDataPoint`
//! slices sorted by period end.

use crate::parsers::{FinancialDataPoint, XbrlFacts};

/// Health score component weights (§4.E: `overall = 0.40·profitability +
/// 0.30·leverage + 0.30·growth`).
const PROFITABILITY_WEIGHT: f64 = 0.40;
const LEVERAGE_WEIGHT: f64 = 0.30;
const GROWTH_WEIGHT: f64 = 0.30;

/// Health-score grade bands (§4.E), each the minimum score for that grade.
const GRADE_EXCELLENT_MIN: f64 = 90.0;
const GRADE_GOOD_MIN: f64 = 70.0;
const GRADE_FAIR_MIN: f64 = 50.0;
const GRADE_POOR_MIN: f64 = 30.0;

/// Ratios computed from the latest reported period of each series (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Ratios {
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub net_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub gross_margin: Option<f64>,
    pub asset_turnover: Option<f64>,
    pub equity_multiplier: Option<f64>,
}

/// Period-over-period growth statistics for one metric's series (§4.E: "per
/// metric... avg, median, min, max, volatility").
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct MetricGrowth {
    pub avg: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub volatility: Option<f64>,
}

/// Per-metric growth, computed for every XBRL series the ratios engine also
/// reads (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct GrowthRates {
    pub revenue: Option<MetricGrowth>,
    pub net_income: Option<MetricGrowth>,
    pub total_assets: Option<MetricGrowth>,
    pub total_liabilities: Option<MetricGrowth>,
    pub equity: Option<MetricGrowth>,
    pub operating_income: Option<MetricGrowth>,
    pub gross_profit: Option<MetricGrowth>,
    pub cash: Option<MetricGrowth>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StatisticalSummary {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Coefficient of variation (`std_dev / |mean|`); `None` when the mean
    /// is zero and the ratio is undefined.
    pub cv: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

/// Trend direction plus the linear-regression fit strength behind it (§4.E:
/// "sign of linear regression slope and R² magnitude (strength)").
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrendResult {
    pub direction: Trend,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HealthGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub grade: HealthGrade,
}

/// Latest-period-end point from a series, the value ratios are computed
/// against when only a snapshot (not a trend) is needed.
fn latest(series: &[FinancialDataPoint]) -> Option<&FinancialDataPoint> {
    series.iter().max_by_key(|p| p.period_end)
}

fn annual_points(series: &[FinancialDataPoint]) -> Vec<&FinancialDataPoint> {
    let mut points: Vec<&FinancialDataPoint> = series
        .iter()
        .filter(|p| p.fiscal_period.as_deref() == Some("FY"))
        .collect();
    points.sort_by_key(|p| p.period_end);
    points
}

pub fn compute_ratios(facts: &XbrlFacts) -> Ratios {
    let revenue = latest(&facts.revenue).map(|p| p.value);
    let net_income = latest(&facts.net_income).map(|p| p.value);
    let assets = latest(&facts.total_assets).map(|p| p.value);
    let liabilities = latest(&facts.total_liabilities).map(|p| p.value);
    let equity = latest(&facts.equity).map(|p| p.value);
    let operating_income = latest(&facts.operating_income).map(|p| p.value);
    let gross_profit = latest(&facts.gross_profit).map(|p| p.value);

    Ratios {
        roe: ratio(net_income, equity),
        roa: ratio(net_income, assets),
        debt_to_equity: ratio(liabilities, equity),
        net_margin: ratio(net_income, revenue),
        operating_margin: ratio(operating_income, revenue),
        gross_margin: ratio(gross_profit, revenue),
        asset_turnover: ratio(revenue, assets),
        equity_multiplier: ratio(assets, equity),
    }
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

pub fn compute_growth_rates(facts: &XbrlFacts) -> GrowthRates {
    GrowthRates {
        revenue: metric_growth(&facts.revenue),
        net_income: metric_growth(&facts.net_income),
        total_assets: metric_growth(&facts.total_assets),
        total_liabilities: metric_growth(&facts.total_liabilities),
        equity: metric_growth(&facts.equity),
        operating_income: metric_growth(&facts.operating_income),
        gross_profit: metric_growth(&facts.gross_profit),
        cash: metric_growth(&facts.cash),
    }
}

/// Period-over-period growth rates between consecutive annual points.
fn growth_series(series: &[FinancialDataPoint]) -> Vec<f64> {
    annual_points(series)
        .windows(2)
        .filter_map(|pair| {
            let (prior, latest) = (pair[0], pair[1]);
            if prior.value == 0.0 {
                None
            } else {
                Some((latest.value - prior.value) / prior.value.abs())
            }
        })
        .collect()
}

/// avg/median/min/max/volatility of a metric's annual growth-rate series
/// (§4.E: "per metric... avg, median, min, max, volatility").
fn metric_growth(series: &[FinancialDataPoint]) -> Option<MetricGrowth> {
    let rates = growth_series(series);
    let stats = compute_statistics(&rates)?;
    Some(MetricGrowth {
        avg: Some(stats.mean),
        median: Some(stats.median),
        min: Some(stats.min),
        max: Some(stats.max),
        volatility: Some(stats.std_dev),
    })
}

pub fn compute_statistics(values: &[f64]) -> Option<StatisticalSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    let median = if sorted.len() % 2 == 0 {
        (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
    } else {
        sorted[sorted.len() / 2]
    };
    let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / sorted.len() as f64;
    let std_dev = variance.sqrt();
    let cv = if mean != 0.0 { Some(std_dev / mean.abs()) } else { None };

    Some(StatisticalSummary {
        mean,
        median,
        std_dev,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        cv,
    })
}

/// Coefficient of variation (std_dev / |mean|) as a volatility measure.
pub fn volatility(values: &[f64]) -> Option<f64> {
    compute_statistics(values)?.cv
}

/// Trend direction and strength from an ordinary least-squares fit of value
/// against period index (§4.E: "sign of linear regression slope and R²
/// magnitude (strength)"). Direction is judged on the slope relative to the
/// series mean, holding the prior implementation's 1% flatness band.
pub fn trend(series: &[FinancialDataPoint]) -> Option<TrendResult> {
    let mut points = series.to_vec();
    points.sort_by_key(|p| p.period_end);
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let xs: Vec<f64> = (0..points.len()).map(|i| i as f64).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut x_variance = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        covariance += (x - x_mean) * (y - y_mean);
        x_variance += (x - x_mean).powi(2);
    }
    if x_variance == 0.0 {
        return None;
    }
    let slope = covariance / x_variance;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        let ss_res: f64 = xs
            .iter()
            .zip(ys.iter())
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    let relative_slope = if y_mean != 0.0 { slope / y_mean.abs() } else { slope };
    let direction = if relative_slope > 0.01 {
        Trend::Rising
    } else if relative_slope < -0.01 {
        Trend::Falling
    } else {
        Trend::Flat
    };

    Some(TrendResult { direction, r_squared })
}

/// Weighted health score over profitability, leverage, and growth, each
/// normalized to 0-100 before weighting (§4.E).
pub fn health_score(ratios: &Ratios, growth: &GrowthRates) -> HealthScore {
    let profitability = normalize_margin(ratios.net_margin);
    let leverage = normalize_leverage(ratios.debt_to_equity);
    let growth_component = normalize_growth(growth.revenue.and_then(|g| g.avg));

    let score = PROFITABILITY_WEIGHT * profitability
        + LEVERAGE_WEIGHT * leverage
        + GROWTH_WEIGHT * growth_component;

    let grade = if score >= GRADE_EXCELLENT_MIN {
        HealthGrade::Excellent
    } else if score >= GRADE_GOOD_MIN {
        HealthGrade::Good
    } else if score >= GRADE_FAIR_MIN {
        HealthGrade::Fair
    } else if score >= GRADE_POOR_MIN {
        HealthGrade::Poor
    } else {
        HealthGrade::Critical
    };

    HealthScore { score, grade }
}

fn normalize_margin(margin: Option<f64>) -> f64 {
    // A 20% net margin maps to a full 100; negative margins clamp to 0.
    margin.map(|m| (m / 0.20 * 100.0).clamp(0.0, 100.0)).unwrap_or(50.0)
}

fn normalize_growth(growth: Option<f64>) -> f64 {
    // 15% average YoY growth maps to 100; shrinkage clamps to 0.
    growth.map(|g| (g / 0.15 * 100.0).clamp(0.0, 100.0)).unwrap_or(50.0)
}

fn normalize_leverage(debt_to_equity: Option<f64>) -> f64 {
    // Lower leverage is healthier: debt-to-equity of 0 maps to 100, 2.0 or
    // worse floors at 0.
    debt_to_equity
        .map(|d| ((1.0 - d / 2.0) * 100.0).clamp(0.0, 100.0))
        .unwrap_or(50.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point(end: &str, value: f64, fp: &str) -> FinancialDataPoint {
        FinancialDataPoint {
            period_end: NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
            value,
            fiscal_year: Some(2024),
            fiscal_period: Some(fp.to_string()),
            form: "10-K".to_string(),
            accession: "acc".to_string(),
        }
    }

    fn facts_with(
        revenue: Vec<FinancialDataPoint>,
        net_income: Vec<FinancialDataPoint>,
        total_assets: Vec<FinancialDataPoint>,
        total_liabilities: Vec<FinancialDataPoint>,
        equity: Vec<FinancialDataPoint>,
    ) -> XbrlFacts {
        XbrlFacts {
            revenue,
            net_income,
            total_assets,
            total_liabilities,
            equity,
            ..Default::default()
        }
    }

    #[test]
    fn computes_ratios_across_the_full_set() {
        let facts = XbrlFacts {
            revenue: vec![point("2024-12-31", 1000.0, "FY")],
            net_income: vec![point("2024-12-31", 100.0, "FY")],
            total_assets: vec![point("2024-12-31", 500.0, "FY")],
            total_liabilities: vec![point("2024-12-31", 200.0, "FY")],
            equity: vec![point("2024-12-31", 300.0, "FY")],
            operating_income: vec![point("2024-12-31", 120.0, "FY")],
            gross_profit: vec![point("2024-12-31", 400.0, "FY")],
            ..Default::default()
        };
        let ratios = compute_ratios(&facts);
        assert_eq!(ratios.net_margin, Some(0.1));
        assert!((ratios.roe.unwrap() - 100.0 / 300.0).abs() < 1e-9);
        assert_eq!(ratios.roa, Some(0.2));
        assert!((ratios.debt_to_equity.unwrap() - 200.0 / 300.0).abs() < 1e-9);
        assert_eq!(ratios.operating_margin, Some(0.12));
        assert_eq!(ratios.gross_margin, Some(0.4));
        assert_eq!(ratios.asset_turnover, Some(2.0));
        assert!((ratios.equity_multiplier.unwrap() - 500.0 / 300.0).abs() < 1e-9);
    }

    #[test]
    fn computes_per_metric_growth_from_annual_points() {
        let facts = facts_with(
            vec![point("2023-12-31", 1000.0, "FY"), point("2024-12-31", 1100.0, "FY")],
            vec![],
            vec![],
            vec![],
            vec![],
        );
        let growth = compute_growth_rates(&facts);
        let revenue_growth = growth.revenue.unwrap();
        assert!((revenue_growth.avg.unwrap() - 0.10).abs() < 1e-9);
        assert!((revenue_growth.max.unwrap() - 0.10).abs() < 1e-9);
        assert!(growth.net_income.is_none());
    }

    #[test]
    fn statistics_carry_coefficient_of_variation() {
        let stats = compute_statistics(&[10.0, 10.0, 10.0]).unwrap();
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.cv, Some(0.0));
        assert_eq!(volatility(&[10.0, 10.0, 10.0]), Some(0.0));
    }

    #[test]
    fn trend_detects_rising_series_with_a_strong_fit() {
        let series = vec![
            point("2022-12-31", 100.0, "FY"),
            point("2023-12-31", 125.0, "FY"),
            point("2024-12-31", 150.0, "FY"),
        ];
        let result = trend(&series).unwrap();
        assert_eq!(result.direction, Trend::Rising);
        assert!(result.r_squared > 0.99);
    }

    #[test]
    fn trend_is_flat_within_the_one_percent_band() {
        let series = vec![
            point("2023-12-31", 100.0, "FY"),
            point("2024-12-31", 100.5, "FY"),
        ];
        assert_eq!(trend(&series).unwrap().direction, Trend::Flat);
    }

    #[test]
    fn health_score_grades_strong_company_as_a_or_b() {
        let ratios = Ratios {
            roe: Some(0.25),
            roa: Some(0.15),
            debt_to_equity: Some(0.2),
            net_margin: Some(0.22),
            operating_margin: Some(0.2),
            gross_margin: Some(0.5),
            asset_turnover: Some(1.2),
            equity_multiplier: Some(1.5),
        };
        let growth = GrowthRates {
            revenue: Some(MetricGrowth {
                avg: Some(0.18),
                median: Some(0.18),
                min: Some(0.15),
                max: Some(0.2),
                volatility: Some(0.02),
            }),
            ..Default::default()
        };
        let result = health_score(&ratios, &growth);
        assert!(matches!(result.grade, HealthGrade::Excellent | HealthGrade::Good));
    }

    #[test]
    fn health_score_penalizes_heavy_leverage() {
        fn ratios_with_leverage(debt_to_equity: f64) -> Ratios {
            Ratios {
                roe: None,
                roa: None,
                debt_to_equity: Some(debt_to_equity),
                net_margin: Some(0.1),
                operating_margin: None,
                gross_margin: None,
                asset_turnover: None,
                equity_multiplier: None,
            }
        }
        let growth = GrowthRates::default();
        let low = health_score(&ratios_with_leverage(0.1), &growth);
        let high = health_score(&ratios_with_leverage(3.0), &growth);
        assert!(low.score > high.score);
    }
}
