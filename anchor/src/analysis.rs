//! Deterministic portfolio analysis.
//!
//! The report produced here is what a snapshot attests to: [`AnalysisReport::snapshot_id`]
//! hashes its canonical JSON encoding into the [`SnapshotId`] that gets anchored.

use crate::constants::{
    AGGRESSIVE_ALLOCATION, BALANCED_ALLOCATION, CONSERVATIVE_ALLOCATION, DEFAULT_RISK_WEIGHT,
    HHI_HIGHLY_DIVERSIFIED, HHI_MODERATELY_DIVERSIFIED, REBALANCE_THRESHOLD, RISK_LOW,
    RISK_MODERATE, RISK_WEIGHTS,
};
use crate::types::SnapshotId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Portfolio contains no assets.")]
    EmptyPortfolio,

    #[error("Total portfolio value must be positive.")]
    NonPositiveTotal,

    #[error("Invalid risk profile. Choose: conservative, balanced, aggressive")]
    InvalidRiskProfile(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    /// Asset class, e.g. `stock`, `bond`, `crypto`.
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
        }
    }

    /// Ideal class allocation (percent), in suggestion order.
    pub fn ideal_allocation(&self) -> &'static [(&'static str, f64)] {
        match self {
            Self::Conservative => &CONSERVATIVE_ALLOCATION,
            Self::Balanced => &BALANCED_ALLOCATION,
            Self::Aggressive => &AGGRESSIVE_ALLOCATION,
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskProfile {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(AnalysisError::InvalidRiskProfile(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Summary {
    pub total_value: f64,
    pub asset_allocations_percent: BTreeMap<String, f64>,
    pub class_allocations_percent: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diversification {
    pub hhi: f64,
    pub diversification_level: String,
    pub score: u32,
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Risk {
    pub risk_score: f64,
    pub risk_level: String,
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rebalancing {
    pub profile_used: RiskProfile,
    pub suggestions: Vec<String>,
    pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: Summary,
    pub diversification: Diversification,
    pub risk: Risk,
    pub rebalancing: Rebalancing,
}

impl AnalysisReport {
    /// Keccak-256 of the report's canonical JSON (object keys sorted).
    pub fn snapshot_id(&self) -> Result<SnapshotId, AnalysisError> {
        // `Value` objects are BTreeMap-backed, so re-encoding through it sorts every key.
        let value = serde_json::to_value(self).map_err(|e| AnalysisError::Serialization(e.to_string()))?;
        let bytes = serde_json::to_vec(&value).map_err(|e| AnalysisError::Serialization(e.to_string()))?;
        Ok(SnapshotId::digest(bytes))
    }
}

/// Run the full pipeline: aggregation, diversification, risk and rebalancing.
pub fn analyze(portfolio: &Portfolio, profile: RiskProfile) -> Result<AnalysisReport, AnalysisError> {
    let summary = aggregate(portfolio)?;
    let diversification = diversification(&summary);
    let risk = risk(&summary);
    let rebalancing = rebalancing(&summary, profile);

    Ok(AnalysisReport {
        summary,
        diversification,
        risk,
        rebalancing,
    })
}

fn aggregate(portfolio: &Portfolio) -> Result<Summary, AnalysisError> {
    if portfolio.assets.is_empty() {
        return Err(AnalysisError::EmptyPortfolio);
    }

    let total_value: f64 = portfolio.assets.iter().map(|a| a.value).sum();
    if total_value <= 0.0 {
        return Err(AnalysisError::NonPositiveTotal);
    }

    // A repeated symbol keeps its last allocation.
    let mut asset_allocations_percent = BTreeMap::new();
    for asset in &portfolio.assets {
        asset_allocations_percent.insert(asset.symbol.clone(), round_to(asset.value * 100.0 / total_value, 2));
    }

    let mut class_totals: BTreeMap<String, f64> = BTreeMap::new();
    for asset in &portfolio.assets {
        *class_totals.entry(asset.asset_type.clone()).or_default() += asset.value;
    }

    let class_allocations_percent = class_totals
        .into_iter()
        .map(|(class, value)| (class, round_to(value * 100.0 / total_value, 2)))
        .collect();

    Ok(Summary {
        total_value,
        asset_allocations_percent,
        class_allocations_percent,
    })
}

/// Herfindahl-Hirschman index over per-symbol weights.
fn diversification(summary: &Summary) -> Diversification {
    let hhi = summary
        .asset_allocations_percent
        .values()
        .map(|pct| (pct / 100.0).powi(2))
        .sum::<f64>();
    let hhi = round_to(hhi, 4);

    let (level, score) = if hhi < HHI_HIGHLY_DIVERSIFIED {
        ("Highly Diversified", 90)
    } else if hhi < HHI_MODERATELY_DIVERSIFIED {
        ("Moderately Diversified", 70)
    } else {
        ("Concentrated", 40)
    };

    Diversification {
        hhi,
        diversification_level: level.to_string(),
        score,
        explanation: format!(
            "HHI = {}. Lower values indicate better diversification.",
            decimal_text(hhi)
        ),
    }
}

fn risk(summary: &Summary) -> Risk {
    let weighted = summary
        .class_allocations_percent
        .iter()
        .map(|(class, pct)| pct / 100.0 * risk_weight(class))
        .sum::<f64>();
    let risk_score = round_to(weighted, 2);

    let level = if risk_score < RISK_LOW {
        "Low"
    } else if risk_score < RISK_MODERATE {
        "Moderate"
    } else {
        "High"
    };

    Risk {
        risk_score,
        risk_level: level.to_string(),
        explanation: "Risk calculated using weighted exposure to asset classes.".to_string(),
    }
}

fn rebalancing(summary: &Summary, profile: RiskProfile) -> Rebalancing {
    let mut suggestions = Vec::new();

    for (class, ideal) in profile.ideal_allocation() {
        let actual = summary.class_allocations_percent.get(*class).copied().unwrap_or(0.0);
        let deviation = actual - ideal;

        if deviation.abs() > REBALANCE_THRESHOLD {
            let verb = if deviation > 0.0 { "Reduce" } else { "Increase" };
            suggestions.push(format!(
                "{verb} {class} exposure by approx {}% (Profile: {profile}).",
                decimal_text(round_to(deviation.abs(), 2))
            ));
        }
    }

    Rebalancing {
        profile_used: profile,
        suggestions,
        explanation: "Suggestions based on selected risk profile.".to_string(),
    }
}

fn risk_weight(class: &str) -> f64 {
    RISK_WEIGHTS
        .iter()
        .find(|(name, _)| *name == class)
        .map(|(_, w)| *w)
        .unwrap_or(DEFAULT_RISK_WEIGHT)
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

/// Shortest round-trip text for `x`, always with a fractional part: `25.0`, `12.35`, `1.0`.
///
/// Report text is hashed into the snapshot id, so this must stay stable.
fn decimal_text(x: f64) -> String {
    let text = x.to_string();
    if x.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}
