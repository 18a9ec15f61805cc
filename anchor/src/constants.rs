//! Crate-wide constants shared by the registry and the portfolio analysis.

/// Width in bytes of every identifier (a 256-bit digest).
pub const ID_LEN: usize = 32;

/// Rejection message for a zero snapshot id.
pub const INVALID_SNAPSHOT_MSG: &str = "Invalid snapshot hash";

/// Rejection message for a snapshot id that is already anchored.
pub const DUPLICATE_PROOF_MSG: &str = "Proof already exists";

/// Deviation (in percentage points) above which a rebalancing suggestion is emitted.
pub const REBALANCE_THRESHOLD: f64 = 15.0;

/// Risk weight used for asset classes missing from [`RISK_WEIGHTS`].
pub const DEFAULT_RISK_WEIGHT: f64 = 3.0;

/// Per-class risk weights.
pub const RISK_WEIGHTS: [(&str, f64); 5] = [
    ("bond", 1.0),
    ("etf", 2.0),
    ("stock", 3.0),
    ("commodity", 3.0),
    ("crypto", 5.0),
];

// Ideal class allocations (percent) per risk profile.
//
// Order matters: rebalancing suggestions are emitted in this order.
pub const CONSERVATIVE_ALLOCATION: [(&str, f64); 5] = [
    ("stock", 30.0),
    ("crypto", 5.0),
    ("bond", 50.0),
    ("commodity", 10.0),
    ("etf", 5.0),
];

pub const BALANCED_ALLOCATION: [(&str, f64); 5] = [
    ("stock", 50.0),
    ("crypto", 10.0),
    ("bond", 25.0),
    ("commodity", 10.0),
    ("etf", 5.0),
];

pub const AGGRESSIVE_ALLOCATION: [(&str, f64); 5] = [
    ("stock", 60.0),
    ("crypto", 20.0),
    ("bond", 10.0),
    ("commodity", 5.0),
    ("etf", 5.0),
];

/// Upper bounds (exclusive) for the HHI diversification levels.
pub const HHI_HIGHLY_DIVERSIFIED: f64 = 0.15;
pub const HHI_MODERATELY_DIVERSIFIED: f64 = 0.25;

/// Upper bounds (exclusive) for the weighted risk levels.
pub const RISK_LOW: f64 = 2.0;
pub const RISK_MODERATE: f64 = 3.5;
