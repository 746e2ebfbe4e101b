//! Recharge, split allocation and cashout arithmetic.
//!
//! All values are dollars rounded to cents after every computation.

use regex::Regex;
use std::sync::LazyLock;

use crate::relay::intent::Game;

/// Flat bonus applied on every recharge.
pub const RECHARGE_BONUS: f64 = 0.10;

/// Smallest payable cashout.
pub const MIN_CASHOUT: f64 = 40.0;

/// Points must be at least this multiple of the deposit to cash out.
pub const MIN_DEPOSIT_MULTIPLE: f64 = 3.0;

/// Cashouts never exceed this multiple of the deposit.
pub const MAX_DEPOSIT_MULTIPLE: f64 = 10.0;

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*(\d+(?:\.\d+)?)").expect("static regex"));

/// Round to cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Base amount plus the recharge bonus.
pub fn recharge_amount(base: f64) -> f64 {
    round_cents(base * (1.0 + RECHARGE_BONUS))
}

/// One game's share of a split recharge.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitAllocation {
    pub game: Game,
    pub username: String,
    pub amount: f64,
}

/// Divide `total` across the comma-separated segments of `text`.
///
/// Segments are processed in message order. A segment with an explicit
/// `$x.xx` takes that amount; otherwise it takes what is still unallocated
/// divided by the total number of segments. Every amount is capped at the
/// remaining balance. Segments naming no game, or left with nothing to
/// allocate, are skipped.
pub fn allocate_split(text: &str, total: f64) -> Vec<SplitAllocation> {
    let parts: Vec<&str> = text.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    let mut remaining = round_cents(total);
    let mut allocations = Vec::new();

    for part in &parts {
        let Some(game) = Game::find(part) else {
            continue;
        };

        let requested = match explicit_amount(part) {
            Some(amount) => amount,
            None => remaining / parts.len() as f64,
        };
        let amount = round_cents(requested.min(remaining));
        if amount <= 0.0 {
            continue;
        }
        remaining = round_cents(remaining - amount);

        allocations.push(SplitAllocation {
            game,
            username: game.username_in(part).unwrap_or_default(),
            amount,
        });
    }

    allocations
}

/// First `$x.xx` amount in `text`.
pub fn explicit_amount(text: &str) -> Option<f64> {
    DOLLAR_AMOUNT
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(round_cents)
}

/// An accepted cashout.
#[derive(Debug, Clone, PartialEq)]
pub struct CashoutQuote {
    pub deposit: f64,
    pub points: f64,
    pub amount: f64,
    pub points_remaining: f64,
    /// Eligible window for the next cashout, when points are left over.
    pub next_range: Option<(f64, f64)>,
}

/// Why a cashout was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum CashoutRejection {
    /// Fewer points than `min_points`.
    TooFewPoints { points: f64, min_points: f64 },
    /// More points than `max_points`.
    TooManyPoints { points: f64, max_points: f64 },
}

impl std::fmt::Display for CashoutRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { points, min_points } => {
                write!(f, "{points:.2} points is below the {min_points:.2} minimum")
            }
            Self::TooManyPoints { points, max_points } => {
                write!(f, "{points:.2} points is above the {max_points:.2} maximum")
            }
        }
    }
}

/// Check `points` against the deposit bounds and compute the payout.
pub fn quote_cashout(deposit: f64, points: f64) -> Result<CashoutQuote, CashoutRejection> {
    let deposit = round_cents(deposit);
    let points = round_cents(points);
    let min_points = round_cents(deposit * MIN_DEPOSIT_MULTIPLE);
    let max_points = round_cents(deposit * MAX_DEPOSIT_MULTIPLE);

    if points < min_points {
        return Err(CashoutRejection::TooFewPoints { points, min_points });
    }
    if points > max_points {
        return Err(CashoutRejection::TooManyPoints { points, max_points });
    }

    // Upper bound wins if the deposit is so small that 10x is under the minimum.
    let amount = round_cents(points.max(MIN_CASHOUT).min(max_points));

    let mut points_remaining = round_cents(points - amount);
    if points_remaining > max_points || points_remaining < 0.0 {
        points_remaining = 0.0;
    }

    let next_range = (points_remaining > 0.0).then(|| {
        (
            round_cents((points_remaining * MIN_DEPOSIT_MULTIPLE).max(MIN_CASHOUT)),
            round_cents(points_remaining * MAX_DEPOSIT_MULTIPLE),
        )
    });

    Ok(CashoutQuote {
        deposit,
        points,
        amount,
        points_remaining,
        next_range,
    })
}
