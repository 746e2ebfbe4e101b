//! Cash-in link verification.
//!
//! A link is accepted when it points at the Cash App payments host, carries an
//! `amount=` parameter, is addressed to the configured receiver and has not
//! been submitted before. Nothing here contacts Cash App.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

use crate::relay::amounts::round_cents;
use crate::relay::database::{Database, Receipt, StoreError};
use crate::relay::services::ReceiverParser;

/// Links must start with this.
pub const CASH_APP_PREFIX: &str = "https://cash.app/payments/";

static AMOUNT_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]amount=(\d+(?:\.\d+)?)").expect("static regex"));

/// Why a link was not accepted.
#[derive(Debug)]
pub enum VerifyError {
    NotCashApp,
    MissingAmount,
    InvalidAmount(f64),
    WrongReceiver(String),
    Duplicate,
    Store(StoreError),
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCashApp => write!(f, "not a Cash App payment link"),
            Self::MissingAmount => write!(f, "link has no amount"),
            Self::InvalidAmount(a) => write!(f, "link amount {} is not payable", a),
            Self::WrongReceiver(r) => write!(f, "payment went to {}", r),
            Self::Duplicate => write!(f, "link already submitted"),
            Self::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<StoreError> for VerifyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateReceipt(_) => Self::Duplicate,
            other => Self::Store(other),
        }
    }
}

/// The first whitespace-separated token mentioning `cash.app`.
pub fn extract_link(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|w| w.to_lowercase().contains("cash.app"))
        .map(|w| w.trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | '!')))
}

/// Dollar amount from the link's `amount=` parameter.
pub fn parse_amount(url: &str) -> Option<f64> {
    AMOUNT_PARAM
        .captures(url)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(round_cents)
}

/// Validate a link and record its receipt. Returns the paid amount.
pub fn verify_and_record(
    db: &Database,
    receivers: &dyn ReceiverParser,
    expected_receiver: &str,
    sender_id: &str,
    url: &str,
) -> Result<f64, VerifyError> {
    if !url.starts_with(CASH_APP_PREFIX) {
        return Err(VerifyError::NotCashApp);
    }
    let amount = parse_amount(url).ok_or(VerifyError::MissingAmount)?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(VerifyError::InvalidAmount(amount));
    }

    let receiver = receivers.receiver(url);
    if receiver != expected_receiver {
        return Err(VerifyError::WrongReceiver(receiver));
    }

    if db.receipt_exists(url)? {
        return Err(VerifyError::Duplicate);
    }
    db.insert_receipt(&Receipt::new(url, sender_id, amount))?;

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::services::StaticReceiver;

    const RECEIVER: &str = "$gamecashier";

    fn setup() -> (Database, StaticReceiver) {
        (Database::in_memory().unwrap(), StaticReceiver(RECEIVER.to_string()))
    }

    #[test]
    fn test_extract_link() {
        assert_eq!(
            extract_link("paid! https://cash.app/payments/abc?amount=10.00."),
            Some("https://cash.app/payments/abc?amount=10.00")
        );
        assert_eq!(extract_link("no link here"), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("https://cash.app/payments/abc?amount=10.50"), Some(10.5));
        assert_eq!(parse_amount("https://cash.app/payments/abc?x=1&amount=7"), Some(7.0));
        assert_eq!(parse_amount("https://cash.app/payments/abc?amount=ten"), None);
        assert_eq!(parse_amount("https://cash.app/payments/abc"), None);
    }

    #[test]
    fn test_first_submission_accepted_then_duplicate() {
        let (db, receivers) = setup();
        let url = "https://cash.app/payments/abc?amount=10.00";

        let amount = verify_and_record(&db, &receivers, RECEIVER, "psid-1", url).unwrap();
        assert_eq!(amount, 10.0);
        assert_eq!(db.counts().unwrap().receipts, 1);

        let err = verify_and_record(&db, &receivers, RECEIVER, "psid-1", url).unwrap_err();
        assert!(matches!(err, VerifyError::Duplicate));
        assert_eq!(db.counts().unwrap().receipts, 1);
    }

    #[test]
    fn test_rejects_other_hosts() {
        let (db, receivers) = setup();
        for url in [
            "http://cash.app/payments/abc?amount=10",
            "https://evil.example/cash.app/payments?amount=10",
            "https://cash.app/$someone?amount=10",
        ] {
            let err = verify_and_record(&db, &receivers, RECEIVER, "p", url).unwrap_err();
            assert!(matches!(err, VerifyError::NotCashApp), "{url}");
        }
        assert_eq!(db.counts().unwrap().receipts, 0);
    }

    #[test]
    fn test_rejects_missing_amount() {
        let (db, receivers) = setup();
        let err = verify_and_record(&db, &receivers, RECEIVER, "p", "https://cash.app/payments/abc").unwrap_err();
        assert!(matches!(err, VerifyError::MissingAmount));
    }

    #[test]
    fn test_rejects_unpayable_amounts() {
        let (db, receivers) = setup();
        let huge = format!("https://cash.app/payments/abc?amount={}", "9".repeat(400));
        for url in [huge.as_str(), "https://cash.app/payments/abc?amount=0", "https://cash.app/payments/abc?amount=0.001"] {
            let err = verify_and_record(&db, &receivers, RECEIVER, "p", url).unwrap_err();
            assert!(matches!(err, VerifyError::InvalidAmount(_)), "{url}");
        }
        assert_eq!(db.counts().unwrap().receipts, 0);
    }

    #[test]
    fn test_rejects_wrong_receiver() {
        let db = Database::in_memory().unwrap();
        let receivers = StaticReceiver("$someoneelse".to_string());
        let err = verify_and_record(&db, &receivers, RECEIVER, "p", "https://cash.app/payments/abc?amount=5")
            .unwrap_err();
        assert!(matches!(err, VerifyError::WrongReceiver(ref r) if r == "$someoneelse"));
        assert_eq!(db.counts().unwrap().receipts, 0);
    }
}
