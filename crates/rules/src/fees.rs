//! Toll-road and parking fees declared in comments (`зсд 300 вкл`).

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Toll,
    Parking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fee {
    pub kind: FeeKind,
    pub amount: i64,
}

/// Fee pattern: regex plus the capture group holding the amount
pub struct FeePattern {
    pub kind: FeeKind,
    pub regex: Regex,
    pub amount_group: usize,
}

impl FeePattern {
    fn new(kind: FeeKind, pattern: &str, amount_group: usize) -> Self {
        let regex = Regex::new(&format!("(?i){pattern}")).unwrap();
        Self { kind, regex, amount_group }
    }

    fn amount(&self, comment: &str) -> Option<i64> {
        let caps = self.regex.captures(comment)?;
        let raw = caps.get(self.amount_group)?.as_str();
        match raw.parse::<i64>() {
            Ok(amount) => Some(amount),
            Err(_) => {
                log::debug!("fee amount {raw:?} not an integer, trying next pattern");
                None
            }
        }
    }
}

/// Ordered per kind; the first pattern yielding an amount wins
pub static FEE_PATTERNS: LazyLock<Vec<FeePattern>> = LazyLock::new(|| {
    vec![
        FeePattern::new(FeeKind::Toll, r"(платные? дороги?|платка|зсд)\D*(\d+)\s*вкл", 2),
        FeePattern::new(FeeKind::Toll, r"зсд/\+\s*(\d+)\s*зсд\s*вкл", 1),
        FeePattern::new(FeeKind::Parking, r"(платные? парковки?|парковка)\D*(\d+)\s*вкл", 2),
    ]
});

static FEE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(платные? дороги?|платка|зсд|платные? парковки?|парковка)").unwrap()
});

/// At most one fee per kind, tolls first
pub fn find_toll_and_parking_fees(comment: &str) -> Vec<Fee> {
    let mut fees = Vec::new();
    for kind in [FeeKind::Toll, FeeKind::Parking] {
        let found = FEE_PATTERNS
            .iter()
            .filter(|p| p.kind == kind)
            .find_map(|p| p.amount(comment));
        if let Some(amount) = found {
            log::debug!("fee found: {kind:?} {amount}");
            fees.push(Fee { kind, amount });
        }
    }
    fees
}

pub fn total(fees: &[Fee]) -> i64 {
    fees.iter().map(|f| f.amount).sum()
}

/// A toll/parking keyword is present but no `<amount> вкл` could be read
pub fn has_unconfirmed_fee_mention(comment: &str) -> bool {
    FEE_KEYWORD_RE.is_match(comment) && find_toll_and_parking_fees(comment).is_empty()
}
