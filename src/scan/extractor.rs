use crate::core::currency::CurrencyCode;
use crate::scan::patterns::PatternSet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::str::FromStr;

/// A price found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedAmount {
    /// The matched substring, marker included.
    pub raw_text: String,
    /// Parsed magnitude with grouping removed.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    /// Byte range of `raw_text` in the scanned text.
    pub span: Range<usize>,
}

/// Finds prices in text using a [`PatternSet`].
///
/// Every rule is run over the whole text. Candidates are then accepted in
/// rule priority order (leftmost first within a rule), skipping any that
/// overlap an already accepted price. A candidate whose number fails to
/// parse is skipped without affecting the others.
///
/// # Examples
///
/// ```
/// use pricelens::scan::extractor::Extractor;
/// use rust_decimal_macros::dec;
///
/// let extractor = Extractor::default();
/// let found = extractor.extract("Total: $1,234.56");
///
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].amount, dec!(1234.56));
/// assert_eq!(found[0].currency.as_str(), "USD");
/// assert_eq!(found[0].raw_text, "$1,234.56");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    patterns: PatternSet,
}

impl Extractor {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Cheap pre-filter; `false` means [`extract`](Self::extract) would find nothing.
    pub fn may_contain_price(&self, text: &str) -> bool {
        self.patterns.may_contain_price(text)
    }

    /// All prices in `text`, ordered by position.
    pub fn extract(&self, text: &str) -> Vec<DetectedAmount> {
        let mut accepted: Vec<DetectedAmount> = Vec::new();

        for rule in self.patterns.rules() {
            for candidate in rule.matches(text) {
                if accepted
                    .iter()
                    .any(|found| overlaps(&found.span, &candidate.span))
                {
                    continue;
                }
                match parse_amount(candidate.number) {
                    Some(amount) => accepted.push(DetectedAmount {
                        raw_text: candidate.raw.to_string(),
                        amount,
                        currency: rule.currency().clone(),
                        span: candidate.span,
                    }),
                    None => log::debug!("skipping unparsable amount '{}'", candidate.raw),
                }
            }
        }

        accepted.sort_by_key(|found| found.span.start);
        accepted
    }
}

/// Normalize a matched number: drop `,` grouping and parse the rest exactly.
pub fn parse_amount(number: &str) -> Option<Decimal> {
    let cleaned: String = number.chars().filter(|&c| c != ',').collect();
    Decimal::from_str(&cleaned).ok()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
