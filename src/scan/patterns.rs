//! Currency pattern rules.
//!
//! A rule pairs one currency marker (a symbol such as `€` or a code such as
//! `GBP`, written before or after the number) with a number format. Rules
//! are kept in a fixed priority order; the extractor resolves overlapping
//! matches by that order, so the order is part of the matching contract.

use crate::core::currency::CurrencyCode;
use regex::Regex;
use std::ops::Range;

/// Where the marker sits relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPosition {
    Prefix,
    Suffix,
}

/// Shape of the numeric part of a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    /// Accept `,` thousands grouping.
    pub grouped: bool,
    /// Longest accepted fraction after `.`.
    pub max_fraction_digits: u32,
}

impl NumberFormat {
    /// `1,234.56`
    pub const STANDARD: NumberFormat = NumberFormat {
        grouped: true,
        max_fraction_digits: 2,
    };
    /// `0.00012345`
    pub const CRYPTO: NumberFormat = NumberFormat {
        grouped: false,
        max_fraction_digits: 8,
    };

    fn pattern(&self) -> String {
        let integer = if self.grouped {
            "[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+"
        } else {
            "[0-9]+"
        };
        if self.max_fraction_digits == 0 {
            format!("(?:{integer})")
        } else {
            format!(
                "(?:{integer})(?:\\.[0-9]{{1,{}}})?",
                self.max_fraction_digits
            )
        }
    }
}

/// Declarative description of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub marker: String,
    pub position: MarkerPosition,
    pub currency: CurrencyCode,
    pub number: NumberFormat,
}

impl RuleSpec {
    pub fn prefix(marker: &str, currency: &str, number: NumberFormat) -> Self {
        Self {
            marker: marker.to_string(),
            position: MarkerPosition::Prefix,
            currency: CurrencyCode::new(currency),
            number,
        }
    }

    pub fn suffix(marker: &str, currency: &str, number: NumberFormat) -> Self {
        Self {
            marker: marker.to_string(),
            position: MarkerPosition::Suffix,
            currency: CurrencyCode::new(currency),
            number,
        }
    }

    fn is_code(&self) -> bool {
        self.marker.chars().all(|c| c.is_ascii_alphabetic())
    }
}

/// One match of a rule: the whole price and its numeric part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'t> {
    pub span: Range<usize>,
    pub raw: &'t str,
    pub number: &'t str,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    spec: RuleSpec,
    regex: Regex,
}

impl PatternRule {
    pub fn compile(spec: RuleSpec) -> Result<Self, regex::Error> {
        let escaped = regex::escape(&spec.marker);
        // Codes must not be glued to surrounding letters (`USDT`, `XUSD`).
        let marker = match (spec.is_code(), spec.position) {
            (true, MarkerPosition::Prefix) => format!("\\b(?i:{escaped})"),
            (true, MarkerPosition::Suffix) => format!("(?i:{escaped})\\b"),
            (false, _) => escaped,
        };
        let number = format!("(?P<amount>{})", spec.number.pattern());
        let pattern = match spec.position {
            MarkerPosition::Prefix => format!("{marker}\\s?{number}"),
            MarkerPosition::Suffix => format!("{number}\\s?{marker}"),
        };
        Ok(Self {
            regex: Regex::new(&pattern)?,
            spec,
        })
    }

    pub fn spec(&self) -> &RuleSpec {
        &self.spec
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.spec.currency
    }

    /// Matches in `text`, leftmost first.
    ///
    /// A match whose number runs into further digits (`$1,2345`, `$1.234`)
    /// or, for suffix markers, starts mid-number (`1234,567 USD`) is dropped
    /// rather than truncated.
    pub fn matches<'t>(&'t self, text: &'t str) -> impl Iterator<Item = RuleMatch<'t>> + 't {
        self.regex.captures_iter(text).filter_map(move |caps| {
            let whole = caps.get(0)?;
            let number = caps.name("amount")?;

            let next = text[number.end()..].chars().next();
            if number.end() == whole.end() && next.is_some_and(|c| c.is_ascii_digit()) {
                return None;
            }
            if text[number.end()..].starts_with('.')
                && text[number.end() + 1..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit())
            {
                return None;
            }
            if self.spec.position == MarkerPosition::Suffix {
                let prev = text[..number.start()].chars().next_back();
                if prev.is_some_and(|c| c.is_ascii_digit() || c == ',' || c == '.') {
                    return None;
                }
            }

            Some(RuleMatch {
                span: whole.start()..whole.end(),
                raw: whole.as_str(),
                number: number.as_str(),
            })
        })
    }
}

/// Rules in priority order plus a cheap pre-filter over all their markers.
#[derive(Debug, Clone)]
pub struct PatternSet {
    rules: Vec<PatternRule>,
    prefilter: Option<Regex>,
}

impl PatternSet {
    /// Compile `specs`; earlier specs win overlaps against later ones.
    pub fn new(specs: Vec<RuleSpec>) -> Result<Self, regex::Error> {
        let rules = specs
            .into_iter()
            .map(PatternRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let mut symbols = Vec::new();
        let mut codes = Vec::new();
        for rule in &rules {
            let escaped = regex::escape(&rule.spec.marker);
            let bucket = if rule.spec.is_code() { &mut codes } else { &mut symbols };
            if !bucket.contains(&escaped) {
                bucket.push(escaped);
            }
        }
        let mut alternatives = Vec::new();
        if !symbols.is_empty() {
            alternatives.push(format!("(?:{})", symbols.join("|")));
        }
        if !codes.is_empty() {
            alternatives.push(format!("(?i:{})", codes.join("|")));
        }
        let prefilter = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&alternatives.join("|"))?)
        };

        Ok(Self { rules, prefilter })
    }

    /// The built-in rule set.
    ///
    /// Priority: prefix symbols (multi-character symbols before `$`), then
    /// suffix codes, then prefix codes.
    pub fn standard() -> Self {
        Self::new(standard_specs()).expect("built-in currency patterns are valid")
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Coarse check: does `text` contain any marker at all?
    pub fn may_contain_price(&self, text: &str) -> bool {
        self.prefilter.as_ref().is_some_and(|re| re.is_match(text))
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::standard()
    }
}

const CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "BTC",
];

fn code_format(code: &str) -> NumberFormat {
    match code {
        "BTC" => NumberFormat::CRYPTO,
        _ => NumberFormat::STANDARD,
    }
}

/// Rule specs of [`PatternSet::standard`], in priority order.
pub fn standard_specs() -> Vec<RuleSpec> {
    let mut specs = vec![
        RuleSpec::prefix("C$", "CAD", NumberFormat::STANDARD),
        RuleSpec::prefix("A$", "AUD", NumberFormat::STANDARD),
        RuleSpec::prefix("$", "USD", NumberFormat::STANDARD),
        RuleSpec::prefix("€", "EUR", NumberFormat::STANDARD),
        RuleSpec::prefix("£", "GBP", NumberFormat::STANDARD),
        RuleSpec::prefix("¥", "JPY", NumberFormat::STANDARD),
        RuleSpec::prefix("₹", "INR", NumberFormat::STANDARD),
    ];
    specs.extend(
        CODES
            .iter()
            .map(|code| RuleSpec::suffix(code, code, code_format(code))),
    );
    specs.extend(
        CODES
            .iter()
            .map(|code| RuleSpec::prefix(code, code, code_format(code))),
    );
    specs
}
