use pricelens::core::conversion::RateBasis;
use pricelens::core::currency::{CurrencyCode, ExchangeRateTable};
use pricelens::rates::cache::{CachePolicy, RateCache};
use pricelens::rates::provider::StaticRateProvider;
use pricelens::scan::document::Document;
use pricelens::scan::extractor::Extractor;
use pricelens::scan::scanner::Scanner;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Currencies present in every generated table.
const POOL: [&str; 6] = ["USD", "EUR", "GBP", "JPY", "INR", "CHF"];

fn arb_currency() -> impl Strategy<Value = CurrencyCode> {
    prop::sample::select(POOL.to_vec()).prop_map(CurrencyCode::new)
}

/// Generate a positive rate between 0.0001 and 10,000 with four decimals.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

/// Generate a USD-based table covering the whole pool.
fn arb_table() -> impl Strategy<Value = ExchangeRateTable> {
    prop::collection::vec(arb_rate(), POOL.len() - 1).prop_map(|rates| {
        let entries = POOL[1..]
            .iter()
            .zip(rates)
            .map(|(code, rate)| (CurrencyCode::new(*code), rate));
        ExchangeRateTable::with_rates(CurrencyCode::new("USD"), entries).unwrap()
    })
}

/// Generate an amount between 0.01 and 1,000,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Generate digit-free filler text.
fn arb_filler() -> impl Strategy<Value = String> {
    "[a-z ]{0,20}"
}

/// Generate text holding a handful of prices in assorted notations.
fn arb_priced_text() -> impl Strategy<Value = String> {
    let price = (arb_amount(), 0usize..4).prop_map(|(amount, style)| match style {
        0 => format!("${}", amount),
        1 => format!("€{}", amount),
        2 => format!("{} GBP", amount),
        _ => format!("CHF {}", amount),
    });
    prop::collection::vec((arb_filler(), price), 1..6).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(filler, price)| format!("{} {} ", filler, price))
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn cache_for(table: ExchangeRateTable) -> RateCache {
    RateCache::new(
        Arc::new(StaticRateProvider::from_table(table)),
        CachePolicy::default(),
    )
}

/// A cache that reads each conversion from the source currency's own table.
fn direct_cache_for(table: ExchangeRateTable) -> RateCache {
    RateCache::new(
        Arc::new(StaticRateProvider::from_table(table)),
        CachePolicy {
            basis: RateBasis::Direct,
            ..CachePolicy::default()
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

/// Insert `,` thousands separators into the integer part.
fn grouped(amount: Decimal) -> String {
    let text = format!("{:.2}", amount);
    let (integer, fraction) = text.split_once('.').unwrap();
    let mut out = String::new();
    for (i, ch) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{}.{}", out, fraction)
}

proptest! {
    // ===================================================================
    // INVARIANT 1: Same-currency conversion is the identity.
    //
    // Converting X to X yields the amount unchanged at rate exactly one,
    // whatever the table says.
    // ===================================================================
    #[test]
    fn identity_conversion(table in arb_table(), amount in arb_amount(), currency in arb_currency()) {
        let cache = cache_for(table);
        let result = runtime()
            .block_on(cache.convert(amount, &currency, &currency))
            .unwrap();
        prop_assert_eq!(result.converted_amount, amount);
        prop_assert_eq!(result.rate, Decimal::ONE);
    }

    // ===================================================================
    // INVARIANT 2: A → B → A returns the original amount.
    //
    // Within one table snapshot the round trip only loses precision to
    // decimal division; the drift stays within a hundredth of a cent.
    // ===================================================================
    #[test]
    fn round_trip_conversion(
        table in arb_table(),
        amount in arb_amount(),
        from in arb_currency(),
        to in arb_currency()
    ) {
        let cache = cache_for(table);
        let rt = runtime();
        let there = rt.block_on(cache.convert(amount, &from, &to)).unwrap();
        let back = rt
            .block_on(cache.convert(there.converted_amount, &to, &from))
            .unwrap();

        let drift = (back.converted_amount - amount).abs();
        prop_assert!(
            drift <= Decimal::new(1, 4),
            "{} {} -> {} {} -> {} {}",
            amount, from, there.converted_amount, to, back.converted_amount, from
        );
    }

    // ===================================================================
    // INVARIANT 2b: The round trip also holds when each leg reads its
    // source currency's own table.
    //
    // A → B comes from A's table and B → A from B's, two independently
    // rebased snapshots of the same rates.
    // ===================================================================
    #[test]
    fn round_trip_conversion_direct_basis(
        table in arb_table(),
        amount in arb_amount(),
        from in arb_currency(),
        to in arb_currency()
    ) {
        let cache = direct_cache_for(table);
        let rt = runtime();
        let there = rt.block_on(cache.convert(amount, &from, &to)).unwrap();
        let back = rt
            .block_on(cache.convert(there.converted_amount, &to, &from))
            .unwrap();

        let drift = (back.converted_amount - amount).abs();
        prop_assert!(
            drift <= Decimal::new(1, 4),
            "{} {} -> {} {} -> {} {}",
            amount, from, there.converted_amount, to, back.converted_amount, from
        );
    }

    // ===================================================================
    // INVARIANT 3: Scanning is idempotent.
    //
    // A second scan over an unchanged document tags nothing new and
    // leaves the markup byte-for-byte the same.
    // ===================================================================
    #[test]
    fn scan_is_idempotent(text in arb_priced_text()) {
        let mut doc = Document::from_text(&text);
        let root = doc.root();
        let scanner = Scanner::default();

        let first = scanner.scan(&mut doc, root);
        let markup = doc.to_markup(root);
        let second = scanner.scan(&mut doc, root);

        prop_assert!(first.amounts_tagged() > 0);
        prop_assert_eq!(second.amounts_tagged(), 0);
        prop_assert_eq!(doc.to_markup(root), markup);
    }

    // ===================================================================
    // INVARIANT 4: Scanning preserves the visible text.
    //
    // Wrapping only adds structure; the concatenated text is unchanged.
    // ===================================================================
    #[test]
    fn scan_preserves_text(text in arb_priced_text()) {
        let mut doc = Document::from_text(&text);
        let root = doc.root();
        let before = doc.text_content(root);
        Scanner::default().scan(&mut doc, root);
        prop_assert_eq!(doc.text_content(root), before);
    }

    // ===================================================================
    // INVARIANT 5: Grouping separators never change the parsed amount.
    //
    // "$1,234.56" and "$1234.56" both extract as 1234.56 USD.
    // ===================================================================
    #[test]
    fn extraction_normalizes_grouping(amount in arb_amount()) {
        let extractor = Extractor::default();
        let with_commas = extractor.extract(&format!("Total: ${}", grouped(amount)));
        let plain = extractor.extract(&format!("Total: ${:.2}", amount));

        prop_assert_eq!(with_commas.len(), 1);
        prop_assert_eq!(plain.len(), 1);
        prop_assert_eq!(with_commas[0].amount, amount);
        prop_assert_eq!(plain[0].amount, amount);
        prop_assert_eq!(with_commas[0].currency.as_str(), "USD");
    }

    // ===================================================================
    // INVARIANT 6: Every extracted span indexes its raw text.
    // ===================================================================
    #[test]
    fn spans_match_raw_text(text in arb_priced_text()) {
        for found in Extractor::default().extract(&text) {
            prop_assert_eq!(&text[found.span.clone()], found.raw_text.as_str());
        }
    }
}
