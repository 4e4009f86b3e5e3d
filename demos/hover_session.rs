//! Hover session walk-through.
//!
//! Scans a small page, hovers its prices through the rate service, then
//! switches the target currency and shows that earlier results are not
//! reused. Rates come from a fixed table, so no network access is needed.

use pricelens::core::currency::{CurrencyCode, ExchangeRateTable};
use pricelens::rates::cache::{CachePolicy, RateCache};
use pricelens::rates::message::Notification;
use pricelens::rates::provider::StaticRateProvider;
use pricelens::rates::service::RateService;
use pricelens::scan::document::Document;
use pricelens::scan::interaction::{DisplayInstruction, Interaction};
use pricelens::scan::page::Page;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::watch;

const PAGE: &str = "\
Wireless headphones: $149.99
Ships from Berlin for €12.50
Collector's edition, 4,800 JPY
Tip jar accepts 0.0005 BTC";

fn describe(instruction: Option<DisplayInstruction>) -> String {
    match instruction {
        Some(DisplayInstruction::Converted { original, result }) => {
            format!("{:<12} → {}", original, result)
        }
        Some(DisplayInstruction::Failed { original, error }) => {
            format!("{:<12} ✗ {}", original, error)
        }
        Some(DisplayInstruction::Loading { original }) => format!("{:<12} …", original),
        None => "(nothing to show)".to_string(),
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("╔══════════════════════════════════════╗");
    println!("║  pricelens: Hover Session Example    ║");
    println!("╚══════════════════════════════════════╝\n");

    let table = ExchangeRateTable::with_rates(
        CurrencyCode::new("USD"),
        vec![
            (CurrencyCode::new("EUR"), dec!(0.91)),
            (CurrencyCode::new("GBP"), dec!(0.79)),
            (CurrencyCode::new("JPY"), dec!(151.20)),
        ],
    )
    .expect("demo rates are positive");
    let cache = Arc::new(RateCache::new(
        Arc::new(StaticRateProvider::from_table(table)),
        CachePolicy::default(),
    ));
    let (preferred_tx, preferred) = watch::channel(CurrencyCode::new("EUR"));
    let service = RateService::new(Arc::clone(&cache), preferred).spawn(16);

    // --- Step 1: Scan ---
    println!("━━━ Step 1: Scan ━━━\n");
    let mut page = Page::new(Document::from_text(PAGE), CurrencyCode::new("EUR"));
    let report = page.scan();
    for tagged in page.tagged_amounts() {
        println!("  {:<14} {} {}", tagged.original, tagged.amount, tagged.currency);
    }
    println!("\nTagged {} prices", report.amounts_tagged());
    println!("Second scan tags {} more\n", page.scan().amounts_tagged());

    // --- Step 2: Hover in EUR ---
    println!("━━━ Step 2: Hover (target EUR) ━━━\n");
    let tagged = page.tagged_amounts();
    for price in &tagged {
        let shown = page.hover_and_resolve(price.node, &service).await;
        println!("  {}", describe(shown));
        page.leave(price.node);
    }
    println!("\nProvider fetches so far: {}", cache.fetch_count());

    // --- Step 3: Hover again (local cache) ---
    println!("\n━━━ Step 3: Hover again ━━━\n");
    match page.hover(tagged[0].node) {
        Interaction::Ready(instruction) => {
            println!("  answered locally: {}", describe(Some(instruction)))
        }
        other => println!("  unexpected: {:?}", other),
    }
    page.leave(tagged[0].node);

    // --- Step 4: Change target ---
    println!("\n━━━ Step 4: Switch target to GBP ━━━\n");
    let gbp = CurrencyCode::new("GBP");
    if preferred_tx.send(gbp.clone()).is_err() {
        eprintln!("rate service has stopped");
    }
    page.notify(Notification::SettingsChanged {
        target_currency: gbp,
    });
    println!(
        "  preferred currency reported by service: {}",
        service
            .preferred_currency()
            .await
            .map(|c| c.to_string())
            .unwrap_or_else(|e| e.to_string())
    );
    let shown = page.hover_and_resolve(tagged[0].node, &service).await;
    println!("  {}", describe(shown));
}
