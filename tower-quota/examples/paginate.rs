use std::time::Duration;
use std::time::Instant;

use quota_ledger::presets;
use quota_ledger::presets::fba_inbound::LIST_INBOUND_SHIPMENTS;
use quota_ledger::presets::fba_inbound::LIST_INBOUND_SHIPMENTS_BY_NEXT_TOKEN;
use tokio::time::sleep;
use tower_quota::CallError;
use tower_quota::ServiceError;
use tower_quota::ThrottleManager;

const PAGES: usize = 36;

// Stands in for the remote listing endpoint: one shipment per page.
async fn fetch_page(page: usize) -> Result<(String, Option<usize>), ServiceError> {
    sleep(Duration::from_millis(5)).await;
    if page == 33 {
        return Err(ServiceError::throttled("Request is throttled"));
    }
    let next = (page + 1 < PAGES).then_some(page + 1);
    Ok((format!("FBA{page:05}"), next))
}

#[tokio::main]
async fn main() -> Result<(), tower::BoxError> {
    let manager = ThrottleManager::new(presets::fba_inbound())?;
    let start = Instant::now();

    println!("🚀 Listing {PAGES} pages of inbound shipments");
    println!("Quota: {LIST_INBOUND_SHIPMENTS} (Max: 30, Restore: 2/s), continuations share it\n");

    let mut next = Some(0);
    let mut first = true;
    while let Some(page) = next {
        let action = if first {
            LIST_INBOUND_SHIPMENTS
        } else {
            LIST_INBOUND_SHIPMENTS_BY_NEXT_TOKEN
        };
        first = false;

        match manager.throttled_call(action, page, fetch_page).await {
            Ok((shipment, following)) => {
                println!("[{:>7.2?}] ✅ page {page:02}: {shipment}", start.elapsed());
                next = following;
            }
            Err(CallError::RemoteThrottled(err)) => {
                println!("[{:>7.2?}] ⚠️ page {page:02}: {err}", start.elapsed());
                next = (page + 1 < PAGES).then_some(page + 1);
            }
            Err(err) => {
                println!("[{:>7.2?}] 💥 page {page:02}: {err}", start.elapsed());
                return Err(err.into());
            }
        }
    }

    println!(
        "\n🏁 Done in {:.2?}, {:.1} tokens left",
        start.elapsed(),
        manager.available(LIST_INBOUND_SHIPMENTS)?
    );
    Ok(())
}
