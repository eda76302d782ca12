//! `tagwatch inventory`: scan and list every accepted tag.

use std::sync::Arc;

use chrono::SecondsFormat;
use tabled::Tabled;

use tagwatch_core::{SignalReading, TagObservation, Workflow};

use crate::cli::{GlobalOpts, InventoryArgs};
use crate::commands::scan::Workbench;
use crate::demo::Scenario;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "EPC")]
    epc: String,
    #[tabled(rename = "Product")]
    product: String,
    #[tabled(rename = "RSSI")]
    rssi: i32,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Last Seen")]
    seen: String,
}

fn to_row(tag: &Arc<TagObservation>) -> TagRow {
    TagRow {
        epc: tag.epc.clone(),
        product: tag.registration.label(),
        rssi: tag.rssi,
        distance: SignalReading::from_rssi(tag.rssi).distance.to_string(),
        seen: tag.seen_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

pub async fn handle(args: InventoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let bench = Workbench::for_scan(global, &args.scan)?;
    bench.engine.set_workflow(Workflow::Inventory);
    bench.engine.set_reading_target(args.product);

    let mut tags = bench.engine.tags();
    let scan = bench.begin(global, &args.scan, Scenario::default()).await?;
    let deadline = tokio::time::sleep(args.scan.duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            snapshot = tags.changed() => {
                let Some(snapshot) = snapshot else { break };
                scan.progress(&format!("{} tags", snapshot.len()));
            }
        }
    }
    let mut found = bench.engine.tags_snapshot().to_vec();
    scan.finish(&bench).await;

    found.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.epc.cmp(&b.epc)));
    let out = output::render_list(&global.output, &found, to_row, |t| t.epc.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
