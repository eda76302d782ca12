//! `tagwatch locate <product>`: find tags of one product and lock onto
//! the strongest.

use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use tagwatch_core::{SignalReading, TagSnapshot, Workflow};

use crate::cli::{GlobalOpts, LocateArgs};
use crate::commands::scan::Workbench;
use crate::demo::Scenario;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct LocatedTag {
    epc: String,
    selected: bool,
    product: String,
    #[serde(flatten)]
    signal: SignalReading,
}

#[derive(Tabled)]
struct LocateRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "EPC")]
    epc: String,
    #[tabled(rename = "RSSI")]
    rssi: i32,
    #[tabled(rename = "Signal")]
    bar: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Proximity")]
    proximity: String,
}

/// Strongest tag in the snapshot.
fn strongest(snapshot: &TagSnapshot) -> Option<String> {
    snapshot
        .iter()
        .max_by_key(|tag| tag.rssi)
        .map(|tag| tag.epc.clone())
}

pub async fn handle(args: LocateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let bench = Workbench::for_scan(global, &args.scan)?;

    let products = bench.engine.list_products().await?;
    if !products.iter().any(|p| p.id == args.product) {
        bench.engine.shutdown().await;
        return Err(CliError::NotFound {
            resource_type: "product".into(),
            identifier: args.product,
            list_command: "products".into(),
        });
    }

    bench.engine.set_workflow(Workflow::Locate);
    bench.engine.set_reading_target(Some(args.product.clone()));

    let scan = bench.begin(global, &args.scan, Scenario::default()).await?;

    // Survey for the first half, then lock onto the strongest match and
    // track only that tag for the rest of the scan.
    let survey = args.scan.duration / 2;
    tokio::time::sleep(survey).await;
    match strongest(&bench.engine.tags_snapshot()) {
        Some(epc) => {
            debug!(%epc, "locking onto strongest match");
            bench.engine.select_tag(&epc);
        }
        None => debug!("no matching tag seen during survey"),
    }
    tokio::time::sleep(args.scan.duration.saturating_sub(survey)).await;

    let snapshot = bench.engine.tags_snapshot();
    scan.finish(&bench).await;

    let mut located: Vec<LocatedTag> = snapshot
        .iter()
        .map(|tag| LocatedTag {
            epc: tag.epc.clone(),
            selected: tag.selected,
            product: tag.registration.label(),
            signal: SignalReading::from_rssi(tag.rssi),
        })
        .collect();
    located.sort_by(|a, b| {
        b.selected
            .cmp(&a.selected)
            .then_with(|| b.signal.rssi.cmp(&a.signal.rssi))
    });

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &located,
        |t| LocateRow {
            marker: if t.selected { "▶" } else { "" },
            epc: t.epc.clone(),
            rssi: t.signal.rssi,
            bar: output::signal_bar(&t.signal, color),
            distance: t.signal.distance.to_string(),
            proximity: t.signal.proximity.to_string(),
        },
        |t| t.epc.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
