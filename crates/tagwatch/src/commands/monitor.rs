//! `tagwatch monitor <epc>`: follow one tag's signal over time.

use serde::Serialize;
use tabled::Tabled;
use tokio::time::Instant;

use tagwatch_core::{SignalReading, Workflow};

use crate::cli::{GlobalOpts, MonitorArgs};
use crate::commands::scan::Workbench;
use crate::demo::Scenario;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Sample {
    elapsed_ms: u128,
    #[serde(flatten)]
    signal: SignalReading,
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "t (ms)")]
    elapsed_ms: u128,
    #[tabled(rename = "RSSI")]
    rssi: i32,
    #[tabled(rename = "Signal")]
    bar: String,
    #[tabled(rename = "Distance")]
    distance: String,
}

pub async fn handle(args: MonitorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let epc = args.epc.trim().to_uppercase();
    if epc.is_empty() {
        return Err(CliError::Validation {
            field: "epc".into(),
            reason: "must not be empty".into(),
        });
    }

    let bench = Workbench::for_scan(global, &args.scan)?;
    bench.engine.set_workflow(Workflow::Monitor { epc: epc.clone() });
    let mut selected = bench.engine.selected_tag();

    let scenario = Scenario::default().with_tracked(&epc, args.fade_after);
    let scan = bench.begin(global, &args.scan, scenario).await?;
    let started = Instant::now();
    let deadline = tokio::time::sleep(args.scan.duration);
    tokio::pin!(deadline);

    let mut samples: Vec<Sample> = Vec::new();
    loop {
        tokio::select! {
            () = &mut deadline => break,
            changed = selected.changed() => {
                if changed.is_err() {
                    break;
                }
                let rssi = selected.borrow_and_update().as_ref().map(|tag| tag.rssi);
                // Skip repeats so the timeline only shows changes.
                if let Some(rssi) = rssi {
                    if samples.last().is_none_or(|last| last.signal.rssi != rssi) {
                        samples.push(Sample {
                            elapsed_ms: started.elapsed().as_millis(),
                            signal: SignalReading::from_rssi(rssi),
                        });
                    }
                }
            }
        }
    }
    scan.finish(&bench).await;

    if samples.is_empty() && !global.quiet {
        eprintln!("Tag {epc} was not seen");
    }

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &samples,
        |s| SampleRow {
            elapsed_ms: s.elapsed_ms,
            rssi: s.signal.rssi,
            bar: output::signal_bar(&s.signal, color),
            distance: s.signal.distance.to_string(),
        },
        |s| s.signal.rssi.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
