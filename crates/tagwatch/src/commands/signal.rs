//! `tagwatch signal <rssi>...`: show how readings map to the UI.

use tabled::Tabled;

use tagwatch_core::SignalReading;

use crate::cli::{GlobalOpts, SignalArgs};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "RSSI")]
    rssi: i32,
    #[tabled(rename = "Progress")]
    progress: u8,
    #[tabled(rename = "Signal")]
    bar: String,
    #[tabled(rename = "Distance")]
    distance: String,
    #[tabled(rename = "Proximity")]
    proximity: String,
}

pub fn handle(args: &SignalArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let readings: Vec<SignalReading> = args
        .rssi
        .iter()
        .map(|&rssi| SignalReading::from_rssi(rssi))
        .collect();

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &readings,
        |r| SignalRow {
            rssi: r.rssi,
            progress: r.progress,
            bar: output::signal_bar(r, color),
            distance: r.distance.to_string(),
            proximity: r.proximity.to_string(),
        },
        |r| format!("{} {}", r.progress, r.distance),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
