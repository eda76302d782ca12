//! Shared plumbing for scan-based commands: build the engine, connect
//! the simulated reader, feed it, and tear everything down afterwards.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tagwatch_api::InventoryClient;
use tagwatch_core::{
    ConnectionState, CoreError, Engine, EngineConfig, LookupService, ReadingMode, SimulatedReader,
};

use crate::cli::{GlobalOpts, ModeArg, ScanArgs};
use crate::config;
use crate::demo::{self, Scenario};
use crate::error::CliError;

impl From<ModeArg> for ReadingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Registered => Self::OnlyRegistered,
            ModeArg::Lookup => Self::AllWithLookup,
            ModeArg::All => Self::AllUnfiltered,
        }
    }
}

/// An engine wired to the simulated reader and the resolved catalog.
pub struct Workbench {
    pub engine: Engine,
    pub reader: SimulatedReader,
}

impl Workbench {
    /// Build from config and flags. `tweak` adjusts the engine config
    /// before the engine is created.
    pub fn build(
        global: &GlobalOpts,
        tweak: impl FnOnce(&mut EngineConfig),
    ) -> Result<Self, CliError> {
        let cfg = config::load_config_or_default();
        let (profile_name, profile) = config::active_profile(global, &cfg)?;
        let mut engine_config = config::resolve_engine_config(global, &profile)?;
        tweak(&mut engine_config);

        let lookup: Arc<dyn LookupService> =
            match config::resolve_backend(global, &cfg, &profile_name, &profile)? {
                Some(backend) => {
                    debug!(url = %backend.url, "using inventory backend");
                    let client = InventoryClient::new(backend.url, &backend.transport)
                        .map_err(CoreError::from)?;
                    Arc::new(client)
                }
                None => {
                    debug!("no backend configured, using demo catalog");
                    Arc::new(demo::catalog())
                }
            };

        let reader = SimulatedReader::new();
        let engine = Engine::new(engine_config, Arc::new(reader.clone()), lookup);
        Ok(Self { engine, reader })
    }

    /// Build with the scan flags applied.
    pub fn for_scan(global: &GlobalOpts, args: &ScanArgs) -> Result<Self, CliError> {
        Self::build(global, |config| {
            if let Some(mode) = args.mode {
                config.reading_mode = mode.into();
            }
            if args.min_rssi.is_some() {
                config.ingest_filter.min_rssi = args.min_rssi;
            }
        })
    }

    /// Connect, start feeding `scenario`, and begin scanning.
    pub async fn begin(
        &self,
        global: &GlobalOpts,
        args: &ScanArgs,
        scenario: Scenario,
    ) -> Result<ActiveScan, CliError> {
        match self.engine.connect(global.device.as_deref()).await {
            ConnectionState::Connected => {}
            ConnectionState::Error { message } => {
                return Err(CliError::ReaderUnavailable { reason: message });
            }
            other => {
                return Err(CliError::ReaderUnavailable {
                    reason: format!("reader ended up {other}"),
                });
            }
        }

        let cancel = CancellationToken::new();
        let feeder = scenario.spawn_feeder(self.reader.clone(), cancel.clone());

        if args.trigger {
            self.pull_trigger().await?;
        } else {
            self.engine.start_session().await?;
        }
        let device = self
            .engine
            .connected_device()
            .await
            .map(|d| d.name)
            .unwrap_or_default();
        info!(%device, duration = ?args.duration, "scanning");

        Ok(ActiveScan {
            cancel,
            feeder,
            spinner: spinner(global),
        })
    }

    /// Press and release the sled trigger, then wait for the session.
    async fn pull_trigger(&self) -> Result<(), CliError> {
        let session = self.reader.session().ok_or(CliError::NotConnected)?;
        let mut scanning = self.engine.scanning();
        session.set_trigger(true);
        session.set_trigger(false);

        let started =
            tokio::time::timeout(Duration::from_secs(2), scanning.wait_for(|on| *on)).await;
        match started {
            Ok(Ok(_)) => Ok(()),
            _ => Err(CliError::Validation {
                field: "trigger".into(),
                reason: "the trigger did not start a scan (scan.trigger_toggles_scan is off?)"
                    .into(),
            }),
        }
    }
}

/// A scan in progress.
pub struct ActiveScan {
    cancel: CancellationToken,
    feeder: JoinHandle<()>,
    spinner: ProgressBar,
}

impl ActiveScan {
    /// Update the spinner text.
    pub fn progress(&self, message: &str) {
        self.spinner.set_message(format!("scanning: {message}"));
    }

    /// Stop scanning, stop the feeder, and release the reader.
    pub async fn finish(self, bench: &Workbench) {
        bench.engine.stop_session().await;
        self.cancel.cancel();
        let _ = self.feeder.await;
        bench.engine.shutdown().await;
        self.spinner.finish_and_clear();
    }
}

fn spinner(global: &GlobalOpts) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message("scanning");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
