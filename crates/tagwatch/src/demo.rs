//! Built-in demo catalog and tag scenario for the simulated reader.
//!
//! Without a configured backend the CLI resolves EPCs against a small
//! warehouse catalog, and every scan is fed by a scenario of tags with
//! slowly wobbling signal strength.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tagwatch_core::{Product, RawRead, SimulatedReader, StaticCatalog};

const FEED_INTERVAL: Duration = Duration::from_millis(50);
/// Fire the read-ready callback every this many feed ticks.
const NOTIFY_EVERY: u64 = 4;

struct DemoProduct {
    id: &'static str,
    description: &'static str,
    size: &'static str,
    color: &'static str,
}

const PRODUCTS: &[DemoProduct] = &[
    DemoProduct {
        id: "SKU-1001",
        description: "Work gloves",
        size: "M",
        color: "grey",
    },
    DemoProduct {
        id: "SKU-1002",
        description: "Hard hat",
        size: "one size",
        color: "white",
    },
    DemoProduct {
        id: "SKU-2001",
        description: "Hi-vis vest",
        size: "L",
        color: "orange",
    },
];

/// EPC, linked product (or `None` for a registered item without a
/// product link), base RSSI.
const REGISTERED: &[(&str, Option<&str>, i32)] = &[
    ("E28011606000020A5B3C0001", Some("SKU-1001"), -48),
    ("E28011606000020A5B3C0002", Some("SKU-1001"), -66),
    ("E28011606000020A5B3C0003", Some("SKU-1002"), -57),
    ("E28011606000020A5B3C0004", Some("SKU-2001"), -73),
    ("E28011606000020A5B3C0005", None, -61),
];

const UNREGISTERED: &[(&str, i32)] = &[
    ("300833B2DDD9014000000001", -52),
    ("300833B2DDD9014000000002", -79),
];

/// The demo warehouse catalog.
pub fn catalog() -> StaticCatalog {
    let catalog = PRODUCTS.iter().fold(StaticCatalog::new(), |catalog, p| {
        catalog.with_product(Product {
            id: p.id.into(),
            description: Some(p.description.into()),
            attributes: BTreeMap::from([
                ("size".to_string(), p.size.to_string()),
                ("color".to_string(), p.color.to_string()),
            ]),
        })
    });
    REGISTERED
        .iter()
        .fold(catalog, |catalog, &(epc, product, _)| match product {
            Some(product) => catalog.with_item(epc, product),
            None => catalog.with_unlinked_item(epc),
        })
}

// ── Scenario ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ScenarioTag {
    epc: String,
    base_rssi: i32,
    /// Stop reporting the tag after this long.
    fades_after: Option<Duration>,
}

/// Tags the simulated antenna "sees" during a scan.
#[derive(Debug, Clone)]
pub struct Scenario {
    tags: Vec<ScenarioTag>,
}

impl Default for Scenario {
    fn default() -> Self {
        let registered = REGISTERED.iter().map(|&(epc, _, rssi)| (epc, rssi));
        let tags = registered
            .chain(UNREGISTERED.iter().copied())
            .map(|(epc, base_rssi)| ScenarioTag {
                epc: epc.into(),
                base_rssi,
                fades_after: None,
            })
            .collect();
        Self { tags }
    }
}

impl Scenario {
    /// Make sure `epc` is in range, optionally fading out after `fade_after`.
    #[must_use]
    pub fn with_tracked(mut self, epc: &str, fade_after: Option<Duration>) -> Self {
        match self
            .tags
            .iter_mut()
            .find(|tag| tag.epc.eq_ignore_ascii_case(epc))
        {
            Some(tag) => tag.fades_after = fade_after,
            None => self.tags.push(ScenarioTag {
                epc: epc.to_uppercase(),
                base_rssi: -55,
                fades_after: fade_after,
            }),
        }
        self
    }

    /// Reads for feed tick `tick`, `elapsed` into the scan.
    fn reads_at(&self, tick: u64, elapsed: Duration) -> Vec<RawRead> {
        self.tags
            .iter()
            .zip(0_u64..)
            .filter(|(tag, _)| tag.fades_after.is_none_or(|fade| elapsed < fade))
            .map(|(tag, index)| RawRead::new(tag.epc.clone(), tag.base_rssi + wobble(tick, index)))
            .collect()
    }

    /// Feed the reader's buffer until `cancel` fires.
    pub fn spawn_feeder(self, reader: SimulatedReader, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(FEED_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick: u64 = 0;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(session) = reader.session() else {
                            continue;
                        };
                        session.push_reads(self.reads_at(tick, started.elapsed()));
                        if tick % NOTIFY_EVERY == 0 {
                            session.notify_read_ready();
                        }
                        tick += 1;
                    }
                }
            }
            debug!(ticks = tick, "demo feeder stopped");
        })
    }
}

/// Deterministic signal jitter in -4..=4 dBm.
fn wobble(tick: u64, index: u64) -> i32 {
    let phase = (tick + index * 5) % 9;
    i32::try_from(phase).unwrap_or(4) - 4
}
