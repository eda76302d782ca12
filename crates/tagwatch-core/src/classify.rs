// ── Tag classification ──
//
// Resolves an EPC's registration and decides whether the tag enters
// the store under the current scan policy. A failed or timed-out lookup
// counts as "unregistered"; classification itself never errors.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::lookup::LookupService;
use crate::model::{ClassificationDecision, Registration, ScanPolicy, Workflow};

/// Accept/reject rule for a resolved registration.
///
/// Modes B and C behave identically here: both accept unregistered tags
/// when no target is set and the workflow allows it.
pub fn decide(policy: &ScanPolicy, registration: &Registration) -> bool {
    if matches!(policy.workflow, Workflow::Monitor { .. }) {
        return true;
    }

    let product = registration.product_id();
    match policy.target.as_deref() {
        Some(target) => product == Some(target),
        None if policy.mode.requires_registration() => registration.is_registered(),
        None => registration.is_registered() || policy.workflow.accepts_unregistered(),
    }
}

/// Resolve and decide for one EPC.
///
/// Product details are fetched only for accepted tags.
pub async fn classify(
    lookup: &dyn LookupService,
    policy: &ScanPolicy,
    epc: &str,
    timeout: Duration,
) -> ClassificationDecision {
    let registration = match resolve_item(lookup, epc, timeout).await {
        Ok(registration) => registration,
        Err(e) => {
            warn!(epc, error = %e, "registration lookup failed, treating tag as unregistered");
            Registration::Unregistered
        }
    };

    let matched = decide(policy, &registration);
    let registration = if matched {
        with_product(lookup, registration, timeout).await
    } else {
        registration
    };

    debug!(epc, matched, "classified tag");
    ClassificationDecision {
        epc: epc.to_string(),
        matched,
        registration,
    }
}

/// Full registration (item plus product) for a detail view.
///
/// Unlike [`classify`], lookup failures are returned to the caller.
pub async fn describe(
    lookup: &dyn LookupService,
    epc: &str,
    timeout: Duration,
) -> Result<Registration, CoreError> {
    match resolve_item(lookup, epc, timeout).await? {
        Registration::Registered {
            product_id: Some(id),
            ..
        } => {
            let product = with_timeout(timeout, lookup.lookup_product(&id)).await?;
            Ok(Registration::Registered {
                product_id: Some(id),
                product,
            })
        }
        other => Ok(other),
    }
}

async fn resolve_item(
    lookup: &dyn LookupService,
    epc: &str,
    timeout: Duration,
) -> Result<Registration, CoreError> {
    let item = with_timeout(timeout, lookup.lookup_item(epc)).await?;
    Ok(match item {
        Some(item) => Registration::Registered {
            product_id: item.product_id,
            product: None,
        },
        None => Registration::Unregistered,
    })
}

async fn with_product(
    lookup: &dyn LookupService,
    registration: Registration,
    timeout: Duration,
) -> Registration {
    let id = match &registration {
        Registration::Registered {
            product_id: Some(id),
            product: None,
        } => id.clone(),
        _ => return registration,
    };

    let product = match with_timeout(timeout, lookup.lookup_product(&id)).await {
        Ok(product) => product,
        Err(e) => {
            debug!(product_id = %id, error = %e, "product details unavailable");
            None
        }
    };
    Registration::Registered {
        product_id: Some(id),
        product,
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CoreError::LookupTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lookup::StaticCatalog;
    use crate::model::ReadingMode;

    fn registered(product: &str) -> Registration {
        Registration::Registered {
            product_id: Some(product.to_string()),
            product: None,
        }
    }

    fn policy(mode: ReadingMode, workflow: Workflow, target: Option<&str>) -> ScanPolicy {
        ScanPolicy {
            mode,
            workflow,
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn mode_a_requires_registration() {
        let p = policy(ReadingMode::OnlyRegistered, Workflow::Inventory, None);
        assert!(decide(&p, &registered("SKU-1")));
        assert!(!decide(&p, &Registration::Unregistered));
    }

    #[test]
    fn mode_a_with_target_requires_product_match() {
        let p = policy(ReadingMode::OnlyRegistered, Workflow::Inventory, Some("SKU-1"));
        assert!(decide(&p, &registered("SKU-1")));
        assert!(!decide(&p, &registered("SKU-2")));
        assert!(!decide(&p, &Registration::Unregistered));
    }

    #[test]
    fn modes_b_and_c_agree() {
        for mode in [ReadingMode::AllWithLookup, ReadingMode::AllUnfiltered] {
            let inventory = policy(mode, Workflow::Inventory, None);
            assert!(decide(&inventory, &Registration::Unregistered));
            assert!(decide(&inventory, &registered("SKU-9")));

            let targeted = policy(mode, Workflow::Inventory, Some("SKU-1"));
            assert!(decide(&targeted, &registered("SKU-1")));
            assert!(!decide(&targeted, &registered("SKU-2")));
            assert!(!decide(&targeted, &Registration::Unregistered));
        }
    }

    #[test]
    fn locate_rejects_unregistered() {
        let p = policy(ReadingMode::AllUnfiltered, Workflow::Locate, None);
        assert!(!decide(&p, &Registration::Unregistered));
    }

    #[test]
    fn monitor_accepts_its_tag_regardless() {
        let p = policy(
            ReadingMode::OnlyRegistered,
            Workflow::Monitor { epc: "E1".into() },
            Some("SKU-1"),
        );
        assert!(decide(&p, &Registration::Unregistered));
    }

    #[tokio::test]
    async fn lookup_failure_counts_as_unregistered() {
        let catalog = StaticCatalog::new().with_item("E1", "SKU-1").unreachable();
        let p = policy(ReadingMode::OnlyRegistered, Workflow::Inventory, None);
        let decision = classify(&catalog, &p, "E1", Duration::from_secs(1)).await;
        assert!(!decision.matched);
        assert_eq!(decision.registration, Registration::Unregistered);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookup_times_out() {
        let catalog = StaticCatalog::new()
            .with_item("E1", "SKU-1")
            .with_latency(Duration::from_secs(30));
        let p = policy(ReadingMode::OnlyRegistered, Workflow::Inventory, None);
        let decision = classify(&catalog, &p, "E1", Duration::from_secs(1)).await;
        assert!(!decision.matched);
    }

    #[tokio::test]
    async fn accepted_tags_carry_product_details() {
        let catalog = StaticCatalog::new().with_item("E1", "SKU-1");
        let p = policy(ReadingMode::AllUnfiltered, Workflow::Inventory, Some("SKU-1"));
        let decision = classify(&catalog, &p, "E1", Duration::from_secs(1)).await;
        assert!(decision.matched);
        assert_eq!(decision.registration.product().unwrap().id, "SKU-1");
    }

    #[tokio::test]
    async fn describe_surfaces_errors() {
        let catalog = StaticCatalog::new().unreachable();
        assert!(describe(&catalog, "E1", Duration::from_secs(1)).await.is_err());
    }
}
