//! Reconciles fetched components against the repository.
//!
//! Reconciliation is create-only: a component whose id is already stored is
//! left untouched, even if its manifest changed.

use serde::Serialize;

use crate::component::Component;
use crate::repository::ComponentRepository;

/// Counts from one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub fetched: usize,
    pub created: usize,
    /// Already present in the repository.
    pub existing: usize,
    /// Lookup or create failed.
    pub skipped: usize,
}

/// Creates every component the repository does not have yet.
///
/// Failures are logged per component and never abort the loop.
pub async fn reconcile_components(
    repo: &dyn ComponentRepository,
    components: &[Component],
) -> ReconcileSummary {
    let mut summary = ReconcileSummary {
        fetched: components.len(),
        ..ReconcileSummary::default()
    };

    for component in components {
        match repo.get_component_by_identifier(&component.id).await {
            Ok(_) => {
                log::trace!("Component {} already exists", component.id);
                summary.existing += 1;
            }
            Err(e) if e.is_not_found() => match repo.create_component(component).await {
                Ok(()) => {
                    log::debug!("Created component {} ({})", component.id, component.name);
                    summary.created += 1;
                }
                Err(e) => {
                    log::warn!("Failed to create component {}: {}", component.id, e);
                    summary.skipped += 1;
                }
            },
            Err(e) => {
                log::warn!("Failed to look up component {}: {}", component.id, e);
                summary.skipped += 1;
            }
        }
    }

    summary
}
