//! Component reference-graph resolution.

use sdc_model::{ComponentDescriptor, DescriptorRef};

use crate::error::ReconcileError;
use crate::traits::ClusterClient;

/// Walk the reference path from the root descriptor, one named hop at
/// a time, and return the descriptor the path lands on. An empty path
/// selects the root itself.
///
/// `Ok(None)` means some descriptor or hop along the way does not
/// exist; callers treat that as terminal rather than transient. A
/// path longer than `limit` is rejected before any lookup.
pub fn find_descriptor(
    cluster: &dyn ClusterClient,
    path: &[String],
    root: &DescriptorRef,
    limit: usize,
) -> Result<Option<ComponentDescriptor>, ReconcileError> {
    if path.len() > limit {
        return Err(ReconcileError::ReferencePathTooDeep { limit });
    }

    let Some(mut descriptor) = cluster
        .get_descriptor(root)
        .map_err(ReconcileError::DescriptorLookup)?
    else {
        return Ok(None);
    };

    for hop in path {
        let Some(reference) = descriptor.references.iter().find(|r| &r.name == hop) else {
            tracing::debug!(component = %descriptor.name, hop, "reference not declared");
            return Ok(None);
        };
        let Some(child) = cluster
            .get_descriptor(&reference.descriptor_ref)
            .map_err(ReconcileError::DescriptorLookup)?
        else {
            return Ok(None);
        };
        descriptor = child;
    }

    Ok(Some(descriptor))
}
