//! Cross-family visibility rules. Everything here is pure; the services
//! load rows and ask these functions who may see what.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{FamilyConnection, SharedFeature};

/// Plain allow-list membership
pub fn is_shared_with(shared_with: &[Uuid], family: Uuid) -> bool {
    shared_with.contains(&family)
}

/// A row is visible to `viewer` when the viewer owns it or is on its allow-list.
/// Sharing is not transitive.
pub fn is_visible(owner: Uuid, shared_with: &[Uuid], viewer: Uuid) -> bool {
    owner == viewer || is_shared_with(shared_with, viewer)
}

/// The connection linking two families, if any
pub fn connection_between(connections: &[FamilyConnection], a: Uuid, b: Uuid) -> Option<&FamilyConnection> {
    connections.iter().find(|c| c.links(a, b))
}

/// Feature gate between two families. A missing connection or feature denies.
pub fn feature_enabled(connections: &[FamilyConnection], a: Uuid, b: Uuid, feature: SharedFeature) -> bool {
    connection_between(connections, a, b).is_some_and(|c| c.has_feature(feature))
}

/// Feature-gated visibility of another family's item
pub fn is_visible_gated(
    owner: Uuid,
    shared_with: &[Uuid],
    viewer: Uuid,
    connections: &[FamilyConnection],
    feature: SharedFeature,
) -> bool {
    if owner == viewer {
        return true;
    }
    is_shared_with(shared_with, viewer) && feature_enabled(connections, owner, viewer, feature)
}

/// Row filter for everything `viewer` can see: its own rows plus rows that
/// list it in `shared_with`
pub fn visible_to(viewer: Uuid, include_shared: bool) -> Value {
    if include_shared {
        json!({ "$or": [
            { "family_id": viewer },
            { "shared_with": { "$contains": [viewer] } }
        ]})
    } else {
        json!({ "family_id": viewer })
    }
}

/// Row filter for rows owned by another family that list `viewer`
pub fn shared_with_filter(viewer: Uuid, owners: &[Uuid]) -> Value {
    json!({
        "family_id": { "$in": owners },
        "shared_with": { "$contains": [viewer] }
    })
}

/// Drop `remove` from an allow-list, keeping order
pub fn without(shared_with: &[Uuid], remove: &[Uuid]) -> Vec<Uuid> {
    shared_with.iter().copied().filter(|id| !remove.contains(id)).collect()
}

/// Union of an allow-list with new families; returns the merged list and
/// the ids that were not already present
pub fn merged(shared_with: &[Uuid], add: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
    let mut out = shared_with.to_vec();
    let mut added = Vec::new();
    for id in add {
        if !out.contains(id) {
            out.push(*id);
            added.push(*id);
        }
    }
    (out, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_match::FilterMatch;

    fn connection(a: Uuid, b: Uuid, features: &[&str]) -> FamilyConnection {
        FamilyConnection {
            id: Uuid::new_v4(),
            family_id: a,
            connected_family_id: b,
            connected_date: None,
            shared_features: features.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn test_allow_list_is_not_transitive() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(is_visible(a, &[b], a));
        assert!(is_visible(a, &[b], b));
        assert!(!is_visible(a, &[b], c));
    }

    #[test]
    fn test_feature_gate_fails_closed() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let conns = vec![connection(b, a, &["calendar"])];
        assert!(is_visible_gated(a, &[b], b, &conns, SharedFeature::Calendar));
        assert!(!is_visible_gated(a, &[b], b, &conns, SharedFeature::Photos));
        assert!(!is_visible_gated(a, &[c], c, &conns, SharedFeature::Calendar));
        assert!(!is_visible_gated(a, &[b], b, &[], SharedFeature::Calendar));
    }

    #[test]
    fn test_visible_filter_matches_rows() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let row = json!({ "family_id": a, "shared_with": [b] });
        assert!(FilterMatch::matches(Some(&visible_to(a, true)), &row).unwrap());
        assert!(FilterMatch::matches(Some(&visible_to(b, true)), &row).unwrap());
        assert!(!FilterMatch::matches(Some(&visible_to(b, false)), &row).unwrap());
        assert!(!FilterMatch::matches(Some(&visible_to(c, true)), &row).unwrap());
    }

    #[test]
    fn test_merge_and_remove() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let (list, added) = merged(&[a], &[a, b, c]);
        assert_eq!(list, vec![a, b, c]);
        assert_eq!(added, vec![b, c]);
        assert_eq!(without(&list, &[b]), vec![a, c]);
    }
}
