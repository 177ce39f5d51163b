//! Structural comparison of two graphs.

use std::fmt;

use datagraph_foundation::{EntityId, Result};

use crate::entity::{Entity, Payload};
use crate::graph::DataGraph;

/// The first difference found between two graphs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Difference {
    /// The entity where the graphs diverge, if the difference is local to one.
    pub id: Option<EntityId>,
    /// What differs.
    pub detail: String,
}

impl Difference {
    fn at(id: EntityId, detail: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{id}: {}", self.detail),
            None => f.write_str(&self.detail),
        }
    }
}

/// Compares two graphs entity by entity.
///
/// Ids, names, parent sets, child maps, kinds, shapes, importable flags,
/// and geometry references must match. With `compare_payloads`, store
/// contents must also be bit-identical; leave it off when either side was
/// loaded in preflight mode.
///
/// # Errors
///
/// Returns an error if payload comparison touches a store whose chunks fail
/// to load.
pub fn graph_diff(a: &DataGraph, b: &DataGraph, compare_payloads: bool) -> Result<Option<Difference>> {
    if a.top_level() != b.top_level() {
        return Ok(Some(Difference {
            id: None,
            detail: format!(
                "top-level children differ: {:?} vs {:?}",
                a.top_level().keys().collect::<Vec<_>>(),
                b.top_level().keys().collect::<Vec<_>>()
            ),
        }));
    }
    let (ids_a, ids_b) = (a.ids(), b.ids());
    if ids_a != ids_b {
        return Ok(Some(Difference {
            id: None,
            detail: format!("entity ids differ: {ids_a:?} vs {ids_b:?}"),
        }));
    }
    for id in ids_a {
        let (ea, eb) = (a.get(id)?, b.get(id)?);
        if let Some(diff) = entity_diff(ea, eb, compare_payloads)? {
            return Ok(Some(diff));
        }
    }
    Ok(None)
}

fn entity_diff(a: &Entity, b: &Entity, compare_payloads: bool) -> Result<Option<Difference>> {
    let id = a.id();
    if a.name() != b.name() {
        return Ok(Some(Difference::at(id, format!("name '{}' vs '{}'", a.name(), b.name()))));
    }
    if a.kind() != b.kind() {
        return Ok(Some(Difference::at(id, format!("kind {} vs {}", a.kind(), b.kind()))));
    }
    if !a.parents().eq(b.parents()) {
        return Ok(Some(Difference::at(id, "parent sets differ")));
    }
    if a.children() != b.children() {
        return Ok(Some(Difference::at(id, "children differ")));
    }
    if a.is_importable() != b.is_importable() {
        return Ok(Some(Difference::at(id, "importable flag differs")));
    }
    let detail = match (a.payload(), b.payload()) {
        (Payload::Array(x), Payload::Array(y)) | (Payload::Scalar(x), Payload::Scalar(y)) => {
            if x.tuple_shape() != y.tuple_shape() || x.component_shape() != y.component_shape() {
                Some(format!(
                    "array shape {:?}x{:?} vs {:?}x{:?}",
                    x.tuple_shape(),
                    x.component_shape(),
                    y.tuple_shape(),
                    y.component_shape()
                ))
            } else if compare_payloads && !x.content_eq(y)? {
                Some("array contents differ".to_string())
            } else {
                None
            }
        }
        (Payload::List(x), Payload::List(y)) => {
            if x.tuple_shape() != y.tuple_shape() {
                Some(format!("list shape {:?} vs {:?}", x.tuple_shape(), y.tuple_shape()))
            } else if compare_payloads && !x.content_eq(y) {
                Some("list contents differ".to_string())
            } else {
                None
            }
        }
        (Payload::Strings(x), Payload::Strings(y)) => {
            if x.len() != y.len() {
                Some(format!("string count {} vs {}", x.len(), y.len()))
            } else if compare_payloads && !x.content_eq(y) {
                Some("strings differ".to_string())
            } else {
                None
            }
        }
        (Payload::AttributeTable(x), Payload::AttributeTable(y)) => (x != y)
            .then(|| format!("table shape {:?} vs {:?}", x.tuple_shape(), y.tuple_shape())),
        (Payload::Geometry(x), Payload::Geometry(y)) => (x != y).then(|| "geometry metadata differs".to_string()),
        _ => None,
    };
    Ok(detail.map(|d| Difference::at(id, d)))
}
