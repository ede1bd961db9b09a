//! Splitting a DataCenter into top-level units.

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::document::{Document, Node, Unit};
use crate::error::Result;
use crate::read::DataCenter;
use crate::tree::Materializer;

/// Group the children of [`ROOT`](crate::read::ROOT) by name
///
/// A name seen once becomes a [`Unit::Single`], a name seen several times a
/// [`Unit::Multiple`] holding its nodes in table order. Units are ordered by the first
/// occurrence of their name.
#[instrument(skip_all, err)]
pub fn partition(dc: &DataCenter) -> Result<Document> {
    let materializer = Materializer::new(dc);

    let mut groups: IndexMap<String, Vec<Node>> = IndexMap::new();
    for child in dc.children(dc.root()?)? {
        let name = dc.get_name(child.name_index)?;
        let node = materializer.build(child)?;
        groups.entry(name.to_owned()).or_default().push(node);
    }

    debug!(units = groups.len(), "partitioned document");
    Ok(groups
        .into_iter()
        .map(|(name, nodes)| (name, Unit::from(nodes)))
        .collect())
}
