//! The property file graph: CSR topology plus node and edge property tables,
//! optionally tied to a location in the backing store.

use std::path::Path;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{Schema, SchemaRef};
use tracing::{debug, info};

use crate::error::{GraphError, Result};
use crate::storage::{GraphHandle, GraphParts, GraphStore, PartitionMetadata, Selection, WriteMode};
use crate::table;
use crate::topology::{GraphTopology, TopologyOwnership};
use crate::view::{EdgeOps, NodeOps, PropertyView, PropertyViewMut};

/// A property graph backed by persistent storage.
///
/// Node properties have one row per node and edge properties one row per
/// edge. Graphs come either from [`PropertyFileGraph::new`] (empty, not yet
/// stored anywhere) or from the `make*` factories, which only hand out graphs
/// that passed validation.
///
/// Reads take `&self` and are safe to share across threads; every mutation
/// takes `&mut self`.
#[derive(Debug)]
pub struct PropertyFileGraph {
    topology: GraphTopology,
    ownership: TopologyOwnership,
    node_table: RecordBatch,
    edge_table: RecordBatch,
    partition: PartitionMetadata,
    handle: Option<GraphHandle>,
}

impl Default for PropertyFileGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyFileGraph {
    /// An empty graph with no topology, no properties and no location.
    pub fn new() -> Self {
        let empty = RecordBatch::new_empty(std::sync::Arc::new(Schema::empty()));
        Self {
            topology: GraphTopology::default(),
            ownership: TopologyOwnership::Owned,
            node_table: empty.clone(),
            edge_table: empty,
            partition: PartitionMetadata::default(),
            handle: None,
        }
    }

    /// Adopts a graph already loaded from the store together with its handle.
    ///
    /// If validation fails both are dropped, which closes the handle.
    pub fn from_loaded(handle: GraphHandle, parts: GraphParts) -> Result<Self> {
        let graph = Self {
            topology: parts.topology,
            ownership: TopologyOwnership::Owned,
            node_table: parts.node_table,
            edge_table: parts.edge_table,
            partition: parts.partition,
            handle: Some(handle),
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Loads every property of the graph called `name`.
    pub fn make(name: &str) -> Result<Self> {
        Self::make_in(&GraphStore::from_env(), name)
    }

    pub fn make_in(store: &GraphStore, name: &str) -> Result<Self> {
        let (handle, parts) = store.load(name, &Selection::All)?;
        Self::from_loaded(handle, parts)
    }

    /// Loads only the named properties, in the order given.
    ///
    /// Fails with an invalid-argument error if a name is missing, repeated,
    /// or matches more than one stored property.
    pub fn make_selective<S: AsRef<str>>(
        name: &str,
        node_properties: &[S],
        edge_properties: &[S],
    ) -> Result<Self> {
        Self::make_selective_in(&GraphStore::from_env(), name, node_properties, edge_properties)
    }

    pub fn make_selective_in<S: AsRef<str>>(
        store: &GraphStore,
        name: &str,
        node_properties: &[S],
        edge_properties: &[S],
    ) -> Result<Self> {
        let selection = Selection::only(
            node_properties.iter().map(|s| s.as_ref().to_string()),
            edge_properties.iter().map(|s| s.as_ref().to_string()),
        );
        let (handle, parts) = store.load(name, &selection)?;
        Self::from_loaded(handle, parts)
    }

    fn validate(&self) -> Result<()> {
        self.topology.validate().map_err(GraphError::Corruption)?;
        self.partition.validate().map_err(GraphError::Corruption)?;
        check_table("node", &self.node_table, self.topology.num_nodes())?;
        check_table("edge", &self.edge_table, self.topology.num_edges())?;
        Ok(())
    }

    fn parts(&self) -> GraphParts {
        GraphParts {
            topology: self.topology.clone(),
            node_table: self.node_table.clone(),
            edge_table: self.edge_table.clone(),
            partition: self.partition,
        }
    }

    /// Writes the graph to a new location `name` and switches to it.
    ///
    /// Fails with an I/O error if `name` already exists.
    pub fn write_to(&mut self, name: &str) -> Result<()> {
        self.write_to_in(&GraphStore::from_env(), name)
    }

    pub fn write_to_in(&mut self, store: &GraphStore, name: &str) -> Result<()> {
        self.validate()?;
        let handle = store.store(name, &self.parts(), WriteMode::CreateNew)?;
        info!(
            path = %handle.path().display(),
            nodes = self.num_nodes(),
            edges = self.num_edges(),
            "wrote graph"
        );
        self.handle = Some(handle);
        Ok(())
    }

    /// Writes the graph back to the location it was loaded from or last
    /// written to.
    pub fn write(&mut self) -> Result<()> {
        let mut handle = self.handle.take().ok_or_else(|| {
            GraphError::InvalidState("graph has no storage location; use write_to".to_string())
        })?;
        let result = self
            .validate()
            .and_then(|()| handle.overwrite(&self.parts()));
        self.handle = Some(handle);
        result
    }

    pub fn topology(&self) -> &GraphTopology {
        &self.topology
    }

    pub fn topology_ownership(&self) -> TopologyOwnership {
        self.ownership
    }

    pub fn num_nodes(&self) -> u64 {
        self.topology.num_nodes()
    }

    pub fn num_edges(&self) -> u64 {
        self.topology.num_edges()
    }

    /// Replaces the topology without copying it.
    ///
    /// The graph shares `topology`'s buffers with the caller. Nothing is
    /// revalidated here: existing properties that no longer fit are reported
    /// by the next write, and new properties are sized against this topology.
    pub fn set_topology(&mut self, topology: GraphTopology) -> Result<()> {
        let node_table = resize_if_bare(&self.node_table, topology.num_nodes())?;
        let edge_table = resize_if_bare(&self.edge_table, topology.num_edges())?;
        debug!(
            nodes = topology.num_nodes(),
            edges = topology.num_edges(),
            "set topology"
        );
        self.node_table = node_table;
        self.edge_table = edge_table;
        self.topology = topology;
        self.ownership = TopologyOwnership::Borrowed;
        Ok(())
    }

    pub fn partition(&self) -> PartitionMetadata {
        self.partition
    }

    pub fn set_partition(&mut self, partition: PartitionMetadata) -> Result<()> {
        partition.validate().map_err(GraphError::InvalidArgument)?;
        self.partition = partition;
        Ok(())
    }

    /// Directory of the stored graph this instance is attached to.
    pub fn location(&self) -> Option<&Path> {
        self.handle.as_ref().map(|h| h.path())
    }

    pub fn handle(&self) -> Option<&GraphHandle> {
        self.handle.as_ref()
    }

    pub fn node_schema(&self) -> SchemaRef {
        self.node_table.schema()
    }

    pub fn edge_schema(&self) -> SchemaRef {
        self.edge_table.schema()
    }

    pub fn node_property(&self, index: usize) -> Option<ArrayRef> {
        self.node_table.columns().get(index).cloned()
    }

    pub fn edge_property(&self, index: usize) -> Option<ArrayRef> {
        self.edge_table.columns().get(index).cloned()
    }

    pub fn node_properties(&self) -> Vec<ArrayRef> {
        self.node_table.columns().to_vec()
    }

    pub fn edge_properties(&self) -> Vec<ArrayRef> {
        self.edge_table.columns().to_vec()
    }

    pub fn node_table(&self) -> &RecordBatch {
        &self.node_table
    }

    pub fn edge_table(&self) -> &RecordBatch {
        &self.edge_table
    }

    /// Appends the columns of `table` as node properties.
    ///
    /// `table` needs one row per node and only names not already in use.
    /// On error the node properties are left as they were.
    pub fn add_node_properties(&mut self, table: &RecordBatch) -> Result<()> {
        let expected = self.topology.num_nodes() as usize;
        self.node_table = table::append_columns(&self.node_table, table, expected)?;
        debug!(
            added = table.num_columns(),
            total = self.node_table.num_columns(),
            "added node properties"
        );
        Ok(())
    }

    /// Appends the columns of `table` as edge properties.
    pub fn add_edge_properties(&mut self, table: &RecordBatch) -> Result<()> {
        let expected = self.topology.num_edges() as usize;
        self.edge_table = table::append_columns(&self.edge_table, table, expected)?;
        debug!(
            added = table.num_columns(),
            total = self.edge_table.num_columns(),
            "added edge properties"
        );
        Ok(())
    }

    pub fn remove_node_property(&mut self, index: usize) -> Result<()> {
        self.node_table = table::remove_column(&self.node_table, index)?;
        debug!(index, remaining = self.node_table.num_columns(), "removed node property");
        Ok(())
    }

    pub fn remove_edge_property(&mut self, index: usize) -> Result<()> {
        self.edge_table = table::remove_column(&self.edge_table, index)?;
        debug!(index, remaining = self.edge_table.num_columns(), "removed edge property");
        Ok(())
    }

    pub fn remove_node_property_by_name(&mut self, name: &str) -> Result<()> {
        let index = table::column_index(self.node_table.schema_ref(), name)?;
        self.remove_node_property(index)
    }

    pub fn remove_edge_property_by_name(&mut self, name: &str) -> Result<()> {
        let index = table::column_index(self.edge_table.schema_ref(), name)?;
        self.remove_edge_property(index)
    }

    pub fn node_property_view(&self) -> PropertyView<'_> {
        PropertyView::new(self, &NodeOps)
    }

    pub fn edge_property_view(&self) -> PropertyView<'_> {
        PropertyView::new(self, &EdgeOps)
    }

    pub fn node_property_view_mut(&mut self) -> PropertyViewMut<'_> {
        PropertyViewMut::new(self, &NodeOps)
    }

    pub fn edge_property_view_mut(&mut self) -> PropertyViewMut<'_> {
        PropertyViewMut::new(self, &EdgeOps)
    }
}

fn check_table(kind: &str, table: &RecordBatch, expected: u64) -> Result<()> {
    if table.num_columns() > 0 && table.num_rows() as u64 != expected {
        return Err(GraphError::corruption(format!(
            "{kind} properties have {} rows, topology has {expected} {kind}s",
            table.num_rows()
        )));
    }
    if let Some(name) = table::duplicate_name(table.schema_ref()) {
        return Err(GraphError::corruption(format!(
            "{kind} property {name} appears more than once"
        )));
    }
    Ok(())
}

/// A table without columns simply takes on the new row count.
fn resize_if_bare(table: &RecordBatch, rows: u64) -> Result<RecordBatch> {
    if table.num_columns() == 0 && table.num_rows() as u64 != rows {
        table::empty_table(rows as usize)
    } else {
        Ok(table.clone())
    }
}
