//! Uniform access to "the properties" of a graph.
//!
//! Code that works the same on node and edge properties takes a
//! [`PropertyView`] and never asks which one it got.

use std::fmt;

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::SchemaRef;

use crate::error::Result;
use crate::graph::PropertyFileGraph;

/// One family of property operations on a graph.
pub trait PropertyOps: Sync {
    /// `"node"` or `"edge"`.
    fn name(&self) -> &'static str;

    fn schema(&self, graph: &PropertyFileGraph) -> SchemaRef;

    fn property(&self, graph: &PropertyFileGraph, index: usize) -> Option<ArrayRef>;

    fn properties(&self, graph: &PropertyFileGraph) -> Vec<ArrayRef>;

    fn add_properties(&self, graph: &mut PropertyFileGraph, table: &RecordBatch) -> Result<()>;

    fn remove_property(&self, graph: &mut PropertyFileGraph, index: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NodeOps;

#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeOps;

impl PropertyOps for NodeOps {
    fn name(&self) -> &'static str {
        "node"
    }

    fn schema(&self, graph: &PropertyFileGraph) -> SchemaRef {
        graph.node_schema()
    }

    fn property(&self, graph: &PropertyFileGraph, index: usize) -> Option<ArrayRef> {
        graph.node_property(index)
    }

    fn properties(&self, graph: &PropertyFileGraph) -> Vec<ArrayRef> {
        graph.node_properties()
    }

    fn add_properties(&self, graph: &mut PropertyFileGraph, table: &RecordBatch) -> Result<()> {
        graph.add_node_properties(table)
    }

    fn remove_property(&self, graph: &mut PropertyFileGraph, index: usize) -> Result<()> {
        graph.remove_node_property(index)
    }
}

impl PropertyOps for EdgeOps {
    fn name(&self) -> &'static str {
        "edge"
    }

    fn schema(&self, graph: &PropertyFileGraph) -> SchemaRef {
        graph.edge_schema()
    }

    fn property(&self, graph: &PropertyFileGraph, index: usize) -> Option<ArrayRef> {
        graph.edge_property(index)
    }

    fn properties(&self, graph: &PropertyFileGraph) -> Vec<ArrayRef> {
        graph.edge_properties()
    }

    fn add_properties(&self, graph: &mut PropertyFileGraph, table: &RecordBatch) -> Result<()> {
        graph.add_edge_properties(table)
    }

    fn remove_property(&self, graph: &mut PropertyFileGraph, index: usize) -> Result<()> {
        graph.remove_edge_property(index)
    }
}

/// Read-only access to one kind of property on a shared graph.
///
/// Cheap to copy and usable wherever a `&PropertyFileGraph` is, including
/// from several threads at once.
#[derive(Clone, Copy)]
pub struct PropertyView<'g> {
    graph: &'g PropertyFileGraph,
    ops: &'static dyn PropertyOps,
}

impl<'g> PropertyView<'g> {
    pub fn new(graph: &'g PropertyFileGraph, ops: &'static dyn PropertyOps) -> Self {
        Self { graph, ops }
    }

    pub fn kind(&self) -> &'static str {
        self.ops.name()
    }

    pub fn graph(&self) -> &'g PropertyFileGraph {
        self.graph
    }

    pub fn schema(&self) -> SchemaRef {
        self.ops.schema(self.graph)
    }

    pub fn property(&self, index: usize) -> Option<ArrayRef> {
        self.ops.property(self.graph, index)
    }

    pub fn properties(&self) -> Vec<ArrayRef> {
        self.ops.properties(self.graph)
    }
}

/// A graph bound mutably to either its node or its edge property operations.
///
/// Borrows the graph exclusively for its whole life. Reads go through
/// [`PropertyViewMut::view`].
pub struct PropertyViewMut<'g> {
    graph: &'g mut PropertyFileGraph,
    ops: &'static dyn PropertyOps,
}

impl<'g> PropertyViewMut<'g> {
    pub fn new(graph: &'g mut PropertyFileGraph, ops: &'static dyn PropertyOps) -> Self {
        Self { graph, ops }
    }

    /// Shared view of the same kind, borrowing from this one.
    pub fn view(&self) -> PropertyView<'_> {
        PropertyView::new(&*self.graph, self.ops)
    }

    pub fn kind(&self) -> &'static str {
        self.ops.name()
    }

    pub fn add_properties(&mut self, table: &RecordBatch) -> Result<()> {
        self.ops.add_properties(&mut *self.graph, table)
    }

    pub fn remove_property(&mut self, index: usize) -> Result<()> {
        self.ops.remove_property(&mut *self.graph, index)
    }
}

impl fmt::Debug for PropertyView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyView")
            .field("kind", &self.kind())
            .field("properties", &self.schema().fields().len())
            .finish()
    }
}

impl fmt::Debug for PropertyViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyViewMut").field(&self.view()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::topology::GraphTopology;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn column(name: &str, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, false)])),
            vec![Arc::new(Int64Array::from(values))],
        )
        .unwrap()
    }

    fn graph() -> PropertyFileGraph {
        // 2 nodes, 3 edges
        let mut g = PropertyFileGraph::new();
        g.set_topology(GraphTopology::new(vec![2u64, 3], vec![0u32, 1, 0]))
            .unwrap();
        g
    }

    /// Written once, used for both kinds.
    fn add_then_drop_first(view: &mut PropertyViewMut<'_>, rows: usize) -> Result<usize> {
        view.add_properties(&column("p", (0..rows as i64).collect()))?;
        view.add_properties(&column("q", vec![1; rows]))?;
        view.remove_property(0)?;
        Ok(view.view().properties().len())
    }

    fn widest(views: &[PropertyView<'_>]) -> Option<&'static str> {
        views
            .iter()
            .max_by_key(|v| v.properties().len())
            .map(|v| v.kind())
    }

    #[test]
    fn views_dispatch_to_their_kind() {
        let mut g = graph();
        assert_eq!(add_then_drop_first(&mut g.node_property_view_mut(), 2).unwrap(), 1);
        assert_eq!(add_then_drop_first(&mut g.edge_property_view_mut(), 3).unwrap(), 1);

        assert_eq!(g.node_schema().field(0).name(), "q");
        assert_eq!(g.node_property(0).unwrap().len(), 2);
        assert_eq!(g.edge_property(0).unwrap().len(), 3);
    }

    #[test]
    fn view_reads_match_graph_reads() {
        let mut g = graph();
        g.add_node_properties(&column("a", vec![1, 2])).unwrap();
        g.add_node_properties(&column("b", vec![3, 4])).unwrap();
        let direct: Vec<Option<ArrayRef>> = (0..3).map(|i| g.node_property(i)).collect();
        let schema = g.node_schema();

        let view = g.node_property_view();
        assert_eq!(view.kind(), "node");
        assert_eq!(view.schema(), schema);
        for (i, expected) in direct.iter().enumerate() {
            assert_eq!(&view.property(i), expected);
        }
        assert_eq!(view.properties().len(), 2);
    }

    #[test]
    fn read_only_views_from_shared_graph() {
        let mut g = graph();
        g.add_edge_properties(&column("w", vec![1, 2, 3])).unwrap();
        let shared = &g;

        let views = [shared.node_property_view(), shared.edge_property_view()];
        assert_eq!(widest(&views), Some("edge"));
        assert!(std::ptr::eq(views[1].graph(), shared));
        assert_eq!(views[1].property(0), shared.edge_property(0));
    }

    #[test]
    fn view_errors_match_graph_errors() {
        let mut g = graph();
        let mut view = g.edge_property_view_mut();
        let rows = view.add_properties(&column("w", vec![1])).unwrap_err();
        assert_eq!(rows.kind(), ErrorKind::InvalidArgument);
        let range = view.remove_property(0).unwrap_err();
        assert_eq!(range.kind(), ErrorKind::OutOfRange);

        let direct = g.remove_edge_property(0).unwrap_err();
        assert_eq!(direct.to_string(), range.to_string());
    }
}
