//! A graph whose CSR topology and columnar node and edge properties live in
//! a directory on disk.
//!
//! [`PropertyFileGraph`] is the entry point. Operations report progress
//! through `tracing`; programs that want to see it call [`logging::init`]
//! at startup.

pub mod topology {
    use std::ops::Range;
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};

    use crate::error::{GraphError, Result};

    /// Graph topology in CSR form.
    ///
    /// `out_indices[i]` is the number of edges of nodes `0..=i`, so the
    /// neighbors of node `i` are `out_dests[out_indices[i - 1]..out_indices[i]]`
    /// with an implicit leading zero. Either array may be absent, which reads
    /// as an empty graph.
    ///
    /// Arrays are shared, immutable buffers. Cloning a topology never copies
    /// edge data.
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct GraphTopology {
        out_indices: Option<Arc<[u64]>>,
        out_dests: Option<Arc<[u32]>>,
    }

    /// Who provided the buffers behind a graph's active topology.
    ///
    /// `Borrowed` buffers were handed in through `set_topology` and stay
    /// shared with the caller; the graph holds a reference count, never a copy.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum TopologyOwnership {
        #[default]
        Owned,
        Borrowed,
    }

    impl GraphTopology {
        pub fn new(out_indices: impl Into<Arc<[u64]>>, out_dests: impl Into<Arc<[u32]>>) -> Self {
            Self {
                out_indices: Some(out_indices.into()),
                out_dests: Some(out_dests.into()),
            }
        }

        /// Builds a topology from directed `(src, dst)` pairs.
        ///
        /// Edges keep their input order within each source node.
        pub fn from_edges(num_nodes: u32, edges: &[(u32, u32)]) -> Result<Self> {
            let n = num_nodes as usize;
            let mut degree = vec![0u64; n];
            for &(src, dst) in edges {
                if src >= num_nodes || dst >= num_nodes {
                    return Err(GraphError::invalid_argument(format!(
                        "edge ({src}, {dst}) references a node outside 0..{num_nodes}"
                    )));
                }
                degree[src as usize] += 1;
            }

            let mut out_indices = Vec::with_capacity(n);
            let mut total = 0u64;
            for d in &degree {
                total += d;
                out_indices.push(total);
            }

            let mut cursor: Vec<u64> = out_indices.iter().zip(&degree).map(|(end, d)| end - d).collect();
            let mut out_dests = vec![0u32; edges.len()];
            for &(src, dst) in edges {
                let pos = &mut cursor[src as usize];
                out_dests[*pos as usize] = dst;
                *pos += 1;
            }

            Ok(Self::new(out_indices, out_dests))
        }

        pub fn num_nodes(&self) -> u64 {
            self.out_indices.as_ref().map_or(0, |a| a.len() as u64)
        }

        pub fn num_edges(&self) -> u64 {
            self.out_dests.as_ref().map_or(0, |a| a.len() as u64)
        }

        pub fn is_initialized(&self) -> bool {
            self.out_indices.is_some() && self.out_dests.is_some()
        }

        pub fn out_indices(&self) -> &[u64] {
            self.out_indices.as_deref().unwrap_or(&[])
        }

        pub fn out_dests(&self) -> &[u32] {
            self.out_dests.as_deref().unwrap_or(&[])
        }

        /// Positions in `out_dests` holding the out-edges of `node`.
        pub fn edge_range(&self, node: u32) -> Option<Range<u64>> {
            let indices = self.out_indices();
            let i = node as usize;
            let end = *indices.get(i)?;
            let start = if i == 0 { 0 } else { indices[i - 1] };
            Some(start..end)
        }

        pub fn neighbors(&self, node: u32) -> &[u32] {
            self.edge_range(node)
                .and_then(|r| self.out_dests().get(r.start as usize..r.end as usize))
                .unwrap_or(&[])
        }

        /// True if both arrays are the very same allocations as `other`'s.
        pub fn shares_storage_with(&self, other: &GraphTopology) -> bool {
            let same_indices = match (&self.out_indices, &other.out_indices) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            let same_dests = match (&self.out_dests, &other.out_dests) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            };
            same_indices && same_dests
        }

        /// Checks CSR well-formedness.
        pub fn validate(&self) -> std::result::Result<(), String> {
            let indices = self.out_indices();
            let dests = self.out_dests();

            let mut prev = 0u64;
            for (i, &end) in indices.iter().enumerate() {
                if end < prev {
                    return Err(format!(
                        "out_indices[{}] = {} is less than out_indices[{}] = {}",
                        i,
                        end,
                        i - 1,
                        prev
                    ));
                }
                prev = end;
            }

            if prev != dests.len() as u64 {
                return Err(format!(
                    "last out_index {} does not match edge count {}",
                    prev,
                    dests.len()
                ));
            }

            let num_nodes = self.num_nodes();
            if let Some((pos, dest)) = dests
                .iter()
                .enumerate()
                .find(|(_, d)| u64::from(**d) >= num_nodes)
            {
                return Err(format!(
                    "out_dests[{}] = {} is not a node (graph has {} nodes)",
                    pos, dest, num_nodes
                ));
            }

            Ok(())
        }
    }

}

pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod storage;
pub mod table;
pub mod view;

pub use config::StoreConfig;
pub use error::{ErrorKind, GraphError, Result};
pub use graph::PropertyFileGraph;
pub use storage::{GraphHandle, GraphParts, GraphStore, PartitionMetadata, Selection, WriteMode};
pub use topology::{GraphTopology, TopologyOwnership};
pub use view::{EdgeOps, NodeOps, PropertyOps, PropertyView, PropertyViewMut};
