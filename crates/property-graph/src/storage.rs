//! Filesystem backing store for property graphs.
//!
//! A graph lives in its own directory:
//!
//! ```text
//! <graph>/
//!   graph.json               metadata: id, generation, partition, property files
//!   topology-<gen>.bin       bincode-encoded GraphTopology
//!   node-<gen>-<i>.arrow     one Arrow IPC file per node property
//!   edge-<gen>-<i>.arrow     one Arrow IPC file per edge property
//! ```
//!
//! Each property sits in its own file so a selective load only opens the
//! columns it asked for. Writes produce a complete new generation of data
//! files, then swap `graph.json` with a rename, then delete older
//! generations. A reader always sees one whole generation.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef, RecordBatch};
use arrow::compute::concat;
use arrow::datatypes::{FieldRef, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{GraphError, Result};
use crate::table;
use crate::topology::GraphTopology;

const META_FILE: &str = "graph.json";
const META_TMP_FILE: &str = "graph.json.tmp";
const FORMAT_VERSION: u32 = 1;

/// Which slice of a partitioned graph a stored graph holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub partition_id: u32,
    pub num_partitions: u32,
}

impl Default for PartitionMetadata {
    fn default() -> Self {
        Self {
            partition_id: 0,
            num_partitions: 1,
        }
    }
}

impl PartitionMetadata {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.partition_id >= self.num_partitions {
            return Err(format!(
                "partition {} outside 0..{}",
                self.partition_id, self.num_partitions
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if the location already exists.
    CreateNew,
    /// Replace the graph stored at an existing location.
    Overwrite,
}

/// Which properties a load materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Exactly these properties, in this order.
    Only { node: Vec<String>, edge: Vec<String> },
}

impl Selection {
    pub fn only<N, E>(node: N, edge: E) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self::Only {
            node: node.into_iter().map(Into::into).collect(),
            edge: edge.into_iter().map(Into::into).collect(),
        }
    }
}

/// The in-memory pieces of a stored graph.
#[derive(Debug, Clone)]
pub struct GraphParts {
    pub topology: GraphTopology,
    pub node_table: RecordBatch,
    pub edge_table: RecordBatch,
    pub partition: PartitionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyEntry {
    name: String,
    file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphMeta {
    format_version: u32,
    graph_id: Uuid,
    generation: u64,
    written_at: DateTime<Utc>,
    partition: PartitionMetadata,
    num_nodes: u64,
    num_edges: u64,
    topology: String,
    node_properties: Vec<PropertyEntry>,
    edge_properties: Vec<PropertyEntry>,
}

/// Exclusive, open reference to a stored graph.
///
/// Holds the metadata file of the generation it last saw open until dropped.
/// A handle from a selective load that left stored properties behind is
/// partial and refuses to overwrite the graph.
#[derive(Debug)]
pub struct GraphHandle {
    path: PathBuf,
    graph_id: Uuid,
    generation: u64,
    partial: bool,
    _meta: File,
}

impl GraphHandle {
    fn open(path: &Path) -> Result<(Self, GraphMeta)> {
        let file = File::open(path.join(META_FILE))?;
        let meta: GraphMeta = serde_json::from_reader(BufReader::new(&file))?;
        if meta.format_version != FORMAT_VERSION {
            return Err(GraphError::corruption(format!(
                "unsupported format version {} (expected {})",
                meta.format_version, FORMAT_VERSION
            )));
        }
        debug!(path = %path.display(), generation = meta.generation, "opened graph handle");
        let handle = Self {
            path: path.to_path_buf(),
            graph_id: meta.graph_id,
            generation: meta.generation,
            partial: false,
            _meta: file,
        };
        Ok((handle, meta))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn graph_id(&self) -> Uuid {
        self.graph_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if the load behind this handle skipped some stored properties.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Replaces the graph at this handle's location with `parts`.
    ///
    /// Fails if the location has since been taken over by a different graph,
    /// or if this handle is partial: writing only the loaded properties would
    /// delete the ones left on disk.
    pub fn overwrite(&mut self, parts: &GraphParts) -> Result<()> {
        if self.partial {
            return Err(GraphError::InvalidState(format!(
                "{} was loaded selectively; write it to a new location instead",
                self.path.display()
            )));
        }
        let current = read_meta(&self.path)?;
        if current.graph_id != self.graph_id {
            return Err(GraphError::ForeignGraph(self.path.clone()));
        }

        let generation = current.generation + 1;
        write_generation(&self.path, parts, self.graph_id, generation)?;
        remove_stale(&self.path, generation);
        info!(path = %self.path.display(), generation, "overwrote graph");

        let (fresh, _) = Self::open(&self.path)?;
        *self = fresh;
        Ok(())
    }
}

impl Drop for GraphHandle {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "closed graph handle");
    }
}

/// Loads and stores graphs under a configured root directory.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    config: StoreConfig,
}

impl GraphStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.config.resolve(name)?.join(META_FILE).exists())
    }

    /// Opens a handle on the graph at `name` without loading any data.
    pub fn open_handle(&self, name: &str) -> Result<GraphHandle> {
        let (handle, _) = GraphHandle::open(&self.config.resolve(name)?)?;
        Ok(handle)
    }

    /// Loads the graph called `name`, restricted to `selection`.
    pub fn load(&self, name: &str, selection: &Selection) -> Result<(GraphHandle, GraphParts)> {
        let path = self.config.resolve(name)?;
        let (mut handle, meta) = GraphHandle::open(&path)?;

        let topology: GraphTopology =
            bincode::deserialize_from(BufReader::new(open_referenced(&path.join(&meta.topology))?))?;
        if topology.num_nodes() != meta.num_nodes || topology.num_edges() != meta.num_edges {
            return Err(GraphError::corruption(format!(
                "topology has {} nodes and {} edges, metadata records {} and {}",
                topology.num_nodes(),
                topology.num_edges(),
                meta.num_nodes,
                meta.num_edges
            )));
        }

        let (node_entries, edge_entries): (Vec<&PropertyEntry>, Vec<&PropertyEntry>) = match selection {
            Selection::All => (
                meta.node_properties.iter().collect(),
                meta.edge_properties.iter().collect(),
            ),
            Selection::Only { node, edge } => (
                select(&meta.node_properties, node, "node")?,
                select(&meta.edge_properties, edge, "edge")?,
            ),
        };

        handle.partial = node_entries.len() < meta.node_properties.len()
            || edge_entries.len() < meta.edge_properties.len();

        let node_table = read_table(&path, &node_entries, topology.num_nodes())?;
        let edge_table = read_table(&path, &edge_entries, topology.num_edges())?;

        info!(
            path = %path.display(),
            generation = meta.generation,
            nodes = topology.num_nodes(),
            edges = topology.num_edges(),
            node_properties = node_table.num_columns(),
            edge_properties = edge_table.num_columns(),
            "loaded graph"
        );

        let parts = GraphParts {
            topology,
            node_table,
            edge_table,
            partition: meta.partition,
        };
        Ok((handle, parts))
    }

    /// Writes `parts` to `name` and returns a handle on the result.
    pub fn store(&self, name: &str, parts: &GraphParts, mode: WriteMode) -> Result<GraphHandle> {
        let path = self.config.resolve(name)?;
        match mode {
            WriteMode::CreateNew => create_at(&path, parts),
            WriteMode::Overwrite => {
                let mut handle = self.open_handle(name)?;
                handle.overwrite(parts)?;
                Ok(handle)
            }
        }
    }
}

fn create_at(path: &Path, parts: &GraphParts) -> Result<GraphHandle> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => GraphError::AlreadyExists(path.to_path_buf()),
        _ => GraphError::Io(e),
    })?;

    let graph_id = Uuid::new_v4();
    if let Err(e) = write_generation(path, parts, graph_id, 0) {
        if let Err(cleanup) = fs::remove_dir_all(path) {
            warn!(path = %path.display(), error = %cleanup, "failed to remove partial graph");
        }
        return Err(e);
    }
    info!(path = %path.display(), %graph_id, "created graph");

    let (handle, _) = GraphHandle::open(path)?;
    Ok(handle)
}

fn select<'a>(
    entries: &'a [PropertyEntry],
    requested: &[String],
    kind: &str,
) -> Result<Vec<&'a PropertyEntry>> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .map(|name| {
            if !seen.insert(name.as_str()) {
                return Err(GraphError::invalid_argument(format!(
                    "{kind} property {name} requested more than once"
                )));
            }
            let mut matches = entries.iter().filter(|e| &e.name == name);
            match (matches.next(), matches.next()) {
                (Some(entry), None) => Ok(entry),
                (None, _) => Err(GraphError::invalid_argument(format!(
                    "{kind} property {name} not found"
                ))),
                (Some(_), Some(_)) => Err(GraphError::invalid_argument(format!(
                    "{kind} property {name} matches more than one stored property"
                ))),
            }
        })
        .collect()
}

fn read_meta(path: &Path) -> Result<GraphMeta> {
    let file = File::open(path.join(META_FILE))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn read_table(dir: &Path, entries: &[&PropertyEntry], num_rows: u64) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(entries.len());
    let mut columns = Vec::with_capacity(entries.len());
    for entry in entries {
        let (field, column) = read_column(&dir.join(&entry.file))?;
        if field.name() != &entry.name {
            return Err(GraphError::corruption(format!(
                "{} holds property {}, metadata says {}",
                entry.file,
                field.name(),
                entry.name
            )));
        }
        fields.push(field);
        columns.push(column);
    }
    table::assemble(fields, columns, num_rows as usize)
        .map_err(|e| GraphError::corruption(format!("property rows do not match topology: {e}")))
}

/// Opens a data file named by the metadata. Its absence means the stored
/// graph is inconsistent, not that the graph is missing.
fn open_referenced(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GraphError::corruption(format!(
            "{} is listed in {META_FILE} but missing",
            path.display()
        )),
        _ => GraphError::Io(e),
    })
}

fn read_column(path: &Path) -> Result<(FieldRef, ArrayRef)> {
    let reader = FileReader::try_new(BufReader::new(open_referenced(path)?), None)?;
    let schema = reader.schema();
    if schema.fields().len() != 1 {
        return Err(GraphError::corruption(format!(
            "{} holds {} columns, expected 1",
            path.display(),
            schema.fields().len()
        )));
    }
    let field = schema.fields()[0].clone();

    let mut chunks = Vec::new();
    for batch in reader {
        chunks.push(batch?.column(0).clone());
    }
    let column = match chunks.len() {
        0 => new_empty_array(field.data_type()),
        1 => chunks.swap_remove(0),
        _ => {
            let refs: Vec<&dyn Array> = chunks.iter().map(|c| c.as_ref()).collect();
            concat(&refs)?
        }
    };
    Ok((field, column))
}

fn write_generation(
    dir: &Path,
    parts: &GraphParts,
    graph_id: Uuid,
    generation: u64,
) -> Result<()> {
    let topology = format!("topology-{generation}.bin");
    let mut out = BufWriter::new(File::create(dir.join(&topology))?);
    bincode::serialize_into(&mut out, &parts.topology)?;
    out.flush()?;

    let node_properties = write_columns(dir, "node", generation, &parts.node_table)?;
    let edge_properties = write_columns(dir, "edge", generation, &parts.edge_table)?;

    let meta = GraphMeta {
        format_version: FORMAT_VERSION,
        graph_id,
        generation,
        written_at: Utc::now(),
        partition: parts.partition,
        num_nodes: parts.topology.num_nodes(),
        num_edges: parts.topology.num_edges(),
        topology,
        node_properties,
        edge_properties,
    };
    write_meta(dir, &meta)
}

fn write_columns(
    dir: &Path,
    kind: &str,
    generation: u64,
    table: &RecordBatch,
) -> Result<Vec<PropertyEntry>> {
    let schema = table.schema();
    schema
        .fields()
        .iter()
        .zip(table.columns())
        .enumerate()
        .map(|(i, (field, column))| -> Result<PropertyEntry> {
            let file = format!("{kind}-{generation}-{i}.arrow");
            write_column(&dir.join(&file), field, column)?;
            Ok(PropertyEntry {
                name: field.name().clone(),
                file,
            })
        })
        .collect()
}

fn write_column(path: &Path, field: &FieldRef, column: &ArrayRef) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![field.clone()]));
    let batch = RecordBatch::try_new(schema.clone(), vec![column.clone()])?;
    let mut writer = FileWriter::try_new(BufWriter::new(File::create(path)?), &schema)?;
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

fn write_meta(dir: &Path, meta: &GraphMeta) -> Result<()> {
    let tmp = dir.join(META_TMP_FILE);
    let content = serde_json::to_string_pretty(meta)?;
    {
        let mut file = File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dir.join(META_FILE))?;
    Ok(())
}

/// Generation encoded in a data file name, e.g. `node-3-0.arrow` -> 3.
fn file_generation(name: &str) -> Option<u64> {
    let rest = ["topology-", "node-", "edge-"]
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))?;
    let digits = rest.split(['-', '.']).next()?;
    digits.parse().ok()
}

fn remove_stale(dir: &Path, keep: u64) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot scan for stale graph files");
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(generation) = name.to_str().and_then(file_generation) else {
            continue;
        };
        if generation != keep {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(file = %entry.path().display(), error = %e, "failed to remove stale graph file");
            }
        }
    }
}
