use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use property_graph::{ErrorKind, GraphTopology, PropertyFileGraph};
use tempfile::tempdir;

fn name_of(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> RecordBatch {
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
}

/// Path graph 0 -> 1 -> 2 -> 3 plus a back edge 3 -> 0.
fn ring_graph() -> Result<PropertyFileGraph> {
    property_graph::logging::init();
    let mut g = PropertyFileGraph::new();
    g.set_topology(GraphTopology::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0)])?)?;
    g.add_node_properties(&batch(
        vec![
            Field::new("label", DataType::Utf8, false),
            Field::new("score", DataType::Float64, true),
            Field::new("age", DataType::Int64, false),
        ],
        vec![
            Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
            Arc::new(Float64Array::from(vec![Some(1.5), None, Some(0.25), Some(9.0)])),
            Arc::new(Int64Array::from(vec![10, 20, 30, 40])),
        ],
    ))?;
    g.add_edge_properties(&batch(
        vec![Field::new("active", DataType::Boolean, false)],
        vec![Arc::new(BooleanArray::from(vec![true, false, true, true]))],
    ))?;
    Ok(g)
}

#[test]
fn triangle_scenario() -> Result<()> {
    let dir = tempdir()?;
    let g1 = name_of(&dir.path().join("g1"));

    let colors: ArrayRef = Arc::new(StringArray::from(vec!["red", "green", "blue"]));
    let mut g = PropertyFileGraph::new();
    g.set_topology(GraphTopology::new(vec![1u64, 2, 3], vec![1u32, 2, 0]))?;
    g.add_node_properties(&batch(
        vec![Field::new("color", DataType::Utf8, false)],
        vec![colors.clone()],
    ))?;
    g.write_to(&g1)?;

    let loaded = PropertyFileGraph::make(&g1)?;
    assert_eq!(loaded.num_nodes(), 3);
    assert_eq!(loaded.num_edges(), 3);
    assert_eq!(loaded.node_schema().field(0).name(), "color");
    assert_eq!(loaded.node_property(0), Some(colors));
    Ok(())
}

#[test]
fn full_round_trip_preserves_everything() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));

    let mut g = ring_graph()?;
    g.write_to(&name)?;

    let loaded = PropertyFileGraph::make(&name)?;
    assert_eq!(loaded.topology(), g.topology());
    assert_eq!(loaded.node_schema(), g.node_schema());
    assert_eq!(loaded.edge_schema(), g.edge_schema());
    assert_eq!(loaded.node_properties(), g.node_properties());
    assert_eq!(loaded.edge_properties(), g.edge_properties());
    assert_eq!(loaded.location(), Some(dir.path().join("ring").as_path()));
    Ok(())
}

#[test]
fn write_to_existing_location_fails() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));

    ring_graph()?.write_to(&name)?;
    let err = ring_graph()?.write_to(&name).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn selective_load_orders_and_filters() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));
    ring_graph()?.write_to(&name)?;

    let g = PropertyFileGraph::make_selective(&name, &["age", "label"], &[])?;
    let names: Vec<String> = g
        .node_schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(names, vec!["age", "label"]);
    assert!(g.edge_properties().is_empty());
    assert_eq!(g.num_edges(), 4);

    let err = PropertyFileGraph::make_selective(&name, &["missing"], &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = PropertyFileGraph::make_selective(&name, &[], &["label"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}

#[test]
fn in_place_write_persists_mutations() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));
    ring_graph()?.write_to(&name)?;

    let mut g = PropertyFileGraph::make(&name)?;
    let before = g.handle().map(|h| h.generation());
    g.remove_node_property(1)?;
    g.add_edge_properties(&batch(
        vec![Field::new("weight", DataType::Int64, false)],
        vec![Arc::new(Int64Array::from(vec![4, 3, 2, 1]))],
    ))?;
    g.write()?;
    assert_eq!(g.handle().map(|h| h.generation()), before.map(|n| n + 1));

    let reloaded = PropertyFileGraph::make(&name)?;
    let node_names: Vec<String> = reloaded
        .node_schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    assert_eq!(node_names, vec!["label", "age"]);
    assert_eq!(reloaded.edge_properties(), g.edge_properties());
    Ok(())
}

#[test]
fn selectively_loaded_graph_writes_back_what_it_holds() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));
    ring_graph()?.write_to(&name)?;

    let mut partial = PropertyFileGraph::make_selective(&name, &["score"], &["active"])?;
    let copy = name_of(&dir.path().join("ring-score"));
    partial.write_to(&copy)?;

    let reloaded = PropertyFileGraph::make(&copy)?;
    assert_eq!(reloaded.node_properties().len(), 1);
    assert_eq!(reloaded.node_schema().field(0).name(), "score");
    assert_eq!(reloaded.edge_schema().field(0).name(), "active");
    Ok(())
}

#[test]
fn loading_a_missing_graph_is_io_error() {
    let dir = tempdir().unwrap();
    let err = PropertyFileGraph::make(&name_of(&dir.path().join("nothing"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn view_matches_direct_access_after_load() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));
    ring_graph()?.write_to(&name)?;

    let g = PropertyFileGraph::make(&name)?;
    let view = g.node_property_view();
    for i in 0..3 {
        assert_eq!(view.property(i), g.node_property(i));
    }
    assert_eq!(g.edge_property_view().properties(), g.edge_properties());
    Ok(())
}

#[test]
fn in_place_write_after_selective_load_keeps_unloaded_properties() -> Result<()> {
    let dir = tempdir()?;
    let name = name_of(&dir.path().join("ring"));
    ring_graph()?.write_to(&name)?;

    let mut partial = PropertyFileGraph::make_selective(&name, &["label"], &[])?;
    let err = partial.write().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(partial.location(), Some(dir.path().join("ring").as_path()));

    let full = PropertyFileGraph::make(&name)?;
    assert_eq!(full.node_properties().len(), 3);
    assert_eq!(full.edge_properties().len(), 1);

    // Selecting everything is an ordinary load and can be written back.
    let mut everything =
        PropertyFileGraph::make_selective(&name, &["age", "score", "label"], &["active"])?;
    everything.remove_node_property_by_name("score")?;
    everything.write()?;
    assert_eq!(PropertyFileGraph::make(&name)?.node_properties().len(), 2);
    Ok(())
}
