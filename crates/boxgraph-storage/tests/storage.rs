//! Directory-backed checkpoints and preset exchange between projects.

use boxgraph_core::catalog::{audio_connection, audio_file, audio_region, audio_unit, root, track};
use boxgraph_core::{Address, BoxGraph, BoxId, BoxKind, Value};
use boxgraph_storage::{
    graph_digest, load_graph, save_graph, CheckpointManager, DirectoryStore, GraphStore,
    PresetDecoder, PresetEncoder, StorageError,
};

fn id(n: u8) -> BoxId {
    BoxId::from_bytes([n; 16])
}

fn project() -> BoxGraph {
    let mut graph = BoxGraph::new();
    graph
        .transact(|g| {
            g.create_box(BoxKind::Root, id(1), |_| {})?;
            g.create_box(BoxKind::AudioUnit, id(2), |b| {
                b.refer(&[audio_unit::HOST], Address::new(id(1), &[root::AUDIO_UNITS]));
            })?;
            g.create_box(BoxKind::Track, id(3), |b| {
                b.refer(&[track::AUDIO_UNIT], Address::new(id(2), &[audio_unit::TRACKS]));
            })?;
            g.create_box(BoxKind::AudioFile, id(4), |b| {
                b.set(&[audio_file::FILE_NAME], "kick.wav");
            })?;
            g.create_box(BoxKind::AudioRegion, id(5), |b| {
                b.refer(&[audio_region::REGIONS], Address::new(id(3), &[track::REGIONS]))
                    .refer(&[audio_region::FILE], Address::of_box(id(4)))
                    .set(&[audio_region::DURATION], 96);
            })?;
            Ok(())
        })
        .unwrap();
    graph
}

#[test]
fn checkpoints_survive_in_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let graph = project();

    let mut manager = CheckpointManager::new(DirectoryStore::open(dir.path()).unwrap());
    let info = manager.create("first-take", &graph).unwrap();
    assert_eq!(info.boxes, 5);
    assert_eq!(info.digest, graph_digest(&graph).to_hex().to_string());

    // a fresh store over the same directory sees the checkpoint
    let reopened = CheckpointManager::new(DirectoryStore::open(dir.path()).unwrap());
    let restored = reopened.restore("first-take").unwrap();
    assert_eq!(restored.to_bytes(), graph.to_bytes());
    assert!(restored.edges().validate_requirements().is_empty());
    assert_eq!(reopened.store().names().unwrap(), vec!["first-take".to_string()]);
}

#[test]
fn directory_store_rejects_path_names() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirectoryStore::open(dir.path()).unwrap();
    assert!(matches!(
        store.put("../escape", b"x"),
        Err(StorageError::InvalidName { .. })
    ));
    assert_eq!(store.get("missing").unwrap(), None);
    assert!(!store.remove("missing").unwrap());
}

#[test]
fn save_and_load_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("song.bxgr");
    let graph = project();
    save_graph(&path, &graph).unwrap();
    let loaded = load_graph(&path).unwrap();
    assert_eq!(graph_digest(&loaded), graph_digest(&graph));
}

#[test]
fn preset_carries_unit_with_tracks_regions_and_file() {
    let source = project();
    let bytes = PresetEncoder::encode(&source, id(2)).unwrap();

    let mut target = BoxGraph::new();
    target
        .transact(|g| g.create_box(BoxKind::Root, id(10), |_| {}).map(|_| ()))
        .unwrap();
    let host = Address::new(id(10), &[root::AUDIO_UNITS]);

    target.begin_transaction().unwrap();
    let outcome = PresetDecoder::decode(&bytes, &mut target, &host).unwrap();
    target.end_transaction().unwrap();

    assert_eq!(target.box_count(), 5);
    assert_ne!(outcome.root, id(2));
    // preserved resources keep their identity
    assert!(target.contains_box(id(4)));
    assert_eq!(
        target.value(&Address::new(id(4), &[audio_file::FILE_NAME])),
        Some(&Value::from("kick.wav"))
    );
    assert!(target.edges().validate_requirements().is_empty());
}

#[test]
fn preset_rejected_when_header_is_wrong() {
    let graph = project();
    let mut bytes = PresetEncoder::encode(&graph, id(2)).unwrap();
    bytes[0] ^= 0xff;
    let mut target = project();
    target.begin_transaction().unwrap();
    let before = target.box_count();
    assert!(PresetDecoder::decode(&bytes, &mut target, &Address::new(id(1), &[root::AUDIO_UNITS])).is_err());
    target.end_transaction().unwrap();
    assert_eq!(target.box_count(), before);
}

#[test]
fn preset_of_a_connected_unit_leaves_the_connection_behind() {
    let mut source = project();
    source
        .transact(|g| {
            g.create_box(BoxKind::AudioUnit, id(6), |b| {
                b.refer(&[audio_unit::HOST], Address::new(id(1), &[root::AUDIO_UNITS]));
            })?;
            g.create_box(BoxKind::AudioConnection, id(7), |b| {
                b.refer(&[audio_connection::SOURCE], Address::new(id(2), &[audio_unit::OUTPUT]))
                    .refer(&[audio_connection::TARGET], Address::new(id(6), &[audio_unit::INPUT]));
            })?;
            Ok(())
        })
        .unwrap();

    let bytes = PresetEncoder::encode(&source, id(2)).unwrap();
    let preset = PresetDecoder::read(&bytes).unwrap();
    assert!(preset
        .records()
        .iter()
        .all(|r| r.kind != BoxKind::AudioConnection));

    let mut target = BoxGraph::new();
    target
        .transact(|g| g.create_box(BoxKind::Root, id(10), |_| {}).map(|_| ()))
        .unwrap();
    let host = Address::new(id(10), &[root::AUDIO_UNITS]);
    target.begin_transaction().unwrap();
    preset.insert(&mut target, &host).unwrap();
    target.end_transaction().unwrap();

    // root, unit, track, region, file
    assert_eq!(target.box_count(), 5);
}
