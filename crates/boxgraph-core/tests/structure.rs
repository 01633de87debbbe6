//! Structural rules, cascading deletion and dependency ordering, exercised
//! through the public BoxGraph API only.

use std::cell::RefCell;
use std::rc::Rc;

use boxgraph_core::catalog::{audio_connection, audio_region, audio_unit, root, step_sequencer, track};
use boxgraph_core::{
    Address, BoxGraph, BoxId, BoxKind, BoxNode, CoreError, DependencyOptions, HubChange, Value,
    Violation,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn id(byte: u8) -> BoxId {
    BoxId::from_bytes([byte; 16])
}

const ROOT: u8 = 1;

/// Root plus `units` audio units with ids 10, 11, ...
fn project(units: u8) -> BoxGraph {
    let mut graph = BoxGraph::new();
    graph
        .transact(|g| {
            g.create_box(BoxKind::Root, id(ROOT), |_| {})?;
            for n in 0..units {
                g.create_box(BoxKind::AudioUnit, id(10 + n), |b| {
                    b.refer(&[audio_unit::HOST], Address::new(id(ROOT), &[root::AUDIO_UNITS]))
                        .set(&[audio_unit::INDEX], n as i32);
                })?;
            }
            Ok(())
        })
        .unwrap();
    graph
}

fn connect(graph: &mut BoxGraph, connection: BoxId, from: BoxId, to: BoxId) -> Result<BoxId, CoreError> {
    graph.create_box(BoxKind::AudioConnection, connection, |b| {
        b.refer(&[audio_connection::SOURCE], Address::new(from, &[audio_unit::OUTPUT]))
            .refer(&[audio_connection::TARGET], Address::new(to, &[audio_unit::INPUT]));
    })
}

// ---------------------------------------------------------------------------
// Exclusive and mandatory
// ---------------------------------------------------------------------------

#[test]
fn exclusive_input_scenario() {
    // A = unit 10 (exclusive input), B and C = units 11 and 12 feeding it
    let mut graph = project(3);
    let a_in = Address::new(id(10), &[audio_unit::INPUT]);
    let counts = Rc::new(RefCell::new((0usize, 0usize)));
    {
        let counts = Rc::clone(&counts);
        graph.subscribe_pointer_hub(a_in.clone(), &[], move |event| {
            let mut counts = counts.borrow_mut();
            match event.change {
                HubChange::Added => counts.0 += 1,
                HubChange::Removed => counts.1 += 1,
            }
        });
    }

    graph.transact(|g| connect(g, id(20), id(11), id(10)).map(|_| ())).unwrap();

    let err = graph
        .transact(|g| connect(g, id(21), id(12), id(10)).map(|_| ()))
        .unwrap_err();
    let violations = err.violations();
    assert_eq!(violations.len(), 1);
    match &violations[0] {
        Violation::ExclusiveTarget {
            context, incoming, ..
        } => {
            assert_eq!(context, "AudioUnit.input");
            assert_eq!(*incoming, 2);
        }
        other => panic!("unexpected violation: {other}"),
    }
    assert!(err.to_string().contains("AudioUnit.input"));
    assert!(err.to_string().contains("is exclusive but has 2 incoming pointers"));
    // the mutation stayed
    assert_eq!(graph.pointer_hub(&a_in).len(), 2);

    // disconnecting B leaves C as the only input of A
    graph.transact(|g| g.delete_box(id(20)).map(|_| ())).unwrap();
    let c_target = Address::new(id(21), &[audio_connection::TARGET]);
    let hub = graph.pointer_hub(&a_in);
    assert_eq!(hub.len(), 1);
    assert_eq!(hub.incoming(), vec![c_target.clone()]);
    assert!(hub.contains(&c_target));
    assert!(graph.edges().validate_requirements().is_empty());

    // two adds (B, C), one remove (B)
    assert_eq!(*counts.borrow(), (2, 1));
}

#[test]
fn violations_are_only_checked_at_transaction_end() {
    let mut graph = project(2);
    graph.begin_transaction().unwrap();
    connect(&mut graph, id(20), id(11), id(10)).unwrap();
    connect(&mut graph, id(21), id(11), id(10)).unwrap();
    // temporarily invalid
    assert_eq!(graph.edges().validate_requirements().len(), 1);
    graph.delete_box(id(21)).unwrap();
    graph.end_transaction().unwrap();
}

#[test]
fn mandatory_pointer_must_hold_a_target() {
    let mut graph = project(1);
    let err = graph
        .transact(|g| g.create_box(BoxKind::Track, id(30), |_| {}).map(|_| ()))
        .unwrap_err();
    assert!(matches!(
        err.violations(),
        [Violation::MandatoryPointer { context, .. }] if context == "Track.audio_unit"
    ));
    // the box was kept
    assert!(graph.find_box(id(30)).is_some());
}

#[test]
fn mandatory_target_needs_an_incoming_pointer() {
    let mut graph = project(1);
    let err = graph
        .transact(|g| g.create_box(BoxKind::AudioBus, id(40), |_| {}).map(|_| ()))
        .unwrap_err();
    assert!(matches!(
        err.violations(),
        [Violation::MandatoryTarget { context, .. }] if context == "AudioBus.input"
    ));

    graph
        .transact(|g| {
            g.refer(
                &Address::new(id(10), &[audio_unit::OUTPUT_BUS]),
                &Address::new(id(40), &[1]),
            )
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// Cascading delete
// ---------------------------------------------------------------------------

#[test]
fn cascade_deletes_mandatory_dependents_and_clears_optional_pointers() {
    let mut graph = project(3);
    let root_hub = Address::new(id(ROOT), &[root::AUDIO_UNITS]);
    let output_of_11 = Address::new(id(11), &[audio_unit::OUTPUT]);
    let counts = Rc::new(RefCell::new((0usize, 0usize)));
    for target in [root_hub.clone(), output_of_11.clone()] {
        let counts = Rc::clone(&counts);
        graph.subscribe_pointer_hub(target, &[], move |event| {
            let mut counts = counts.borrow_mut();
            match event.change {
                HubChange::Added => counts.0 += 1,
                HubChange::Removed => counts.1 += 1,
            }
        });
    }
    graph
        .transact(|g| {
            // two tracks with one region each depend on unit 10
            for (t, r) in [(30u8, 50u8), (31, 51)] {
                g.create_box(BoxKind::Track, id(t), |b| {
                    b.refer(&[track::AUDIO_UNIT], Address::new(id(10), &[audio_unit::TRACKS]));
                })?;
                g.create_box(BoxKind::AudioFile, id(r + 10), |_| {})?;
                g.create_box(BoxKind::AudioRegion, id(r), |b| {
                    b.refer(&[audio_region::REGIONS], Address::new(id(t), &[track::REGIONS]))
                        .refer(&[audio_region::FILE], id(r + 10));
                })?;
            }
            // unit 11 feeds unit 10; the connection depends on both
            connect(g, id(20), id(11), id(10))?;
            Ok(())
        })
        .unwrap();

    let before = graph.box_count();
    let deleted = graph.transact(|g| g.delete_box(id(10))).unwrap();

    // unit, 2 tracks, 2 regions, the connection; files are not dependents
    assert_eq!(deleted.len(), 6);
    assert_eq!(deleted[0], id(10));
    assert_eq!(graph.box_count(), before - 6);
    for gone in [10u8, 30, 31, 50, 51, 20] {
        assert!(graph.find_box(id(gone)).is_none());
    }
    for kept in [11u8, 12, 60, 61] {
        assert!(graph.find_box(id(kept)).is_some());
    }
    // wiring the connection added one edge to unit 11's output; the delete
    // removed it and unit 10's host pointer
    assert_eq!(*counts.borrow(), (1, 2));
    assert_eq!(graph.pointer_hub(&root_hub).len(), 2);
    assert!(graph.pointer_hub(&output_of_11).is_empty());
    assert_eq!(graph.verify_pointers().unwrap(), graph.edges().len());
}

#[test]
fn deleting_a_target_clears_optional_pointers() {
    let mut graph = project(2);
    graph
        .transact(|g| {
            g.create_box(BoxKind::AudioBus, id(40), |_| {})?;
            for unit in [10u8, 11] {
                g.refer(
                    &Address::new(id(unit), &[audio_unit::OUTPUT_BUS]),
                    &Address::new(id(40), &[1]),
                )?;
            }
            Ok(())
        })
        .unwrap();

    let deleted = graph.transact(|g| g.delete_box(id(40))).unwrap();
    assert_eq!(deleted, vec![id(40)]);
    for unit in [10u8, 11] {
        assert_eq!(
            graph.pointer_target(&Address::new(id(unit), &[audio_unit::OUTPUT_BUS])),
            None
        );
    }
}

#[test]
fn deleted_ids_are_retired() {
    let mut graph = project(1);
    graph.transact(|g| g.delete_box(id(10)).map(|_| ())).unwrap();
    graph.begin_transaction().unwrap();
    let err = graph
        .create_box(BoxKind::AudioUnit, id(10), |_| {})
        .unwrap_err();
    assert!(matches!(err, CoreError::RetiredBox { .. }));
    graph.end_transaction().unwrap();
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

#[test]
fn direct_dependents_precede_indirect_ones() {
    let mut graph = project(1);
    graph
        .transact(|g| {
            // ids chosen so that the indirect region sorts before the tracks
            g.create_box(BoxKind::Track, id(90), |b| {
                b.refer(&[track::AUDIO_UNIT], Address::new(id(10), &[audio_unit::TRACKS]));
            })?;
            g.create_box(BoxKind::Track, id(80), |b| {
                b.refer(&[track::AUDIO_UNIT], Address::new(id(10), &[audio_unit::TRACKS]));
            })?;
            g.create_box(BoxKind::AudioFile, id(2), |_| {})?;
            g.create_box(BoxKind::AudioRegion, id(3), |b| {
                b.refer(&[audio_region::REGIONS], Address::new(id(90), &[track::REGIONS]))
                    .refer(&[audio_region::FILE], id(2));
            })?;
            g.create_box(BoxKind::StepSequencer, id(70), |b| {
                b.refer(&[step_sequencer::HOST], Address::new(id(10), &[audio_unit::MIDI_EFFECTS]));
            })?;
            Ok(())
        })
        .unwrap();

    let deps = graph.dependencies_of(&[id(10)], &DependencyOptions::default());
    assert_eq!(deps.boxes, vec![id(70), id(80), id(90), id(3), id(2)]);
    for _ in 0..3 {
        assert_eq!(
            graph.dependencies_of(&[id(10)], &DependencyOptions::default()),
            deps
        );
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn pattern_grid_survives_a_graph_snapshot() {
    let mut graph = project(1);
    let cell = |p: u16, s: u16, key: u16| {
        Address::new(
            id(70),
            &[step_sequencer::PATTERNS, p, step_sequencer::pattern::STEPS, s, key],
        )
    };
    graph
        .transact(|g| {
            g.create_box(BoxKind::StepSequencer, id(70), |b| {
                b.refer(&[step_sequencer::HOST], Address::new(id(10), &[audio_unit::MIDI_EFFECTS]));
            })?;
            for p in 0..step_sequencer::PATTERN_COUNT {
                let s = p % step_sequencer::STEP_COUNT;
                g.set_value(&cell(p, s, step_sequencer::step::GATE), Value::Boolean(true))?;
                g.set_value(&cell(p, s, step_sequencer::step::SEMITONE), Value::Int32(p as i32 - 8))?;
            }
            Ok(())
        })
        .unwrap();

    let loaded = BoxGraph::from_bytes(&graph.to_bytes()).unwrap();
    for p in 0..step_sequencer::PATTERN_COUNT {
        let s = p % step_sequencer::STEP_COUNT;
        assert_eq!(
            loaded.value(&cell(p, s, step_sequencer::step::GATE)),
            Some(&Value::Boolean(true))
        );
        assert_eq!(
            loaded.value(&cell(p, s, step_sequencer::step::SEMITONE)),
            Some(&Value::Int32(p as i32 - 8))
        );
        assert_eq!(
            loaded.value(&cell(p, (s + 1) % step_sequencer::STEP_COUNT, step_sequencer::step::GATE)),
            Some(&Value::Boolean(false))
        );
    }
    let original = graph.get_box(id(70)).unwrap();
    let decoded = BoxNode::read(BoxKind::StepSequencer, id(70), &original.to_bytes()).unwrap();
    assert_eq!(&decoded, original);
}

#[test]
fn snapshot_of_an_invalid_graph_still_loads() {
    let mut graph = project(1);
    let _ = graph.transact(|g| g.create_box(BoxKind::Track, id(30), |_| {}).map(|_| ()));
    let loaded = BoxGraph::from_bytes(&graph.to_bytes()).unwrap();
    assert_eq!(loaded.edges().validate_requirements().len(), 1);
}

#[test]
fn corrupt_snapshots_are_rejected() {
    let graph = project(1);
    let mut bytes = graph.to_bytes();
    bytes[0] = b'X';
    assert!(matches!(
        BoxGraph::from_bytes(&bytes),
        Err(CoreError::InvalidMagic { .. })
    ));
    let bytes = graph.to_bytes();
    assert!(BoxGraph::from_bytes(&bytes[..bytes.len() - 3]).is_err());
}
