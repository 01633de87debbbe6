//! Dependency traversal.
//!
//! The dependencies of a box are the boxes that cannot exist without it
//! (holders of a mandatory pointer into it, transitively) plus the shared
//! resources it references. Copying or deleting a box always involves its
//! dependencies.
//!
//! Outgoing pointers are followed only into preserved resources. A box that
//! is the target of a mandatory hub fed by the traversed box (an audio bus
//! whose input is a unit's output) is not a dependency: it can still be fed
//! by other boxes, and deleting the feeder only reports a violation.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use indexmap::IndexSet;

use crate::address::{Address, BoxId};
use crate::boxes::BoxNode;
use crate::graph::BoxGraph;
use crate::schema::Resource;

/// Traversal switches for [`dependencies_of`].
#[derive(Default, Clone, Copy)]
pub struct DependencyOptions<'a> {
    /// Follow mandatory dependents even when `exclude_box` rejects them.
    pub always_follow_mandatory: bool,
    /// Include referenced resources but do not traverse past them.
    pub stop_at_resources: bool,
    /// Prunes boxes (and everything only reachable through them).
    pub exclude_box: Option<&'a dyn Fn(&BoxNode) -> bool>,
}

impl fmt::Debug for DependencyOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyOptions")
            .field("always_follow_mandatory", &self.always_follow_mandatory)
            .field("stop_at_resources", &self.stop_at_resources)
            .field("exclude_box", &self.exclude_box.is_some())
            .finish()
    }
}

/// Result of a dependency traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies {
    /// Dependent boxes in breadth-first order, roots excluded.
    pub boxes: Vec<BoxId>,
    /// Optional pointers from outside the set into the roots or dependents.
    pub pointers: Vec<Address>,
}

/// Collects the dependencies of `roots`.
///
/// Traversal is breadth-first. Boxes discovered from the same parent are
/// visited in id order, so a box directly connected to a root always comes
/// before boxes reachable only through it, and the order is stable.
pub fn dependencies_of(
    graph: &BoxGraph,
    roots: &[BoxId],
    options: &DependencyOptions<'_>,
) -> Dependencies {
    let edges = graph.edge_index();
    let excluded = |id: BoxId| match (options.exclude_box, graph.find_box(id)) {
        (Some(exclude), Some(node)) => exclude(node),
        _ => false,
    };

    let mut visited: IndexSet<BoxId> = roots.iter().copied().collect();
    let mut queue: VecDeque<BoxId> = roots.iter().copied().collect();
    let mut boxes = Vec::new();

    while let Some(current) = queue.pop_front() {
        let mut dependents = BTreeSet::new();
        let mut resources = BTreeSet::new();

        for (source, _, _) in edges.incoming_of_box(current) {
            if !graph.is_mandatory_pointer(&source) {
                continue;
            }
            if excluded(source.id) && !options.always_follow_mandatory {
                continue;
            }
            dependents.insert(source.id);
        }
        for (_, target, _) in edges.outgoing_of_box(current) {
            let Some(node) = graph.find_box(target.id) else {
                continue;
            };
            if node.resource() == Resource::Preserved && !excluded(target.id) {
                resources.insert(target.id);
            }
        }

        let found = dependents.into_iter().chain(resources.iter().copied());
        let mut siblings: Vec<BoxId> = found.collect();
        siblings.sort_unstable();
        siblings.dedup();
        for id in siblings {
            if !visited.insert(id) {
                continue;
            }
            boxes.push(id);
            if !(options.stop_at_resources && resources.contains(&id)) {
                queue.push_back(id);
            }
        }
    }
    tracing::trace!(roots = roots.len(), found = boxes.len(), "dependencies collected");

    let mut pointers = Vec::new();
    for id in &visited {
        for (source, _, _) in edges.incoming_of_box(*id) {
            if !visited.contains(&source.id) && !graph.is_mandatory_pointer(&source) {
                pointers.push(source);
            }
        }
    }

    Dependencies { boxes, pointers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{audio_region, audio_unit, root, track, BoxKind};
    use crate::config::GraphConfig;

    fn id(byte: u8) -> BoxId {
        BoxId::from_bytes([byte; 16])
    }

    /// unit(2) <- track(5) <- region(8) -> file(9); track(3) also in unit.
    fn project() -> BoxGraph {
        let mut graph = BoxGraph::with_config(GraphConfig::default());
        graph
            .transact(|g| {
                g.create_box(BoxKind::Root, id(1), |_| {})?;
                g.create_box(BoxKind::AudioUnit, id(2), |b| {
                    b.refer(&[audio_unit::HOST], Address::new(id(1), &[root::AUDIO_UNITS]));
                })?;
                for track_id in [id(5), id(3)] {
                    g.create_box(BoxKind::Track, track_id, |b| {
                        b.refer(&[track::AUDIO_UNIT], Address::new(id(2), &[audio_unit::TRACKS]));
                    })?;
                }
                g.create_box(BoxKind::AudioFile, id(9), |_| {})?;
                g.create_box(BoxKind::AudioRegion, id(8), |b| {
                    b.refer(&[audio_region::REGIONS], Address::new(id(5), &[track::REGIONS]))
                        .refer(&[audio_region::FILE], id(9));
                })?;
                Ok(())
            })
            .unwrap();
        graph
    }

    #[test]
    fn breadth_first_with_sorted_siblings() {
        let graph = project();
        let deps = graph.dependencies_of(&[id(2)], &DependencyOptions::default());
        // tracks first (sorted), then the region, then the file it references
        assert_eq!(deps.boxes, vec![id(3), id(5), id(8), id(9)]);
    }

    #[test]
    fn order_is_stable_across_calls() {
        let graph = project();
        let options = DependencyOptions::default();
        let first = graph.dependencies_of(&[id(2)], &options);
        let second = graph.dependencies_of(&[id(2)], &options);
        assert_eq!(first, second);
    }

    #[test]
    fn exclude_box_prunes_unless_mandatory_is_forced() {
        let graph = project();
        let skip_track = |node: &BoxNode| node.id() == id(5);
        let pruned = graph.dependencies_of(
            &[id(2)],
            &DependencyOptions {
                exclude_box: Some(&skip_track),
                ..DependencyOptions::default()
            },
        );
        assert_eq!(pruned.boxes, vec![id(3)]);

        let forced = graph.dependencies_of(
            &[id(2)],
            &DependencyOptions {
                exclude_box: Some(&skip_track),
                always_follow_mandatory: true,
                ..DependencyOptions::default()
            },
        );
        assert_eq!(forced.boxes, vec![id(3), id(5), id(8), id(9)]);
    }

    #[test]
    fn resources_are_included_but_not_expanded() {
        let mut graph = project();
        // a second region on the other track shares the file
        graph
            .transact(|g| {
                g.create_box(BoxKind::AudioRegion, id(7), |b| {
                    b.refer(&[audio_region::REGIONS], Address::new(id(3), &[track::REGIONS]))
                        .refer(&[audio_region::FILE], id(9));
                })
                .map(|_| ())
            })
            .unwrap();

        let deps = graph.dependencies_of(
            &[id(8)],
            &DependencyOptions {
                stop_at_resources: true,
                ..DependencyOptions::default()
            },
        );
        assert_eq!(deps.boxes, vec![id(9)]);

        let expanded = graph.dependencies_of(&[id(8)], &DependencyOptions::default());
        assert_eq!(expanded.boxes, vec![id(9), id(7)]);
    }

    #[test]
    fn optional_pointers_from_outside_are_reported() {
        let mut graph = project();
        graph
            .transact(|g| {
                g.create_box(BoxKind::AudioBus, id(4), |_| {})?;
                g.refer(&Address::new(id(2), &[audio_unit::OUTPUT_BUS]), &Address::new(id(4), &[1]))
            })
            .unwrap();
        let deps = graph.dependencies_of(&[id(4)], &DependencyOptions::default());
        assert!(deps.boxes.is_empty());
        assert_eq!(deps.pointers, vec![Address::new(id(2), &[audio_unit::OUTPUT_BUS])]);
    }

    #[test]
    fn bus_fed_only_by_the_unit_is_not_a_dependency() {
        let mut graph = project();
        graph
            .transact(|g| {
                g.create_box(BoxKind::AudioBus, id(4), |_| {})?;
                g.refer(&Address::new(id(2), &[audio_unit::OUTPUT_BUS]), &Address::new(id(4), &[1]))
            })
            .unwrap();
        let deps = graph.dependencies_of(&[id(2)], &DependencyOptions::default());
        assert!(!deps.boxes.contains(&id(4)));
        assert_eq!(deps.boxes, vec![id(3), id(5), id(8), id(9)]);
    }
}
