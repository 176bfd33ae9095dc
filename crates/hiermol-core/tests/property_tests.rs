//! Property-based tests for hierarchical graphs.
//!
//! Random motif trees are assembled with the builder API and checked for:
//! - decode plans covering every motif in a parent-before-child order
//! - batch offsets keeping every graph's nodes together
//! - vocab count validation

use hiermol_core::{DecodePlan, Error, HierBatch, HierGraph, Level, Vocab, Vocabs};
use proptest::prelude::*;
use proptest::sample::Index;

/// Templates of 1, 2 and 3 atoms.
fn templates() -> Vec<HierGraph> {
    vec![
        HierGraph::single_motif(0, 0, &[0], &[]),
        HierGraph::single_motif(1, 1, &[0, 1], &[(0, 1, 0)]),
        HierGraph::single_motif(2, 2, &[1, 1, 1], &[(0, 1, 1), (1, 2, 1), (2, 0, 1)]),
    ]
}

fn vocabs() -> Vocabs {
    let mut vocabs = Vocabs::new();
    vocabs.insert(Level::Atom, Vocab::new(["C", "O"], ["single", "aromatic"]));
    vocabs.insert(
        Level::AttachmentConfig,
        Vocab::new(["a", "b", "c"], ["attaches to"]).with_parents(vec![0, 1, 2]),
    );
    vocabs.insert(
        Level::Motif,
        Vocab::new(["m0", "m1", "m2"], ["attaches to"]).with_max_num_atoms(3),
    );
    vocabs
}

/// A motif: template label plus where it hangs in the tree.
#[derive(Debug, Clone)]
struct Growth {
    label: usize,
    parent: Index,
    parent_atom: Index,
    child_atom: Index,
}

fn arb_growth() -> impl Strategy<Value = Growth> {
    (0usize..3, any::<Index>(), any::<Index>(), any::<Index>()).prop_map(
        |(label, parent, parent_atom, child_atom)| Growth {
            label,
            parent,
            parent_atom,
            child_atom,
        },
    )
}

fn arb_tree() -> impl Strategy<Value = HierGraph> {
    (0usize..3, prop::collection::vec(arb_growth(), 0..8)).prop_map(|(root, growth)| {
        let templates = templates();
        let mut hg = HierGraph::new();
        hg.push_motif(root, root, &templates[root]).unwrap();
        for g in growth {
            let parent = g.parent.index(hg.num_motifs());
            let parent_atoms = hg.atoms_of_motif(parent);
            let parent_atom = parent_atoms[g.parent_atom.index(parent_atoms.len())];
            let child_position = g.child_atom.index(templates[g.label].num_atoms());
            let child = hg.push_motif(g.label, g.label, &templates[g.label]).unwrap();
            hg.connect(parent, child, parent_atom, child_position, 0).unwrap();
        }
        hg
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn random_trees_validate(hg in arb_tree()) {
        prop_assert!(hg.validate(&vocabs()).is_ok());
        prop_assert_eq!(hg.motif.num_edges() + 1, hg.num_motifs());
    }

    #[test]
    fn plan_visits_every_motif_once(hg in arb_tree()) {
        let plan = DecodePlan::from_target(&hg).unwrap();
        prop_assert_eq!(plan.len(), hg.num_motifs());

        let mut seen: Vec<usize> = plan.steps().iter().map(|s| s.motif).collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..hg.num_motifs()).collect::<Vec<_>>());

        for (i, step) in plan.steps().iter().enumerate() {
            prop_assert_eq!(step.motif_label, hg.motif.labels[step.motif]);
            match step.link {
                None => prop_assert_eq!(i, 0),
                Some(link) => {
                    prop_assert!(link.parent_step < i);
                    prop_assert!(link.parent_position < 3);
                    prop_assert!(link.child_position < 3);
                }
            }
        }
    }

    #[test]
    fn batch_preserves_graph_membership(graphs in prop::collection::vec(arb_tree(), 1..5)) {
        let batch = HierBatch::new(&graphs).unwrap();
        prop_assert_eq!(batch.num_graphs(), graphs.len());

        for level in Level::ALL {
            let lb = batch.level(level);
            let sizes = batch.graph_sizes(level);
            let expected: Vec<usize> = graphs.iter().map(|g| g.level(level).num_nodes()).collect();
            prop_assert_eq!(sizes, expected);

            let directed: usize = graphs.iter().map(|g| 2 * g.level(level).num_edges()).sum();
            prop_assert_eq!(lb.num_edges(), directed);

            // edges never cross graphs
            for (&s, &d) in lb.src.iter().zip(&lb.dst) {
                prop_assert_eq!(lb.node_graph[s as usize], lb.node_graph[d as usize]);
            }
        }

        // atoms point at attachment nodes of the same graph
        let atoms = batch.level(Level::Atom);
        let attachments = batch.level(Level::AttachmentConfig);
        for (a, &p) in batch.atom_parent.iter().enumerate() {
            prop_assert_eq!(atoms.node_graph[a], attachments.node_graph[p as usize]);
        }
        let motifs = batch.level(Level::Motif);
        for (c, &p) in batch.attachment_parent.iter().enumerate() {
            prop_assert_eq!(attachments.node_graph[c], motifs.node_graph[p as usize]);
        }
    }

    #[test]
    fn wrong_vocab_count_rejected(extra in 0usize..6) {
        prop_assume!(extra != 3);
        let mut vocabs = Vocabs::new();
        for i in 0..extra {
            vocabs.insert_named(format!("level{i}"), Vocab::new(["x"], ["y"]));
        }
        let is_count_mismatch = matches!(
            vocabs.validate(),
            Err(Error::VocabCountMismatch { expected: 3, got }) if got == extra
        );
        prop_assert!(is_count_mismatch);
    }
}
