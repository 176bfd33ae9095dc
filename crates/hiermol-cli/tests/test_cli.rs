use assert_cmd::Command;
use hiermol_core::{write_graphs, HierGraph, Level, Vocab, Vocabs};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Vocabularies, motif templates and a two-graph input set.
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;

        let mut vocabs = Vocabs::new();
        vocabs.insert(Level::Atom, Vocab::new(["C", "O"], ["single", "double"]));
        vocabs.insert(
            Level::AttachmentConfig,
            Vocab::new(["ring:0", "chain:0"], ["attaches to"]).with_parents(vec![0, 1]),
        );
        vocabs.insert(
            Level::Motif,
            Vocab::new(["ring", "chain"], ["attaches to"]).with_max_num_atoms(3),
        );
        vocabs.to_json_file(dir.path().join("vocabs.json"))?;

        let templates = vec![
            HierGraph::single_motif(0, 0, &[0, 0, 0], &[(0, 1, 0), (1, 2, 0), (2, 0, 0)]),
            HierGraph::single_motif(1, 1, &[0, 1], &[(0, 1, 1)]),
        ];
        write_graphs(dir.path().join("motifs.json"), &templates)?;

        let mut joined = HierGraph::new();
        let ring = joined.push_motif(0, 0, &templates[0])?;
        let chain = joined.push_motif(1, 1, &templates[1])?;
        joined.connect(ring, chain, 0, 0, 0)?;
        write_graphs(dir.path().join("graphs.json"), &[joined, templates[1].clone()])?;

        std::fs::write(
            dir.path().join("config.json"),
            r#"{"node_rep_size": 8, "latent_size": 3, "neighbor_hops": 2, "variational": true, "seed": 5}"#,
        )?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn model_args<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.arg("--vocabs")
            .arg(self.path("vocabs.json"))
            .arg("--motifs")
            .arg(self.path("motifs.json"))
            .arg("--config")
            .arg(self.path("config.json"))
    }
}

fn hiermol() -> Command {
    Command::cargo_bin("hiermol").unwrap()
}

#[test]
fn test_cli_inspect() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    hiermol()
        .arg("inspect")
        .arg(fx.path("graphs.json"))
        .arg("--vocabs")
        .arg(fx.path("vocabs.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Graphs: 2"))
        .stdout(predicate::str::contains("[0] motifs=2 atoms=5 bonds=5 motif_edges=1"))
        .stdout(predicate::str::contains("All graphs valid"));
    Ok(())
}

#[test]
fn test_cli_inspect_rejects_bad_vocabs() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let bad = fx.path("two_vocabs.json");
    std::fs::write(
        &bad,
        r#"{"atom": {"node": ["C"], "edge": ["single"]}, "motif": {"node": ["m"], "edge": ["attaches to"], "max_num_atoms": 1}}"#,
    )?;
    hiermol()
        .arg("inspect")
        .arg(fx.path("graphs.json"))
        .arg("--vocabs")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 3"));
    Ok(())
}

#[test]
fn test_cli_reconstruct() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut cmd = hiermol();
    cmd.arg("reconstruct").arg(fx.path("graphs.json"));
    fx.model_args(&mut cmd)
        .assert()
        .success()
        .stdout(predicate::str::contains("Reconstruction loss:"))
        .stdout(predicate::str::contains("KL loss:"))
        .stdout(predicate::str::contains("bond:"));
    Ok(())
}

#[test]
fn test_cli_sample_writes_graphs() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let output = fx.path("samples.json");
    let mut cmd = hiermol();
    cmd.arg("sample").arg("-n").arg("3").arg("--max-motifs").arg("4").arg("-o").arg(&output);
    fx.model_args(&mut cmd)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 graphs"));

    let graphs = hiermol_core::read_graphs(&output)?;
    let vocabs = Vocabs::from_json_file(fx.path("vocabs.json"))?;
    assert_eq!(graphs.len(), 3);
    for graph in &graphs {
        assert!((1..=4).contains(&graph.num_motifs()));
        graph.validate(&vocabs)?;
    }
    Ok(())
}

#[test]
fn test_cli_encode() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    let mut cmd = hiermol();
    cmd.arg("encode").arg(fx.path("graphs.json"));
    let output = fx.model_args(&mut cmd).assert().success().get_output().stdout.clone();

    let rows: Vec<Vec<f32>> = String::from_utf8(output)?
        .lines()
        .map(serde_json::from_str::<Vec<f32>>)
        .collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.len() == 3));
    Ok(())
}

#[test]
fn test_cli_missing_file() {
    hiermol()
        .arg("inspect")
        .arg(Path::new("does/not/exist.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read graphs"));
}

#[test]
fn test_cli_bad_log_filter_falls_back() -> Result<(), Box<dyn std::error::Error>> {
    let fx = Fixture::new()?;
    hiermol()
        .arg("--log-level")
        .arg("hiermol_nn=notalevel")
        .arg("inspect")
        .arg(fx.path("graphs.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Graphs: 2"));
    Ok(())
}
