use anyhow::Result;
use pretty_assertions::assert_eq;
use rand::prelude::*;

use kansai::madara::{
    parser::{Parser, ParserArretado},
    processor::Processor,
    Madara, NodeEntry,
};

fn run_batch(script: &str) -> Result<String> {
    let statements = ParserArretado::default().parse_lines(script)?;
    Processor::new().run(&statements)
}

fn keys_at(tree: &Madara<i64>, version: usize) -> Result<Vec<i64>> {
    Ok(tree.inorder(version)?.map(|e| e.key).collect())
}

#[test]
fn batch_with_history_queries_and_one_removal() -> Result<()> {
    // Arrange
    let script = include_str!("./inputs/01.txt");
    let expected = include_str!("./inputs/01.out.txt");

    // Act
    let actual = run_batch(script)?;

    // Assert
    assert_eq!(expected, actual);

    Ok(())
}

#[test]
fn batch_with_missing_successor_and_empty_print() -> Result<()> {
    // Arrange
    let script = include_str!("./inputs/02.txt");
    let expected = include_str!("./inputs/02.out.txt");

    // Act
    let actual = run_batch(script)?;

    // Assert
    assert_eq!(expected, actual);

    Ok(())
}

#[test]
fn seven_ascending_inserts_stay_balanced() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();

    // Act
    for key in 1..=7 {
        tree.insert(key)?;
    }

    // Assert
    let entries: Vec<NodeEntry<i64>> = tree.inorder(7)?.collect();
    let keys: Vec<i64> = entries.iter().map(|e| e.key).collect();
    assert_eq!(vec![1, 2, 3, 4, 5, 6, 7], keys);
    let root_depths: Vec<usize> = entries
        .iter()
        .filter(|e| e.depth == 0)
        .map(|e| e.depth)
        .collect();
    assert_eq!(vec![0], root_depths);
    let deepest = entries.iter().map(|e| e.depth).max().unwrap_or(0);
    assert!(deepest <= 4, "height {deepest} too tall for 7 keys");

    Ok(())
}

#[test]
fn removal_keeps_the_key_in_older_versions() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    for key in [5, 3, 8, 1] {
        tree.insert(key)?;
    }

    // Act
    tree.remove(3)?;

    // Assert
    assert_eq!(vec![1, 5, 8], keys_at(&tree, 5)?);
    assert_eq!(vec![1, 3, 5, 8], keys_at(&tree, 4)?);
    assert_eq!(vec![3, 5, 8], keys_at(&tree, 3)?);
    assert_eq!(Some(3), tree.successor(2, 3)?);
    assert_eq!(Some(3), tree.successor(2, 4)?);
    assert_eq!(Some(5), tree.successor(2, 5)?);

    Ok(())
}

#[test]
fn every_published_version_upholds_the_red_black_rules() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    let mut rng = rand::thread_rng();
    let mut keys: Vec<i64> = (0..45).collect();
    keys.shuffle(&mut rng);

    // Act
    for &key in keys.iter() {
        tree.insert(key)?;
    }
    for &key in keys.iter().step_by(2) {
        tree.remove(key)?;
    }

    // Assert
    for version in 0..=tree.current_version() {
        tree.check_tree(version)?;
    }

    Ok(())
}

#[test]
fn later_mutations_never_rewrite_an_older_snapshot() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    let script: Vec<(bool, i64)> = vec![
        (true, 20),
        (true, 10),
        (true, 30),
        (true, 5),
        (false, 10),
        (true, 25),
        (false, 20),
        (true, 40),
        (false, 5),
        (true, 10),
    ];

    // Act
    let mut snapshots: Vec<Vec<i64>> = vec![keys_at(&tree, 0)?];
    for &(is_insert, key) in script.iter() {
        if is_insert {
            tree.insert(key)?;
        } else {
            tree.remove(key)?;
        }
        snapshots.push(keys_at(&tree, tree.current_version())?);
    }

    // Assert
    for (version, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot, &keys_at(&tree, version)?, "at version {version}");
    }

    Ok(())
}

#[test]
fn insert_then_remove_restores_the_key_sequence() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    let mut rng = rand::thread_rng();
    let mut keys: Vec<i64> = (0..30).map(|k| k * 2).collect();
    keys.shuffle(&mut rng);
    for &key in keys.iter() {
        tree.insert(key)?;
    }
    let version = tree.current_version();
    let before = keys_at(&tree, version)?;

    // Act
    tree.insert(31)?;
    tree.remove(31)?;

    // Assert
    assert_eq!(before, keys_at(&tree, tree.current_version())?);

    Ok(())
}

#[test]
fn successor_agrees_with_the_inorder_walk() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    let mut rng = rand::thread_rng();
    let mut keys: Vec<i64> = (0..40).map(|k| k * 3).collect();
    keys.shuffle(&mut rng);
    for &key in keys.iter() {
        tree.insert(key)?;
    }
    for &key in keys.iter().take(10) {
        tree.remove(key)?;
    }

    // Act & Assert
    for version in [0, 1, 7, 20, 40, tree.current_version()] {
        for probe in -2..=125 {
            let expected = tree.inorder(version)?.map(|e| e.key).find(|&k| k > probe);
            assert_eq!(
                expected,
                tree.successor(probe, version)?,
                "probe {probe} at version {version}"
            );
        }
    }

    Ok(())
}

#[test]
fn depth_stays_logarithmic_under_ascending_inserts() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    let total: i64 = 60;

    // Act
    for key in 1..=total {
        tree.insert(key)?;
    }

    // Assert
    let bound = 2 * ((total + 1) as f64).log2().ceil() as usize;
    let deepest = tree
        .inorder(tree.current_version())?
        .map(|e| e.depth)
        .max()
        .unwrap_or(0);
    assert!(deepest <= bound, "depth {deepest} exceeds bound {bound}");

    Ok(())
}

#[test]
fn queries_are_idempotent() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();
    for key in [8, 3, 13, 1, 5, 21] {
        tree.insert(key)?;
    }
    let version = tree.current_version();

    // Act
    let first_succ = tree.successor(4, version)?;
    let second_succ = tree.successor(4, version)?;
    let first_walk: Vec<NodeEntry<i64>> = tree.inorder(version)?.collect();
    let second_walk: Vec<NodeEntry<i64>> = tree.inorder(version)?.collect();

    // Assert
    assert_eq!(first_succ, second_succ);
    assert_eq!(first_walk, second_walk);
    assert_eq!(version, tree.current_version());

    Ok(())
}

#[test]
fn the_hundredth_version_is_the_last_one() -> Result<()> {
    // Arrange
    let mut tree = Madara::default();

    // Act
    for key in 1..=99 {
        tree.insert(key)?;
    }
    let overflow = tree.insert(100);

    // Assert
    assert!(overflow.is_err());
    assert_eq!(99, tree.current_version());
    assert_eq!(100, tree.version_count());
    assert_eq!(99, tree.len());

    Ok(())
}
