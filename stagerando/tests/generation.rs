use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use stagerando::generate::{generate, layout_digest};
use stagerando::make_rng;
use stagerando::validate::validate_connectivity;
use stagerando_game::{RoomName, SeedCluster, SeedLayout, StageData};

const STAGE: &str = "Alchemy Laboratory";

fn load() -> Result<(StageData, SeedLayout)> {
    let stage_data = StageData::load(Path::new("data/stage_data.json"))
        .context("Unable to load stage data")?;
    let seed_layout = SeedLayout::load(Path::new("data/seed_layout.json"))
        .context("Unable to load seed layout")?;
    Ok((stage_data, seed_layout))
}

#[test]
fn test_sample_stage_layouts() -> Result<()> {
    let (stage_data, seed_layout) = load()?;
    let library = stage_data.room_library()?;
    let clusters = seed_layout.clusters(STAGE)?;
    let expected: Vec<RoomName> = clusters.iter().flat_map(|c| c.keys().cloned()).collect();

    for seed in 0..20 {
        let mut rng = make_rng(seed);
        let room_set = generate(&library, clusters, &mut rng)?;
        if room_set.len() != expected.len() {
            bail!("Seed {seed}: placed {} rooms", room_set.len());
        }
        if !room_set.open_nodes().is_empty() {
            bail!("Seed {seed}: open nodes {:?}", room_set.open_nodes());
        }
        validate_connectivity(&room_set, &expected, &[])?;

        let changes = room_set.changes();
        let entryway = &changes["Alchemy Laboratory, Entryway"];
        assert_eq!((entryway.top, entryway.left), (30, 30));
        let vault = &changes["Alchemy Laboratory, Vault"];
        assert_eq!((vault.top, vault.left), (30, 33));
        let relic_room = &changes["Alchemy Laboratory, Relic Room"];
        assert_eq!((relic_room.top, relic_room.left), (33, 30));
    }
    Ok(())
}

#[test]
fn test_same_seed_same_layout() -> Result<()> {
    let (stage_data, seed_layout) = load()?;
    let library = stage_data.room_library()?;
    let clusters = seed_layout.clusters(STAGE)?;
    for seed in [1, 99, 123456789] {
        let first = generate(&library, clusters, &mut make_rng(seed))?.changes();
        let second = generate(&library, clusters, &mut make_rng(seed))?.changes();
        assert_eq!(first, second);
        assert_eq!(layout_digest(&first)?, layout_digest(&second)?);
    }
    Ok(())
}

#[test]
fn test_two_singleton_rooms() -> Result<()> {
    let stage_data: StageData = serde_json::from_str(
        r#"{"rooms": [
            {"stage": "Keep", "room": "A", "index": 0, "top": 20, "left": 20, "rows": 1, "columns": 1,
             "nodes": {"East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}},
            {"stage": "Keep", "room": "B", "index": 1, "top": 0, "left": 0, "rows": 1, "columns": 1,
             "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"}}}
        ]}"#,
    )?;
    let library = stage_data.room_library()?;
    let clusters: Vec<SeedCluster> = ["Keep, A", "Keep, B"]
        .iter()
        .map(|r| [(r.to_string(), None)].into_iter().collect())
        .collect();
    for seed in 0..5 {
        let room_set = generate(&library, &clusters, &mut make_rng(seed))?;
        assert_eq!(room_set.len(), 2);
        assert!(room_set.open_nodes().is_empty());
        let changes = room_set.changes();
        let (a, b) = (&changes["Keep, A"], &changes["Keep, B"]);
        assert_eq!(b.top, a.top);
        assert_eq!(b.left, a.left + 1);
    }
    Ok(())
}

// Gate and Exit are pinned three columns apart; Hall and Gallery fill the gap
// in either order.
#[test]
fn test_seeds_choose_between_layouts() -> Result<()> {
    let stage_data: StageData = serde_json::from_str(
        r#"{"rooms": [
            {"stage": "Keep", "room": "Gate", "index": 0, "top": 0, "left": 0, "rows": 1, "columns": 1,
             "nodes": {"East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}},
            {"stage": "Keep", "room": "Exit", "index": 1, "top": 0, "left": 5, "rows": 1, "columns": 1,
             "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"}}},
            {"stage": "Keep", "room": "Hall", "index": 2, "top": 2, "left": 0, "rows": 1, "columns": 1,
             "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"},
                       "East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}},
            {"stage": "Keep", "room": "Gallery", "index": 3, "top": 4, "left": 0, "rows": 1, "columns": 1,
             "nodes": {"West": {"row": 0, "column": 0, "edge": "Left", "type": "Normal"},
                       "East": {"row": 0, "column": 0, "edge": "Right", "type": "Normal"}}}
        ]}"#,
    )?;
    let library = stage_data.room_library()?;
    let seed_layout: SeedLayout = serde_json::from_str(
        r#"{"Keep": [
            {"Keep, Gate": [10, 10], "Keep, Exit": [10, 13]},
            {"Keep, Hall": null},
            {"Keep, Gallery": null}
        ]}"#,
    )?;
    let clusters = seed_layout.clusters("Keep")?;
    let expected: Vec<RoomName> = library.stage_rooms("Keep");

    let mut hall_columns = BTreeSet::new();
    for seed in 0..20 {
        let room_set = generate(&library, clusters, &mut make_rng(seed))?;
        validate_connectivity(&room_set, &expected, &[])?;
        let changes = room_set.changes();
        let (hall, gallery) = (&changes["Keep, Hall"], &changes["Keep, Gallery"]);
        assert_eq!((hall.top, gallery.top), (10, 10));
        assert_eq!(hall.left + gallery.left, 23);
        hall_columns.insert(hall.left);

        let replay = generate(&library, clusters, &mut make_rng(seed))?.changes();
        assert_eq!(replay, changes);
    }
    assert_eq!(hall_columns, BTreeSet::from([11, 12]));
    Ok(())
}
