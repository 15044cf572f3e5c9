use anyhow::Result;
use hashbrown::{HashMap, HashSet};
use log::debug;
use rand::rngs::StdRng;
use rand::{seq::SliceRandom, Rng};
use stagerando_game::{
    in_map, Cell, Changes, Edge, MalformedData, NodeName, Room, RoomLibrary, RoomName, RoomNode,
    SeedCluster,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationFailure {
    #[error("no rooms to place")]
    NoClusters,
    #[error("no open nodes left")]
    NoOpenNodes,
    #[error("no node compatible with {0}")]
    NoCompatibleNodes(NodeRef),
    #[error("no legal placement for any node compatible with {0}")]
    NoLegalPlacement(NodeRef),
    #[error("{0} open nodes left after placing every room")]
    UnresolvedOpenNodes(usize),
    #[error("cluster {0} does not fit inside the map")]
    OutOfBounds(String),
    #[error("rooms overlap in cluster {0}")]
    Overlap(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Failure(#[from] GenerationFailure),
    #[error(transparent)]
    Malformed(#[from] MalformedData),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    pub room: RoomName,
    pub node: NodeName,
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.room, self.node)
    }
}

type NodeIndex<'a> = HashMap<(Cell, Edge), Vec<(&'a Room, &'a RoomNode)>>;

// Exactly one open, compatible node of `index` sits in `facing`, looking back.
fn closed_by(node: &RoomNode, facing: Cell, index: &NodeIndex, open: &HashSet<NodeRef>) -> bool {
    let claimants = index.get(&(facing, node.edge.opposite())).map_or(0, |v| {
        v.iter()
            .filter(|(_, n)| {
                n.is_compatible(node)
                    && open.contains(&NodeRef {
                        room: n.room.clone(),
                        node: n.name.clone(),
                    })
            })
            .count()
    });
    claimants == 1
}

/// Rooms sharing one coordinate frame, no two covering the same cell.
#[derive(Clone, Debug)]
pub struct RoomSet {
    pub name: String,
    pub rooms: BTreeMap<RoomName, Room>,
    occupied: HashMap<Cell, RoomName>,
}

impl RoomSet {
    pub fn new(name: &str) -> Self {
        RoomSet {
            name: name.to_string(),
            rooms: BTreeMap::new(),
            occupied: HashMap::new(),
        }
    }

    pub fn insert(&mut self, room: Room) -> Result<(), GenerationFailure> {
        let cells: Vec<Cell> = room.cells().collect();
        if cells.iter().any(|c| self.occupied.contains_key(c)) {
            return Err(GenerationFailure::Overlap(self.name.clone()));
        }
        for c in cells {
            self.occupied.insert(c, room.name.clone());
        }
        self.rooms.insert(room.name.clone(), room);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn in_bounds(&self) -> bool {
        self.occupied.keys().all(|&c| in_map(c))
    }

    pub fn node(&self, r: &NodeRef) -> Option<(&Room, &RoomNode)> {
        let room = self.rooms.get(&r.room)?;
        let node = room.nodes.get(&r.node)?;
        Some((room, node))
    }

    fn node_index(&self) -> NodeIndex<'_> {
        let mut index = NodeIndex::new();
        for room in self.rooms.values() {
            for node in room.nodes.values() {
                index
                    .entry((room.node_cell(node), node.edge))
                    .or_default()
                    .push((room, node));
            }
        }
        index
    }

    /// Nodes not matched by exactly one compatible node facing them, sorted.
    /// This ignores the map boundary, so it also works for a cluster that has
    /// not been positioned yet.
    pub fn unmatched_nodes(&self) -> Vec<NodeRef> {
        self.collect_unmatched(false)
    }

    /// Unmatched nodes that face a cell inside the map. A node facing off the
    /// map sits on the boundary and needs no partner.
    pub fn open_nodes(&self) -> Vec<NodeRef> {
        self.collect_unmatched(true)
    }

    fn collect_unmatched(&self, bounded: bool) -> Vec<NodeRef> {
        let index = self.node_index();
        let mut out = vec![];
        for room in self.rooms.values() {
            for node in room.nodes.values() {
                let facing = room.facing_cell(node);
                if bounded && !in_map(facing) {
                    continue;
                }
                let claimants = index
                    .get(&(facing, node.edge.opposite()))
                    .map_or(0, |v| v.iter().filter(|(_, n)| n.is_compatible(node)).count());
                if claimants != 1 {
                    out.push(NodeRef {
                        room: room.name.clone(),
                        node: node.name.clone(),
                    });
                }
            }
        }
        out.sort();
        out
    }

    fn translated(&self, offset: Cell) -> RoomSet {
        let mut out = RoomSet::new(&self.name);
        for room in self.rooms.values() {
            let mut room = room.clone();
            room.translate(offset);
            for c in room.cells() {
                out.occupied.insert(c, room.name.clone());
            }
            out.rooms.insert(room.name.clone(), room);
        }
        out
    }

    /// Merge `other` translated by `offset` if that is legal: no overlap, inside
    /// the map, and every edge that ends up facing an occupied cell is closed by
    /// the merge. Returns false and leaves `self` unchanged otherwise.
    pub fn try_merge(&mut self, other: &RoomSet, offset: Cell) -> bool {
        let moved = other.translated(offset);
        if moved
            .occupied
            .keys()
            .any(|&c| !in_map(c) || self.occupied.contains_key(&c))
        {
            return false;
        }

        // The indexes borrow both sets and must be gone before the merge.
        {
            let self_index = self.node_index();
            let moved_index = moved.node_index();
            let self_open: HashSet<NodeRef> = self.open_nodes().into_iter().collect();
            let moved_open: HashSet<NodeRef> = moved.open_nodes().into_iter().collect();

            for r in &moved_open {
                let Some((room, node)) = moved.node(r) else {
                    continue;
                };
                let facing = room.facing_cell(node);
                if self.occupied.contains_key(&facing)
                    && !closed_by(node, facing, &self_index, &self_open)
                {
                    return false;
                }
            }
            for r in &self_open {
                let Some((room, node)) = self.node(r) else {
                    continue;
                };
                let facing = room.facing_cell(node);
                if moved.occupied.contains_key(&facing)
                    && !closed_by(node, facing, &moved_index, &moved_open)
                {
                    return false;
                }
            }
        }

        for (cell, room) in moved.occupied {
            self.occupied.insert(cell, room);
        }
        for (name, room) in moved.rooms {
            self.rooms.insert(name, room);
        }
        true
    }

    pub fn changes(&self) -> Changes {
        self.rooms
            .iter()
            .map(|(name, room)| (name.clone(), room.change()))
            .collect()
    }
}

/// Turn the seed clusters of a stage into fresh RoomSets. Pinned rooms of a
/// cluster are placed at their offsets; each floating room becomes its own
/// singleton cluster, following the pinned cluster it was listed with.
pub fn build_clusters(
    library: &RoomLibrary,
    seed_clusters: &[SeedCluster],
) -> Result<Vec<RoomSet>, GenerationError> {
    let mut clusters = vec![];
    for (i, seed) in seed_clusters.iter().enumerate() {
        let mut pinned = RoomSet::new(&format!("Cluster {i}"));
        let mut floating = vec![];
        for (name, offset) in seed {
            let mut room = library.get(name)?.clone();
            match offset {
                Some((row, column)) => {
                    room.top = *row;
                    room.left = *column;
                    pinned.insert(room)?;
                }
                None => {
                    let mut single = RoomSet::new(name);
                    single.insert(room)?;
                    floating.push(single);
                }
            }
        }
        if !pinned.is_empty() {
            clusters.push(pinned);
        }
        clusters.extend(floating);
    }
    Ok(clusters)
}

/// Merge all clusters into the first one by repeatedly closing a random open
/// node of the accumulated layout.
///
/// Candidate sources are sorted before being shuffled with the attempt's RNG, so
/// that replaying a seed reproduces the same layout.
pub fn place(clusters: Vec<RoomSet>, rng: &mut StdRng) -> Result<RoomSet, GenerationFailure> {
    let mut pool = clusters;
    if pool.is_empty() {
        return Err(GenerationFailure::NoClusters);
    }
    let mut acc = pool.remove(0);
    if !acc.in_bounds() {
        return Err(GenerationFailure::OutOfBounds(acc.name.clone()));
    }

    while !pool.is_empty() {
        let open = acc.open_nodes();
        if open.is_empty() {
            return Err(GenerationFailure::NoOpenNodes);
        }
        let target = open[rng.gen_range(0..open.len())].clone();
        let (target_facing, target_node) = match acc.node(&target) {
            Some((room, node)) => (room.facing_cell(node), node.clone()),
            None => return Err(GenerationFailure::NoOpenNodes),
        };

        let mut candidates: Vec<(usize, NodeRef)> = vec![];
        for (i, cluster) in pool.iter().enumerate() {
            for r in cluster.unmatched_nodes() {
                if let Some((_, node)) = cluster.node(&r) {
                    if node.is_compatible(&target_node) {
                        candidates.push((i, r));
                    }
                }
            }
        }
        if candidates.is_empty() {
            return Err(GenerationFailure::NoCompatibleNodes(target));
        }
        candidates.sort();
        candidates.shuffle(rng);

        let mut merged: Option<usize> = None;
        for (i, source) in &candidates {
            let cluster = &pool[*i];
            let Some((room, node)) = cluster.node(source) else {
                continue;
            };
            let source_cell = room.node_cell(node);
            let offset = (
                target_facing.0 - source_cell.0,
                target_facing.1 - source_cell.1,
            );
            if acc.try_merge(cluster, offset) {
                debug!("Placed {} at offset {:?} onto {}", source, offset, target);
                merged = Some(*i);
                break;
            }
        }
        match merged {
            Some(i) => {
                pool.remove(i);
            }
            None => return Err(GenerationFailure::NoLegalPlacement(target)),
        }
    }

    let open = acc.open_nodes().len();
    if open > 0 {
        return Err(GenerationFailure::UnresolvedOpenNodes(open));
    }
    Ok(acc)
}

/// Build fresh clusters for one attempt and place them.
pub fn generate(
    library: &RoomLibrary,
    seed_clusters: &[SeedCluster],
    rng: &mut StdRng,
) -> Result<RoomSet, GenerationError> {
    let clusters = build_clusters(library, seed_clusters)?;
    Ok(place(clusters, rng)?)
}

/// Content digest of a layout, used to identify it independently of the seed.
pub fn layout_digest(changes: &Changes) -> Result<String> {
    let data = serde_json::to_vec(changes)?;
    Ok(crypto_hash::hex_digest(crypto_hash::Algorithm::SHA256, &data))
}
