use std::hash::Hash;

use hashbrown::HashMap;

// Iteration order of a HashMap depends on the hasher state, so anything that
// feeds an RNG or produces output must walk the keys in sorted order instead.
pub fn sorted_hashmap_iter<T, U>(hashmap: &HashMap<T, U>) -> impl Iterator<Item = (&T, &U)>
where
    T: Ord + Hash,
{
    let mut keys: Vec<&T> = hashmap.keys().collect();
    keys.sort();
    keys.into_iter().map(|k| (k, &hashmap[k]))
}
