//! Partial selection of the nodes closest to a target.

use std::cmp::Ordering;

use crate::common::{Distance, Id, Node};

/// Returns the `n` nodes closest to `target`, without sorting the rest.
///
/// `n` is clamped to `nodes.len()`, so `0` returns nothing, and `n >= nodes.len()`
/// returns a copy of all nodes in their original order.
///
/// Otherwise runs a quickselect with Hoare partitioning over a copy, which makes
/// the result independent of the input order up to ties, and deterministic for
/// a fixed input order. The returned nodes are not sorted.
pub fn find_closest_n(n: usize, target: &Id, nodes: &[Node]) -> Vec<Node> {
    let n = n.min(nodes.len());

    if n == 0 {
        return Vec::new();
    }

    if n == nodes.len() {
        return nodes.to_vec();
    }

    let mut keyed: Vec<(Distance, &Node)> = nodes
        .iter()
        .map(|node| (node.distance(target), node))
        .collect();

    select(&mut keyed, n - 1);

    keyed[..n].iter().map(|(_, node)| (*node).clone()).collect()
}

/// Returns the single closest node to `target`, or None if `nodes` is empty.
pub fn find_closest_one(target: &Id, nodes: &[Node]) -> Option<Node> {
    nodes
        .iter()
        .min_by(|a, b| a.distance(target).compare(&b.distance(target)))
        .cloned()
}

/// Rearranges `items` so that `items[..=nth]` hold the `nth + 1` smallest keys.
fn select<T>(items: &mut [(Distance, T)], nth: usize) {
    let mut lo = 0;
    let mut hi = items.len() - 1;

    while lo < hi {
        let split = hoare_partition(items, lo, hi);

        // items[lo..=split] <= items[split + 1..=hi]
        if nth <= split {
            hi = split;
        } else {
            lo = split + 1;
        }
    }
}

/// Hoare partition around the middle element of `items[lo..=hi]`.
///
/// Returns `split` in `lo..hi`, so both halves are never empty.
fn hoare_partition<T>(items: &mut [(Distance, T)], lo: usize, hi: usize) -> usize {
    let pivot = items[lo + (hi - lo) / 2].0.clone();

    let mut i = lo;
    let mut j = hi;

    loop {
        while items[i].0.compare(&pivot) == Ordering::Less {
            i += 1;
        }
        while items[j].0.compare(&pivot) == Ordering::Greater {
            j -= 1;
        }

        if i >= j {
            return j;
        }

        items.swap(i, j);

        i += 1;
        j -= 1;
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    use rand::seq::SliceRandom;

    use super::*;

    fn node(last: u8) -> Node {
        let mut bytes = [0; 16];
        bytes[15] = last;

        Node::new(Id(bytes), Ipv4Addr::LOCALHOST, last as u32)
    }

    fn ids(nodes: &[Node]) -> HashSet<Id> {
        nodes.iter().map(|n| n.id).collect()
    }

    /// Reference result by fully sorting.
    fn sorted_closest(n: usize, target: &Id, nodes: &[Node]) -> HashSet<Id> {
        let mut sorted = nodes.to_vec();
        sorted.sort_by(|a, b| a.distance(target).compare(&b.distance(target)));
        sorted.truncate(n);

        ids(&sorted)
    }

    #[test]
    fn clamps_n() {
        let nodes: Vec<Node> = (1..=5).map(node).collect();
        let target = Id::random();

        assert!(find_closest_n(0, &target, &nodes).is_empty());
        assert_eq!(find_closest_n(5, &target, &nodes), nodes);
        assert_eq!(find_closest_n(50, &target, &nodes), nodes);
        assert!(find_closest_n(3, &target, &[]).is_empty());
    }

    #[test]
    fn small_fixture() {
        // 1, 5, 3, 2, 4 closest 3 to 0
        let nodes: Vec<Node> = [1, 5, 3, 2, 4].into_iter().map(node).collect();
        let target = Id([0; 16]);

        let closest = find_closest_n(3, &target, &nodes);

        assert_eq!(closest.len(), 3);
        assert_eq!(ids(&closest), ids(&[node(1), node(2), node(3)]));
    }

    #[test]
    fn does_not_mutate_input() {
        let nodes: Vec<Node> = [9, 2, 7, 1, 8, 3].into_iter().map(node).collect();
        let copy = nodes.clone();

        find_closest_n(2, &Id([0; 16]), &nodes);

        assert_eq!(nodes, copy);
    }

    #[test]
    fn matches_full_sort_regardless_of_order() {
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let mut nodes: Vec<Node> = (0..40).map(|_| Node::random()).collect();
            let target = Id::random();

            for n in [1, 3, 8, 20, 39] {
                let expected = sorted_closest(n, &target, &nodes);

                nodes.shuffle(&mut rng);
                let closest = find_closest_n(n, &target, &nodes);

                assert_eq!(closest.len(), n);
                assert_eq!(ids(&closest), expected);
            }
        }
    }

    #[test]
    fn duplicate_distances() {
        // Same id repeated, every key equal to the pivot.
        let nodes = vec![node(7); 10];

        let closest = find_closest_n(4, &Id::random(), &nodes);

        assert_eq!(closest.len(), 4);
    }

    #[test]
    fn deterministic_for_fixed_order() {
        let nodes: Vec<Node> = (0..30).map(|_| Node::random()).collect();
        let target = Id::random();

        assert_eq!(
            find_closest_n(7, &target, &nodes),
            find_closest_n(7, &target, &nodes)
        );
    }

    #[test]
    fn closest_one() {
        let nodes: Vec<Node> = (1..=4).map(node).collect();
        let target = Id::from_str("00000000-0000-0000-0000-000000000005").unwrap();

        assert_eq!(find_closest_one(&target, &nodes).unwrap().id, node(4).id);
        assert!(find_closest_one(&target, &[]).is_none());
    }
}
