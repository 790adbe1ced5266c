//! Order-statistics multiset used for sliding-window quantiles.
//!
//! An arena-indexed treap keyed by value with subtree sizes. Insert, remove
//! and rank queries are O(log n) expected. Priorities come from a fixed-seed
//! xorshift generator, so the tree shape (and every result) is reproducible.

use std::cmp::Ordering;

const NIL: usize = usize::MAX;
const SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
struct Node {
    value: f64,
    priority: u64,
    left: usize,
    right: usize,
    size: usize,
}

/// Multiset of finite `f64` values supporting rank queries.
#[derive(Debug, Clone)]
pub struct OrderStatistics {
    nodes: Vec<Node>,
    free: Vec<usize>,
    root: usize,
    rng: u64,
}

impl Default for OrderStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderStatistics {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: NIL,
            rng: SEED,
        }
    }

    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = NIL;
        self.rng = SEED;
    }

    pub fn insert(&mut self, value: f64) {
        let node = self.alloc(value);
        let (lo, hi) = self.split(self.root, value, true);
        let lo = self.merge(lo, node);
        self.root = self.merge(lo, hi);
    }

    /// Remove one occurrence of `value`. Returns false if it was absent.
    pub fn remove(&mut self, value: f64) -> bool {
        let (lo, rest) = self.split(self.root, value, true);
        let (eq, hi) = self.split(rest, value, false);
        let removed = eq != NIL;
        let eq = if removed {
            let (l, r) = (self.nodes[eq].left, self.nodes[eq].right);
            self.free.push(eq);
            self.merge(l, r)
        } else {
            eq
        };
        let mid = self.merge(eq, hi);
        self.root = self.merge(lo, mid);
        removed
    }

    /// Value with zero-based rank `k` in ascending order.
    pub fn kth(&self, mut k: usize) -> Option<f64> {
        if k >= self.len() {
            return None;
        }
        let mut cur = self.root;
        while cur != NIL {
            let node = &self.nodes[cur];
            let left_size = self.size(node.left);
            match k.cmp(&left_size) {
                Ordering::Less => cur = node.left,
                Ordering::Equal => return Some(node.value),
                Ordering::Greater => {
                    k -= left_size + 1;
                    cur = node.right;
                }
            }
        }
        None
    }

    pub fn min(&self) -> Option<f64> {
        self.kth(0)
    }

    pub fn max(&self) -> Option<f64> {
        self.len().checked_sub(1).and_then(|k| self.kth(k))
    }

    /// Continuous quantile with linear interpolation between the two nearest
    /// ranks (`h = (n - 1) * p`).
    pub fn quantile(&self, p: f64) -> Option<f64> {
        let n = self.len();
        if n == 0 || !(0.0..=1.0).contains(&p) {
            return None;
        }
        let h = (n - 1) as f64 * p;
        let lo = h.floor() as usize;
        let frac = h - lo as f64;
        let lo_value = self.kth(lo)?;
        if frac == 0.0 || lo + 1 >= n {
            return Some(lo_value);
        }
        let hi_value = self.kth(lo + 1)?;
        Some(lo_value + frac * (hi_value - lo_value))
    }

    fn size(&self, idx: usize) -> usize {
        if idx == NIL {
            0
        } else {
            self.nodes[idx].size
        }
    }

    fn update(&mut self, idx: usize) {
        let size = 1 + self.size(self.nodes[idx].left) + self.size(self.nodes[idx].right);
        self.nodes[idx].size = size;
    }

    fn next_priority(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        x
    }

    fn alloc(&mut self, value: f64) -> usize {
        let node = Node {
            value,
            priority: self.next_priority(),
            left: NIL,
            right: NIL,
            size: 1,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Split `t` into (values < v, values >= v) when `strict`, otherwise
    /// (values <= v, values > v).
    fn split(&mut self, t: usize, v: f64, strict: bool) -> (usize, usize) {
        if t == NIL {
            return (NIL, NIL);
        }
        let ord = self.nodes[t].value.total_cmp(&v);
        let goes_left = if strict {
            ord == Ordering::Less
        } else {
            ord != Ordering::Greater
        };
        if goes_left {
            let (l, r) = self.split(self.nodes[t].right, v, strict);
            self.nodes[t].right = l;
            self.update(t);
            (t, r)
        } else {
            let (l, r) = self.split(self.nodes[t].left, v, strict);
            self.nodes[t].left = r;
            self.update(t);
            (l, t)
        }
    }

    /// Merge two treaps where every value in `a` is <= every value in `b`.
    fn merge(&mut self, a: usize, b: usize) -> usize {
        if a == NIL {
            return b;
        }
        if b == NIL {
            return a;
        }
        if self.nodes[a].priority > self.nodes[b].priority {
            let r = self.merge(self.nodes[a].right, b);
            self.nodes[a].right = r;
            self.update(a);
            a
        } else {
            let l = self.merge(a, self.nodes[b].left);
            self.nodes[b].left = l;
            self.update(b);
            b
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_insert_and_rank() {
        let mut os = OrderStatistics::new();
        for v in [5.0, 1.0, 4.0, 2.0, 3.0] {
            os.insert(v);
        }
        let sorted: Vec<f64> = (0..5).map(|k| os.kth(k).unwrap()).collect();
        assert_eq!(sorted, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(os.kth(5), None);
    }

    #[test]
    fn test_remove_duplicates_one_at_a_time() {
        let mut os = OrderStatistics::new();
        for v in [2.0, 2.0, 2.0, 1.0] {
            os.insert(v);
        }
        assert!(os.remove(2.0));
        assert_eq!(os.len(), 3);
        assert!(!os.remove(7.0));
        assert_eq!(os.len(), 3);
        assert_eq!(os.max(), Some(2.0));
        assert_eq!(os.min(), Some(1.0));
    }

    #[test]
    fn test_quantile_interpolation() {
        let mut os = OrderStatistics::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            os.insert(v);
        }
        assert_relative_eq!(os.quantile(0.5).unwrap(), 2.5);
        assert_relative_eq!(os.quantile(0.25).unwrap(), 1.75);
        assert_relative_eq!(os.quantile(0.0).unwrap(), 1.0);
        assert_relative_eq!(os.quantile(1.0).unwrap(), 4.0);
        assert_eq!(os.quantile(1.5), None);
    }

    #[test]
    fn test_matches_sorted_reference_under_sliding() {
        let data: Vec<f64> = (0..500).map(|i| ((i * 37) % 101) as f64 * 0.5).collect();
        let w = 25;
        let mut os = OrderStatistics::new();
        for (i, &v) in data.iter().enumerate() {
            os.insert(v);
            if i >= w {
                assert!(os.remove(data[i - w]));
            }
            if i + 1 >= w {
                let mut window: Vec<f64> = data[i + 1 - w..=i].to_vec();
                window.sort_by(f64::total_cmp);
                for (k, expected) in window.iter().enumerate() {
                    assert_eq!(os.kth(k), Some(*expected));
                }
            }
        }
    }

    #[test]
    fn test_arena_reuses_freed_slots() {
        let mut os = OrderStatistics::new();
        for i in 0..10 {
            os.insert(i as f64);
        }
        for i in 0..1000 {
            os.remove((i % 10) as f64);
            os.insert((i % 10) as f64);
        }
        assert_eq!(os.len(), 10);
        assert!(os.nodes.len() <= 11);
    }
}
