//! HDBSCAN over a dense in-memory vector set.
//!
//! The pipeline is the standard one:
//!
//! 1. pairwise distances and per-point core distances (`min_samples` is tied
//!    to `min_cluster_size`, as in the common reference implementations)
//! 2. minimum spanning tree over mutual-reachability distances (Prim)
//! 3. single-linkage hierarchy from the sorted MST edges
//! 4. condensed tree: subtrees smaller than `min_cluster_size` fall out of
//!    their parent cluster instead of forming one
//! 5. cluster extraction by Excess of Mass (stability) or Leaf selection
//!
//! The root of the condensed tree is never selectable, so inputs that never
//! split into two viable subclusters come back as all-noise. Everything is
//! deterministic for a fixed input: float comparisons use `total_cmp` and
//! every tie breaks on point index, so identical input reproduces identical
//! labels.

use super::{ClusterError, ClusterSelection, DistanceMetric, NOISE};

/// Distances at or below this floor are clamped before taking `1/d`, so that
/// duplicate points (distance zero) produce a large finite lambda instead of
/// poisoning the stability sums with infinities.
const DIST_FLOOR: f64 = 1e-10;

/// Parameters for one clustering run.
#[derive(Debug, Clone, Copy)]
pub struct HdbscanParams {
    /// Minimum number of points that can form a cluster. Must be >= 2.
    pub min_cluster_size: usize,
    pub metric: DistanceMetric,
    pub selection: ClusterSelection,
}

/// One HDBSCAN run over a borrowed vector set.
pub struct Hdbscan<'a> {
    data: &'a [Vec<f64>],
    params: HdbscanParams,
}

/// A merge node of the single-linkage hierarchy. Node ids `0..n` are the
/// points themselves; node `n + i` is the i-th merge.
struct SlNode {
    left: usize,
    right: usize,
    dist: f64,
    size: usize,
}

/// Condensed hierarchy: one slot per condensed cluster (id 0 is the root),
/// plus the fall-out cluster and lambda for every point.
struct CondensedTree {
    parent: Vec<usize>,
    birth: Vec<f64>,
    children: Vec<Vec<usize>>,
    stability: Vec<f64>,
    point_cluster: Vec<usize>,
}

impl<'a> Hdbscan<'a> {
    pub fn new(data: &'a [Vec<f64>], params: HdbscanParams) -> Self {
        Self { data, params }
    }

    /// Run the clustering and return one label per input vector, in input
    /// order. Labels are `0..k` for the k selected clusters and [`NOISE`]
    /// for unclustered points.
    pub fn cluster(&self) -> Result<Vec<i64>, ClusterError> {
        self.validate()?;

        let n = self.data.len();
        if n == 1 {
            // A single point can never reach min_cluster_size.
            return Ok(vec![NOISE]);
        }

        let dist = self.pairwise_distances();
        let core = core_distances(&dist, self.params.min_cluster_size);
        let edges = mst_edges(&dist, &core);
        let hierarchy = single_linkage(&edges, n);
        let tree = condense(&hierarchy, n, self.params.min_cluster_size);
        let selected = match self.params.selection {
            ClusterSelection::Eom => select_eom(&tree),
            ClusterSelection::Leaf => select_leaf(&tree),
        };

        Ok(assign_labels(&tree, &selected))
    }

    fn validate(&self) -> Result<(), ClusterError> {
        if self.data.is_empty() {
            return Err(ClusterError::EmptyInput);
        }
        if self.params.min_cluster_size < 2 {
            return Err(ClusterError::MinClusterSize(self.params.min_cluster_size));
        }
        let expected = self.data[0].len();
        for (index, vector) in self.data.iter().enumerate() {
            if vector.len() != expected {
                return Err(ClusterError::DimensionMismatch {
                    index,
                    expected,
                    found: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(ClusterError::NonFinite { index });
            }
        }
        Ok(())
    }

    fn pairwise_distances(&self) -> Vec<Vec<f64>> {
        let n = self.data.len();
        let mut dist = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.params.metric.distance(&self.data[i], &self.data[j]);
                dist[i][j] = d;
                dist[j][i] = d;
            }
        }
        dist
    }
}

/// Core distance of each point: distance to its `min_samples`-th nearest
/// neighbor, the point itself included (so `min_samples = 1` gives 0).
/// `min_samples` follows `min_cluster_size`, capped at the sample count.
fn core_distances(dist: &[Vec<f64>], min_samples: usize) -> Vec<f64> {
    let n = dist.len();
    let k = min_samples.min(n);
    dist.iter()
        .map(|row| {
            let mut sorted = row.clone();
            sorted.sort_by(f64::total_cmp);
            sorted[k - 1]
        })
        .collect()
}

/// Prim's MST over the complete mutual-reachability graph,
/// `mr(a, b) = max(core_a, core_b, d(a, b))`. Returns the n−1 tree edges
/// sorted ascending by weight (ties by endpoint indices).
fn mst_edges(dist: &[Vec<f64>], core: &[f64]) -> Vec<(f64, usize, usize)> {
    let n = dist.len();
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut best_from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        best[j] = dist[0][j].max(core[0]).max(core[j]);
    }

    for _ in 1..n {
        let mut next = usize::MAX;
        for j in 0..n {
            if !in_tree[j] && (next == usize::MAX || best[j] < best[next]) {
                next = j;
            }
        }
        in_tree[next] = true;
        let (u, v) = if best_from[next] < next {
            (best_from[next], next)
        } else {
            (next, best_from[next])
        };
        edges.push((best[next], u, v));

        for j in 0..n {
            if !in_tree[j] {
                let w = dist[next][j].max(core[next]).max(core[j]);
                if w < best[j] {
                    best[j] = w;
                    best_from[j] = next;
                }
            }
        }
    }

    edges.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then(a.1.cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    edges
}

/// Merge sorted MST edges into a single-linkage dendrogram via union-find.
fn single_linkage(edges: &[(f64, usize, usize)], n: usize) -> Vec<SlNode> {
    let mut uf_parent: Vec<usize> = (0..n).collect();
    // Current dendrogram node of each union-find root.
    let mut component_node: Vec<usize> = (0..n).collect();
    let mut nodes: Vec<SlNode> = Vec::with_capacity(n - 1);

    fn find(uf_parent: &mut [usize], mut x: usize) -> usize {
        while uf_parent[x] != x {
            uf_parent[x] = uf_parent[uf_parent[x]];
            x = uf_parent[x];
        }
        x
    }

    for &(w, u, v) in edges {
        let ru = find(&mut uf_parent, u);
        let rv = find(&mut uf_parent, v);
        let left = component_node[ru];
        let right = component_node[rv];
        let size = |id: usize| if id < n { 1 } else { nodes[id - n].size };
        let merged = SlNode {
            left,
            right,
            dist: w,
            size: size(left) + size(right),
        };
        let new_id = n + nodes.len();
        nodes.push(merged);
        uf_parent[rv] = ru;
        component_node[ru] = new_id;
    }

    nodes
}

/// All leaf points under a dendrogram node.
fn subtree_points(node: usize, n: usize, hierarchy: &[SlNode]) -> Vec<usize> {
    let mut points = Vec::new();
    let mut stack = vec![node];
    while let Some(id) = stack.pop() {
        if id < n {
            points.push(id);
        } else {
            let merge = &hierarchy[id - n];
            stack.push(merge.left);
            stack.push(merge.right);
        }
    }
    points
}

/// Condense the dendrogram: walking top-down, a side of a split smaller than
/// `min_cluster_size` falls out of the current cluster at that split's
/// lambda; a split into two viable sides births two child clusters.
/// Stability is accumulated scikit-style: every exit from a cluster (point
/// fall-out or child birth) contributes `size * (lambda - birth)`.
fn condense(hierarchy: &[SlNode], n: usize, min_cluster_size: usize) -> CondensedTree {
    let root = n + hierarchy.len() - 1;
    let mut tree = CondensedTree {
        parent: vec![0],
        birth: vec![0.0],
        children: vec![Vec::new()],
        stability: vec![0.0],
        point_cluster: vec![usize::MAX; n],
    };

    let size = |id: usize| if id < n { 1 } else { hierarchy[id - n].size };
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

    while let Some((node, cluster)) = stack.pop() {
        let merge = &hierarchy[node - n];
        let lambda = 1.0 / merge.dist.max(DIST_FLOOR);
        let left_ok = size(merge.left) >= min_cluster_size;
        let right_ok = size(merge.right) >= min_cluster_size;

        let fall_out = |tree: &mut CondensedTree, child: usize| {
            for p in subtree_points(child, n, hierarchy) {
                tree.point_cluster[p] = cluster;
                tree.stability[cluster] += lambda - tree.birth[cluster];
            }
        };

        match (left_ok, right_ok) {
            (true, true) => {
                for &child in &[merge.left, merge.right] {
                    let id = tree.parent.len();
                    tree.parent.push(cluster);
                    tree.birth.push(lambda);
                    tree.children.push(Vec::new());
                    tree.stability[cluster] += size(child) as f64 * (lambda - tree.birth[cluster]);
                    tree.stability.push(0.0);
                    tree.children[cluster].push(id);
                    stack.push((child, id));
                }
            }
            (true, false) => {
                fall_out(&mut tree, merge.right);
                stack.push((merge.left, cluster));
            }
            (false, true) => {
                fall_out(&mut tree, merge.left);
                stack.push((merge.right, cluster));
            }
            (false, false) => {
                fall_out(&mut tree, merge.left);
                fall_out(&mut tree, merge.right);
            }
        }
    }

    tree
}

/// Excess-of-Mass selection: leaves start selected; a parent replaces its
/// selected descendants when its own stability beats their combined
/// stability. The root is never selectable.
fn select_eom(tree: &CondensedTree) -> Vec<bool> {
    let m = tree.birth.len();
    let mut selected = vec![false; m];
    let mut subtree_stability = tree.stability.clone();

    // Children always carry larger ids than their parent, so descending id
    // order is bottom-up.
    for c in (1..m).rev() {
        let child_sum: f64 = tree.children[c].iter().map(|&ch| subtree_stability[ch]).sum();
        if tree.children[c].is_empty() || tree.stability[c] >= child_sum {
            selected[c] = true;
            subtree_stability[c] = tree.stability[c];
        } else {
            subtree_stability[c] = child_sum;
        }
    }

    // Top-down: anything below a selected cluster is unselected.
    let mut shadowed = vec![false; m];
    for c in 1..m {
        let p = tree.parent[c];
        shadowed[c] = shadowed[p] || (p != 0 && selected[p]);
        if shadowed[c] {
            selected[c] = false;
        }
    }

    selected
}

/// Leaf selection: every childless condensed cluster except the root.
fn select_leaf(tree: &CondensedTree) -> Vec<bool> {
    (0..tree.birth.len())
        .map(|c| c != 0 && tree.children[c].is_empty())
        .collect()
}

/// Map each point to the label of its nearest selected ancestor cluster, or
/// noise when no ancestor was selected. Labels are dense `0..k` in cluster
/// id order, which is stable for a fixed input.
fn assign_labels(tree: &CondensedTree, selected: &[bool]) -> Vec<i64> {
    let mut label_of: Vec<Option<i64>> = vec![None; selected.len()];
    let mut next = 0i64;
    for (c, &sel) in selected.iter().enumerate() {
        if sel {
            label_of[c] = Some(next);
            next += 1;
        }
    }

    tree.point_cluster
        .iter()
        .map(|&fall_out_cluster| {
            let mut c = fall_out_cluster;
            loop {
                if let Some(label) = label_of[c] {
                    return label;
                }
                if c == 0 {
                    return NOISE;
                }
                c = tree.parent[c];
            }
        })
        .collect()
}
