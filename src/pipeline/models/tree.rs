//! Binary decision trees shared by the forest and boosting ensembles
//!
//! One greedy builder serves three split criteria: gini impurity and
//! variance for CART trees, and the second-order (gradient/hessian) gain
//! used by gradient boosting. Every node records its cover, which TreeSHAP
//! needs to weight unseen branches.

use std::ops::Sub;

use rand::Rng;

use crate::pipeline::features::FeatureMatrix;

/// Split improvements smaller than this are treated as no improvement
const MIN_IMPROVEMENT: f64 = 1e-12;

/// One tree node. Leaves have `feature == None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub feature: Option<usize>,
    /// Rows with `x[feature] <= threshold` go left
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
    /// Prediction at a leaf (class-1 probability, mean, or boosting weight)
    pub value: f64,
    /// Training mass that reached the node (rows, or hessian sum for boosting)
    pub cover: f64,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            let node = &self.nodes[idx];
            match node.feature {
                None => return node.value,
                Some(f) => {
                    idx = if row[f] <= node.threshold {
                        node.left
                    } else {
                        node.right
                    }
                }
            }
        }
    }

    /// Length of the longest root-to-leaf path in edges
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            let node = &nodes[idx];
            if node.is_leaf() {
                0
            } else {
                1 + walk(nodes, node.left).max(walk(nodes, node.right))
            }
        }
        walk(&self.nodes, 0)
    }

    /// Cover-weighted mean of the leaf values, the expected tree output
    pub fn expected_value(&self) -> f64 {
        let root = self.nodes[0].cover;
        if root <= 0.0 {
            return 0.0;
        }
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.value * n.cover)
            .sum::<f64>()
            / root
    }

    /// Multiply every leaf value by `factor`
    pub fn scale(&mut self, factor: f64) {
        for node in self.nodes.iter_mut().filter(|n| n.is_leaf()) {
            node.value *= factor;
        }
    }
}

/// Split criterion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Binary 0/1 targets, gini impurity
    Gini,
    /// Continuous targets, sum of squared deviations
    Variance,
    /// Gradient/hessian pairs with L2 leaf regularization
    SecondOrder { lambda: f64, min_child_weight: f64 },
}

/// Per-row contribution to node statistics: `(y, y^2)` or `(gradient, hessian)`
pub type RowStat = (f64, f64);

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    n: f64,
    a: f64,
    b: f64,
}

impl Stats {
    fn add(&mut self, (a, b): RowStat) {
        self.n += 1.0;
        self.a += a;
        self.b += b;
    }
}

impl Sub for Stats {
    type Output = Stats;

    fn sub(self, rhs: Stats) -> Stats {
        Stats {
            n: self.n - rhs.n,
            a: self.a - rhs.a,
            b: self.b - rhs.b,
        }
    }
}

impl Objective {
    /// Per-row statistic for a target value
    pub fn row_stat(y: f64) -> RowStat {
        (y, y * y)
    }

    /// Node loss; lower is better and children sum
    fn loss(&self, s: &Stats) -> f64 {
        if s.n <= 0.0 {
            return 0.0;
        }
        match self {
            Objective::Gini => 2.0 * s.a * (s.n - s.a) / s.n,
            Objective::Variance => (s.b - s.a * s.a / s.n).max(0.0),
            Objective::SecondOrder { lambda, .. } => -(s.a * s.a) / (s.b + lambda),
        }
    }

    fn leaf_value(&self, s: &Stats) -> f64 {
        match self {
            Objective::Gini | Objective::Variance => {
                if s.n > 0.0 {
                    s.a / s.n
                } else {
                    0.0
                }
            }
            Objective::SecondOrder { lambda, .. } => -s.a / (s.b + lambda),
        }
    }

    fn cover(&self, s: &Stats) -> f64 {
        match self {
            Objective::SecondOrder { .. } => s.b,
            _ => s.n,
        }
    }

    fn child_allowed(&self, s: &Stats) -> bool {
        match self {
            Objective::SecondOrder {
                min_child_weight, ..
            } => s.b >= *min_child_weight,
            _ => true,
        }
    }
}

/// Growth limits for one tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; `None` tries all
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

struct Builder<'a, R: Rng> {
    x: &'a FeatureMatrix,
    stats: &'a [RowStat],
    objective: Objective,
    params: TreeParams,
    rng: &'a mut R,
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    loss: f64,
}

impl<R: Rng> Builder<'_, R> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mut total = Stats::default();
        for &r in &rows {
            total.add(self.stats[r]);
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            feature: None,
            threshold: 0.0,
            left: 0,
            right: 0,
            value: self.objective.leaf_value(&total),
            cover: self.objective.cover(&total),
        });

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || rows.len() < self.params.min_samples_split {
            return idx;
        }

        let parent_loss = self.objective.loss(&total);
        let Some(split) = self.best_split(&rows, &total) else {
            return idx;
        };
        if split.loss >= parent_loss - MIN_IMPROVEMENT {
            return idx;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x.get(r, split.feature) <= split.threshold);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);

        let node = &mut self.nodes[idx];
        node.feature = Some(split.feature);
        node.threshold = split.threshold;
        node.left = left;
        node.right = right;
        idx
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let p = self.x.n_cols();
        match self.params.max_features {
            Some(k) if k < p => rand::seq::index::sample(&mut *self.rng, p, k.max(1)).into_vec(),
            _ => (0..p).collect(),
        }
    }

    fn best_split(&mut self, rows: &[usize], total: &Stats) -> Option<Split> {
        let min_leaf = self.params.min_samples_leaf.max(1) as f64;
        let mut best: Option<Split> = None;

        for feature in self.candidate_features() {
            let mut sorted: Vec<(f64, usize)> =
                rows.iter().map(|&r| (self.x.get(r, feature), r)).collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = Stats::default();
            for k in 0..sorted.len().saturating_sub(1) {
                let (value, row) = sorted[k];
                left.add(self.stats[row]);

                // No split between equal values
                let next = sorted[k + 1].0;
                if next <= value {
                    continue;
                }

                let right = *total - left;
                if left.n < min_leaf || right.n < min_leaf {
                    continue;
                }
                if !self.objective.child_allowed(&left) || !self.objective.child_allowed(&right) {
                    continue;
                }

                let loss = self.objective.loss(&left) + self.objective.loss(&right);
                if best.as_ref().map_or(true, |b| loss < b.loss - MIN_IMPROVEMENT) {
                    best = Some(Split {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        loss,
                    });
                }
            }
        }

        best
    }
}

/// Grow a tree on `rows` of `x` (repeats allowed, as in a bootstrap sample).
pub fn fit_tree<R: Rng>(
    x: &FeatureMatrix,
    stats: &[RowStat],
    rows: Vec<usize>,
    objective: Objective,
    params: TreeParams,
    rng: &mut R,
) -> Tree {
    let mut builder = Builder {
        x,
        stats,
        objective,
        params,
        rng,
        nodes: Vec::new(),
    };
    builder.grow(rows, 0);
    Tree {
        nodes: builder.nodes,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    pub(crate) fn step_data() -> (FeatureMatrix, Vec<f64>) {
        // y jumps from 0 to 1 at x0 = 5; x1 is noise
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            data.push(i as f64);
            data.push(((i * 7) % 3) as f64);
            y.push(if i >= 5 { 1.0 } else { 0.0 });
        }
        let x = FeatureMatrix::new(vec!["x0".into(), "x1".into()], data).unwrap();
        (x, y)
    }

    #[test]
    fn test_gini_tree_finds_step() {
        let (x, y) = step_data();
        let stats: Vec<RowStat> = y.iter().map(|&v| Objective::row_stat(v)).collect();
        let mut rng = Pcg64::seed_from_u64(0);
        let tree = fit_tree(&x, &stats, (0..10).collect(), Objective::Gini, TreeParams::default(), &mut rng);

        let root = &tree.nodes()[0];
        assert_eq!(root.feature, Some(0));
        assert_eq!(root.threshold, 4.5);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[2.0, 0.0]), 0.0);
        assert_eq!(tree.predict_row(&[8.0, 0.0]), 1.0);
        assert!((tree.expected_value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_zero_is_a_stump_leaf() {
        let (x, y) = step_data();
        let stats: Vec<RowStat> = y.iter().map(|&v| Objective::row_stat(v)).collect();
        let params = TreeParams {
            max_depth: Some(0),
            ..Default::default()
        };
        let mut rng = Pcg64::seed_from_u64(0);
        let tree = fit_tree(&x, &stats, (0..10).collect(), Objective::Variance, params, &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(&[0.0, 0.0]), 0.5);
    }

    #[test]
    fn test_second_order_leaf_weights() {
        let (x, y) = step_data();
        // squared loss at margin 0: gradient = -y, hessian = 1
        let stats: Vec<RowStat> = y.iter().map(|&v| (-v, 1.0)).collect();
        let objective = Objective::SecondOrder {
            lambda: 1.0,
            min_child_weight: 1.0,
        };
        let mut rng = Pcg64::seed_from_u64(0);
        let tree = fit_tree(&x, &stats, (0..10).collect(), objective, TreeParams::default(), &mut rng);
        // right leaf: G = -5, H = 5 -> w = 5 / 6
        assert!((tree.predict_row(&[9.0, 0.0]) - 5.0 / 6.0).abs() < 1e-12);
        assert_eq!(tree.predict_row(&[0.0, 0.0]), 0.0);
        assert_eq!(tree.nodes()[0].cover, 10.0);
    }
}
