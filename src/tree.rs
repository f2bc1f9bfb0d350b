//! CART decision tree for the two-class delay problem.
//!
//! Splits use Gini impurity over pre-binned columns: each column's distinct
//! training values become the bins, and the candidate thresholds are the
//! midpoints between neighbouring values. A sample goes left when
//! `x <= threshold`.

use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

/// Anything that can score a single aligned, scaled row.
pub trait Classifier {
    fn n_features(&self) -> usize;

    /// `[P(class 0), P(class 1)]`.
    fn predict_proba(&self, x: &[f32]) -> [f64; 2];

    /// Argmax of `predict_proba`; a tie goes to class 0.
    fn predict(&self, x: &[f32]) -> u8 {
        let p = self.predict_proba(x);
        u8::from(p[1] > p[0])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_samples_split: 2,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Leaf {
        proba: [f64; 2],
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    n_features: usize,
    nodes: Vec<Node>,
}

// More distinct values than this and the thresholds are subsampled evenly.
const MAX_BINS: usize = u16::MAX as usize;

/// A column reduced to bin ids plus the cut points between bins.
struct BinnedColumn {
    bins: Vec<u16>,
    cuts: Vec<f64>,
}

impl BinnedColumn {
    fn new(col: ArrayView1<'_, f32>) -> Self {
        let mut distinct: Vec<f64> = col.iter().map(|&v| f64::from(v)).collect();
        distinct.sort_by(|a, b| a.total_cmp(b));
        distinct.dedup();

        let mut cuts: Vec<f64> = distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
        if cuts.len() >= MAX_BINS {
            let step = cuts.len() as f64 / (MAX_BINS - 1) as f64;
            cuts = (0..MAX_BINS - 1)
                .map(|i| cuts[(i as f64 * step) as usize])
                .collect();
            cuts.dedup();
        }

        let bins = col
            .iter()
            .map(|&v| cuts.partition_point(|&c| c < f64::from(v)) as u16)
            .collect();
        Self { bins, cuts }
    }
}

struct Candidate {
    feature: usize,
    cut: usize,
    impurity: f64,
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

fn leaf(counts: [usize; 2]) -> Node {
    let n = counts[0] + counts[1];
    let proba = if n == 0 {
        [1.0, 0.0]
    } else {
        [counts[0] as f64 / n as f64, counts[1] as f64 / n as f64]
    };
    Node::Leaf { proba, samples: n }
}

struct Builder<'a> {
    columns: Vec<BinnedColumn>,
    y: &'a [u8],
    params: TreeParams,
    rng: StdRng,
    nodes: Vec<Node>,
    hist: Vec<[usize; 2]>,
}

impl Builder<'_> {
    fn counts(&self, idx: &[u32]) -> [usize; 2] {
        let mut c = [0usize; 2];
        for &i in idx {
            c[usize::from(self.y[i as usize] == 1)] += 1;
        }
        c
    }

    fn best_split(&mut self, idx: &[u32], parent: [usize; 2]) -> Option<Candidate> {
        let n = idx.len() as f64;
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.shuffle(&mut self.rng);

        let mut best: Option<Candidate> = None;
        for feature in order {
            let col = &self.columns[feature];
            if col.cuts.is_empty() {
                continue;
            }
            self.hist.clear();
            self.hist.resize(col.cuts.len() + 1, [0, 0]);
            for &i in idx {
                let i = i as usize;
                self.hist[usize::from(col.bins[i])][usize::from(self.y[i] == 1)] += 1;
            }

            let mut left = [0usize; 2];
            for cut in 0..col.cuts.len() {
                left[0] += self.hist[cut][0];
                left[1] += self.hist[cut][1];
                let right = [parent[0] - left[0], parent[1] - left[1]];
                let n_left = left[0] + left[1];
                if n_left == 0 || n_left == idx.len() {
                    continue;
                }
                let impurity = (n_left as f64 * gini(left)
                    + (idx.len() - n_left) as f64 * gini(right))
                    / n;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(Candidate {
                        feature,
                        cut,
                        impurity,
                    });
                }
            }
        }
        best
    }

    fn build(&mut self, idx: &mut [u32], depth: usize) -> usize {
        let counts = self.counts(idx);
        let id = self.nodes.len();
        self.nodes.push(leaf(counts));

        if depth >= self.params.max_depth
            || idx.len() < self.params.min_samples_split.max(2)
            || gini(counts) == 0.0
        {
            return id;
        }

        // Zero-gain splits are still taken; they can unlock gains further down.
        let Some(best) = self.best_split(idx, counts) else {
            return id;
        };

        // Partition in place: bin <= cut goes left.
        let bins = &self.columns[best.feature].bins;
        let mut mid = 0;
        for j in 0..idx.len() {
            if usize::from(bins[idx[j] as usize]) <= best.cut {
                idx.swap(mid, j);
                mid += 1;
            }
        }
        let threshold = self.columns[best.feature].cuts[best.cut];

        let (lo, hi) = idx.split_at_mut(mid);
        let left = self.build(lo, depth + 1);
        let right = self.build(hi, depth + 1);
        self.nodes[id] = Node::Split {
            feature: best.feature,
            threshold,
            left,
            right,
        };
        id
    }
}

impl DecisionTree {
    /// Fit on `x` (rows = samples) with labels in `{0, 1}`.
    ///
    /// Deterministic for a given `params.seed` and row order.
    pub fn fit(x: ArrayView2<'_, f32>, y: &[u8], params: TreeParams) -> Self {
        assert_eq!(x.nrows(), y.len(), "one label per row");

        let columns = x.axis_iter(Axis(1)).map(BinnedColumn::new).collect();
        let mut builder = Builder {
            columns,
            y,
            params,
            rng: StdRng::seed_from_u64(params.seed),
            nodes: Vec::new(),
            hist: Vec::new(),
        };
        let mut idx: Vec<u32> = (0..x.nrows() as u32).collect();
        builder.build(&mut idx, 0);

        Self {
            params,
            n_features: x.ncols(),
            nodes: builder.nodes,
        }
    }

    pub fn params(&self) -> TreeParams {
        self.params
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Predicted classes for every row of `x`.
    pub fn predict_rows(&self, x: ArrayView2<'_, f32>) -> Vec<u8> {
        x.axis_iter(Axis(0))
            .map(|row| match row.as_slice() {
                Some(s) => self.predict(s),
                None => self.predict(&row.to_vec()),
            })
            .collect()
    }
}

impl Classifier for DecisionTree {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f32]) -> [f64; 2] {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { proba, .. }) => return *proba,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    id = if f64::from(v) <= *threshold { *left } else { *right };
                }
                None => return [1.0, 0.0],
            }
        }
    }
}
