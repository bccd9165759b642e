//! Regression trees grown on gradient/hessian histograms.
//!
//! Split gain for a node with sums `(G, H)` split into `(G_L, H_L)` / `(G_R, H_R)`:
//!
//! ```text
//! gain = ½ [ G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ) ] − γ
//! ```
//!
//! Missing values are routed to whichever side gives the larger gain, and that
//! default direction is stored with the split.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::binning::{BinMapper, MISSING_BIN};

/// Growth limits and regularization for one tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value for one sample.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                } => {
                    let v = row[*feature];
                    let go_left = if v.is_nan() { *default_left } else { v <= *threshold };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Check that a tree is safe to walk: non-empty, every split reads a
    /// feature below `n_features`, and every child index points forward.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                feature, left, right, ..
            } = node
            else {
                continue;
            };
            if *feature >= n_features {
                return Err(format!(
                    "node {idx} splits on feature {feature}, model has {n_features}"
                ));
            }
            for child in [*left, *right] {
                if child <= idx || child >= self.nodes.len() {
                    return Err(format!(
                        "node {idx} has child {child} outside {}..{}",
                        idx + 1,
                        self.nodes.len()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Inputs shared by every node of one tree.
pub struct GrowContext<'a> {
    pub binned: &'a [Vec<u16>],
    pub mapper: &'a BinMapper,
    pub grad: &'a [f64],
    pub hess: &'a [f64],
    /// Features this tree may split on (column subsample), ascending.
    pub features: &'a [usize],
    pub params: TreeParams,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    default_left: bool,
    gain: f64,
}

/// Grow one tree over `rows`. Returns the tree and the total gain per feature.
pub fn grow_tree(ctx: &GrowContext<'_>, rows: Vec<usize>, n_features: usize) -> (Tree, Vec<f64>) {
    let mut nodes = Vec::new();
    let mut gains = vec![0.0; n_features];
    grow_node(ctx, rows, 0, &mut nodes, &mut gains);
    (Tree { nodes }, gains)
}

fn grow_node(
    ctx: &GrowContext<'_>,
    rows: Vec<usize>,
    depth: usize,
    nodes: &mut Vec<Node>,
    gains: &mut [f64],
) -> usize {
    let p = ctx.params;
    let (g, h) = rows
        .iter()
        .fold((0.0, 0.0), |(g, h), &r| (g + ctx.grad[r], h + ctx.hess[r]));

    let idx = nodes.len();
    nodes.push(Node::Leaf {
        value: leaf_value(g, h, &p),
    });

    if depth >= p.max_depth || h < 2.0 * p.min_child_weight {
        return idx;
    }

    let Some(best) = best_split(ctx, &rows, g, h) else {
        return idx;
    };

    let bins = &ctx.binned[best.feature];
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.into_iter().partition(|&r| {
        let b = bins[r];
        if b == MISSING_BIN {
            best.default_left
        } else {
            (b as usize) <= best.bin
        }
    });

    gains[best.feature] += best.gain;
    let left = grow_node(ctx, left_rows, depth + 1, nodes, gains);
    let right = grow_node(ctx, right_rows, depth + 1, nodes, gains);

    nodes[idx] = Node::Split {
        feature: best.feature,
        threshold: ctx.mapper.cuts(best.feature)[best.bin],
        default_left: best.default_left,
        left,
        right,
    };
    idx
}

fn leaf_value(g: f64, h: f64, p: &TreeParams) -> f64 {
    -g / (h + p.lambda) * p.learning_rate
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn best_split(ctx: &GrowContext<'_>, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
    // Evaluate each feature independently (parallel), then pick deterministically.
    let candidates: Vec<Option<SplitCandidate>> = ctx
        .features
        .par_iter()
        .map(|&f| best_split_for_feature(ctx, rows, f, g, h))
        .collect();

    let mut best: Option<SplitCandidate> = None;
    for c in candidates.into_iter().flatten() {
        // Ties keep the earlier (lower-index) feature.
        if best.is_none_or(|b| c.gain > b.gain) {
            best = Some(c);
        }
    }
    best
}

fn best_split_for_feature(
    ctx: &GrowContext<'_>,
    rows: &[usize],
    feature: usize,
    g: f64,
    h: f64,
) -> Option<SplitCandidate> {
    let p = ctx.params;
    let n_bins = ctx.mapper.n_bins(feature);
    if n_bins < 2 {
        return None;
    }

    let bins = &ctx.binned[feature];
    let mut hist_g = vec![0.0; n_bins];
    let mut hist_h = vec![0.0; n_bins];
    let (mut miss_g, mut miss_h) = (0.0, 0.0);
    for &r in rows {
        let b = bins[r];
        if b == MISSING_BIN {
            miss_g += ctx.grad[r];
            miss_h += ctx.hess[r];
        } else {
            hist_g[b as usize] += ctx.grad[r];
            hist_h[b as usize] += ctx.hess[r];
        }
    }

    let parent = score(g, h, p.lambda);
    let has_missing = miss_h > 0.0;
    let mut best: Option<SplitCandidate> = None;
    let (mut gl, mut hl) = (0.0, 0.0);

    // Split after bin `b`: bins 0..=b go left.
    for b in 0..n_bins - 1 {
        gl += hist_g[b];
        hl += hist_h[b];

        let directions: &[bool] = if has_missing { &[false, true] } else { &[false] };
        for &default_left in directions {
            let (lg, lh) = if default_left { (gl + miss_g, hl + miss_h) } else { (gl, hl) };
            let (rg, rh) = (g - lg, h - lh);
            if lh < p.min_child_weight || rh < p.min_child_weight {
                continue;
            }
            let gain = 0.5 * (score(lg, lh, p.lambda) + score(rg, rh, p.lambda) - parent) - p.gamma;
            if gain > 0.0 && best.is_none_or(|c| gain > c.gain) {
                best = Some(SplitCandidate {
                    feature,
                    bin: b,
                    default_left,
                    gain,
                });
            }
        }
    }
    best
}
