// src/prediction/ensemble/tree.rs
//
// CART decision tree shared by the forest (Gini classification trees) and
// the booster (squared-error regression trees with Newton leaf values).
// Nodes live in a flat Vec; index 0 is the root.

use rand::rngs::StdRng;
use rand::seq::index::sample;

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split, None = all
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: Vec<f32>,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// What a tree is fitted against. Costs are impurity × sample count so
/// left and right children add up directly.
pub(crate) trait SplitTarget {
    type Acc: Clone;

    fn empty(&self) -> Self::Acc;
    fn push(&self, acc: &mut Self::Acc, sample: usize);
    fn pop(&self, acc: &mut Self::Acc, sample: usize);
    fn cost(&self, acc: &Self::Acc) -> f64;
    fn leaf_value(&self, samples: &[usize]) -> Vec<f32>;
}

/// Gini impurity over class labels. Leaves hold class fractions.
pub(crate) struct ClassTarget<'a> {
    pub labels: &'a [usize],
    pub n_classes: usize,
}

impl SplitTarget for ClassTarget<'_> {
    type Acc = (Vec<f64>, f64);

    fn empty(&self) -> Self::Acc {
        (vec![0.0; self.n_classes], 0.0)
    }

    fn push(&self, acc: &mut Self::Acc, sample: usize) {
        acc.0[self.labels[sample]] += 1.0;
        acc.1 += 1.0;
    }

    fn pop(&self, acc: &mut Self::Acc, sample: usize) {
        acc.0[self.labels[sample]] -= 1.0;
        acc.1 -= 1.0;
    }

    fn cost(&self, (counts, n): &Self::Acc) -> f64 {
        if *n <= 0.0 {
            return 0.0;
        }
        n - counts.iter().map(|c| c * c).sum::<f64>() / n
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f32> {
        let mut counts = vec![0.0f32; self.n_classes];
        for &s in samples {
            counts[self.labels[s]] += 1.0;
        }
        let n = samples.len().max(1) as f32;
        counts.iter_mut().for_each(|c| *c /= n);
        counts
    }
}

/// Squared error on gradients. Leaves take one Newton step:
/// scale × Σg / Σh.
pub(crate) struct NewtonTarget<'a> {
    pub gradient: &'a [f32],
    pub hessian: &'a [f32],
    pub scale: f32,
}

impl SplitTarget for NewtonTarget<'_> {
    type Acc = (f64, f64, f64);

    fn empty(&self) -> Self::Acc {
        (0.0, 0.0, 0.0)
    }

    fn push(&self, acc: &mut Self::Acc, sample: usize) {
        let g = self.gradient[sample] as f64;
        acc.0 += g;
        acc.1 += g * g;
        acc.2 += 1.0;
    }

    fn pop(&self, acc: &mut Self::Acc, sample: usize) {
        let g = self.gradient[sample] as f64;
        acc.0 -= g;
        acc.1 -= g * g;
        acc.2 -= 1.0;
    }

    fn cost(&self, (sum, sum_sq, n): &Self::Acc) -> f64 {
        if *n <= 0.0 {
            return 0.0;
        }
        (sum_sq - sum * sum / n).max(0.0)
    }

    fn leaf_value(&self, samples: &[usize]) -> Vec<f32> {
        let (g, h) = samples.iter().fold((0.0f64, 0.0f64), |(g, h), &s| {
            (g + self.gradient[s] as f64, h + self.hessian[s] as f64)
        });
        if h.abs() < 1e-12 {
            return vec![0.0];
        }
        vec![(self.scale as f64 * g / h) as f32]
    }
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    pub(crate) fn fit<T: SplitTarget>(
        x: &[Vec<f32>],
        target: &T,
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let mut tree = Self {
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        tree.grow(x, target, samples, 0, params, rng);
        tree
    }

    fn grow<T: SplitTarget>(
        &mut self,
        x: &[Vec<f32>],
        target: &T,
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: Vec::new() });

        let split = if depth < params.max_depth && samples.len() >= params.min_samples_split {
            self.best_split(x, target, &samples, params, rng)
        } else {
            None
        };

        let Some((feature, threshold, gain)) = split else {
            self.nodes[idx] = Node::Leaf {
                value: target.leaf_value(&samples),
            };
            return idx;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&s| x[s][feature] <= threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            let all = [left_samples, right_samples].concat();
            self.nodes[idx] = Node::Leaf {
                value: target.leaf_value(&all),
            };
            return idx;
        }

        self.importances[feature] += gain;
        let left = self.grow(x, target, left_samples, depth + 1, params, rng);
        let right = self.grow(x, target, right_samples, depth + 1, params, rng);
        self.nodes[idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    /// (feature, threshold, cost decrease) of the best split, if any
    /// strictly reduces cost.
    fn best_split<T: SplitTarget>(
        &self,
        x: &[Vec<f32>],
        target: &T,
        samples: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<(usize, f32, f64)> {
        let n_features = self.importances.len();
        if n_features == 0 || samples.len() < 2 {
            return None;
        }

        let mut total = target.empty();
        for &s in samples {
            target.push(&mut total, s);
        }
        let parent_cost = target.cost(&total);
        if parent_cost <= 1e-12 {
            return None;
        }

        // Random feature order; past the first `max_features` keep looking
        // only until some split is found.
        let budget = params.max_features.unwrap_or(n_features).clamp(1, n_features);
        let features: Vec<usize> = if budget < n_features {
            sample(rng, n_features, n_features).into_vec()
        } else {
            (0..n_features).collect()
        };

        let min_leaf = params.min_samples_leaf.max(1);
        let mut best: Option<(usize, f32, f64)> = None;
        let mut order = samples.to_vec();

        for (tried, &f) in features.iter().enumerate() {
            if tried >= budget && best.is_some() {
                break;
            }
            order.sort_by(|a, b| x[*a][f].total_cmp(&x[*b][f]));
            let mut left = target.empty();
            let mut right = total.clone();

            for i in 0..order.len() - 1 {
                target.push(&mut left, order[i]);
                target.pop(&mut right, order[i]);

                let here = x[order[i]][f];
                let next = x[order[i + 1]][f];
                if here == next {
                    continue;
                }
                let n_left = i + 1;
                if n_left < min_leaf || order.len() - n_left < min_leaf {
                    continue;
                }

                let cost = target.cost(&left) + target.cost(&right);
                if best.map_or(true, |(_, _, c)| cost < c) {
                    best = Some((f, here + (next - here) / 2.0, cost));
                }
            }
        }

        best.and_then(|(f, t, cost)| {
            let gain = parent_cost - cost;
            (gain > 1e-12).then_some((f, t, gain))
        })
    }

    pub fn predict(&self, row: &[f32]) -> &[f32] {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                Some(Node::Leaf { value }) => return value,
                None => return &[],
            }
        }
    }

    /// Impurity decrease per feature, normalized to sum 1 (all zero for a
    /// single-leaf tree).
    pub fn feature_importances(&self) -> Vec<f32> {
        let total: f64 = self.importances.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.importances.len()];
        }
        self.importances.iter().map(|v| (v / total) as f32).collect()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_separable_classes_split_cleanly() {
        let x: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, 0.0]).collect();
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let target = ClassTarget {
            labels: &y,
            n_classes: 2,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &target, (0..20).collect(), &TreeParams::default(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&[3.0, 0.0]), &[1.0, 0.0]);
        assert_eq!(tree.predict(&[15.0, 0.0]), &[0.0, 1.0]);
        let imp = tree.feature_importances();
        assert_eq!(imp, vec![1.0, 0.0], "only the informative feature splits");
    }

    #[test]
    fn test_max_depth_respected() {
        let x: Vec<Vec<f32>> = (0..64).map(|i| vec![i as f32]).collect();
        let y: Vec<usize> = (0..64).map(|i| i % 2).collect();
        let target = ClassTarget {
            labels: &y,
            n_classes: 2,
        };
        let params = TreeParams {
            max_depth: 3,
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &target, (0..64).collect(), &params, &mut rng);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_newton_leaf_value() {
        let x = vec![vec![0.0], vec![1.0]];
        let g = [0.5f32, 0.5];
        let h = [0.25f32, 0.25];
        let target = NewtonTarget {
            gradient: &g,
            hessian: &h,
            scale: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(&x, &target, vec![0, 1], &TreeParams::default(), &mut rng);
        // identical gradients never split; one leaf with Σg/Σh = 2
        assert_eq!(tree.depth(), 0);
        assert!((tree.predict(&[0.0])[0] - 2.0).abs() < 1e-6);
    }
}
