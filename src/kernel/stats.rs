//! Coalition statistics: subset-size kernel weights and sampling budget
//!
//! Pure bookkeeping over the SHAP kernel's combinatorics. Given the feature
//! count M and a total sample budget, this tracks how many coalitions exist
//! at each subset size, the kernel weight of each size, how much of the
//! budget remains, and which sizes were cheap enough to enumerate outright.

/// Binomial coefficient C(n, k) in floating point.
///
/// Computed multiplicatively with the C(n, k) = C(n, n-k) symmetry so the
/// intermediate products stay small.
pub(crate) fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result *= (n - i) as f64;
        result /= (i + 1) as f64;
    }
    result
}

/// Kernel weighting and budget state for one explanation.
///
/// Subset sizes are indexed from 0: index `i` covers coalitions of size
/// `i + 1` and, when paired, their complements of size `M - i - 1`. Sizes 0
/// and M are reserved masks handled outside the statistics.
#[derive(Debug, Clone)]
pub(crate) struct ShapStatistics {
    num_subset_sizes: usize,
    num_paired_subset_sizes: usize,
    /// Coalitions available at each size index (complements included for
    /// paired sizes).
    num_subsets_at_size: Vec<f64>,
    /// Normalized kernel weight of each size index, complements included.
    weight_of_size: Vec<f64>,
    /// Residual weight distribution over not-yet-enumerated sizes.
    remaining_weights: Vec<f64>,
    num_samples_remaining: usize,
    num_full_subsets: usize,
}

impl ShapStatistics {
    /// Build the kernel statistics for `m` features and a sample budget.
    /// Requires `m >= 2`; single-feature explanations bypass the regression.
    pub(crate) fn new(m: usize, n_samples: usize) -> Self {
        debug_assert!(m >= 2);

        // Sizes 1..=M-1 are non-trivial; pairing size k with M-k folds the
        // range in half. When M is even the middle size M/2 is unpaired.
        let num_subset_sizes = ((m - 1) as f64 / 2.0).ceil() as usize;
        let num_paired_subset_sizes = (m - 1) / 2;

        let mut weight_of_size = Vec::with_capacity(num_subset_sizes);
        let mut num_subsets_at_size = Vec::with_capacity(num_subset_sizes);
        for i in 0..num_subset_sizes {
            let size = i + 1;
            let mut weight = (m - 1) as f64 / (size * (m - size)) as f64;
            let mut count = binomial(m, size);
            if size <= num_paired_subset_sizes {
                weight *= 2.0;
                count *= 2.0;
            }
            weight_of_size.push(weight);
            num_subsets_at_size.push(count);
        }
        let total: f64 = weight_of_size.iter().sum();
        for w in &mut weight_of_size {
            *w /= total;
        }

        let remaining_weights = weight_of_size.clone();
        Self {
            num_subset_sizes,
            num_paired_subset_sizes,
            num_subsets_at_size,
            weight_of_size,
            remaining_weights,
            num_samples_remaining: n_samples,
            num_full_subsets: 0,
        }
    }

    pub(crate) fn num_subset_sizes(&self) -> usize {
        self.num_subset_sizes
    }

    /// `true` when size index `i` pairs with a distinct complement size.
    pub(crate) fn is_paired(&self, i: usize) -> bool {
        i + 1 <= self.num_paired_subset_sizes
    }

    /// Kernel weight of a single coalition at size index `i`.
    pub(crate) fn weight_per_subset(&self, i: usize) -> f64 {
        self.weight_of_size[i] / self.num_subsets_at_size[i]
    }

    pub(crate) fn samples_remaining(&self) -> usize {
        self.num_samples_remaining
    }

    pub(crate) fn num_full_subsets(&self) -> usize {
        self.num_full_subsets
    }

    /// Whether the remaining budget affords enumerating every coalition at
    /// size index `i` instead of sampling it.
    pub(crate) fn can_enumerate(&self, i: usize) -> bool {
        let count = self.num_subsets_at_size[i];
        self.num_samples_remaining as f64 * self.remaining_weights[i] / count >= 1.0 - 1e-8
    }

    /// Record size index `i` as fully enumerated: consume its coalitions from
    /// the budget and fold its weight out of the residual distribution.
    pub(crate) fn mark_enumerated(&mut self, i: usize) {
        let count = self.num_subsets_at_size[i] as usize;
        self.num_samples_remaining = self.num_samples_remaining.saturating_sub(count);
        self.num_full_subsets += 1;

        let folded = self.remaining_weights[i];
        self.remaining_weights[i] = 0.0;
        if folded < 1.0 {
            for j in (i + 1)..self.num_subset_sizes {
                self.remaining_weights[j] /= 1.0 - folded;
            }
        }
    }

    pub(crate) fn decrement_samples(&mut self, n: usize) {
        self.num_samples_remaining = self.num_samples_remaining.saturating_sub(n);
    }

    /// Distribution over not-yet-enumerated size indices used for random
    /// draws. Paired sizes are halved since each draw also adds a complement.
    pub(crate) fn residual_distribution(&self) -> Vec<f64> {
        let mut dist: Vec<f64> = self.weight_of_size[self.num_full_subsets..].to_vec();
        for (j, w) in dist.iter_mut().enumerate() {
            if self.is_paired(self.num_full_subsets + j) {
                *w /= 2.0;
            }
        }
        let total: f64 = dist.iter().sum();
        if total > 0.0 {
            for w in &mut dist {
                *w /= total;
            }
        }
        dist
    }

    /// Total kernel mass left to the randomly sampled region.
    pub(crate) fn residual_kernel_mass(&self) -> f64 {
        self.weight_of_size[self.num_full_subsets..].iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(5, 0), 1.0);
        assert_eq!(binomial(5, 5), 1.0);
        assert_eq!(binomial(5, 2), 10.0);
        assert_eq!(binomial(10, 3), 120.0);
        assert_eq!(binomial(3, 4), 0.0);
    }

    #[test]
    fn test_subset_size_counts_odd_m() {
        // M = 5: sizes 1 and 2 both pair (with 4 and 3)
        let stats = ShapStatistics::new(5, 100);
        assert_eq!(stats.num_subset_sizes(), 2);
        assert_eq!(stats.num_paired_subset_sizes, 2);
        assert!(stats.is_paired(0));
        assert!(stats.is_paired(1));
        assert_eq!(stats.num_subsets_at_size[0], 10.0); // 2 * C(5,1)
        assert_eq!(stats.num_subsets_at_size[1], 20.0); // 2 * C(5,2)
    }

    #[test]
    fn test_subset_size_counts_even_m() {
        // M = 4: size 1 pairs with 3, size 2 is self-complementary
        let stats = ShapStatistics::new(4, 100);
        assert_eq!(stats.num_subset_sizes(), 2);
        assert_eq!(stats.num_paired_subset_sizes, 1);
        assert!(stats.is_paired(0));
        assert!(!stats.is_paired(1));
        assert_eq!(stats.num_subsets_at_size[0], 8.0); // 2 * C(4,1)
        assert_eq!(stats.num_subsets_at_size[1], 6.0); // C(4,2)
    }

    #[test]
    fn test_weights_normalized_and_extreme_heavy() {
        let stats = ShapStatistics::new(8, 1000);
        let total: f64 = stats.weight_of_size.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // The kernel weights extremes more than the middle.
        assert!(stats.weight_of_size[0] > stats.weight_of_size[stats.num_subset_sizes() - 1]);
    }

    #[test]
    fn test_enumeration_consumes_budget() {
        let mut stats = ShapStatistics::new(5, 100);
        assert!(stats.can_enumerate(0));
        stats.mark_enumerated(0);
        assert_eq!(stats.num_full_subsets(), 1);
        assert_eq!(stats.samples_remaining(), 90);
        // Residual distribution covers only the remaining size.
        let dist = stats.residual_distribution();
        assert_eq!(dist.len(), 1);
        assert!((dist[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tight_budget_blocks_enumeration() {
        // M = 11, size 1 costs 22 coalitions; a budget of 10 cannot cover it.
        let stats = ShapStatistics::new(11, 10);
        assert!(!stats.can_enumerate(0));
    }

    #[test]
    fn test_residual_mass_shrinks() {
        let mut stats = ShapStatistics::new(6, 10_000);
        let before = stats.residual_kernel_mass();
        assert!((before - 1.0).abs() < 1e-12);
        stats.mark_enumerated(0);
        assert!(stats.residual_kernel_mass() < before);
    }
}
