//! Coalition sampling: exhaustive enumeration and weighted random draws
//!
//! Produces the ordered set of coalition masks evaluated against the model.
//! Subset sizes are consumed from the extremes inward while the budget
//! allows full enumeration; whatever budget remains is spent on random
//! (mask, complement) pairs drawn proportionally to the kernel weights.

use std::collections::HashMap;

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::stats::ShapStatistics;

/// One coalition chosen for evaluation.
///
/// `mask[i] == true` takes feature i from the instance, `false` from a
/// background row. `fixed` marks guaranteed members: the two reserved masks
/// and every coalition of a fully enumerated subset size.
#[derive(Debug, Clone)]
pub(crate) struct CoalitionSample {
    pub mask: Vec<bool>,
    pub weight: f64,
    pub fixed: bool,
}

/// The full set of coalitions for one explanation.
///
/// Ordering invariant: index 0 is the all-absent mask, index 1 the
/// all-present mask; both are excluded from the fitted design matrix.
/// Everything from index 2 on is a regression row.
#[derive(Debug, Clone)]
pub(crate) struct CoalitionPlan {
    pub samples: Vec<CoalitionSample>,
}

impl CoalitionPlan {
    /// Regression rows: every coalition except the two reserved masks.
    pub(crate) fn design_samples(&self) -> &[CoalitionSample] {
        &self.samples[2..]
    }
}

/// Visit every k-subset of `0..m` in lexicographic order.
fn for_each_combination<F: FnMut(&[usize])>(m: usize, k: usize, mut visit: F) {
    if k > m {
        return;
    }
    let mut indices: Vec<usize> = (0..k).collect();
    loop {
        visit(&indices);
        // Advance to the next combination.
        let mut i = k;
        loop {
            if i == 0 {
                return;
            }
            i -= 1;
            if indices[i] != i + m - k {
                break;
            }
            if i == 0 {
                return;
            }
        }
        indices[i] += 1;
        for j in i + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

fn mask_from_indices(m: usize, indices: &[usize]) -> Vec<bool> {
    let mut mask = vec![false; m];
    for &i in indices {
        mask[i] = true;
    }
    mask
}

fn complement(mask: &[bool]) -> Vec<bool> {
    mask.iter().map(|b| !b).collect()
}

/// Draw a size index from a cumulative scan over `dist`.
fn draw_index(dist: &[f64], rng: &mut Xoshiro256PlusPlus) -> usize {
    let roll: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, &p) in dist.iter().enumerate() {
        cumulative += p;
        if roll < cumulative {
            return i;
        }
    }
    dist.len() - 1
}

/// Build the coalition plan for `m` features under `n_samples` budget.
///
/// Deterministic for a given RNG state: identical seeds reproduce the exact
/// sequence of masks and weights.
pub(crate) fn sample_coalitions(
    m: usize,
    n_samples: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> CoalitionPlan {
    let mut stats = ShapStatistics::new(m, n_samples);
    let mut samples = Vec::with_capacity(n_samples + 2);

    // Reserved masks: used for fnull and the efficiency constraint only, so
    // they carry no regression weight.
    samples.push(CoalitionSample {
        mask: vec![false; m],
        weight: 0.0,
        fixed: true,
    });
    samples.push(CoalitionSample {
        mask: vec![true; m],
        weight: 0.0,
        fixed: true,
    });

    // Enumerate subset sizes from the extremes inward while they fit.
    for i in 0..stats.num_subset_sizes() {
        if !stats.can_enumerate(i) {
            break;
        }
        let size = i + 1;
        let per_subset = stats.weight_per_subset(i);
        let paired = stats.is_paired(i);
        for_each_combination(m, size, |indices| {
            let mask = mask_from_indices(m, indices);
            if paired {
                samples.push(CoalitionSample {
                    mask: complement(&mask),
                    weight: per_subset,
                    fixed: true,
                });
            }
            samples.push(CoalitionSample {
                mask,
                weight: per_subset,
                fixed: true,
            });
        });
        stats.mark_enumerated(i);
    }

    // Spend the rest of the budget on weighted random pairs. Repeated draws
    // of the same mask accumulate, keeping the design matrix free of
    // duplicate rows.
    if stats.num_full_subsets() < stats.num_subset_sizes() && stats.samples_remaining() > 0 {
        let dist = stats.residual_distribution();
        let offset = stats.num_full_subsets();

        let mut drawn: Vec<(Vec<bool>, f64)> = Vec::new();
        let mut index_of: HashMap<Vec<bool>, usize> = HashMap::new();
        let mut record = |mask: Vec<bool>, drawn: &mut Vec<(Vec<bool>, f64)>| {
            if let Some(&idx) = index_of.get(&mask) {
                drawn[idx].1 += 1.0;
            } else {
                index_of.insert(mask.clone(), drawn.len());
                drawn.push((mask, 1.0));
            }
        };

        while stats.samples_remaining() > 0 {
            let size_index = offset + draw_index(&dist, rng);
            let size = size_index + 1;
            let chosen = rand::seq::index::sample(rng, m, size).into_vec();
            let mask = mask_from_indices(m, &chosen);
            let comp = complement(&mask);
            record(mask, &mut drawn);
            stats.decrement_samples(1);

            if stats.samples_remaining() > 0 && stats.is_paired(size_index) {
                record(comp, &mut drawn);
                stats.decrement_samples(1);
            }
        }

        // Rescale so the sampled region carries exactly the kernel mass the
        // enumerated sizes left behind.
        let total: f64 = drawn.iter().map(|(_, c)| c).sum();
        let mass = stats.residual_kernel_mass();
        for (mask, count) in drawn {
            samples.push(CoalitionSample {
                mask,
                weight: mass * count / total,
                fixed: false,
            });
        }
    }

    tracing::debug!(
        m,
        n_samples,
        coalitions = samples.len() - 2,
        full_subsets = stats.num_full_subsets(),
        "coalition plan built"
    );

    CoalitionPlan { samples }
}

/// Number of non-trivial coalitions for `m` features: `2^m - 2`, saturating
/// for feature counts too large to enumerate.
pub(crate) fn coalition_count(m: usize) -> usize {
    if m >= usize::BITS as usize - 1 {
        usize::MAX
    } else {
        (1usize << m) - 2
    }
}

/// Default sample budget, capped at the number of coalitions that exist.
pub(crate) fn default_sample_budget(m: usize) -> usize {
    (2 * m + 2048).min(coalition_count(m))
}
