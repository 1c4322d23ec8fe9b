//! Synthetic data generation: materializing coalition masks into inputs
//!
//! Each coalition mask is crossed with every background row: feature i keeps
//! the instance's value when the mask includes it, otherwise it takes the
//! value from the background row. Names and kinds are preserved; only values
//! are swapped. The kernel weight stays attached to the mask; model outputs
//! for one mask are averaged over its background rows downstream.

use crate::features::PredictionInput;

use super::sampler::CoalitionSample;

/// Materialize every (mask x background row) combination, in plan order.
pub(crate) fn generate_samples(
    instance: &PredictionInput,
    background: &[PredictionInput],
    coalitions: &[CoalitionSample],
) -> Vec<PredictionInput> {
    let mut samples = Vec::with_capacity(coalitions.len() * background.len());

    for coalition in coalitions {
        for row in background {
            let features = instance
                .features
                .iter()
                .zip(row.features.iter())
                .zip(coalition.mask.iter())
                .map(|((own, bg), &keep)| {
                    if keep {
                        own.clone()
                    } else {
                        own.with_value(bg.value().clone())
                    }
                })
                .collect();
            samples.push(PredictionInput::new(features));
        }
    }

    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    fn input(values: &[f64]) -> PredictionInput {
        PredictionInput::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| Feature::number(format!("f{i}"), v))
                .collect(),
        )
    }

    fn coalition(mask: &[bool]) -> CoalitionSample {
        CoalitionSample {
            mask: mask.to_vec(),
            weight: 0.5,
            fixed: false,
        }
    }

    #[test]
    fn test_mask_selects_instance_or_background() {
        let instance = input(&[1.0, 2.0, 3.0]);
        let background = vec![input(&[10.0, 20.0, 30.0])];
        let plan = vec![coalition(&[true, false, true])];

        let samples = generate_samples(&instance, &background, &plan);
        assert_eq!(samples.len(), 1);
        let values: Vec<f64> = samples[0]
            .features
            .iter()
            .map(|f| f.value().as_number().unwrap())
            .collect();
        assert_eq!(values, vec![1.0, 20.0, 3.0]);
    }

    #[test]
    fn test_plan_order_crossed_with_rows() {
        let instance = input(&[1.0, 2.0]);
        let background = vec![input(&[0.0, 0.0]), input(&[5.0, 5.0])];
        let plan = vec![coalition(&[true, false]), coalition(&[false, true])];

        let samples = generate_samples(&instance, &background, &plan);
        assert_eq!(samples.len(), 4);
        // Mask 0, row 0: feature 0 from the instance, feature 1 from row 0.
        let first: Vec<f64> = samples[0]
            .features
            .iter()
            .map(|f| f.value().as_number().unwrap())
            .collect();
        assert_eq!(first, vec![1.0, 0.0]);
        // Mask 1, row 1: feature 0 from row 1, feature 1 from the instance.
        let last: Vec<f64> = samples[3]
            .features
            .iter()
            .map(|f| f.value().as_number().unwrap())
            .collect();
        assert_eq!(last, vec![5.0, 2.0]);
    }

    #[test]
    fn test_names_preserved() {
        let instance = input(&[1.0, 2.0]);
        let background = vec![input(&[9.0, 9.0])];
        let plan = vec![coalition(&[false, false])];

        let samples = generate_samples(&instance, &background, &plan);
        let names: Vec<&str> = samples[0].features.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["f0", "f1"]);
    }
}
