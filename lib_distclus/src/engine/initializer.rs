//! Seeding strategies for the first `k` centroids.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::factory::InitializerKind;
use super::{nearest, Elemt, EngineError, Space};

/// Picks `k` initial centroids from `data`.
///
/// `Given` takes the first `k` elements as they were pushed, `Random` samples
/// `k` distinct elements, `KMeansPP` samples with probability proportional to
/// the squared distance to the centroids chosen so far.
pub fn initialize(
    kind: InitializerKind,
    k: usize,
    data: &[Elemt],
    space: &dyn Space,
    seed: u64,
) -> Result<Vec<Elemt>, EngineError> {
    if data.len() < k {
        return Err(EngineError::NotEnoughData { needed: k, available: data.len() });
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let centroids = match kind {
        InitializerKind::Given => data[..k].to_vec(),
        InitializerKind::Random => rand::seq::index::sample(&mut rng, data.len(), k)
            .into_iter()
            .map(|i| data[i].clone())
            .collect(),
        InitializerKind::KMeansPP => kmeans_pp(k, data, space, &mut rng),
    };
    Ok(centroids)
}

fn kmeans_pp(k: usize, data: &[Elemt], space: &dyn Space, rng: &mut StdRng) -> Vec<Elemt> {
    let mut centroids: Vec<Elemt> = Vec::with_capacity(k);
    let mut chosen = vec![false; data.len()];

    let first = rng.random_range(0..data.len());
    chosen[first] = true;
    centroids.push(data[first].clone());

    while centroids.len() < k {
        let weights: Vec<f64> = data
            .iter()
            .map(|e| nearest(space, &centroids, e).map_or(0.0, |(_, d)| d * d))
            .collect();
        let total: f64 = weights.iter().sum();

        let pick = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut pick = weights.iter().rposition(|w| *w > 0.0).unwrap_or(0);
            for (i, w) in weights.iter().enumerate() {
                if *w > 0.0 && target < *w {
                    pick = i;
                    break;
                }
                target -= w;
            }
            pick
        } else {
            // every element sits on a centroid already
            let free: Vec<usize> = (0..data.len()).filter(|i| !chosen[*i]).collect();
            free[rng.random_range(0..free.len())]
        };

        chosen[pick] = true;
        centroids.push(data[pick].clone());
    }
    centroids
}
