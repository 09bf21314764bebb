//! Logit post-processing and the autoregressive decode loop.

use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

/// Number of highest-probability tokens considered when sampling.
pub const TOP_K: usize = 50;

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Sample a token index from `logits` after temperature scaling, restricted to
/// the `top_k` highest logits.
pub fn sample_top_k(
    logits: &[f32],
    temperature: f32,
    top_k: usize,
    rng: &mut impl Rng,
) -> anyhow::Result<usize> {
    anyhow::ensure!(!logits.is_empty(), "empty logits");
    anyhow::ensure!(temperature > 0.0, "temperature must be positive");

    let mut candidates: Vec<usize> = (0..logits.len()).collect();
    candidates.sort_unstable_by(|&a, &b| logits[b].total_cmp(&logits[a]));
    candidates.truncate(top_k.max(1));

    let scaled: Vec<f32> = candidates.iter().map(|&i| logits[i] / temperature).collect();
    let weights = softmax(&scaled);
    let dist = WeightedIndex::new(&weights)?;
    Ok(candidates[dist.sample(rng)])
}

/// Token-level settings for [`extend_batch`].
#[derive(Debug, Clone, Copy)]
pub struct DecodeLimits {
    /// Total sequence length cap, prompt included.
    pub max_total: usize,
    pub eos: i64,
    /// Appended to rows that already emitted `eos`.
    pub pad: i64,
    pub temperature: f32,
}

/// Grow `rows` copies of `prompt` one token at a time until every row has
/// emitted `eos` or the length cap is reached.
///
/// `next_logits` receives the whole batch (rows always share a length) and
/// returns the final-position logits for each row. A prompt already at or
/// past the cap is returned unchanged without calling it.
pub fn extend_batch<R, F>(
    prompt: &[i64],
    rows: usize,
    limits: DecodeLimits,
    rng: &mut R,
    mut next_logits: F,
) -> anyhow::Result<Vec<Vec<i64>>>
where
    R: Rng,
    F: FnMut(&[Vec<i64>]) -> anyhow::Result<Vec<Vec<f32>>>,
{
    let rows = rows.max(1);
    let mut sequences = vec![prompt.to_vec(); rows];
    let mut finished = vec![false; rows];

    while sequences[0].len() < limits.max_total && !finished.iter().all(|&done| done) {
        let logits = next_logits(&sequences)?;
        anyhow::ensure!(
            logits.len() == rows,
            "logits for {} rows, expected {rows}",
            logits.len()
        );
        for (row, row_logits) in logits.iter().enumerate() {
            let next = if finished[row] {
                limits.pad
            } else {
                sample_top_k(row_logits, limits.temperature, TOP_K, rng)? as i64
            };
            if next == limits.eos {
                finished[row] = true;
            }
            sequences[row].push(next);
        }
    }
    Ok(sequences)
}
