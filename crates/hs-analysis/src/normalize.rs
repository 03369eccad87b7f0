use hs_types::{NormalizationError, RewardTrajectory};

/// Map rewards onto the anchor scale, `(r - p5) / (p95 - p5)`.
pub fn normalize(rewards: &[f64], p5: f64, p95: f64) -> Result<Vec<f64>, NormalizationError> {
    if !(p5.is_finite() && p95.is_finite() && p95 > p5) {
        return Err(NormalizationError::DegenerateAnchor { p5, p95 });
    }
    let range = p95 - p5;
    Ok(rewards.iter().map(|r| (r - p5) / range).collect())
}

/// Shortest non-empty run among `runs`; `None` when every run is empty.
pub fn common_length<'a, I>(runs: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a RewardTrajectory>,
{
    runs.into_iter().map(|r| r.len()).filter(|l| *l > 0).min()
}

/// Cut every run to `len` rewards, shorter runs are kept whole.
pub fn truncate<'a>(runs: &'a [RewardTrajectory], len: usize) -> Vec<&'a [f64]> {
    runs.iter().map(|r| r.head(len)).collect()
}

/// Elementwise mean over runs after cutting them to their own common length.
pub fn mean_trajectory(runs: &[RewardTrajectory]) -> Option<Vec<f64>> {
    let len = common_length(runs)?;
    let used: Vec<&[f64]> = truncate(runs, len)
        .into_iter()
        .filter(|r| r.len() == len)
        .collect();

    let count = used.len() as f64;
    let mut mean = vec![0.0; len];
    for run in &used {
        for (acc, r) in mean.iter_mut().zip(run.iter()) {
            *acc += r;
        }
    }
    mean.iter_mut().for_each(|v| *v /= count);
    Some(mean)
}
