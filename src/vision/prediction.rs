//! Turning raw model output into a labelled prediction.

use anyhow::{Result, bail};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassScore {
    pub label: String,
    /// Probability scaled to [0, 100], two decimals
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<ClassScore>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Softmax outputs can be used as is, anything else (logits) gets
/// normalized first.
fn is_distribution(scores: &[f64]) -> bool {
    scores.iter().all(|s| (0.0..=1.0).contains(s)) && (scores.iter().sum::<f64>() - 1.0).abs() < 1e-3
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

impl Prediction {
    pub fn from_scores(classes: &[String], scores: &[f32]) -> Result<Self> {
        if scores.len() != classes.len() {
            bail!(
                "Model returned {} scores but {} classes are configured",
                scores.len(),
                classes.len()
            );
        }
        if scores.is_empty() {
            bail!("Model returned no scores");
        }
        if scores.iter().any(|s| !s.is_finite()) {
            bail!("Model returned non-finite scores: {:?}", scores);
        }

        let scores: Vec<f64> = scores.iter().map(|s| f64::from(*s)).collect();
        let probs = if is_distribution(&scores) {
            scores
        } else {
            softmax(&scores)
        };
        let best = argmax(&probs);

        let probabilities = classes
            .iter()
            .zip(probs.iter())
            .map(|(label, p)| ClassScore {
                label: label.clone(),
                percent: round2((p * 100.0).clamp(0.0, 100.0)),
            })
            .collect();

        Ok(Self {
            label: classes[best].clone(),
            confidence: round2((probs[best] * 100.0).clamp(0.0, 100.0)),
            probabilities,
        })
    }
}
