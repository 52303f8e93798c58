/****************************************************************
 * $ID: evaluate.rs  	Tue 13 Oct 2026 09:40:12+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

use crate::{data::{DatasetSplit, ImageBatcher}, error::{Error, Result}, model::Model};
use burn::{data::dataloader::batcher::Batcher, tensor::backend::Backend};
use std::time::Instant;

/// Probability clipping of the log-loss.
pub const LOG_LOSS_EPS: f64 = 1e-15;

/// Mean negative log-probability of the true class, each row renormalized to sum 1.
pub fn log_loss(truth: &[usize], probs: &[Vec<f32>]) -> f64 {
    let total = truth.iter().zip(probs).map(|(&label, row)| {
        let sum = row.iter().map(|&p| (p as f64).clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS))
            .sum::<f64>();
        let p = (row[label] as f64).clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS) / sum;
        -p.ln()
    }).sum::<f64>();    total / truth.len().max(1) as f64
}

pub fn argmax(row: &[f32]) -> usize {
    row.iter().enumerate().fold((0, f32::NEG_INFINITY), |best, (i, &p)|
        if best.1 < p { (i, p) } else { best }).0
}

/// Counts indexed `[predicted][true]`.
#[derive(Clone, Debug, PartialEq)] pub struct ConfusionMatrix { counts: Vec<Vec<usize>>, }

impl ConfusionMatrix {
    pub fn new(num_classes: usize, predicted: &[usize], truth: &[usize]) -> Self {
        let mut counts = vec![vec![0; num_classes]; num_classes];
        predicted.iter().zip(truth).for_each(|(&pred, &label)| counts[pred][label] += 1);
        Self { counts }
    }

    pub fn counts(&self) -> &[Vec<usize>] { &self.counts }

    /// Diagonal over the row sums, i.e. the hit rate among images predicted as each class.
    /// A class never predicted scores 0.
    pub fn per_class_accuracy(&self) -> Vec<f64> {
        self.counts.iter().enumerate().map(|(i, row)| {
            let sum = row.iter().sum::<usize>();
            if sum == 0 { 0.0 } else { row[i] as f64 / sum as f64 }
        }).collect()
    }
}

#[derive(Clone, Debug)] pub struct TestReport {
    pub loss: f64,
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<f64>,
    /// Mean of `per_class`.
    pub accuracy: f64,
    /// Images per second, predicting one image at a time.
    pub fps: f64,
}

impl TestReport {
    pub fn from_predictions(num_classes: usize, truth: &[usize],
        probs: &[Vec<f32>], secs: f64) -> Self {
        let predicted = probs.iter().map(|row| argmax(row)).collect::<Vec<_>>();
        let confusion = ConfusionMatrix::new(num_classes, &predicted, truth);
        let per_class = confusion.per_class_accuracy();
        let accuracy = per_class.iter().sum::<f64>() / per_class.len().max(1) as f64;
        let fps = if 0.0 < secs { truth.len() as f64 / secs } else { f64::INFINITY };

        Self { loss: log_loss(truth, probs), confusion, per_class, accuracy, fps }
    }

    pub fn log<'a>(&self, names: impl Iterator<Item = (usize, &'a str)>) {
        tracing::info!("===== TEST RESULTS ====");
        tracing::info!("Test loss: {:.4}", self.loss);
        tracing::info!("Test Accuracy:");
        tracing::info!("\tTotal: {:.2}%", self.accuracy * 100.0);
        for (idx, label) in names {
            tracing::info!("\t{label}: {:.2}%", self.per_class[idx] * 100.0);
        }
        tracing::info!("Test FPS: {:.2}", self.fps);
        tracing::info!("=======================");
        tracing::debug!("confusion [predicted][true]: {:?}", self.confusion.counts());
    }
}

/// Predict the test split one image per batch, timing the whole pass.
pub fn test<B: Backend>(model: &Model<B>, data: &DatasetSplit, device: &B::Device)
    -> Result<TestReport> {
    let batcher = ImageBatcher::<B>::new(device.clone(), data.shape);
    let start = Instant::now();
    let probs = data.test.items.iter().map(|item| {
        let batch = batcher.batch(vec![item.clone()]);
        model.forward_softmax(batch.images).into_data().to_vec::<f32>()
            .map_err(|err| Error::TensorData(format!("{err:?}")))
    }).collect::<Result<Vec<_>>>()?;
    let secs = start.elapsed().as_secs_f64();

    Ok(TestReport::from_predictions(data.num_classes(), &data.test.labels(), &probs, secs))
}

#[cfg(test)] mod tests {
    use super::*;

    #[test] fn log_loss_matches_reference() {
        let probs = [vec![0.9, 0.1], vec![0.2, 0.8], vec![0.4, 0.6]];
        let expected = -(0.9f64.ln() + 0.8f64.ln() + 0.4f64.ln()) / 3.0;
        assert!((log_loss(&[0, 1, 0], &probs) - expected).abs() < 1e-6);
    }

    #[test] fn log_loss_clips_and_normalizes() {
        let loss = log_loss(&[1], &[vec![1.0, 0.0]]);
        assert!((loss - -LOG_LOSS_EPS.ln()).abs() < 1e-6, "{loss}");
        let loss = log_loss(&[0], &[vec![2.0, 2.0]]);  // unnormalized rows count as ratios
        assert!((loss - 2f64.ln()).abs() < 1e-6, "{loss}");
    }

    #[test] fn confusion_rows_are_predictions() {
        let cmat = ConfusionMatrix::new(3, &[0, 0, 1, 1, 0], &[0, 1, 1, 1, 0]);
        assert_eq!(cmat.counts(), [vec![2, 1, 0], vec![0, 2, 0], vec![0, 0, 0]]);

        let acc = cmat.per_class_accuracy();
        assert!((acc[0] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(&acc[1..], [1.0, 0.0]);
    }

    #[test] fn report_from_predictions() {
        let probs = [vec![0.7, 0.3], vec![0.4, 0.6], vec![0.6, 0.4], vec![0.1, 0.9]];
        let report = TestReport::from_predictions(2, &[0, 1, 1, 1], &probs, 2.0);
        assert_eq!(report.per_class, [0.5, 1.0]);
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.fps, 2.0);
    }

    #[test] fn argmax_first_max() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5, 0.1]), 1);
        assert_eq!(argmax(&[1.0]), 0);
    }
}
