/****************************************************************
 * $ID: training.rs  	Mon 12 Oct 2026 14:21:50+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

use crate::{data::{ImageBatch, ImageBatcher, Split}, error::{Error, Result}, model::Model};
use burn::{config::Config, module::AutodiffModule, nn::loss::CrossEntropyLossConfig,
    optim::{AdaGradConfig, AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig},
    tensor::{backend::{AutodiffBackend, Backend}, ElementConversion},
    data::dataloader::DataLoaderBuilder,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const MAX_EPOCHS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind { Sgd, RmsProp, AdaGrad, Adam, }

impl OptimizerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sgd => "SGD", Self::RmsProp => "RMSprop",
            Self::AdaGrad => "Adagrad", Self::Adam => "Adam",
        }
    }
}

impl std::str::FromStr for OptimizerKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "sgd" => Self::Sgd, "rmsprop" => Self::RmsProp,
            "adagrad" => Self::AdaGrad, "adam" => Self::Adam,
            _ => return Err(format!("unknown optimizer: {s}")),
        })
    }
}

#[derive(Config, Debug, PartialEq)] pub struct Hyperparameters {
    #[config(default = 28)]   pub batch_size: usize,
    /// Never trains for more than [`MAX_EPOCHS`].
    #[config(default = 20)]   pub epochs: usize,
    #[config(default = 0.01)] pub learning_rate: f64,
    #[config(default = "OptimizerKind::AdaGrad")] pub optimizer: OptimizerKind,
    #[config(default = 0)]    pub seed: u64,
}

impl Hyperparameters {
    pub fn capped(mut self) -> Self {
        if MAX_EPOCHS < self.epochs {
            tracing::warn!("epochs {} capped to {MAX_EPOCHS}", self.epochs);
            self.epochs = MAX_EPOCHS;
        }   self
    }

    pub fn log(&self) {
        tracing::info!("hyperparameters :");
        tracing::info!("\tbatch size : {}", self.batch_size);
        tracing::info!("\tepochs : {}", self.epochs);
        tracing::info!("\toptimizer : {}", self.optimizer.name());
        tracing::info!("\tlearning rate : {}", self.learning_rate);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)] pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f64,
    pub  acc: f64,
    pub val_loss: f64,
    pub  val_acc: f64,
    pub secs: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)] pub struct History {
    pub epochs: Vec<EpochMetrics>,
    pub hypers: Hyperparameters,
    /// Mean per-class test accuracy, once tested.
    pub test_acc: Option<f64>,
}

impl History {
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(Error::file(path))
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(Error::file(path))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Running sums of a pass, averaged per sample.
#[derive(Default)] struct Tally { loss: f64, correct: usize, count: usize, }

impl Tally {
    fn add<B: Backend>(&mut self, model: &Model<B>, batch: ImageBatch<B>) -> burn::tensor::Tensor<B, 1> {
        let count = batch.targets.dims()[0];
        let output = model.forward(batch.images);
        let loss = CrossEntropyLossConfig::new().init(&output.device())
            .forward(output.clone(), batch.targets.clone());

        let correct: i64 = output.argmax(1).flatten::<1>(0, 1)
            .equal(batch.targets).int().sum().into_scalar().elem();
        self.loss += loss.clone().into_scalar().elem::<f64>() * count as f64;
        self.correct += correct as usize;   self.count += count;    loss
    }

    fn mean(&self) -> (f64, f64) {
        let count = self.count.max(1) as f64;
        (self.loss / count, self.correct as f64 / count)
    }
}

/// Loss and accuracy of `model` over `split`, no gradients tracked.
pub fn evaluate_loss<B: Backend>(model: &Model<B>, split: &Split, shape: [usize; 3],
    batch_size: usize, device: &B::Device) -> (f64, f64) {
    let loader = DataLoaderBuilder::new(ImageBatcher::<B>::new(device.clone(), shape))
        .batch_size(batch_size).build(split.clone());

    let mut tally = Tally::default();
    for batch in loader.iter() { tally.add(model, batch); }     tally.mean()
}

/// Fit without shuffling, one log line per epoch, returns the model and its history.
pub fn fit<B: AutodiffBackend>(model: Model<B>, hypers: &Hyperparameters, train: &Split,
    valid: &Split, shape: [usize; 3], device: &B::Device) -> (Model<B>, Vec<EpochMetrics>) {
    match hypers.optimizer {
        OptimizerKind::Sgd => fit_with(model, SgdConfig::new().init(),
            hypers, train, valid, shape, device),
        OptimizerKind::RmsProp => fit_with(model, RmsPropConfig::new()
            .with_alpha(0.9).with_epsilon(1e-7).init(), hypers, train, valid, shape, device),
        OptimizerKind::AdaGrad => fit_with(model, AdaGradConfig::new()
            .with_epsilon(1e-7).init(), hypers, train, valid, shape, device),
        OptimizerKind::Adam => fit_with(model, AdamConfig::new()
            .with_epsilon(1e-7).init(), hypers, train, valid, shape, device),
    }
}

fn fit_with<B, O>(mut model: Model<B>, mut optim: O, hypers: &Hyperparameters,
    train: &Split, valid: &Split, shape: [usize; 3], device: &B::Device)
    -> (Model<B>, Vec<EpochMetrics>) where B: AutodiffBackend, O: Optimizer<Model<B>, B> {
    let loader = DataLoaderBuilder::new(ImageBatcher::<B>::new(device.clone(), shape))
        .batch_size(hypers.batch_size).build(train.clone());

    let mut history = Vec::with_capacity(hypers.epochs);
    for epoch in 1..=hypers.epochs {
        let start = Instant::now();
        let mut tally = Tally::default();

        for batch in loader.iter() {
            let loss = tally.add(&model, batch);
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(hypers.learning_rate, model, grads);
        }

        let (loss, acc) = tally.mean();
        let (val_loss, val_acc) = evaluate_loss(&model.valid(), valid, shape,
            hypers.batch_size, device);
        let secs = start.elapsed().as_secs_f64();

        tracing::info!("Epoch {epoch}/{} - {secs:.1}s - loss: {loss:.4} - acc: {acc:.4} \
            - val_loss: {val_loss:.4} - val_acc: {val_acc:.4}", hypers.epochs);
        history.push(EpochMetrics { epoch, loss, acc, val_loss, val_acc, secs });
    }   (model, history)
}

#[cfg(test)] mod tests {
    use super::*;

    #[test] fn default_hyperparameters() {
        let hypers = Hyperparameters::new();
        assert_eq!((hypers.batch_size, hypers.epochs), (28, 20));
        assert_eq!(hypers.learning_rate, 0.01);
        assert_eq!(hypers.optimizer, OptimizerKind::AdaGrad);
        assert_eq!(hypers.optimizer.name(), "Adagrad");
    }

    #[test] fn epochs_capped() {
        assert_eq!(Hyperparameters::new().with_epochs(50).capped().epochs, MAX_EPOCHS);
        assert_eq!(Hyperparameters::new().with_epochs(3).capped().epochs, 3);
    }

    #[test] fn optimizer_from_str() {
        assert_eq!("RMSprop".parse::<OptimizerKind>(), Ok(OptimizerKind::RmsProp));
        assert_eq!("sgd".parse::<OptimizerKind>(), Ok(OptimizerKind::Sgd));
        assert!("lbfgs".parse::<OptimizerKind>().is_err());
    }

    #[test] fn history_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let history = History { hypers: Hyperparameters::new().with_seed(7),
            epochs: vec![ EpochMetrics { epoch: 1, loss: 0.7, acc: 0.5,
                val_loss: 0.69, val_acc: 0.55, secs: 1.0 } ], test_acc: Some(0.5), };

        history.save(&path).unwrap();
        let loaded = History::load(&path).unwrap();
        assert_eq!(loaded.epochs, history.epochs);
        assert_eq!((loaded.hypers.seed, loaded.test_acc), (7, Some(0.5)));
    }
}
