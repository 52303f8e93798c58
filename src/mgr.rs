/****************************************************************
 * $ID: mgr.rs  	Wed 14 Oct 2026 09:12:45+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

use crate::{error::{Error, Result}, evaluate::{self, TestReport}, plot,
    data::{load_data, DatasetConfig, DatasetSplit},
    model::{Model, ModelConfig},
    training::{fit, History, Hyperparameters},
};
use burn::{config::Config, module::{AutodiffModule, Module}, tensor::backend::AutodiffBackend,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use std::path::{Path, PathBuf};

pub const MODEL_PATH: &str = "./trained_model";
pub const RESULT_PATH: &str = "./result.svg";
pub const HISTORY_PATH: &str = "./history.json";

/// Full precision so a reloaded model predicts exactly like the saved one.
pub type ModelRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Drop the recorder's own `.mpk.gz` suffix, it is appended again on save/load.
pub fn checkpoint_stem(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    path.to_str().and_then(|name| name.strip_suffix(".mpk.gz"))
        .map_or_else(|| path.to_path_buf(), PathBuf::from)
}

/// Where the model config sits beside a checkpoint.
pub fn config_path(path: impl AsRef<Path>) -> PathBuf {
    checkpoint_stem(path).with_extension("json")
}

/// Owns the dataset, the model and its history across a train/test run.
pub struct ModelMgr<B: AutodiffBackend> {
    dataset: DatasetConfig,
    data: DatasetSplit,
    device: B::Device,
    model: Option<(ModelConfig, Model<B>)>,
    history: Option<History>,
    hypers: Hyperparameters,
}

impl<B: AutodiffBackend> ModelMgr<B> {
    pub fn new(dataset: DatasetConfig, device: B::Device) -> Result<Self> {
        tracing::info!("load dataset");
        let data = load_data(&dataset)?;
        Ok(Self { dataset, data, device, model: None, history: None,
            hypers: Hyperparameters::new() })
    }

    pub fn with_hyperparameters(mut self, hypers: Hyperparameters) -> Self {
        self.hypers = hypers;   self
    }

    pub fn data(&self) -> &DatasetSplit { &self.data }
    pub fn history(&self) -> Option<&History> { self.history.as_ref() }
    pub fn model(&self) -> Option<&Model<B>> { self.model.as_ref().map(|(_, model)| model) }

    pub fn get_hyperparameter(&self) -> Hyperparameters { self.hypers.clone() }

    pub fn get_model(&self) -> (ModelConfig, Model<B>) {
        let config = ModelConfig::new(self.data.num_classes(), self.data.shape);
        let model = config.init::<B>(&self.device);     (config, model)
    }

    pub fn train(&mut self) {
        tracing::info!("train model");
        let hypers = self.get_hyperparameter();
        B::seed(hypers.seed);

        let (config, model) = self.get_model();
        tracing::info!("model summary :\n{}", config.summary());
        tracing::info!("Total params: {}", model.num_params());
        hypers.log();
        let hypers = hypers.capped();

        let valid = match &self.data.valid {
            Some(valid) if self.dataset.use_validation => valid,
            _ => &self.data.test,
        };
        let (model, epochs) = fit(model, &hypers, &self.data.train, valid,
            self.data.shape, &self.device);

        self.history = Some(History { epochs, hypers, test_acc: None });
        self.model = Some((config, model));
    }

    /// Test the given model, or the one trained/loaded last; records `test_acc` in the history.
    pub fn test(&mut self, model: Option<&Model<B>>) -> Result<f64> {
        tracing::info!("test model");
        let model = model.or(self.model()).ok_or(Error::NoModel("test"))?;
        let report: TestReport = evaluate::test(&model.valid(), &self.data, &self.device)?;
        report.log(self.data.n2c());

        if let Some(history) = &mut self.history { history.test_acc = Some(report.accuracy); }
        Ok(report.accuracy)
    }

    pub fn save_model(&self, model_path: impl AsRef<Path>) -> Result<()> {
        let path = checkpoint_stem(model_path);
        tracing::info!("save model : {:?}", path.display().to_string());
        let (config, model) = self.model.as_ref().ok_or(Error::NoModel("save"))?;

        if let Some(dir) = path.parent() { std::fs::create_dir_all(dir)?; }
        config.save(config_path(&path))?;
        model.clone().save_file(path.clone(), &ModelRecorder::new())?;   Ok(())
    }

    pub fn load_model(&mut self, model_path: impl AsRef<Path>) -> Result<()> {
        let path = checkpoint_stem(model_path);
        tracing::info!("load model : {:?}", path.display().to_string());

        let config = ModelConfig::load(config_path(&path))?;
        let record = ModelRecorder::new().load(path, &self.device)?;
        let model = config.init::<B>(&self.device).load_record(record);
        self.model = Some((config, model));     Ok(())
    }

    pub fn draw_history(&self, file_path: impl AsRef<Path>) -> Result<()> {
        let path = file_path.as_ref();
        tracing::info!("visualize results : {:?}", path.display().to_string());
        let history = self.history.as_ref().ok_or(Error::NoHistory)?;
        plot::draw_result(history, self.dataset.use_validation, path)
    }

    pub fn save_history(&self, file_path: impl AsRef<Path>) -> Result<()> {
        self.history.as_ref().ok_or(Error::NoHistory)?.save(file_path)
    }
}
