/****************************************************************
 * $ID: error.rs  	Mon 12 Oct 2026 10:02:41+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)] pub enum Error {
    #[error("{}: {source}", path.display())]
    File { path: PathBuf, #[source] source: std::io::Error },

    #[error("{}: {len} bytes is not a whole number of {record_len}-byte records",
        path.display())]
    Truncated { path: PathBuf, len: usize, record_len: usize },

    #[error("{}: record {index} has label {label}, expected < {num_labels}", path.display())]
    Label { path: PathBuf, index: usize, label: usize, num_labels: usize },

    #[error("no training batch found under {}", .0.display())]
    NoTrainData(PathBuf),

    #[error("{0} split is empty")]  EmptySplit(&'static str),

    #[error("invalid target classes {classes:?}: {reason}")]
    Targets { classes: Vec<usize>, reason: &'static str },

    #[error("tensor data: {0}")]  TensorData(String),
    #[error("no model to {0}, train or load one first")]  NoModel(&'static str),
    #[error("no training history, train a model first")]  NoHistory,

    #[error(transparent)]   Io(#[from] std::io::Error),
    #[error(transparent)] Json(#[from] serde_json::Error),
    #[error(transparent)] Config(#[from] burn::config::ConfigError),
    #[error(transparent)] Record(#[from] burn::record::RecorderError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn file(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();     move |source| Self::File { path, source }
    }
}
