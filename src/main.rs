
use clap::Parser;
use clsburn::{data::DatasetConfig, mgr::{self, ModelMgr}, training::{Hyperparameters, OptimizerKind}};
use burn::{backend::{wgpu::WgpuDevice, Autodiff, Wgpu}, config::Config};
use std::path::PathBuf;

type Backend = Autodiff<Wgpu>;  // Autodiff<NdArray<f32>>; Autodiff<LibTorch<f32>>;

/// Train a CNN on CIFAR-10 target classes, then test, plot and save it
#[derive(Parser, Debug)] #[command(about, version = concat!(env!("CARGO_PKG_VERSION"),
    " (", env!("BUILD_GIT_HASH"), " ", env!("BUILD_TIMESTAMP"), ")"))]
struct Cli {
    /// Only load and test this trained checkpoint, no training
    #[arg(long)] load: Option<PathBuf>,

    /// Directory of the CIFAR-10 binary batches
    #[arg(long, default_value = "data/cifar-10-batches-bin")] data_dir: String,

    /// Dataset labels to classify
    #[arg(long, value_delimiter = ',', default_values_t = [3, 5])] classes: Vec<usize>,

    /// Validate on the test split instead of holding out part of the training data
    #[arg(long)] no_validation: bool,

    /// Hyperparameters JSON, the built-in defaults otherwise
    #[arg(long)] hypers: Option<PathBuf>,

    /// Override the optimizer: sgd, rmsprop, adagrad or adam
    #[arg(long)] optimizer: Option<OptimizerKind>,

    /// Checkpoint to write after training (overwritten)
    #[arg(long, default_value = mgr::MODEL_PATH)] model: PathBuf,

    /// Training curves image
    #[arg(long, default_value = mgr::RESULT_PATH)] result: PathBuf,

    #[arg(short, long)] verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_target(false).compact().with_max_level(
        if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO }).init();

    let dataset = DatasetConfig::new().with_data_dir(cli.data_dir)
        .with_target_class(cli.classes).with_use_validation(!cli.no_validation);
    let mut hypers = cli.hypers.map_or_else(|| Ok(Hyperparameters::new()), Hyperparameters::load)?;
    if let Some(optimizer) = cli.optimizer { hypers = hypers.with_optimizer(optimizer); }
    let mut model_mgr = ModelMgr::<Backend>::new(dataset, WgpuDevice::default())?
        .with_hyperparameters(hypers);

    if let Some(trained_model) = cli.load {
        model_mgr.load_model(trained_model)?;
        model_mgr.test(None)?;
    } else {
        model_mgr.train();
        model_mgr.save_model(&cli.model)?;    // overwrites any same-named checkpoint
        model_mgr.test(None)?;
        model_mgr.draw_history(&cli.result)?;
        model_mgr.save_history(mgr::HISTORY_PATH)?;
    }   Ok(())
}
