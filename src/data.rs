/****************************************************************
 * $ID: data.rs  	Mon 12 Oct 2026 10:15:07+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

//  https://www.cs.toronto.edu/~kriz/cifar.html, binary version

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use burn::{config::Config, tensor::{backend::Backend, Int, Tensor, TensorData},
    data::{dataloader::batcher::Batcher, dataset::Dataset},
};

/// Channel-first shape of every CIFAR image, `[channels, height, width]`.
pub const IMAGE_SHAPE: [usize; 3] = [3, 32, 32];
/// One label byte followed by the R, G and B planes, each 32x32 row-major.
pub const RECORD_LEN: usize = 1 + 3 * 32 * 32;

pub const TRAIN_FILES: [&str; 5] = [ "data_batch_1.bin", "data_batch_2.bin",
    "data_batch_3.bin", "data_batch_4.bin", "data_batch_5.bin", ];
pub const TEST_FILE: &str = "test_batch.bin";
pub const META_FILE: &str = "batches.meta.txt";

pub const CIFAR10_CLASSES: [&str; 10] = [ "airplane", "automobile", "bird", "cat", "deer",
    "dog", "frog", "horse", "ship", "truck", ];

#[derive(Config, Debug)] pub struct DatasetConfig {
    #[config(default = "String::from(\"data/cifar-10-batches-bin\")")] pub data_dir: String,
    /// Raw dataset labels to classify, their order defines the model's class indices.
    #[config(default = "vec![3, 5]")] pub target_class: Vec<usize>,
    #[config(default = true)] pub use_validation: bool,
    /// Tail of the filtered training records held out for validation.
    #[config(default = 0.1)] pub validation_fraction: f64,
}

/// A raw image with its label remapped to the position in the target-class list.
#[derive(Clone, Debug, PartialEq)] pub struct ImageItem {
    pub image: Vec<u8>,
    pub label: usize,
}

#[derive(Clone, Debug, Default)] pub struct Split { pub items: Vec<ImageItem>, }

impl Split {
    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn labels(&self) -> Vec<usize> { self.items.iter().map(|item| item.label).collect() }
}

impl Dataset<ImageItem> for Split {
    fn get(&self, index: usize) -> Option<ImageItem> { self.items.get(index).cloned() }
    fn len(&self) -> usize { self.items.len() }
}

#[derive(Clone, Debug)] pub struct DatasetSplit {
    pub train: Split,
    pub valid: Option<Split>,
    pub  test: Split,
    pub shape: [usize; 3],
    /// Display names of the target classes, indexed by model class.
    pub class_names: Vec<String>,
}

impl DatasetSplit {
    pub fn num_classes(&self) -> usize { self.class_names.len() }

    /// Model class index to display name.
    pub fn n2c(&self) -> impl Iterator<Item = (usize, &str)> {
        self.class_names.iter().map(String::as_str).enumerate()
    }
}

fn check_targets(targets: &[usize], num_labels: usize) -> Result<()> {
    let reason = if targets.is_empty() { Some("empty") } else
        if targets.iter().any(|&class| num_labels <= class) { Some("label out of range") } else
        if targets.iter().enumerate().any(|(i, class)| targets[..i].contains(class)) {
            Some("duplicated label") } else { None };

    reason.map_or(Ok(()), |reason|
        Err(Error::Targets { classes: targets.to_vec(), reason }))
}

/// Parse one CIFAR-10 binary batch, keeping only records of `targets`.
pub fn read_batch(path: &Path, targets: &[usize]) -> Result<Vec<ImageItem>> {
    let bytes = std::fs::read(path).map_err(Error::file(path))?;
    if bytes.len() % RECORD_LEN != 0 { return Err(Error::Truncated {
        path: path.into(), len: bytes.len(), record_len: RECORD_LEN }) }

    let mut items = Vec::new();
    for (index, record) in bytes.chunks_exact(RECORD_LEN).enumerate() {
        let label = record[0] as usize;
        if CIFAR10_CLASSES.len() <= label { return Err(Error::Label { path: path.into(),
            index, label, num_labels: CIFAR10_CLASSES.len() }) }

        if let Some(label) = targets.iter().position(|&class| class == label) {
            items.push(ImageItem { image: record[1..].to_vec(), label });
        }
    }   Ok(items)
}

/// Class names from `batches.meta.txt`, falling back to the well-known CIFAR-10 ones.
pub fn read_class_names(data_dir: &Path) -> Result<Vec<String>> {
    let path = data_dir.join(META_FILE);
    if !path.exists() { return Ok(CIFAR10_CLASSES.iter().map(|&name| name.into()).collect()) }

    let names = std::fs::read_to_string(&path).map_err(Error::file(&path))?
        .lines().map(str::trim).filter(|line| !line.is_empty()).map(String::from).collect();
    Ok(names)
}

pub fn load_data(config: &DatasetConfig) -> Result<DatasetSplit> {
    let data_dir = PathBuf::from(&config.data_dir);
    let mut names = read_class_names(&data_dir)?;
    if names.len() < CIFAR10_CLASSES.len() {   // a short meta file can't name every label
        names.extend(CIFAR10_CLASSES[names.len()..].iter().map(|&name| name.into()));
    }
    check_targets(&config.target_class, CIFAR10_CLASSES.len())?;

    let mut train = Vec::new();     let mut found = false;
    for file in TRAIN_FILES {
        let path = data_dir.join(file);
        if !path.exists() { tracing::debug!("skip missing {}", path.display()); continue }
        train.extend(read_batch(&path, &config.target_class)?);     found = true;
    }
    if !found { return Err(Error::NoTrainData(data_dir)) }
    let test = read_batch(&data_dir.join(TEST_FILE), &config.target_class)?;

    let valid = config.use_validation.then(|| {
        let count = (train.len() as f64 * config.validation_fraction.clamp(0.0, 1.0))
            .round() as usize;
        Split { items: train.split_off(train.len() - count) }
    });
    if valid.as_ref().is_some_and(Split::is_empty) { return Err(Error::EmptySplit("validation")) }

    let class_names = config.target_class.iter().map(|&class| names[class].clone()).collect();
    let split = DatasetSplit { train: Split { items: train }, valid,
        test: Split { items: test }, shape: IMAGE_SHAPE, class_names, };

    tracing::info!("train: {}, valid: {}, test: {}, classes: {:?}", split.train.len(),
        split.valid.as_ref().map_or(0, Split::len), split.test.len(), split.class_names);
    Ok(split)
}

#[derive(Clone, Debug)] pub struct ImageBatcher<B: Backend> {
    device: B::Device,
    shape: [usize; 3],
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: [usize; 3]) -> Self { Self { device, shape } }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let [channels, height, width] = self.shape;
        let pixels = items.iter().flat_map(|item|
            item.image.iter().map(|&pixel| pixel as f32)).collect::<Vec<_>>();

        // scale into [0,1] only, no mean/std normalization
        let images = Tensor::<B, 4>::from_data(TensorData::new(pixels,
            [items.len(), channels, height, width]), &self.device) / 255;

        let targets = items.iter().map(|item| item.label as i64).collect::<Vec<_>>();
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets, [items.len()]), &self.device);

        ImageBatch { images, targets }
    }
}

#[derive(Clone, Debug)] pub struct ImageBatch<B: Backend> {
    pub  images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

#[cfg(test)] pub(crate) mod fixture {
    use super::{RECORD_LEN, TEST_FILE, TRAIN_FILES};
    use std::path::Path;

    /// Image bytes are `fill` everywhere, varied per plane so channels differ.
    pub fn record(label: u8, fill: u8) -> Vec<u8> {
        let mut record = Vec::with_capacity(RECORD_LEN);   record.push(label);
        for plane in 0..3u8 { record.extend(std::iter::repeat(fill.wrapping_add(plane))
            .take((RECORD_LEN - 1) / 3)); }     record
    }

    pub fn write_batch(path: &Path, records: &[(u8, u8)]) {
        let bytes = records.iter().flat_map(|&(label, fill)| record(label, fill))
            .collect::<Vec<_>>();
        std::fs::write(path, bytes).unwrap();
    }

    /// Cats bright, dogs dark, other labels in between.
    pub fn write_cifar(dir: &Path, train: usize, test: usize) {
        let records = |count: usize| (0..count).map(|i| match i % 3 {
            0 => (3, 220 - (i % 16) as u8),
            1 => (5,  20 + (i % 16) as u8),
            _ => (0, 128),
        }).collect::<Vec<_>>();

        write_batch(&dir.join(TRAIN_FILES[0]), &records(train));
        write_batch(&dir.join(TEST_FILE), &records(test));
    }
}

#[cfg(test)] mod tests {
    use super::{*, fixture::*};
    use burn::backend::NdArray;

    fn config(dir: &Path) -> DatasetConfig {
        DatasetConfig::new().with_data_dir(dir.to_string_lossy().into())
    }

    #[test] fn read_batch_filters_and_remaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.bin");
        write_batch(&path, &[(5, 1), (0, 2), (3, 3), (5, 4)]);

        let items = read_batch(&path, &[3, 5]).unwrap();
        assert_eq!(items.iter().map(|item| item.label).collect::<Vec<_>>(), [1, 0, 1]);
        assert_eq!(items[1].image.len(), RECORD_LEN - 1);
        assert_eq!((items[1].image[0], items[1].image[1024], items[1].image[2048]), (3, 4, 5));
    }

    #[test] fn read_batch_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.bin");

        std::fs::write(&path, vec![0u8; RECORD_LEN + 7]).unwrap();
        assert!(matches!(read_batch(&path, &[0]), Err(Error::Truncated { .. })));

        write_batch(&path, &[(1, 0), (12, 0)]);
        assert!(matches!(read_batch(&path, &[1]),
            Err(Error::Label { index: 1, label: 12, .. })));

        assert!(matches!(read_batch(&dir.path().join("none.bin"), &[1]),
            Err(Error::File { .. })));
    }

    #[test] fn load_data_splits_validation_tail() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 30, 9);

        let split = load_data(&config(dir.path())).unwrap();
        assert_eq!((split.train.len(), split.test.len()), (18, 6));
        assert_eq!(split.valid.as_ref().map(Split::len), Some(2));
        assert_eq!(split.n2c().collect::<Vec<_>>(), [(0, "cat"), (1, "dog")]);
        assert_eq!(split.train.labels().iter().filter(|&&label| label == 1).count(), 9);

        let split = load_data(&config(dir.path()).with_use_validation(false)).unwrap();
        assert!(split.valid.is_none());
        assert_eq!(split.train.len(), 20);
    }

    #[test] fn load_data_reads_meta_names() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 3, 3);
        std::fs::write(dir.path().join(META_FILE), "a\nb\nc\nkitty\n\n").unwrap();

        let split = load_data(&config(dir.path()).with_target_class(vec![3, 5])
            .with_use_validation(false)).unwrap();
        assert_eq!(split.class_names, ["kitty", "dog"]);
    }

    #[test] fn load_data_checks_targets() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 3, 3);

        for targets in [vec![], vec![3, 10], vec![3, 5, 3]] {
            assert!(matches!(load_data(&config(dir.path()).with_target_class(targets)),
                Err(Error::Targets { .. })));
        }

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(load_data(&config(empty.path())), Err(Error::NoTrainData(_))));
    }

    #[test] fn load_data_rejects_empty_validation() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar(dir.path(), 6, 3);      // 4 cats and dogs, a 10% tail rounds to none

        assert!(matches!(load_data(&config(dir.path())),
            Err(Error::EmptySplit("validation"))));
        let split = load_data(&config(dir.path()).with_validation_fraction(0.25)).unwrap();
        assert_eq!(split.valid.as_ref().map(Split::len), Some(1));
    }

    #[test] fn batcher_scales_pixels() {
        let items = vec![ ImageItem { image: record(0, 255)[1..].to_vec(), label: 1 },
                          ImageItem { image: record(0,   0)[1..].to_vec(), label: 0 }, ];
        let batch = ImageBatcher::<NdArray>::new(Default::default(), IMAGE_SHAPE)
            .batch(items);

        assert_eq!(batch.images.dims(), [2, 3, 32, 32]);
        let pixels = batch.images.into_data().to_vec::<f32>().unwrap();
        assert_eq!(pixels[0], 1.0);     // 255 then wraps to 0 and 1 in later planes
        assert_eq!(pixels[1024], 0.0);
        assert!((pixels[3072 + 2048] - 2.0 / 255.0).abs() < 1e-6);
        assert_eq!(batch.targets.into_data().to_vec::<i64>().unwrap(), [1, 0]);
    }
}
