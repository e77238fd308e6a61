//! Data ingestion
//!
//! Loads the source CSV, keeps an unmodified copy, and writes a seeded
//! random train/test split. The split is not stratified.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::{MushroomError, Result, Stage};

/// Paths written by a successful ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionArtifact {
    pub raw_path: PathBuf,
    pub train_path: PathBuf,
    pub test_path: PathBuf,
}

/// Ingestion stage
pub struct DataIngestion<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DataIngestion<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Read `source_path`, store the raw copy and both partitions
    pub fn ingest(&self, source_path: impl AsRef<Path>) -> Result<IngestionArtifact> {
        let source_path = source_path.as_ref();
        info!(source = %source_path.display(), "Entered data ingestion");

        let mut df = read_csv(source_path, Stage::Ingestion)?;
        info!(rows = df.height(), columns = df.width(), "Read dataset");

        if df.height() < 2 {
            return Err(MushroomError::data_source(
                Stage::Ingestion,
                format!("{} has {} rows, at least 2 are needed to split", source_path.display(), df.height()),
            ));
        }

        write_csv(&mut df, &self.config.raw_path)?;
        info!(path = %self.config.raw_path.display(), "Raw data saved");

        let (train_idx, test_idx) = split_indices(df.height(), self.config.test_size, self.config.seed);
        let mut train = take_rows(&df, &train_idx)?;
        let mut test = take_rows(&df, &test_idx)?;
        info!(
            train_rows = train.height(),
            test_rows = test.height(),
            seed = self.config.seed,
            "Train test split completed"
        );

        write_csv(&mut train, &self.config.train_path)?;
        write_csv(&mut test, &self.config.test_path)?;
        info!(
            train = %self.config.train_path.display(),
            test = %self.config.test_path.display(),
            "Train and test sets saved"
        );

        Ok(IngestionArtifact {
            raw_path: self.config.raw_path.clone(),
            train_path: self.config.train_path.clone(),
            test_path: self.config.test_path.clone(),
        })
    }
}

/// Shuffle `0..n` with a seeded RNG; the first `ceil(n * test_size)` indices
/// form the test partition.
pub fn split_indices(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.clamp(1, n.saturating_sub(1).max(1));
    let train = indices.split_off(n_test);
    (train, indices)
}

/// Read a headered CSV with every column as a string
pub(crate) fn read_csv(path: &Path, stage: Stage) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(MushroomError::data_source(
            stage,
            format!("{} does not exist", path.display()),
        ));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| MushroomError::data_source(stage, format!("{}: {}", path.display(), e)))
}

fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MushroomError::io(Stage::Ingestion, parent, e))?;
    }
    let mut file = File::create(path).map_err(|e| MushroomError::io(Stage::Ingestion, path, e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .map_err(|e| MushroomError::data_source(Stage::Ingestion, format!("{}: {}", path.display(), e)))
}

fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
    df.take(&idx)
        .map_err(|e| MushroomError::data_source(Stage::Ingestion, e))
}
