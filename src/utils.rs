use csv::{ReaderBuilder, WriterBuilder};
use ndarray::{Array1, Array2};
use ndarray_csv::Array2Reader;
use thiserror::Error;

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use hmmbase::emissions::{Categorical, DiagNormal, Emission, Normal, Poisson};
use hmmbase::{FitOptions, FitResult, HmmError, HMM};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can not open {path:?}: {source}")]
    Open { path: PathBuf, source: std::io::Error },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("can not read matrix {path:?}: {source}")]
    Matrix { path: PathBuf, source: ndarray_csv::ReadError },

    #[error("wrong line {line} in {path:?}: {reason}")]
    Parse { path: PathBuf, line: usize, reason: String },

    #[error("unknown method {0:?}, expected viterbi, posteriors or fit")]
    UnknownMethod(String),

    #[error(transparent)]
    Model(#[from] HmmError),

    #[error("can not serialize model: {0}")]
    Json(#[from] serde_json::Error),
}

fn open(path: &Path) -> Result<File, ConfigError> {
    File::open(path).map_err(|source| ConfigError::Open { path: path.to_path_buf(), source })
}

pub fn read_matrix(path: &Path, nrows: usize, ncols: usize) -> Result<Array2<f64>, ConfigError> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(open(path)?);
    reader
        .deserialize_array2((nrows, ncols))
        .map_err(|source| ConfigError::Matrix { path: path.to_path_buf(), source })
}

/// Observation matrix with one observation per line; the number of lines is
/// not known in advance.
pub fn read_observations(path: &Path) -> Result<Array2<f64>, ConfigError> {
    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(open(path)?);
    reader
        .deserialize_array2_dynamic()
        .map_err(|source| ConfigError::Matrix { path: path.to_path_buf(), source })
}

fn parse_emission(path: &Path, line: usize, record: &csv::StringRecord) -> Result<Emission, ConfigError> {
    let wrong = |reason: String| ConfigError::Parse { path: path.to_path_buf(), line, reason };
    let family = record.get(0).map(str::trim).unwrap_or("");
    let values = record
        .iter()
        .skip(1)
        .map(|v| v.trim().parse::<f64>().map_err(|e| wrong(format!("{:?}: {}", v, e))))
        .collect::<Result<Vec<f64>, ConfigError>>()?;

    let emission: Emission = match (family, values.len()) {
        ("normal", 2) => Normal::new(values[0], values[1])?.into(),
        ("poisson", 1) => Poisson::new(values[0])?.into(),
        ("categorical", n) if n > 0 => Categorical::new(Array1::from(values))?.into(),
        ("diag_normal", n) if n > 0 && n % 2 == 0 => {
            let stds = Array1::from(values[n / 2..].to_vec());
            let means = Array1::from(values[..n / 2].to_vec());
            DiagNormal::new(means, stds)?.into()
        }
        (family, n) => return Err(wrong(format!("can not build a {:?} emission from {} parameters", family, n))),
    };
    Ok(emission)
}

/// One emission model per line: `normal,mean,std`, `poisson,rate`,
/// `categorical,p0,p1,...` or `diag_normal,m0,...,s0,...`.
pub fn read_emissions(path: &Path) -> Result<Vec<Emission>, ConfigError> {
    let mut reader = ReaderBuilder::new().has_headers(false).flexible(true).from_reader(open(path)?);
    let mut emissions = Vec::new();
    for (line, record) in reader.records().enumerate() {
        emissions.push(parse_emission(path, line + 1, &record?)?);
    }
    Ok(emissions)
}

fn array_to_str(a: &Array1<usize>) -> String {
    a.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" ")
}

pub fn write_path<W: Write + ?Sized>(output: &mut W, path: &Array1<usize>) -> Result<(), ConfigError> {
    writeln!(output, "{}", array_to_str(path))?;
    Ok(())
}

pub fn write_posteriors<W: Write>(output: W, gammas: &Array2<f64>, log_likelihood: f64) -> Result<(), ConfigError> {
    tracing::info!(log_likelihood, "posteriors computed");
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(output);
    for row in gammas.rows() {
        writer.serialize(row.to_vec())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fit<W: Write>(output: W, result: &FitResult<Emission>) -> Result<(), ConfigError> {
    tracing::info!(
        iterations = result.iterations,
        log_likelihood = result.log_likelihood,
        state = ?result.state,
        "fit finished"
    );
    serde_json::to_writer_pretty(output, &result.model)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Viterbi,
    Posteriors,
    Fit,
}

#[derive(Debug)]
pub struct Config {
    method: Method,
    model_path: PathBuf,
    input_path: PathBuf,
    nstates: usize,
    eps: f64,
    max_iterations: usize,
}

impl Config {

    fn new() -> Self {
        let defaults = FitOptions::default();
        Self {
            method: Method::Viterbi,
            model_path: PathBuf::from("."),
            input_path: PathBuf::from("observations"),
            nstates: 0,
            eps: defaults.eps,
            max_iterations: defaults.max_iterations,
        }
    }

    /// Reads a `key=value` per line configuration file. Empty lines and lines
    /// starting with `#` are skipped.
    pub fn from_config_file(filename: &Path) -> Result<Self, ConfigError> {
        let mut instance = Config::new();
        let reader = BufReader::new(open(filename)?);
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let wrong = |reason: String| ConfigError::Parse { path: filename.to_path_buf(), line: idx + 1, reason };
            let splits: Vec<&str> = line.splitn(2, '=').collect();
            if splits.len() != 2 {
                return Err(wrong(String::from("expected key=value")));
            }
            let option = splits[0].trim();
            let value = splits[1].trim();
            match option {
                "method" => {
                    instance.method = match value {
                        "viterbi" => Method::Viterbi,
                        "posteriors" => Method::Posteriors,
                        "fit" => Method::Fit,
                        _ => return Err(ConfigError::UnknownMethod(value.to_string())),
                    }
                }
                "model_path" => instance.model_path = PathBuf::from(value),
                "input_path" => instance.input_path = PathBuf::from(value),
                "nstates" => instance.nstates = value.parse().map_err(|e| wrong(format!("nstates: {}", e)))?,
                "eps" => instance.eps = value.parse().map_err(|e| wrong(format!("eps: {}", e)))?,
                "max_iterations" => {
                    instance.max_iterations = value.parse().map_err(|e| wrong(format!("max_iterations: {}", e)))?
                }
                _ => return Err(wrong(format!("unknown option {:?}", option))),
            };
        }
        Ok(instance)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions { eps: self.eps, max_iterations: self.max_iterations }
    }

    pub fn get_initprob(&self) -> Result<Array1<f64>, ConfigError> {
        Ok(read_matrix(&self.model_path.join("pi"), 1, self.nstates)?.row(0).to_owned())
    }

    pub fn get_transmatrix(&self) -> Result<Array2<f64>, ConfigError> {
        read_matrix(&self.model_path.join("A"), self.nstates, self.nstates)
    }

    pub fn get_emissions(&self) -> Result<Vec<Emission>, ConfigError> {
        read_emissions(&self.model_path.join("emissions"))
    }

    /// Loads the model; a missing `pi` file means a uniform initial distribution.
    pub fn get_model(&self) -> Result<HMM, ConfigError> {
        let a = self.get_transmatrix()?;
        let b = self.get_emissions()?;
        if self.model_path.join("pi").exists() {
            Ok(HMM::new(self.get_initprob()?, a, b)?)
        } else {
            Ok(HMM::with_uniform_init(a, b)?)
        }
    }

    pub fn get_observations(&self) -> Result<Array2<f64>, ConfigError> {
        read_observations(&self.input_path)
    }
}
