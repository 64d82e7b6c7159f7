use clap::{Arg, Command};
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

mod utils;

use hmmbase::{fit_with, forward_backward, viterbi_with_log_prob, FitState};
use utils::{Config, ConfigError, Method};

fn run(config: &Config, output: &mut dyn Write) -> Result<(), ConfigError> {
    let hmm = config.get_model()?;
    let observations = config.get_observations()?;
    let (nstates, dim) = hmm.size();
    tracing::info!(nstates, dim, nobs = observations.nrows(), method = ?config.method(), "model loaded");

    let start = Instant::now();
    match config.method() {
        Method::Viterbi => {
            let (path, log_prob) = viterbi_with_log_prob(&hmm, observations.view())?;
            tracing::info!(log_prob, elapsed_ms = start.elapsed().as_millis() as u64, "viterbi path decoded");
            utils::write_path(output, &path)?;
        }
        Method::Posteriors => {
            let (gammas, log_likelihood) = forward_backward(&hmm, observations.view())?;
            utils::write_posteriors(output, &gammas, log_likelihood)?;
        }
        Method::Fit => {
            let result = fit_with(&hmm, observations.view(), &config.fit_options());
            tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "baum-welch done");
            if let FitState::Failed(error) = &result.state {
                tracing::error!(iterations = result.iterations, "baum-welch failed");
                return Err(error.clone().into());
            }
            utils::write_fit(output, &result)?;
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let matches = Command::new("hmmbase")
        .version("0.1")
        .author("Alexandre Dubray <alexandre.dubray@uclouvain.be>")
        .about("Hidden Markov model decoding, posteriors and Baum-Welch fitting")
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("configuration file")
            .takes_value(true)
            .required(true))
        .arg(Arg::new("output")
            .short('o')
            .long("output")
            .value_name("FILE")
            .help("write results to FILE instead of stdout")
            .takes_value(true))
        .get_matches();

    let config_path = PathBuf::from(matches.value_of("config").unwrap_or_default());
    let config = match Config::from_config_file(&config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", error);
            process::exit(2);
        }
    };

    let result = match matches.value_of("output") {
        Some(path) => File::create(path)
            .map_err(ConfigError::from)
            .and_then(|mut file| run(&config, &mut file)),
        None => run(&config, &mut io::stdout().lock()),
    };

    if let Err(error) = result {
        eprintln!("{}", error);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmmbase::HmmError;
    use std::fs;
    use std::path::Path;

    fn config_in(dir: &Path, emissions: &str, observations: &str) -> Config {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("A"), "0.5,0.5\n0.5,0.5\n").unwrap();
        fs::write(dir.join("emissions"), emissions).unwrap();
        fs::write(dir.join("observations"), observations).unwrap();
        let config_path = dir.join("config");
        fs::write(
            &config_path,
            format!(
                "method=fit\nmodel_path={}\ninput_path={}\nnstates=2\n",
                dir.display(),
                dir.join("observations").display()
            ),
        )
        .unwrap();
        Config::from_config_file(&config_path).unwrap()
    }

    #[test]
    fn failed_fit_is_an_error() {
        let dir = std::env::temp_dir().join(format!("hmmbase-failed-fit-{}", process::id()));
        // state 1 only emits symbol 2, which never occurs
        let config = config_in(&dir, "categorical,0.5,0.5,0.0\ncategorical,0.0,0.0,1.0\n", "0\n1\n0\n");
        let mut out = Vec::new();
        let result = run(&config, &mut out);
        assert!(matches!(
            result,
            Err(ConfigError::Model(HmmError::DegenerateWeights { state: Some(1) }))
        ));
        assert!(out.is_empty());
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn successful_fit_writes_the_model() {
        let dir = std::env::temp_dir().join(format!("hmmbase-fit-{}", process::id()));
        let config = config_in(&dir, "normal,0.0,1.0\nnormal,10.0,1.0\n", "0.1\n9.8\n0.3\n10.2\n");
        let mut out = Vec::new();
        run(&config, &mut out).unwrap();
        let json = String::from_utf8(out).unwrap();
        assert!(json.contains("\"family\": \"normal\""));
        fs::remove_dir_all(dir).unwrap();
    }
}
