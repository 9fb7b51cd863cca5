use std::{
    collections::BTreeMap,
    env,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, bail};
use autoencoder::{AutoEncoder, AutoEncoderConfig, FitOptions};
use log::info;
use tabular::{Frame, Value};

const DEFAULT_EPOCHS: usize = 10;
const BIN: &str = "dfencoder";

/// The files named on the command line.
#[derive(Debug, PartialEq)]
struct Paths {
    config: String,
    train: String,
    scored: Option<String>,
}

/// Splits the command line, program name first, into the input files.
fn parse_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Paths> {
    let mut args = args.into_iter();
    let bin = args.next().unwrap_or_else(|| BIN.to_string());

    match (args.next(), args.next()) {
        (Some(config), Some(train)) => Ok(Paths {
            config,
            train,
            scored: args.next(),
        }),
        _ => bail!("usage: {bin} <config.json> <train.jsonl> [score.jsonl]"),
    }
}

/// Reads a JSON lines file of flat records into a frame.
fn read_records<P: AsRef<Path>>(path: P) -> anyhow::Result<Frame> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).with_context(|| format!("opening {}", path.display()))?);

    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record: BTreeMap<String, Value> = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), i + 1))?;
        records.push(record);
    }

    Ok(Frame::from_records(&records)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let paths = parse_args(env::args())?;

    let epochs = match env::var("EPOCHS") {
        Ok(epochs) => epochs.parse().context("EPOCHS must be a positive integer")?,
        Err(_) => DEFAULT_EPOCHS,
    };
    let val_data = env::var("VAL").ok().map(read_records).transpose()?;

    let config = AutoEncoderConfig::from_path(&paths.config)?;
    let train = read_records(&paths.train)?;
    info!(rows = train.nrows(), columns = train.ncols(); "training data loaded");

    let mut model = AutoEncoder::from_config(config)?;
    let options = FitOptions {
        epochs,
        run_validation: val_data.is_some(),
        val_data: val_data.map(Into::into),
        ..FitOptions::default()
    };
    model.fit(train.clone().into(), options)?;

    let scored = match paths.scored {
        Some(path) => read_records(path)?,
        None => train,
    };
    let results = model.results(&scored, true)?;

    let mut out = BufWriter::new(io::stdout().lock());
    for row in 0..results.nrows() {
        serde_json::to_writer(&mut out, &results.row(row))?;
        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}
