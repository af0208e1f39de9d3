// SPDX-License-Identifier: Apache-2.0

//! Command-line driver: print, rewrite, map and estimate activity of subnets.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use subnet_synth::analysis::{ActivityEstimator, SimulationEstimator, write_report};
use subnet_synth::model::parser::parse_subnet;
use subnet_synth::model::serdes::{read_subnet, write_subnet};
use subnet_synth::model::{ObjectStore, SubnetBuilder, SubnetId};
use subnet_synth::npn::NpnDatabase;
use subnet_synth::optimizer::{CutSource, RewriteOptions, Rewriter};
use subnet_synth::synthesis::{BiDecomposition, MinatoMorreale, NpnResynthesizer, Resynthesizer};
use subnet_synth::techmap::{GeneticOptions, Library, MapOptions, Mapper, Strategy, summarize};

#[derive(Parser, Debug)]
#[command(name = "subnet-synth")]
#[command(about = "Rewrite and technology-map combinational subnets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints a subnet in the text form.
    Print { input: PathBuf },
    /// Runs one cut-based rewriting pass.
    Rewrite {
        input: PathBuf,
        #[arg(long, default_value_t = 4)]
        cut_size: usize,
        #[arg(long, value_enum, default_value_t = ResynthKind::Isop)]
        resynth: ResynthKind,
        #[arg(long, value_enum, default_value_t = CutSourceKind::Enumerated)]
        cut_source: CutSourceKind,
        /// NPN database written by gen-npn-db; required by `--resynth npn`.
        #[arg(long)]
        npn_db: Option<PathBuf>,
        /// Accept replacements that keep the cell count unchanged.
        #[arg(long)]
        zero_cost: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Maps a subnet onto a JSON cell library.
    Map {
        input: PathBuf,
        #[arg(long)]
        library: PathBuf,
        #[arg(long, value_enum, default_value_t = StrategyKind::AreaRecovery)]
        strategy: StrategyKind,
        #[arg(long, default_value_t = 4)]
        cut_size: usize,
        /// Seed for the genetic strategy.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Writes the per-entry switching activity report.
    Activity {
        input: PathBuf,
        #[arg(long, default_value_t = 4096)]
        ticks: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ResynthKind {
    Isop,
    Bidecomp,
    Npn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CutSourceKind {
    Enumerated,
    Reconvergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyKind {
    MinDelay,
    SimpleArea,
    AreaRecovery,
    PowerMap,
    Genetic,
}

fn is_binary(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "bin")
}

fn load(store: &mut ObjectStore, path: &Path) -> Result<SubnetId> {
    if is_binary(path) {
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        return Ok(read_subnet(store, BufReader::new(f))?);
    }
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(parse_subnet(store, &text)?)
}

fn save(store: &ObjectStore, id: SubnetId, path: &Path) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("creating {}", path.display()))?,
    );
    if is_binary(path) {
        write_subnet(&mut w, store.subnet(id))?;
    } else {
        w.write_all(store.subnet(id).to_string(store).as_bytes())?;
    }
    w.flush()?;
    log::info!("saved subnet to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();
    let cli = Cli::parse();
    let mut store = ObjectStore::new();

    match cli.command {
        Command::Print { input } => {
            let id = load(&mut store, &input)?;
            print!("{}", store.subnet(id).to_string(&store));
        }
        Command::Rewrite {
            input,
            cut_size,
            resynth,
            cut_source,
            npn_db,
            zero_cost,
            out,
        } => {
            let id = load(&mut store, &input)?;
            let resynthesizer: Box<dyn Resynthesizer> = match resynth {
                ResynthKind::Isop => Box::new(MinatoMorreale),
                ResynthKind::Bidecomp => Box::new(BiDecomposition),
                ResynthKind::Npn => {
                    let Some(path) = npn_db else {
                        bail!("--resynth npn needs --npn-db");
                    };
                    let f = File::open(&path)
                        .with_context(|| format!("opening {}", path.display()))?;
                    Box::new(NpnResynthesizer::new(NpnDatabase::restore(
                        &mut store,
                        BufReader::new(f),
                    )?))
                }
            };
            let options = RewriteOptions {
                cut_size,
                cut_source: match cut_source {
                    CutSourceKind::Enumerated => CutSource::Enumerated,
                    CutSourceKind::Reconvergence => CutSource::Reconvergence,
                },
                zero_cost,
                ..RewriteOptions::default()
            };
            let mut builder = SubnetBuilder::from_subnet(store.subnet(id));
            let stats = Rewriter::new(resynthesizer.as_ref(), options)
                .rewrite(&mut store, &mut builder)?;
            let rewritten = builder.make(&mut store);
            if let Some(out) = out {
                save(&store, rewritten, &out)?;
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Map {
            input,
            library,
            strategy,
            cut_size,
            seed,
            out,
        } => {
            let id = load(&mut store, &input)?;
            let f = File::open(&library)
                .with_context(|| format!("opening {}", library.display()))?;
            let library = Library::from_json(&mut store, BufReader::new(f))?;
            let strategy = match strategy {
                StrategyKind::MinDelay => Strategy::MinDelay,
                StrategyKind::SimpleArea => Strategy::SimpleArea,
                StrategyKind::AreaRecovery => Strategy::AreaRecovery,
                StrategyKind::PowerMap => Strategy::PowerMap,
                StrategyKind::Genetic => Strategy::Genetic(GeneticOptions {
                    seed,
                    ..GeneticOptions::default()
                }),
            };
            let mapper = Mapper::new(MapOptions {
                cut_size,
                activity_seed: seed,
                ..MapOptions::default()
            });
            let mapped = mapper.map(&mut store, id, &library, &strategy)?;
            if let Some(out) = out {
                save(&store, mapped, &out)?;
            }
            let summary = summarize(&store, store.subnet(mapped));
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Activity { input, ticks, seed } => {
            let id = load(&mut store, &input)?;
            if ticks < 2 {
                bail!("--ticks must be at least 2");
            }
            let activity = SimulationEstimator { ticks, seed }.estimate(&store, store.subnet(id), &[]);
            let stdout = io::stdout();
            let mut w = BufWriter::new(stdout.lock());
            write_report(&activity, &store, store.subnet(id), &mut w)?;
            w.flush()?;
        }
    }
    Ok(())
}
