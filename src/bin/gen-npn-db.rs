// SPDX-License-Identifier: Apache-2.0

//! Enumerates the NPN classes of small functions, synthesizes each one and
//! writes the resulting database to disk.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use subnet_synth::model::ObjectStore;
use subnet_synth::npn::NpnDatabase;
use subnet_synth::synthesis::{BiDecomposition, MinatoMorreale};

#[derive(Debug, Parser)]
#[command(name = "gen-npn-db")]
#[command(about = "Generate the NPN class database used by NPN resynthesis")]
struct Args {
    /// Output path for the bincode database.
    #[arg(long)]
    out: PathBuf,

    /// Largest input count to enumerate.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4))]
    vars: u8,
}

fn main() -> io::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    let mut store = ObjectStore::new();
    let mut db = NpnDatabase::new();
    db.populate(
        &mut store,
        usize::from(args.vars),
        &[&MinatoMorreale, &BiDecomposition],
    );
    eprintln!(
        "gen-npn-db: built {} classes ({} subnets) in {:?}",
        db.len(),
        db.subnet_count(),
        start.elapsed()
    );

    let mut w = BufWriter::new(File::create(&args.out)?);
    db.dump(&store, &mut w)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    w.flush()?;
    eprintln!(
        "gen-npn-db: wrote {} in {:?}",
        args.out.display(),
        start.elapsed()
    );
    Ok(())
}
