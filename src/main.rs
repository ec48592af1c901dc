use anyhow::{Result, bail};
use clap::Parser;
use lockorder::{TargetedPair, replay_log};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Lockorder - replay a recorded lock event log and report ordering violations"
)]
struct Cli {
    /// Path to the log file
    log_file: PathBuf,

    /// Also check that mutex A is never locked while mutex B is held
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pair: Option<Vec<String>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let pair = match cli.pair.as_deref() {
        Some([a, b]) => Some(TargetedPair {
            a: a.clone(),
            b: b.clone(),
        }),
        Some(_) => bail!("--pair takes exactly two mutex labels"),
        None => None,
    };

    let violations = replay_log(&cli.log_file, pair)?;
    for info in &violations {
        println!("{}", info.report());
    }

    if !violations.is_empty() {
        bail!(
            "{} lock order violation(s) in {}",
            violations.len(),
            cli.log_file.display()
        );
    }
    println!("no lock order violations in {}", cli.log_file.display());
    Ok(())
}
