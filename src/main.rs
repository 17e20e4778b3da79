use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use la64::machine::Machine;

const DEFAULT_MEMORY_SIZE: u64 = 0x2000_0000;

#[derive(Parser)]
#[command(name = "la64", about = "Emulator for the LA64 virtual CPU and SoC")]
struct Args {
    /// Path to a flat boot image; bytes 0..7 (little-endian) are the entry address.
    boot_image_path: PathBuf,

    /// Total guest RAM in bytes.
    #[arg(long, default_value_t = DEFAULT_MEMORY_SIZE)]
    memory_size: u64,

    /// Enable the optional indexed-colour framebuffer device.
    #[arg(long)]
    framebuffer: bool,

    /// Log level for `env_logger` (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    if let Err(err) = run(args) {
        eprintln!("la64: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(args: Args) -> anyhow::Result<()> {
    let image = std::fs::read(&args.boot_image_path)
        .with_context(|| format!("reading boot image {}", args.boot_image_path.display()))?;

    log::info!(
        "booting {} ({} bytes RAM, framebuffer={})",
        args.boot_image_path.display(),
        args.memory_size,
        args.framebuffer
    );

    let mut machine = Machine::new(args.memory_size, &image, args.framebuffer)
        .context("constructing machine")?;
    machine.run();

    log::info!("guest powered off cleanly");
    Ok(())
}
