use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use nullpipe::{Blocking, PumpOptions, PumpReport, Sinks, StreamPump, byte_size};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", fatal_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// The one-line diagnostic printed on a fatal error, independent of the log
/// filter.
fn fatal_line(e: &anyhow::Error) -> String {
    format!("nullpipe: {e:#}")
}

fn run(cli: &Cli) -> Result<()> {
    let options = cli.pump_options();
    let sinks = Sinks::new()
        .with_files(cli.output_files.iter().cloned())
        .flush_each_write(cli.flush_output);

    let report = match &cli.input {
        None => relay(options, io::stdin(), sinks)?,
        Some(path) => {
            let file = File::open(path).with_context(|| format!("cannot open({})", path.display()))?;
            relay(options, file, sinks)?
        }
    };

    if cli.is_verbose() {
        summarize(&report);
    }
    if let Some(signature) = report.digest {
        eprintln!("nullpipe: md5 signature of input = '{signature}'");
    }
    Ok(())
}

#[cfg(unix)]
fn relay<R>(options: PumpOptions, input: R, sinks: Sinks) -> Result<PumpReport>
where
    R: Read + std::os::fd::AsRawFd,
{
    if options.non_blocking {
        let source = nullpipe::NonBlocking::new(input).context("cannot make input non-blocking")?;
        return Ok(StreamPump::new(options, source, sinks)?.run()?);
    }
    Ok(StreamPump::new(options, Blocking(input), sinks)?.run()?)
}

#[cfg(not(unix))]
fn relay<R: Read>(options: PumpOptions, input: R, sinks: Sinks) -> Result<PumpReport> {
    if options.non_blocking {
        tracing::warn!("non-blocking input is not supported on this platform");
    }
    Ok(StreamPump::new(options, Blocking(input), sinks)?.run()?)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn summarize(report: &PumpReport) {
    let secs = report.elapsed.as_secs_f64();
    let speed = if secs == 0.0 {
        report.bytes_read
    } else {
        (report.bytes_read as f64 / secs) as u64
    };
    info!(
        "processed {} in {}.{:03} secs or {} per sec",
        byte_size(report.bytes_read),
        report.elapsed.as_secs(),
        report.elapsed.subsec_millis(),
        byte_size(speed)
    );
}
