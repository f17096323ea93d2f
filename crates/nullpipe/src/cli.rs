use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use nullpipe::{DEFAULT_BUFFER_SIZE, PumpOptions};

/// Null utility: /dev/null, tee and md5sum with throttling and pagination.
#[derive(Debug, Parser)]
#[command(name = "nullpipe", about, disable_version_flag = true)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Read all input before outputting
    #[arg(short = 'a', long = "all-read")]
    pub all_read: bool,

    /// Size of input and output buffer
    #[arg(short = 'b', long = "buffer-size", value_name = "size", value_parser = parse_size, default_value_t = DEFAULT_BUFFER_SIZE as u64)]
    pub buffer_size: u64,

    /// Show a dot each X bytes of input
    #[arg(short = 'd', long = "dot-blocks", value_name = "size", value_parser = parse_size, default_value_t = 0)]
    pub dot_blocks: u64,

    /// Output file(s) to write input
    #[arg(short = 'f', long = "output-file", value_name = "output-file")]
    pub output_files: Vec<PathBuf>,

    /// Flush output to files
    #[arg(short = 'F', long = "flush-output")]
    pub flush_output: bool,

    /// Run input bytes through md5
    #[arg(short = 'm', long = "md5")]
    pub md5: bool,

    /// Don't block on input
    #[arg(short = 'n', long = "non-block")]
    pub non_block: bool,

    /// Write input to standard output
    #[arg(short = 'p', long = "pass-input")]
    pub pass_input: bool,

    /// Read pagination data (use with -w)
    #[arg(short = 'r', long = "read-pagination")]
    pub read_pagination: bool,

    /// Dump rate info every X decimal secs
    #[arg(short = 'R', long = "rate-every", value_name = "seconds", value_parser = parse_seconds)]
    pub rate_every: Option<Duration>,

    /// Stop after size bytes
    #[arg(short = 's', long = "stop-after", value_name = "size", value_parser = parse_size, default_value_t = 0)]
    pub stop_after: u64,

    /// Throttle output to X bytes / sec
    #[arg(short = 't', long = "throttle-size", value_name = "size", value_parser = parse_size, default_value_t = 0)]
    pub throttle_size: u64,

    /// Report on i/o bytes
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Very verbose messages
    #[arg(short = 'V', long = "very-verbose")]
    pub very_verbose: bool,

    /// Write pagination data (use with -r)
    #[arg(short = 'w', long = "write-pagination")]
    pub write_pagination: bool,

    /// File we are reading, else stdin
    #[arg(value_name = "file")]
    pub input: Option<PathBuf>,
}

impl Cli {
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose || self.very_verbose
    }

    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.very_verbose {
            "trace"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    #[must_use]
    pub fn pump_options(&self) -> PumpOptions {
        PumpOptions {
            buffer_size: usize::try_from(self.buffer_size).unwrap_or(usize::MAX),
            read_all: self.all_read,
            dot_every: self.dot_blocks,
            rate_every: self.rate_every,
            stop_after: self.stop_after,
            throttle: self.throttle_size,
            pass_through: self.pass_input,
            read_pagination: self.read_pagination,
            write_pagination: self.write_pagination,
            digest: self.md5,
            non_blocking: self.non_block,
            flush_each_write: self.flush_output,
        }
    }
}

/// Parse a byte count with an optional `k`, `m` or `g` suffix (powers of
/// 1024).
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, shift) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 10),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 20),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 30),
        _ => (s, 0),
    };
    let n: u64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    n.checked_mul(1 << shift)
        .ok_or_else(|| format!("size '{s}' is too large"))
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid seconds '{s}': {e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{s}': {e}"))
}
