use std::io::{self, Write};
use std::time::{Duration, Instant};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

/// Render a byte count for humans: `512b`, `1.5k (1536)`, `2.0m (2097152)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn byte_size(size: u64) -> String {
    let scaled = |unit: u64| size as f64 / unit as f64;
    if size > GIB {
        format!("{:.1}g ({size})", scaled(GIB))
    } else if size > MIB {
        format!("{:.1}m ({size})", scaled(MIB))
    } else if size > KIB {
        format!("{:.1}k ({size})", scaled(KIB))
    } else {
        format!("{size}b")
    }
}

/// Progress output: dots per block released and a periodic rate line.
///
/// Writes go to stderr in the binary; failures to write progress are
/// ignored since they never affect the relayed stream.
pub(crate) struct Progress {
    out: Box<dyn Write>,
    dot_every: u64,
    dot_pending: u64,
    rate_every: Option<Duration>,
    next_rate: Option<Instant>,
    total: u64,
    total_at_last_rate: u64,
}

impl Progress {
    pub(crate) fn new(out: Box<dyn Write>, dot_every: u64, rate_every: Option<Duration>) -> Self {
        Self {
            out,
            dot_every,
            dot_pending: 0,
            rate_every,
            next_rate: rate_every.map(|every| Instant::now() + every),
            total: 0,
            total_at_last_rate: 0,
        }
    }

    pub(crate) fn advance(&mut self, released: usize) {
        self.total += released as u64;
        if self.dot_every == 0 {
            return;
        }
        self.dot_pending += released as u64;
        while self.dot_pending >= self.dot_every {
            let _ = self.out.write_all(b".");
            self.dot_pending -= self.dot_every;
        }
    }

    /// Print the rate line if its interval has passed.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub(crate) fn tick(&mut self, now: Instant) {
        let (Some(every), Some(next)) = (self.rate_every, self.next_rate) else {
            return;
        };
        if now <= next {
            return;
        }
        let secs = (now - next + every).as_secs_f64();
        let rate = ((self.total - self.total_at_last_rate) as f64 / secs) as u64;
        let _ = write!(
            self.out,
            "\rWriting at {} per sec (total {})      ",
            byte_size(rate),
            byte_size(self.total)
        );
        let _ = self.out.flush();
        self.next_rate = Some(now + every);
        self.total_at_last_rate = self.total;
    }

    pub(crate) fn finish(&mut self) -> io::Result<()> {
        if self.rate_every.is_some() || self.dot_every > 0 {
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }
}
