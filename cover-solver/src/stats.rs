//! Progress statistics for the long-running stages.

use std::time::Instant;

/// Resident set size of this process in bytes.
#[cfg(target_os = "linux")]
pub fn resident_bytes() -> Option<u64> {
    // statm: size resident shared ... in pages.
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(page_size).ok().map(|size| pages * size)
}

/// Peak resident set size; `ru_maxrss` is already in bytes on macOS.
#[cfg(all(unix, not(target_os = "linux")))]
pub fn resident_bytes() -> Option<u64> {
    let mut usage = std::mem::MaybeUninit::<libc::rusage>::uninit();
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let max_rss = unsafe { usage.assume_init() }.ru_maxrss;
    u64::try_from(max_rss).ok()
}

#[cfg(not(unix))]
pub fn resident_bytes() -> Option<u64> {
    None
}

/// Binary-prefixed size, one decimal above a KiB.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Elapsed time as `hh:mm:ss`.
pub fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Log timer: total elapsed plus the rate since the previous line.
#[derive(Debug)]
struct Ticker {
    start: Instant,
    last_log: Instant,
    last_count: u64,
}

impl Ticker {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_log: now,
            last_count: 0,
        }
    }

    fn due(&self, interval_secs: u64) -> bool {
        self.last_log.elapsed().as_secs() >= interval_secs
    }

    /// Rate since the last tick, then reset.
    fn tick(&mut self, count: u64) -> f64 {
        let secs = self.last_log.elapsed().as_secs_f64();
        let rate = if secs > 0.0 {
            (count - self.last_count) as f64 / secs
        } else {
            0.0
        };
        self.last_log = Instant::now();
        self.last_count = count;
        rate
    }

    fn elapsed_hms(&self) -> String {
        format_hms(self.start.elapsed().as_secs())
    }

    fn average(&self, count: u64) -> f64 {
        let secs = self.start.elapsed().as_secs_f64();
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    }
}

fn mem_field() -> String {
    resident_bytes().map_or_else(|| "?".into(), human_bytes)
}

/// Terminal scan counters.
#[derive(Debug)]
pub struct ScanStats {
    pub boards: u64,
    pub found: u64,
    /// Terminals new to the store (the rest were already recorded).
    pub inserted: u64,
    pub p1_wins: u64,
    pub p2_wins: u64,
    pub outer_done: u64,
    ticker: Ticker,
}

impl Default for ScanStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStats {
    pub fn new() -> Self {
        Self {
            boards: 0,
            found: 0,
            inserted: 0,
            p1_wins: 0,
            p2_wins: 0,
            outer_done: 0,
            ticker: Ticker::new(),
        }
    }

    pub fn should_log(&self, interval_secs: u64) -> bool {
        self.ticker.due(interval_secs)
    }

    pub fn log_progress(&mut self, outer: usize, outer_end: usize) {
        let rate = self.ticker.tick(self.boards);
        tracing::info!(
            "[{}] outer={}/{} boards={} terminals={} new={} rate={:.0}/s mem={}",
            self.ticker.elapsed_hms(),
            outer,
            outer_end,
            self.boards,
            self.found,
            self.inserted,
            rate,
            mem_field(),
        );
    }

    pub fn log_summary(&self) {
        tracing::info!(
            boards = self.boards,
            terminals = self.found,
            new = self.inserted,
            p1 = self.p1_wins,
            p2 = self.p2_wins,
            outer_done = self.outer_done,
            "scan finished in {} ({:.0} boards/s)",
            self.ticker.elapsed_hms(),
            self.ticker.average(self.boards),
        );
    }
}

/// Move-table builder counters.
#[derive(Debug)]
pub struct MovesStats {
    pub indices: u64,
    pub canonical: u64,
    pub moves: u64,
    ticker: Ticker,
}

impl Default for MovesStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MovesStats {
    pub fn new() -> Self {
        Self {
            indices: 0,
            canonical: 0,
            moves: 0,
            ticker: Ticker::new(),
        }
    }

    pub fn should_log(&self, interval_secs: u64) -> bool {
        self.ticker.due(interval_secs)
    }

    pub fn log_progress(&mut self, index: u64, end: u64) {
        let rate = self.ticker.tick(self.indices);
        tracing::info!(
            "[{}] index={}/{} canonical={} moves={} rate={:.0}/s mem={}",
            self.ticker.elapsed_hms(),
            index,
            end,
            self.canonical,
            self.moves,
            rate,
            mem_field(),
        );
    }

    pub fn log_summary(&self) {
        tracing::info!(
            indices = self.indices,
            canonical = self.canonical,
            moves = self.moves,
            "move table finished in {}",
            self.ticker.elapsed_hms(),
        );
    }
}

/// Retrograde solve counters.
#[derive(Debug)]
pub struct SolveStats {
    /// Queue items expanded
    pub processed: u64,
    /// Terminal losers queued at depth 0
    pub seeded: u64,
    pub wins: u64,
    pub losses: u64,
    /// Pending rows created
    pub discovered: u64,
    pub max_depth: u32,
    ticker: Ticker,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveStats {
    pub fn new() -> Self {
        Self {
            processed: 0,
            seeded: 0,
            wins: 0,
            losses: 0,
            discovered: 0,
            max_depth: 0,
            ticker: Ticker::new(),
        }
    }

    pub fn record_depth(&mut self, depth: u32) {
        self.max_depth = self.max_depth.max(depth);
    }

    pub fn should_log(&self, interval_secs: u64) -> bool {
        self.ticker.due(interval_secs)
    }

    pub fn log_progress(&mut self) {
        let rate = self.ticker.tick(self.processed);
        tracing::info!(
            "[{}] processed={} wins={} losses={} pending_created={} depth={} rate={:.0}/s mem={}",
            self.ticker.elapsed_hms(),
            self.processed,
            self.wins,
            self.losses,
            self.discovered,
            self.max_depth,
            rate,
            mem_field(),
        );
    }

    pub fn log_summary(&self) {
        tracing::info!(
            seeded = self.seeded,
            processed = self.processed,
            wins = self.wins,
            losses = self.losses,
            max_depth = self.max_depth,
            "solve finished in {} ({:.0} items/s)",
            self.ticker.elapsed_hms(),
            self.ticker.average(self.processed),
        );
    }
}
