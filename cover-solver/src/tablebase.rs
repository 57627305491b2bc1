//! Binary tablebase export of solved states.
//!
//! Format:
//! - Header (32 bytes):
//!   - Magic: "GCT1" (4 bytes)
//!   - Version: u32 LE (4 bytes)
//!   - Entry count: u64 LE (8 bytes)
//!   - Checksum: u64 LE xxhash of data section (8 bytes)
//!   - Radix: u32 LE (4 bytes)
//!   - Reserved: 4 bytes (zeros)
//! - Data section (entry_count × 12 bytes):
//!   - Canonical: u64 LE (8 bytes)
//!   - Player to move: u8 (1 byte)
//!   - Outcome: i8, -1 loss / +1 win (1 byte)
//!   - Depth: u16 LE (2 bytes)
//!
//! Entries are sorted by (canonical, player) for binary search. Pending and
//! unseen states are not exported.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use cover_core::{CanonicalIndex, Player};
use xxhash_rust::xxh64::{xxh64, Xxh64};

use crate::error::Result;
use crate::store::{Outcome, Store};

const MAGIC: &[u8; 4] = b"GCT1";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 32;
const ENTRY_SIZE: usize = 12;
/// Rows fetched from the store per page.
const PAGE: usize = 100_000;

/// One exported state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub canonical: CanonicalIndex,
    pub player: Player,
    pub outcome: Outcome,
    pub depth: u16,
}

impl Entry {
    fn to_bytes(self) -> [u8; ENTRY_SIZE] {
        let mut buf = [0u8; ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.canonical.to_le_bytes());
        buf[8] = self.player as u8;
        buf[9] = self.outcome.value() as u8;
        buf[10..12].copy_from_slice(&self.depth.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> io::Result<Entry> {
        let mut canonical = [0u8; 8];
        canonical.copy_from_slice(&buf[0..8]);
        let player = Player::from_bits(buf[8]).ok_or_else(|| invalid("bad player byte"))?;
        let outcome = Outcome::from_value(buf[9] as i8).ok_or_else(|| invalid("bad outcome byte"))?;
        Ok(Entry {
            canonical: u64::from_le_bytes(canonical),
            player,
            outcome,
            depth: u16::from_le_bytes([buf[10], buf[11]]),
        })
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn write_header(w: &mut impl Write, count: u64, checksum: u64, radix: u32) -> io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    w.write_all(&count.to_le_bytes())?;
    w.write_all(&checksum.to_le_bytes())?;
    w.write_all(&radix.to_le_bytes())?;
    w.write_all(&[0u8; 4]) // Reserved
}

/// A loaded tablebase.
#[derive(Debug)]
pub struct Tablebase {
    radix: u32,
    entries: Vec<Entry>,
}

impl Tablebase {
    /// Stream every resolved state from `store` to `path`.
    ///
    /// The header is written last, once the count and checksum are known.
    pub fn export<S: Store + ?Sized>(store: &S, radix: u32, path: &Path) -> Result<u64> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_header(&mut writer, 0, 0, radix)?;

        let mut hasher = Xxh64::new(0);
        let mut count = 0u64;
        let mut cursor = None;
        loop {
            let page = store.solved_after(cursor, PAGE)?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some((last.canonical, last.player));
            for state in &page {
                let depth = u16::try_from(state.depth)
                    .map_err(|_| invalid(format!("depth {} does not fit u16", state.depth)))?;
                let bytes = Entry {
                    canonical: state.canonical,
                    player: state.player,
                    outcome: state.outcome,
                    depth,
                }
                .to_bytes();
                hasher.update(&bytes);
                writer.write_all(&bytes)?;
                count += 1;
            }
        }

        writer.seek(SeekFrom::Start(0))?;
        write_header(&mut writer, count, hasher.digest(), radix)?;
        writer.flush()?;
        tracing::info!(count, path = %path.display(), "tablebase exported");
        Ok(count)
    }

    /// Load and verify a tablebase file.
    pub fn load(path: &Path) -> io::Result<Tablebase> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(invalid("invalid tablebase magic"));
        }
        let word = |range: std::ops::Range<usize>| {
            let mut buf = [0u8; 8];
            buf[..range.len()].copy_from_slice(&header[range]);
            u64::from_le_bytes(buf)
        };
        let version = word(4..8) as u32;
        if version != VERSION {
            return Err(invalid(format!("unsupported tablebase version: {}", version)));
        }
        let count = word(8..16);
        let stored_checksum = word(16..24);
        let radix = word(24..28) as u32;

        // Check the claimed size against the file before allocating for it.
        let file_len = reader.get_ref().metadata()?.len();
        let expected = count
            .checked_mul(ENTRY_SIZE as u64)
            .and_then(|n| n.checked_add(HEADER_SIZE as u64));
        if expected != Some(file_len) {
            return Err(invalid(format!(
                "header claims {} entries, file is {} bytes",
                count, file_len
            )));
        }

        let mut data = Vec::with_capacity((file_len - HEADER_SIZE as u64) as usize);
        reader.read_to_end(&mut data)?;
        if data.len() as u64 != count * ENTRY_SIZE as u64 {
            return Err(invalid(format!(
                "expected {} entries, found {} bytes",
                count,
                data.len()
            )));
        }
        if xxh64(&data, 0) != stored_checksum {
            return Err(invalid("tablebase checksum mismatch"));
        }

        let entries = data
            .chunks_exact(ENTRY_SIZE)
            .map(Entry::from_bytes)
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Tablebase { radix, entries })
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Binary search by (canonical, player).
    pub fn lookup(&self, canonical: CanonicalIndex, player: Player) -> Option<Entry> {
        self.entries
            .binary_search_by_key(&(canonical, player), |e| (e.canonical, e.player))
            .ok()
            .map(|i| self.entries[i])
    }

    /// File size for a given number of entries.
    pub fn estimate_size(count: usize) -> usize {
        HEADER_SIZE + count * ENTRY_SIZE
    }
}
