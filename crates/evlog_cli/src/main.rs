use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use evlog_core::{
    consts::CODE_DIAGNOSTIC, Catalog, EngineConfig, LengthTable, LogReader, LogWriter, RecordDecoder,
    TimeBase,
};

#[derive(Parser)]
#[command(name = "evlog", about = "Indexed random-access decoder for tick-stamped event logs")]
struct Cli {
    /// Engine settings (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Length table (JSON) replacing the built-in catalog
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// Debug logging on stderr (otherwise EVLOG_LOG, default warn)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Scan a log and print index stats
    Index {
        #[arg(long)]
        log: PathBuf,
        /// Also write the <log>.evx sidecar
        #[arg(long, default_value_t = false)]
        save: bool,
    },

    /// Index stats, file time and per-code histogram
    Info {
        #[arg(long)]
        log: PathBuf,
    },

    /// Decode events [start, end)
    Decode {
        #[arg(long)]
        log: PathBuf,
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Defaults to the last indexed event
        #[arg(long)]
        end: Option<u64>,
        /// One JSON object per line
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Timestamps relative to the start of the log instead of the range
        #[arg(long, default_value_t = false)]
        absolute: bool,
    },

    /// Re-decode every indexed record and compare spans
    Verify {
        #[arg(long)]
        log: PathBuf,
    },

    /// Print the length table in effect
    Catalog,

    /// Write a random demo log
    Synth {
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 10_000)]
        events: u64,
        #[arg(long)]
        seed: Option<u64>,
    },
}

const SYNTH_LABELS: [&str; 5] = ["boot", "arm", "calib", "log-start", "log-stop"];
const SYNTH_MESSAGES: [&str; 4] = ["sensor ok", "gps lock", "low signal", "retry"];

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("EVLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_table(path: Option<&Path>) -> Result<LengthTable> {
    Ok(match path {
        Some(p) => LengthTable::load(p)?,
        None => LengthTable::builtin(),
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    Ok(match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    })
}

fn open_log(table: &LengthTable, config: EngineConfig, log: &Path) -> Result<LogReader> {
    let catalog = Catalog::new(table)?;
    LogReader::open_with(log, catalog, config).map_err(|e| anyhow!("{}: {e}", log.display()))
}

fn code_name(table: &LengthTable, code: u8) -> &str {
    table
        .entries()
        .iter()
        .find(|e| e.code == code)
        .and_then(|e| e.name.as_deref())
        .unwrap_or("?")
}

fn mtime_rfc3339(path: &Path) -> Result<String> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(OffsetDateTime::from(modified).format(&Rfc3339)?)
}

fn print_stats(reader: &LogReader) {
    let s = reader.stats();
    println!("log      : {}", reader.path().display());
    println!("events   : {}", s.total_events);
    println!("bytes    : {} indexed / {} on disk", s.scanned_bytes, s.file_len);
    if s.trailing_bytes > 0 {
        println!("trailing : {} bytes (incomplete record)", s.trailing_bytes);
    }
    if !s.unresolved.is_empty() {
        let codes: Vec<String> = s.unresolved.iter().map(|(c, n)| format!("0x{c:02x}×{n}")).collect();
        println!("unresolved: {}", codes.join(" "));
    }
}

fn synth(out: &Path, events: u64, seed: u64) -> Result<(PathBuf, u64)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut w = LogWriter::create(out)?;
    let mut tick: u16 = rng.random();
    w.session_start()?;
    w.tick(tick)?;
    while w.records() < events {
        match rng.random_range(0..100u32) {
            0..=39 => {
                tick = tick.wrapping_add(rng.random_range(1..4000));
                w.tick(tick)?;
            }
            40..=54 => w.voltage(rng.random_range(3000..4200))?,
            55..=64 => w.temperature(rng.random_range(-1500..4500))?,
            65..=72 => w.counter(rng.random())?,
            73..=79 => w.position(rng.random_range(-10_000..10_000), rng.random_range(-10_000..10_000))?,
            80..=84 => {
                tick = tick.wrapping_add(rng.random_range(1..4000));
                w.button(tick, rng.random_range(0..8))?;
            }
            85..=87 => w.status(rng.random_range(0..8))?,
            88..=90 => w.label(SYNTH_LABELS[rng.random_range(0..SYNTH_LABELS.len())])?,
            91..=93 => w.message(SYNTH_MESSAGES[rng.random_range(0..SYNTH_MESSAGES.len())])?,
            94..=95 => w.sync()?,
            96 => w.overflow()?,
            _ => w.record(CODE_DIAGNOSTIC, &rng.random::<[u8; 3]>())?,
        }
    }
    let records = w.records();
    Ok((w.finish()?, records))
}

fn main() -> Result<()> {
    let Cli { config, catalog, verbose, cmd } = Cli::parse();
    init_tracing(verbose);
    let table = load_table(catalog.as_deref())?;
    let config = load_config(config.as_deref())?;
    debug!(?config, "engine config");

    match cmd {
        Cmd::Index { log, save } => {
            let reader = open_log(&table, config, &log)?;
            print_stats(&reader);
            if save {
                let p = reader.save_index()?;
                println!("sidecar  : {}", p.display());
            }
        }
        Cmd::Info { log } => {
            let reader = open_log(&table, config, &log)?;
            print_stats(&reader);
            println!("modified : {}", mtime_rfc3339(&log)?);
            println!("ckpts    : {}", reader.index().checkpoints().len());
            println!("per code :");
            for (code, n) in &reader.stats().per_code {
                println!("  0x{code:02x} {:<14} {n}", code_name(&table, *code));
            }
        }
        Cmd::Decode { log, start, end, json, absolute } => {
            let reader = open_log(&table, config, &log)?;
            let end = end.unwrap_or_else(|| reader.total_events());
            let time_base = if absolute { TimeBase::Absolute } else { reader.config().time_base };
            let records = reader.decode_with(start, end, time_base);
            for rec in &records {
                if json {
                    println!("{}", serde_json::to_string(rec)?);
                } else {
                    println!("{:>8} {:>14} {:<22} {}", rec.index, rec.time_ns, hex::encode(&rec.raw_bytes), rec.rendered);
                }
            }
            info!(requested = end.saturating_sub(start), returned = records.len(), "decode done");
        }
        Cmd::Verify { log } => {
            let reader = open_log(&table, config, &log)?;
            let index = reader.index();
            let mut dec = RecordDecoder::new(reader.data(), reader.catalog());
            let mut mismatches = 0u64;
            for event in 0..index.total_events() {
                let Some((start, end)) = index.span_of(event) else { break };
                match dec.decode_at(event, start) {
                    Some(rec) if rec.consumed() == end - start => {}
                    Some(rec) => {
                        mismatches += 1;
                        eprintln!("verify: event {event} at {start}: decoded {} bytes, indexed {}", rec.consumed(), end - start);
                    }
                    None => {
                        mismatches += 1;
                        eprintln!("verify: event {event} at {start}: record runs past end of log");
                    }
                }
            }
            let stats = reader.stats();
            let unresolved: u64 = stats.unresolved.values().sum();
            println!(
                "verify: events={} mismatches={} unresolved={} trailing={}",
                stats.total_events, mismatches, unresolved, stats.trailing_bytes
            );
            if mismatches > 0 || unresolved > 0 {
                return Err(anyhow!("verify failed for {}", log.display()));
            }
        }
        Cmd::Catalog => {
            // validate before printing so a bad table is reported, not listed
            Catalog::new(&table)?;
            let mut by_code: BTreeMap<u8, (u32, &str)> = BTreeMap::new();
            for e in table.entries() {
                by_code.insert(e.code, (e.length, e.name.as_deref().unwrap_or("")));
            }
            for (code, (len, name)) in by_code {
                println!("0x{code:02x} {len:>3}  {name}");
            }
        }
        Cmd::Synth { out, events, seed } => {
            let seed = seed.unwrap_or_else(rand::random);
            let (path, records) = synth(&out, events, seed)?;
            println!("synth: wrote {} records to {} (seed {seed})", records, path.display());
        }
    }
    Ok(())
}
