mod time_arg;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::util::SubscriberInitExt;

use librtc::{Rtc, RtcConfig, time_diff};
use pif_emu::{Console, ConsoleConfig};

use crate::time_arg::{from_unix, parse_time, render};

#[derive(Parser)]
#[command(name = "rtcctl")]
#[command(version, about = "librtc calendar, formatting and simulated RTC tool", long_about = None)]
struct Cli {
    /// More logging: -v for debug, -vv for joybus traces
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a Unix timestamp with strftime
    Fmt {
        /// Seconds since 1970-01-01 00:00:00
        #[arg(allow_hyphen_values = true)]
        unix: i64,

        /// strftime format
        #[arg(short, long, default_value = "%c")]
        format: String,
    },

    /// Print the seconds from A to B
    Diff {
        /// Unix timestamp or YYYY-MM-DD[THH:MM[:SS]]
        #[arg(allow_hyphen_values = true)]
        a: String,

        /// Unix timestamp or YYYY-MM-DD[THH:MM[:SS]]
        #[arg(allow_hyphen_values = true)]
        b: String,
    },

    /// Run an RTC session against a simulated console
    Probe {
        /// RTC time at power on, as a Unix timestamp
        #[arg(long, allow_hyphen_values = true)]
        unix: Option<i64>,

        /// Leave the cartridge port empty
        #[arg(long)]
        absent: bool,

        /// Run the joybus on DMA write, like some emulators
        #[arg(long)]
        exec_on_write: bool,

        /// Present as an emulator (skips the settle window)
        #[arg(long)]
        emulator: bool,

        /// Clock offset in seconds
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i64>,

        /// Set the clock to this time (overrides --offset)
        #[arg(long)]
        set: Option<String>,

        /// Seconds to let pass before reading
        #[arg(long, default_value_t = 0)]
        wait: u64,

        /// strftime format for the readings
        #[arg(short, long, default_value = "%c")]
        format: String,
    },
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .compact()
        .finish()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Fmt { unix, format } => {
            let tm = from_unix(unix);
            println!("{}", render(&format, &tm)?);
        }

        Commands::Diff { a, b } => {
            let a = parse_time(&a)?;
            let b = parse_time(&b)?;
            println!("{}", time_diff(&a, &b));
        }

        Commands::Probe {
            unix,
            absent,
            exec_on_write,
            emulator,
            offset,
            set,
            wait,
            format,
        } => {
            let defaults = ConsoleConfig::default();
            let config = ConsoleConfig {
                unix_time: unix.unwrap_or(defaults.unix_time),
                rtc_present: !absent,
                exec_on_write,
                emulator,
                ..defaults
            };
            probe(config, offset, set.as_deref(), wait, &format)?;
        }
    }

    Ok(())
}

fn probe(
    config: ConsoleConfig,
    offset: Option<i64>,
    set: Option<&str>,
    wait: u64,
    format: &str,
) -> Result<()> {
    let mut rtc = Rtc::new(Console::new(config), RtcConfig::default());

    let present = rtc.init();
    info!(present, exec_on_write_bug = rtc.exec_on_write_bug(), "probe finished");
    println!("present:        {present}");
    println!("exec-on-write:  {}", rtc.exec_on_write_bug());
    println!("session:        {:?}", rtc.session());

    if wait > 0 {
        rtc.hardware_mut().advance_seconds(wait);
    }

    if let Some(offset) = offset {
        rtc.set_offset(offset);
    }
    if let Some(set) = set {
        let target = parse_time(set)?;
        rtc.set_time(&target);
    }
    println!("offset:         {}s", rtc.offset());

    match rtc.get_time_raw() {
        Ok(raw) => println!("raw:            {}", render(format, &raw)?),
        Err(e) => println!("raw:            {e} (using {})", e.fallback()),
    }
    match rtc.get_time() {
        Ok(now) => println!("adjusted:       {}", render(format, &now)?),
        Err(e) => println!("adjusted:       {e} (using {})", e.fallback()),
    }
    println!("time of day:    {}", rtc.get_time_of_day());

    let console = rtc.into_inner();
    println!(
        "si:             {} DMA writes, {} DMA reads, {} joybus runs",
        console.stats.dma_writes, console.stats.dma_reads, console.stats.joybus_runs
    );
    Ok(())
}
