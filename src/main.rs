use binarycookies::{
    ChecksumOrder, ChecksumPolicy, ChecksumStatus, CookieInput, DecodeOptions, EncodeOptions,
    TimestampPrecision,
};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "binarycookies", about = "Read and write Safari Cookies.binarycookies files", disable_version_flag = true)]
struct Cli {
    /// Show version and exit
    #[arg(short = 'v', long = "version")]
    version: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Json,
    Netscape,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a binarycookies file and print its cookies
    Read {
        input: PathBuf,
        #[arg(short, long, value_enum, default_value = "json")]
        output: Output,
        /// Fail on checksum mismatch instead of warning
        #[arg(long)]
        strict: bool,
    },
    /// Encode a JSON object or array of cookies into a binarycookies file
    Write {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Keep sub-second timestamp precision
        #[arg(long)]
        subsecond: bool,
        /// Maximum cookies per page (default: all in one page)
        #[arg(long)]
        per_page: Option<usize>,
        /// Write the checksum little-endian
        #[arg(long)]
        little_endian_checksum: bool,
        /// Append Safari's 8-byte footer
        #[arg(long)]
        footer: bool,
    },
    /// Show page layout and checksum status
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if cli.version {
        println!("binarycookies version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { input, output, strict } => {
            let opts = DecodeOptions {
                checksum: if strict { ChecksumPolicy::Strict } else { ChecksumPolicy::Warn },
            };
            let decoded = binarycookies::load_with(BufReader::new(File::open(&input)?), &opts)?;
            match output {
                Output::Json => println!("{}", serde_json::to_string_pretty(&decoded.cookies)?),
                Output::Netscape => {
                    println!("# Netscape HTTP Cookie File");
                    for c in &decoded.cookies {
                        println!("{}", c.to_netscape_line());
                    }
                }
            }
        }

        // ── Write ────────────────────────────────────────────────────────────
        Commands::Write { input, output, subsecond, per_page, little_endian_checksum, footer } => {
            let value: serde_json::Value = serde_json::from_reader(BufReader::new(File::open(&input)?))?;
            let cookies = CookieInput::try_from(value)?;
            let opts = EncodeOptions {
                precision:        if subsecond { TimestampPrecision::Subsecond } else { TimestampPrecision::WholeSeconds },
                cookies_per_page: per_page,
                checksum_order:   if little_endian_checksum { ChecksumOrder::Little } else { ChecksumOrder::Big },
                footer,
            };
            // Encode before creating the file so a validation failure leaves no output.
            let bytes = binarycookies::dumps_with(cookies, &opts)?;
            let mut out = BufWriter::new(File::create(&output)?);
            out.write_all(&bytes)?;
            out.flush()?;
            println!("Wrote: {} ({} bytes)", output.display(), bytes.len());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let decoded = binarycookies::load_with(File::open(&input)?, &DecodeOptions::default())?;
            println!("── Cookies.binarycookies ────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Pages          {}", decoded.pages.len());
            println!("  Cookies        {}", decoded.cookies.len());
            println!("  Checksum       {}", match decoded.checksum {
                ChecksumStatus::Verified(ChecksumOrder::Big)    => "ok (big-endian)".to_string(),
                ChecksumStatus::Verified(ChecksumOrder::Little) => "ok (little-endian)".to_string(),
                ChecksumStatus::Mismatch(w)                     => w.to_string(),
                ChecksumStatus::Absent                          => "absent".to_string(),
                ChecksumStatus::Skipped                         => "skipped".to_string(),
            });
            println!("{:>6} {:>10} {:>8} {:>8}", "Page", "Offset", "Size", "Cookies");
            for (i, p) in decoded.pages.iter().enumerate() {
                println!("{:>6} {:>10} {:>8} {:>8}  magic {}",
                    i, p.offset, p.size, p.cookie_count, hex::encode(p.magic));
            }
        }
    }

    Ok(())
}
