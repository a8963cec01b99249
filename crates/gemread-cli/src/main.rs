use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::glob;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use gemread_core::frames::{ScanHeader, VfatFrame};
use gemread_core::sink::{ChannelHits, EventPrinter, FrameSink, JsonLinesWriter, ThresholdCurve};
use gemread_core::stream::{
    AmcStream, Event, EventStream, FrameDecoder, ReadoutStream, open_scan, run,
};
use gemread_core::{DecodeError, DecoderConfig, FrameKind, RunError, RunSummary, StreamEnd};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit ",
    env!("GEMREAD_BUILD_COMMIT"),
    ", ",
    env!("GEMREAD_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  gemread readout run042.dat --print 3\n  gemread scan thldscan.dat --exclude-chip ded\n  gemread amc 'runs/run7*.dat' --stdout --max-events 100";

#[derive(Parser, Debug)]
#[command(name = "gemread")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Offline decoder for GEM/VFAT2 hex readout dumps.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a readout dump: a sequence of GEB board frames.
    Readout(DecodeArgs),
    /// Decode a threshold-scan dump: scan header, then scan-layout VFAT frames.
    Scan(DecodeArgs),
    /// Decode an AMC dump: full readout frames wrapping GEB board frames.
    Amc(DecodeArgs),
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Path (or single-match glob) of the dump to decode
    input: PathBuf,

    /// TOML decoder configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Largest VFAT count a GEB header may announce
    #[arg(long)]
    max_vfats: Option<u32>,

    /// Largest GEB count an AMC header may announce
    #[arg(long)]
    max_gebs: Option<u32>,

    /// Largest number of threshold bins a scan header may describe
    #[arg(long)]
    max_bins: Option<u64>,

    /// Stop after this many events
    #[arg(long)]
    max_events: Option<u64>,

    /// Dump the first N events to stderr
    #[arg(long, value_name = "N")]
    print: Option<u64>,

    /// Write decoded events as JSON lines to this file
    #[arg(short = 'o', long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Write decoded events as JSON lines to stdout
    #[arg(long)]
    stdout: bool,

    /// Leave this chip id (hex) out of the channel histogram; repeatable
    #[arg(long = "exclude-chip", value_name = "HEX", value_parser = parse_chip_id)]
    exclude_chips: Vec<u16>,

    /// Exit with a non-zero code if any control bit mismatch was seen
    #[arg(long)]
    strict: bool,

    /// Suppress non-error output
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Readout,
    Scan,
    Amc,
}

impl Family {
    fn name(self) -> &'static str {
        match self {
            Family::Readout => "readout",
            Family::Scan => "threshold-scan",
            Family::Amc => "AMC",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Readout(args) => cmd_decode(Family::Readout, args),
        Commands::Scan(args) => cmd_decode(Family::Scan, args),
        Commands::Amc(args) => cmd_decode(Family::Amc, args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

struct Outcome {
    summary: RunSummary,
    hits: ChannelHits,
}

fn cmd_decode(family: Family, args: DecodeArgs) -> Result<(), CliError> {
    init_tracing(args.verbose, args.quiet)?;

    let resolved_input = resolve_input_path(&args.input)?;
    validate_input_file(&resolved_input)?;
    check_distinct_outputs(&resolved_input, &args)?;
    let config = load_config(&args)?;

    let file = File::open(&resolved_input)
        .with_context(|| format!("Failed to open input file: {}", resolved_input.display()))?;
    let reader = BufReader::new(file);

    let mut curve = None;
    let outcome = match family {
        Family::Readout => {
            let mut stream = ReadoutStream::readout(reader, &config);
            decode_stream(&mut stream, family, &args, &config, Vec::new())?
        }
        Family::Amc => {
            let mut stream = AmcStream::amc(reader, &config);
            decode_stream(&mut stream, family, &args, &config, Vec::new())?
        }
        Family::Scan => {
            let (header, mut stream) =
                open_scan(reader).map_err(|err| decode_failure(family, &err, None))?;
            if !args.quiet {
                print_scan_header(&header);
            }
            let mut scan_curve = ThresholdCurve::new(header, config.max_scan_bins)
                .map_err(|err| decode_failure(family, &err, None))?;
            let mut extra: Vec<Box<dyn FrameSink<VfatFrame> + '_>> = Vec::new();
            extra.push(Box::new(&mut scan_curve));
            let outcome = decode_stream(&mut stream, family, &args, &config, extra)?;
            curve = Some(scan_curve);
            outcome
        }
    };

    if !args.quiet {
        print_summary(&outcome.summary, &outcome.hits);
        if let Some(curve) = curve.as_ref() {
            eprintln!("{curve}");
        }
    }

    if args.strict && outcome.summary.control_mismatches > 0 {
        return Err(CliError::new(
            format!(
                "control bit mismatches in {} of {} events",
                outcome.summary.control_mismatches, outcome.summary.events
            ),
            Some("use --print or -v to inspect the affected frames".to_string()),
        ));
    }
    Ok(())
}

fn decode_stream<'a, D>(
    stream: &mut EventStream<BufReader<File>, D>,
    family: Family,
    args: &DecodeArgs,
    config: &DecoderConfig,
    extra: Vec<Box<dyn FrameSink<D::Frame> + 'a>>,
) -> Result<Outcome, CliError>
where
    D: FrameDecoder,
    D::Frame: Event,
{
    let mut hits = ChannelHits::excluding(config.exclude_chip_ids.iter().copied());
    let result = {
        let mut sinks: Vec<Box<dyn FrameSink<D::Frame> + '_>> = extra;
        if config.print_events > 0 {
            sinks.push(Box::new(EventPrinter::new(io::stderr(), config.print_events)));
        }
        if let Some(path) = args.output.as_ref() {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            sinks.push(Box::new(JsonLinesWriter::new(BufWriter::new(file))));
        } else if args.stdout {
            sinks.push(Box::new(JsonLinesWriter::new(io::stdout().lock())));
        }
        sinks.push(Box::new(&mut hits));
        run(stream, &mut sinks, config.max_events)
    };

    match result {
        Ok(summary) => Ok(Outcome { summary, hits }),
        Err(RunError::Decode { source, summary }) => {
            if !args.quiet {
                print_summary(&summary, &hits);
            }
            Err(decode_failure(family, &source, Some(&summary)))
        }
        Err(RunError::Sink(err)) => Err(CliError::new(
            format!("failed to write decoded events: {err}"),
            Some("check the output path and free disk space".to_string()),
        )),
    }
}

fn decode_failure(family: Family, err: &DecodeError, summary: Option<&RunSummary>) -> CliError {
    let decoded = summary.map_or(0, |summary| summary.events);
    let hint = match err {
        DecodeError::TruncatedFrame { .. } => format!(
            "the input ends in the middle of a frame; the {decoded} events before it were decoded"
        ),
        DecodeError::MalformedToken { .. } => format!(
            "the input does not look like a {} dump; check the subcommand",
            family.name()
        ),
        DecodeError::MalformedHeader { .. } => {
            "the first three tokens must be minTh maxTh stepSize with an evenly divisible range"
                .to_string()
        }
        DecodeError::UnreasonableCount {
            frame: FrameKind::ScanHeader,
            ..
        } => "the scan range is implausibly wide; raise --max-bins only if the scan is genuine"
            .to_string(),
        DecodeError::UnreasonableCount { .. } => {
            "the stream is misaligned or corrupt; raise --max-vfats/--max-gebs only if the count is genuine"
                .to_string()
        }
        DecodeError::StreamFault(_) => "the input could not be read to the end".to_string(),
    };
    let end = match err.stream_end() {
        StreamEnd::Truncated => "truncated",
        _ => "failed",
    };
    CliError::new(
        format!("{} decode {end}: {err}", family.name()),
        Some(hint),
    )
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<(), CliError> {
    let directive = match (quiet, verbose) {
        (true, _) => "gemread_core=error",
        (false, 0) => "gemread_core=info",
        (false, 1) => "gemread_core=debug",
        (false, _) => "gemread_core=trace",
    };
    let directive: Directive = directive
        .parse()
        .with_context(|| format!("invalid log directive: {directive}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| CliError::new(format!("failed to initialise logging: {err}"), None))
}

fn load_config(args: &DecodeArgs) -> Result<DecoderConfig, CliError> {
    let mut config = match args.config.as_ref() {
        Some(path) => DecoderConfig::load(path).map_err(|err| {
            CliError::new(
                format!("failed to load config {}: {err}", path.display()),
                Some("see DecoderConfig for the accepted keys".to_string()),
            )
        })?,
        None => DecoderConfig::default(),
    };
    if let Some(max_vfats) = args.max_vfats {
        config.max_vfats_per_geb = max_vfats;
    }
    if let Some(max_gebs) = args.max_gebs {
        config.max_gebs_per_amc = max_gebs;
    }
    if let Some(max_bins) = args.max_bins {
        config.max_scan_bins = max_bins;
    }
    if args.max_events.is_some() {
        config.max_events = args.max_events;
    }
    if let Some(print) = args.print {
        config.print_events = print;
    }
    config.exclude_chip_ids.extend(&args.exclude_chips);
    Ok(config)
}

fn parse_chip_id(value: &str) -> Result<u16, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    let chip_id =
        u16::from_str_radix(digits, 16).map_err(|err| format!("invalid hex chip id: {err}"))?;
    if chip_id > 0xfff {
        return Err(format!("chip id 0x{chip_id:x} does not fit in 12 bits"));
    }
    Ok(chip_id)
}

fn print_scan_header(header: &ScanHeader) {
    eprintln!(
        "scan header: minTh {} maxTh {} stepSize {} ({} bins)",
        header.min_th,
        header.max_th,
        header.step_size,
        header.bin_count()
    );
}

fn print_summary(summary: &RunSummary, hits: &ChannelHits) {
    eprintln!(
        "decoded {} events ({} chip frames), {} with control bit mismatches, stream {}{}",
        summary.events,
        summary.chips,
        summary.control_mismatches,
        summary.end,
        if summary.stopped_early {
            " (stopped at --max-events)"
        } else {
            ""
        }
    );
    eprintln!("{hits}");
}

fn check_distinct_outputs(input: &Path, args: &DecodeArgs) -> Result<(), CliError> {
    let input_abs = fs::canonicalize(input)
        .with_context(|| format!("Failed to resolve input path: {}", input.display()))?;
    if let Some(path) = args.output.as_ref() {
        if resolve_output_path(path)?.as_deref() == Some(input_abs.as_path()) {
            return Err(CliError::new(
                format!("output path must differ from input: {}", path.display()),
                Some("choose a different output path".to_string()),
            ));
        }
    }
    Ok(())
}

fn resolve_output_path(path: &Path) -> Result<Option<PathBuf>, CliError> {
    let Some(file_name) = path.file_name() else {
        return Err(CliError::new(
            format!("invalid output path: {}", path.display()),
            Some("name a file, not a directory".to_string()),
        ));
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    // A parent that does not exist yet cannot contain the input.
    Ok(fs::canonicalize(parent)
        .ok()
        .map(|dir| dir.join(file_name)))
}

fn validate_input_file(input: &Path) -> Result<(), CliError> {
    if !input.exists() {
        return Err(CliError::new(
            format!("input file not found: {}", input.display()),
            Some("pass the path of a hex dump written by the readout software".to_string()),
        ));
    }
    if !input.is_file() {
        return Err(CliError::new(
            format!("input is not a file: {}", input.display()),
            Some("pass a single dump file, not a directory".to_string()),
        ));
    }
    Ok(())
}

fn resolve_input_path(input: &Path) -> Result<PathBuf, CliError> {
    let pattern = input.to_string_lossy();
    if !is_glob_pattern(&pattern) {
        return Ok(input.to_path_buf());
    }

    let mut matches = Vec::new();
    let paths = glob(&pattern).map_err(|err| {
        CliError::new(
            format!("invalid input pattern '{}'", pattern),
            Some(format!("pattern error: {}", err.msg)),
        )
    })?;
    for entry in paths {
        let path = entry.map_err(|err| {
            CliError::new(
                format!("invalid input pattern '{}'", pattern),
                Some(format!("pattern error: {}", err)),
            )
        })?;
        if path.is_file() {
            matches.push(path);
        }
    }

    if matches.is_empty() {
        return Err(CliError::new(
            format!("no files match pattern '{}'", pattern),
            Some("check the path or quote the pattern".to_string()),
        ));
    }
    if matches.len() > 1 {
        let listed = matches
            .iter()
            .take(3)
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let more = if matches.len() > 3 { ", ..." } else { "" };
        return Err(CliError::new(
            format!(
                "multiple files match pattern '{}' ({} matches); matches: {listed}{more}",
                pattern,
                matches.len()
            ),
            Some("pass a single dump file, or run once per file".to_string()),
        ));
    }

    Ok(matches.remove(0))
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains('*') || input.contains('?') || input.contains('[')
}
