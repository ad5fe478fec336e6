// Command-line front end for oxisync.
//
// Three rdiff-style subcommands (signature, delta, patch) plus inspect and
// config.  Streams default to stdin/stdout where a path is omitted; the
// basis given to `patch` must be a seekable file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::delta::{DeltaReader, EncodeOptions, Instruction, encode_delta_with_options};
use crate::error::Error;
use crate::hash::{BLAKE2_SIG_MAGIC, HashFamily, MD4_SIG_MAGIC};
use crate::patch::apply_delta;
use crate::signature::{DEFAULT_BLOCK_LEN, Signature, SignatureOptions};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_MAX_LITERAL: u64 = 1 << 20; // 1 MiB

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Byte size parsing (supports K, M, G suffixes)
// ---------------------------------------------------------------------------

fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".into());
    }
    let (num_part, multiplier) = match s.as_bytes().last() {
        Some(b'k' | b'K') => (&s[..s.len() - 1], 1024u64),
        Some(b'm' | b'M') => (&s[..s.len() - 1], 1024 * 1024),
        Some(b'g' | b'G') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1u64),
    };
    let num: u64 = num_part
        .trim()
        .parse()
        .map_err(|e| format!("invalid size '{s}': {e}"))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size overflow: '{s}'"))
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// rsync-style signature, delta and patch.
#[derive(Parser, Debug)]
#[command(
    name = "oxisync",
    version,
    about = "rsync-style signature, delta and patch",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write the block signature of a basis file.
    Signature(SignatureArgs),
    /// Compute a delta from a signature and a new file.
    Delta(DeltaArgs),
    /// Rebuild a file from its basis and a delta.
    Patch(PatchArgs),
    /// Describe a signature or delta file.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HashArg {
    Md4,
    Blake2,
}

impl From<HashArg> for HashFamily {
    fn from(h: HashArg) -> Self {
        match h {
            HashArg::Md4 => HashFamily::Md4,
            HashArg::Blake2 => HashFamily::Blake2,
        }
    }
}

#[derive(Args, Debug)]
struct SignatureArgs {
    /// Strong hash family.
    #[arg(long = "hash", value_enum, default_value_t = HashArg::Blake2)]
    hash: HashArg,

    /// Basis block length (supports K/M/G suffix).
    #[arg(long = "block-size", short = 'b', value_parser = parse_byte_size, default_value_t = u64::from(DEFAULT_BLOCK_LEN))]
    block_size: u64,

    /// Strong sum length in bytes (default: full digest).
    #[arg(long = "sum-size", short = 'S')]
    sum_size: Option<u32>,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Basis file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    basis: Option<PathBuf>,

    /// Signature output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    signature: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DeltaArgs {
    /// Largest literal command to emit (supports K/M/G suffix).
    #[arg(long = "max-literal", value_parser = parse_byte_size, default_value_t = DEFAULT_MAX_LITERAL)]
    max_literal: u64,

    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Signature of the basis.
    #[arg(value_hint = ValueHint::FilePath)]
    signature: PathBuf,

    /// New file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    target: Option<PathBuf>,

    /// Delta output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Write output to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,

    /// Basis file.
    #[arg(value_hint = ValueHint::FilePath)]
    basis: PathBuf,

    /// Delta file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    delta: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Signature or delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Signature,
    Delta,
    Patch,
    Inspect,
    Config,
}

struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    hash: HashFamily,
    block_len: u64,
    strong_len: Option<u32>,
    max_literal: u64,
    /// Signature file (delta) or basis file (patch).
    source_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            hash: HashFamily::default(),
            block_len: u64::from(DEFAULT_BLOCK_LEN),
            strong_len: None,
            max_literal: DEFAULT_MAX_LITERAL,
            source_file: None,
            input_file: None,
            output_file: None,
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    match &cli.command {
        Cmd::Signature(args) => Options {
            use_stdout: args.stdout,
            hash: args.hash.into(),
            block_len: args.block_size,
            strong_len: args.sum_size,
            input_file: args.basis.clone(),
            output_file: args.signature.clone(),
            ..Options::new(Command::Signature, &cli)
        },
        Cmd::Delta(args) => Options {
            use_stdout: args.stdout,
            max_literal: args.max_literal,
            source_file: Some(args.signature.clone()),
            input_file: args.target.clone(),
            output_file: args.delta.clone(),
            ..Options::new(Command::Delta, &cli)
        },
        Cmd::Patch(args) => Options {
            use_stdout: args.stdout,
            source_file: Some(args.basis.clone()),
            input_file: args.delta.clone(),
            output_file: args.output.clone(),
            ..Options::new(Command::Patch, &cli)
        },
        Cmd::Inspect(args) => Options {
            input_file: Some(args.input.clone()),
            ..Options::new(Command::Inspect, &cli)
        },
        Cmd::Config => Options::new(Command::Config, &cli),
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxisync".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_signature_options(&opts);
        let _ = build_encode_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Option mapping
// ---------------------------------------------------------------------------

fn build_signature_options(opts: &Options) -> Result<SignatureOptions, Error> {
    let block_len = u32::try_from(opts.block_len).map_err(|_| {
        Error::InvalidConfig(format!("block size {} exceeds {}", opts.block_len, u32::MAX))
    })?;
    let strong_len = opts
        .strong_len
        .unwrap_or(opts.hash.digest_len() as u32);
    SignatureOptions::new(opts.hash, block_len, strong_len)
}

fn build_encode_options(opts: &Options) -> Result<EncodeOptions, Error> {
    let max_literal = usize::try_from(opts.max_literal).map_err(|_| {
        Error::InvalidConfig(format!("max literal {} too large", opts.max_literal))
    })?;
    let enc = EncodeOptions { max_literal };
    enc.validate()?;
    Ok(enc)
}

// ---------------------------------------------------------------------------
// Stream helpers
// ---------------------------------------------------------------------------

fn open_input(path: Option<&Path>, what: &str) -> Result<Box<dyn Read>, i32> {
    match path {
        Some(path) => match File::open(path) {
            Ok(f) => Ok(Box::new(BufReader::with_capacity(BUF_SIZE, f))),
            Err(e) => {
                eprintln!("oxisync: {what} file: {}: {e}", path.display());
                Err(1)
            }
        },
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(opts: &Options) -> Result<Box<dyn Write>, i32> {
    match (opts.use_stdout, &opts.output_file) {
        (true, _) | (_, None) => Ok(Box::new(BufWriter::with_capacity(
            BUF_SIZE,
            io::stdout().lock(),
        ))),
        (false, Some(path)) => {
            if path.exists() && !opts.force {
                eprintln!(
                    "oxisync: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return Err(1);
            }
            match File::create(path) {
                Ok(f) => Ok(Box::new(BufWriter::with_capacity(BUF_SIZE, f))),
                Err(e) => {
                    eprintln!("oxisync: output file: {}: {e}", path.display());
                    Err(1)
                }
            }
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => eprintln!("{s}"),
        Err(e) => eprintln!("oxisync: json: {e}"),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("oxisync version {version} (Rust)");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();

    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("DEFAULT_HASH={}", HashFamily::default());
    eprintln!("DEFAULT_BLOCK_LEN={DEFAULT_BLOCK_LEN}");
    eprintln!("DEFAULT_MAX_LITERAL={DEFAULT_MAX_LITERAL}");
    eprintln!("MD4_SIG_MAGIC={MD4_SIG_MAGIC:#010x}");
    eprintln!("BLAKE2_SIG_MAGIC={BLAKE2_SIG_MAGIC:#010x}");
    eprintln!("DELTA_MAGIC={:#010x}", crate::delta::DELTA_MAGIC);
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Signature command
// ---------------------------------------------------------------------------

fn cmd_signature(opts: &Options) -> i32 {
    let sig_opts = match build_signature_options(opts) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("oxisync: {e}");
            return 1;
        }
    };
    let basis = match open_input(opts.input_file.as_deref(), "basis") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let output = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    #[cfg(feature = "parallel")]
    let result = crate::signature::build_signature_parallel(basis, output, sig_opts);
    #[cfg(not(feature = "parallel"))]
    let result = crate::signature::build_signature(basis, output, sig_opts);

    let sig = match result {
        Ok(sig) => sig,
        Err(e) => {
            eprintln!("oxisync: signature error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxisync: signature: {} blocks, block size {}, {} sum size {}",
            sig.len(),
            sig.block_len(),
            sig.family(),
            sig.strong_len()
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "signature",
            "hash": sig.family().name(),
            "block_len": sig.block_len(),
            "strong_len": sig.strong_len(),
            "blocks": sig.len(),
            "signature_size": sig.encoded_len(),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Delta command
// ---------------------------------------------------------------------------

fn cmd_delta(opts: &Options) -> i32 {
    let enc_opts = match build_encode_options(opts) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("oxisync: {e}");
            return 1;
        }
    };

    let sig_reader = match open_input(opts.source_file.as_deref(), "signature") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let sig = match Signature::read_from(sig_reader) {
        Ok(sig) => sig,
        Err(e) => {
            eprintln!("oxisync: signature: {e}");
            return 1;
        }
    };
    let index = sig.build_index();

    let target = match open_input(opts.input_file.as_deref(), "input") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let output = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let stats = match encode_delta_with_options(&index, target, output, enc_opts) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxisync: delta error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxisync: delta: input size: {}, delta size: {}, copies: {} ({} bytes), \
             literals: {} ({} bytes), false matches: {}",
            stats.target_len,
            stats.delta_len,
            stats.copy_cmds,
            stats.copy_bytes,
            stats.literal_cmds,
            stats.literal_bytes,
            stats.false_matches
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "delta",
            "input_size": stats.target_len,
            "delta_size": stats.delta_len,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "literal_cmds": stats.literal_cmds,
            "literal_bytes": stats.literal_bytes,
            "false_matches": stats.false_matches,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options) -> i32 {
    let Some(basis_path) = opts.source_file.as_deref() else {
        eprintln!("oxisync: patch requires a basis file");
        return 1;
    };
    let basis = match File::open(basis_path) {
        Ok(f) => BufReader::with_capacity(BUF_SIZE, f),
        Err(e) => {
            eprintln!("oxisync: basis file: {}: {e}", basis_path.display());
            return 1;
        }
    };
    let delta = match open_input(opts.input_file.as_deref(), "delta") {
        Ok(r) => r,
        Err(code) => return code,
    };
    let output = match open_output(opts) {
        Ok(w) => w,
        Err(code) => return code,
    };

    let stats = match apply_delta(basis, delta, output) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxisync: patch error: {e}");
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxisync: patch: output size: {}, copies: {}, literals: {}",
            stats.output_len, stats.copy_cmds, stats.literal_cmds
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "patch",
            "output_size": stats.output_len,
            "copy_cmds": stats.copy_cmds,
            "copy_bytes": stats.copy_bytes,
            "literal_cmds": stats.literal_cmds,
            "literal_bytes": stats.literal_bytes,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = opts.input_file.as_deref() else {
        eprintln!("oxisync: inspect requires an input file");
        return 1;
    };
    let mut magic = [0u8; 4];
    let read_magic = File::open(path).and_then(|mut f| f.read_exact(&mut magic));
    if let Err(e) = read_magic {
        eprintln!("oxisync: {}: {e}", path.display());
        return 1;
    }
    let reader = match open_input(Some(path), "input") {
        Ok(r) => r,
        Err(code) => return code,
    };

    match u32::from_be_bytes(magic) {
        MD4_SIG_MAGIC | BLAKE2_SIG_MAGIC => inspect_signature(opts, reader),
        crate::delta::DELTA_MAGIC => inspect_delta(opts, reader),
        other => {
            eprintln!(
                "oxisync: {}: unrecognized magic {other:#010x}",
                path.display()
            );
            1
        }
    }
}

fn inspect_signature(opts: &Options, reader: Box<dyn Read>) -> i32 {
    let sig = match Signature::read_from(reader) {
        Ok(sig) => sig,
        Err(e) => {
            eprintln!("oxisync: {e}");
            return 1;
        }
    };

    println!("signature hash:               {}", sig.family());
    println!("signature magic:              {:#010x}", sig.family().magic());
    println!("signature block length:       {}", sig.block_len());
    println!("signature strong length:      {}", sig.strong_len());
    println!("signature blocks:             {}", sig.len());

    if opts.verbose > 0 {
        println!("  Block        Offset  Weak      Strong");
        for (i, block) in sig.blocks().iter().enumerate() {
            println!(
                "  {i:06}  {:>12}  {:08x}  {}",
                i as u64 * u64::from(sig.block_len()),
                block.weak,
                hex(&block.strong)
            );
        }
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "inspect",
            "kind": "signature",
            "hash": sig.family().name(),
            "block_len": sig.block_len(),
            "strong_len": sig.strong_len(),
            "blocks": sig.len(),
        }));
    }

    0
}

fn inspect_delta(opts: &Options, reader: Box<dyn Read>) -> i32 {
    let reader = match DeltaReader::new(reader) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("oxisync: {e}");
            return 1;
        }
    };

    let mut copy_cmds = 0u64;
    let mut copy_bytes = 0u64;
    let mut literal_cmds = 0u64;
    let mut literal_bytes = 0u64;
    let mut target_offset = 0u64;

    if opts.verbose > 0 {
        println!("  Offset        Command  Length       Basis offset");
    }
    for insn in reader {
        let insn = match insn {
            Ok(i) => i,
            Err(e) => {
                eprintln!("oxisync: {e}");
                return 1;
            }
        };
        match &insn {
            Instruction::Copy { offset, len } => {
                copy_cmds += 1;
                copy_bytes += len;
                if opts.verbose > 0 {
                    println!("  {target_offset:012}  COPY     {len:<11}  {offset}");
                }
            }
            Instruction::Literal(data) => {
                literal_cmds += 1;
                literal_bytes += data.len() as u64;
                if opts.verbose > 0 {
                    println!("  {target_offset:012}  LITERAL  {}", data.len());
                }
            }
            Instruction::End => {}
        }
        target_offset += insn.output_len();
    }

    println!("delta copy commands:          {copy_cmds}");
    println!("delta copy bytes:             {copy_bytes}");
    println!("delta literal commands:       {literal_cmds}");
    println!("delta literal bytes:          {literal_bytes}");
    println!("delta output length:          {target_offset}");

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "inspect",
            "kind": "delta",
            "copy_cmds": copy_cmds,
            "copy_bytes": copy_bytes,
            "literal_cmds": literal_cmds,
            "literal_bytes": literal_bytes,
            "output_size": target_offset,
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut opts = resolve_options(cli);

    let default_filter = match (opts.quiet, opts.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Warn if -c overrides output filename.
    if opts.use_stdout
        && let Some(path) = opts.output_file.take()
        && !opts.quiet
    {
        eprintln!(
            "oxisync: warning: -c option overrides output filename: {}",
            path.display()
        );
    }

    let exit_code = match opts.command {
        Command::Signature => cmd_signature(&opts),
        Command::Delta => cmd_delta(&opts),
        Command::Patch => cmd_patch(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
