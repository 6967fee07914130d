//! ebcot CLI - code-block entropy coding from the command line.
//!
//! Encodes planes of quantized wavelet coefficients into code-block files,
//! decodes them back (optionally truncated to a number of passes) and prints
//! the rate/distortion table of a coded block.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use ebcot_rs::block_file::{read_block, write_block};
use ebcot_rs::{
    CodeBlockDecoder, CodeBlockEncoder, CodeBlockStyle, CodingParameters, EncodedCodeBlock,
    Reconstruction, SubbandOrientation,
};
use env_logger::{Builder, Env};
use log::LevelFilter;
use std::fs;
use std::path::PathBuf;

/// JPEG 2000 tier-1 code-block coder
#[derive(Parser)]
#[command(name = "ebcot")]
#[command(version)]
#[command(about = "Encode and decode JPEG 2000 code-blocks", long_about = None)]
#[command(after_help = "EXAMPLES:
    ebcot encode -i plane.raw -o block.t1 -w 64 -H 64 --orientation hh --bypass
    ebcot decode -i block.t1 -o plane.raw --passes 10
    ebcot info -i block.t1

Planes are raw little-endian 32-bit signed integers, row by row.")]
struct Cli {
    /// Raise the log level (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a coefficient plane into a code-block file
    #[command(visible_alias = "e")]
    Encode {
        /// Raw coefficient plane
        #[arg(short, long)]
        input: PathBuf,

        /// Code-block file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Block width in samples
        #[arg(short, long)]
        width: u32,

        /// Block height in samples
        #[arg(short = 'H', long)]
        height: u32,

        /// Sub-band the block belongs to
        #[arg(long, default_value = "ll", value_enum)]
        orientation: Orientation,

        /// Bypass the arithmetic coder on the lower bit-planes
        #[arg(long)]
        bypass: bool,

        /// Reset context probabilities after every pass
        #[arg(long)]
        reset: bool,

        /// Terminate the coder after every pass
        #[arg(long)]
        termall: bool,

        /// Vertically stripe-causal contexts
        #[arg(long)]
        vsc: bool,

        /// Predictable termination
        #[arg(long)]
        pterm: bool,

        /// Segmentation symbols after cleanup passes
        #[arg(long)]
        segsym: bool,

        /// Distortion weight of the sub-band
        #[arg(long, default_value = "1.0")]
        weight: f64,
    },

    /// Decode a code-block file into a coefficient plane
    #[command(visible_alias = "d")]
    Decode {
        /// Code-block file
        #[arg(short, long)]
        input: PathBuf,

        /// Raw coefficient plane to write
        #[arg(short, long)]
        output: PathBuf,

        /// Decode only the first N passes
        #[arg(short, long)]
        passes: Option<usize>,

        /// Reconstruct undecoded bits at the middle of their interval
        #[arg(long)]
        midpoint: bool,
    },

    /// Show geometry, style and the pass table of a code-block file
    #[command(visible_alias = "i")]
    Info {
        /// Code-block file
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Orientation {
    Ll,
    Hl,
    Lh,
    Hh,
}

impl From<Orientation> for SubbandOrientation {
    fn from(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Ll => SubbandOrientation::LL,
            Orientation::Hl => SubbandOrientation::HL,
            Orientation::Lh => SubbandOrientation::LH,
            Orientation::Hh => SubbandOrientation::HH,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut builder = Builder::from_env(Env::new().default_filter_or("warn"));
    if verbose > 0 {
        builder.filter_module("ebcot_rs", level);
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            width,
            height,
            orientation,
            bypass,
            reset,
            termall,
            vsc,
            pterm,
            segsym,
            weight,
        } => {
            let mut style = CodeBlockStyle::empty();
            style.set(CodeBlockStyle::BYPASS, bypass);
            style.set(CodeBlockStyle::RESET, reset);
            style.set(CodeBlockStyle::TERMALL, termall);
            style.set(CodeBlockStyle::VSC, vsc);
            style.set(CodeBlockStyle::PTERM, pterm);
            style.set(CodeBlockStyle::SEGSYM, segsym);
            let params = CodingParameters {
                orientation: orientation.into(),
                style,
                distortion_weight: weight,
                ..Default::default()
            };
            encode_plane(&input, &output, width, height, &params)
        }
        Commands::Decode {
            input,
            output,
            passes,
            midpoint,
        } => decode_block(&input, &output, passes, midpoint),
        Commands::Info { input } => show_info(&input),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_plane(input: &PathBuf) -> Result<Vec<i32>, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    if bytes.len() % 4 != 0 {
        return Err(format!("{:?} is not a whole number of 32-bit samples", input).into());
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn encode_plane(
    input: &PathBuf,
    output: &PathBuf,
    width: u32,
    height: u32,
    params: &CodingParameters,
) -> Result<(), Box<dyn std::error::Error>> {
    let plane = read_plane(input)?;
    let encoded = CodeBlockEncoder::new().encode(params, width, height, &plane)?;
    fs::write(output, write_block(&encoded)?)?;

    println!(
        "✓ Encoded {}x{} code-block to {:?}: {} bytes in {} passes",
        width,
        height,
        output,
        encoded.data.len(),
        encoded.passes.len()
    );
    print_passes(&encoded);
    Ok(())
}

fn decode_block(
    input: &PathBuf,
    output: &PathBuf,
    passes: Option<usize>,
    midpoint: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let block = read_block(&fs::read(input)?)?;
    let segments = match passes {
        Some(n) => block.truncated_segments(n),
        None => block.segments(),
    };
    let mut params = block.decode_parameters();
    if midpoint {
        params.reconstruction = Reconstruction::Midpoint;
    }

    let decoded = CodeBlockDecoder::new().decode(&params, &segments)?;
    for warning in &decoded.warnings {
        eprintln!("Warning: {}", warning);
    }
    let bytes: Vec<u8> = decoded
        .coefficients
        .iter()
        .flat_map(|c| c.to_le_bytes())
        .collect();
    fs::write(output, bytes)?;

    println!(
        "✓ Decoded {}x{} code-block from {} of {} passes to {:?}",
        decoded.width,
        decoded.height,
        decoded.passes_decoded,
        block.passes.len(),
        output
    );
    Ok(())
}

fn show_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let block = read_block(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("  Dimensions:  {}x{}", block.width, block.height);
    println!("  Sub-band:    {:?}", block.orientation);
    println!("  Style:       {:?}", block.style);
    println!("  Bit-planes:  {}", block.numbps);
    println!("  Coded bytes: {}", block.data.len());
    print_passes(&block);
    Ok(())
}

fn print_passes(block: &EncodedCodeBlock) {
    if block.passes.is_empty() {
        println!("  (all-zero block, no passes)");
        return;
    }
    println!();
    println!("  pass  kind           plane   rate  distortion");
    for (i, pass) in block.passes.iter().enumerate() {
        let mut notes = String::new();
        if pass.terminated {
            notes.push_str(" term");
        }
        if pass.raw {
            notes.push_str(" raw");
        }
        println!(
            "  {:>4}  {:<13}  {:>5}  {:>5}  {:>10.2}{}",
            i,
            format!("{:?}", pass.kind),
            pass.bitplane,
            pass.rate,
            pass.distortion,
            notes
        );
    }
}
