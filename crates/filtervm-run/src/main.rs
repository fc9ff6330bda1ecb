//! filtervm-run - Run, disassemble and verify archive filter programs
//!
//! `run` prepares a bytecode file and executes it over an input block,
//! `disasm` prints the prepared program and `verify` checks a native
//! standard filter against its interpreted reference program.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use filtervm::{
    prepare_with, reference, FilterBlock, FilterSlot, PrepareOptions, Program, StandardFilter,
    Vm, VmConfig, GLOBAL_ADDR, GLOBAL_SIZE,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "filtervm-run")]
#[command(about = "Run, disassemble and verify archive filter programs")]
struct Cli {
    /// YAML file with VM settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum number of commands per run
    #[arg(long, global = true)]
    budget: Option<u64>,

    /// Skip the peephole optimizer
    #[arg(long, global = true)]
    no_optimize: bool,

    /// Interpret standard filter programs instead of running them natively
    #[arg(long, global = true)]
    no_native: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a filter program over an input file
    Run {
        /// Bytecode file
        program: PathBuf,
        /// Block to filter
        input: PathBuf,
        /// Initial register value, as N=VALUE (N in 0..=6, VALUE decimal or 0x hex)
        #[arg(long = "reg", value_parser = parse_register)]
        registers: Vec<(usize, u32)>,
        /// Position of the block in the unpacked stream
        #[arg(long, default_value = "0")]
        file_offset: u64,
        /// Earlier runs of the same filter slot
        #[arg(long, default_value = "0")]
        exec_count: u32,
        /// Where to write the filtered block
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the prepared form of a bytecode file
    Disasm {
        program: PathBuf,
    },
    /// Compare a native standard filter with its reference program
    Verify {
        /// One of E8, E8E9, ITANIUM, DELTA, RGB, AUDIO, UPCASE
        filter: StandardFilter,
        input: PathBuf,
        #[arg(long = "reg", value_parser = parse_register)]
        registers: Vec<(usize, u32)>,
        #[arg(long, default_value = "0")]
        file_offset: u64,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filtervm_run=info,filtervm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Run {
            program,
            input,
            registers,
            file_offset,
            exec_count,
            output,
        } => {
            let block = read_block(&input, &registers, file_offset)?;
            run_program(config, &program, block, exec_count, output.as_deref())
        }
        Commands::Disasm { program } => {
            let code = read(&program)?;
            let prepared = Vm::with_config(config).prepare(&code);
            print!("{prepared}");
            Ok(())
        }
        Commands::Verify {
            filter,
            input,
            registers,
            file_offset,
        } => {
            let block = read_block(&input, &registers, file_offset)?;
            verify(config, filter, &block)
        }
    }
}

fn load_config(cli: &Cli) -> Result<VmConfig> {
    let mut config = match &cli.config {
        Some(path) => VmConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VmConfig::default(),
    };
    if let Some(budget) = cli.budget {
        if budget == 0 {
            bail!("--budget must be positive");
        }
        config = config.with_budget(budget);
    }
    if cli.no_optimize {
        config = config.with_optimize(false);
    }
    if cli.no_native {
        config = config.with_native_filters(false);
    }
    Ok(config)
}

fn parse_register(arg: &str) -> Result<(usize, u32), String> {
    let (index, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected N=VALUE, got '{arg}'"))?;
    let index: usize = index
        .trim()
        .parse()
        .map_err(|_| format!("bad register index '{index}'"))?;
    if index > 6 {
        return Err(format!("register R{index} cannot be set; use 0..=6"));
    }
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    let value = parsed.map_err(|_| format!("bad register value '{value}'"))?;
    Ok((index, value))
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_block(input: &Path, registers: &[(usize, u32)], file_offset: u64) -> Result<FilterBlock> {
    let data = read(input)?;
    if data.len() >= GLOBAL_ADDR as usize {
        warn!(
            len = data.len(),
            limit = GLOBAL_ADDR,
            "input overlaps the global region and will be truncated"
        );
    }
    let block = registers
        .iter()
        .fold(FilterBlock::new(data).at_offset(file_offset), |block, &(index, value)| {
            block.with_register(index, value)
        });
    Ok(block)
}

fn run_program(
    config: VmConfig,
    program: &Path,
    block: FilterBlock,
    exec_count: u32,
    output: Option<&Path>,
) -> Result<()> {
    let code = read(program)?;
    let mut vm = Vm::with_config(config);
    let prepared = vm.prepare(&code);
    info!(
        origin = ?prepared.origin(),
        commands = prepared.len(),
        static_data = prepared.static_data().len(),
        "Program prepared"
    );

    let mut slot = FilterSlot::new(prepared).with_exec_count(exec_count);
    let filtered = vm
        .apply_filter(&mut slot, &block)
        .context("Filter program failed")?;
    if !slot.carried().is_empty() {
        info!(bytes = slot.carried().len(), "Program kept user data");
    }

    match output {
        Some(path) => {
            fs::write(path, &filtered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} bytes to {}", filtered.len(), path.display());
        }
        None => println!("{} bytes filtered", filtered.len()),
    }
    Ok(())
}

/// Output, compared arena prefix and carried data of one run.
struct Observed {
    output: Vec<u8>,
    arena: Vec<u8>,
    carried: Vec<u8>,
}

fn observe(config: VmConfig, program: Program, block: &FilterBlock) -> Result<Observed> {
    let mut vm = Vm::with_config(config);
    let mut slot = FilterSlot::new(program);
    let output = vm.apply_filter(&mut slot, block)?;
    Ok(Observed {
        output,
        arena: vm.arena().slice(0, GLOBAL_ADDR as usize + GLOBAL_SIZE).to_vec(),
        carried: slot.carried().to_vec(),
    })
}

fn verify(config: VmConfig, filter: StandardFilter, block: &FilterBlock) -> Result<()> {
    let code = reference::bytecode(filter)
        .with_context(|| format!("Failed to assemble the {filter} reference program"))?;
    let options = PrepareOptions {
        recognize_standard: false,
        optimize: config.optimize,
    };

    let native = observe(config, Program::standard(filter), block).context("Native run failed")?;
    let interpreted = observe(config, prepare_with(&code, &options), block)
        .context("Interpreted run failed")?;

    if native.output != interpreted.output {
        bail!(
            "{filter}: outputs differ ({} native bytes, {} interpreted)",
            native.output.len(),
            interpreted.output.len()
        );
    }
    if let Some(at) = native
        .arena
        .iter()
        .zip(&interpreted.arena)
        .position(|(a, b)| a != b)
    {
        bail!("{filter}: arena differs at {at:#07x}");
    }
    if native.carried != interpreted.carried {
        bail!("{filter}: carried user data differs");
    }

    info!(
        bytes = native.output.len(),
        "Native and interpreted {filter} agree"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register() {
        assert_eq!(parse_register("0=5"), Ok((0, 5)));
        assert_eq!(parse_register("6=0x1F"), Ok((6, 0x1F)));
        assert!(parse_register("7=1").is_err());
        assert!(parse_register("1").is_err());
        assert!(parse_register("1=zz").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "filtervm-run",
            "--budget",
            "100",
            "run",
            "prog.bin",
            "data.bin",
            "--reg",
            "0=4",
            "--reg",
            "1=0x2",
            "--exec-count",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.budget, Some(100));
        match cli.command {
            Commands::Run {
                registers,
                exec_count,
                ..
            } => {
                assert_eq!(registers, vec![(0, 4), (1, 2)]);
                assert_eq!(exec_count, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_filter_name() {
        let cli = Cli::try_parse_from(["filtervm-run", "verify", "delta", "in.bin"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Verify {
                filter: StandardFilter::Delta,
                ..
            }
        ));
    }
}
