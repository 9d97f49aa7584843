//! `vmctl`: run and disassemble ternary VM bytecode from the command line.

use std::fs;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use vm_core::{disassemble, Code, Vm, VmConfig};

#[derive(Parser)]
#[command(name = "vmctl", about = "Recursive symbolic ternary VM toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable trace-level logging to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and execute a bytecode file.
    Run {
        file: String,

        /// Maximum opcodes to dispatch before stopping.
        #[arg(long, default_value_t = 10_000)]
        max_steps: u32,

        /// Interpret the file's contents as hex text instead of raw bytes.
        #[arg(long)]
        hex: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Disassemble a bytecode file without executing it.
    Disasm {
        file: String,

        /// Interpret the file's contents as hex text instead of raw bytes.
        #[arg(long)]
        hex: bool,
    },
}

#[derive(clap::Args)]
struct ConfigArgs {
    #[arg(long, default_value_t = VmConfig::default().theta1)]
    theta1: u32,
    #[arg(long, default_value_t = VmConfig::default().delta1)]
    delta1: u32,
    #[arg(long, default_value_t = VmConfig::default().delta2)]
    delta2: u32,
    #[arg(long = "tensor-window", default_value_t = VmConfig::default().tensor_window)]
    tensor_window: usize,
    #[arg(long = "stack-capacity", default_value_t = VmConfig::default().stack_capacity)]
    stack_capacity: usize,
}

impl From<ConfigArgs> for VmConfig {
    fn from(args: ConfigArgs) -> Self {
        VmConfig {
            theta1: args.theta1,
            delta1: args.delta1,
            delta2: args.delta2,
            tensor_window: args.tensor_window,
            stack_capacity: args.stack_capacity,
            ..VmConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_target(false).init();
    }

    let result = match cli.command {
        Commands::Run {
            file,
            max_steps,
            hex,
            config,
        } => run(&file, max_steps, hex, config.into()),
        Commands::Disasm { file, hex } => disasm(&file, hex),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn read_bytecode(file: &str, hex: bool) -> Result<Vec<u8>, String> {
    let raw = fs::read(file).map_err(|e| format!("reading {file}: {e}"))?;
    if hex {
        let text = String::from_utf8(raw).map_err(|e| format!("{file} is not valid UTF-8: {e}"))?;
        hex::decode(text.trim()).map_err(|e| format!("{file} is not valid hex: {e}"))
    } else {
        Ok(raw)
    }
}

fn run(file: &str, max_steps: u32, hex: bool, config: VmConfig) -> Result<(), String> {
    let bytes = read_bytecode(file, hex)?;
    let mut vm = Vm::new(config);
    vm.load(&bytes);

    let summary = vm.execute(max_steps);
    println!("steps: {}", summary.steps);
    println!("tier: {:?}", summary.tier);
    println!("halted: {}", summary.halted);

    let mut stack_contents = Vec::new();
    while let Ok(operand) = vm.pop() {
        stack_contents.push(operand.to_string());
    }
    stack_contents.reverse();
    println!("stack (bottom to top): [{}]", stack_contents.join(", "));

    if let Some(error) = summary.error {
        return Err(error.to_string());
    }
    Ok(())
}

fn disasm(file: &str, hex: bool) -> Result<(), String> {
    let bytes = read_bytecode(file, hex)?;
    let code = Code::load(&bytes);
    for line in disassemble(&code) {
        println!("{line}");
    }
    Ok(())
}
