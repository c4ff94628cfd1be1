use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use pl0_vm::Machine;
use pl0_vm::logging::init_logging;
use pl0_vm::program::{disassemble, load_program, parse_flat};

#[derive(Parser)]
#[command(name = "pl0-vm")]
#[command(about = "Stack machine for flat PL/0 programs", version)]
struct Cli {
    /// Плоская программа, без аргумента читается stdin
    input: Option<PathBuf>,

    /// Показать листинг вместо запуска
    #[arg(long)]
    disassemble: bool,

    /// Сбросить состояние машины в stderr после остановки
    #[arg(long)]
    dump: bool,

    /// Подробность лога (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let program = match &cli.input {
        Some(path) => load_program(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            parse_flat(&buffer)?
        }
    };
    info!(cells = program.len(), "program loaded");

    if cli.disassemble {
        for line in disassemble(&program) {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut machine = Machine::new(program);
    machine.run_streaming(&mut io::stdout().lock())?;

    if cli.dump {
        eprintln!("{}", machine.dump());
    }

    Ok(())
}
