use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use pl0::assembler;
use pl0::backends::BackendType;
use pl0::interpreter::Interpreter;
use pl0::ir::visitor::TreePrinter;
use pl0::parser::{self, lexer::Lexer};
use pl0_vm::Machine;
use pl0_vm::logging::init_logging;
use pl0_vm::program::{disassemble, format_flat};

#[derive(Parser)]
#[command(name = "pl0")]
#[command(about = "PL/0 compiler, assembler and interpreter for a stack machine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Подробность лога (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Показать поток токенов
    Lex {
        /// Исходник, без аргумента читается stdin
        input: Option<PathBuf>,
    },

    /// Распарсить и показать AST без компиляции
    Parse {
        /// Исходник
        input: Option<PathBuf>,

        /// Сырой Debug вместо дерева
        #[arg(long)]
        debug: bool,
    },

    /// Компилирует исходник в текст ассемблера
    Compile {
        /// Исходник
        input: Option<PathBuf>,

        /// Нужная архитектура
        #[arg(short, long, default_value = "stack")]
        target: String,

        /// Куда записать ассемблер
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Собирает ассемблер в плоскую программу
    Assemble {
        /// Текст ассемблера
        input: Option<PathBuf>,

        /// Куда записать программу
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Показать листинг вместо списка чисел
        #[arg(long)]
        disassemble: bool,
    },

    /// Компиляция, сборка и запуск на машине
    Run {
        /// Исходник
        input: Option<PathBuf>,
    },

    /// Исполнение AST без кодогенерации
    Interpret {
        /// Исходник
        input: Option<PathBuf>,
    },

    /// Список поддерживаемых архитектур
    Targets,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Lex { input } => {
            let source = read_input(input.as_deref())?;
            let mut lexer = Lexer::new(&source);

            for token in lexer.by_ref() {
                println!("{:>4}:{:<3} {}", token.span.line, token.span.column, token.kind);
            }
            if !lexer.diagnostics().is_empty() {
                info!(skipped = lexer.diagnostics().len(), "illegal characters skipped");
            }
        }
        Commands::Parse { input, debug } => {
            let source = read_input(input.as_deref())?;
            let program = parser::parse(&source)?;

            if debug {
                println!("{:#?}", program);
            } else {
                print!("{}", TreePrinter::print(&program));
            }
        }
        Commands::Compile { input, target, output } => {
            let source = read_input(input.as_deref())?;
            let program = parser::parse(&source)?;

            let Some(backend_type) = BackendType::find(&target) else {
                return Err(format!("Unknown target: {}", target).into());
            };
            let mut backend = backend_type.create();
            let assembly = backend.compile(&program)?;
            info!(target = backend_type.name(), lines = assembly.lines().count(), "compiled");

            write_output(output.as_deref(), &assembly)?;
        }
        Commands::Assemble { input, output, disassemble: listing } => {
            let text = read_input(input.as_deref())?;
            let assembled = assembler::assemble(&text)?;
            info!(cells = assembled.code.len(), labels = assembled.labels.len(), "assembled");

            let rendered = if listing {
                let mut lines = disassemble(&assembled.code).join("\n");
                lines.push('\n');
                lines
            } else {
                format!("{}\n", format_flat(&assembled.code))
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Run { input } => {
            let source = read_input(input.as_deref())?;
            let assembly = pl0::compile(&source)?;
            let code = pl0::assemble(&assembly)?;

            let mut machine = Machine::new(code);
            machine.run_streaming(&mut io::stdout().lock())?;
        }
        Commands::Interpret { input } => {
            let source = read_input(input.as_deref())?;
            let program = parser::parse(&source)?;

            for value in Interpreter::new().run(&program)? {
                println!("{}", value);
            }
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}

/// Файл или stdin целиком
fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> io::Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text)?;
            info!(path = %path.display(), bytes = text.len(), "written");
            Ok(())
        }
        None => io::stdout().write_all(text.as_bytes()),
    }
}
