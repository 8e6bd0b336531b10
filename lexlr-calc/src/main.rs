//! Calculator REPL: reads expressions until a blank line, printing each
//! result or syntax error.

use anyhow::Result;
use clap::Parser as ClapParser;
use lexlr::Strategy;
use lexlr_calc::{evaluate, make_parser};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum StrategyArg {
    Lr0,
    Slr,
    Lalr,
    Clr,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Strategy {
        match arg {
            StrategyArg::Lr0 => Strategy::Lr0,
            StrategyArg::Slr => Strategy::Slr,
            StrategyArg::Lalr => Strategy::Lalr,
            StrategyArg::Clr => Strategy::Clr,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(version, about = "Evaluate arithmetic expressions")]
struct Args {
    /// LR table construction strategy
    #[arg(short, long, value_enum, default_value = "clr")]
    strategy: StrategyArg,

    /// Expressions to evaluate instead of reading from stdin
    expressions: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    log::debug!("compiling calculator with {:?}", args.strategy);
    let parser = make_parser(args.strategy.into())?;

    if !args.expressions.is_empty() {
        for expr in &args.expressions {
            match evaluate(&parser, expr) {
                Ok(value) => println!("{value}"),
                Err(err) => eprintln!("{err}"),
            }
        }
        return Ok(());
    }

    println!("Enter an expression:");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        match evaluate(&parser, line) {
            Ok(value) => println!("{value}"),
            Err(err) => {
                println!("syntax error at {:?}", err.token.text);
                if !err.expected.is_empty() {
                    let names: Vec<&str> =
                        err.expected.iter().map(|s| s.as_str()).collect();
                    println!("expected: {}", names.join(" "));
                }
            }
        }
    }
    Ok(())
}
