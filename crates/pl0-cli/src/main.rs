use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use pl0::{
    analysis::Analysis,
    expr::{Calculator, Recognizer, EVALUATOR_GRAMMAR},
    grammar::Grammar,
    lexer::{self, TokenKind},
    optimizer::Optimizer,
    quad, recursive,
    table::{Config, PredictionTable},
};
use std::{fmt::Write as _, fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the tokens of a PL/0 source file.
    Lex {
        input: PathBuf,

        /// Print the occurrences of each identifier as `(ident: count)` instead.
        #[arg(long)]
        count_idents: bool,

        /// The output file. Writes to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the syntax of an arithmetic expression.
    Check {
        #[arg(long, value_enum, default_value_t = Method::Ll1)]
        method: Method,
        input: PathBuf,
    },

    /// Evaluate an arithmetic expression while parsing it.
    Eval {
        input: PathBuf,
    },

    /// Dump the FIRST/FOLLOW/SELECT sets and the prediction table of a grammar.
    Grammar {
        /// The path of grammar definition file. Defaults to the evaluator grammar.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Keep the last production on table conflicts instead of failing.
        #[arg(long)]
        last_write_wins: bool,
    },

    /// Eliminate common subexpressions and fold constants in quadruple code.
    Optimize {
        input: PathBuf,

        /// The output file. Writes to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Method {
    /// Table-driven LL(1) parsing.
    Ll1,
    /// Recursive descent.
    Recursive,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    match args.command {
        Command::Lex {
            input,
            count_idents,
            output,
        } => lex(&input, count_idents, output.as_ref()),
        Command::Check { method, input } => check(method, &input),
        Command::Eval { input } => eval(&input),
        Command::Grammar {
            input,
            last_write_wins,
        } => dump_grammar(input.as_ref(), last_write_wins),
        Command::Optimize { input, output } => optimize(&input, output.as_ref()),
    }
}

fn read_tokens(input: &PathBuf) -> anyhow::Result<Vec<lexer::Token>> {
    lexer::tokenize_file(input)
        .with_context(|| format!("failed to read the source file `{}'", input.display()))
}

fn lex(input: &PathBuf, count_idents: bool, output: Option<&PathBuf>) -> anyhow::Result<()> {
    let tokens = read_tokens(input)?;

    let mut text = String::new();
    if count_idents {
        for (ident, count) in lexer::count_identifiers(&tokens) {
            writeln!(text, "({}: {})", ident, count)?;
        }
    } else {
        for token in &tokens {
            writeln!(text, "{:>4}  {:<10} {}", token.line, token.kind, token.text)?;
        }
    }
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write `{}'", path.display()))?,
        None => print!("{}", text),
    }

    let num_invalid = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Invalid)
        .count();
    if num_invalid > 0 {
        anyhow::bail!("{} invalid token(s)", num_invalid);
    }
    Ok(())
}

fn check(method: Method, input: &PathBuf) -> anyhow::Result<()> {
    let tokens = read_tokens(input)?;
    match method {
        Method::Ll1 => {
            let recognizer = Recognizer::new().context("failed to build the recognizer")?;
            recognizer.check(&tokens)?;
            println!("Syntax correct.");
        }
        Method::Recursive => {
            if let Err(err) = recursive::recognize(&tokens) {
                match err.line() {
                    Some(line) => anyhow::bail!("line {}: {}", line, err),
                    None => anyhow::bail!("{}", err),
                }
            }
            println!("Syntax correct.");
        }
    }
    Ok(())
}

fn eval(input: &PathBuf) -> anyhow::Result<()> {
    let tokens = read_tokens(input)?;
    let calc = Calculator::new().context("failed to build the calculator")?;
    let value = calc.evaluate(&tokens)?;
    println!("Ans = {}", value);
    Ok(())
}

fn dump_grammar(input: Option<&PathBuf>, last_write_wins: bool) -> anyhow::Result<()> {
    let grammar = match input {
        Some(path) => Grammar::from_file(path)
            .with_context(|| format!("failed to load the grammar `{}'", path.display()))?,
        None => Grammar::from_str(EVALUATOR_GRAMMAR)?,
    };
    if let Err(err) = grammar.validate() {
        println!("[warning] {}", err);
    }

    let mut config = Config::new();
    if last_write_wins {
        config.last_write_wins();
    }
    let analysis = Analysis::compute(&grammar);
    let table = PredictionTable::from_analysis(&grammar, &analysis, &config)?;

    println!("## Grammar\n{}", grammar);
    println!("## Analysis\n{}", analysis.display(&grammar));
    println!("## Prediction table\n{}", table.display(&grammar));
    Ok(())
}

fn optimize(input: &PathBuf, output: Option<&PathBuf>) -> anyhow::Result<()> {
    let listing = quad::read_file(input)
        .with_context(|| format!("failed to read the quadruples `{}'", input.display()))?;
    let optimized = listing.with_quads(Optimizer::new().optimize(&listing.quads)?);
    tracing::info!("{} -> {} quadruples", listing.quads.len(), optimized.quads.len());

    match output {
        Some(path) => quad::write_file(path, &optimized)
            .with_context(|| format!("failed to write `{}'", path.display()))?,
        None => print!("{}", optimized),
    }
    Ok(())
}
