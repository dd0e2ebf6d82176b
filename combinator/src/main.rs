use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use chumsky::Parser as _;
use clap::Parser;
use combinator::{catalog, parser, Basis, CancelToken, Error, Options, Order, SyntaxError};
use tracing_subscriber::EnvFilter;
use util::repl::{self, Flow};

mod command;

#[derive(Parser, Debug)]
#[command(name = "combinator")]
#[command(about = "Reduce combinatory logic statements to normal form", long_about = None)]
struct Cli {
    /// Statement to reduce; starts a REPL when omitted
    statement: Option<String>,

    /// Basis to reduce with (sk, ski, bckw, iota, church, schonfinkel)
    #[arg(short, long, default_value = "ski")]
    basis: String,

    /// Normalize arguments before substituting them
    #[arg(short, long)]
    applicative: bool,

    /// Frames a reduction may enter before it is reported as a loop
    #[arg(long, default_value_t = combinator::DEFAULT_MAX_FRAMES)]
    max_frames: usize,

    /// Abort a reduction after this many milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn build_report(e: command::Error) -> Report {
    use chumsky::error::SimpleReason;
    fn describe(c: Option<&char>) -> String {
        c.map(|c| format!("'{c}'"))
            .unwrap_or_else(|| "end of the input".to_owned())
    }
    let report = Report::build(ReportKind::Error, (), e.span().start);
    match e.reason() {
        SimpleReason::Unexpected => {
            let found = describe(e.found());
            let expected = e
                .expected()
                .map(|c| describe(c.as_ref()))
                .collect::<Vec<_>>()
                .join(", ");
            let expected = if expected.is_empty() {
                "something else".to_owned()
            } else {
                expected
            };
            report
                .with_message(format!("Unexpected {found}, expected {expected}"))
                .with_label(
                    Label::new(e.span())
                        .with_message(format!("Unexpected {}", found.fg(Color::Red)))
                        .with_color(Color::Red),
                )
        }
        SimpleReason::Unclosed { span, delimiter } => report
            .with_message(format!("Unclosed delimiter {}", delimiter.fg(Color::Yellow)))
            .with_label(
                Label::new(span.clone())
                    .with_message(format!("Unclosed delimiter {}", delimiter.fg(Color::Yellow)))
                    .with_color(Color::Yellow),
            ),
        SimpleReason::Custom(msg) => report.with_message(msg).with_label(
            Label::new(e.span())
                .with_message(format!("{}", msg.fg(Color::Red)))
                .with_color(Color::Red),
        ),
    }
    .finish()
}

fn syntax_report(e: &SyntaxError) -> Report {
    let span = e.span();
    let label = match e {
        SyntaxError::Empty => "nothing to reduce",
        SyntaxError::UnmatchedParen { .. } => "this paren has no partner",
        SyntaxError::EmptyParens { .. } => "empty group",
    };
    Report::build(ReportKind::Error, (), span.start)
        .with_message(e.to_string())
        .with_label(
            Label::new(span)
                .with_message(label.fg(Color::Red))
                .with_color(Color::Red),
        )
        .finish()
}

/// A failed command, kept with the text it refers to so it can be reported
/// against its source.
enum Failure {
    Command(String, Vec<command::Error>),
    Statement(String, Error),
    Other(anyhow::Error),
}

impl Failure {
    fn emit(self) -> Result<()> {
        match self {
            Failure::Command(input, es) => {
                for e in es {
                    build_report(e).eprint(Source::from(&input))?;
                }
            }
            Failure::Statement(statement, Error::Syntax(e)) => {
                syntax_report(&e).eprint(Source::from(&statement))?;
            }
            Failure::Statement(statement, e) => eprintln!("Error: {e} in `{statement}`"),
            Failure::Other(e) => eprintln!("Error: {e}"),
        }
        Ok(())
    }
}

type CommandResult<T = ()> = std::result::Result<T, Failure>;

fn parse_with<T>(parser: impl command::SimpleParser<T>, input: &str) -> CommandResult<T> {
    parser
        .parse(input)
        .map_err(|es| Failure::Command(input.to_owned(), es))
}

struct Session {
    basis_name: String,
    basis: Basis,
    order: Order,
    max_frames: usize,
    timeout: Option<Duration>,
}

impl Session {
    fn new(cli: &Cli) -> Result<Self> {
        let basis = catalog::by_name(&cli.basis).ok_or_else(|| unknown_basis(&cli.basis))?;
        Ok(Self {
            basis_name: cli.basis.to_ascii_lowercase(),
            basis,
            order: if cli.applicative {
                Order::Applicative
            } else {
                Order::Normal
            },
            max_frames: cli.max_frames,
            timeout: cli.timeout_ms.map(Duration::from_millis),
        })
    }

    fn options(&self) -> Options {
        let options = Options::default()
            .with_order(self.order)
            .with_max_frames(self.max_frames);
        match self.timeout {
            Some(timeout) => options.with_cancel(CancelToken::new().with_timeout(timeout)),
            None => options,
        }
    }

    fn reduce(&self, input: &str, head_only: bool) -> CommandResult<String> {
        let statement = parser::strip_whitespace(input);
        let fail = |e: Error| Failure::Statement(statement.clone(), e);
        let tree = parser::parse(&statement).map_err(|e| fail(e.into()))?;
        let reduced = if head_only {
            combinator::rewrite(tree, &self.basis, &self.options())
        } else {
            self.basis.reduce(tree, &self.options())
        };
        reduced
            .map(|tree| tree.to_string())
            .map_err(|e| fail(e.into()))
    }

    fn check(input: &str) -> CommandResult {
        let statement = parser::strip_whitespace(input);
        parser::well_formed(&statement)
            .map_err(|e| Failure::Statement(statement.clone(), e.into()))?;
        println!("ok");
        Ok(())
    }

    fn canonical(input: &str) -> CommandResult {
        let statement = parser::strip_whitespace(input);
        let tree =
            parser::parse(&statement).map_err(|e| Failure::Statement(statement.clone(), e.into()))?;
        println!("{tree}");
        Ok(())
    }

    fn define(&mut self, input: &str) -> CommandResult {
        let combinator = parse_with(command::definition(), input)?;
        println!("{combinator}");
        if self.basis.find(combinator.name).is_some() {
            println!("note: an earlier `{}` shadows this one", combinator.name);
        }
        self.basis = self.basis.with(combinator);
        Ok(())
    }

    fn switch_basis(&mut self, input: &str) -> CommandResult {
        let name = input.trim();
        let basis = catalog::by_name(name).ok_or_else(|| Failure::Other(unknown_basis(name)))?;
        self.basis = basis;
        self.basis_name = name.to_ascii_lowercase();
        self.show();
        Ok(())
    }

    fn show(&self) {
        for combinator in self.basis.iter() {
            println!("{combinator}");
        }
        println!(
            "-- {} order, {} frames, timeout {}",
            self.order,
            self.max_frames,
            self.timeout
                .map(|t| format!("{}ms", t.as_millis()))
                .unwrap_or_else(|| "off".to_owned())
        );
    }

    fn show_help() {
        println!(
            "{}",
            r#"
statement           -- same as :reduce statement
:reduce    stmt     -- reduce the statement to normal form
:head      stmt     -- rewrite at the root only
:parse     stmt     -- show the canonical form of the statement
:check     stmt     -- check that the statement is well formed
:let       N x y = body
                    -- add a combinator to the current basis
:basis     name     -- switch to a named basis (sk, ski, bckw, iota, church, schonfinkel)
:show               -- list the current basis and settings
:order     normal|applicative
:frames    n        -- frame ceiling for loop detection
:timeout   ms|off   -- deadline for each reduction
:help               -- show this message
:quit               -- leave
        "#
            .trim()
        );
    }

    fn handle_repl_input(&mut self, input: &str) -> CommandResult<Flow> {
        let input = input.trim();
        let (cmd, input) = if let Some(stripped) = input.strip_prefix(':') {
            let stripped = stripped.trim_start();
            stripped.split_once(' ').unwrap_or((stripped, ""))
        } else {
            ("", input)
        };
        match cmd {
            "" | "r" | "reduce" => println!("{}", self.reduce(input, false)?),
            "hd" | "head" => println!("{}", self.reduce(input, true)?),
            "p" | "parse" => Self::canonical(input)?,
            "c" | "check" => Self::check(input)?,
            "l" | "let" => self.define(input)?,
            "b" | "basis" => self.switch_basis(input)?,
            "s" | "show" => self.show(),
            "o" | "order" => self.order = parse_with(command::order(), input)?,
            "f" | "frames" => self.max_frames = parse_with(command::count(), input)?,
            "t" | "timeout" => {
                self.timeout = parse_with(command::timeout(), input)?.map(Duration::from_millis)
            }
            "h" | "help" => Self::show_help(),
            "q" | "quit" => return Ok(Flow::Quit),
            _ => {
                eprintln!("Unknown command {cmd}");
                Self::show_help();
            }
        }
        Ok(Flow::Continue)
    }
}

impl repl::Repl for Session {
    type Error = anyhow::Error;

    fn prompt(&self) -> String {
        format!("{}> ", self.basis_name)
    }

    fn history(&self) -> Option<PathBuf> {
        Some(std::env::temp_dir().join("combinator.history"))
    }

    fn evaluate(&mut self, input: &str) -> Result<Flow, Self::Error> {
        match self.handle_repl_input(input) {
            Ok(flow) => Ok(flow),
            Err(failure) => {
                failure.emit()?;
                Ok(Flow::Continue)
            }
        }
    }
}

fn unknown_basis(name: &str) -> anyhow::Error {
    anyhow!(
        "unknown basis `{name}`, expected one of {}",
        catalog::NAMES.join(", ")
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let session = Session::new(&cli)?;
    if let Some(statement) = &cli.statement {
        return match session.reduce(statement, false) {
            Ok(reduced) => {
                println!("{reduced}");
                Ok(())
            }
            Err(failure) => {
                failure.emit()?;
                Err(anyhow!("could not reduce `{statement}`"))
            }
        };
    }

    println!("Combinatory logic REPL over the {} basis. :h to show help", session.basis_name);
    println!();
    repl::start_repl(session)?;
    Ok(())
}
