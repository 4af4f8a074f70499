//! Interactive stepping session.
//!
//! Reads one command per line and drives the engine with it, redrawing the
//! current node after every command.

use std::io::{BufRead, Write};

use locfix_core::{
    DisplayOptions, EngineError, Endpoint, FileSelection, LocationEngine, Step, TokenSource,
};

use crate::CliError;
use crate::view::{Painter, Screen};

const HELP: &str = "\
commands:
  n / p        next / previous token
  N / P        next / previous file
  s<N> / e<N>  move start / end by N columns (e.g. s+1, e-2)
  w            save the proposed span
  r            run to the next mismatch
  j / t        toggle json lines / token dump
  f <name>     open another case file
  h            this help
  q            quit";

/// A parsed session command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NextToken,
    PreviousToken,
    NextFile,
    PreviousFile,
    Move(Endpoint, i64),
    Save,
    Run,
    Toggle(&'static str),
    File(String),
    Help,
    Quit,
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let command = match input {
        "n" => Command::NextToken,
        "p" => Command::PreviousToken,
        "N" => Command::NextFile,
        "P" => Command::PreviousFile,
        "w" => Command::Save,
        "r" => Command::Run,
        "j" => Command::Toggle("json"),
        "t" => Command::Toggle("show_token"),
        "h" | "?" => Command::Help,
        "q" => Command::Quit,
        _ => {
            if let Some(name) = input.strip_prefix("f ") {
                return Ok(Command::File(name.trim().to_string()));
            }
            let endpoint = match input.chars().next() {
                Some('s') => Endpoint::Start,
                Some('e') => Endpoint::End,
                _ => return Err(format!("unknown command '{input}' (h for help)")),
            };
            let amount = input[1..].trim();
            let amount = amount.strip_prefix('+').unwrap_or(amount);
            let amount = amount
                .parse::<i64>()
                .map_err(|_| format!("invalid amount in '{input}'"))?;
            Command::Move(endpoint, amount)
        }
    };
    Ok(command)
}

/// Interactive loop over an engine, reading from `input` and drawing to
/// `output`.
pub struct Session<S: TokenSource, R, W> {
    engine: LocationEngine<S>,
    input: R,
    output: W,
    painter: Painter,
}

impl<S: TokenSource, R: BufRead, W: Write> Session<S, R, W> {
    pub fn new(engine: LocationEngine<S>, input: R, output: W, color: bool) -> Self {
        Self {
            engine,
            input,
            output,
            painter: Painter::new(color),
        }
    }

    pub fn display_options(&self) -> DisplayOptions {
        self.engine.display_options()
    }

    /// Run until the operator quits or input ends.
    pub fn run(&mut self, stage: Option<&str>, file: Option<&str>) -> Result<(), CliError> {
        if !self.choose_stage(stage)? || !self.choose_file(file)? {
            return Ok(());
        }

        loop {
            self.draw()?;
            write!(self.output, "> ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    writeln!(self.output, "{message}")?;
                    continue;
                }
            };
            if !self.execute(command)? {
                return Ok(());
            }
        }
    }

    /// Returns false when input ended before a stage was chosen.
    fn choose_stage(&mut self, stage: Option<&str>) -> Result<bool, CliError> {
        let mut answer = stage.map(str::to_string);
        loop {
            let name = match answer.take() {
                Some(name) => name,
                None => {
                    writeln!(self.output, "What would you like to test?")?;
                    writeln!(self.output, "1) lexer")?;
                    writeln!(self.output, "2) parser")?;
                    match self.read_line()? {
                        Some(line) => line,
                        None => return Ok(false),
                    }
                }
            };

            match self.engine.select_stage(&name) {
                Ok(count) => {
                    log::debug!("{count} case files");
                    return Ok(true);
                }
                Err(EngineError::UnknownStage(e)) => writeln!(self.output, "{e}")?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Returns false when input ended before a file was chosen.
    fn choose_file(&mut self, file: Option<&str>) -> Result<bool, CliError> {
        let mut answer = file.map(str::to_string);
        loop {
            let name = match answer.take() {
                Some(name) => name,
                None => {
                    writeln!(self.output, "What case? (blank for the first)")?;
                    match self.read_line()? {
                        Some(line) => line,
                        None => return Ok(false),
                    }
                }
            };

            if self.open(&name)? {
                return Ok(true);
            }
        }
    }

    /// Select a file, reporting suggestions when it does not exist.
    fn open(&mut self, name: &str) -> Result<bool, CliError> {
        match self.engine.select_file(name)? {
            FileSelection::Selected { .. } => Ok(true),
            FileSelection::NotFound { query, suggestions } => {
                writeln!(self.output, "No case named '{query}'.")?;
                if !suggestions.is_empty() {
                    writeln!(self.output, "Did you mean: {}?", suggestions.join(", "))?;
                }
                Ok(false)
            }
        }
    }

    /// Returns false when the session should end.
    fn execute(&mut self, command: Command) -> Result<bool, CliError> {
        let step = match command {
            Command::NextToken => self.engine.next_token(),
            Command::PreviousToken => self.engine.previous_token(),
            Command::NextFile => self.engine.next_file(),
            Command::PreviousFile => self.engine.previous_file(),
            Command::Run => self.engine.enter_run_mode(),
            Command::Move(endpoint, amount) => {
                self.engine.move_endpoint(endpoint, amount).map(|_| Step::Stayed)
            }
            Command::Save => self.engine.save_current_proposed().map(|()| Step::Stayed),
            Command::Toggle(name) => self.engine.toggle_display_option(name).map(|_| Step::Stayed),
            Command::File(name) => {
                self.open(&name)?;
                Ok(Step::Stayed)
            }
            Command::Help => {
                writeln!(self.output, "{HELP}")?;
                Ok(Step::Stayed)
            }
            Command::Quit => return Ok(false),
        };

        match step {
            Ok(Step::AtStart) => writeln!(self.output, "Already at the first token.")?,
            Ok(_) => {}
            Err(EngineError::NoFile | EngineError::NoNode) => {
                writeln!(self.output, "Nothing to edit here.")?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    fn draw(&mut self) -> Result<(), CliError> {
        if self.engine.is_exhausted() {
            writeln!(self.output, "No more files to process.")?;
            return Ok(());
        }

        let engine = &self.engine;
        let (Some(comparison), Some(lines)) = (engine.comparison(), engine.lines()) else {
            writeln!(
                self.output,
                "{} has no tokens.",
                engine.current_file().unwrap_or_default()
            )?;
            return Ok(());
        };

        let label = engine.token_label().unwrap_or_default();
        let screen = Screen {
            file: engine.current_file().unwrap_or_default(),
            position: engine.position(),
            comparison,
            label: &label,
            token: engine.current_node().map(|n| &n.raw),
            lines,
            display: engine.display_options(),
        };
        let rendered = screen.render(&self.painter);
        self.output.write_all(rendered.as_bytes())?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>, CliError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
