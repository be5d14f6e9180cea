//! A line-oriented interactive view of one directory.
//!
//! Commands are read one per line:
//!
//! ```text
//! j [n] / k [n]     scroll down / up (default 1 line)
//! goto <line>       move the point
//! mark [line...]    mark the given lines, or the line at point
//! unmark            clear every mark
//! tag <color>       tag the marked files, or the file at point
//! untag             remove their tags
//! select <color>    mark exactly the files tagged with <color>
//! style <style>     switch between block and background
//! g                 re-read the directory
//! l                 redraw
//! q                 quit
//! ```

use std::{convert::TryFrom, io::Write, str::FromStr};

use listing::Style;
use thiserror::Error;

use crate::{paint, session, session::Session};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Scroll(isize),
    Goto(usize),
    Mark(Vec<usize>),
    Unmark,
    Tag(String),
    Untag,
    Select(String),
    Style(Style),
    Reload,
    Redraw,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum ParseError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("not a number: {0}")]
    NotANumber(String),

    #[error("{0}")]
    Style(String),
}

impl FromStr for Input {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => return Ok(Self::Redraw),
        };
        let rest: Vec<&str> = words.collect();

        let number = |word: &str| {
            word.parse::<usize>()
                .map_err(|_| ParseError::NotANumber(word.to_string()))
        };
        let argument = |name: &'static str| {
            rest.first()
                .map(|word| word.to_string())
                .ok_or(ParseError::MissingArgument(name))
        };
        let count = || match rest.first() {
            Some(word) => number(*word).and_then(|n| {
                isize::try_from(n).map_err(|_| ParseError::NotANumber(word.to_string()))
            }),
            None => Ok(1),
        };

        Ok(match command {
            "j" => Self::Scroll(count()?),
            "k" => Self::Scroll(-count()?),
            "goto" => Self::Goto(number(argument("goto")?.as_str())?),
            "mark" => Self::Mark(
                rest.iter()
                    .map(|word| number(*word))
                    .collect::<Result<_, _>>()?,
            ),
            "unmark" => Self::Unmark,
            "tag" => Self::Tag(argument("tag")?),
            "untag" => Self::Untag,
            "select" => Self::Select(argument("select")?),
            "style" => Self::Style(
                argument("style")?
                    .parse()
                    .map_err(|e: listing::Error| ParseError::Style(e.to_string()))?,
            ),
            "g" => Self::Reload,
            "l" => Self::Redraw,
            "q" | "quit" => Self::Quit,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        })
    }
}

/// Runs commands from `input` against the listing open in `session`, drawing
/// to `out` after each one, until `q` or the end of the input.
pub(crate) async fn run<W>(
    session: &mut Session,
    input: flume::Receiver<String>,
    ansi: bool,
    out: &mut W,
) -> anyhow::Result<()>
where
    W: Write,
{
    draw(session, ansi, out)?;

    loop {
        tokio::select! {
            line = input.recv_async() => {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };

                match line.parse::<Input>() {
                    Ok(Input::Quit) => break,
                    Ok(command) => match handle(session, command).await {
                        Ok(()) => draw(session, ansi, out)?,
                        Err(e @ session::Error::UnsupportedContext(_)) => writeln!(out, "{}", e)?,
                        Err(e) => return Err(e.into()),
                    },
                    Err(e) => writeln!(out, "{}", e)?,
                }
            }
            Some(range) = session.next_render() => {
                if session.render(range).await > 0 {
                    draw(session, ansi, out)?;
                }
            }
        }
    }

    Ok(())
}

async fn handle(session: &mut Session, command: Input) -> Result<(), session::Error> {
    match command {
        Input::Scroll(delta) => {
            session.scroll(delta)?;
        }
        Input::Goto(line) => {
            session.goto(line)?;
        }
        Input::Mark(lines) if lines.is_empty() => {
            session.mark(None)?;
        }
        Input::Mark(lines) => {
            for line in lines {
                session.mark(Some(line))?;
            }
        }
        Input::Unmark => session.unmark_all()?,
        Input::Tag(color) => {
            let changed = session.tag_marked(&color).await?;
            log::info!("tagged {} files {}", changed, color);
        }
        Input::Untag => {
            let changed = session.tag_marked("").await?;
            log::info!("untagged {} files", changed);
        }
        Input::Select(color) => {
            session.select_color(&color).await?;
        }
        Input::Style(style) => session.set_style(style).await?,
        Input::Reload => session.reload().await?,
        Input::Redraw | Input::Quit => {}
    }

    Ok(())
}

fn draw<W: Write>(session: &Session, ansi: bool, out: &mut W) -> anyhow::Result<()> {
    if let Some(listing) = session.listing() {
        write!(out, "{}", paint::paint(listing, ansi))?;
        writeln!(out, "--")?;
    }
    out.flush()?;

    Ok(())
}
