//! Text persistence for the tag [`Index`].
//!
//! The index is written as a marker comment followed by a single printed
//! literal of the form `(COLOR-OF . IDS-OF)`:
//!
//! ```text
//! ;; colortag index, version 1 -*- mode: lisp-data -*-
//! (("/home/me/a.txt" . "red")
//!   ("/home/me/b.txt" . "#00ff00"))
//!  .
//!  (("#00ff00" "/home/me/b.txt")
//!   ("red" "/home/me/a.txt")))
//! ```
//!
//! Both halves are read back exactly as written: `IDS-OF` is not re-derived
//! from `COLOR-OF`, so whatever is on disk is what the store will hold.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use nom::{
    branch::alt,
    bytes::complete::is_not,
    character::complete::{char, multispace1, not_line_ending},
    combinator::{map, value},
    multi::{fold_many0, many0},
    sequence::{delimited, pair, preceded, separated_pair, tuple},
    Finish, IResult,
};
use tempfile::NamedTempFile;

use crate::{Error, Index};

/// First line of every saved index.
pub const MARKER: &str = ";; colortag index, version 1 -*- mode: lisp-data -*-";

/// Writes `index` to `writer`.
///
/// Returns `false` without writing anything if the index is empty: an empty
/// in-memory index usually means the saved one was never loaded, and writing
/// it out would destroy the saved tags.
pub fn save<W>(index: &Index, mut writer: W) -> Result<bool, Error>
where
    W: Write,
{
    if index.is_empty() {
        return Ok(false);
    }

    writeln!(writer, "{}", MARKER)?;

    write!(writer, "((")?;
    for (i, (id, color)) in index.entries().enumerate() {
        if i > 0 {
            write!(writer, "\n  ")?;
        }
        write!(writer, "({} . {})", Quoted(id), Quoted(color))?;
    }

    write!(writer, ")\n .\n (")?;
    for (i, (color, ids)) in index.groups().enumerate() {
        if i > 0 {
            write!(writer, "\n  ")?;
        }
        write!(writer, "({}", Quoted(color))?;
        for id in ids {
            write!(writer, " {}", Quoted(id))?;
        }
        write!(writer, ")")?;
    }
    writeln!(writer, "))")?;

    writer.flush()?;
    Ok(true)
}

/// Reads an index previously written by [`save`].
///
/// Anything after the literal is ignored.
pub fn load<R>(mut reader: R) -> Result<Index, Error>
where
    R: Read,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    let text = std::str::from_utf8(&buf)?;

    let (_rest, index) = index(text)
        .finish()
        .map_err(|e| Error::decode(e.input, e.code))?;

    Ok(index)
}

/// Saves `index` to `path` by writing a temporary file next to it and renaming
/// it over the destination.
pub fn save_path(index: &Index, path: &Path) -> Result<bool, Error> {
    if index.is_empty() {
        log::debug!("tag index is empty; leaving {} alone", path.display());
        return Ok(false);
    }

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    save(index, BufWriter::new(&mut file))?;
    file.as_file().sync_all()?;
    file.persist(path)?;

    log::debug!("saved {} tags to {}", index.len(), path.display());
    Ok(true)
}

pub fn load_path(path: &Path) -> Result<Index, Error> {
    let index = load(BufReader::new(File::open(path)?))?;

    log::debug!("loaded {} tags from {}", index.len(), path.display());
    Ok(index)
}

struct Quoted<'a>(&'a str);

impl Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.0.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                c => write!(f, "{}", c)?,
            }
        }
        f.write_str("\"")
    }
}

fn index(input: &str) -> IResult<&str, Index> {
    map(
        preceded(
            blank,
            delimited(
                char('('),
                separated_pair(
                    preceded(blank, list(entry)),
                    tuple((blank, char('.'), blank)),
                    list(group),
                ),
                pair(blank, char(')')),
            ),
        ),
        |(entries, groups)| {
            let color_of: BTreeMap<String, String> = entries.into_iter().collect();

            let mut ids_of: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
            for (color, ids) in groups {
                ids_of.entry(color).or_default().extend(ids);
            }

            Index::from_parts(color_of, ids_of)
        },
    )(input)
}

fn list<'a, O, F>(item: F) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(char('('), many0(preceded(blank, item)), pair(blank, char(')')))
}

/// `("file-id" . "color")`
fn entry(input: &str) -> IResult<&str, (String, String)> {
    delimited(
        pair(char('('), blank),
        separated_pair(string, tuple((blank, char('.'), blank)), string),
        pair(blank, char(')')),
    )(input)
}

/// `("color" "file-id" ...)`
fn group(input: &str) -> IResult<&str, (String, Vec<String>)> {
    delimited(
        pair(char('('), blank),
        pair(string, many0(preceded(blank, string))),
        pair(blank, char(')')),
    )(input)
}

/// Whitespace and `;` comments.
fn blank(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char(';'), not_line_ending)(input)
}

fn string_fragment(input: &str) -> IResult<&str, &str> {
    is_not("\"\\")(input)
}

fn string_escape(input: &str) -> IResult<&str, &str> {
    preceded(
        char('\\'),
        alt((
            value("\\", char('\\')),
            value("\"", char('"')),
            value("\n", char('n')),
        )),
    )(input)
}

fn string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        fold_many0(
            alt((string_fragment, string_escape)),
            String::new,
            |mut s, fragment| {
                s.push_str(fragment);
                s
            },
        ),
        char('"'),
    )(input)
}
