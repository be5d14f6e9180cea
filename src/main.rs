use std::{
    io::{self, BufRead, IsTerminal, Write},
    path::PathBuf,
    thread,
};

use colortag_state::TagStore;
use flexi_logger::Logger;
use listing::DirListing;
use structopt::StructOpt;

use crate::{config::Config, session::Session};

mod browse;
mod config;
mod paint;
mod session;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Persistent color tags for files, drawn over directory listings. Tags are loaded on first use and saved on exit when they change."
)]
struct Opt {
    #[structopt(flatten)]
    config: Config,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "tag files with a color; an empty color removes their tags")]
    Tag {
        color: String,

        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,
    },

    #[structopt(about = "remove the tags from files")]
    Untag {
        #[structopt(parse(from_os_str), required = true)]
        files: Vec<PathBuf>,
    },

    #[structopt(about = "list the files tagged with a color")]
    Files { color: String },

    #[structopt(about = "show the color a file is tagged with")]
    Color {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    #[structopt(about = "list every color in use, with how many files carry it")]
    Colors,

    #[structopt(about = "list a directory with its tags")]
    Ls {
        #[structopt(parse(from_os_str), help = "directory to list [default: current directory]")]
        dir: Option<PathBuf>,

        #[structopt(long, help = "number of lines to show [default: all]")]
        height: Option<usize>,

        #[structopt(long, default_value = "0", help = "first line to show")]
        top: usize,
    },

    #[structopt(about = "browse a directory interactively; commands are read from STDIN")]
    Browse {
        #[structopt(parse(from_os_str), help = "directory to list [default: current directory]")]
        dir: Option<PathBuf>,

        #[structopt(long, default_value = "20", help = "number of lines to show")]
        height: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments.
    let opt = Opt::from_args();

    // Set up logging. The handle has to outlive everything that logs.
    let _logger = Logger::try_with_env_or_str("warn")?.start()?;

    let mut session = Session::new(opt.config, TagStore::new());
    let result = run(&mut session, opt.command).await;

    // Whatever happened, save any tags that changed.
    session.shutdown().await;
    result
}

async fn run(session: &mut Session, command: Command) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let ansi = stdout.is_terminal();
    let mut out = stdout.lock();

    match command {
        Command::Tag { color, files } => {
            let ids = file_ids(session.config(), &files)?;
            let changed = session.set_color(ids, &color).await;
            log::info!("{} of {} files changed", changed, files.len());
        }
        Command::Untag { files } => {
            let ids = file_ids(session.config(), &files)?;
            let changed = session.set_color(ids, "").await;
            log::info!("{} of {} files untagged", changed, files.len());
        }
        Command::Files { color } => {
            for id in session.activate().await.ids_with_color(&color).await {
                writeln!(out, "{}", id)?;
            }
        }
        Command::Color { file } => {
            let id = session.config().file_id(&file)?;
            match session.activate().await.color_of(&id).await {
                Some(color) => writeln!(out, "{}", color)?,
                None => log::info!("{} is not tagged", id),
            }
        }
        Command::Colors => {
            let index = session.activate().await.snapshot().await;
            for (color, count) in index.colors() {
                writeln!(out, "{:>6} {}", count, color)?;
            }
        }
        Command::Ls { dir, height, top } => {
            let mut listing = read_listing(session.config(), dir)?;
            if let Some(height) = height {
                listing.set_height(height);
            }
            listing.scroll_to(top);

            session.open(listing).await;
            if let Some(listing) = session.listing() {
                write!(out, "{}", paint::paint(listing, ansi))?;
            }
        }
        Command::Browse { dir, height } => {
            let mut listing = read_listing(session.config(), dir)?;
            listing.set_height(height);
            session.open(listing).await;

            browse::run(session, read_lines(), ansi, &mut out).await?;
        }
    }

    Ok(())
}

fn file_ids(config: &Config, files: &[PathBuf]) -> io::Result<Vec<String>> {
    files.iter().map(|file| config.file_id(file)).collect()
}

fn read_listing(config: &Config, dir: Option<PathBuf>) -> anyhow::Result<DirListing> {
    let dir = config.listing_dir(dir.as_deref())?;

    Ok(DirListing::read(&dir, &config.root()?)?)
}

/// Reads STDIN on its own thread, one line at a time. The channel closes at
/// the end of the input.
fn read_lines() -> flume::Receiver<String> {
    let (tx, rx) = flume::unbounded();

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("error reading commands: {}", e);
                    break;
                }
            }
        }
    });

    rx
}
