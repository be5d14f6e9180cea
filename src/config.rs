use std::{
    env, io,
    path::{Component, Path, PathBuf},
};

use colortag_state::FileId;
use listing::Style;
use structopt::StructOpt;

/// Options shared by every subcommand.
#[derive(Clone, Debug, StructOpt)]
pub(crate) struct Config {
    #[structopt(
        long,
        default_value = "block",
        env = "COLORTAG_STYLE",
        help = "how tags are drawn: block or background"
    )]
    pub(crate) style: Style,

    #[structopt(long, help = "identify files by their path relative to --root")]
    pub(crate) relative: bool,

    #[structopt(
        long,
        parse(from_os_str),
        help = "root directory for relative file IDs [default: current directory]"
    )]
    root: Option<PathBuf>,

    #[structopt(
        long,
        parse(from_os_str),
        env = "COLORTAG_STORE",
        help = "file the tags are saved in [default: <cache dir>/colortag/index.el]"
    )]
    store: Option<PathBuf>,

    #[structopt(flatten)]
    pub(crate) scheduler: colortag_scheduler::Opt,
}

impl Config {
    pub(crate) fn root(&self) -> io::Result<PathBuf> {
        match &self.root {
            Some(root) => absolute(root),
            None => env::current_dir(),
        }
    }

    pub(crate) fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("colortag")
                .join("index.el")
        })
    }

    /// The ID for a file named on the command line.
    ///
    /// The path is made absolute against the current directory; with
    /// `--relative`, it is then made relative to the root if it lies within it.
    /// No other normalisation is done.
    pub(crate) fn file_id(&self, path: &Path) -> io::Result<FileId> {
        let path = absolute(path)?;

        if self.relative {
            if let Ok(rel) = path.strip_prefix(self.root()?) {
                return Ok(rel.to_string_lossy().into_owned());
            }
        }

        Ok(path.to_string_lossy().into_owned())
    }

    /// The directory to list, resolved the same way as [`Config::file_id`] so
    /// that the IDs a listing shows match the ones given on the command line.
    pub(crate) fn listing_dir(&self, dir: Option<&Path>) -> io::Result<PathBuf> {
        match dir {
            Some(dir) => absolute(dir),
            None => env::current_dir(),
        }
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };

    Ok(path
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect())
}

#[cfg(test)]
mod tests {
    use listing::{DirListing, ListingView, Row};

    use super::*;

    fn config(args: &[&str]) -> Config {
        Config::from_iter_safe(std::iter::once("colortag").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config(&["--store", "/tmp/tags.el"]);

        assert_eq!(config.style, Style::Block);
        assert!(!config.relative);
        assert_eq!(config.store_path(), PathBuf::from("/tmp/tags.el"));
        assert_eq!(config.root().unwrap(), env::current_dir().unwrap());
        assert_eq!(
            config.scheduler.delay(),
            std::time::Duration::from_millis(20)
        );
    }

    #[test]
    fn test_options() {
        let config = config(&[
            "--style",
            "background",
            "--relative",
            "--root",
            "/srv",
            "--debounce-delay",
            "150ms",
        ]);

        assert_eq!(config.style, Style::Background);
        assert!(config.relative);
        assert_eq!(config.root().unwrap(), PathBuf::from("/srv"));
        assert_eq!(
            config.scheduler.delay(),
            std::time::Duration::from_millis(150)
        );

        assert!(Config::from_iter_safe(vec!["colortag", "--style", "stripes"]).is_err());
    }

    #[test]
    fn test_file_id() {
        let absolute = config(&["--root", "/srv"]);
        assert_eq!(absolute.file_id(Path::new("/srv/a.txt")).unwrap(), "/srv/a.txt");
        assert_eq!(
            absolute.file_id(Path::new("/srv/./sub/b.txt")).unwrap(),
            "/srv/sub/b.txt"
        );

        let relative = config(&["--relative", "--root", "/srv"]);
        assert_eq!(relative.file_id(Path::new("/srv/a.txt")).unwrap(), "a.txt");
        assert_eq!(
            relative.file_id(Path::new("/srv/sub/b.txt")).unwrap(),
            "sub/b.txt"
        );
        assert_eq!(relative.file_id(Path::new("/etc/hosts")).unwrap(), "/etc/hosts");

        let cwd = env::current_dir().unwrap();
        assert_eq!(absolute.listing_dir(None).unwrap(), cwd);
        assert_eq!(absolute.listing_dir(Some(Path::new("."))).unwrap(), cwd);
        assert_eq!(
            absolute.file_id(Path::new("./x")).unwrap(),
            cwd.join("x").to_string_lossy()
        );
    }

    #[test]
    fn test_listing_ids_match_file_ids() {
        for args in [&["--root", "/srv"][..], &["--relative"][..]].iter() {
            let config = config(args);
            let root = config.root().unwrap();

            for dir in [None, Some("."), Some("./")].iter() {
                let dir = config.listing_dir(dir.map(Path::new)).unwrap();
                let listing = DirListing::new(&dir, &root, vec![Row::file("a.txt", 1)]);

                assert_eq!(
                    listing.file_id(4, config.relative),
                    Some(config.file_id(Path::new("a.txt")).unwrap()),
                    "listing {} with {:?}",
                    dir.display(),
                    args
                );
            }
        }
    }
}
