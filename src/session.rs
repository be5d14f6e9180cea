use std::{future, ops::Range, path::PathBuf};

use colortag_scheduler::{Fired, Scheduler, Worker};
use colortag_state::{FileId, TagStore};
use listing::{DirListing, ListingView, Renderer, Style};
use thiserror::Error;

use crate::config::Config;

/// Ties a [`TagStore`] to the listing currently on screen, if any.
///
/// Direct changes to tags are drawn straight away; scrolling and other view
/// changes go through the view's debounced [`Scheduler`], and the host renders
/// whatever [`Session::next_render`] hands back.
#[derive(Debug)]
pub(crate) struct Session {
    config: Config,
    store: TagStore,
    store_path: PathBuf,
    activated: bool,
    dirty: bool,
    view: Option<View>,
}

#[derive(Debug)]
struct View {
    listing: DirListing,
    renderer: Renderer,
    scheduler: Scheduler,
    fired: Fired,
    worker: Worker,
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("{0}")]
    UnsupportedContext(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Listing(#[from] listing::Error),

    #[error(transparent)]
    Scheduler(#[from] colortag_scheduler::Error),
}

impl Session {
    pub(crate) fn new(config: Config, store: TagStore) -> Self {
        let store_path = config.store_path();

        Self {
            config,
            store,
            store_path,
            activated: false,
            dirty: false,
            view: None,
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the saved tags, the first time it is called.
    ///
    /// A missing or unreadable index leaves the store empty; the session keeps
    /// working either way.
    pub(crate) async fn activate(&mut self) -> &TagStore {
        if !self.activated {
            self.activated = true;

            match self.store.ensure_loaded(&self.store_path).await {
                Ok(true) => log::debug!("loaded tags from {}", self.store_path.display()),
                Ok(false) => {}
                Err(e) => log::warn!(
                    "cannot load tags from {}; starting without them: {}",
                    self.store_path.display(),
                    e
                ),
            }
        }

        &self.store
    }

    pub(crate) fn listing(&self) -> Option<&DirListing> {
        self.view.as_ref().map(|view| &view.listing)
    }

    /// Shows `listing`, replacing whatever was shown before, and draws the tags
    /// that are visible in it.
    pub(crate) async fn open(&mut self, listing: DirListing) {
        self.activate().await;
        if let Some(view) = self.view.take() {
            view.close().await;
        }

        let (scheduler, fired, worker) = colortag_scheduler::new(self.config.scheduler.delay());
        self.view = Some(View {
            listing,
            renderer: Renderer::new(self.config.style, self.config.relative),
            scheduler,
            fired,
            worker,
        });

        self.redraw().await;
    }

    /// Tags `ids` with `color`, or untags them if `color` is empty, and redraws
    /// the current listing before returning. Returns the number of files whose
    /// tag changed.
    pub(crate) async fn set_color<I>(&mut self, ids: I, color: &str) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.activate().await;

        let changed = self.store.set_color(ids, color).await;
        if changed > 0 {
            self.dirty = true;
            self.redraw().await;
        }

        changed
    }

    /// Tags the marked files in the listing, or the file at point if nothing is
    /// marked.
    pub(crate) async fn tag_marked(&mut self, color: &str) -> Result<usize, Error> {
        let view = self
            .view
            .as_ref()
            .ok_or(Error::UnsupportedContext("not in a file listing"))?;

        let ids = view.selected_ids(self.config.relative);
        if ids.is_empty() {
            return Err(Error::UnsupportedContext("no file on this line"));
        }

        Ok(self.set_color(ids, color).await)
    }

    /// Marks exactly the files in the listing tagged with `color`. Returns how
    /// many were marked.
    pub(crate) async fn select_color(&mut self, color: &str) -> Result<usize, Error> {
        self.activate().await;

        let relative = self.config.relative;
        let view = self
            .view
            .as_mut()
            .ok_or(Error::UnsupportedContext("not in a file listing"))?;

        let ids = self.store.ids_with_color(color).await;
        let lines: Vec<usize> = view
            .listing
            .file_lines()
            .filter(|line| {
                view.listing
                    .file_id(*line, relative)
                    .map_or(false, |id| ids.contains(&id))
            })
            .collect();

        view.listing.unmark_all();
        for line in lines.iter() {
            view.listing.mark(*line);
        }

        Ok(lines.len())
    }

    pub(crate) fn mark(&mut self, line: Option<usize>) -> Result<bool, Error> {
        let view = self.view_mut()?;
        let line = line.unwrap_or_else(|| view.listing.point());

        Ok(view.listing.mark(line))
    }

    pub(crate) fn unmark_all(&mut self) -> Result<(), Error> {
        self.view_mut()?.listing.unmark_all();
        Ok(())
    }

    /// Scrolls the listing by `delta` lines. The newly visible lines are drawn
    /// once scrolling settles.
    pub(crate) fn scroll(&mut self, delta: isize) -> Result<bool, Error> {
        let view = self.view_mut()?;
        if !view.listing.scroll_by(delta) {
            return Ok(false);
        }

        view.request_visible()?;
        Ok(true)
    }

    /// Moves the point to `line`, scrolling if needed.
    pub(crate) fn goto(&mut self, line: usize) -> Result<bool, Error> {
        let view = self.view_mut()?;
        let top = view.listing.top();
        if !view.listing.goto(line) {
            return Ok(false);
        }

        if view.listing.top() != top {
            view.request_visible()?;
        }
        Ok(true)
    }

    pub(crate) async fn set_style(&mut self, style: Style) -> Result<(), Error> {
        self.view_mut()?.renderer.set_style(style);
        self.redraw().await;

        Ok(())
    }

    /// Re-reads the listing from disk, keeping the window and point where they
    /// were as far as possible.
    pub(crate) async fn reload(&mut self) -> Result<(), Error> {
        let root = self.config.root()?;
        let view = self.view_mut()?;

        {
            // Offsets from before the reload are meaningless afterwards.
            let _quiet = view.scheduler.quiet();
            view.scheduler.cancel_pending()?;

            let mut listing = DirListing::read(view.listing.dir(), &root)?;
            listing.set_height(view.listing.height());
            listing.scroll_to(view.listing.top());
            listing.goto(view.listing.point());
            view.listing = listing;

            view.request_visible()?;
        }

        self.redraw().await;
        Ok(())
    }

    /// Waits for the next debounced render to come due. Never completes if no
    /// listing is open.
    pub(crate) async fn next_render(&mut self) -> Option<Range<usize>> {
        match self.view.as_mut() {
            Some(view) => view.fired.recv().await,
            None => future::pending().await,
        }
    }

    /// Draws the tags in `range` and on screen. Returns the number of
    /// decorations attached.
    pub(crate) async fn render(&mut self, range: Range<usize>) -> usize {
        let index = self.store.read().await;

        match self.view.as_mut() {
            Some(view) => view.renderer.apply(&mut view.listing, range, &index),
            None => 0,
        }
    }

    /// Drops every decoration and draws the visible tags from scratch.
    async fn redraw(&mut self) -> usize {
        let index = self.store.read().await;

        match self.view.as_mut() {
            Some(view) => {
                view.renderer.clear(&mut view.listing, None);
                let visible = view.listing.visible_range();
                view.renderer.apply(&mut view.listing, visible, &index)
            }
            None => 0,
        }
    }

    /// Closes the listing and saves the tags if they changed. Failures are
    /// logged; there is nobody left to report them to.
    pub(crate) async fn shutdown(mut self) {
        if let Some(view) = self.view.take() {
            view.close().await;
        }

        if !self.dirty {
            return;
        }

        match self.store.flush(&self.store_path).await {
            Ok(true) => log::debug!("saved tags to {}", self.store_path.display()),
            Ok(false) => log::debug!("no tags left; not saving"),
            Err(e) => log::error!(
                "cannot save tags to {}: {}",
                self.store_path.display(),
                e
            ),
        }
    }

    fn view_mut(&mut self) -> Result<&mut View, Error> {
        self.view
            .as_mut()
            .ok_or(Error::UnsupportedContext("not in a file listing"))
    }
}

impl View {
    fn request_visible(&self) -> Result<(), Error> {
        Ok(self.scheduler.request(self.listing.visible_range())?)
    }

    fn selected_ids(&self, relative: bool) -> Vec<FileId> {
        let mut lines: Vec<usize> = self.listing.marked().collect();
        if lines.is_empty() {
            lines.push(self.listing.point());
        }

        lines
            .into_iter()
            .filter_map(|line| self.listing.file_id(line, relative))
            .collect()
    }

    async fn close(self) {
        let View {
            scheduler, worker, ..
        } = self;

        drop(scheduler);
        if let Err(e) = worker.wait().await {
            log::warn!("render scheduler exited with an error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use listing::{Face, Row, GLYPH};
    use structopt::StructOpt;
    use tokio::time;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn config(store: &Path, extra: &[&str]) -> Config {
        let mut args = vec![
            "colortag".to_string(),
            "--store".to_string(),
            store.display().to_string(),
        ];
        if !extra.contains(&"--root") {
            args.extend(vec!["--root".to_string(), "/d".to_string()]);
        }
        args.extend(extra.iter().map(|arg| arg.to_string()));

        Config::from_iter_safe(args).unwrap()
    }

    fn dir_listing(files: usize) -> DirListing {
        DirListing::new(
            Path::new("/d"),
            Path::new("/d"),
            (0..files).map(|i| Row::file(&format!("f{:02}", i), i as u64)),
        )
    }

    fn decorated(session: &Session) -> Vec<String> {
        let listing = session.listing().unwrap();
        listing
            .overlays()
            .iter()
            .map(|overlay| listing.text()[overlay.span.clone()].to_string())
            .collect()
    }

    async fn assert_nothing_due(session: &mut Session) {
        assert!(
            time::timeout(Duration::from_secs(1), session.next_render())
                .await
                .is_err()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_draws_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());
        session.open(dir_listing(3)).await;

        assert_eq!(session.set_color(["/d/f01"], "red").await, 1);
        assert_eq!(decorated(&session), vec!["f01"]);

        // Retagging replaces the decoration; untagging removes it.
        assert_eq!(session.set_color(["/d/f01"], "blue").await, 1);
        let face = session.listing().unwrap().overlays().iter().next().map(|o| o.face.clone());
        assert_eq!(
            face,
            Some(Face::Glyph {
                glyph: GLYPH,
                foreground: "blue".to_string()
            })
        );

        assert_eq!(session.set_color(["/d/f01"], "").await, 1);
        assert!(decorated(&session).is_empty());

        // Nothing was scheduled for any of that.
        assert_nothing_due(&mut session).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.el");

        let saved = TagStore::new();
        saved.set_color(["/d/f00", "/d/f02"], "green").await;
        saved.flush(&path).await.unwrap();

        let store = TagStore::new();
        let mut session = Session::new(config(&path, &[]), store.clone());
        assert!(store.is_empty().await);

        session.open(dir_listing(3)).await;
        assert_eq!(store.color_of("/d/f02").await.as_deref(), Some("green"));
        assert_eq!(decorated(&session), vec!["f00", "f02"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.el");
        std::fs::write(&path, "((\"/d/f00\" . ").unwrap();

        let mut session = Session::new(config(&path, &[]), TagStore::new());
        session.open(dir_listing(2)).await;
        assert!(decorated(&session).is_empty());
        assert!(session.activate().await.is_empty().await);

        // Nothing changed, so the broken file is left for the user to fix.
        session.shutdown().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "((\"/d/f00\" . ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_marked() {
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::new();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), store.clone());

        assert!(matches!(
            session.tag_marked("red").await,
            Err(Error::UnsupportedContext(_))
        ));

        session.open(dir_listing(4)).await;

        // The point starts on the first file.
        assert_eq!(assert_ok!(session.tag_marked("red").await), 1);
        assert_eq!(store.color_of("/d/f00").await.as_deref(), Some("red"));

        assert!(assert_ok!(session.mark(Some(6))));
        assert!(assert_ok!(session.mark(Some(7))));
        assert_eq!(assert_ok!(session.tag_marked("blue").await), 2);
        assert_eq!(decorated(&session), vec!["f00", "f02", "f03"]);

        // The header isn't a file.
        session.unmark_all().unwrap();
        assert!(session.goto(0).unwrap());
        assert!(matches!(
            session.tag_marked("red").await,
            Err(Error::UnsupportedContext(_))
        ));
        assert_eq!(store.ids_with_color("red").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_color() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());
        session.open(dir_listing(5)).await;

        session.set_color(["/d/f01", "/d/f03", "/elsewhere"], "red").await;
        session.mark(Some(4)).unwrap();

        assert_eq!(session.select_color("red").await.unwrap(), 2);
        assert_eq!(
            session.listing().unwrap().marked().collect::<Vec<_>>(),
            vec![5, 7]
        );

        assert_eq!(session.select_color("purple").await.unwrap(), 0);
        assert_eq!(session.listing().unwrap().marked().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_relative() {
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::new();
        let mut session = Session::new(
            config(&dir.path().join("index.el"), &["--relative"]),
            store.clone(),
        );
        session.open(dir_listing(2)).await;

        assert_eq!(session.tag_marked("red").await.unwrap(), 1);
        assert_eq!(store.color_of("f00").await.as_deref(), Some("red"));
        assert_eq!(decorated(&session), vec!["f00"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_renders_once_settled() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());

        let mut listing = dir_listing(30);
        listing.set_height(5);
        session.open(listing).await;

        // f20 is on line 24, well off screen.
        session.set_color(["/d/f20"], "red").await;
        assert!(decorated(&session).is_empty());

        assert!(session.scroll(10).unwrap());
        assert!(session.scroll(10).unwrap());
        assert!(decorated(&session).is_empty());

        // Both scrolls arrive as a single render.
        let range = session.next_render().await.unwrap();
        let visible = session.listing().unwrap().visible_range();
        assert!(range.start < visible.start && range.end == visible.end);
        assert_eq!(session.render(range).await, 1);
        assert_eq!(decorated(&session), vec!["f20"]);

        assert_nothing_due(&mut session).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_goto_offscreen() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());

        let mut listing = dir_listing(30);
        listing.set_height(5);
        session.open(listing).await;
        session.set_color(["/d/f25"], "red").await;

        // Moving within the window doesn't need a render.
        assert!(session.goto(2).unwrap());
        assert_nothing_due(&mut session).await;

        assert!(session.goto(29).unwrap());
        let range = session.next_render().await.unwrap();
        session.render(range).await;
        assert_eq!(decorated(&session), vec!["f25"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_style() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());
        session.open(dir_listing(2)).await;
        session.set_color(["/d/f00", "/d/f01"], "red").await;

        session.set_style(Style::Background).await.unwrap();
        let listing = session.listing().unwrap();
        assert_eq!(listing.overlays().len(), 2);
        assert!(listing
            .overlays()
            .iter()
            .all(|overlay| overlay.face == Face::Background("red".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload() {
        let dir = tempfile::tempdir().unwrap();
        let files = dir.path().join("files");
        std::fs::create_dir(&files).unwrap();
        for name in ["a", "b", "c"].iter() {
            std::fs::write(files.join(name), name).unwrap();
        }

        let root = files.display().to_string();
        let mut session = Session::new(
            config(&dir.path().join("index.el"), &["--relative", "--root", root.as_str()]),
            TagStore::new(),
        );
        let mut listing = DirListing::read(&files, &files).unwrap();
        listing.set_height(3);
        session.open(listing).await;
        session.set_color(["b"], "red").await;
        assert!(decorated(&session).is_empty());

        // A scroll still waiting to render is dropped by the reload; the
        // reload draws the new text itself.
        session.scroll(4).unwrap();
        std::fs::write(files.join("0"), "").unwrap();
        session.reload().await.unwrap();

        let listing = session.listing().unwrap();
        assert_eq!(listing.line_count(), 8);
        assert_eq!(listing.top(), 4);
        assert_eq!(decorated(&session), vec!["b"]);
        assert_nothing_due(&mut session).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_saves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags").join("index.el");

        let mut session = Session::new(config(&path, &[]), TagStore::new());
        session.open(dir_listing(2)).await;
        session.set_color(["/d/f01"], "yellow").await;
        session.shutdown().await;

        let store = TagStore::new();
        let mut session = Session::new(config(&path, &[]), store.clone());
        session.activate().await;
        assert_eq!(store.color_of("/d/f01").await.as_deref(), Some("yellow"));

        // Untagging everything leaves the last saved index alone.
        session.set_color(["/d/f01"], "").await;
        session.shutdown().await;
        assert!(std::fs::read_to_string(&path).unwrap().contains("yellow"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_listing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(config(&dir.path().join("index.el"), &[]), TagStore::new());

        assert!(matches!(session.scroll(1), Err(Error::UnsupportedContext(_))));
        assert_err!(session.goto(0));
        assert_err!(session.set_style(Style::Background).await);
        assert_err!(session.reload().await);
        assert!(matches!(
            session.select_color("red").await,
            Err(Error::UnsupportedContext(_))
        ));
        assert_eq!(session.render(0..10).await, 0);

        // Tagging by ID still works without a listing.
        assert_eq!(session.set_color(["/d/f00"], "red").await, 1);
        assert_nothing_due(&mut session).await;
    }
}
