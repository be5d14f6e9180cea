use std::{
    cmp,
    collections::BTreeSet,
    ffi::{OsStr, OsString},
    ops::Range,
    path::{Path, PathBuf},
};

use colortag_state::FileId;
use walkdir::WalkDir;

use crate::{Entry, Error, ListingView, Overlays};

/// One file in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: OsString,
    pub is_dir: bool,
    pub len: u64,
}

impl Row {
    pub fn file(name: &str, len: u64) -> Self {
        Self {
            name: OsString::from(name),
            is_dir: false,
            len,
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: OsString::from(name),
            is_dir: true,
            len: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Line {
    span: Range<usize>,

    /// Span of the file name as displayed, for entry lines.
    name: Option<Range<usize>>,

    /// The name as it is on disk, which the display may have altered.
    file_name: Option<OsString>,
}

/// An `ls -l` style listing of a single directory, with a scrollable window,
/// a point, and a set of marked lines.
///
/// ```text
///   /home/me/src:
///   total 2
///   d        0 .
///   d        0 ..
///   -      120 a.txt
///   d     4096 sub
/// ```
#[derive(Debug)]
pub struct DirListing {
    dir: PathBuf,
    root: PathBuf,
    text: String,
    lines: Vec<Line>,

    top: usize,
    height: usize,
    point: usize,
    marked: BTreeSet<usize>,

    overlays: Overlays,
}

impl DirListing {
    /// Builds a listing of `dir` showing `rows` in the given order. Relative
    /// file IDs are computed against `root`.
    pub fn new<I>(dir: &Path, root: &Path, rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
    {
        let rows: Vec<Row> = rows.into_iter().collect();
        let mut listing = Self {
            dir: dir.to_path_buf(),
            root: root.to_path_buf(),
            text: String::new(),
            lines: Vec::new(),
            top: 0,
            height: usize::MAX,
            point: 0,
            marked: BTreeSet::new(),
            overlays: Overlays::new(),
        };

        listing.push_line(&format!("  {}:", dir.display()), None);
        listing.push_line(&format!("  total {}", rows.len()), None);
        for row in [Row::dir("."), Row::dir("..")].iter().chain(rows.iter()) {
            let prefix = format!(
                "  {} {:>8} ",
                if row.is_dir { 'd' } else { '-' },
                row.len
            );
            listing.push_line(&prefix, Some(row.name.as_os_str()));
        }

        // Start with the point on the first real entry, if there is one.
        listing.point = cmp::min(4, listing.lines.len() - 1);
        listing
    }

    /// Reads `dir` from disk, sorted by file name.
    pub fn read(dir: &Path, root: &Path) -> Result<Self, Error> {
        let mut rows = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        {
            let entry = entry?;
            let metadata = entry.metadata()?;

            rows.push(Row {
                name: entry.file_name().to_os_string(),
                is_dir: metadata.is_dir(),
                len: metadata.len(),
            });
        }

        log::debug!("read {} entries from {}", rows.len(), dir.display());
        Ok(Self::new(dir, root, rows))
    }

    fn push_line(&mut self, prefix: &str, file_name: Option<&OsStr>) {
        let start = self.text.len();
        self.text.push_str(prefix);

        let name = file_name.map(|file_name| {
            let name_start = self.text.len();
            // Names can't span lines.
            for c in file_name.to_string_lossy().chars() {
                self.text.push(if c == '\n' { '?' } else { c });
            }
            name_start..self.text.len()
        });

        self.lines.push(Line {
            span: start..self.text.len(),
            name,
            file_name: file_name.map(OsStr::to_os_string),
        });
        self.text.push('\n');
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line_text(&self, line: usize) -> Option<&str> {
        self.line_span(line).map(|span| &self.text[span])
    }

    /// The line containing `offset`. Offsets past the end belong to the last
    /// line.
    pub fn line_at(&self, offset: usize) -> usize {
        self.lines
            .partition_point(|line| line.span.start <= offset)
            .saturating_sub(1)
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = cmp::max(height, 1);
        self.scroll_to(self.top);
    }

    /// The lines currently on screen.
    pub fn visible_lines(&self) -> Range<usize> {
        self.top..cmp::min(self.top.saturating_add(self.height), self.lines.len())
    }

    /// Scrolls so that `top` is the first visible line, keeping the window
    /// within the listing. Returns true if the window moved.
    pub fn scroll_to(&mut self, top: usize) -> bool {
        let last_top = self.lines.len().saturating_sub(self.height);
        let top = cmp::min(top, last_top);

        let moved = top != self.top;
        self.top = top;
        moved
    }

    pub fn scroll_by(&mut self, delta: isize) -> bool {
        let top = if delta < 0 {
            self.top.saturating_sub(delta.unsigned_abs())
        } else {
            self.top.saturating_add(delta as usize)
        };
        self.scroll_to(top)
    }

    pub fn point(&self) -> usize {
        self.point
    }

    /// Moves the point to `line`, scrolling it into view if needed.
    pub fn goto(&mut self, line: usize) -> bool {
        if line >= self.lines.len() {
            return false;
        }

        self.point = line;
        let visible = self.visible_lines();
        if line < visible.start {
            self.scroll_to(line);
        } else if line >= visible.end {
            self.scroll_to(line + 1 - cmp::min(self.height, line + 1));
        }
        true
    }

    /// Marks `line` if it shows a real file.
    pub fn mark(&mut self, line: usize) -> bool {
        if self.file_id(line, false).is_none() {
            return false;
        }
        self.marked.insert(line)
    }

    pub fn unmark_all(&mut self) {
        self.marked.clear();
    }

    pub fn is_marked(&self, line: usize) -> bool {
        self.marked.contains(&line)
    }

    pub fn marked(&self) -> impl Iterator<Item = usize> + '_ {
        self.marked.iter().copied()
    }

    /// Every line showing a real file.
    pub fn file_lines(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.lines.len()).filter(move |line| self.file_id(*line, false).is_some())
    }
}

impl ListingView for DirListing {
    fn visible_range(&self) -> Range<usize> {
        let lines = self.visible_lines();
        match (self.lines.get(lines.start), lines.end.checked_sub(1)) {
            (Some(first), Some(last)) if last >= lines.start => {
                first.span.start..self.lines[last].span.end
            }
            _ => 0..0,
        }
    }

    fn lines_covering(&self, range: Range<usize>) -> Range<usize> {
        if self.lines.is_empty() {
            return 0..0;
        }

        let first = self.line_at(range.start);
        let last = if range.end > range.start {
            self.line_at(range.end - 1)
        } else {
            first
        };

        first..last + 1
    }

    fn line_span(&self, line: usize) -> Option<Range<usize>> {
        self.lines.get(line).map(|line| line.span.clone())
    }

    fn entry(&self, line: usize) -> Option<Entry<'_>> {
        let span = self.lines.get(line)?.name.clone()?;
        Some(Entry {
            name: &self.text[span.clone()],
            span,
        })
    }

    fn file_id(&self, line: usize, relative: bool) -> Option<FileId> {
        let file_name = self.lines.get(line)?.file_name.as_ref()?;
        if file_name == "." || file_name == ".." {
            return None;
        }

        let path = self.dir.join(file_name);
        let id = match path.strip_prefix(&self.root) {
            Ok(rel) if relative => rel.to_string_lossy(),
            _ => path.to_string_lossy(),
        };

        Some(id.into_owned())
    }

    fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    fn overlays_mut(&mut self) -> &mut Overlays {
        &mut self.overlays
    }
}
