//! File listings and the color tags drawn over them.
//!
//! A host that shows files implements [`ListingView`]; [`Renderer`] uses that
//! to decorate the names of tagged files with overlays. [`DirListing`] is a
//! plain in-memory view of one directory.

use std::ops::Range;

use colortag_state::FileId;

mod dir;
pub use dir::{DirListing, Row};

mod error;
pub use error::Error;

mod overlay;
pub use overlay::{Face, Overlay, Overlays};

mod render;
pub use render::{Phase, Renderer, Style, GLYPH, OVERLAY_KEY};

/// A file entry as shown on one line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<'a> {
    /// The name as displayed.
    pub name: &'a str,

    /// Byte span of the name within the listing text.
    pub span: Range<usize>,
}

/// What the renderer needs from a listing. Positions are byte offsets into
/// the listing text; lines are zero based.
pub trait ListingView {
    /// The part of the listing currently on screen.
    fn visible_range(&self) -> Range<usize>;

    /// The lines touched by `range`. A range that starts or ends partway
    /// through a line covers all of it.
    fn lines_covering(&self, range: Range<usize>) -> Range<usize>;

    /// Byte span of `line`, excluding its line break.
    fn line_span(&self, line: usize) -> Option<Range<usize>>;

    /// The entry on `line`, or `None` for headers, summaries and blank lines.
    fn entry(&self, line: usize) -> Option<Entry<'_>>;

    /// The ID of the file on `line`, either relative to the configured root or
    /// absolute. `None` if the line does not show a real file.
    fn file_id(&self, line: usize, relative: bool) -> Option<FileId>;

    fn overlays(&self) -> &Overlays;

    fn overlays_mut(&mut self) -> &mut Overlays;
}
