use std::{cmp, fmt, ops::Range, str::FromStr};

use colortag_state::Index;

use crate::{Error, Face, ListingView, Overlay};

/// Key stamped on every overlay the renderer attaches.
pub const OVERLAY_KEY: &str = "colortag";

/// Glyph drawn after tagged names in [`Style::Block`].
pub const GLYPH: char = '■';

/// How a tag is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// A colored glyph after the name.
    Block,

    /// The name drawn on a colored background.
    Background,
}

impl Default for Style {
    fn default() -> Self {
        Self::Block
    }
}

impl FromStr for Style {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "background" => Ok(Self::Background),
            other => Err(Error::UnknownStyle(other.to_string())),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::Background => "background",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Cleared,
    Applying,
}

/// Draws tags from an [`Index`] over a [`ListingView`].
///
/// Decorations are overlays keyed with [`OVERLAY_KEY`]; clearing works from
/// those alone, so decorations for files that have since been untagged or
/// removed still go away.
#[derive(Debug)]
pub struct Renderer {
    style: Style,
    relative: bool,
    phase: Phase,
}

impl Renderer {
    /// `relative` selects whether files are looked up by their ID relative to
    /// the configured root, or by absolute path.
    pub fn new(style: Style, relative: bool) -> Self {
        Self {
            style,
            relative,
            phase: Phase::Cleared,
        }
    }

    pub fn style(&self) -> Style {
        self.style
    }

    /// Changes the style for subsequent renders. Existing decorations are left
    /// as they are until they are re-applied or cleared.
    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Decorates every tagged entry within `range`, plus whatever is currently
    /// on screen.
    ///
    /// Entries without a tag are left alone, as are entries already carrying
    /// the right decoration. Returns the number of decorations attached.
    pub fn apply<V>(&mut self, view: &mut V, range: Range<usize>, index: &Index) -> usize
    where
        V: ListingView + ?Sized,
    {
        self.phase = Phase::Applying;

        let requested = view.lines_covering(range);
        let visible = view.lines_covering(view.visible_range());
        let lines = union(requested, visible);

        let mut attached = 0;
        for line in lines.iter().cloned().flatten() {
            let span = match view.entry(line) {
                Some(entry) if entry.name != "." && entry.name != ".." => entry.span,
                _ => continue,
            };
            let color = match view
                .file_id(line, self.relative)
                .and_then(|id| index.color_of(&id).map(String::from))
            {
                Some(color) => color,
                None => continue,
            };

            let overlay = self.decoration(span, color);
            if view.overlays().get(overlay.span.start, OVERLAY_KEY) == Some(&overlay) {
                continue;
            }

            view.overlays_mut().attach(overlay);
            attached += 1;
        }

        log::trace!("applied {} decorations over lines {:?}", attached, lines);
        self.phase = Phase::Cleared;
        attached
    }

    /// Removes decorations touching `range`, or everywhere if `range` is
    /// `None`. Returns the number removed.
    pub fn clear<V>(&mut self, view: &mut V, range: Option<Range<usize>>) -> usize
    where
        V: ListingView + ?Sized,
    {
        let range = match range {
            Some(range) => {
                let lines = view.lines_covering(range);
                let start = view.line_span(lines.start).map_or(0, |span| span.start);
                let end = lines
                    .end
                    .checked_sub(1)
                    .and_then(|last| view.line_span(last))
                    .map_or(start, |span| span.end);
                start..end
            }
            None => 0..usize::MAX,
        };
        let removed = view.overlays_mut().remove_in(range, OVERLAY_KEY);

        log::trace!("cleared {} decorations", removed);
        removed
    }

    fn decoration(&self, span: Range<usize>, color: String) -> Overlay {
        let face = match self.style {
            Style::Block => Face::Glyph {
                glyph: GLYPH,
                foreground: color,
            },
            Style::Background => Face::Background(color),
        };

        Overlay {
            key: OVERLAY_KEY,
            span,
            face,
        }
    }
}

/// The lines in either `a` or `b`, as one range if they touch and two if they
/// don't.
fn union(a: Range<usize>, b: Range<usize>) -> Vec<Range<usize>> {
    if a.start <= b.end && b.start <= a.end {
        vec![cmp::min(a.start, b.start)..cmp::max(a.end, b.end)]
    } else if a.start < b.start {
        vec![a, b]
    } else {
        vec![b, a]
    }
}
