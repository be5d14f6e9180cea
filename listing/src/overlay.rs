use std::{cmp, collections::BTreeMap, ops::Range};

/// How an overlay is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Face {
    /// A glyph drawn immediately after the span, in the given foreground
    /// color.
    Glyph { glyph: char, foreground: String },

    /// The given background color across the whole span.
    Background(String),
}

/// A decoration over a byte span of a listing's text.
///
/// `key` identifies the producer, so that each producer can find and remove
/// its own overlays without knowing why they were attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    pub key: &'static str,
    pub span: Range<usize>,
    pub face: Face,
}

impl Overlay {
    fn intersects(&self, range: &Range<usize>) -> bool {
        self.span.start < range.end
            && (self.span.end > range.start || self.span.start >= range.start)
    }
}

/// The overlays attached to a view, keyed by span start and producer.
#[derive(Debug, Default, Clone)]
pub struct Overlays {
    by_start: BTreeMap<(usize, &'static str), Overlay>,

    // Longest span ever attached. Bounds how far before a range we need to look
    // for overlays that reach into it.
    max_len: usize,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `overlay`, replacing (and returning) any overlay with the same
    /// key at the same start.
    pub fn attach(&mut self, overlay: Overlay) -> Option<Overlay> {
        self.max_len = cmp::max(self.max_len, overlay.span.len());
        self.by_start
            .insert((overlay.span.start, overlay.key), overlay)
    }

    pub fn get(&self, start: usize, key: &'static str) -> Option<&Overlay> {
        self.by_start.get(&(start, key))
    }

    /// Iterates over every overlay, of any key, that touches `range`.
    pub fn in_range(&self, range: Range<usize>) -> impl Iterator<Item = &Overlay> {
        let lower = range.start.saturating_sub(self.max_len);
        let upper = cmp::max(lower, range.end);

        self.by_start
            .range((lower, "")..(upper, ""))
            .map(|(_, overlay)| overlay)
            .filter(move |overlay| overlay.intersects(&range))
    }

    /// Removes every overlay with `key` that touches `range`, returning how
    /// many were removed.
    pub fn remove_in(&mut self, range: Range<usize>, key: &'static str) -> usize {
        let doomed: Vec<(usize, &'static str)> = self
            .in_range(range)
            .filter(|overlay| overlay.key == key)
            .map(|overlay| (overlay.span.start, overlay.key))
            .collect();

        for k in doomed.iter() {
            self.by_start.remove(k);
        }
        if self.by_start.is_empty() {
            self.max_len = 0;
        }

        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.by_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_start.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.by_start.values()
    }
}
