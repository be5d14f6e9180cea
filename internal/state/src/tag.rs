use std::collections::{BTreeMap, BTreeSet};

use crate::{Color, FileId};

/// The bidirectional relation between file IDs and colors.
///
/// `color_of` is the primary mapping; `ids_of` is the derived index used to
/// answer "which files carry this color" without scanning. Both are only ever
/// modified together through [`Index::set_color`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    /// Each file has at most one color.
    color_of: BTreeMap<FileId, Color>,

    /// Reverse index. Empty sets are pruned.
    ids_of: BTreeMap<Color, BTreeSet<FileId>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from already materialised maps, without re-deriving
    /// either side from the other.
    pub(crate) fn from_parts(
        color_of: BTreeMap<FileId, Color>,
        ids_of: BTreeMap<Color, BTreeSet<FileId>>,
    ) -> Self {
        Self { color_of, ids_of }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.color_of
            .iter()
            .map(|(id, color)| (id.as_str(), color.as_str()))
    }

    pub(crate) fn groups(&self) -> impl Iterator<Item = (&str, &BTreeSet<FileId>)> {
        self.ids_of.iter().map(|(color, ids)| (color.as_str(), ids))
    }

    /// Tags every ID in `ids` with `color`, or untags them if `color` is empty.
    ///
    /// Returns the number of IDs whose color actually changed.
    pub fn set_color<I>(&mut self, ids: I, color: &str) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut changed = 0;

        for id in ids {
            let id = id.as_ref();

            if let Some(old) = self.color_of.get(id) {
                if old == color {
                    continue;
                }

                let old = old.clone();
                self.remove_from_group(&old, id);
            } else if color.is_empty() {
                continue;
            }

            if color.is_empty() {
                self.color_of.remove(id);
            } else {
                self.color_of.insert(id.to_string(), color.to_string());
                self.ids_of
                    .entry(color.to_string())
                    .or_default()
                    .insert(id.to_string());
            }

            changed += 1;
        }

        changed
    }

    pub fn color_of(&self, id: &str) -> Option<&str> {
        self.color_of.get(id).map(|color| color.as_str())
    }

    pub fn ids_with_color(&self, color: &str) -> BTreeSet<FileId> {
        self.ids_of.get(color).cloned().unwrap_or_default()
    }

    /// Iterates over every color in use along with the number of files
    /// carrying it.
    pub fn colors(&self) -> impl Iterator<Item = (&str, usize)> {
        self.ids_of
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(color, ids)| (color.as_str(), ids.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.color_of.is_empty() && self.ids_of.is_empty()
    }

    /// Number of tagged files.
    pub fn len(&self) -> usize {
        self.color_of.len()
    }

    /// Checks that both sides of the relation agree.
    pub fn is_consistent(&self) -> bool {
        let forward = self.color_of.iter().all(|(id, color)| {
            self.ids_of
                .get(color)
                .map_or(false, |ids| ids.contains(id))
        });
        let reverse = self.ids_of.iter().all(|(color, ids)| {
            ids.iter()
                .all(|id| self.color_of.get(id).map_or(false, |c| c == color))
        });

        forward && reverse
    }

    fn remove_from_group(&mut self, color: &str, id: &str) {
        if let Some(ids) = self.ids_of.get_mut(color) {
            ids.remove(id);
            if ids.is_empty() {
                self.ids_of.remove(color);
            }
        }
    }
}
