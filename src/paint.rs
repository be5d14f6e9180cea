//! Terminal output for listings and their tags.

use listing::{DirListing, Face, ListingView};

/// Reset all attributes: ESC[0m
const RESET: &str = "\x1b[0m";

/// SGR selectors for 24-bit color.
const FOREGROUND: u8 = 38;
const BACKGROUND: u8 = 48;

/// Colors that can be given by name. Anything else has to be `#RRGGBB`.
const NAMED: &[(&str, (u8, u8, u8))] = &[
    ("black", (0x00, 0x00, 0x00)),
    ("red", (0xcd, 0x00, 0x00)),
    ("green", (0x00, 0xcd, 0x00)),
    ("yellow", (0xcd, 0xcd, 0x00)),
    ("blue", (0x00, 0x00, 0xee)),
    ("magenta", (0xcd, 0x00, 0xcd)),
    ("cyan", (0x00, 0xcd, 0xcd)),
    ("white", (0xe5, 0xe5, 0xe5)),
    ("gray", (0x7f, 0x7f, 0x7f)),
    ("grey", (0x7f, 0x7f, 0x7f)),
    ("orange", (0xff, 0xa5, 0x00)),
    ("purple", (0xa0, 0x20, 0xf0)),
    ("pink", (0xff, 0xc0, 0xcb)),
    ("brown", (0xa5, 0x2a, 0x2a)),
];

/// Resolves a tag color to RGB. Names are matched case insensitively.
pub(crate) fn rgb(color: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = color.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        return Some((channel(0)?, channel(2)?, channel(4)?));
    }

    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color))
        .map(|(_, rgb)| *rgb)
}

/// The SGR sequence selecting `color` on `layer`, if the color is known.
fn sgr(layer: u8, color: &str) -> Option<String> {
    rgb(color).map(|(r, g, b)| format!("\x1b[{};2;{};{};{}m", layer, r, g, b))
}

/// Renders the visible part of `listing`.
///
/// Marked lines get a `*` in the first column and the point a `>` in the
/// second. Without `ansi`, tags drawn as a background are shown by bracketing
/// the name instead.
pub(crate) fn paint(listing: &DirListing, ansi: bool) -> String {
    let text = listing.text();
    let mut out = String::new();

    for line in listing.visible_lines() {
        let span = match listing.line_span(line) {
            Some(span) => span,
            None => continue,
        };

        out.push(if listing.is_marked(line) { '*' } else { ' ' });
        out.push(if listing.point() == line { '>' } else { ' ' });
        let mut pos = std::cmp::min(span.start + 2, span.end);

        for overlay in listing.overlays().in_range(span.clone()) {
            if overlay.span.start < pos || overlay.span.end > span.end {
                continue;
            }

            out.push_str(&text[pos..overlay.span.start]);
            let name = &text[overlay.span.clone()];

            match &overlay.face {
                Face::Glyph { glyph, foreground } => {
                    out.push_str(name);
                    out.push(' ');
                    match sgr(FOREGROUND, foreground).filter(|_| ansi) {
                        Some(on) => {
                            out.push_str(&on);
                            out.push(*glyph);
                            out.push_str(RESET);
                        }
                        None => out.push(*glyph),
                    }
                }
                Face::Background(background) => match sgr(BACKGROUND, background) {
                    Some(on) if ansi => {
                        out.push_str(&on);
                        out.push_str(name);
                        out.push_str(RESET);
                    }
                    _ if ansi => out.push_str(name),
                    _ => {
                        out.push('[');
                        out.push_str(name);
                        out.push(']');
                    }
                },
            }

            pos = overlay.span.end;
        }

        out.push_str(&text[pos..span.end]);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use colortag_state::Index;
    use listing::{Renderer, Row, Style};

    use super::*;

    fn tagged(style: Style) -> DirListing {
        let mut listing = DirListing::new(
            Path::new("/d"),
            Path::new("/d"),
            vec![Row::file("a", 1), Row::file("b", 2), Row::file("c", 3)],
        );
        let mut index = Index::new();
        index.set_color(["/d/a"], "red");
        index.set_color(["/d/c"], "#0000Ff");
        index.set_color(["/d/b"], "chartreuse-ish");

        Renderer::new(style, false).apply(&mut listing, 0..0, &index);
        listing
    }

    #[test]
    fn test_rgb() {
        assert_eq!(rgb("red"), Some((0xcd, 0x00, 0x00)));
        assert_eq!(rgb("Grey"), Some((0x7f, 0x7f, 0x7f)));
        assert_eq!(rgb("#1a2B3c"), Some((0x1a, 0x2b, 0x3c)));
        assert_eq!(rgb("#1a2b3"), None);
        assert_eq!(rgb("#+f0000"), None);
        assert_eq!(rgb("#ééé"), None);
        assert_eq!(rgb("mauve"), None);
        assert_eq!(rgb(""), None);
    }

    #[test]
    fn test_plain() {
        let mut listing = tagged(Style::Block);
        listing.mark(5);
        listing.set_height(4);
        listing.scroll_to(3);

        assert_eq!(
            paint(&listing, false),
            "  d        0 ..\n >-        1 a ■\n* -        2 b ■\n  -        3 c ■\n"
        );

        let listing = tagged(Style::Background);
        assert!(paint(&listing, false).contains(" >-        1 [a]\n"));
    }

    #[test]
    fn test_ansi() {
        let listing = tagged(Style::Block);
        let painted = paint(&listing, true);

        assert!(painted.contains(" a \x1b[38;2;205;0;0m■\x1b[0m\n"));
        assert!(painted.contains(" c \x1b[38;2;0;0;255m■\x1b[0m\n"));
        // Unknown colors still get the glyph, just uncolored.
        assert!(painted.contains(" b ■\n"));

        let listing = tagged(Style::Background);
        let painted = paint(&listing, true);
        assert!(painted.contains(" \x1b[48;2;205;0;0ma\x1b[0m\n"));
        assert!(painted.contains("        2 b\n"));
    }
}
