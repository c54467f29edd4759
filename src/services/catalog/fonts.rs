//! Advance widths of the standard Helvetica faces (WinAnsi codes 32..=126),
//! in 1/1000 em, from the Adobe core font metrics.

use crate::models::catalog::FontFace;

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 126;

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Bytes as they appear in a content stream. Characters outside printable
/// ASCII are replaced with `?`, which the standard faces can always draw.
pub fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u8::try_from(c) {
            Ok(b) if (FIRST_CHAR..=LAST_CHAR).contains(&b) => b,
            _ => b'?',
        })
        .collect()
}

/// Rendered width of `text` in points at `size`.
pub fn text_width(text: &str, face: FontFace, size: f32) -> f32 {
    let table = match face {
        FontFace::Bold => &HELVETICA_BOLD,
        // Oblique shares the upright metrics.
        FontFace::Regular | FontFace::Oblique => &HELVETICA,
    };
    let units: u32 = encode(text)
        .into_iter()
        .map(|b| u32::from(table[usize::from(b - FIRST_CHAR)]))
        .sum();
    units as f32 * size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        // "A" is 667 units regular, 722 bold.
        assert!((text_width("A", FontFace::Regular, 1000.0) - 667.0).abs() < 1e-3);
        assert!((text_width("A", FontFace::Bold, 1000.0) - 722.0).abs() < 1e-3);
        assert!((text_width("10", FontFace::Regular, 10.0) - 11.12).abs() < 1e-3);
    }

    #[test]
    fn test_oblique_matches_regular() {
        assert_eq!(
            text_width("Collection 2024", FontFace::Oblique, 18.0),
            text_width("Collection 2024", FontFace::Regular, 18.0)
        );
    }

    #[test]
    fn test_non_ascii_replaced() {
        assert_eq!(encode("Café"), b"Caf?".to_vec());
        assert_eq!(text_width("é", FontFace::Regular, 1000.0), 556.0);
    }
}
