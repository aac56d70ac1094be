//! Word wrapping and auto-shrinking font sizes
//!
//! Every measurement goes through [`Font::text_width`], the same width table
//! the PDF font dictionary carries, so a size chosen here renders exactly at
//! the measured width.

use crate::pdf::Font;

/// Step between candidate font sizes
const SIZE_STEP: f32 = 1.0;

/// Greedy word wrap
///
/// A line keeps taking words while `line + " " + word` fits in `max_width`.
/// A word wider than `max_width` sits alone on its own line and is never
/// split. Empty or all-whitespace input yields no lines.
pub fn wrap(text: &str, max_width: f32, font: &Font, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };

        if font.text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Largest size in `[min_size, max_size]` at which `text` fits on one line
///
/// Falls back to `min_size` when nothing fits; the caller accepts the
/// overflow.
pub fn fit_one_line(text: &str, max_width: f32, font: &Font, max_size: f32, min_size: f32) -> f32 {
    let mut size = max_size;
    while size >= min_size {
        if font.text_width(text, size) <= max_width {
            return size;
        }
        size -= SIZE_STEP;
    }
    min_size
}

/// Wrapped lines plus the size they were wrapped at
#[derive(Debug, Clone, PartialEq)]
pub struct FittedText {
    pub lines: Vec<String>,
    pub size: f32,
}

/// Shrink from `max_size` until the wrap produces at most `max_lines` lines
///
/// At `min_size` the wrap is returned as-is even when it has more than
/// `max_lines` lines; callers truncate, silently dropping the overflow.
pub fn fit_multiline(
    text: &str,
    max_width: f32,
    font: &Font,
    max_size: f32,
    min_size: f32,
    max_lines: usize,
) -> FittedText {
    let mut size = max_size;
    while size >= min_size {
        let lines = wrap(text, max_width, font, size);
        if lines.len() <= max_lines {
            return FittedText { lines, size };
        }
        size -= SIZE_STEP;
    }
    FittedText {
        lines: wrap(text, max_width, font, min_size),
        size: min_size,
    }
}
