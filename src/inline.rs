//! Inline span resolution.
//!
//! Text is split in three passes: code spans, then inline math, then bold.
//! Each pass only looks at segments no earlier pass claimed, so a `*` inside
//! backticks or `\( \)` is never read as a bold marker.

use crate::block::Span;

/// A piece of the input that is either final or still open to later passes.
enum Segment<'a> {
    Pending(&'a str),
    Resolved(Span),
}

struct Delimiters {
    open: &'static str,
    close: &'static str,
}

const CODE: Delimiters = Delimiters {
    open: "`",
    close: "`",
};
const MATH: Delimiters = Delimiters {
    open: "\\(",
    close: "\\)",
};
const BOLD: Delimiters = Delimiters {
    open: "**",
    close: "**",
};

/// Resolve one line (or table cell) of raw text into inline spans.
pub fn resolve(text: &str) -> Vec<Span> {
    let segments = vec![Segment::Pending(text)];
    let segments = split_pass(segments, &CODE, |inner| Span::code(inner));
    let segments = split_pass(segments, &MATH, |inner| Span::inline_math(inner));
    // Bold content stays plain text: code or math inside `**` was already
    // claimed by the earlier passes or is left literal.
    let segments = split_pass(segments, &BOLD, |inner| Span::bold(inner));

    segments
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Pending("") => None,
            Segment::Pending(text) => Some(Span::text(text)),
            Segment::Resolved(span) => Some(span),
        })
        .collect()
}

fn split_pass<'a>(
    segments: Vec<Segment<'a>>,
    delimiters: &Delimiters,
    make: fn(&str) -> Span,
) -> Vec<Segment<'a>> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Pending(text) => split_delimited(text, delimiters, make, &mut out),
            resolved => out.push(resolved),
        }
    }
    out
}

/// Pull every `open ... close` pair out of `text`. The first close after an
/// open ends the span; an open without a close stays literal.
fn split_delimited<'a>(
    mut text: &'a str,
    delimiters: &Delimiters,
    make: fn(&str) -> Span,
    out: &mut Vec<Segment<'a>>,
) {
    while let Some(start) = text.find(delimiters.open) {
        let inner_start = start + delimiters.open.len();
        let Some(len) = text[inner_start..].find(delimiters.close) else {
            break;
        };
        if start > 0 {
            out.push(Segment::Pending(&text[..start]));
        }
        out.push(Segment::Resolved(make(&text[inner_start..inner_start + len])));
        text = &text[inner_start + len + delimiters.close.len()..];
    }
    if !text.is_empty() {
        out.push(Segment::Pending(text));
    }
}
