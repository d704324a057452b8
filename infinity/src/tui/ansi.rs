//! Convert ANSI-colored terminal output into ratatui text.
//!
//! Only SGR sequences (`ESC [ ... m`) affect styling. Every other escape
//! sequence is dropped so cursor movement from the runner cannot corrupt the
//! panel.

use std::iter::Peekable;
use std::str::Chars;

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

const ESC: char = '\u{1b}';
const BEL: char = '\u{7}';

const BASIC: [Color; 8] = [
    Color::Black,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::Gray,
];

const BRIGHT: [Color; 8] = [
    Color::DarkGray,
    Color::LightRed,
    Color::LightGreen,
    Color::LightYellow,
    Color::LightBlue,
    Color::LightMagenta,
    Color::LightCyan,
    Color::White,
];

/// Parse `input` into styled lines. Style carries over line breaks, as it
/// does in a terminal.
pub fn to_text(input: &str) -> Text<'static> {
    let body = input.strip_suffix('\n').unwrap_or(input);
    if body.is_empty() {
        return Text::default();
    }

    let mut style = Style::default();
    let lines: Vec<Line<'static>> = body
        .split('\n')
        .map(|raw| parse_line(raw, &mut style))
        .collect();
    Text::from(lines)
}

fn parse_line(raw: &str, style: &mut Style) -> Line<'static> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESC => {
                flush(&mut spans, &mut current, *style);
                match chars.next() {
                    Some('[') => {
                        let (params, terminator) = read_csi(&mut chars);
                        if terminator == Some('m') {
                            apply_sgr(style, &params);
                        }
                    }
                    Some(']') => skip_osc(&mut chars),
                    // Two-character escapes such as `ESC (` charset selection.
                    Some(_) | None => {}
                }
            }
            '\r' => {}
            '\t' => current.push_str("    "),
            c => current.push(c),
        }
    }
    flush(&mut spans, &mut current, *style);
    Line::from(spans)
}

fn flush(spans: &mut Vec<Span<'static>>, current: &mut String, style: Style) {
    if !current.is_empty() {
        spans.push(Span::styled(std::mem::take(current), style));
    }
}

fn read_csi(chars: &mut Peekable<Chars<'_>>) -> (String, Option<char>) {
    let mut params = String::new();
    for c in chars.by_ref() {
        if ('@'..='~').contains(&c) {
            return (params, Some(c));
        }
        params.push(c);
    }
    (params, None)
}

fn skip_osc(chars: &mut Peekable<Chars<'_>>) {
    while let Some(c) = chars.next() {
        if c == BEL {
            return;
        }
        if c == ESC && chars.peek() == Some(&'\\') {
            chars.next();
            return;
        }
    }
}

fn apply_sgr(style: &mut Style, params: &str) {
    let codes: Vec<u16> = params
        .split([';', ':'])
        .map(|p| p.parse().unwrap_or(0))
        .collect();

    let mut i = 0;
    while i < codes.len() {
        let code = codes[i];
        match code {
            0 => *style = Style::default(),
            1 => *style = style.add_modifier(Modifier::BOLD),
            2 => *style = style.add_modifier(Modifier::DIM),
            3 => *style = style.add_modifier(Modifier::ITALIC),
            4 => *style = style.add_modifier(Modifier::UNDERLINED),
            7 => *style = style.add_modifier(Modifier::REVERSED),
            9 => *style = style.add_modifier(Modifier::CROSSED_OUT),
            22 => *style = style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => *style = style.remove_modifier(Modifier::ITALIC),
            24 => *style = style.remove_modifier(Modifier::UNDERLINED),
            27 => *style = style.remove_modifier(Modifier::REVERSED),
            29 => *style = style.remove_modifier(Modifier::CROSSED_OUT),
            30..=37 => *style = style.fg(BASIC[usize::from(code - 30)]),
            39 => *style = style.fg(Color::Reset),
            40..=47 => *style = style.bg(BASIC[usize::from(code - 40)]),
            49 => *style = style.bg(Color::Reset),
            90..=97 => *style = style.fg(BRIGHT[usize::from(code - 90)]),
            100..=107 => *style = style.bg(BRIGHT[usize::from(code - 100)]),
            38 | 48 => {
                let (color, used) = extended_color(&codes[i + 1..]);
                if let Some(color) = color {
                    *style = if code == 38 {
                        style.fg(color)
                    } else {
                        style.bg(color)
                    };
                }
                i += used;
            }
            _ => {}
        }
        i += 1;
    }
}

/// Decode the arguments after 38/48. Returns the color and how many codes
/// were consumed.
fn extended_color(args: &[u16]) -> (Option<Color>, usize) {
    match args {
        [5, index, ..] => (u8::try_from(*index).ok().map(Color::Indexed), 2),
        [2, r, g, b, ..] => {
            let channel = |v: u16| u8::try_from(v).unwrap_or(u8::MAX);
            (Some(Color::Rgb(channel(*r), channel(*g), channel(*b))), 4)
        }
        _ => (None, args.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &Text<'_>) -> Vec<String> {
        text.lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_plain_text_lines() {
        let text = to_text("collected 4 items\n\ntest_a PASSED\n");
        assert_eq!(plain(&text), ["collected 4 items", "", "test_a PASSED"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(to_text("").lines.is_empty());
        assert!(to_text("\n").lines.is_empty());
    }

    #[test]
    fn test_basic_colors_and_reset() {
        let text = to_text("\u{1b}[32mPASSED\u{1b}[0m done");
        let spans = &text.lines[0].spans;
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].content, "PASSED");
        assert_eq!(spans[0].style.fg, Some(Color::Green));
        assert_eq!(spans[1].content, " done");
        assert_eq!(spans[1].style, Style::default());
    }

    #[test]
    fn test_bold_bright_and_combined_params() {
        let text = to_text("\u{1b}[1;91mFAILED\u{1b}[22m x");
        let spans = &text.lines[0].spans;
        assert_eq!(spans[0].style.fg, Some(Color::LightRed));
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(!spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans[1].style.fg, Some(Color::LightRed));
    }

    #[test]
    fn test_extended_colors() {
        let text = to_text("\u{1b}[38;5;208mA\u{1b}[48;2;10;20;30mB");
        let spans = &text.lines[0].spans;
        assert_eq!(spans[0].style.fg, Some(Color::Indexed(208)));
        assert_eq!(spans[1].style.bg, Some(Color::Rgb(10, 20, 30)));
        assert_eq!(spans[1].style.fg, Some(Color::Indexed(208)));
    }

    #[test]
    fn test_style_carries_across_lines() {
        let text = to_text("\u{1b}[33mwarn\nstill yellow\u{1b}[m\nplain");
        assert_eq!(text.lines[1].spans[0].style.fg, Some(Color::Yellow));
        assert_eq!(text.lines[2].spans[0].style, Style::default());
    }

    #[test]
    fn test_non_sgr_sequences_are_dropped() {
        let text = to_text("a\u{1b}[2Kb\u{1b}[1Gc\u{1b}]0;title\u{7}d\re");
        assert_eq!(plain(&text), ["abcde"]);
    }

    #[test]
    fn test_truncated_escape_does_not_panic() {
        assert_eq!(plain(&to_text("tail\u{1b}[3")), ["tail"]);
        assert_eq!(plain(&to_text("tail\u{1b}")), ["tail"]);
        assert_eq!(plain(&to_text("\u{1b}[38;5m x")), [" x"]);
    }
}
