use ratatui::style::Color;

use crate::types::TestOutcome;

// Nord Polar Night (dark backgrounds)
pub const NORD0: Color = Color::Rgb(46, 52, 64);
pub const NORD1: Color = Color::Rgb(59, 66, 82);
pub const NORD3: Color = Color::Rgb(76, 86, 106);

// Nord Snow Storm (light text)
pub const NORD4: Color = Color::Rgb(216, 222, 233);

// Nord Frost (accent)
pub const NORD8: Color = Color::Rgb(136, 192, 208);
pub const NORD9: Color = Color::Rgb(129, 161, 193);

// Nord Aurora (status indicators)
pub const NORD11: Color = Color::Rgb(191, 97, 106); // red
pub const NORD13: Color = Color::Rgb(235, 203, 139); // yellow
pub const NORD14: Color = Color::Rgb(163, 190, 140); // green

pub fn outcome_color(outcome: TestOutcome) -> Color {
    match outcome {
        TestOutcome::Success => NORD14,
        TestOutcome::Fail => NORD11,
        TestOutcome::Skip => NORD13,
    }
}

// Structure colors
pub const BORDER_COLOR: Color = NORD9;
pub const HEADER_COLOR: Color = NORD8;
pub const TEXT_COLOR: Color = NORD4;
pub const MUTED_COLOR: Color = NORD3;
pub const SELECTED_BG: Color = NORD1;
