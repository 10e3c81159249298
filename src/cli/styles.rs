// (c) 2024 Ross Younger
//! Console output styling, shared by clap's help and the mechanism picker
//!
//! Styled text written outside of `console` should go through anstream's `println!` / `eprintln!`,
//! which strip the escapes when the output is not a terminal.

#[allow(clippy::enum_glob_use)]
use anstyle::AnsiColor::*;
use anstyle::{Color::Ansi, Style};
use clap::builder::styling::Styles;

pub(crate) const ERROR: Style = Style::new().bold().fg_color(Some(Ansi(Red)));
pub(crate) const WARNING: Style = Style::new().bold().fg_color(Some(Ansi(Yellow)));
/// Highlighted entries and placeholders
pub(crate) const INFO: Style = Style::new().fg_color(Some(Ansi(Cyan)));
/// Headings and prompts
pub(crate) const CALL_OUT: Style = Style::new().underline().fg_color(Some(Ansi(Yellow)));

pub(crate) const CLAP_STYLES: Styles = Styles::styled()
    .usage(CALL_OUT)
    .header(CALL_OUT)
    .literal(Style::new().bold())
    .invalid(WARNING)
    .error(ERROR)
    .valid(INFO.bold().underline())
    .placeholder(INFO);
