//! Interactive mechanism chooser
// (c) 2024 Ross Younger

use std::future::Future;

use anyhow::Result;
use console::{Key, Term};

use super::Chooser;
use crate::{cli::styles, mechanism::Mechanism};

const PROMPT: &str = "Choose transfer protocol";

/// Asks on the console.
///
/// On a terminal this is a menu driven by the arrow keys (or `j`/`k`, or a digit);
/// Enter accepts, Escape or `q` declines.
/// Otherwise it prints a numbered list and reads one line from standard input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePicker;

impl Chooser for ConsolePicker {
    fn choose(
        &self,
        choices: &[Mechanism],
        preselected: usize,
    ) -> impl Future<Output = Result<Option<Mechanism>>> + Send {
        let choices = choices.to_vec();
        async move {
            // console's I/O blocks
            tokio::task::spawn_blocking(move || {
                let term = Term::stderr();
                if choices.is_empty() {
                    Ok(None)
                } else if term.is_term() && console::user_attended() {
                    menu(&term, &choices, preselected.min(choices.len() - 1))
                } else {
                    numbered(&term, &choices, preselected.min(choices.len() - 1))
                }
            })
            .await?
        }
    }
}

fn entry_text(m: Mechanism) -> String {
    format!("{:<6} {}", m.name(), m.description())
}

fn render(term: &Term, choices: &[Mechanism], selected: usize) -> Result<()> {
    let call_out = styles::CALL_OUT;
    term.write_line(&format!("{call_out}{PROMPT}{call_out:#}"))?;
    for (i, m) in choices.iter().enumerate() {
        let line = if i == selected {
            let hl = styles::INFO.bold();
            format!("{hl}> {}{hl:#}", entry_text(*m))
        } else {
            format!("  {}", entry_text(*m))
        };
        term.write_line(&line)?;
    }
    Ok(())
}

/// What a keypress does to the menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Move(usize),
    Accept(usize),
    Decline,
    Ignore,
}

fn on_key(key: &Key, selected: usize, count: usize) -> MenuAction {
    match key {
        Key::ArrowUp | Key::Char('k') | Key::BackTab => {
            MenuAction::Move(selected.checked_sub(1).unwrap_or(count - 1))
        }
        Key::ArrowDown | Key::Char('j') | Key::Tab => MenuAction::Move((selected + 1) % count),
        Key::Home => MenuAction::Move(0),
        Key::End => MenuAction::Move(count - 1),
        Key::Enter => MenuAction::Accept(selected),
        Key::Escape | Key::Char('q') => MenuAction::Decline,
        Key::Char(c) => match c.to_digit(10).and_then(|d| usize::try_from(d).ok()) {
            Some(n) if (1..=count).contains(&n) => MenuAction::Accept(n - 1),
            _ => MenuAction::Ignore,
        },
        _ => MenuAction::Ignore,
    }
}

fn menu(term: &Term, choices: &[Mechanism], preselected: usize) -> Result<Option<Mechanism>> {
    term.hide_cursor()?;
    let mut selected = preselected;
    let outcome = loop {
        if let Err(e) = render(term, choices, selected) {
            break Err(e);
        }
        let key = match term.read_key() {
            Ok(k) => k,
            Err(e) => break Err(e.into()),
        };
        if let Err(e) = term.clear_last_lines(choices.len() + 1) {
            break Err(e.into());
        }
        match on_key(&key, selected, choices.len()) {
            MenuAction::Move(to) => selected = to,
            MenuAction::Accept(i) => break Ok(Some(choices[i])),
            MenuAction::Decline => break Ok(None),
            MenuAction::Ignore => (),
        }
    };
    term.show_cursor()?;
    outcome
}

/// Interprets a typed answer.
/// Empty means the preselected entry; a 1-based number or a mechanism name picks that entry.
fn parse_selection(input: &str, choices: &[Mechanism], preselected: usize) -> Option<Mechanism> {
    let input = input.trim();
    if input.is_empty() {
        return choices.get(preselected).copied();
    }
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| choices.get(i)).copied();
    }
    choices
        .iter()
        .find(|m| m.name().eq_ignore_ascii_case(input))
        .copied()
}

fn numbered(term: &Term, choices: &[Mechanism], preselected: usize) -> Result<Option<Mechanism>> {
    term.write_line(&format!("{PROMPT}:"))?;
    for (i, m) in choices.iter().enumerate() {
        let marker = if i == preselected { '*' } else { ' ' };
        term.write_line(&format!("{marker}{:>2}) {}", i + 1, entry_text(*m)))?;
    }
    term.write_str(&format!("[{}]: ", preselected + 1))?;
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer)? == 0 {
        return Ok(None); // EOF
    }
    Ok(parse_selection(&answer, choices, preselected))
}
