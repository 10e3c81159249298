//! Progress bar styling
// (c) 2024 Ross Younger

use console::Term;
use indicatif::{MultiProgress, ProgressBar, ProgressFinish, ProgressStyle};

const PROGRESS_STYLE_COMPACT: &str =
    "{msg:.dim} {wide_bar:.cyan} {eta} @ {decimal_bytes_per_sec} [{percent}%/{decimal_total_bytes:.dim}]";

// 11111111111111111111111111111111111111111111111111111111111111111111111111111111
// filename [==========================            ] 2m30s @ 123.4MB/s [70%/1.24GB]
// extremely-long-filename-no-really-very-long [== ] 2m30s @ 123.4MB/s [70%/1.24GB]
// 11111111111111111111111111111111111111111111111111111111111111111111111111111111

// About 35 characters of data readout plus a useful bar of 20.
const DATA_AND_PROGRESS: usize = 55;

const PROGRESS_STYLE_OVERLONG: &str =
    "{wide_msg:.dim} [{percent}%/{decimal_total_bytes:.dim}]\n{wide_bar:.cyan} {eta} @ {decimal_bytes_per_sec}";

fn style_for(terminal: &Term, msg_size: usize) -> &'static str {
    let term_width = terminal.size().1 as usize; // this returns a reasonable default if it can't detect
    if msg_size + DATA_AND_PROGRESS > term_width {
        PROGRESS_STYLE_OVERLONG
    } else {
        PROGRESS_STYLE_COMPACT
    }
}

/// Creates a byte-counting progress bar within `display`, or a hidden one if `visible` is false.
pub fn bar_for(
    display: &MultiProgress,
    label: &str,
    total_bytes: u64,
    visible: bool,
) -> anyhow::Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let style = ProgressStyle::with_template(style_for(&Term::stderr(), label.len()))?;
    Ok(display.add(
        ProgressBar::new(total_bytes)
            .with_style(style)
            .with_message(label.to_string())
            .with_finish(ProgressFinish::Abandon),
    ))
}

#[cfg(test)]
mod test {
    use indicatif::MultiProgress;

    #[test]
    fn hidden_when_not_wanted() {
        let mp = MultiProgress::new();
        let bar = super::bar_for(&mp, "file.bin", 1000, false).unwrap();
        assert!(bar.is_hidden());
    }

    #[test]
    fn long_names_get_two_lines() {
        let term = console::Term::stderr();
        assert_eq!(super::style_for(&term, 10_000), super::PROGRESS_STYLE_OVERLONG);
    }

    #[test]
    fn visible_bar_tracks_length() {
        let mp = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let bar = super::bar_for(&mp, "f", 1234, true).unwrap();
        assert_eq!(bar.length(), Some(1234));
    }
}
