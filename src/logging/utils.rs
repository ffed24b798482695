//! Terminal width, ANSI stripping, log paths and timestamps.
use std::fs;
use std::path::PathBuf;

/// Remove ANSI escape sequences, keeping the visible text.
///
/// CSI sequences (`ESC [ ... final`) are dropped up to their final byte in
/// `@..=~`; any other escape drops the single character after `ESC`.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some((text, escape)) = rest.split_once('\x1b') {
        out.push_str(text);
        let mut chars = escape.chars();
        rest = match chars.next() {
            Some('[') => {
                let body = chars.as_str();
                body.find(|c: char| ('@'..='~').contains(&c))
                    .and_then(|end| body.get(end + 1..))
                    .unwrap_or("")
            }
            Some(_) => chars.as_str(),
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Width of the attached terminal in columns, else `$COLUMNS`, else 80.
pub fn terminal_columns() -> usize {
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| usize::from(w))
        .filter(|&n| n > 0)
        .unwrap_or_else(|| columns_from(std::env::var("COLUMNS").ok().as_deref()))
}

fn columns_from(value: Option<&str>) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(80)
}

/// `$XDG_CACHE_HOME/dotmodules`, else `~/.cache/dotmodules`; created on demand.
fn log_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map_or_else(|| crate::config::home_dir().join(".cache"), PathBuf::from);
    let dir = base.join("dotmodules");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file of one subcommand, e.g. `~/.cache/dotmodules/install.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(format!("{command}.log")))
}

/// UTC `YYYY-MM-DD HH:MM:SS`, used in the log file header.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// UTC `HH:MM:SS`, used on every log file line.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn colours_are_stripped() {
        assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m hello"), "ERROR hello");
        assert_eq!(
            strip_ansi("\x1b[1;34m==>\x1b[0m \x1b[1mInstall vim\x1b[0m"),
            "==> Install vim"
        );
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn cursor_sequences_are_stripped() {
        assert_eq!(strip_ansi("\r\x1b[K  \x1b[2m▹ Install git\x1b[0m"), "\r  ▹ Install git");
        assert_eq!(strip_ansi("\x1b[2;5Htext"), "text");
        assert_eq!(strip_ansi("\x1bMtext"), "text");
    }

    #[test]
    fn unterminated_escape_is_dropped() {
        assert_eq!(strip_ansi("done\x1b"), "done");
        assert_eq!(strip_ansi("done\x1b[12"), "done");
    }

    #[test]
    fn columns_fall_back_to_eighty() {
        assert_eq!(columns_from(Some("120")), 120);
        assert_eq!(columns_from(Some("0")), 80);
        assert_eq!(columns_from(Some("wide")), 80);
        assert_eq!(columns_from(None), 80);
        assert!(terminal_columns() > 0);
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let time = format_utc_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
        let datetime = format_utc_datetime();
        assert_eq!(datetime.len(), 19);
        assert_eq!(&datetime[4..5], "-");
        assert_eq!(&datetime[10..11], " ");
    }
}
