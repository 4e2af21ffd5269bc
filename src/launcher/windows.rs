//! Command lines for launching through `cmd.exe`.

use std::sync::LazyLock;

use regex::Regex;

// An argument with a space that is not already wrapped in quotes.
static UNQUOTED_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[^"].* .*[^"]"#).expect("quoting pattern is a valid regex")
});

/// Quote an argument containing unquoted spaces, otherwise escape `&` for cmd.
#[must_use]
pub fn escape_if_needed(arg: &str) -> String {
    if UNQUOTED_SPACE.is_match(arg) {
        format!("\"{arg}\"")
    } else {
        arg.replace('&', "^&")
    }
}

/// Build the verbatim argument string passed to `cmd`:
/// `/s /c "<launch path> <args...>"`.
#[must_use]
pub fn cmd_command_line(launch_path: &str, args: &[String]) -> String {
    let joined = std::iter::once(launch_path)
        .chain(args.iter().map(String::as_str))
        .map(escape_if_needed)
        .collect::<Vec<_>>()
        .join(" ");
    format!("/s /c \"{joined}\"")
}
