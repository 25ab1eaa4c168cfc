//! Command-line length budgeting and Java `@argfile` token escaping (spec
//! §4.4/§4.6, grounded on `shared/utils.py`'s `_windows_cmdline_len`,
//! `_java_argfile_token`, and the two safe-length constants).

/// Conservative ceiling for a `cmd /c`-wrapped dcm4che invocation (spec §6).
pub const WINDOWS_CMD_SAFE_MAX_CHARS: usize = 7_600;
/// Ceiling for a direct (non-`cmd`-wrapped) invocation, also used as the
/// budget for the Java argfile path since argfile contents bypass the shell
/// entirely.
pub const WINDOWS_DIRECT_SAFE_MAX_CHARS: usize = 30_000;

/// Render `args` the way Windows' `CommandLineToArgvW` quoting expects:
/// double-quote any argument containing a space, tab, or double quote,
/// doubling embedded backslashes that immediately precede a quote and
/// escaping the quote itself. Used only to *measure* command-line length —
/// actual process spawn always goes through argv-style APIs
/// ([`dcmrelay_runner::CommandSpec`]), never a rendered string.
#[must_use]
pub fn format_windows_cmdline(args: &[String]) -> String {
    args.iter()
        .map(|arg| quote_windows_arg(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_windows_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.contains([' ', '\t', '"']);
    if !needs_quotes {
        return arg.to_string();
    }

    let mut out = String::from("\"");
    let mut backslashes = 0usize;
    for ch in arg.chars() {
        match ch {
            '\\' => {
                backslashes += 1;
            }
            '"' => {
                out.extend(std::iter::repeat_n('\\', backslashes * 2 + 1));
                out.push('"');
                backslashes = 0;
            }
            other => {
                out.extend(std::iter::repeat_n('\\', backslashes));
                out.push(other);
                backslashes = 0;
            }
        }
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}

/// Length, in characters, of `args` rendered as a single Windows command
/// line — the quantity the two `*_SAFE_MAX_CHARS` budgets are measured
/// against.
#[must_use]
pub fn windows_cmdline_len(args: &[String]) -> usize {
    format_windows_cmdline(args).chars().count()
}

/// Quote one token for inclusion in a Java `@argfile`: wrap in double
/// quotes, doubling every backslash and escaping embedded quotes. Java's
/// argfile parser treats backslash as its own escape character, so Windows
/// paths must have every `\` doubled to survive literally.
#[must_use]
pub fn java_argfile_token(token: &str) -> String {
    let escaped = token.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
