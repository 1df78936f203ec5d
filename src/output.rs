//! Sourceable shell output: variable assignments, errors and help.

use crate::dynamic::{ArgValue, Invocation};
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Heredoc delimiter for help output.
const HELP_DELIMITER: &str = "ARGBIND_HELP";

/// Escape a string for safe use in a shell double-quoted context.
///
/// Escapes: $, `, \, ", and !
fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '!' => escaped.push_str("\\!"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Convert an argument name to a valid shell variable name.
///
/// Uppercases and replaces anything outside `[A-Z0-9_]` with underscores.
pub(crate) fn to_shell_var_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Render the assignments for a parsed invocation.
///
/// Scalars become `export PREFIX_NAME="value"`, multi-value arguments become
/// a shell array, and the selected verb is exported as `PREFIX_VERB`.
pub fn generate_output_string(invocation: &Invocation, prefix: &str) -> String {
    let mut output = String::new();

    if let Some(verb) = &invocation.verb {
        output.push_str(&format!(
            "export {}VERB=\"{}\"\n",
            prefix,
            escape_shell_value(verb)
        ));
    }

    for (name, value) in invocation.values.iter() {
        let var_name = format!("{}{}", prefix, to_shell_var_name(name));
        match value {
            ArgValue::List(items) => {
                let elements: Vec<String> = items
                    .iter()
                    .map(|item| format!("\"{}\"", escape_shell_value(&item.to_string())))
                    .collect();
                output.push_str(&format!("{}=({})\n", var_name, elements.join(" ")));
            }
            scalar => {
                let escaped_value = escape_shell_value(&scalar.to_string());
                output.push_str(&format!("export {}=\"{}\"\n", var_name, escaped_value));
            }
        }
    }

    output
}

/// Generate a temporary file with the assignments for `invocation`.
///
/// Returns the path to the temporary file. The file will persist
/// until it is manually deleted.
pub fn generate_output(invocation: &Invocation, prefix: &str) -> Result<PathBuf> {
    write_temp_file(&generate_output_string(invocation, prefix))
}

/// Generate an error output file.
///
/// When sourced, the file will print each message to stderr and exit 1.
pub fn generate_error_output<I, S>(program: &str, messages: I) -> Result<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    write_temp_file(&generate_error_string(program, messages))
}

/// Generate an error output as a string.
pub fn generate_error_string<I, S>(program: &str, messages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let program = escape_shell_value(program);
    let mut output = String::new();
    for message in messages {
        let escaped = escape_shell_value(message.as_ref());
        output.push_str(&format!("echo \"{}: {}\" >&2\n", program, escaped));
    }
    output.push_str("exit 1\n");
    output
}

/// Generate a help output file.
///
/// When sourced, the file will print the help text and exit 0.
pub fn generate_help_output(help_text: &str) -> Result<PathBuf> {
    write_temp_file(&generate_help_output_string(help_text))
}

/// Generate a help output as a string.
pub fn generate_help_output_string(help_text: &str) -> String {
    heredoc(HELP_DELIMITER, help_text)
}

fn heredoc(delimiter: &str, text: &str) -> String {
    let newline = if text.ends_with('\n') { "" } else { "\n" };
    format!(
        "cat <<'{delimiter}'\n{text}{newline}{delimiter}\nexit 0\n",
        delimiter = delimiter,
        text = text,
        newline = newline
    )
}

/// Write content to a temporary file and return its path.
fn write_temp_file(content: &str) -> Result<PathBuf> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    let path = file.into_temp_path().keep()?;
    Ok(path)
}
