//! Help and version text generation using Clap.
//!
//! Script configs and code-built schemas are turned into a Clap [`Command`]
//! and rendered with [`Command::render_help`]. A code-built schema may use
//! tokens Clap cannot express (`+x`, `/q`, `-long`); those fall back to a
//! plain renderer with the same layout.

use crate::config::{ArgConfig, ArgType, Config, ValueType};
use crate::schema::{HelpTokens, Requiredness, Schema, SlotInfo, SlotKind};
use crate::tokenizer::tokenize;
use crate::verbs::{VerbInfo, VerbSet};
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};

/// Id of the explicit help argument.
const HELP_ID: &str = "argbind-help";

/// Split slot tokens into a Clap short and long name.
///
/// Returns `None` when a token is not `-c` or `--name`, or when two tokens
/// compete for the same kind.
fn clap_flags<'a>(
    tokens: impl IntoIterator<Item = &'a str>,
) -> Option<(Option<char>, Option<String>)> {
    let mut short = None;
    let mut long = None;
    for token in tokens {
        if let Some(name) = token.strip_prefix("--") {
            if name.is_empty() || name.starts_with('-') || long.is_some() {
                return None;
            }
            long = Some(name.to_string());
            continue;
        }
        let mut chars = token.strip_prefix('-')?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c != '-' && short.is_none() => short = Some(c),
            _ => return None,
        }
    }
    Some((short, long))
}

fn with_flags(mut arg: Arg, short: Option<char>, long: Option<String>) -> Arg {
    if let Some(short) = short {
        arg = arg.short(short);
    }
    if let Some(long) = long {
        arg = arg.long(long);
    }
    arg
}

fn help_arg(short: Option<char>, long: Option<String>) -> Arg {
    with_flags(Arg::new(HELP_ID), short, long)
        .action(ArgAction::Help)
        .help("Print help")
}

fn base_command(name: &str, about: Option<&str>) -> Command {
    let mut cmd = Command::new(name.to_string())
        .disable_help_flag(true)
        .disable_help_subcommand(true);
    if let Some(about) = about {
        cmd = cmd.about(about.to_string());
    }
    cmd
}

/// Positionals fill in order, so a positional is needed whenever any later
/// one is required.
fn positional_requirements(required: &[bool]) -> Vec<bool> {
    let mut later = false;
    let mut needed: Vec<bool> = required
        .iter()
        .rev()
        .map(|&required| {
            later |= required;
            later
        })
        .collect();
    needed.reverse();
    needed
}

/// Build a Clap Command from engine slot metadata.
fn schema_command(
    name: &str,
    about: Option<&str>,
    slots: &[SlotInfo],
    help: Option<&HelpTokens>,
) -> Option<Command> {
    let mut cmd = base_command(name, about);

    // the catch-all takes the highest index
    let positionals: Vec<&SlotInfo> = slots
        .iter()
        .filter(|info| info.kind == SlotKind::Value)
        .chain(slots.iter().filter(|info| info.kind == SlotKind::MultiValue))
        .collect();
    let required: Vec<bool> = positionals
        .iter()
        .map(|info| info.requiredness == Requiredness::Required)
        .collect();
    for (idx, (info, required)) in positionals
        .iter()
        .zip(positional_requirements(&required))
        .enumerate()
    {
        let action = match info.kind {
            SlotKind::MultiValue => ArgAction::Append,
            _ => ArgAction::Set,
        };
        let arg = Arg::new(info.name.clone())
            .index(idx + 1)
            .action(action)
            .required(required)
            .help(info.help.clone());
        cmd = cmd.arg(arg);
    }

    for info in slots.iter().filter(|info| info.kind.is_named()) {
        let (short, long) = clap_flags(info.tokens())?;
        let mut arg = with_flags(Arg::new(info.name.clone()), short, long)
            .required(info.requiredness == Requiredness::Required)
            .help(info.help.clone());
        arg = match info.kind {
            SlotKind::Switch => arg.action(ArgAction::SetTrue),
            _ => arg.action(ArgAction::Set).value_name("VALUE"),
        };
        cmd = cmd.arg(arg);
    }

    if let Some(help) = help.filter(|help| help.tokens().next().is_some()) {
        let (short, long) = clap_flags(help.tokens())?;
        cmd = cmd.arg(help_arg(short, long));
    }
    Some(cmd)
}

/// Build the usage line for a command.
pub fn generate_usage(name: &str, slots: &[SlotInfo]) -> String {
    match schema_command(name, None, slots, None) {
        Some(mut cmd) => cmd.render_usage().to_string(),
        None => plain::usage(name, slots),
    }
}

/// Generate help for a schema built in code.
pub fn generate_schema_help<T>(schema: &Schema<T>, about: Option<&str>) -> String {
    let slots: Vec<SlotInfo> = schema.slots().cloned().collect();
    match schema_command(schema.name(), about, &slots, schema.help_tokens()) {
        Some(mut cmd) => cmd.render_help().to_string(),
        None => plain::slots(schema.name(), about, &slots, schema.help_tokens()),
    }
}

/// Generate the verb listing for a verb set.
pub fn generate_verbs_help<R>(verbs: &VerbSet<R>, about: Option<&str>) -> String {
    let mut cmd = verb_listing(base_command(verbs.name(), about));
    for verb in verbs.verbs() {
        cmd = cmd.subcommand(Command::new(verb.name.clone()).about(verb.help.clone()));
    }
    if let Some(help) = verbs.help_tokens() {
        match clap_flags(help.tokens()) {
            Some((short, long)) => cmd = cmd.arg(help_arg(short, long)),
            None => return plain::verbs(verbs, about),
        }
    }
    cmd.render_help().to_string()
}

/// Generate help for one verb of a verb set.
pub fn generate_verb_help<R>(verbs: &VerbSet<R>, verb: &VerbInfo) -> String {
    let name = format!("{} {}", verbs.name(), verb.name);
    match schema_command(&name, Some(&verb.help), &verb.slots, verbs.help_tokens()) {
        Some(mut cmd) => cmd.render_help().to_string(),
        None => plain::slots(&name, Some(&verb.help), &verb.slots, verbs.help_tokens()),
    }
}

fn verb_listing(cmd: Command) -> Command {
    cmd.subcommand_required(true)
        .subcommand_value_name("VERB")
        .subcommand_help_heading("Verbs")
}

/// Build a Clap Command from a script config's arguments.
fn build_command(
    config: &Config,
    name: &str,
    about: Option<&str>,
    args: &[ArgConfig],
) -> Command {
    let mut cmd = base_command(name, about);

    let positionals: Vec<&ArgConfig> = args
        .iter()
        .filter(|arg| arg.arg_type == ArgType::Value)
        .chain(args.iter().filter(|arg| arg.arg_type == ArgType::MultiValue))
        .collect();
    let required: Vec<bool> = positionals.iter().map(|arg| arg.required).collect();
    for (idx, (arg_config, required)) in positionals
        .iter()
        .zip(positional_requirements(&required))
        .enumerate()
    {
        let arg = build_arg(arg_config).index(idx + 1).required(required);
        cmd = cmd.arg(arg);
    }

    for arg_config in args.iter().filter(|arg| arg.is_named()) {
        let arg = build_arg(arg_config).required(arg_config.required);
        cmd = cmd.arg(arg);
    }

    let help = &config.help_flag;
    if !help.is_disabled() {
        cmd = cmd.arg(help_arg(help.short, help.long.clone()));
    }
    cmd
}

/// Build a Clap Arg from an ArgConfig.
fn build_arg(arg_config: &ArgConfig) -> Arg {
    let mut arg = Arg::new(arg_config.name.clone()).help(arg_config.help.clone());

    match arg_config.arg_type {
        ArgType::Switch => {
            return with_flags(
                arg,
                arg_config.short,
                arg_config.effective_long().map(str::to_string),
            )
            .action(ArgAction::SetTrue);
        }
        ArgType::Option => {
            arg = with_flags(
                arg,
                arg_config.short,
                arg_config.effective_long().map(str::to_string),
            )
            .action(ArgAction::Set)
            .value_name("VALUE");
        }
        ArgType::Value => arg = arg.action(ArgAction::Set),
        ArgType::MultiValue => arg = arg.action(ArgAction::Append),
    }

    if let Some(ref default) = arg_config.default {
        arg = match arg_config.arg_type {
            ArgType::MultiValue => arg.default_values(tokenize(default).collect::<Vec<_>>()),
            _ => arg.default_value(default.clone()),
        };
    }

    // Choices take precedence over value_type
    if let Some(ref choices) = arg_config.choices {
        arg = arg.value_parser(PossibleValuesParser::new(choices.clone()));
    } else {
        match arg_config.value_type {
            ValueType::String => {}
            ValueType::Int => arg = arg.value_parser(clap::value_parser!(i64)),
            ValueType::Bool => {
                arg = arg.value_parser(PossibleValuesParser::new(["true", "false"]));
            }
        }
    }

    arg
}

/// Generate the full help text for a script.
///
/// With `verb`, help for that verb is rendered; an unknown verb falls back to
/// the script's top-level help.
pub fn generate_help(config: &Config, verb: Option<&str>) -> String {
    let name = config.display_name();
    let selected = verb.and_then(|verb| config.verbs.iter().find(|v| v.name == verb));

    let mut cmd = match selected {
        Some(verb) => build_command(
            config,
            &format!("{} {}", name, verb.name),
            Some(&verb.help),
            &verb.args,
        ),
        None => {
            let mut cmd = build_command(config, name, config.description.as_deref(), &config.args);
            if !config.verbs.is_empty() {
                cmd = verb_listing(cmd);
            }
            for verb in &config.verbs {
                let subcmd = build_command(config, &verb.name, Some(&verb.help), &verb.args);
                cmd = cmd.subcommand(subcmd);
            }
            cmd
        }
    };
    cmd.render_help().to_string()
}

/// Generate version string.
pub fn generate_version(config: &Config) -> String {
    let mut version = config.display_name().to_string();
    if let Some(ref v) = config.version {
        version.push(' ');
        version.push_str(v);
    }
    version.push('\n');
    version
}

/// Renderer for schemas whose tokens Clap cannot represent.
mod plain {
    use crate::schema::{HelpTokens, Requiredness, SlotInfo, SlotKind};
    use crate::verbs::VerbSet;

    struct Row {
        left: String,
        help: String,
    }

    fn section(out: &mut String, title: &str, rows: &[Row]) {
        if rows.is_empty() {
            return;
        }
        let width = rows.iter().map(|row| row.left.len()).max().unwrap_or(0);
        out.push_str(&format!("\n{}:\n", title));
        for row in rows {
            out.push_str(&format!("  {:width$}  {}\n", row.left, row.help, width = width));
        }
    }

    fn about(out: &mut String, about: Option<&str>) {
        if let Some(about) = about {
            out.push_str(&format!("{}\n\n", about));
        }
    }

    fn help_row(tokens: &HelpTokens) -> Row {
        Row {
            left: tokens.tokens().collect::<Vec<_>>().join(", "),
            help: "Print help".to_string(),
        }
    }

    pub(super) fn usage(name: &str, slots: &[SlotInfo]) -> String {
        let mut usage = format!("Usage: {}", name);
        if slots.iter().any(|info| info.kind.is_named()) {
            usage.push_str(" [OPTIONS]");
        }
        for info in slots.iter().filter(|info| !info.kind.is_named()) {
            let required = info.requiredness == Requiredness::Required;
            usage.push_str(&match (info.kind, required) {
                (SlotKind::MultiValue, true) => format!(" <{}>...", info.name),
                (SlotKind::MultiValue, false) => format!(" [{}]...", info.name),
                (_, true) => format!(" <{}>", info.name),
                (_, false) => format!(" [{}]", info.name),
            });
        }
        usage
    }

    pub(super) fn slots(
        name: &str,
        about_text: Option<&str>,
        slots: &[SlotInfo],
        help: Option<&HelpTokens>,
    ) -> String {
        let mut out = String::new();
        about(&mut out, about_text);
        out.push_str(&usage(name, slots));
        out.push('\n');

        let arguments: Vec<Row> = slots
            .iter()
            .filter(|info| !info.kind.is_named())
            .map(|info| Row {
                left: match (info.kind, info.requiredness) {
                    (SlotKind::MultiValue, Requiredness::Required) => format!("<{}>...", info.name),
                    (SlotKind::MultiValue, _) => format!("[{}]...", info.name),
                    (_, Requiredness::Required) => format!("<{}>", info.name),
                    _ => format!("[{}]", info.name),
                },
                help: info.help.clone(),
            })
            .collect();
        section(&mut out, "Arguments", &arguments);

        let mut options: Vec<Row> = slots
            .iter()
            .filter(|info| info.kind.is_named())
            .map(|info| {
                let mut left = info.tokens().collect::<Vec<_>>().join(", ");
                if info.kind == SlotKind::Option {
                    left.push_str(" <VALUE>");
                }
                Row {
                    left,
                    help: info.help.clone(),
                }
            })
            .collect();
        if let Some(help) = help {
            options.push(help_row(help));
        }
        section(&mut out, "Options", &options);
        out
    }

    pub(super) fn verbs<R>(verbs: &VerbSet<R>, about_text: Option<&str>) -> String {
        let mut out = String::new();
        about(&mut out, about_text);
        out.push_str(&format!("Usage: {} <VERB>\n", verbs.name()));

        let rows: Vec<Row> = verbs
            .verbs()
            .map(|verb| Row {
                left: verb.name.clone(),
                help: verb.help.clone(),
            })
            .collect();
        section(&mut out, "Verbs", &rows);

        if let Some(help) = verbs.help_tokens() {
            section(&mut out, "Options", &[help_row(help)]);
        }
        out
    }
}
