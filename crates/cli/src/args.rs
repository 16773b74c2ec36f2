//! Command-line definition and parsing.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use richacl::{AccessIntent, Credentials, Gid, Mode, Uid};

use crate::error::CliError;

/// Operation selected on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Decode a binary xattr value.
    Decode,
    /// Encode a text ACL into an xattr value.
    Encode {
        /// Destination file; stdout when `None`.
        output: Option<PathBuf>,
    },
    /// Compute the class masks of an ACL.
    Masks,
    /// Check requested intents against an ACL.
    Check {
        /// Intents to check, each with the name it was given as.
        intents: Vec<(String, AccessIntent)>,
    },
    /// Apply `--mode` to an ACL.
    Chmod,
    /// Report the mode equivalent to an ACL.
    EquivMode,
    /// Compute the ACL a new file inherits.
    Inherit,
    /// Compute the mode and ACL of a new file.
    Create,
}

/// Parsed command line.
#[derive(Clone, Debug)]
pub struct ParsedArgs {
    /// Selected operation.
    pub action: Action,
    /// Input file, `-` for stdin.
    pub input: PathBuf,
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Emit JSON instead of text.
    pub json: bool,
    /// The file is a directory.
    pub dir: bool,
    /// Permission bits of `--mode`.
    pub perm: u32,
    /// Creation umask.
    pub umask: u32,
    /// Requesting user.
    pub uid: Uid,
    /// Requesting primary group.
    pub gid: Gid,
    /// Requesting supplementary groups.
    pub groups: Vec<Gid>,
    /// File owner.
    pub owner: Uid,
    /// File owning group.
    pub owning_group: Gid,
}

impl ParsedArgs {
    /// File mode assembled from `--dir` and `--mode`.
    pub const fn mode(&self) -> Mode {
        if self.dir {
            Mode::dir(self.perm)
        } else {
            Mode::file(self.perm)
        }
    }

    /// Identity of the requester.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.uid, self.gid).with_groups(self.groups.iter().copied())
    }
}

/// Intent names accepted by `check`, joined with `+` to combine them.
const INTENT_NAMES: &[(&str, AccessIntent)] = &[
    ("read", AccessIntent::READ),
    ("write", AccessIntent::WRITE),
    ("exec", AccessIntent::EXEC),
    ("append", AccessIntent::APPEND),
    ("create-file", AccessIntent::CREATE_FILE),
    ("create-dir", AccessIntent::CREATE_DIR),
    ("delete-child", AccessIntent::DELETE_CHILD),
    ("delete", AccessIntent::DELETE_SELF),
    ("chown", AccessIntent::TAKE_OWNERSHIP),
    ("chmod", AccessIntent::CHMOD),
    ("set-times", AccessIntent::SET_TIMES),
];

fn parse_intent(value: &str) -> Result<AccessIntent, String> {
    value.split('+').try_fold(AccessIntent::empty(), |acc, name| {
        INTENT_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|&(_, intent)| acc | intent)
            .ok_or_else(|| format!("unknown intent '{name}'"))
    })
}

fn parse_octal(value: &str) -> Result<u32, String> {
    let perm = u32::from_str_radix(value.trim_start_matches("0o"), 8)
        .map_err(|_| format!("'{value}' is not an octal mode"))?;
    if perm > 0o7777 {
        return Err(format!("mode '{value}' has bits outside 07777"));
    }
    Ok(perm)
}

fn input_arg(help: &'static str) -> Arg {
    Arg::new("input")
        .value_name("FILE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn id_arg(name: &'static str, help: &'static str, default: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_name("ID")
        .global(true)
        .default_value(default)
        .value_parser(value_parser!(u32))
        .help(help)
}

/// Builds the `clap` command used for parsing.
pub fn clap_command() -> Command {
    Command::new("richacl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and evaluate rich access control lists")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("Log engine decisions to stderr (repeat for more detail)."),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON."),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Treat the file as a directory."),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .value_name("OCTAL")
                .global(true)
                .default_value("0644")
                .value_parser(parse_octal)
                .help("Permission bits of the file, e.g. 0640."),
        )
        .arg(
            Arg::new("umask")
                .long("umask")
                .value_name("OCTAL")
                .global(true)
                .default_value("022")
                .value_parser(parse_octal)
                .help("Umask applied when no ACL is inherited."),
        )
        .arg(id_arg("uid", "User id of the requester.", "0"))
        .arg(id_arg("gid", "Primary group id of the requester.", "0"))
        .arg(
            Arg::new("groups")
                .long("groups")
                .value_name("IDS")
                .global(true)
                .value_delimiter(',')
                .action(ArgAction::Append)
                .value_parser(value_parser!(u32))
                .help("Supplementary group ids of the requester."),
        )
        .arg(id_arg("owner", "User id owning the file.", "0"))
        .arg(id_arg("owning-group", "Group id owning the file.", "0"))
        .subcommand(
            Command::new("decode")
                .about("Decode a binary system.richacl value into text.")
                .arg(input_arg("Binary xattr value, or - for stdin.")),
        )
        .subcommand(
            Command::new("encode")
                .about("Encode a text ACL as a binary system.richacl value.")
                .arg(input_arg("Text ACL, or - for stdin."))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the value to FILE instead of stdout."),
                ),
        )
        .subcommand(
            Command::new("masks")
                .about("Compute the owner, group and other class masks.")
                .arg(input_arg("Text ACL, or - for stdin.")),
        )
        .subcommand(
            Command::new("check")
                .about("Check whether the requester may perform each intent.")
                .arg(input_arg("Text ACL, or - for stdin."))
                .arg(
                    Arg::new("intent")
                        .value_name("INTENT")
                        .required(true)
                        .num_args(1..)
                        .value_parser(parse_intent)
                        .help("read, write, exec, append, create-file, create-dir, delete-child, delete, chown, chmod or set-times; join with '+'."),
                ),
        )
        .subcommand(
            Command::new("chmod")
                .about("Apply --mode to an ACL.")
                .arg(input_arg("Text ACL, or - for stdin.")),
        )
        .subcommand(
            Command::new("equiv-mode")
                .about("Print the mode equivalent to an ACL, if there is one.")
                .arg(input_arg("Text ACL, or - for stdin.")),
        )
        .subcommand(
            Command::new("inherit")
                .about("Print the ACL a new file inherits from its parent directory.")
                .arg(input_arg("Text ACL of the parent directory, or - for stdin.")),
        )
        .subcommand(
            Command::new("create")
                .about("Print the mode and ACL of a file created with --mode and --umask.")
                .arg(input_arg("Text ACL of the parent directory, or - for stdin.")),
        )
}

fn action_from(name: &str, matches: &ArgMatches) -> Result<Action, CliError> {
    let action = match name {
        "decode" => Action::Decode,
        "encode" => Action::Encode {
            output: matches.get_one::<PathBuf>("output").cloned(),
        },
        "masks" => Action::Masks,
        "check" => {
            let names = matches
                .get_raw("intent")
                .into_iter()
                .flatten()
                .map(|raw| raw.to_string_lossy().into_owned());
            let intents = matches
                .get_many::<AccessIntent>("intent")
                .into_iter()
                .flatten()
                .copied();
            Action::Check {
                intents: names.zip(intents).collect(),
            }
        }
        "chmod" => Action::Chmod,
        "equiv-mode" => Action::EquivMode,
        "inherit" => Action::Inherit,
        "create" => Action::Create,
        other => return Err(CliError::Usage(format!("unknown command '{other}'"))),
    };
    Ok(action)
}

fn one<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T, CliError> {
    matches
        .get_one::<T>(id)
        .cloned()
        .ok_or_else(|| CliError::Usage(format!("missing --{id}")))
}

/// Parses `arguments` into a [`ParsedArgs`].
///
/// Help and version requests come back as [`CliError::Arguments`] so the
/// caller can print them.
pub fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = clap_command().try_get_matches_from(arguments)?;
    from_matches(&matches)
}

fn from_matches(matches: &ArgMatches) -> Result<ParsedArgs, CliError> {
    let Some((name, sub)) = matches.subcommand() else {
        return Err(CliError::Usage("no command given".to_owned()));
    };
    let action = action_from(name, sub)?;
    let input = one::<PathBuf>(sub, "input")?;

    Ok(ParsedArgs {
        action,
        input,
        verbosity: sub.get_count("verbose"),
        json: sub.get_flag("json"),
        dir: sub.get_flag("dir"),
        perm: one(sub, "mode")?,
        umask: one(sub, "umask")?,
        uid: Uid::new(one(sub, "uid")?),
        gid: Gid::new(one(sub, "gid")?),
        groups: sub
            .get_many::<u32>("groups")
            .into_iter()
            .flatten()
            .map(|&gid| Gid::new(gid))
            .collect(),
        owner: Uid::new(one(sub, "owner")?),
        owning_group: Gid::new(one(sub, "owning-group")?),
    })
}
