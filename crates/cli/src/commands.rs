//! Execution of the parsed subcommands.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use richacl::debug_acl::AclTracer;
use richacl::text::MaskLetters;
use richacl::{
    AccessIntent, FileClass, InitNamespace, Mode, RichAcl, chmod, compute_max_masks, create,
    decode, encode, equiv_mode, evaluate, inherit,
};
use serde::Serialize;

use crate::args::{Action, ParsedArgs};
use crate::error::{CliError, EXIT_NEGATIVE};

/// Result of one `check` intent.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    intent: &'a str,
    granted: bool,
    denied: String,
    class: &'static str,
}

/// Result of `create`.
#[derive(Debug, Serialize)]
struct CreateReport<'a> {
    mode: String,
    acl: Option<&'a RichAcl>,
}

/// Result of `equiv-mode`.
#[derive(Debug, Serialize)]
struct EquivReport {
    mode: Option<String>,
}

const fn class_name(class: FileClass) -> &'static str {
    match class {
        FileClass::Owner => "owner",
        FileClass::Group => "group",
        FileClass::Other => "other",
    }
}

fn octal(mode: Mode) -> String {
    format!("{:04o}", mode.permissions())
}

fn stdout_error(source: io::Error) -> CliError {
    CliError::io("-", source)
}

fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    if path == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .map_err(|err| CliError::io(path, err))?;
        return Ok(bytes);
    }
    fs::read(path).map_err(|err| CliError::io(path, err))
}

fn read_acl(path: &Path) -> Result<RichAcl, CliError> {
    let bytes = read_input(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| CliError::Usage(format!("{}: not valid UTF-8 text", path.display())))?;
    Ok(text.parse::<RichAcl>()?)
}

fn emit_json<T, Out>(value: &T, stdout: &mut Out) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
    Out: Write,
{
    serde_json::to_writer_pretty(&mut *stdout, value)?;
    writeln!(stdout).map_err(stdout_error)
}

fn emit_acl<Out: Write>(acl: &RichAcl, json: bool, stdout: &mut Out) -> Result<(), CliError> {
    if json {
        return emit_json(acl, stdout);
    }
    write!(stdout, "{acl}").map_err(stdout_error)
}

/// Runs the parsed command and returns the process exit code.
pub fn execute<Out: Write>(args: &ParsedArgs, stdout: &mut Out) -> Result<i32, CliError> {
    tracing::debug!(command = ?args.action, input = %args.input.display(), "running");

    match &args.action {
        Action::Decode => {
            let bytes = read_input(&args.input)?;
            let acl = decode(&bytes, &InitNamespace)?;
            emit_acl(&acl, args.json, stdout)?;
        }
        Action::Encode { output } => {
            let acl = read_acl(&args.input)?;
            let bytes = encode(&acl, &InitNamespace)?;
            match output {
                Some(path) => fs::write(path, &bytes).map_err(|err| CliError::io(path, err))?,
                None => stdout.write_all(&bytes).map_err(stdout_error)?,
            }
        }
        Action::Masks => {
            let acl = read_acl(&args.input)?;
            emit_acl(&compute_max_masks(&acl)?, args.json, stdout)?;
        }
        Action::Check { intents } => {
            let acl = read_acl(&args.input)?;
            return check(&acl, args, intents, stdout);
        }
        Action::Chmod => {
            let acl = read_acl(&args.input)?;
            emit_acl(&*chmod(&acl, args.mode())?, args.json, stdout)?;
        }
        Action::EquivMode => {
            let acl = read_acl(&args.input)?;
            let equivalent = equiv_mode(&acl, args.mode());
            if args.json {
                emit_json(&EquivReport { mode: equivalent.map(octal) }, stdout)?;
            } else {
                let written = match equivalent {
                    Some(mode) => writeln!(stdout, "{}", octal(mode)),
                    None => writeln!(stdout, "not equivalent to a mode"),
                };
                written.map_err(stdout_error)?;
            }
            if equivalent.is_none() {
                return Ok(EXIT_NEGATIVE);
            }
        }
        Action::Inherit => {
            let parent = read_acl(&args.input)?;
            match inherit(&parent, args.dir)? {
                Some(acl) => emit_acl(&acl, args.json, stdout)?,
                None if args.json => emit_json(&Option::<RichAcl>::None, stdout)?,
                None => writeln!(stdout, "nothing inherited").map_err(stdout_error)?,
            }
        }
        Action::Create => {
            let parent = read_acl(&args.input)?;
            let created = create(args.mode(), Some(&parent), args.umask)?;
            if args.json {
                let report = CreateReport {
                    mode: octal(created.mode),
                    acl: created.acl.as_ref(),
                };
                emit_json(&report, stdout)?;
            } else {
                writeln!(stdout, "mode: {}", octal(created.mode)).map_err(stdout_error)?;
                if let Some(acl) = &created.acl {
                    write!(stdout, "{acl}").map_err(stdout_error)?;
                }
            }
        }
    }
    Ok(0)
}

fn check<Out: Write>(
    acl: &RichAcl,
    args: &ParsedArgs,
    intents: &[(String, AccessIntent)],
    stdout: &mut Out,
) -> Result<i32, CliError> {
    let creds = args.credentials();
    let requester = creds.for_file(args.owner, args.owning_group);
    let mut tracer = AclTracer::new();

    let reports: Vec<CheckReport<'_>> = intents
        .iter()
        .map(|(name, intent)| {
            let evaluation = evaluate(acl, &requester, intent.to_mask());
            let granted = evaluation.decision().is_granted();
            tracer.record_decision(granted);
            CheckReport {
                intent: name,
                granted,
                denied: MaskLetters(evaluation.denied).to_string(),
                class: class_name(evaluation.class),
            }
        })
        .collect();
    tracer.summary();

    if args.json {
        emit_json(&reports, stdout)?;
    } else {
        for report in &reports {
            let written = if report.granted {
                writeln!(stdout, "{}: granted ({} class)", report.intent, report.class)
            } else {
                writeln!(
                    stdout,
                    "{}: denied {} ({} class)",
                    report.intent, report.denied, report.class
                )
            };
            written.map_err(stdout_error)?;
        }
    }

    Ok(if tracer.denied() == 0 { 0 } else { EXIT_NEGATIVE })
}
