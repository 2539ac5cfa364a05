//! Rendering of a fetched secret into the selected output mode.
//!
//! Rendering happens in memory before anything is written. A malformed
//! document leaves the output file untouched.

use crate::document::Document;
use crate::flatten::{FlatEntry, LineTemplate, ROOT_PREFIX, flatten};
use crate::launcher::{ChildEnvironment, launch};
use crate::options::{OutputMode, non_blank};
use crate::Result;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

/// Where text output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    /// Created (or truncated) when the output is written.
    File(PathBuf),
}

impl Destination {
    /// Blank values and `-` mean standard output; anything else is a path.
    pub fn from_option(value: Option<&str>) -> Self {
        match non_blank(value) {
            None | Some("-") => Destination::Stdout,
            Some(path) => Destination::File(PathBuf::from(path)),
        }
    }

    /// Opens the sink for writing.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be created.
    pub fn open(&self) -> io::Result<Box<dyn Write>> {
        match self {
            Destination::Stdout => Ok(Box::new(io::stdout().lock())),
            Destination::File(path) => {
                let file = File::create(path)?;
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

/// The result of rendering a payload in one output mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendering<'a> {
    /// Bytes for the destination.
    Text(Cow<'a, [u8]>),
    /// Assignments for the child process, in traversal order.
    Environment(Vec<(String, String)>),
}

/// Renders `payload` for `mode`.
///
/// Raw mode passes the payload through without decoding it; every other
/// mode parses it first and fails with a parse error on malformed input.
pub fn render(mode: OutputMode, payload: &[u8]) -> Result<Rendering<'_>> {
    if mode == OutputMode::Raw {
        return Ok(Rendering::Text(Cow::Borrowed(payload)));
    }

    let document = Document::parse(payload)?;
    debug!(
        mode = mode.as_str(),
        leaves = document.root().leaf_count(),
        "parsed secret document"
    );

    let rendering = match mode {
        OutputMode::Raw => Rendering::Text(Cow::Borrowed(payload)),
        OutputMode::Json => Rendering::Text(Cow::Owned(document.to_ascii_json()?)),
        OutputMode::AshEnv => shell_lines(&document, &LineTemplate::ash()),
        OutputMode::BashEnv => shell_lines(&document, &LineTemplate::bash()),
        OutputMode::ProcessInject => {
            let template = LineTemplate::ash();
            let assignments = flatten(document.root(), ROOT_PREFIX, &template)
                .into_iter()
                .map(FlatEntry::into_assignment)
                .collect();
            Rendering::Environment(assignments)
        }
    };
    Ok(rendering)
}

fn shell_lines(document: &Document, template: &LineTemplate) -> Rendering<'static> {
    let mut out = String::new();
    for entry in flatten(document.root(), ROOT_PREFIX, template) {
        out.push_str(&entry.render());
        out.push('\n');
    }
    Rendering::Text(Cow::Owned(out.into_bytes()))
}

/// Delivers a rendering: text goes to `destination`, an environment is
/// handed to the launcher together with `command`.
///
/// Returns the exit code for the invocation: 0 for text, the child's code
/// for process injection.
pub fn route(
    rendering: Rendering<'_>,
    destination: &Destination,
    command: &[String],
    preserve_env: bool,
) -> Result<i32> {
    match rendering {
        Rendering::Text(bytes) => {
            let mut writer = destination.open()?;
            writer.write_all(&bytes)?;
            writer.flush()?;
            Ok(0)
        }
        Rendering::Environment(assignments) => {
            let environment = ChildEnvironment::build(assignments, preserve_env);
            Ok(launch(command, &environment)?)
        }
    }
}
