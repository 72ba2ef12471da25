// src/template.rs

//! Command-template parsing and placeholder expansion.
//!
//! Templates embed tokens of the single shape `{TYPE:NAME}` where `TYPE` is
//! one of the literal characters `i`, `o`, `p` and `NAME` matches
//! `[^{}:]+`. Everything outside tokens is passed verbatim to the shell.
//! No escape syntax exists; a literal `{i:` cannot appear in a command.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{Result, SciflowError};

/// Which kind of port a placeholder refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    /// `{i:NAME}`: an input port carrying file handles.
    Input,
    /// `{o:NAME}`: an output port carrying file handles.
    Output,
    /// `{p:NAME}`: a parameter port carrying strings.
    Param,
}

impl PortType {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "i" => PortType::Input,
            "o" => PortType::Output,
            "p" => PortType::Param,
            _ => unreachable!("placeholder regex only matches i, o and p"),
        }
    }

    /// The literal tag character used in templates.
    pub fn tag(self) -> char {
        match self {
            PortType::Input => 'i',
            PortType::Output => 'o',
            PortType::Param => 'p',
        }
    }
}

/// A `{TYPE:NAME}` token found in a command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub ty: PortType,
    pub name: String,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{(i|o|p):([^{}:]+)\}").expect("placeholder regex is valid")
    })
}

/// Scan `cmd` and return its placeholders in first-occurrence order.
///
/// Repeated occurrences of the same token are reported once.
pub fn placeholders(cmd: &str) -> Vec<Placeholder> {
    let mut found: Vec<Placeholder> = Vec::new();
    for caps in placeholder_regex().captures_iter(cmd) {
        let ty = PortType::from_tag(&caps[1]);
        let name = &caps[2];
        if !found.iter().any(|p| p.ty == ty && p.name == name) {
            found.push(Placeholder {
                ty,
                name: name.to_string(),
            });
        }
    }
    found
}

/// A placeholder for which the expansion lookup had no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingValue {
    pub ty: PortType,
    pub name: String,
}

impl fmt::Display for MissingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no value bound for placeholder '{{{}:{}}}'",
            self.ty.tag(),
            self.name
        )
    }
}

/// Substitute every placeholder in `cmd` with the value returned by
/// `lookup`.
///
/// Fails on the first placeholder `lookup` has no value for; a missing
/// substitution is fatal for the surrounding task.
pub fn expand<F>(cmd: &str, mut lookup: F) -> std::result::Result<String, MissingValue>
where
    F: FnMut(PortType, &str) -> Option<String>,
{
    let mut out = String::with_capacity(cmd.len());
    let mut last = 0;
    for caps in placeholder_regex().captures_iter(cmd) {
        let token = caps.get(0).unwrap();
        let ty = PortType::from_tag(&caps[1]);
        let name = &caps[2];
        match lookup(ty, name) {
            Some(value) => {
                out.push_str(&cmd[last..token.start()]);
                out.push_str(&value);
                last = token.end();
            }
            None => {
                return Err(MissingValue {
                    ty,
                    name: name.to_string(),
                })
            }
        }
    }
    out.push_str(&cmd[last..]);
    Ok(out)
}

/// Expand a template once from fully-populated maps.
///
/// This is the non-dataflow shortcut: output placeholders are substituted
/// with the mapped path verbatim (no `.tmp` indirection), input and
/// parameter placeholders with their map values.
pub fn expand_command(
    cmd: &str,
    in_paths: &BTreeMap<String, String>,
    out_paths: &BTreeMap<String, String>,
    params: &BTreeMap<String, String>,
) -> Result<String> {
    expand(cmd, |ty, name| {
        let map = match ty {
            PortType::Input => in_paths,
            PortType::Output => out_paths,
            PortType::Param => params,
        };
        map.get(name).cloned()
    })
    .map_err(|missing| SciflowError::template(format!("{missing} in command '{cmd}'")))
}
