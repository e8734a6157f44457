use thiserror::Error;

use super::types::Command;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
    #[error("satellites are numbered from 1")]
    ZeroIndex,
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parses one operator line: `hover N`, `lock N` / `select N`, `auto [on|off]`,
/// `az DEG`, `el DEG` or `park`. Satellite numbers are 1-based.
pub fn parse_command(line: &str) -> Result<Command, ParseError> {
    let mut words = line.split_whitespace();
    let keyword = words.next().ok_or(ParseError::Empty)?.to_lowercase();
    let argument = words.next();
    if let Some(extra) = words.next() {
        return Err(ParseError::UnexpectedArgument(extra.to_string()));
    }

    match keyword.as_str() {
        "hover" => Ok(Command::Hover(parse_index(argument, "hover")?)),
        "lock" | "select" => Ok(Command::Select(parse_index(argument, "lock")?)),
        "auto" => match argument.map(str::to_lowercase).as_deref() {
            None | Some("toggle") => Ok(Command::ToggleAutoTrack),
            Some("on") => Ok(Command::SetAutoTrack(true)),
            Some("off") => Ok(Command::SetAutoTrack(false)),
            Some(other) => Err(ParseError::UnexpectedArgument(other.to_string())),
        },
        "az" => Ok(Command::ManualAzimuth(parse_degrees(argument, "az")?)),
        "el" => Ok(Command::ManualElevation(parse_degrees(argument, "el")?)),
        "park" => match argument {
            None => Ok(Command::Park),
            Some(other) => Err(ParseError::UnexpectedArgument(other.to_string())),
        },
        _ => Err(ParseError::UnknownCommand(keyword)),
    }
}

fn parse_index(argument: Option<&str>, command: &'static str) -> Result<usize, ParseError> {
    let raw = argument.ok_or(ParseError::MissingArgument(command))?;
    let number: usize = raw
        .parse()
        .map_err(|_| ParseError::InvalidNumber(raw.to_string()))?;
    number.checked_sub(1).ok_or(ParseError::ZeroIndex)
}

fn parse_degrees(argument: Option<&str>, command: &'static str) -> Result<f64, ParseError> {
    let raw = argument.ok_or(ParseError::MissingArgument(command))?;
    raw.trim_end_matches('°')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber(raw.to_string()))
}
