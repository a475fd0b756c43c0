use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_until},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

use crate::model::Timestamp;

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    /// Without a time the shell asks from the cursor's reference time, so
    /// repeating it does not advance; only day steps move the anchor.
    Next { after: Option<Timestamp> },
    Prev { before: Option<Timestamp> },
    DayForward,
    DayBackward,
    Add { start: Timestamp, end: Option<Timestamp>, payload: String },
    Store { start: Timestamp, end: Option<Timestamp>, payload: String },
    Show,
    Reset,
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_timestamp(input: &str) -> IResult<&str, Timestamp> {
    map_res(digit1, |s: &str| s.parse::<Timestamp>())(input)
}

/// A finite end, or `ONGOING` for none.
fn parse_end(input: &str) -> IResult<&str, Option<Timestamp>> {
    alt((
        value(None, tag_ci("ONGOING")),
        map(parse_timestamp, Some),
    ))(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

/// `<start> <end|ONGOING> "payload"`
fn parse_interval(input: &str) -> IResult<&str, (Timestamp, Option<Timestamp>, String)> {
    let (input, start) = ws(parse_timestamp)(input)?;
    let (input, end) = ws(parse_end)(input)?;
    let (input, payload) = ws(parse_quoted_string)(input)?;
    Ok((input, (start, end, payload)))
}

// --- COMMAND PARSERS ---

fn parse_next(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("NEXT")(input)?;
    let (input, after) = opt(preceded(
        ws(tag_ci("AFTER")),
        parse_timestamp,
    ))(input)?;
    Ok((input, Command::Next { after }))
}

fn parse_prev(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("PREV")(input)?;
    let (input, before) = opt(preceded(
        ws(tag_ci("BEFORE")),
        parse_timestamp,
    ))(input)?;
    Ok((input, Command::Prev { before }))
}

fn parse_day(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DAY")(input)?;
    let (input, _) = multispace0(input)?;
    alt((
        value(Command::DayForward, tag("+")),
        value(Command::DayBackward, tag("-")),
    ))(input)
}

fn parse_add(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ADD")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, (start, end, payload)) = parse_interval(input)?;
    Ok((input, Command::Add { start, end, payload }))
}

fn parse_store(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("STORE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, (start, end, payload)) = parse_interval(input)?;
    Ok((input, Command::Store { start, end, payload }))
}

fn parse_keyword(input: &str) -> IResult<&str, Command> {
    alt((
        value(Command::Show, tag_ci("SHOW")),
        value(Command::Reset, tag_ci("RESET")),
        value(Command::Help, tag_ci("HELP")),
        value(Command::Exit, alt((tag_ci("EXIT"), tag_ci("QUIT")))),
    ))(input)
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_next,
        parse_prev,
        parse_day,
        parse_add,
        parse_store,
        parse_keyword,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context = if e.input.len() > 20 {
                format!("{}...", &e.input[..20])
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigation() {
        assert_eq!(parse_command("next"), Ok(Command::Next { after: None }));
        assert_eq!(parse_command("NEXT AFTER 1700000000"), Ok(Command::Next { after: Some(1_700_000_000) }));
        assert_eq!(parse_command("  prev before 42 "), Ok(Command::Prev { before: Some(42) }));
        assert_eq!(parse_command("DAY+"), Ok(Command::DayForward));
        assert_eq!(parse_command("day -"), Ok(Command::DayBackward));
    }

    #[test]
    fn test_parse_intervals() {
        assert_eq!(
            parse_command("ADD 100 200 \"standup\""),
            Ok(Command::Add { start: 100, end: Some(200), payload: "standup".into() })
        );
        assert_eq!(
            parse_command("store 300 ongoing \"deep work\""),
            Ok(Command::Store { start: 300, end: None, payload: "deep work".into() })
        );
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_command("show"), Ok(Command::Show));
        assert_eq!(parse_command("RESET"), Ok(Command::Reset));
        assert_eq!(parse_command("quit"), Ok(Command::Exit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("NEXT AFTER").unwrap_err().contains("Unexpected tokens"));
        assert!(parse_command("ADD 100 \"x\"").unwrap_err().starts_with("Invalid syntax"));
        assert!(parse_command("JUMP").is_err());
    }
}
