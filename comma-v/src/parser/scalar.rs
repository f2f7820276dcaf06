use std::{convert::TryFrom, time::SystemTime};

use chrono::{NaiveDate, TimeZone, Utc};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_while, take_while1},
    combinator::{map, map_res, value},
    multi::fold_many0,
    sequence::delimited,
    IResult,
};

use super::char::*;
use crate::{types, Num};

pub(super) fn integrity_string(input: &[u8]) -> IResult<&[u8], types::IntString> {
    // TODO: thirdp support
    map(
        delimited(tag(b"@"), take_while(is_intchar), tag(b"@")),
        |bytes| types::IntString(Vec::from(bytes)),
    )(input)
}

pub(super) fn id(input: &[u8]) -> IResult<&[u8], types::Id> {
    map(take_while(|c| is_idchar(c) || c == b'.'), |bytes| {
        types::Id(Vec::from(bytes))
    })(input)
}

pub(super) fn numlike(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while1(|c| c == b'.' || (c >= b'0' && c <= b'9'))(input)
}

/// Parses an RCS `date` scalar (`rcsfile(5)`): `YY.MM.DD.hh.mm.ss`, or
/// `YYYY.MM.DD.hh.mm.ss` once RCS grew four-digit years. The value is always
/// stored (and emitted) in UTC.
pub(super) fn date(input: &[u8]) -> IResult<&[u8], SystemTime> {
    map_res(numlike, |bytes: &[u8]| {
        let raw = std::str::from_utf8(bytes)?;
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 6 {
            return Err(crate::Error::ParseError {
                location: bytes.to_vec(),
                kind: nom::error::ErrorKind::Verify,
            });
        }

        let year: i32 = parts[0].parse()?;
        let year = if year < 100 {
            // Pre-Y2K RCS files only ever recorded a two-digit year.
            year + 1900
        } else {
            year
        };
        let month: u32 = parts[1].parse()?;
        let day: u32 = parts[2].parse()?;
        let hour: u32 = parts[3].parse()?;
        let minute: u32 = parts[4].parse()?;
        let second: u32 = parts[5].parse()?;

        let date = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(|| crate::Error::ParseError {
                location: bytes.to_vec(),
                kind: nom::error::ErrorKind::Verify,
            })?;

        Ok::<SystemTime, crate::Error>(Utc.from_utc_datetime(&date).into())
    })(input)
}

pub(super) fn num(input: &[u8]) -> IResult<&[u8], Num> {
    map_res(numlike, |bytes: &[u8]| {
        let raw = types::RawNum(bytes.to_vec());
        Num::try_from(raw.0.as_slice())
    })(input)
}

pub(super) fn string_literal(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_till1(|c| c == b'@')(input)
}

pub(super) fn string_escape(input: &[u8]) -> IResult<&[u8], &[u8]> {
    value(&b"@"[..], tag(b"@@"))(input)
}

pub(super) fn string(input: &[u8]) -> IResult<&[u8], types::VString> {
    map(
        delimited(
            tag(b"@"),
            fold_many0(
                alt((string_literal, string_escape)),
                Vec::new(),
                |mut v, fragment| {
                    v.extend_from_slice(fragment);
                    v
                },
            ),
            tag(b"@"),
        ),
        |bytes| types::VString(bytes),
    )(input)
}

pub(super) fn sym(input: &[u8]) -> IResult<&[u8], types::Sym> {
    map(take_while(is_idchar), |bytes| types::Sym(Vec::from(bytes)))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        assert_eq!(*integrity_string(b"@@").unwrap().1, b"");
        assert_eq!(*integrity_string(b"@foo@").unwrap().1, b"foo");
        assert_eq!(*integrity_string(b"@foo\x0cbar@").unwrap().1, b"foo\x0cbar");

        assert_eq!(string(b"@foo bar@").unwrap().1 .0, b"foo bar");
        assert_eq!(string(b"@foo@@bar@").unwrap().1 .0, b"foo@bar");
    }
}
