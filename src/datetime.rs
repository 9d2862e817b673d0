/// Datetime values for the SQL/JSON datetime family, backed by jiff.
///
/// `.datetime()` and friends parse strings through a fixed, ordered list of
/// ISO patterns; the first pattern that consumes the entire input wins, so
/// ambiguous inputs always resolve the same way. Template-driven parsing
/// converts a to_char-style template into a strptime format and classifies
/// the result from the fields the template populated.
///
/// A library has no session timezone, so every place the engine needs one
/// (casting a date or plain timestamp across the tz boundary) uses UTC.
/// Those casts stay gated on the caller's tz opt-in.
use jiff::civil;
use jiff::fmt::strtime::BrokenDownTime;
use jiff::tz::{Offset, TimeZone};
use jiff::{Timestamp, Unit};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatetimeKind {
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
}

impl DatetimeKind {
    /// SQL-style type name, used in `.type()` output and error messages.
    pub fn type_name(self) -> &'static str {
        match self {
            DatetimeKind::Date => "date",
            DatetimeKind::Time => "time without time zone",
            DatetimeKind::TimeTz => "time with time zone",
            DatetimeKind::Timestamp => "timestamp without time zone",
            DatetimeKind::TimestampTz => "timestamp with time zone",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            DatetimeKind::Date => "date",
            DatetimeKind::Time => "time",
            DatetimeKind::TimeTz => "timetz",
            DatetimeKind::Timestamp => "timestamp",
            DatetimeKind::TimestampTz => "timestamptz",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Datetime {
    Date(civil::Date),
    Time(civil::Time),
    TimeTz { time: civil::Time, offset: Offset },
    Timestamp(civil::DateTime),
    TimestampTz { timestamp: Timestamp, offset: Offset },
}

impl Datetime {
    pub fn kind(&self) -> DatetimeKind {
        match self {
            Datetime::Date(_) => DatetimeKind::Date,
            Datetime::Time(_) => DatetimeKind::Time,
            Datetime::TimeTz { .. } => DatetimeKind::TimeTz,
            Datetime::Timestamp(_) => DatetimeKind::Timestamp,
            Datetime::TimestampTz { .. } => DatetimeKind::TimestampTz,
        }
    }

    /// ISO rendering, the form `.string()` and JSON serialization use.
    pub fn encode(&self) -> String {
        match self {
            Datetime::Date(d) => d.to_string(),
            Datetime::Time(t) => t.to_string(),
            Datetime::TimeTz { time, offset } => {
                format!("{}{}", time, fmt_offset(*offset))
            }
            Datetime::Timestamp(dt) => dt.to_string(),
            Datetime::TimestampTz { timestamp, offset } => {
                let local = TimeZone::fixed(*offset).to_datetime(*timestamp);
                format!("{}{}", local, fmt_offset(*offset))
            }
        }
    }
}

fn fmt_offset(offset: Offset) -> String {
    let secs = offset.seconds();
    let sign = if secs < 0 { '-' } else { '+' };
    let abs = secs.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

/// The ordered ISO pattern list. Order is part of the contract: date, then
/// time-with-zone, plain time, timestamp-with-zone (space then `T`
/// separator), plain timestamp. Offsets appear in `±HH:MM` and `±HHMM`
/// forms; fractional seconds are optional in every `%.f` entry.
const ISO_FORMATS: &[(DatetimeKind, &str)] = &[
    (DatetimeKind::Date, "%Y-%m-%d"),
    (DatetimeKind::TimeTz, "%H:%M:%S%.f%:z"),
    (DatetimeKind::TimeTz, "%H:%M:%S%.f%z"),
    (DatetimeKind::TimeTz, "%H:%M:%S%:z"),
    (DatetimeKind::TimeTz, "%H:%M:%S%z"),
    (DatetimeKind::Time, "%H:%M:%S%.f"),
    (DatetimeKind::Time, "%H:%M:%S"),
    (DatetimeKind::TimestampTz, "%Y-%m-%d %H:%M:%S%.f%:z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%d %H:%M:%S%.f%z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%d %H:%M:%S%:z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%d %H:%M:%S%z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%dT%H:%M:%S%.f%:z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%dT%H:%M:%S%.f%z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%dT%H:%M:%S%:z"),
    (DatetimeKind::TimestampTz, "%Y-%m-%dT%H:%M:%S%z"),
    (DatetimeKind::Timestamp, "%Y-%m-%d %H:%M:%S%.f"),
    (DatetimeKind::Timestamp, "%Y-%m-%d %H:%M:%S"),
    (DatetimeKind::Timestamp, "%Y-%m-%dT%H:%M:%S%.f"),
    (DatetimeKind::Timestamp, "%Y-%m-%dT%H:%M:%S"),
];

/// Parse against the ordered ISO list; first full match wins.
pub(crate) fn parse_iso(input: &str) -> Option<Datetime> {
    for (kind, fmt) in ISO_FORMATS {
        if let Some(dt) = parse_as(*kind, fmt, input) {
            return Some(dt);
        }
    }
    None
}

fn parse_as(kind: DatetimeKind, fmt: &str, input: &str) -> Option<Datetime> {
    let tm = BrokenDownTime::parse(fmt, input).ok()?;
    match kind {
        DatetimeKind::Date => tm.to_date().ok().map(Datetime::Date),
        DatetimeKind::Time => tm.to_time().ok().map(Datetime::Time),
        DatetimeKind::TimeTz => {
            let time = tm.to_time().ok()?;
            let offset = tm.offset()?;
            Some(Datetime::TimeTz { time, offset })
        }
        DatetimeKind::Timestamp => tm.to_datetime().ok().map(Datetime::Timestamp),
        DatetimeKind::TimestampTz => {
            let offset = tm.offset()?;
            let timestamp = tm.to_timestamp().ok()?;
            Some(Datetime::TimestampTz { timestamp, offset })
        }
    }
}

/// Parse with a user-supplied template. The resulting kind is whatever the
/// populated fields imply: date and time parts plus an offset make a
/// timestamptz, and so on down to a bare date or time.
pub(crate) fn parse_with_template(template: &str, input: &str) -> Option<Datetime> {
    let fmt = template_to_strptime(template)?;
    let tm = BrokenDownTime::parse(&fmt, input).ok()?;
    let has_date = tm.year().is_some() || tm.month().is_some() || tm.day().is_some();
    let has_time = tm.hour().is_some() || tm.minute().is_some();
    let offset = tm.offset();
    match (has_date, has_time, offset) {
        (true, true, Some(offset)) => {
            let timestamp = tm.to_timestamp().ok()?;
            Some(Datetime::TimestampTz { timestamp, offset })
        }
        (true, true, None) => tm.to_datetime().ok().map(Datetime::Timestamp),
        (true, false, _) => tm.to_date().ok().map(Datetime::Date),
        (false, true, Some(offset)) => {
            let time = tm.to_time().ok()?;
            Some(Datetime::TimeTz { time, offset })
        }
        (false, true, None) => tm.to_time().ok().map(Datetime::Time),
        (false, false, _) => None,
    }
}

/// Translate a to_char-style datetime template into a strptime format.
/// Unknown alphabetic tokens fail the translation; punctuation and digits
/// pass through, and double-quoted runs are literal.
fn template_to_strptime(template: &str) -> Option<String> {
    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("HH24", "%H"),
        ("HH12", "%I"),
        ("HH", "%I"),
        ("MI", "%M"),
        ("SS", "%S"),
        ("FF1", "%f"),
        ("FF2", "%f"),
        ("FF3", "%f"),
        ("FF4", "%f"),
        ("FF5", "%f"),
        ("FF6", "%f"),
        ("MS", "%f"),
        ("US", "%f"),
        ("TZH:TZM", "%:z"),
        ("OF", "%:z"),
        ("TZ", "%:z"),
        ("A.M.", "%p"),
        ("P.M.", "%p"),
        ("AM", "%p"),
        ("PM", "%p"),
    ];

    let mut out = String::with_capacity(template.len() + 8);
    let bytes = template.as_bytes();
    let upper = template.to_ascii_uppercase();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '"' {
            // quoted literal, copied verbatim up to the closing quote
            let rest = &template[i + 1..];
            let end = rest.find('"')?;
            for lc in rest[..end].chars() {
                push_literal(&mut out, lc);
            }
            i += end + 2;
            continue;
        }
        if c.is_ascii_alphabetic() {
            let matched = TOKENS
                .iter()
                .find(|(tok, _)| upper[i..].starts_with(tok));
            match matched {
                Some((tok, fmt)) => {
                    out.push_str(fmt);
                    i += tok.len();
                }
                None => return None,
            }
            continue;
        }
        push_literal(&mut out, c);
        i += 1;
    }
    Some(out)
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Clamp a time precision argument and round fractional seconds to it,
/// half away from zero.
pub(crate) fn adjust_precision(dt: Datetime, precision: u32) -> Datetime {
    let p = precision.min(6);
    let increment = 10i64.pow(9 - p);
    if increment == 1 {
        return dt;
    }
    match dt {
        Datetime::Time(t) => {
            Datetime::Time(t.round((Unit::Nanosecond, increment)).unwrap_or(t))
        }
        Datetime::TimeTz { time, offset } => Datetime::TimeTz {
            time: time.round((Unit::Nanosecond, increment)).unwrap_or(time),
            offset,
        },
        Datetime::Timestamp(ts) => {
            Datetime::Timestamp(ts.round((Unit::Nanosecond, increment)).unwrap_or(ts))
        }
        Datetime::TimestampTz { timestamp, offset } => Datetime::TimestampTz {
            timestamp: timestamp
                .round((Unit::Nanosecond, increment))
                .unwrap_or(timestamp),
            offset,
        },
        other => other,
    }
}

fn require_tz(use_tz: bool, from: DatetimeKind, to: DatetimeKind) -> Result<(), Error> {
    if use_tz {
        Ok(())
    } else {
        Err(Error::TimezoneUsage {
            from: from.short_name(),
            to: to.short_name(),
        })
    }
}

fn utc_timestamp(dt: civil::DateTime) -> Result<Timestamp, Error> {
    dt.to_zoned(TimeZone::UTC)
        .map(|z| z.timestamp())
        .map_err(|_| Error::Internal("civil datetime out of timestamp range"))
}

fn utc_datetime(ts: Timestamp) -> civil::DateTime {
    TimeZone::UTC.to_datetime(ts)
}

/// Cast a parsed value to the kind a specific method asked for, following
/// the fixed compatibility table. `Ok(None)` marks an incompatible pair
/// (the caller reports an unrecognized format); a required-but-unavailable
/// timezone is a hard error.
pub(crate) fn cast_to_kind(
    dt: Datetime,
    target: DatetimeKind,
    use_tz: bool,
) -> Result<Option<Datetime>, Error> {
    use Datetime as D;
    use DatetimeKind as K;

    let source = dt.kind();
    let cast = match (dt, target) {
        (dt, t) if dt.kind() == t => Some(dt),

        (D::Timestamp(ts), K::Date) => Some(D::Date(ts.date())),
        (D::TimestampTz { timestamp, .. }, K::Date) => {
            require_tz(use_tz, source, target)?;
            Some(D::Date(utc_datetime(timestamp).date()))
        }

        (D::TimeTz { time, .. }, K::Time) => {
            require_tz(use_tz, source, target)?;
            Some(D::Time(time))
        }
        (D::Timestamp(ts), K::Time) => Some(D::Time(ts.time())),
        (D::TimestampTz { timestamp, .. }, K::Time) => {
            require_tz(use_tz, source, target)?;
            Some(D::Time(utc_datetime(timestamp).time()))
        }

        (D::Time(t), K::TimeTz) => {
            require_tz(use_tz, source, target)?;
            Some(D::TimeTz {
                time: t,
                offset: Offset::UTC,
            })
        }
        (D::TimestampTz { timestamp, offset }, K::TimeTz) => Some(D::TimeTz {
            time: TimeZone::fixed(offset).to_datetime(timestamp).time(),
            offset,
        }),

        (D::Date(d), K::Timestamp) => {
            Some(D::Timestamp(d.to_datetime(civil::Time::midnight())))
        }
        (D::TimestampTz { timestamp, .. }, K::Timestamp) => {
            require_tz(use_tz, source, target)?;
            Some(D::Timestamp(utc_datetime(timestamp)))
        }

        (D::Date(d), K::TimestampTz) => {
            require_tz(use_tz, source, target)?;
            Some(D::TimestampTz {
                timestamp: utc_timestamp(d.to_datetime(civil::Time::midnight()))?,
                offset: Offset::UTC,
            })
        }
        (D::Timestamp(ts), K::TimestampTz) => {
            require_tz(use_tz, source, target)?;
            Some(D::TimestampTz {
                timestamp: utc_timestamp(ts)?,
                offset: Offset::UTC,
            })
        }

        _ => None,
    };
    Ok(cast)
}

fn time_utc_nanos(time: civil::Time, offset: Offset) -> i64 {
    let nanos = time.hour() as i64 * 3_600_000_000_000
        + time.minute() as i64 * 60_000_000_000
        + time.second() as i64 * 1_000_000_000
        + time.subsec_nanosecond() as i64;
    nanos - offset.seconds() as i64 * 1_000_000_000
}

/// Cross-type comparison ladder. `Ok(None)` marks an uncomparable pair,
/// which the predicate layer lifts to Unknown; a comparison that needs a
/// timezone without the tz opt-in is a hard error.
pub(crate) fn compare_datetime(
    a: &Datetime,
    b: &Datetime,
    use_tz: bool,
) -> Result<Option<std::cmp::Ordering>, Error> {
    use Datetime as D;

    let ord = match (a, b) {
        (D::Date(x), D::Date(y)) => Some(x.cmp(y)),
        (D::Date(x), D::Timestamp(y)) => {
            Some(x.to_datetime(civil::Time::midnight()).cmp(y))
        }
        (D::Date(x), D::TimestampTz { timestamp, .. }) => {
            require_tz(use_tz, a.kind(), b.kind())?;
            Some(utc_timestamp(x.to_datetime(civil::Time::midnight()))?.cmp(timestamp))
        }

        (D::Time(x), D::Time(y)) => Some(x.cmp(y)),
        (D::Time(x), D::TimeTz { time, offset }) => {
            require_tz(use_tz, a.kind(), b.kind())?;
            Some(cmp_timetz(*x, Offset::UTC, *time, *offset))
        }
        (D::TimeTz { time, offset }, D::Time(y)) => {
            require_tz(use_tz, a.kind(), b.kind())?;
            Some(cmp_timetz(*time, *offset, *y, Offset::UTC))
        }
        (
            D::TimeTz { time: t1, offset: o1 },
            D::TimeTz { time: t2, offset: o2 },
        ) => Some(cmp_timetz(*t1, *o1, *t2, *o2)),

        (D::Timestamp(x), D::Timestamp(y)) => Some(x.cmp(y)),
        (D::Timestamp(_), D::Date(_)) => {
            return Ok(compare_datetime(b, a, use_tz)?.map(|o| o.reverse()));
        }
        (D::Timestamp(x), D::TimestampTz { timestamp, .. }) => {
            require_tz(use_tz, a.kind(), b.kind())?;
            Some(utc_timestamp(*x)?.cmp(timestamp))
        }

        (
            D::TimestampTz { timestamp: x, .. },
            D::TimestampTz { timestamp: y, .. },
        ) => Some(x.cmp(y)),
        (D::TimestampTz { .. }, D::Date(_)) | (D::TimestampTz { .. }, D::Timestamp(_)) => {
            return Ok(compare_datetime(b, a, use_tz)?.map(|o| o.reverse()));
        }

        _ => None,
    };
    Ok(ord)
}

fn cmp_timetz(t1: civil::Time, o1: Offset, t2: civil::Time, o2: Offset) -> std::cmp::Ordering {
    time_utc_nanos(t1, o1)
        .cmp(&time_utc_nanos(t2, o2))
        .then_with(|| o2.seconds().cmp(&o1.seconds()))
}
