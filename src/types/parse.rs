//! Parsers that turn user input into typed values
//!
//! All parsers return a plain `String` error describing the problem;
//! the caller wraps it into the proper expression error.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::MODE_ALL;

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;
const S_IRWXU: u32 = 0o700;
const S_IRWXG: u32 = 0o070;
const S_IRWXO: u32 = 0o007;

/// Parse a file size like `100`, `4K`, `1.5MiB` or `2GB`.
///
/// Plain unit letters and the `iB` suffix are base 1024, the `B`
/// suffix is base 1000. With `si` the default for plain letters flips
/// to base 1000.
pub fn parse_size(input: &str, si: bool) -> Result<u64, String> {
    let upper = input.trim().to_uppercase();
    if upper.is_empty() {
        return Err(format!("invalid size {input:?}"));
    }

    // A bare number (optionally with a `B` suffix) is a byte count.
    let bare = upper.strip_suffix('B').unwrap_or(&upper);
    if bare.bytes().all(|b| b.is_ascii_digit()) && !bare.is_empty() {
        return bare
            .parse::<u64>()
            .map_err(|_| format!("invalid size {input:?}"));
    }

    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(upper.len());
    let (number, unit) = upper.split_at(digits_end);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid size {input:?}"))?;

    let mut chars = unit.chars();
    let prefix = chars.next().ok_or_else(|| format!("invalid size {input:?}"))?;
    let suffix: String = chars.collect();

    let exp = match "KMGTPE".find(prefix) {
        Some(pos) => pos as u32 + 1,
        None => return Err(format!("invalid size {input:?}")),
    };
    let base: f64 = match suffix.as_str() {
        "" => {
            if si {
                1000.0
            } else {
                1024.0
            }
        }
        "B" => 1000.0,
        "IB" => 1024.0,
        _ => return Err(format!("invalid size {input:?}")),
    };

    Ok((number * base.powi(exp as i32)) as u64)
}

/// Parse a duration like `1h30m` or `2d` into seconds. A bare number
/// is taken as minutes. The month unit `M` is case sensitive.
pub fn parse_duration(input: &str) -> Result<u64, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    if input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .map(|n| n * 60)
            .map_err(|_| format!("unable to parse {input:?}"));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(format!("unable to parse {input:?}"));
        }
        let count: u64 = digits
            .parse()
            .map_err(|_| format!("unable to parse {input:?}"))?;
        digits.clear();
        let factor = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            'w' => 604800,
            'M' => 2592000,  // 30 days
            'y' => 31536000, // 365 days
            _ => return Err(format!("unable to parse {input:?}")),
        };
        total += count * factor;
    }
    if !digits.is_empty() {
        return Err(format!("unable to parse {input:?}"));
    }
    Ok(total)
}

fn local_timestamp(ndt: NaiveDateTime) -> i64 {
    match Local.from_local_datetime(&ndt).earliest() {
        Some(dt) => dt.timestamp(),
        None => ndt.and_utc().timestamp(),
    }
}

/// A bare time means today, or yesterday if the time has not come
/// around yet.
fn time_today(time: NaiveTime) -> i64 {
    let now = Local::now();
    let mut ndt = now.date_naive().and_time(time);
    if ndt > now.naive_local() {
        ndt -= chrono::Duration::days(1);
    }
    local_timestamp(ndt)
}

/// All-digit inputs: `YYYYMMDDHHMM`, `YYYYMMDD` and `HHMM` by their
/// length, anything else is an epoch value.
fn parse_compact_digits(input: &str) -> Option<i64> {
    let digit = |range: std::ops::Range<usize>| input[range].parse::<u32>().ok();
    match input.len() {
        12 => {
            let date =
                NaiveDate::from_ymd_opt(digit(0..4)? as i32, digit(4..6)?, digit(6..8)?)?;
            let time = NaiveTime::from_hms_opt(digit(8..10)?, digit(10..12)?, 0)?;
            Some(local_timestamp(date.and_time(time)))
        }
        8 => {
            let date =
                NaiveDate::from_ymd_opt(digit(0..4)? as i32, digit(4..6)?, digit(6..8)?)?;
            Some(local_timestamp(date.and_hms_opt(0, 0, 0)?))
        }
        4 => {
            let time = NaiveTime::from_hms_opt(digit(0..2)?, digit(2..4)?, 0)?;
            Some(time_today(time))
        }
        _ => input.parse::<i64>().ok(),
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parse a point in time. Accepts a fixed set of date, date-time,
/// compact-digit and time-only patterns, a bare epoch integer, or a
/// duration which is taken as "that long ago".
pub fn parse_time(input: &str) -> Result<i64, String> {
    let input = input.trim();

    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        if let Some(epoch) = parse_compact_digits(input) {
            return Ok(epoch);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Ok(local_timestamp(ndt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let ndt = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        return Ok(local_timestamp(ndt));
    }
    for fmt in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(input, fmt) {
            return Ok(time_today(time));
        }
    }

    if let Ok(epoch) = input.parse::<f64>() {
        return Ok(epoch as i64);
    }

    if let Ok(ago) = parse_duration(input) {
        return Ok(Local::now().timestamp() - ago as i64);
    }

    Err(format!("{input:?} is no valid time"))
}

/// Parse an octal or symbolic file mode, e.g. `644`, `u+rwx` or
/// `a+r,o-w`. The grammar follows find(1)'s `-perm` argument.
pub fn parse_mode(input: &str) -> Result<u32, String> {
    let mut affected: u32 = 0;
    let mut result: u32 = 0;

    for part in input.split(',') {
        if let Some((operator, value)) = parse_octal_part(part) {
            if operator == '-' {
                result &= !value;
            } else {
                result |= value;
            }
            affected = MODE_ALL;
            continue;
        }

        let (who, operator, what) =
            parse_symbolic_part(part).ok_or_else(|| format!("unable to parse {input:?}"))?;

        for c in who.chars() {
            match c {
                'u' => affected |= S_ISUID | S_IRWXU,
                'g' => affected |= S_ISGID | S_IRWXG,
                'o' => affected |= S_ISVTX | S_IRWXO,
                'a' => affected |= MODE_ALL,
                _ => unreachable!(),
            }
        }

        let mut value: u32 = 0;
        match what.as_str() {
            "u" => value |= S_IRWXU,
            "g" => value |= S_IRWXG,
            "o" => value |= S_IRWXO,
            _ => {
                for c in what.chars() {
                    match c {
                        'r' => value |= 0o444,
                        'w' => value |= 0o222,
                        // `X` behaves like `x` in a match context.
                        'x' | 'X' => value |= 0o111,
                        's' => value |= S_ISUID | S_ISGID,
                        't' => value |= S_ISVTX,
                        _ => return Err(format!("unable to parse {input:?}")),
                    }
                }
            }
        }

        match operator {
            '+' | '=' => result |= value,
            '-' => result &= !value,
            _ => unreachable!(),
        }
    }

    Ok(affected & result)
}

/// `[-+=]?[0-7]+`
fn parse_octal_part(part: &str) -> Option<(char, u32)> {
    let (operator, digits) = match part.chars().next()? {
        c @ ('-' | '+' | '=') => (c, &part[1..]),
        _ => ('=', part),
    };
    if digits.is_empty() || !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().map(|v| (operator, v))
}

/// `[ugoa]*[-+=][rwxXstugo]+`
fn parse_symbolic_part(part: &str) -> Option<(String, char, String)> {
    let op_pos = part.find(['-', '+', '='])?;
    let who = &part[..op_pos];
    let operator = part.as_bytes()[op_pos] as char;
    let what = &part[op_pos + 1..];

    if !who.chars().all(|c| "ugoa".contains(c)) || what.is_empty() {
        return None;
    }
    if !what.chars().all(|c| "rwxXstugo".contains(c)) {
        return None;
    }

    let who = if who.is_empty() { "a".to_string() } else { who.to_string() };
    Some((who, operator, what.to_string()))
}

/// Parse a boolean. Accepts true/t/1/yes/y/on and false/f/0/no/n/off,
/// case insensitive.
pub fn parse_bool(input: &str) -> Result<bool, String> {
    match input.to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Ok(false),
        _ => Err(format!("{input:?} is not a boolean value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_plain() {
        assert_eq!(parse_size("100", false).unwrap(), 100);
        assert_eq!(parse_size("100b", false).unwrap(), 100);
        assert_eq!(parse_size("1K", false).unwrap(), 1024);
        assert_eq!(parse_size("1KB", false).unwrap(), 1000);
        assert_eq!(parse_size("1KiB", false).unwrap(), 1024);
        assert_eq!(parse_size("1M", false).unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1.5K", false).unwrap(), 1536);
    }

    #[test]
    fn test_parse_size_si() {
        assert_eq!(parse_size("1K", true).unwrap(), 1000);
        // Explicit suffixes are unaffected by --si.
        assert_eq!(parse_size("1KiB", true).unwrap(), 1024);
        assert_eq!(parse_size("1KB", true).unwrap(), 1000);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("", false).is_err());
        assert!(parse_size("12Q", false).is_err());
        assert!(parse_size("K", false).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90").unwrap(), 90 * 60);
        assert_eq!(parse_duration("90s").unwrap(), 90);
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("1d12h").unwrap(), 129600);
        assert_eq!(parse_duration("2w").unwrap(), 1209600);
        assert_eq!(parse_duration("1M").unwrap(), 2592000);
        assert!(parse_duration("h1").is_err());
        assert!(parse_duration("1x").is_err());
    }

    #[test]
    fn test_parse_time_epoch() {
        assert_eq!(parse_time("1589234400").unwrap(), 1589234400);
    }

    #[test]
    fn test_parse_time_date() {
        // The exact epoch depends on the local timezone, but a date
        // must parse and midnight-align.
        let t = parse_time("2020-05-12").unwrap();
        assert!(t > 1_500_000_000 && t < 1_700_000_000);
        assert_eq!(parse_time("20200512").unwrap(), t);
    }

    #[test]
    fn test_parse_time_duration_ago() {
        let now = Local::now().timestamp();
        let t = parse_time("1h").unwrap();
        assert!((now - 3600 - t).abs() <= 2);
    }

    #[test]
    fn test_parse_time_invalid() {
        assert!(parse_time("not a time").is_err());
    }

    #[test]
    fn test_parse_mode_octal() {
        assert_eq!(parse_mode("644").unwrap(), 0o644);
        assert_eq!(parse_mode("0755").unwrap(), 0o755);
        assert_eq!(parse_mode("7777").unwrap(), 0o7777);
    }

    #[test]
    fn test_parse_mode_symbolic() {
        assert_eq!(parse_mode("u+x").unwrap(), 0o100);
        assert_eq!(parse_mode("a+r").unwrap(), 0o444);
        assert_eq!(parse_mode("u+rwx").unwrap(), 0o700);
        assert_eq!(parse_mode("+x").unwrap(), 0o111);
        assert_eq!(parse_mode("a+rwx").unwrap(), 0o777);
        assert_eq!(parse_mode("u+rw,g+r").unwrap(), 0o660);
    }

    #[test]
    fn test_parse_mode_invalid() {
        assert!(parse_mode("u+q").is_err());
        assert!(parse_mode("899").is_err());
        assert!(parse_mode("").is_err());
    }

    #[test]
    fn test_parse_bool() {
        for s in ["true", "T", "1", "yes", "Y", "on"] {
            assert_eq!(parse_bool(s).unwrap(), true);
        }
        for s in ["false", "F", "0", "no", "N", "off"] {
            assert_eq!(parse_bool(s).unwrap(), false);
        }
        assert!(parse_bool("maybe").is_err());
    }
}
