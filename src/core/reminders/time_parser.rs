// Free-text reminder times.
//
// Everything is interpreted in the zone of `now`. When an expression is
// ambiguous the upcoming occurrence wins over the one that already passed.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

/// Time used when an expression names a day but no time.
fn default_day_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_evening_time() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Parse a time expression relative to `now`.
///
/// **Accepted forms** (case-insensitive):
/// - `2025-07-21 18:30`, `2025-07-21 18:30:15`, `2025-07-21`, `21/07/2025 6pm`
/// - `18:30`, `6pm`, `6:30 pm`, `noon`, `midnight`
/// - `now`, `today 5pm`, `tonight`, `tomorrow 08:00`
/// - `friday 5pm`, `next monday`
/// - `in 30 minutes`, `in 2h`, `3 days from now`
pub fn parse_when(input: &str, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let normalized = input.trim().to_lowercase();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    if tokens == ["now"] {
        return Some(now);
    }

    if let Some(offset) = parse_relative(&tokens) {
        return now.checked_add_signed(offset);
    }

    let local = now.naive_local();
    let target = parse_absolute(&tokens)
        .or_else(|| parse_day_word(&tokens, local))
        .or_else(|| parse_weekday(&tokens, local))
        .or_else(|| parse_bare_clock(&tokens, local))?;

    resolve_local(&now.timezone(), target)
}

/// Map a wall-clock time onto the zone. Times that fall into a DST gap are
/// moved forward by an hour; ambiguous times take the earlier instant.
fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// "in 30 minutes", "in 2h", "3 days from now"
fn parse_relative(tokens: &[&str]) -> Option<Duration> {
    let quantity = match tokens {
        ["in", rest @ ..] => rest,
        [rest @ .., "from", "now"] => rest,
        _ => return None,
    };

    let (amount, unit) = match quantity {
        [number, unit] => (parse_amount(number)?, *unit),
        [compact] => {
            let split = compact.find(|c: char| !c.is_ascii_digit())?;
            let (number, unit) = compact.split_at(split);
            if number.is_empty() {
                return None;
            }
            (parse_amount(number)?, unit)
        }
        _ => return None,
    };

    // Amounts too large for a duration are treated as unparseable.
    match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount),
        "d" | "day" | "days" => Duration::try_days(amount),
        "w" | "wk" | "wks" | "week" | "weeks" => Duration::try_weeks(amount),
        _ => None,
    }
}

fn parse_amount(token: &str) -> Option<i64> {
    match token {
        "a" | "an" | "one" => Some(1),
        other => other.parse::<u32>().ok().map(i64::from),
    }
}

/// "18:30", "6pm", "6:30pm", "noon". Callers join the time tokens first, so
/// "6:30 pm" arrives here as "6:30pm".
fn parse_clock(input: &str) -> Option<NaiveTime> {
    match input {
        "noon" => return NaiveTime::from_hms_opt(12, 0, 0),
        "midnight" => return NaiveTime::from_hms_opt(0, 0, 0),
        _ => {}
    }

    let (body, meridiem) = if let Some(body) = input.strip_suffix("am") {
        (body, Some(false))
    } else if let Some(body) = input.strip_suffix("pm") {
        (body, Some(true))
    } else {
        (input, None)
    };

    match meridiem {
        Some(is_pm) => {
            let (hour, minute) = match body.split_once(':') {
                Some((hour, minute)) if minute.len() == 2 => {
                    (hour.parse::<u32>().ok()?, minute.parse::<u32>().ok()?)
                }
                Some(_) => return None,
                None => (body.parse::<u32>().ok()?, 0),
            };
            if !(1..=12).contains(&hour) {
                return None;
            }
            let hour = match (hour, is_pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            NaiveTime::from_hms_opt(hour, minute, 0)
        }
        None => NaiveTime::parse_from_str(body, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(body, "%H:%M"))
            .ok(),
    }
}

/// Clock time from the remaining tokens, or `default` when there are none.
fn clock_or(rest: &[&str], default: NaiveTime) -> Option<NaiveTime> {
    if rest.is_empty() {
        Some(default)
    } else {
        parse_clock(&rest.concat())
    }
}

/// "2025-07-21 18:30", "21/07/2025". Explicit dates are taken as written.
fn parse_absolute(tokens: &[&str]) -> Option<NaiveDateTime> {
    let (first, rest) = tokens.split_first()?;
    let date = NaiveDate::parse_from_str(first, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(first, "%d/%m/%Y"))
        .ok()?;
    let time = clock_or(rest, default_day_time())?;
    Some(date.and_time(time))
}

fn parse_day_word(tokens: &[&str], local: NaiveDateTime) -> Option<NaiveDateTime> {
    let (first, rest) = tokens.split_first()?;
    let today = local.date();
    let (date, default) = match *first {
        "today" => (today, default_day_time()),
        "tonight" => (today, default_evening_time()),
        "tomorrow" => (today.succ_opt()?, default_day_time()),
        _ => return None,
    };
    Some(date.and_time(clock_or(rest, default)?))
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "weds" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// "friday 5pm", "next monday". A weekday always means the next time that
/// day and hour come around; "next" additionally skips today.
fn parse_weekday(tokens: &[&str], local: NaiveDateTime) -> Option<NaiveDateTime> {
    let (skip_today, tokens) = match tokens {
        ["next", rest @ ..] => (true, rest),
        _ => (false, tokens),
    };
    let (first, rest) = tokens.split_first()?;
    let weekday = parse_weekday_name(first)?;
    let time = clock_or(rest, default_day_time())?;

    let today = local.date();
    let days_ahead = (7 + weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    let mut candidate = (today + Duration::days(days_ahead)).and_time(time);
    if candidate <= local || (skip_today && days_ahead == 0) {
        candidate += Duration::days(7);
    }
    Some(candidate)
}

/// "17:00", "5pm". A time that already passed today means tomorrow.
fn parse_bare_clock(tokens: &[&str], local: NaiveDateTime) -> Option<NaiveDateTime> {
    let time = parse_clock(&tokens.concat())?;
    let mut candidate = local.date().and_time(time);
    if candidate <= local {
        candidate += Duration::days(1);
    }
    Some(candidate)
}
