use log::{error, trace};

const DELIMITERS: [char; 6] = [' ', ',', '.', ';', ':', '/'];

/// Parses durations such as `1d5h`, `2h 30m` or `,,1d:5h` into seconds.
///
/// Each group is `<digits><unit>` with unit one of `s m h d w`; a trailing
/// bare number takes `default_unit`. Unknown units are logged and skipped.
pub fn parse_seconds(input: &str, default_unit: char) -> u32 {
    let mut total: u32 = 0;
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|ch| DELIMITERS.contains(ch)).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut number: u32 = 0;
        while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
            number = number.saturating_mul(10).saturating_add(digit);
            chars.next();
        }

        let unit = chars.next().unwrap_or(default_unit);
        match unit_seconds(unit) {
            Some(scale) => total = total.saturating_add(number.saturating_mul(scale)),
            None => error!("duration: unknown unit '{}' in '{}'", unit, input),
        }
    }

    trace!("duration: '{}' -> {} seconds", input, total);
    total
}

pub fn parse_millis(input: &str, default_unit: char) -> u32 {
    parse_seconds(input, default_unit).saturating_mul(1_000)
}

const fn unit_seconds(unit: char) -> Option<u32> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(60 * 60),
        'd' => Some(60 * 60 * 24),
        'w' => Some(60 * 60 * 24 * 7),
        _ => None,
    }
}
