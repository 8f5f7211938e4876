/// Price/cash scale: micros (1e-6).
pub const MICROS_SCALE: i64 = 1_000_000;

/// Parse a decimal price string (e.g. `"167.45"`) into micros without going
/// through floating point.
///
/// Digits beyond the sixth decimal place are truncated. Returns `None` for
/// anything that is not a plain decimal number.
pub fn parse_price_micros(s: &str) -> Option<i64> {
    let t = s.trim();
    let (negative, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    if body.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };

    let mut frac: i64 = 0;
    for (i, b) in frac_part.bytes().take(6).enumerate() {
        frac += i64::from(b - b'0') * 10_i64.pow(5 - i as u32);
    }

    let micros = whole.checked_mul(MICROS_SCALE)?.checked_add(frac)?;
    Some(if negative { -micros } else { micros })
}

/// Render micros as a trimmed decimal string (`167_450_000` -> `"167.45"`).
pub fn format_micros(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let whole = abs / MICROS_SCALE as u64;
    let frac = abs % MICROS_SCALE as u64;
    if frac == 0 {
        return format!("{sign}{whole}");
    }
    let frac_s = format!("{frac:06}");
    format!("{sign}{whole}.{}", frac_s.trim_end_matches('0'))
}
