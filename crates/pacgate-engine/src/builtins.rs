//! PAC helper functions exposed to documents
//!
//! Netscape's classic set plus the Microsoft `*Ex` IPv6 extensions.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use boa_engine::{js_string, Context, JsResult, JsString, JsValue, NativeFunction};
use chrono::{DateTime, Datelike, Local, Timelike, Utc, Weekday};

/// Global property holding the value `myIpAddress()` returns
pub(crate) const CLIENT_ADDRESS_GLOBAL: &str = "__pacgate_client_address";

const DEFAULT_CLIENT_ADDRESS: &str = "127.0.0.1";

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];
const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

type Builtin = fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>;

const BUILTINS: &[(&str, usize, Builtin)] = &[
    ("isPlainHostName", 1, is_plain_host_name),
    ("dnsDomainIs", 2, dns_domain_is),
    ("localHostOrDomainIs", 2, local_host_or_domain_is),
    ("isResolvable", 1, is_resolvable),
    ("isResolvableEx", 1, is_resolvable_ex),
    ("dnsResolve", 1, dns_resolve),
    ("dnsResolveEx", 1, dns_resolve_ex),
    ("isInNet", 3, is_in_net),
    ("dnsDomainLevels", 1, dns_domain_levels),
    ("shExpMatch", 2, sh_exp_match),
    ("myIpAddress", 0, my_ip_address),
    ("myIpAddressEx", 0, my_ip_address),
    ("weekdayRange", 3, weekday_range),
    ("dateRange", 7, date_range),
    ("timeRange", 7, time_range),
];

pub(crate) fn register(context: &mut Context) -> JsResult<()> {
    for (name, length, body) in BUILTINS {
        context.register_global_callable(
            JsString::from(*name),
            *length,
            NativeFunction::from_fn_ptr(*body),
        )?;
    }

    let global = context.global_object();
    global.set(
        js_string!(CLIENT_ADDRESS_GLOBAL),
        js_string!(DEFAULT_CLIENT_ADDRESS),
        false,
        context,
    )?;

    Ok(())
}

/// Argument `index` coerced with JS `String()` semantics; empty when absent
fn string_arg(args: &[JsValue], index: usize, ctx: &mut Context) -> JsResult<String> {
    match args.get(index) {
        Some(value) => Ok(value.to_string(ctx)?.to_std_string_escaped()),
        None => Ok(String::new()),
    }
}

fn string_value(value: impl Into<String>) -> JsValue {
    JsValue::from(JsString::from(value.into()))
}

fn resolve(host: &str) -> Vec<IpAddr> {
    (host, 0)
        .to_socket_addrs()
        .map(|addrs| addrs.map(|addr| addr.ip()).collect())
        .unwrap_or_default()
}

fn resolve_ipv4(host: &str) -> Option<Ipv4Addr> {
    resolve(host).into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}

fn is_plain_host_name(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    Ok((!string_arg(args, 0, ctx)?.contains('.')).into())
}

fn dns_domain_is(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let domain = string_arg(args, 1, ctx)?;
    Ok(host.ends_with(&domain).into())
}

fn local_host_or_domain_is(
    _this: &JsValue,
    args: &[JsValue],
    ctx: &mut Context,
) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let fqdn = string_arg(args, 1, ctx)?;
    let is_match = host == fqdn || (!host.contains('.') && fqdn.starts_with(&format!("{host}.")));
    Ok(is_match.into())
}

fn is_resolvable(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    Ok(resolve_ipv4(&string_arg(args, 0, ctx)?).is_some().into())
}

fn is_resolvable_ex(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    Ok((!resolve(&string_arg(args, 0, ctx)?).is_empty()).into())
}

fn dns_resolve(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    Ok(resolve_ipv4(&string_arg(args, 0, ctx)?)
        .map(|ip| string_value(ip.to_string()))
        .unwrap_or_else(JsValue::null))
}

/// All addresses, `;`-separated. Empty string when nothing resolves.
fn dns_resolve_ex(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let joined = resolve(&string_arg(args, 0, ctx)?)
        .iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join(";");
    Ok(string_value(joined))
}

fn is_in_net(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let host = string_arg(args, 0, ctx)?;
    let ip = match host.parse::<Ipv4Addr>() {
        Ok(ip) => Some(ip),
        Err(_) => resolve_ipv4(&host),
    };
    let net = string_arg(args, 1, ctx)?.parse::<Ipv4Addr>().ok();
    let mask = string_arg(args, 2, ctx)?.parse::<Ipv4Addr>().ok();

    if let (Some(ip), Some(net), Some(mask)) = (ip, net, mask) {
        let ip = u32::from(ip);
        let net = u32::from(net);
        let mask = u32::from(mask);
        Ok(((ip & mask) == (net & mask)).into())
    } else {
        Ok(false.into())
    }
}

fn dns_domain_levels(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let levels = string_arg(args, 0, ctx)?.matches('.').count() as i32;
    Ok(JsValue::from(levels))
}

fn sh_exp_match(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let text = string_arg(args, 0, ctx)?;
    let pattern = string_arg(args, 1, ctx)?;
    Ok(glob_match(&text, &pattern).into())
}

/// Shell-style match: `*` is any run, `?` is one character, nothing else is special.
fn glob_match(text: &str, pattern: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');

    regex::Regex::new(&expr)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

fn my_ip_address(_this: &JsValue, _args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let global = ctx.global_object();
    global.get(js_string!(CLIENT_ADDRESS_GLOBAL), ctx)
}

/// Split a trailing `"GMT"` argument off the list
fn split_gmt(args: &[JsValue]) -> (&[JsValue], bool) {
    match args.last().and_then(|v| v.as_string()) {
        Some(s) if s.to_std_string().is_ok_and(|s| s.eq_ignore_ascii_case("GMT")) => {
            (&args[..args.len() - 1], true)
        }
        _ => (args, false),
    }
}

fn now(gmt: bool) -> DateTime<Utc> {
    if gmt {
        Utc::now()
    } else {
        // Local wall-clock fields, carried in a Utc value for uniform handling
        Local::now().naive_local().and_utc()
    }
}

/// `start..=end`, wrapping when `start > end` (e.g. FRI..MON)
fn in_wrapping_range<T: PartialOrd>(value: T, start: T, end: T) -> bool {
    if start <= end {
        value >= start && value <= end
    } else {
        value >= start || value <= end
    }
}

fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_sunday() as usize
}

fn weekday_range(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let (args, gmt) = split_gmt(args);
    let today = weekday_index(now(gmt).weekday());

    let mut days = Vec::with_capacity(args.len());
    for value in args {
        let name = value.to_string(ctx)?.to_std_string_escaped().to_uppercase();
        days.push(WEEKDAYS.iter().position(|d| *d == name));
    }

    let result = match days.as_slice() {
        [day] => *day == Some(today),
        [start, end] => match (*start, *end) {
            (Some(start), Some(end)) => in_wrapping_range(today, start, end),
            _ => false,
        },
        _ => false,
    };

    Ok(result.into())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DatePart {
    Day(u32),
    Month(u32),
    Year(i32),
}

fn date_part(value: &JsValue) -> Option<DatePart> {
    if let Some(s) = value.as_string() {
        let name = s.to_std_string().ok()?.to_uppercase();
        return MONTHS
            .iter()
            .position(|m| *m == name)
            .map(|i| DatePart::Month(i as u32 + 1));
    }

    let n = value.as_number()?;
    if n.fract() != 0.0 {
        None
    } else if (1.0..=31.0).contains(&n) {
        Some(DatePart::Day(n as u32))
    } else if (1000.0..=9999.0).contains(&n) {
        Some(DatePart::Year(n as i32))
    } else {
        None
    }
}

/// Whole number in `0..=max`. NaN, infinities, fractions and negatives are rejected.
fn clock_field(value: &JsValue, max: u32) -> Option<u32> {
    let n = value.as_number()?;
    if n.fract() == 0.0 && (0.0..=f64::from(max)).contains(&n) {
        Some(n as u32)
    } else {
        None
    }
}

/// Comparable key built from the parts present in `parts`, most significant first
fn date_key(parts: &[DatePart]) -> (Option<i32>, Option<u32>, Option<u32>) {
    let mut key = (None, None, None);
    for part in parts {
        match *part {
            DatePart::Year(y) => key.0 = Some(y),
            DatePart::Month(m) => key.1 = Some(m),
            DatePart::Day(d) => key.2 = Some(d),
        }
    }
    key
}

fn date_range(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let (args, gmt) = split_gmt(args);
    let current = now(gmt);
    let parts: Option<Vec<DatePart>> = args.iter().map(date_part).collect();
    let Some(parts) = parts else {
        return Ok(false.into());
    };

    let result = match parts.len() {
        1 => match parts[0] {
            DatePart::Day(d) => current.day() == d,
            DatePart::Month(m) => current.month() == m,
            DatePart::Year(y) => current.year() == y,
        },
        2 | 4 | 6 => {
            let (start, end) = parts.split_at(parts.len() / 2);
            let start = date_key(start);
            let end = date_key(end);
            let today = (
                start.0.map(|_| current.year()),
                start.1.map(|_| current.month()),
                start.2.map(|_| current.day()),
            );
            in_wrapping_range(today, start, end)
        }
        _ => false,
    };

    Ok(result.into())
}

fn time_range(_this: &JsValue, args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let (args, gmt) = split_gmt(args);
    let current = now(gmt);
    // hour, minute, second limits by position for each accepted arity
    let limits: &[u32] = match args.len() {
        1 => &[23],
        2 => &[23, 23],
        4 => &[23, 59, 23, 59],
        6 => &[23, 59, 59, 23, 59, 59],
        _ => return Ok(false.into()),
    };
    let numbers: Option<Vec<u32>> = args
        .iter()
        .zip(limits)
        .map(|(v, max)| clock_field(v, *max))
        .collect();
    let Some(n) = numbers else {
        return Ok(false.into());
    };

    let seconds = current.hour() * 3600 + current.minute() * 60 + current.second();
    let result = match n.len() {
        1 => current.hour() == n[0],
        2 => in_wrapping_range(current.hour(), n[0], n[1]),
        4 => in_wrapping_range(seconds / 60, n[0] * 60 + n[1], n[2] * 60 + n[3]),
        6 => in_wrapping_range(
            seconds,
            n[0] * 3600 + n[1] * 60 + n[2],
            n[3] * 3600 + n[4] * 60 + n[5],
        ),
        _ => false,
    };

    Ok(result.into())
}
