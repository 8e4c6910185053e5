//! C-style printf formatting.
//!
//! One engine backs `printf`, `sprintf` and the CONVFMT/OFMT number
//! conversions. Supported: flags `- + space # 0`, width (or `*`),
//! precision (`.n` or `.*`), conversions `d i o u x X e E f F g G c s %`.

use crate::value::Value;

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    hash: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Convert a number to its string form under a conversion format.
/// Integral values print as plain decimal integers, everything else goes
/// through the format (normally `%.6g`).
pub fn format_number(n: f64, convfmt: &str) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return format!("{}", n as i64);
    }
    sprintf(convfmt, &[Value::Number(n)], "%.6g")
}

/// Render a printf format string against its arguments. `convfmt` is the
/// current CONVFMT, used when `%s` has to stringify a number.
pub fn sprintf(format: &str, args: &[Value], convfmt: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars().peekable();
    let mut arg_idx = 0;

    let next_arg = |idx: &mut usize| -> Value {
        let v = args.get(*idx).cloned().unwrap_or(Value::Uninitialized);
        *idx += 1;
        v
    };

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();

        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.hash = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }

        if chars.peek() == Some(&'*') {
            chars.next();
            let w = next_arg(&mut arg_idx).to_number() as i64;
            if w < 0 {
                // Negative dynamic width means left alignment in C
                spec.minus = true;
                spec.width = Some(w.unsigned_abs() as usize);
            } else {
                spec.width = Some(w as usize);
            }
        } else {
            let mut width = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    width.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            spec.width = width.parse().ok();
        }

        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                let p = next_arg(&mut arg_idx).to_number() as i64;
                spec.precision = if p < 0 { None } else { Some(p as usize) };
            } else {
                let mut prec = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        prec.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                spec.precision = Some(prec.parse().unwrap_or(0));
            }
        }

        let Some(conv) = chars.next() else {
            out.push('%');
            break;
        };

        let arg = next_arg(&mut arg_idx);
        out.push_str(&format_one(conv, &spec, &arg, convfmt));
    }

    out
}

fn format_one(conv: char, spec: &Spec, arg: &Value, convfmt: &str) -> String {
    match conv {
        'd' | 'i' => {
            let n = arg.to_number();
            let v = if n.is_finite() { n.trunc() as i64 } else { 0 };
            format_int(v.unsigned_abs(), v < 0, 10, false, spec, "")
        }
        'u' => {
            let v = to_unsigned(arg.to_number());
            format_int(v, false, 10, false, spec, "")
        }
        'o' => {
            let v = to_unsigned(arg.to_number());
            let prefix = if spec.hash && v != 0 { "0" } else { "" };
            format_int(v, false, 8, false, spec, prefix)
        }
        'x' => {
            let v = to_unsigned(arg.to_number());
            let prefix = if spec.hash && v != 0 { "0x" } else { "" };
            format_int(v, false, 16, false, spec, prefix)
        }
        'X' => {
            let v = to_unsigned(arg.to_number());
            let prefix = if spec.hash && v != 0 { "0X" } else { "" };
            format_int(v, false, 16, true, spec, prefix)
        }
        'e' | 'E' | 'f' | 'F' | 'g' | 'G' => {
            let v = arg.to_number();
            let body = format_float(conv, v, spec.precision);
            finish_number(body, spec)
        }
        'c' => {
            let s = match arg {
                Value::Number(n) => char::from_u32(*n as u32)
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                other => {
                    let s = other.to_string_with(convfmt);
                    s.chars().next().map(|c| c.to_string()).unwrap_or_default()
                }
            };
            pad(s, spec.width, spec.minus, false)
        }
        's' => {
            let s = arg.to_string_with(convfmt);
            let s: String = match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            };
            pad(s, spec.width, spec.minus, false)
        }
        other => other.to_string(),
    }
}

fn to_unsigned(n: f64) -> u64 {
    if n.is_finite() {
        n.trunc() as i64 as u64
    } else {
        0
    }
}

fn format_int(
    magnitude: u64,
    negative: bool,
    radix: u32,
    upper: bool,
    spec: &Spec,
    prefix: &str,
) -> String {
    let mut digits = match radix {
        8 => format!("{:o}", magnitude),
        16 => format!("{:x}", magnitude),
        _ => format!("{}", magnitude),
    };
    if upper {
        digits = digits.to_uppercase();
    }
    // Precision on integers is a minimum digit count
    if let Some(p) = spec.precision {
        while digits.len() < p {
            digits.insert(0, '0');
        }
    }
    let sign = if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    let body = format!("{}{}{}", sign, prefix, digits);
    // Zero-padding is suppressed when a precision is given (C rule)
    let zero = spec.zero && spec.precision.is_none();
    pad_numeric(body, sign.len() + prefix.len(), spec.width, spec.minus, zero)
}

fn finish_number(body: String, spec: &Spec) -> String {
    let mut s = body;
    if !s.starts_with('-') {
        if spec.plus {
            s.insert(0, '+');
        } else if spec.space {
            s.insert(0, ' ');
        }
    }
    let sign_len = usize::from(s.starts_with(['-', '+', ' ']));
    let zero = spec.zero && s.chars().any(|c| c.is_ascii_digit());
    pad_numeric(s, sign_len, spec.width, spec.minus, zero)
}

fn format_float(conv: char, v: f64, precision: Option<usize>) -> String {
    if v.is_nan() {
        return if conv.is_uppercase() { "NAN" } else { "nan" }.to_string();
    }
    if v.is_infinite() {
        let s = if v > 0.0 { "inf" } else { "-inf" };
        return if conv.is_uppercase() {
            s.to_uppercase()
        } else {
            s.to_string()
        };
    }

    let p = precision.unwrap_or(6);
    match conv {
        'f' | 'F' => format!("{:.*}", p, v),
        'e' | 'E' => format_sci(v, p, conv == 'E'),
        _ => format_g(v, p, conv == 'G'),
    }
}

/// %e: mantissa with fixed precision, sign and at least two exponent digits
fn format_sci(v: f64, precision: usize, upper: bool) -> String {
    let s = format!("{:.*e}", precision, v);
    let (mantissa, exp) = split_exponent(&s);
    format!(
        "{}{}{}",
        mantissa,
        if upper { 'E' } else { 'e' },
        format_exponent(exp)
    )
}

/// %g: %e or %f depending on the decimal exponent, trailing zeros removed
fn format_g(v: f64, precision: usize, upper: bool) -> String {
    let p = precision.max(1);
    if v == 0.0 {
        return "0".to_string();
    }

    let rounded = format!("{:.*e}", p - 1, v);
    let (mantissa, exp) = split_exponent(&rounded);

    if exp < -4 || exp >= p as i32 {
        let m = strip_trailing_zeros(mantissa);
        format!(
            "{}{}{}",
            m,
            if upper { 'E' } else { 'e' },
            format_exponent(exp)
        )
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, v))
    }
}

fn split_exponent(s: &str) -> (&str, i32) {
    match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], s[pos + 1..].parse().unwrap_or(0)),
        None => (s, 0),
    }
}

fn format_exponent(exp: i32) -> String {
    format!("{}{:02}", if exp < 0 { '-' } else { '+' }, exp.abs())
}

fn strip_trailing_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn pad(s: String, width: Option<usize>, left: bool, _zero: bool) -> String {
    let Some(w) = width else { return s };
    let len = s.chars().count();
    if len >= w {
        return s;
    }
    let fill: String = " ".repeat(w - len);
    if left {
        format!("{}{}", s, fill)
    } else {
        format!("{}{}", fill, s)
    }
}

/// Right-align with zeros inserted after any sign/prefix
fn pad_numeric(s: String, prefix_len: usize, width: Option<usize>, left: bool, zero: bool) -> String {
    let Some(w) = width else { return s };
    let len = s.chars().count();
    if len >= w {
        return s;
    }
    if left {
        let fill = " ".repeat(w - len);
        return format!("{}{}", s, fill);
    }
    if zero {
        let fill = "0".repeat(w - len);
        let split = s
            .char_indices()
            .nth(prefix_len)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        return format!("{}{}{}", &s[..split], fill, &s[split..]);
    }
    let fill = " ".repeat(w - len);
    format!("{}{}", fill, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: &str, args: &[Value]) -> String {
        sprintf(format, args, "%.6g")
    }

    #[test]
    fn test_plain_text_and_percent() {
        assert_eq!(fmt("hello %% world", &[]), "hello % world");
    }

    #[test]
    fn test_integers() {
        assert_eq!(fmt("%d", &[Value::Number(42.0)]), "42");
        assert_eq!(fmt("%d", &[Value::Number(-7.9)]), "-7");
        assert_eq!(fmt("%5d", &[Value::Number(42.0)]), "   42");
        assert_eq!(fmt("%-5d|", &[Value::Number(42.0)]), "42   |");
        assert_eq!(fmt("%05d", &[Value::Number(42.0)]), "00042");
        assert_eq!(fmt("%05d", &[Value::Number(-42.0)]), "-0042");
        assert_eq!(fmt("%+d", &[Value::Number(42.0)]), "+42");
        assert_eq!(fmt("%.4d", &[Value::Number(42.0)]), "0042");
    }

    #[test]
    fn test_bases() {
        assert_eq!(fmt("%o", &[Value::Number(8.0)]), "10");
        assert_eq!(fmt("%x", &[Value::Number(255.0)]), "ff");
        assert_eq!(fmt("%X", &[Value::Number(255.0)]), "FF");
        assert_eq!(fmt("%#x", &[Value::Number(255.0)]), "0xff");
        assert_eq!(fmt("%u", &[Value::Number(7.0)]), "7");
    }

    #[test]
    fn test_strings() {
        assert_eq!(fmt("%s", &[Value::str("abc")]), "abc");
        assert_eq!(fmt("%5s", &[Value::str("ab")]), "   ab");
        assert_eq!(fmt("%-5s|", &[Value::str("ab")]), "ab   |");
        assert_eq!(fmt("%.2s", &[Value::str("abcdef")]), "ab");
        assert_eq!(fmt("%s", &[Value::Number(3.0)]), "3");
        assert_eq!(fmt("%s", &[Value::Number(3.25)]), "3.25");
    }

    #[test]
    fn test_char() {
        assert_eq!(fmt("%c", &[Value::Number(65.0)]), "A");
        assert_eq!(fmt("%c", &[Value::str("xyz")]), "x");
    }

    #[test]
    fn test_float() {
        assert_eq!(fmt("%f", &[Value::Number(3.5)]), "3.500000");
        assert_eq!(fmt("%.2f", &[Value::Number(3.14159)]), "3.14");
        assert_eq!(fmt("%8.2f", &[Value::Number(3.14159)]), "    3.14");
        assert_eq!(fmt("%-8.2f|", &[Value::Number(3.14159)]), "3.14    |");
        assert_eq!(fmt("%08.2f", &[Value::Number(-3.14159)]), "-0003.14");
    }

    #[test]
    fn test_scientific() {
        assert_eq!(fmt("%e", &[Value::Number(1500.0)]), "1.500000e+03");
        assert_eq!(fmt("%.2e", &[Value::Number(0.00015)]), "1.50e-04");
        assert_eq!(fmt("%E", &[Value::Number(1500.0)]), "1.500000E+03");
    }

    #[test]
    fn test_general() {
        assert_eq!(fmt("%g", &[Value::Number(0.0001)]), "0.0001");
        assert_eq!(fmt("%g", &[Value::Number(0.00001)]), "1e-05");
        assert_eq!(fmt("%g", &[Value::Number(123456.0)]), "123456");
        assert_eq!(fmt("%g", &[Value::Number(1234567.0)]), "1.23457e+06");
        assert_eq!(fmt("%g", &[Value::Number(3.14159265)]), "3.14159");
    }

    #[test]
    fn test_dynamic_width_and_precision() {
        assert_eq!(
            fmt("%*d", &[Value::Number(5.0), Value::Number(42.0)]),
            "   42"
        );
        assert_eq!(
            fmt("%.*f", &[Value::Number(2.0), Value::Number(3.14159)]),
            "3.14"
        );
        assert_eq!(
            fmt("%*d", &[Value::Number(-5.0), Value::Number(42.0)]),
            "42   "
        );
    }

    #[test]
    fn test_missing_args_are_empty() {
        assert_eq!(fmt("%s|%d", &[]), "|0");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0, "%.6g"), "42");
        assert_eq!(format_number(-3.0, "%.6g"), "-3");
        assert_eq!(format_number(3.25, "%.6g"), "3.25");
        assert_eq!(format_number(1.0 / 3.0, "%.6g"), "0.333333");
        assert_eq!(format_number(f64::INFINITY, "%.6g"), "inf");
        assert_eq!(format_number(0.1 + 0.2, "%.6g"), "0.3");
    }
}
