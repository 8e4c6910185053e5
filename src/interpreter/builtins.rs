use regex::{Captures, Regex};

use crate::ast::{Expr, FunctionDef};
use crate::error::{Result, SourceLocation};
use crate::value::{ArrayRef, Value};

use super::stmt::Flow;
use super::{Interpreter, RunIo};

/// Every built-in function name, for FUNCTAB and dispatch.
pub(crate) const BUILTIN_NAMES: &[&str] = &[
    // math
    "sin", "cos", "atan2", "exp", "log", "sqrt", "int", "rand", "srand", "atan", "tan", "asin",
    "acos", "sinh", "cosh", "tanh", "log10", "log2", "ceil", "floor", "round", "abs", "fmod",
    "pow", "min", "max",
    // string
    "length", "substr", "index", "tolower", "toupper", "sprintf", "strtonum", "ord", "chr",
    "sub", "gsub", "gensub", "split", "patsplit", "match", "asort", "asorti",
    // io
    "system", "close", "fflush",
    // time
    "systime", "mktime", "strftime",
    // bit
    "and", "or", "xor", "lshift", "rshift", "compl",
    // type
    "typeof", "isarray", "mkbool",
    // i18n
    "dcgettext", "dcngettext", "bindtextdomain",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

impl<'p> Interpreter<'p> {
    /// Dispatch a call: a builtin under its qualified or unqualified
    /// spelling first, then a user function. An unknown name is a
    /// recoverable runtime error.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        args: &'p [Expr],
        _location: SourceLocation,
        io: &mut RunIo,
    ) -> Result<Value> {
        let builtin = if is_builtin(name) {
            Some(name)
        } else {
            match name.rfind("::") {
                Some(pos) if is_builtin(&name[pos + 2..]) => Some(&name[pos + 2..]),
                _ => None,
            }
        };

        if let Some(base) = builtin {
            return self.call_builtin(base, args, io);
        }

        if let Some(func) = self.env.function(name) {
            return self.call_user_function(func, args, io);
        }

        eprintln!("awk: calling undefined function {}", name);
        Ok(Value::Uninitialized)
    }

    /// User call: bind formals in a fresh scope (missing arguments stay
    /// uninitialized, extra formals act as locals). Array values bind by
    /// shared handle, so the callee mutates the caller's array.
    fn call_user_function(
        &mut self,
        func: &'p FunctionDef,
        args: &'p [Expr],
        io: &mut RunIo,
    ) -> Result<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, io)?);
            if self.pending_signal.is_some() {
                return Ok(Value::Uninitialized);
            }
        }

        self.env.push_scope();
        for (i, param) in func.params.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or(Value::Uninitialized);
            self.env.define_local(param, value);
        }

        let flow = self.execute_block(&func.body, io);
        self.env.pop_scope();

        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Uninitialized),
            signal @ (Flow::Exit(_) | Flow::Next | Flow::Nextfile) => {
                // Raised inside the function; hand it to the statement
                // layer of the caller
                self.pending_signal = Some(signal);
                Ok(Value::Uninitialized)
            }
            Flow::Break | Flow::Continue => {
                eprintln!("awk: break or continue outside a loop");
                Ok(Value::Uninitialized)
            }
        }
    }

    fn call_builtin(&mut self, name: &str, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        // These need their arguments unevaluated (lvalues, array names,
        // regex literals)
        match name {
            "sub" => return self.builtin_sub(false, args, io),
            "gsub" => return self.builtin_sub(true, args, io),
            "gensub" => return self.builtin_gensub(args, io),
            "match" => return self.builtin_match(args, io),
            "split" => return self.builtin_split(args, io),
            "patsplit" => return self.builtin_patsplit(args, io),
            "asort" => return self.builtin_asort(args, false, io),
            "asorti" => return self.builtin_asort(args, true, io),
            _ => {}
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, io)?);
            if self.pending_signal.is_some() {
                return Ok(Value::Uninitialized);
            }
        }

        self.builtin_with_values(name, &values, io)
    }

    fn builtin_with_values(
        &mut self,
        name: &str,
        args: &[Value],
        io: &mut RunIo,
    ) -> Result<Value> {
        let convfmt = self.convfmt();
        let arg_str =
            |i: usize| -> String { args.get(i).map(|v| v.to_string_with(&convfmt)).unwrap_or_default() };
        let arg_num = |i: usize| -> f64 { args.get(i).map(Value::to_number).unwrap_or(0.0) };

        let result = match name {
            // ---------------- string ----------------
            "length" => {
                if args.is_empty() {
                    Value::num(self.record_text()?.chars().count() as f64)
                } else if let Some(handle) = args[0].array() {
                    Value::num(handle.borrow().len() as f64)
                } else {
                    Value::num(arg_str(0).chars().count() as f64)
                }
            }

            "substr" => {
                let s = arg_str(0);
                let start = (arg_num(1).trunc() as i64).max(1) as usize;
                if args.len() > 2 {
                    let n = arg_num(2).trunc() as i64;
                    if n <= 0 {
                        Value::str("")
                    } else {
                        Value::str(
                            s.chars()
                                .skip(start - 1)
                                .take(n as usize)
                                .collect::<String>(),
                        )
                    }
                } else {
                    Value::str(s.chars().skip(start - 1).collect::<String>())
                }
            }

            "index" => {
                let s = arg_str(0);
                let needle = arg_str(1);
                let pos = s
                    .find(&needle)
                    .map(|byte_idx| s[..byte_idx].chars().count() + 1)
                    .unwrap_or(0);
                Value::num(pos as f64)
            }

            "tolower" => Value::str(arg_str(0).to_lowercase()),
            "toupper" => Value::str(arg_str(0).to_uppercase()),

            "sprintf" => {
                let format = arg_str(0);
                let rest = if args.len() > 1 { &args[1..] } else { &[] };
                Value::str(crate::printf::sprintf(&format, rest, &convfmt))
            }

            "strtonum" => Value::num(strtonum(&arg_str(0))),

            "ord" => {
                let s = arg_str(0);
                Value::num(s.bytes().next().map(f64::from).unwrap_or(0.0))
            }

            "chr" => {
                let code = arg_num(0) as i64;
                if (0..=255).contains(&code) {
                    Value::str((code as u8 as char).to_string())
                } else {
                    Value::str("")
                }
            }

            // ---------------- math ----------------
            "sin" => Value::num(arg_num(0).sin()),
            "cos" => Value::num(arg_num(0).cos()),
            "atan2" => Value::num(arg_num(0).atan2(arg_num(1))),
            "exp" => Value::num(arg_num(0).exp()),
            "log" => Value::num(arg_num(0).ln()),
            "sqrt" => Value::num(arg_num(0).sqrt()),
            "int" => Value::num(arg_num(0).trunc()),
            "atan" => Value::num(arg_num(0).atan()),
            "tan" => Value::num(arg_num(0).tan()),
            "asin" => Value::num(arg_num(0).asin()),
            "acos" => Value::num(arg_num(0).acos()),
            "sinh" => Value::num(arg_num(0).sinh()),
            "cosh" => Value::num(arg_num(0).cosh()),
            "tanh" => Value::num(arg_num(0).tanh()),
            "log10" => Value::num(arg_num(0).log10()),
            "log2" => Value::num(arg_num(0).log2()),
            "ceil" => Value::num(arg_num(0).ceil()),
            "floor" => Value::num(arg_num(0).floor()),
            "round" => Value::num(arg_num(0).round()),
            "abs" => Value::num(arg_num(0).abs()),
            "fmod" => Value::num(arg_num(0) % arg_num(1)),
            "pow" => Value::num(arg_num(0).powf(arg_num(1))),
            "min" => {
                let mut result = arg_num(0);
                for v in args.iter().skip(1) {
                    result = result.min(v.to_number());
                }
                Value::num(result)
            }
            "max" => {
                let mut result = arg_num(0);
                for v in args.iter().skip(1) {
                    result = result.max(v.to_number());
                }
                Value::num(result)
            }

            "rand" => Value::num(self.next_random()),
            "srand" => {
                let seed = args.first().map(|v| v.to_number() as u64);
                Value::num(self.reseed(seed) as f64)
            }

            // ---------------- io ----------------
            "system" => {
                let cmd = arg_str(0);
                Value::num(self.run_system(&cmd, io))
            }
            "close" => {
                let target = arg_str(0);
                Value::num(self.close_stream(&target))
            }
            "fflush" => {
                if args.is_empty() {
                    Value::num(self.flush_stream(None, io))
                } else {
                    let target = arg_str(0);
                    Value::num(self.flush_stream(Some(&target), io))
                }
            }

            // ---------------- time ----------------
            "systime" => {
                let secs = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                Value::num(secs as f64)
            }

            "mktime" => {
                let spec = arg_str(0);
                let parts: Vec<i64> = spec
                    .split_whitespace()
                    .filter_map(|s| s.parse().ok())
                    .collect();
                if parts.len() >= 6 {
                    Value::num(epoch_from_civil(
                        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5],
                    ) as f64)
                } else {
                    Value::num(-1.0)
                }
            }

            "strftime" => {
                let format = if args.is_empty() {
                    "%a %b %e %H:%M:%S %Z %Y".to_string()
                } else {
                    arg_str(0)
                };
                let timestamp = if args.len() > 1 {
                    arg_num(1) as i64
                } else {
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .map(|d| d.as_secs() as i64)
                        .unwrap_or(0)
                };
                Value::str(strftime_format(&format, timestamp))
            }

            // ---------------- bit ----------------
            "and" => Value::num(((arg_num(0) as i64 as u64) & (arg_num(1) as i64 as u64)) as f64),
            "or" => Value::num(((arg_num(0) as i64 as u64) | (arg_num(1) as i64 as u64)) as f64),
            "xor" => Value::num(((arg_num(0) as i64 as u64) ^ (arg_num(1) as i64 as u64)) as f64),
            "lshift" => {
                let shifted = (arg_num(0) as i64 as u64) << (arg_num(1) as u32 % 64);
                Value::num(shifted as f64)
            }
            "rshift" => {
                let shifted = (arg_num(0) as i64 as u64) >> (arg_num(1) as u32 % 64);
                Value::num(shifted as f64)
            }
            "compl" => Value::num(!(arg_num(0) as i64 as u64) as f64),

            // ---------------- type ----------------
            "typeof" => Value::str(
                args.first()
                    .map(Value::type_name)
                    .unwrap_or("unassigned"),
            ),
            "isarray" => Value::from_bool(args.first().map(Value::is_array).unwrap_or(false)),
            "mkbool" => Value::from_bool(args.first().map(Value::is_truthy).unwrap_or(false)),

            // ---------------- i18n ----------------
            "dcgettext" => {
                let msgid = arg_str(0);
                let domain = self.i18n_domain(args.get(1), &convfmt);
                let category = if args.len() > 2 {
                    arg_str(2)
                } else {
                    "LC_MESSAGES".to_string()
                };
                Value::str(self.i18n.dcgettext(&msgid, &domain, &category))
            }

            "dcngettext" => {
                if args.len() < 3 {
                    Value::str("")
                } else {
                    let singular = arg_str(0);
                    let plural = arg_str(1);
                    let n = arg_num(2).max(0.0) as u64;
                    let domain = self.i18n_domain(args.get(3), &convfmt);
                    let category = if args.len() > 4 {
                        arg_str(4)
                    } else {
                        "LC_MESSAGES".to_string()
                    };
                    Value::str(
                        self.i18n
                            .dcngettext(&singular, &plural, n, &domain, &category),
                    )
                }
            }

            "bindtextdomain" => {
                let directory = arg_str(0);
                let domain = self.i18n_domain(args.get(1), &convfmt);
                if directory.is_empty() {
                    Value::str(self.i18n.textdomain_directory(&domain))
                } else {
                    Value::str(self.i18n.bindtextdomain(&domain, &directory))
                }
            }

            other => {
                eprintln!("awk: calling undefined function {}", other);
                Value::Uninitialized
            }
        };

        Ok(result)
    }

    /// Domain argument with fall-back to TEXTDOMAIN
    fn i18n_domain(&mut self, arg: Option<&Value>, convfmt: &str) -> String {
        match arg {
            Some(v) => {
                let s = v.to_string_with(convfmt);
                if s.is_empty() {
                    self.env.get_global("TEXTDOMAIN").to_string_val()
                } else {
                    s
                }
            }
            None => self.env.get_global("TEXTDOMAIN").to_string_val(),
        }
    }

    /// Array argument: must be (or become) an array-valued name.
    fn array_handle_for(&mut self, expr: &'p Expr, who: &str) -> Option<ArrayRef> {
        match expr {
            Expr::Variable(name, _) => Some(self.env.array_handle(name)),
            _ => {
                eprintln!("awk: {}: argument is not an array", who);
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // sub / gsub / gensub
    // ------------------------------------------------------------------

    fn builtin_sub(&mut self, global: bool, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        let who = if global { "gsub" } else { "sub" };
        if args.len() < 2 {
            return Ok(Value::num(0.0));
        }

        let pattern = self.pattern_source(&args[0], io)?;
        let convfmt = self.convfmt();
        let replacement = self.eval_expr(&args[1], io)?.to_string_with(&convfmt);

        let target_expr = args.get(2);
        let target = match target_expr {
            Some(expr) => self.eval_expr(expr, io)?.to_string_with(&convfmt),
            None => self.record_text()?,
        };

        let re = match self.get_regex(&pattern) {
            Ok(re) => re,
            Err(e) => {
                eprintln!("awk: {}: invalid regex '{}': {}", who, pattern, e);
                return Ok(Value::num(0.0));
            }
        };

        let (result, count) = substitute(&re, &replacement, &target, global);

        if count > 0 {
            match target_expr {
                Some(expr) => self.assign_to_lvalue(expr, Value::str(result), io)?,
                None => self.set_record(result)?,
            }
        }

        Ok(Value::num(count as f64))
    }

    fn builtin_gensub(&mut self, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        if args.len() < 3 {
            return Ok(Value::str(""));
        }

        let pattern = self.pattern_source(&args[0], io)?;
        let convfmt = self.convfmt();
        let replacement = self.eval_expr(&args[1], io)?.to_string_with(&convfmt);
        let how = self.eval_expr(&args[2], io)?.to_string_with(&convfmt);

        let target = match args.get(3) {
            Some(expr) => self.eval_expr(expr, io)?.to_string_with(&convfmt),
            None => self.record_text()?,
        };

        let re = match self.get_regex(&pattern) {
            Ok(re) => re,
            Err(e) => {
                eprintln!("awk: gensub: invalid regex '{}': {}", pattern, e);
                return Ok(Value::str(target));
            }
        };

        let all = how.eq_ignore_ascii_case("g");
        let which = if all {
            0
        } else {
            let n = crate::value::parse_leading_number(&how) as i64;
            n.max(1) as usize
        };

        let mut out = String::with_capacity(target.len());
        let mut last = 0;
        let mut count = 0usize;
        for caps in re.captures_iter(&target) {
            let m = caps.get(0).unwrap();
            count += 1;
            if all || count == which {
                out.push_str(&target[last..m.start()]);
                out.push_str(&expand_gensub(&replacement, &caps));
                last = m.end();
                if !all {
                    break;
                }
            }
        }
        out.push_str(&target[last..]);

        Ok(Value::str(out))
    }

    // ------------------------------------------------------------------
    // match / split / patsplit
    // ------------------------------------------------------------------

    fn builtin_match(&mut self, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        if args.len() < 2 {
            return Ok(Value::num(0.0));
        }

        let convfmt = self.convfmt();
        let text = self.eval_expr(&args[0], io)?.to_string_with(&convfmt);
        let pattern = self.pattern_source(&args[1], io)?;

        let re = match self.get_regex(&pattern) {
            Ok(re) => re,
            Err(e) => {
                eprintln!("awk: match: invalid regex '{}': {}", pattern, e);
                self.set_variable("RSTART", Value::num(0.0))?;
                self.set_variable("RLENGTH", Value::num(-1.0))?;
                return Ok(Value::num(0.0));
            }
        };

        match re.captures(&text) {
            Some(caps) => {
                let m = caps.get(0).unwrap();
                let start = text[..m.start()].chars().count() + 1;
                let length = m.as_str().chars().count();
                self.set_variable("RSTART", Value::num(start as f64))?;
                self.set_variable("RLENGTH", Value::num(length as f64))?;

                if let Some(arr_expr) = args.get(2) {
                    if let Some(handle) = self.array_handle_for(arr_expr, "match") {
                        let mut map = handle.borrow_mut();
                        map.clear();
                        for (i, group) in caps.iter().enumerate() {
                            let text = group.map(|g| g.as_str()).unwrap_or("");
                            map.insert(i.to_string(), Value::from_input(text.to_string()));
                        }
                    }
                }

                Ok(Value::num(start as f64))
            }
            None => {
                self.set_variable("RSTART", Value::num(0.0))?;
                self.set_variable("RLENGTH", Value::num(-1.0))?;
                if let Some(arr_expr) = args.get(2) {
                    if let Some(handle) = self.array_handle_for(arr_expr, "match") {
                        handle.borrow_mut().clear();
                    }
                }
                Ok(Value::num(0.0))
            }
        }
    }

    fn builtin_split(&mut self, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        if args.len() < 2 {
            return Ok(Value::num(0.0));
        }

        let convfmt = self.convfmt();
        let text = self.eval_expr(&args[0], io)?.to_string_with(&convfmt);

        let Some(handle) = self.array_handle_for(&args[1], "split") else {
            return Ok(Value::num(0.0));
        };

        let sep = match args.get(2) {
            Some(expr) => self.pattern_source(expr, io)?,
            None => self.fs(),
        };

        let mut parts = Vec::new();
        self.split_simple(&text, &sep, &mut parts);

        let mut map = handle.borrow_mut();
        map.clear();
        for (i, part) in parts.iter().enumerate() {
            map.insert((i + 1).to_string(), Value::from_input(part.clone()));
        }

        Ok(Value::num(parts.len() as f64))
    }

    fn builtin_patsplit(&mut self, args: &'p [Expr], io: &mut RunIo) -> Result<Value> {
        if args.len() < 3 {
            return Ok(Value::num(0.0));
        }

        let convfmt = self.convfmt();
        let text = self.eval_expr(&args[0], io)?.to_string_with(&convfmt);

        let Some(fields) = self.array_handle_for(&args[1], "patsplit") else {
            return Ok(Value::num(0.0));
        };
        let pattern = self.pattern_source(&args[2], io)?;
        let seps = match args.get(3) {
            Some(expr) => self.array_handle_for(expr, "patsplit"),
            None => None,
        };

        let re = match self.get_regex(&pattern) {
            Ok(re) => re,
            Err(e) => {
                eprintln!("awk: patsplit: invalid regex '{}': {}", pattern, e);
                return Ok(Value::num(0.0));
            }
        };

        fields.borrow_mut().clear();
        if let Some(seps) = &seps {
            seps.borrow_mut().clear();
        }

        let mut count = 0usize;
        let mut last_end = 0usize;
        for m in re.find_iter(&text) {
            if let Some(seps) = &seps {
                seps.borrow_mut().insert(
                    count.to_string(),
                    Value::from_input(text[last_end..m.start()].to_string()),
                );
            }
            count += 1;
            fields
                .borrow_mut()
                .insert(count.to_string(), Value::from_input(m.as_str().to_string()));
            last_end = m.end();
        }

        if let Some(seps) = &seps {
            if last_end < text.len() {
                seps.borrow_mut().insert(
                    count.to_string(),
                    Value::from_input(text[last_end..].to_string()),
                );
            }
        }

        Ok(Value::num(count as f64))
    }

    // ------------------------------------------------------------------
    // asort / asorti
    // ------------------------------------------------------------------

    fn builtin_asort(
        &mut self,
        args: &'p [Expr],
        by_index: bool,
        _io: &mut RunIo,
    ) -> Result<Value> {
        let who = if by_index { "asorti" } else { "asort" };
        let Some(source) = args.first().and_then(|e| self.array_handle_for(e, who)) else {
            return Ok(Value::num(0.0));
        };
        let dest = match args.get(1) {
            Some(expr) => match self.array_handle_for(expr, who) {
                Some(handle) => handle,
                None => return Ok(Value::num(0.0)),
            },
            None => source.clone(),
        };

        let mut items: Vec<Value> = if by_index {
            let mut keys: Vec<String> = source.borrow().keys().cloned().collect();
            keys.sort();
            keys.into_iter().map(Value::from_input).collect()
        } else {
            let mut values: Vec<Value> = source.borrow().values().cloned().collect();
            values.sort_by(|a, b| a.to_string_val().cmp(&b.to_string_val()));
            values
        };

        let count = items.len();
        let mut map = dest.borrow_mut();
        map.clear();
        for (i, item) in items.drain(..).enumerate() {
            map.insert((i + 1).to_string(), item);
        }

        Ok(Value::num(count as f64))
    }
}

/// sub/gsub replacement: & is the matched text, \& a literal ampersand,
/// \\ a literal backslash.
fn expand_replacement(replacement: &str, matched: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + matched.len());
    let mut chars = replacement.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.peek() {
                Some('&') => {
                    chars.next();
                    out.push('&');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            '&' => out.push_str(matched),
            other => out.push(other),
        }
    }
    out
}

/// gensub replacement additionally supports \1..\9 backreferences.
fn expand_gensub(replacement: &str, caps: &Captures) -> String {
    let matched = caps.get(0).map(|m| m.as_str()).unwrap_or("");
    let mut out = String::with_capacity(replacement.len() + matched.len());
    let mut chars = replacement.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.peek() {
                Some(d @ '0'..='9') => {
                    let group = *d as usize - '0' as usize;
                    chars.next();
                    if let Some(g) = caps.get(group) {
                        out.push_str(g.as_str());
                    }
                }
                Some('&') => {
                    chars.next();
                    out.push('&');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            '&' => out.push_str(matched),
            other => out.push(other),
        }
    }
    out
}

fn substitute(re: &Regex, replacement: &str, target: &str, global: bool) -> (String, usize) {
    let mut out = String::with_capacity(target.len());
    let mut count = 0usize;
    let mut pos = 0usize;

    while pos <= target.len() {
        let Some(m) = re.find_at(target, pos) else {
            break;
        };
        out.push_str(&target[pos..m.start()]);
        out.push_str(&expand_replacement(replacement, m.as_str()));
        count += 1;

        if m.end() > m.start() {
            pos = m.end();
        } else {
            // Zero-width match: copy one character to make progress
            match target[m.end()..].chars().next() {
                Some(ch) => {
                    out.push(ch);
                    pos = m.end() + ch.len_utf8();
                }
                None => {
                    pos = target.len();
                    break;
                }
            }
        }

        if !global {
            break;
        }
    }

    out.push_str(&target[pos.min(target.len())..]);
    (out, count)
}

fn strtonum(s: &str) -> f64 {
    let t = s.trim();
    let (neg, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let magnitude = if t.starts_with("0x") || t.starts_with("0X") {
        parse_hex_prefix(&t[2..]) as f64
    } else if t.len() > 1 && t.starts_with('0') && t[1..].bytes().all(|b| (b'0'..=b'7').contains(&b))
    {
        i64::from_str_radix(&t[1..], 8).unwrap_or(0) as f64
    } else {
        crate::value::parse_leading_number(t)
    };
    if neg {
        -magnitude
    } else {
        magnitude
    }
}

fn parse_hex_prefix(s: &str) -> i64 {
    let mut value: i64 = 0;
    for b in s.bytes() {
        let digit = match b {
            b'0'..=b'9' => (b - b'0') as i64,
            b'a'..=b'f' => (b - b'a' + 10) as i64,
            b'A'..=b'F' => (b - b'A' + 10) as i64,
            _ => break,
        };
        value = value.wrapping_mul(16).wrapping_add(digit);
    }
    value
}

// ----------------------------------------------------------------------
// Civil time arithmetic (UTC); the platform offers no portable breakdown
// without pulling in a clock crate, and gawk's semantics only need the
// proleptic Gregorian rules.
// ----------------------------------------------------------------------

const DAYS_IN_MONTH: [i64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn days_in_year(year: i64) -> i64 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// "YYYY MM DD HH MM SS" to seconds since the epoch (UTC)
fn epoch_from_civil(year: i64, month: i64, day: i64, hour: i64, min: i64, sec: i64) -> i64 {
    let mut days: i64 = 0;

    for y in 1970..year {
        days += days_in_year(y);
    }
    for y in year..1970 {
        days -= days_in_year(y);
    }

    for m in 1..month {
        let idx = (m - 1) as usize;
        if idx < 12 {
            days += DAYS_IN_MONTH[idx];
            if m == 2 && is_leap_year(year) {
                days += 1;
            }
        }
    }

    days += day - 1;
    days * 86400 + hour * 3600 + min * 60 + sec
}

/// Epoch seconds to (year, month, day, hour, min, sec, wday, yday)
fn civil_from_epoch(secs: i64) -> (i64, i64, i64, i64, i64, i64, i64, i64) {
    let sec = secs.rem_euclid(60);
    let min = (secs.div_euclid(60)).rem_euclid(60);
    let hour = (secs.div_euclid(3600)).rem_euclid(24);
    let mut days = secs.div_euclid(86400);

    // 1970-01-01 was a Thursday
    let wday = (days + 4).rem_euclid(7);

    let mut year = 1970i64;
    loop {
        let span = days_in_year(year);
        if days >= span {
            days -= span;
            year += 1;
        } else if days < 0 {
            year -= 1;
            days += days_in_year(year);
        } else {
            break;
        }
    }

    let yday = days + 1;

    let mut month = 1i64;
    for (m, &dim) in DAYS_IN_MONTH.iter().enumerate() {
        let mut span = dim;
        if m == 1 && is_leap_year(year) {
            span += 1;
        }
        if days < span {
            month = m as i64 + 1;
            break;
        }
        days -= span;
    }
    let day = days + 1;

    (year, month, day, hour, min, sec, wday, yday)
}

fn strftime_format(format: &str, timestamp: i64) -> String {
    let (year, month, day, hour, min, sec, wday, yday) = civil_from_epoch(timestamp);

    const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    const WEEKDAYS_FULL: [&str; 7] = [
        "Sunday",
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
    ];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    const MONTHS_FULL: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];

    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{:04}", year)),
            Some('y') => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            Some('m') => out.push_str(&format!("{:02}", month)),
            Some('d') => out.push_str(&format!("{:02}", day)),
            Some('e') => out.push_str(&format!("{:2}", day)),
            Some('H') => out.push_str(&format!("{:02}", hour)),
            Some('M') => out.push_str(&format!("{:02}", min)),
            Some('S') => out.push_str(&format!("{:02}", sec)),
            Some('a') => out.push_str(WEEKDAYS[wday as usize % 7]),
            Some('A') => out.push_str(WEEKDAYS_FULL[wday as usize % 7]),
            Some('b' | 'h') => out.push_str(MONTHS[(month - 1) as usize % 12]),
            Some('B') => out.push_str(MONTHS_FULL[(month - 1) as usize % 12]),
            Some('j') => out.push_str(&format!("{:03}", yday)),
            Some('u') => out.push_str(&format!("{}", if wday == 0 { 7 } else { wday })),
            Some('w') => out.push_str(&format!("{}", wday)),
            Some('s') => out.push_str(&format!("{}", timestamp)),
            Some('Z') => out.push_str("UTC"),
            Some('z') => out.push_str("+0000"),
            Some('%') => out.push('%'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_replacement() {
        assert_eq!(expand_replacement("[&]", "x"), "[x]");
        assert_eq!(expand_replacement(r"\&", "x"), "&");
        assert_eq!(expand_replacement(r"a\\b", "x"), r"a\b");
        assert_eq!(expand_replacement("plain", "x"), "plain");
    }

    #[test]
    fn test_substitute_counts() {
        let re = Regex::new("a").unwrap();
        assert_eq!(substitute(&re, "b", "aaa", true), ("bbb".to_string(), 3));
        assert_eq!(substitute(&re, "b", "aaa", false), ("baa".to_string(), 1));
        assert_eq!(substitute(&re, "b", "xyz", true), ("xyz".to_string(), 0));
    }

    #[test]
    fn test_substitute_identity() {
        // gsub(re, "&") leaves the subject unchanged
        let re = Regex::new("[aeiou]").unwrap();
        let (out, n) = substitute(&re, "&", "banana", true);
        assert_eq!(out, "banana");
        assert_eq!(n, 3);
    }

    #[test]
    fn test_substitute_zero_width() {
        let re = Regex::new("x*").unwrap();
        let (out, _) = substitute(&re, "-", "ab", true);
        assert_eq!(out, "-a-b-");
    }

    #[test]
    fn test_strtonum_bases() {
        assert_eq!(strtonum("0x11"), 17.0);
        assert_eq!(strtonum("011"), 9.0);
        assert_eq!(strtonum("11"), 11.0);
        assert_eq!(strtonum("  -0x10"), -16.0);
        assert_eq!(strtonum("3.5"), 3.5);
    }

    #[test]
    fn test_epoch_round_trip() {
        // 2021-02-28 12:30:45 UTC
        let epoch = epoch_from_civil(2021, 2, 28, 12, 30, 45);
        assert_eq!(civil_from_epoch(epoch), (2021, 2, 28, 12, 30, 45, 0, 59));
    }

    #[test]
    fn test_epoch_known_value() {
        assert_eq!(epoch_from_civil(1970, 1, 1, 0, 0, 0), 0);
        assert_eq!(epoch_from_civil(2000, 1, 1, 0, 0, 0), 946684800);
    }

    #[test]
    fn test_strftime_fields() {
        let ts = epoch_from_civil(2000, 1, 2, 3, 4, 5);
        assert_eq!(strftime_format("%Y-%m-%d %H:%M:%S", ts), "2000-01-02 03:04:05");
        assert_eq!(strftime_format("%a %b", ts), "Sun Jan");
        assert_eq!(strftime_format("100%%", ts), "100%");
    }
}
