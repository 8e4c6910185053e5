use std::cmp::Ordering;

use crate::ast::*;
use crate::environment::{effective_name, is_special_variable};
use crate::error::Result;
use crate::value::{compare_values, Value};

use super::builtins;
use super::io::GetlineRead;
use super::{read_one_record, Interpreter, RunIo};

impl<'p> Interpreter<'p> {
    /// Truthiness with AWK's regex rule: a regex value in boolean
    /// context matches against $0.
    pub(crate) fn eval_truthy(&mut self, expr: &'p Expr, io: &mut RunIo) -> Result<bool> {
        let value = self.eval_expr(expr, io)?;
        match value {
            Value::Regex(pattern) => {
                let record = self.record_text()?;
                match self.get_regex(&pattern) {
                    Ok(re) => Ok(re.is_match(&record)),
                    Err(e) => {
                        eprintln!("awk: {}", e);
                        Ok(false)
                    }
                }
            }
            other => Ok(other.is_truthy()),
        }
    }

    pub(crate) fn eval_expr(&mut self, expr: &'p Expr, io: &mut RunIo) -> Result<Value> {
        match expr {
            Expr::Number(n, _) => Ok(Value::Number(*n)),

            Expr::String(s, _) => Ok(Value::str(s.clone())),

            Expr::Regex(pattern, _) => Ok(Value::Regex(pattern.clone())),

            Expr::Variable(name, _) => self.get_variable(name),

            Expr::Field(index_expr, _) => {
                let index = self.eval_expr(index_expr, io)?.to_number() as i64;
                self.get_field(index)
            }

            Expr::ArrayAccess {
                array, indices, ..
            } => self.eval_array_access(array, indices, io),

            Expr::Binary {
                left, op, right, ..
            } => self.eval_binary(left, *op, right, io),

            Expr::Unary {
                op,
                operand,
                prefix,
                ..
            } => self.eval_unary(*op, operand, *prefix, io),

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval_truthy(condition, io)? {
                    self.eval_expr(then_expr, io)
                } else {
                    self.eval_expr(else_expr, io)
                }
            }

            Expr::Assign {
                target, op, value, ..
            } => self.eval_assign(target, *op, value, io),

            Expr::Call {
                name,
                args,
                location,
            } => self.call_function(name, args, *location, io),

            Expr::IndirectCall {
                target,
                args,
                location,
            } => {
                let convfmt = self.convfmt();
                let name = self.eval_expr(target, io)?.to_string_with(&convfmt);
                if name.is_empty() {
                    eprintln!("awk: indirect call through an empty function name");
                    return Ok(Value::Uninitialized);
                }
                self.call_function(&name, args, *location, io)
            }

            Expr::Match {
                string,
                pattern,
                negated,
                ..
            } => {
                let convfmt = self.convfmt();
                let text = self.eval_expr(string, io)?.to_string_with(&convfmt);
                let pattern = self.pattern_source(pattern, io)?;
                let matched = match self.get_regex(&pattern) {
                    Ok(re) => re.is_match(&text),
                    Err(e) => {
                        eprintln!("awk: {}", e);
                        false
                    }
                };
                Ok(Value::from_bool(matched != *negated))
            }

            Expr::Concat(parts, _) => {
                let convfmt = self.convfmt();
                let mut pieces = Vec::with_capacity(parts.len());
                let mut total = 0;
                for part in parts {
                    let s = self.eval_expr(part, io)?.to_string_with(&convfmt);
                    total += s.len();
                    pieces.push(s);
                }
                let mut result = String::with_capacity(total);
                for piece in &pieces {
                    result.push_str(piece);
                }
                Ok(Value::str(result))
            }

            Expr::In { keys, array, .. } => {
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    values.push(self.eval_expr(key, io)?);
                }
                let key = self.make_key(&values);
                let found = match effective_name(array) {
                    "SYMTAB" => self.env.has(&key),
                    "FUNCTAB" => self.env.has_function(&key) || builtins::is_builtin(&key),
                    _ => match self.env.existing_array(array) {
                        Some(handle) => handle.borrow().contains_key(&key),
                        None => false,
                    },
                };
                Ok(Value::from_bool(found))
            }

            Expr::Getline {
                var,
                file,
                command,
                coprocess,
                ..
            } => self.eval_getline(var.as_deref(), file.as_deref(), command.as_deref(), *coprocess, io),
        }
    }

    /// The ERE source for a match operand: a regex literal or regex
    /// value contributes its pattern, anything else its string form.
    pub(crate) fn pattern_source(&mut self, expr: &'p Expr, io: &mut RunIo) -> Result<String> {
        if let Expr::Regex(pattern, _) = expr {
            return Ok(pattern.clone());
        }
        let convfmt = self.convfmt();
        match self.eval_expr(expr, io)? {
            Value::Regex(pattern) => Ok(pattern),
            other => Ok(other.to_string_with(&convfmt)),
        }
    }

    fn eval_array_access(
        &mut self,
        array: &str,
        indices: &'p [Expr],
        io: &mut RunIo,
    ) -> Result<Value> {
        let mut values = Vec::with_capacity(indices.len());
        for idx in indices {
            values.push(self.eval_expr(idx, io)?);
        }
        let key = self.make_key(&values);

        match effective_name(array) {
            // SYMTAB["x"] reads the global x directly
            "SYMTAB" => Ok(self.env.get_global(&key)),
            // FUNCTAB["f"] names the function if it exists
            "FUNCTAB" => {
                if self.env.has_function(&key) || builtins::is_builtin(&key) {
                    Ok(Value::str(key))
                } else {
                    Ok(Value::str(""))
                }
            }
            _ => {
                let handle = self.env.array_handle(array);
                let value = handle
                    .borrow_mut()
                    .entry(key)
                    .or_insert(Value::Uninitialized)
                    .clone();
                Ok(value)
            }
        }
    }

    fn eval_binary(
        &mut self,
        left: &'p Expr,
        op: BinaryOp,
        right: &'p Expr,
        io: &mut RunIo,
    ) -> Result<Value> {
        // Short-circuit logicals yield 0/1, not the operand values
        match op {
            BinaryOp::And => {
                if !self.eval_truthy(left, io)? {
                    return Ok(Value::num(0.0));
                }
                let r = self.eval_truthy(right, io)?;
                return Ok(Value::from_bool(r));
            }
            BinaryOp::Or => {
                if self.eval_truthy(left, io)? {
                    return Ok(Value::num(1.0));
                }
                let r = self.eval_truthy(right, io)?;
                return Ok(Value::from_bool(r));
            }
            _ => {}
        }

        let l = self.eval_expr(left, io)?;
        let r = self.eval_expr(right, io)?;

        // Division and modulo lean on IEEE 754: x/0 is +-inf, 0/0 and
        // x%0 are NaN
        let result = match op {
            BinaryOp::Add => Value::num(l.to_number() + r.to_number()),
            BinaryOp::Sub => Value::num(l.to_number() - r.to_number()),
            BinaryOp::Mul => Value::num(l.to_number() * r.to_number()),
            BinaryOp::Div => Value::num(l.to_number() / r.to_number()),
            BinaryOp::Mod => Value::num(l.to_number() % r.to_number()),
            BinaryOp::Pow => Value::num(l.to_number().powf(r.to_number())),
            BinaryOp::Lt => Value::from_bool(compare_values(&l, &r) == Ordering::Less),
            BinaryOp::Le => Value::from_bool(compare_values(&l, &r) != Ordering::Greater),
            BinaryOp::Gt => Value::from_bool(compare_values(&l, &r) == Ordering::Greater),
            BinaryOp::Ge => Value::from_bool(compare_values(&l, &r) != Ordering::Less),
            BinaryOp::Eq => Value::from_bool(compare_values(&l, &r) == Ordering::Equal),
            BinaryOp::Ne => Value::from_bool(compare_values(&l, &r) != Ordering::Equal),
            BinaryOp::And | BinaryOp::Or => unreachable!(),
        };
        Ok(result)
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        operand: &'p Expr,
        prefix: bool,
        io: &mut RunIo,
    ) -> Result<Value> {
        match op {
            UnaryOp::Not => {
                let truthy = self.eval_truthy(operand, io)?;
                Ok(Value::from_bool(!truthy))
            }
            UnaryOp::Neg => Ok(Value::num(-self.eval_expr(operand, io)?.to_number())),
            UnaryOp::Pos => Ok(Value::num(self.eval_expr(operand, io)?.to_number())),
            UnaryOp::Incr | UnaryOp::Decr => {
                let delta = if op == UnaryOp::Incr { 1.0 } else { -1.0 };
                let old = self.eval_expr(operand, io)?.to_number();
                let new = old + delta;
                self.assign_to_lvalue(operand, Value::num(new), io)?;
                // Pre forms return the new value, post forms the snapshot
                Ok(Value::num(if prefix { new } else { old }))
            }
        }
    }

    fn eval_assign(
        &mut self,
        target: &'p Expr,
        op: AssignOp,
        value_expr: &'p Expr,
        io: &mut RunIo,
    ) -> Result<Value> {
        // x = x a b ... appends in place instead of rebuilding the
        // whole string, which matters when accumulating large output
        if op == AssignOp::Assign {
            if let (Expr::Variable(name, _), Expr::Concat(parts, _)) = (target, value_expr) {
                let appendable = matches!(&parts[0], Expr::Variable(n, _) if n == name)
                    && !parts[1..]
                        .iter()
                        .any(|p| matches!(p, Expr::Variable(n, _) if n == name))
                    && !is_special_variable(effective_name(name))
                    && !self.env.get(name).is_array();
                if appendable {
                    let convfmt = self.convfmt();
                    let mut suffix = String::new();
                    for part in &parts[1..] {
                        suffix.push_str(&self.eval_expr(part, io)?.to_string_with(&convfmt));
                        if self.pending_signal.is_some() {
                            return Ok(Value::Uninitialized);
                        }
                    }
                    let mut current = self.env.take(name);
                    current.append_string(&suffix);
                    self.env.set(name, current);
                    return Ok(Value::Uninitialized);
                }
            }
        }

        let new_value = match op {
            AssignOp::Assign => self.eval_expr(value_expr, io)?,
            _ => {
                let current = self.eval_expr(target, io)?;
                let rhs = self.eval_expr(value_expr, io)?;
                let n = match op {
                    AssignOp::AddAssign => current.to_number() + rhs.to_number(),
                    AssignOp::SubAssign => current.to_number() - rhs.to_number(),
                    AssignOp::MulAssign => current.to_number() * rhs.to_number(),
                    AssignOp::DivAssign => current.to_number() / rhs.to_number(),
                    AssignOp::ModAssign => current.to_number() % rhs.to_number(),
                    AssignOp::PowAssign => current.to_number().powf(rhs.to_number()),
                    AssignOp::Assign => unreachable!(),
                };
                Value::num(n)
            }
        };

        self.assign_to_lvalue(target, new_value.clone(), io)?;
        Ok(new_value)
    }

    pub(crate) fn assign_to_lvalue(
        &mut self,
        target: &'p Expr,
        value: Value,
        io: &mut RunIo,
    ) -> Result<()> {
        match target {
            Expr::Variable(name, _) => self.set_variable(name, value),

            Expr::Field(index_expr, _) => {
                let index = self.eval_expr(index_expr, io)?.to_number() as i64;
                self.set_field(index, &value)
            }

            Expr::ArrayAccess {
                array, indices, ..
            } => {
                let mut values = Vec::with_capacity(indices.len());
                for idx in indices {
                    values.push(self.eval_expr(idx, io)?);
                }
                let key = self.make_key(&values);

                // SYMTAB["x"] = v writes the global x
                if effective_name(array) == "SYMTAB" {
                    return self.set_variable(&key, value);
                }

                let handle = self.env.array_handle(array);
                handle.borrow_mut().insert(key, value);
                Ok(())
            }

            _ => {
                eprintln!("awk: invalid assignment target");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // getline
    // ------------------------------------------------------------------

    /// All seven getline forms. Returns 1 on success, 0 on a read
    /// error, -1 on open failure or end of input. Only the plain forms
    /// reading the main input advance NR/FNR.
    fn eval_getline(
        &mut self,
        var: Option<&'p Expr>,
        file: Option<&'p Expr>,
        command: Option<&'p Expr>,
        coprocess: bool,
        io: &mut RunIo,
    ) -> Result<Value> {
        let rs = self.rs();
        let convfmt = self.convfmt();

        let read = if let Some(cmd_expr) = command {
            let cmd = self.eval_expr(cmd_expr, io)?.to_string_with(&convfmt);
            if coprocess {
                self.read_from_coprocess(&cmd, &rs)?
            } else {
                self.read_from_input_pipe(&cmd, &rs)?
            }
        } else if let Some(file_expr) = file {
            let filename = self.eval_expr(file_expr, io)?.to_string_with(&convfmt);
            if filename == "-" || filename == "/dev/stdin" {
                match io.input.as_mut() {
                    Some(reader) => match read_one_record(&mut **reader, &rs)? {
                        Some((line, _)) => GetlineRead::Line(line),
                        None => GetlineRead::Eof,
                    },
                    None => GetlineRead::Eof,
                }
            } else {
                self.read_from_input_file(&filename, &rs)?
            }
        } else {
            // Plain getline reads the current main input
            match io.input.as_mut() {
                Some(reader) => match read_one_record(&mut **reader, &rs)? {
                    Some((line, _)) => {
                        let nr = self.env.get_global("NR").to_number() + 1.0;
                        let fnr = self.env.get_global("FNR").to_number() + 1.0;
                        self.env.set_global("NR", Value::num(nr));
                        self.env.set_global("FNR", Value::num(fnr));
                        GetlineRead::Line(line)
                    }
                    None => GetlineRead::Eof,
                },
                None => return Ok(Value::num(0.0)),
            }
        };

        match read {
            GetlineRead::Line(line) => {
                match var {
                    Some(var_expr) => {
                        self.assign_to_lvalue(var_expr, Value::from_input(line), io)?;
                    }
                    None => self.set_record(line)?,
                }
                Ok(Value::num(1.0))
            }
            GetlineRead::Eof => Ok(Value::num(-1.0)),
            GetlineRead::Failed => Ok(Value::num(-1.0)),
        }
    }
}
