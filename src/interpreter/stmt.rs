use std::cmp::Ordering;

use crate::ast::*;
use crate::error::Result;
use crate::value::{compare_values, Value};

use super::{Interpreter, RunIo};

/// Outcome of executing a statement. Loops catch Break/Continue, the
/// record loop catches Next, the per-file driver catches Nextfile, a
/// function call catches Return, and run() catches Exit.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Next,
    Nextfile,
    Return(Value),
    Exit(i32),
}

impl<'p> Interpreter<'p> {
    pub(crate) fn execute_block(&mut self, block: &'p Block, io: &mut RunIo) -> Result<Flow> {
        for stmt in &block.statements {
            match self.execute_stmt(stmt, io)? {
                Flow::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    /// A signal raised inside a called function (exit, next, nextfile)
    /// surfaces through `pending_signal`; pick it up after evaluating
    /// expressions in statement position.
    fn signal_or(&mut self, flow: Flow) -> Flow {
        self.pending_signal.take().unwrap_or(flow)
    }

    pub(crate) fn execute_stmt(&mut self, stmt: &'p Stmt, io: &mut RunIo) -> Result<Flow> {
        match stmt {
            Stmt::Empty => Ok(Flow::Normal),

            Stmt::Expr(expr) => {
                self.eval_expr(expr, io)?;
                Ok(self.signal_or(Flow::Normal))
            }

            Stmt::Print { args, redirect, .. } => {
                self.execute_print(args, redirect.as_ref(), io)?;
                Ok(self.signal_or(Flow::Normal))
            }

            Stmt::Printf {
                format,
                args,
                redirect,
                ..
            } => {
                self.execute_printf(format, args, redirect.as_ref(), io)?;
                Ok(self.signal_or(Flow::Normal))
            }

            Stmt::Block(block) => self.execute_block(block, io),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let cond = self.eval_truthy(condition, io)?;
                if let Some(sig) = self.pending_signal.take() {
                    return Ok(sig);
                }
                if cond {
                    self.execute_stmt(then_branch, io)
                } else if let Some(else_stmt) = else_branch {
                    self.execute_stmt(else_stmt, io)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                loop {
                    let cond = self.eval_truthy(condition, io)?;
                    if let Some(sig) = self.pending_signal.take() {
                        return Ok(sig);
                    }
                    if !cond {
                        break;
                    }
                    match self.execute_stmt(body, io)? {
                        Flow::Normal | Flow::Continue => continue,
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::DoWhile {
                body, condition, ..
            } => {
                loop {
                    match self.execute_stmt(body, io)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                    let cond = self.eval_truthy(condition, io)?;
                    if let Some(sig) = self.pending_signal.take() {
                        return Ok(sig);
                    }
                    if !cond {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                if let Some(init_stmt) = init {
                    match self.execute_stmt(init_stmt, io)? {
                        Flow::Normal => {}
                        other => return Ok(other),
                    }
                }

                loop {
                    if let Some(cond_expr) = condition {
                        let cond = self.eval_truthy(cond_expr, io)?;
                        if let Some(sig) = self.pending_signal.take() {
                            return Ok(sig);
                        }
                        if !cond {
                            break;
                        }
                    }

                    match self.execute_stmt(body, io)? {
                        Flow::Normal | Flow::Continue => {}
                        Flow::Break => break,
                        other => return Ok(other),
                    }

                    if let Some(update_expr) = update {
                        self.eval_expr(update_expr, io)?;
                        if let Some(sig) = self.pending_signal.take() {
                            return Ok(sig);
                        }
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::ForIn {
                var, array, body, ..
            } => {
                let keys = self.iteration_keys(array);
                for key in keys {
                    self.set_variable(var, Value::from_input(key))?;
                    match self.execute_stmt(body, io)? {
                        Flow::Normal | Flow::Continue => continue,
                        Flow::Break => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Switch {
                expr,
                cases,
                default,
                ..
            } => self.execute_switch(expr, cases, default.as_ref(), io),

            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Next { .. } => Ok(Flow::Next),
            Stmt::Nextfile { .. } => Ok(Flow::Nextfile),

            Stmt::Exit { status, .. } => {
                let code = match status {
                    Some(expr) => {
                        let v = self.eval_expr(expr, io)?;
                        if let Some(sig) = self.pending_signal.take() {
                            return Ok(sig);
                        }
                        v.to_number() as i32
                    }
                    None => 0,
                };
                Ok(Flow::Exit(code))
            }

            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => {
                        let v = self.eval_expr(expr, io)?;
                        if let Some(sig) = self.pending_signal.take() {
                            return Ok(sig);
                        }
                        v
                    }
                    None => Value::Uninitialized,
                };
                Ok(Flow::Return(result))
            }

            Stmt::Delete { array, indices, .. } => {
                self.execute_delete(array, indices, io)?;
                Ok(self.signal_or(Flow::Normal))
            }
        }
    }

    fn iteration_keys(&mut self, array: &str) -> Vec<String> {
        match crate::environment::effective_name(array) {
            "SYMTAB" => self.env.global_names(),
            "FUNCTAB" => {
                let mut names = self.env.function_names();
                names.extend(super::builtins::BUILTIN_NAMES.iter().map(|s| s.to_string()));
                names
            }
            _ => match self.env.existing_array(array) {
                Some(handle) => handle.borrow().keys().cloned().collect(),
                None => Vec::new(),
            },
        }
    }

    fn execute_switch(
        &mut self,
        expr: &'p Expr,
        cases: &'p [(Expr, Block)],
        default: Option<&'p Block>,
        io: &mut RunIo,
    ) -> Result<Flow> {
        let value = self.eval_expr(expr, io)?;
        if let Some(sig) = self.pending_signal.take() {
            return Ok(sig);
        }

        let mut matched = false;
        for (case_expr, body) in cases {
            if !matched {
                let case_value = self.eval_expr(case_expr, io)?;
                if compare_values(&value, &case_value) == Ordering::Equal {
                    matched = true;
                }
            }
            // Fallthrough into later case bodies until a break
            if matched {
                match self.execute_block(body, io)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Normal => {}
                    other => return Ok(other),
                }
            }
        }

        if !matched {
            if let Some(body) = default {
                match self.execute_block(body, io)? {
                    Flow::Break => return Ok(Flow::Normal),
                    Flow::Normal => {}
                    other => return Ok(other),
                }
            }
        }

        Ok(Flow::Normal)
    }

    fn execute_delete(&mut self, array: &str, indices: &'p [Expr], io: &mut RunIo) -> Result<()> {
        if indices.is_empty() {
            // Clearing through the handle keeps aliases in sync
            if let Some(handle) = self.env.existing_array(array) {
                handle.borrow_mut().clear();
            }
            return Ok(());
        }

        let mut values = Vec::with_capacity(indices.len());
        for idx in indices {
            values.push(self.eval_expr(idx, io)?);
        }
        let key = self.make_key(&values);

        if crate::environment::effective_name(array) == "SYMTAB" {
            self.env.delete_global(&key);
            return Ok(());
        }

        if let Some(handle) = self.env.existing_array(array) {
            handle.borrow_mut().remove(&key);
        }
        Ok(())
    }

    fn execute_print(
        &mut self,
        args: &'p [Expr],
        redirect: Option<&'p (RedirectKind, Expr)>,
        io: &mut RunIo,
    ) -> Result<()> {
        let line = if args.is_empty() {
            self.record_text()?
        } else {
            let ofmt = self.ofmt();
            let mut pieces = Vec::with_capacity(args.len());
            for arg in args {
                let v = self.eval_expr(arg, io)?;
                if self.pending_signal.is_some() {
                    return Ok(());
                }
                // print formats numbers with OFMT, not CONVFMT
                pieces.push(v.to_string_with(&ofmt));
            }
            pieces.join(&self.ofs())
        };

        let mut data = line.into_bytes();
        data.extend_from_slice(self.ors().as_bytes());

        self.write_print_output(redirect, &data, io)
    }

    fn execute_printf(
        &mut self,
        format: &'p Expr,
        args: &'p [Expr],
        redirect: Option<&'p (RedirectKind, Expr)>,
        io: &mut RunIo,
    ) -> Result<()> {
        let convfmt = self.convfmt();
        let format = self.eval_expr(format, io)?.to_string_with(&convfmt);
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, io)?);
            if self.pending_signal.is_some() {
                return Ok(());
            }
        }

        let rendered = crate::printf::sprintf(&format, &values, &convfmt);
        self.write_print_output(redirect, rendered.as_bytes(), io)
    }

    fn write_print_output(
        &mut self,
        redirect: Option<&'p (RedirectKind, Expr)>,
        data: &[u8],
        io: &mut RunIo,
    ) -> Result<()> {
        match redirect {
            None => {
                io.output.write_all(data)?;
                Ok(())
            }
            Some((kind, target_expr)) => {
                let convfmt = self.convfmt();
                let target = self.eval_expr(target_expr, io)?.to_string_with(&convfmt);
                self.write_redirected(&target, *kind, data, io)
            }
        }
    }
}
