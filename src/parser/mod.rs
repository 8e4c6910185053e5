use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser over the token stream.
///
/// Errors are accumulated (with panic-mode recovery at statement
/// terminators and structural keywords) so one bad rule does not hide
/// the rest; `had_error()` gates execution. `@include` files are read,
/// parsed and spliced in with cycle detection; `@namespace` qualifies
/// unqualified identifiers in the rest of the file.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<String>,
    first_error: Option<SourceLocation>,
    namespace: String,
    base_dir: PathBuf,
    included: Rc<RefCell<HashSet<PathBuf>>>,
    print_depth: usize,
    paren_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_context(tokens, PathBuf::from("."), Rc::new(RefCell::new(HashSet::new())))
    }

    /// Parser for a source file: `@include` paths resolve relative to
    /// the including file's directory.
    pub fn with_base_dir(tokens: Vec<Token>, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_context(tokens, base_dir.into(), Rc::new(RefCell::new(HashSet::new())))
    }

    fn with_context(
        tokens: Vec<Token>,
        base_dir: PathBuf,
        included: Rc<RefCell<HashSet<PathBuf>>>,
    ) -> Self {
        let mut parser = Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            first_error: None,
            namespace: String::new(),
            base_dir,
            included,
            print_depth: 0,
            paren_depth: 0,
        };
        parser.skip_error_tokens();
        parser
    }

    /// Parse a complete program. Returns Err when any error was
    /// recorded; all messages stay available through `errors()`.
    pub fn parse(&mut self) -> Result<Program> {
        let mut program = Program::new();

        self.skip_newlines();

        while !self.is_at_end() {
            if self.parse_top_level(&mut program).is_err() {
                self.synchronize();
            }
            self.skip_newlines();
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            let location = self.first_error.unwrap_or(SourceLocation::new(0, 0));
            Err(Error::Parser {
                message: self.errors.join("\n"),
                location,
            })
        }
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn parse_top_level(&mut self, program: &mut Program) -> Result<()> {
        if self.check(&TokenKind::AtInclude) {
            return self.process_include(program);
        }
        if self.check(&TokenKind::AtNamespace) {
            return self.process_namespace();
        }
        if self.check(&TokenKind::Function) {
            let func = self.parse_function()?;
            program.functions.push(func);
            return Ok(());
        }
        let rule = self.parse_rule()?;
        program.rules.push(rule);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    fn process_include(&mut self, program: &mut Program) -> Result<()> {
        self.advance(); // @include

        let filename = if let Some(TokenKind::String(s)) = self.peek_kind() {
            let s = s.clone();
            self.advance();
            s
        } else if self.match_token(&TokenKind::Less) {
            // <name> form; the path must lex as an identifier
            let name = self.expect_identifier()?;
            self.expect(&TokenKind::Greater)?;
            name
        } else {
            return Err(self.report("expected filename after @include"));
        };

        let resolved = self.resolve_include_path(&filename);

        if self.included.borrow().contains(&resolved) {
            // Repeated include, silently ignored
            self.skip_terminators();
            return Ok(());
        }
        self.included.borrow_mut().insert(resolved.clone());

        let source = match std::fs::read_to_string(&resolved) {
            Ok(s) => s,
            Err(e) => {
                return Err(self.report(format!("@include: cannot open {}: {}", filename, e)));
            }
        };

        let tokens = Lexer::new(&source).tokenize();
        let base = resolved
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut nested = Parser::with_context(tokens, base, self.included.clone());

        match nested.parse() {
            Ok(included) => {
                program.functions.extend(included.functions);
                program.rules.extend(included.rules);
            }
            Err(_) => {
                for err in nested.errors {
                    self.errors.push(format!("{}: {}", filename, err));
                }
                if self.first_error.is_none() {
                    self.first_error = Some(self.current_location());
                }
            }
        }

        self.skip_terminators();
        Ok(())
    }

    fn resolve_include_path(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        joined.canonicalize().unwrap_or(joined)
    }

    fn process_namespace(&mut self) -> Result<()> {
        self.advance(); // @namespace

        let name = if let Some(TokenKind::String(s)) = self.peek_kind() {
            let s = s.clone();
            self.advance();
            s
        } else {
            return Err(self.report("expected namespace name as string after @namespace"));
        };

        // The "awk" namespace restores unqualified names
        if name == "awk" {
            self.namespace.clear();
        } else {
            self.namespace = name;
        }

        self.skip_terminators();
        Ok(())
    }

    fn qualify(&self, name: String) -> String {
        if self.namespace.is_empty() || name.contains("::") {
            name
        } else {
            format!("{}::{}", self.namespace, name)
        }
    }

    // ------------------------------------------------------------------
    // Program structure
    // ------------------------------------------------------------------

    fn parse_function(&mut self) -> Result<FunctionDef> {
        let location = self.current_location();
        self.expect(&TokenKind::Function)?;

        let name = self.expect_qualified_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            params.push(self.expect_identifier()?);
            while self.match_token(&TokenKind::Comma) {
                self.skip_newlines();
                params.push(self.expect_identifier()?);
            }
        }
        self.expect(&TokenKind::RightParen)?;
        self.skip_newlines();

        let body = self.parse_block()?;

        Ok(FunctionDef {
            name,
            params,
            body,
            location,
        })
    }

    fn parse_rule(&mut self) -> Result<Rule> {
        let location = self.current_location();

        for (kind, pattern) in [
            (TokenKind::Begin, Pattern::Begin),
            (TokenKind::End, Pattern::End),
            (TokenKind::BeginFile, Pattern::BeginFile),
            (TokenKind::EndFile, Pattern::EndFile),
        ] {
            if self.check(&kind) {
                self.advance();
                self.skip_newlines();
                if !self.check(&TokenKind::LeftBrace) {
                    return Err(self.report(format!("{:?} requires an action block", kind)));
                }
                let action = Some(self.parse_block()?);
                return Ok(Rule {
                    pattern: Some(pattern),
                    action,
                    location,
                });
            }
        }

        // Action with no pattern
        if self.check(&TokenKind::LeftBrace) {
            let action = Some(self.parse_block()?);
            return Ok(Rule {
                pattern: None,
                action,
                location,
            });
        }

        let pattern = Some(self.parse_pattern()?);
        self.skip_newlines();

        // Missing action means the implicit { print $0 }
        let action = if self.check(&TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Rule {
            pattern,
            action,
            location,
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let start = self.parse_expression()?;

        if self.match_token(&TokenKind::Comma) {
            self.skip_newlines();
            let end = self.parse_expression()?;
            return Ok(Pattern::Range { start, end });
        }

        Ok(Pattern::Expr(start))
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_block(&mut self) -> Result<Block> {
        let location = self.current_location();
        self.expect(&TokenKind::LeftBrace)?;
        self.skip_newlines();

        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
            self.skip_terminators();
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Block::new(statements, location))
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        self.skip_newlines();

        let location = self.current_location();

        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Stmt::Empty);
        }

        if self.check(&TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        if self.match_token(&TokenKind::If) {
            return self.parse_if_statement(location);
        }
        if self.match_token(&TokenKind::While) {
            return self.parse_while_statement(location);
        }
        if self.match_token(&TokenKind::For) {
            return self.parse_for_statement(location);
        }
        if self.match_token(&TokenKind::Do) {
            return self.parse_do_while_statement(location);
        }
        if self.match_token(&TokenKind::Switch) {
            return self.parse_switch_statement(location);
        }

        if self.match_token(&TokenKind::Break) {
            return Ok(Stmt::Break { location });
        }
        if self.match_token(&TokenKind::Continue) {
            return Ok(Stmt::Continue { location });
        }
        if self.match_token(&TokenKind::Next) {
            return Ok(Stmt::Next { location });
        }
        if self.match_token(&TokenKind::Nextfile) {
            return Ok(Stmt::Nextfile { location });
        }

        if self.match_token(&TokenKind::Exit) {
            let status = if self.can_start_expression() {
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Stmt::Exit { status, location });
        }

        if self.match_token(&TokenKind::Return) {
            let value = if self.can_start_expression() {
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Stmt::Return { value, location });
        }

        if self.match_token(&TokenKind::Delete) {
            let array = self.expect_qualified_identifier()?;
            let indices = if self.match_token(&TokenKind::LeftBracket) {
                self.paren_depth += 1;
                let mut indices = vec![self.parse_expression()?];
                while self.match_token(&TokenKind::Comma) {
                    indices.push(self.parse_expression()?);
                }
                self.paren_depth -= 1;
                self.expect(&TokenKind::RightBracket)?;
                indices
            } else {
                Vec::new()
            };
            return Ok(Stmt::Delete {
                array,
                indices,
                location,
            });
        }

        if self.match_token(&TokenKind::Print) {
            return self.parse_print_statement(location);
        }
        if self.match_token(&TokenKind::Printf) {
            return self.parse_printf_statement(location);
        }

        let expr = self.parse_expression()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_if_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        self.skip_newlines();

        let then_branch = Box::new(self.parse_statement()?);

        // Terminators may sit between the then-branch and an else
        let saved = self.current;
        self.skip_terminators();
        let else_branch = if self.match_token(&TokenKind::Else) {
            self.skip_newlines();
            Some(Box::new(self.parse_statement()?))
        } else {
            self.current = saved;
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location,
        })
    }

    fn parse_while_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        self.skip_newlines();

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::While {
            condition,
            body,
            location,
        })
    }

    fn parse_do_while_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.skip_newlines();
        let body = Box::new(self.parse_statement()?);
        self.skip_terminators();
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        Ok(Stmt::DoWhile {
            body,
            condition,
            location,
        })
    }

    fn parse_for_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;

        // for (var in array)
        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            if matches!(self.peek_next_kind(), Some(TokenKind::In)) {
                let var = self.qualify(name.clone());
                self.advance(); // identifier
                self.advance(); // in
                let array = self.expect_qualified_identifier()?;
                self.expect(&TokenKind::RightParen)?;
                self.skip_newlines();
                let body = Box::new(self.parse_statement()?);

                return Ok(Stmt::ForIn {
                    var,
                    array,
                    body,
                    location,
                });
            }
        }

        let init = if !self.check(&TokenKind::Semicolon) {
            Some(Box::new(Stmt::Expr(self.parse_expression()?)))
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;

        let condition = if !self.check(&TokenKind::Semicolon) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if !self.check(&TokenKind::RightParen) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::RightParen)?;
        self.skip_newlines();

        let body = Box::new(self.parse_statement()?);

        Ok(Stmt::For {
            init,
            condition,
            update,
            body,
            location,
        })
    }

    fn parse_switch_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        self.skip_newlines();
        self.expect(&TokenKind::LeftBrace)?;
        self.skip_newlines();

        let mut cases: Vec<(Expr, Block)> = Vec::new();
        let mut default: Option<Block> = None;

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Case) {
                let case_location = self.current_location();
                let case_expr = self.parse_expression()?;
                self.expect(&TokenKind::Colon)?;
                self.skip_newlines();

                let body = self.parse_case_body(case_location)?;
                cases.push((case_expr, body));
            } else if self.match_token(&TokenKind::Default) {
                let case_location = self.current_location();
                self.expect(&TokenKind::Colon)?;
                self.skip_newlines();

                default = Some(self.parse_case_body(case_location)?);
            } else {
                return Err(self.report("expected 'case' or 'default' in switch body"));
            }
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Stmt::Switch {
            expr,
            cases,
            default,
            location,
        })
    }

    fn parse_case_body(&mut self, location: SourceLocation) -> Result<Block> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Case)
            && !self.check(&TokenKind::Default)
            && !self.check(&TokenKind::RightBrace)
            && !self.is_at_end()
        {
            statements.push(self.parse_statement()?);
            self.skip_terminators();
        }
        Ok(Block::new(statements, location))
    }

    fn parse_print_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        let mut args = Vec::new();

        if self.can_start_expression()
            && !self.check(&TokenKind::Greater)
            && !self.check(&TokenKind::Append)
            && !self.check(&TokenKind::Pipe)
            && !self.check(&TokenKind::PipeBoth)
        {
            self.print_depth += 1;
            let parsed = self.parse_print_args(&mut args);
            self.print_depth -= 1;
            parsed?;
        }

        let redirect = self.parse_output_redirect()?;

        Ok(Stmt::Print {
            args,
            redirect,
            location,
        })
    }

    fn parse_print_args(&mut self, args: &mut Vec<Expr>) -> Result<()> {
        args.push(self.parse_expression()?);
        while self.match_token(&TokenKind::Comma) {
            self.skip_newlines();
            args.push(self.parse_expression()?);
        }
        Ok(())
    }

    fn parse_printf_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.print_depth += 1;
        let parsed = (|| -> Result<(Expr, Vec<Expr>)> {
            let format = self.parse_expression()?;
            let mut args = Vec::new();
            while self.match_token(&TokenKind::Comma) {
                self.skip_newlines();
                args.push(self.parse_expression()?);
            }
            Ok((format, args))
        })();
        self.print_depth -= 1;
        let (format, args) = parsed?;

        let redirect = self.parse_output_redirect()?;

        Ok(Stmt::Printf {
            format: Box::new(format),
            args,
            redirect,
            location,
        })
    }

    fn parse_output_redirect(&mut self) -> Result<Option<(RedirectKind, Expr)>> {
        // |& must be checked before |
        let kind = if self.match_token(&TokenKind::Greater) {
            RedirectKind::Write
        } else if self.match_token(&TokenKind::Append) {
            RedirectKind::Append
        } else if self.match_token(&TokenKind::PipeBoth) {
            RedirectKind::PipeBoth
        } else if self.match_token(&TokenKind::Pipe) {
            RedirectKind::Pipe
        } else {
            return Ok(None);
        };

        let target = self.parse_expression()?;
        Ok(Some((kind, target)))
    }

    // ------------------------------------------------------------------
    // Expressions (precedence climbing, low to high)
    // ------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let expr = self.parse_ternary()?;

        let location = self.current_location();
        let op = match self.peek_kind() {
            Some(TokenKind::Assign) => Some(AssignOp::Assign),
            Some(TokenKind::PlusAssign) => Some(AssignOp::AddAssign),
            Some(TokenKind::MinusAssign) => Some(AssignOp::SubAssign),
            Some(TokenKind::StarAssign) => Some(AssignOp::MulAssign),
            Some(TokenKind::SlashAssign) => Some(AssignOp::DivAssign),
            Some(TokenKind::PercentAssign) => Some(AssignOp::ModAssign),
            Some(TokenKind::CaretAssign) => Some(AssignOp::PowAssign),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            self.skip_newlines();
            let value = self.parse_assignment()?;
            if !expr.is_lvalue() {
                return Err(self.report("invalid assignment target"));
            }
            return Ok(Expr::Assign {
                target: Box::new(expr),
                op,
                value: Box::new(value),
                location,
            });
        }

        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let expr = self.parse_or()?;

        if self.match_token(&TokenKind::Question) {
            let location = self.current_location();
            self.skip_newlines();
            let then_expr = self.parse_expression()?;
            self.expect(&TokenKind::Colon)?;
            self.skip_newlines();
            let else_expr = self.parse_ternary()?;
            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                location,
            });
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;

        while self.match_token(&TokenKind::Or) {
            let location = self.current_location();
            self.skip_newlines();
            let right = self.parse_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::Or,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_in()?;

        while self.match_token(&TokenKind::And) {
            let location = self.current_location();
            self.skip_newlines();
            let right = self.parse_in()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::And,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_in(&mut self) -> Result<Expr> {
        let mut expr = self.parse_match()?;

        while self.match_token(&TokenKind::In) {
            let location = self.current_location();
            let array = self.expect_qualified_identifier()?;
            expr = Expr::In {
                keys: vec![expr],
                array,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_match(&mut self) -> Result<Expr> {
        let mut expr = self.parse_comparison()?;

        loop {
            let negated = if self.match_token(&TokenKind::Match) {
                false
            } else if self.match_token(&TokenKind::NotMatch) {
                true
            } else {
                break;
            };

            let location = self.current_location();
            self.skip_newlines();
            let pattern = self.parse_comparison()?;
            expr = Expr::Match {
                string: Box::new(expr),
                pattern: Box::new(pattern),
                negated,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_pipe_getline()?;

        loop {
            let location = self.current_location();
            let op = match self.peek_kind() {
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::LessEqual) => BinaryOp::Le,
                Some(TokenKind::GreaterEqual) => BinaryOp::Ge,
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::Ne,
                // In a print argument list a top-level > is the
                // output redirection, not a comparison
                Some(TokenKind::Greater) if !self.in_print_args() => BinaryOp::Gt,
                _ => break,
            };

            self.advance();
            self.skip_newlines();
            let right = self.parse_pipe_getline()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn in_print_args(&self) -> bool {
        self.print_depth > 0 && self.paren_depth == 0
    }

    fn parse_pipe_getline(&mut self) -> Result<Expr> {
        let mut expr = self.parse_concat()?;

        // cmd | getline [var] and cmd |& getline [var]
        while (self.check(&TokenKind::Pipe) || self.check(&TokenKind::PipeBoth))
            && matches!(self.peek_next_kind(), Some(TokenKind::Getline))
        {
            let coprocess = self.check(&TokenKind::PipeBoth);
            let location = self.current_location();
            self.advance(); // | or |&
            self.advance(); // getline

            let var = self.parse_getline_var();

            expr = Expr::Getline {
                var,
                file: None,
                command: Some(Box::new(expr)),
                coprocess,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let first = self.parse_additive()?;

        if !self.can_start_concat_operand() {
            return Ok(first);
        }

        let location = first.location();
        let mut parts = vec![first];
        while self.can_start_concat_operand() {
            parts.push(self.parse_additive()?);
        }

        Ok(Expr::Concat(parts, location))
    }

    fn can_start_concat_operand(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Number(_)
                    | TokenKind::String(_)
                    | TokenKind::Identifier(_)
                    | TokenKind::Dollar
                    | TokenKind::LeftParen
                    | TokenKind::Not
                    | TokenKind::Increment
                    | TokenKind::Decrement
            )
        )
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;

        loop {
            let location = self.current_location();
            let op = if self.match_token(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_token(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };

            self.skip_newlines();
            let right = self.parse_multiplicative()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_power()?;

        loop {
            let location = self.current_location();
            let op = if self.match_token(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_token(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_token(&TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };

            self.skip_newlines();
            let right = self.parse_power()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let expr = self.parse_unary()?;

        // Right-associative
        if self.match_token(&TokenKind::Caret) {
            let location = self.current_location();
            self.skip_newlines();
            let right = self.parse_power()?;
            return Ok(Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::Pow,
                right: Box::new(right),
                location,
            });
        }

        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let location = self.current_location();

        let op = match self.peek_kind() {
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Plus) => Some(UnaryOp::Pos),
            Some(TokenKind::Increment) => Some(UnaryOp::Incr),
            Some(TokenKind::Decrement) => Some(UnaryOp::Decr),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                prefix: true,
                location,
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_field()?;

        loop {
            let location = self.current_location();
            let op = if self.match_token(&TokenKind::Increment) {
                UnaryOp::Incr
            } else if self.match_token(&TokenKind::Decrement) {
                UnaryOp::Decr
            } else {
                break;
            };
            expr = Expr::Unary {
                op,
                operand: Box::new(expr),
                prefix: false,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_field(&mut self) -> Result<Expr> {
        let location = self.current_location();
        if self.match_token(&TokenKind::Dollar) {
            let operand = match self.peek_kind() {
                Some(
                    TokenKind::Increment
                    | TokenKind::Decrement
                    | TokenKind::Not
                    | TokenKind::Minus
                    | TokenKind::Plus,
                ) => self.parse_unary()?,
                _ => self.parse_field()?,
            };
            return Ok(Expr::Field(Box::new(operand), location));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let location = self.current_location();

        if let Some(TokenKind::Number(n)) = self.peek_kind() {
            let n = *n;
            self.advance();
            return Ok(Expr::Number(n, location));
        }

        if let Some(TokenKind::String(s)) = self.peek_kind() {
            let s = s.clone();
            self.advance();
            return Ok(Expr::String(s, location));
        }

        if let Some(TokenKind::Regex(r)) = self.peek_kind() {
            let r = r.clone();
            self.advance();
            return Ok(Expr::Regex(r, location));
        }

        if self.check(&TokenKind::Getline) {
            return self.parse_getline_expression(location);
        }

        if self.match_token(&TokenKind::At) {
            return self.parse_indirect_call(location);
        }

        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();

            let name = if self.match_token(&TokenKind::ColonColon) {
                let tail = self.expect_identifier()?;
                format!("{}::{}", name, tail)
            } else {
                self.qualify(name)
            };

            if self.check(&TokenKind::LeftParen) {
                return self.finish_call(name, location);
            }

            if self.check(&TokenKind::LeftBracket) {
                return self.finish_array_access(name, location);
            }

            return Ok(Expr::Variable(name, location));
        }

        if self.match_token(&TokenKind::LeftParen) {
            self.paren_depth += 1;
            let result = self.parse_paren_rest(location);
            self.paren_depth -= 1;
            return result;
        }

        Err(self.report(format!(
            "expected expression, found {}",
            describe_token(self.peek_kind())
        )))
    }

    /// After '(' - either a grouped expression or the multi-key form
    /// `(k1, k2) in array`.
    fn parse_paren_rest(&mut self, location: SourceLocation) -> Result<Expr> {
        self.skip_newlines();
        let expr = self.parse_expression()?;

        if self.match_token(&TokenKind::Comma) {
            let mut keys = vec![expr];
            loop {
                self.skip_newlines();
                keys.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RightParen)?;
            self.expect(&TokenKind::In)?;
            let array = self.expect_qualified_identifier()?;
            return Ok(Expr::In {
                keys,
                array,
                location,
            });
        }

        self.expect(&TokenKind::RightParen)?;
        Ok(expr)
    }

    fn parse_getline_expression(&mut self, location: SourceLocation) -> Result<Expr> {
        self.advance(); // getline

        let var = self.parse_getline_var();

        let file = if self.match_token(&TokenKind::Less) {
            Some(Box::new(self.parse_concat()?))
        } else {
            None
        };

        Ok(Expr::Getline {
            var,
            file,
            command: None,
            coprocess: false,
            location,
        })
    }

    /// An identifier directly after `getline` is its target variable
    /// (unless it opens a call).
    fn parse_getline_var(&mut self) -> Option<Box<Expr>> {
        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            if !matches!(self.peek_next_kind(), Some(TokenKind::LeftParen)) {
                let location = self.current_location();
                let name = name.clone();
                self.advance();
                let name = if self.match_token(&TokenKind::ColonColon) {
                    match self.expect_identifier() {
                        Ok(tail) => format!("{}::{}", name, tail),
                        Err(_) => name,
                    }
                } else {
                    self.qualify(name)
                };
                if self.check(&TokenKind::LeftBracket) {
                    if let Ok(access) = self.finish_array_access(name, location) {
                        return Some(Box::new(access));
                    }
                    return None;
                }
                return Some(Box::new(Expr::Variable(name, location)));
            }
        }
        None
    }

    fn parse_indirect_call(&mut self, location: SourceLocation) -> Result<Expr> {
        let target = if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = self.qualify(name.clone());
            let loc = self.current_location();
            self.advance();
            Expr::Variable(name, loc)
        } else if self.match_token(&TokenKind::LeftParen) {
            self.paren_depth += 1;
            let inner = self.parse_expression();
            let closed = self.expect(&TokenKind::RightParen);
            self.paren_depth -= 1;
            closed?;
            inner?
        } else {
            return Err(self.report("expected identifier or '(' after '@'"));
        };

        if !self.check(&TokenKind::LeftParen) {
            return Err(self.report("expected '(' after indirect function name"));
        }
        self.advance();
        self.paren_depth += 1;

        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                self.skip_newlines();
                args.push(self.parse_expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let closed = self.expect(&TokenKind::RightParen);
        self.paren_depth -= 1;
        closed?;

        Ok(Expr::IndirectCall {
            target: Box::new(target),
            args,
            location,
        })
    }

    fn finish_call(&mut self, name: String, location: SourceLocation) -> Result<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        self.paren_depth += 1;

        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                self.skip_newlines();
                match self.parse_expression() {
                    Ok(arg) => args.push(arg),
                    Err(e) => {
                        self.paren_depth -= 1;
                        return Err(e);
                    }
                }
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let closed = self.expect(&TokenKind::RightParen);
        self.paren_depth -= 1;
        closed?;

        Ok(Expr::Call {
            name,
            args,
            location,
        })
    }

    fn finish_array_access(&mut self, name: String, location: SourceLocation) -> Result<Expr> {
        self.expect(&TokenKind::LeftBracket)?;
        self.paren_depth += 1;

        let mut indices = Vec::new();
        loop {
            match self.parse_expression() {
                Ok(idx) => indices.push(idx),
                Err(e) => {
                    self.paren_depth -= 1;
                    return Err(e);
                }
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        let closed = self.expect(&TokenKind::RightBracket);
        self.paren_depth -= 1;
        closed?;

        Ok(Expr::ArrayAccess {
            array: name,
            indices,
            location,
        })
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current).map(|t| &t.kind)
    }

    fn peek_next_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.current + 1).map(|t| &t.kind)
    }

    fn current_location(&self) -> SourceLocation {
        self.tokens
            .get(self.current)
            .map(|t| t.location)
            .unwrap_or(SourceLocation::new(0, 0))
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), None | Some(TokenKind::Eof))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind()
            .map(|k| std::mem::discriminant(k) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.skip_error_tokens();
    }

    /// Lexer problems arrive as Error tokens; record and step over them.
    fn skip_error_tokens(&mut self) {
        while let Some(TokenKind::Error(message)) = self.peek_kind() {
            let message = message.clone();
            let location = self.current_location();
            self.record(format!("lexer error at {}: {}", location, message), location);
            self.current += 1;
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.report(format!(
                "expected {}, found {}",
                describe_kind(kind),
                describe_token(self.peek_kind())
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.report(format!(
                "expected identifier, found {}",
                describe_token(self.peek_kind())
            )))
        }
    }

    /// Identifier with optional `ns::name` spelling; a bare name is
    /// qualified with the current namespace.
    fn expect_qualified_identifier(&mut self) -> Result<String> {
        let name = self.expect_identifier()?;
        if self.match_token(&TokenKind::ColonColon) {
            let tail = self.expect_identifier()?;
            Ok(format!("{}::{}", name, tail))
        } else {
            Ok(self.qualify(name))
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(&TokenKind::Newline) {}
    }

    fn skip_terminators(&mut self) {
        while self.match_token(&TokenKind::Newline) || self.match_token(&TokenKind::Semicolon) {}
    }

    fn can_start_expression(&self) -> bool {
        self.peek_kind()
            .map(|k| k.can_start_expression())
            .unwrap_or(false)
    }

    fn record(&mut self, message: String, location: SourceLocation) {
        if self.first_error.is_none() {
            self.first_error = Some(location);
        }
        self.errors.push(message);
    }

    /// Record an error at the current token and build the Err value.
    fn report(&mut self, message: impl Into<String>) -> Error {
        let location = self.current_location();
        let message = message.into();
        self.record(
            format!("parse error at {}: {}", location, message),
            location,
        );
        Error::Parser { message, location }
    }

    /// Panic-mode recovery: drop tokens until a statement boundary or a
    /// structural keyword.
    fn synchronize(&mut self) {
        self.print_depth = 0;
        self.paren_depth = 0;

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Newline) || self.match_token(&TokenKind::Semicolon) {
                return;
            }
            match self.peek_kind() {
                Some(
                    TokenKind::Function
                    | TokenKind::Begin
                    | TokenKind::End
                    | TokenKind::BeginFile
                    | TokenKind::EndFile
                    | TokenKind::AtInclude
                    | TokenKind::AtNamespace,
                ) => return,
                _ => self.advance(),
            }
        }
    }
}

fn describe_kind(kind: &TokenKind) -> String {
    format!("{:?}", kind)
}

fn describe_token(kind: Option<&TokenKind>) -> String {
    match kind {
        Some(k) => format!("{:?}", k),
        None => "end of input".to_string(),
    }
}
