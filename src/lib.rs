//! grawk - an AWK interpreter in Rust
//!
//! Implements the POSIX AWK core plus the widely used gawk extensions:
//! BEGINFILE/ENDFILE, coprocesses (`|&`), `@include`, `@namespace`,
//! indirect calls, FPAT, RT, IGNORECASE, `gensub`, `patsplit`,
//! `asort`/`asorti`, SYMTAB/FUNCTAB and gettext-style i18n.
//!
//! # Example
//!
//! ```
//! use grawk::{Interpreter, Lexer, Parser};
//! use std::io::BufRead;
//!
//! let source = r#"BEGIN { print "Hello, World!" }"#;
//! let tokens = Lexer::new(source).tokenize();
//! let mut parser = Parser::new(tokens);
//! let program = parser.parse().unwrap();
//!
//! let mut interpreter = Interpreter::new(&program);
//! let mut output = Vec::new();
//! let inputs: Vec<(String, Box<dyn BufRead>)> = Vec::new();
//! interpreter.run(inputs, &mut output).unwrap();
//!
//! assert_eq!(String::from_utf8(output).unwrap(), "Hello, World!\n");
//! ```
//!
//! # Field processing
//!
//! ```
//! use grawk::{Interpreter, Lexer, Parser};
//! use std::io::{BufRead, Cursor};
//!
//! let source = "{ print $2, $1 }";
//! let tokens = Lexer::new(source).tokenize();
//! let mut parser = Parser::new(tokens);
//! let program = parser.parse().unwrap();
//!
//! let mut interpreter = Interpreter::new(&program);
//! interpreter.set_fs(",");
//!
//! let inputs: Vec<(String, Box<dyn BufRead>)> =
//!     vec![("-".to_string(), Box::new(Cursor::new("a,b\nc,d\n")))];
//! let mut output = Vec::new();
//! interpreter.run(inputs, &mut output).unwrap();
//!
//! assert_eq!(String::from_utf8(output).unwrap(), "b a\nd c\n");
//! ```

pub mod ast;
pub mod environment;
pub mod error;
pub mod i18n;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod printf;
pub mod regex_cache;
pub mod value;

pub use error::{Error, Result, SourceLocation};
pub use interpreter::Interpreter;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use value::Value;
