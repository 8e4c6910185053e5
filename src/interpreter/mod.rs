mod builtins;
mod expr;
mod io;
pub mod stmt;

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::rc::Rc;

use regex::Regex;

use crate::ast::{Pattern, Program};
use crate::environment::{effective_name, Environment};
use crate::error::Result;
use crate::i18n::I18n;
use crate::regex_cache::RegexCache;
use crate::value::{join_array_key, Value};

use io::{Coprocess, OutputTarget, PipeInput};
use stmt::Flow;

/// The streams of one interpreter run: the record source currently being
/// read (None during BEGIN/END) and the default output.
pub(crate) struct RunIo<'io> {
    pub(crate) input: Option<&'io mut dyn BufRead>,
    pub(crate) output: &'io mut dyn Write,
}

/// String forms of the frequently-read special variables, refreshed
/// lazily; any global write or record read marks the cache dirty.
#[derive(Default)]
struct SpecialCache {
    fs: String,
    ofs: String,
    ors: String,
    rs: String,
    subsep: String,
    convfmt: String,
    ofmt: String,
    fpat: String,
    ignorecase: bool,
    dirty: bool,
}

/// The tree-walking AWK interpreter.
///
/// Owns the global environment, the current record and its field vector
/// (kept consistent through the `record_dirty`/`fields_dirty` pair - at
/// most one is set), the regex cache and the open-stream registries.
pub struct Interpreter<'p> {
    program: &'p Program,
    pub(crate) env: Environment<'p>,

    /// Current record ($0) and its split fields
    record: String,
    fields: Vec<String>,
    /// $0 was assigned; fields must be re-split before use
    record_dirty: bool,
    /// A field was assigned; $0 must be rebuilt before use
    fields_dirty: bool,

    special: SpecialCache,
    pub(crate) regex_cache: RegexCache,
    /// Per-rule activation state for range patterns
    range_active: Vec<bool>,

    pub(crate) i18n: I18n,

    rand_seed: u64,
    rand_state: u64,

    /// Control-flow signal crossing a function-call boundary
    /// (exit/next/nextfile raised inside a called function)
    pub(crate) pending_signal: Option<Flow>,
    exit_code: i32,

    /// Open streams, keyed by their user-visible target string
    pub(crate) output_targets: HashMap<String, OutputTarget>,
    pub(crate) input_files: HashMap<String, std::io::BufReader<std::fs::File>>,
    pub(crate) input_pipes: HashMap<String, PipeInput>,
    pub(crate) coprocesses: HashMap<String, Coprocess>,
}

impl<'p> Interpreter<'p> {
    pub fn new(program: &'p Program) -> Self {
        let mut env = Environment::new();
        for func in &program.functions {
            env.register_function(func);
        }

        let rand_seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(12345);

        Self {
            program,
            env,
            record: String::new(),
            fields: Vec::new(),
            record_dirty: false,
            fields_dirty: false,
            special: SpecialCache {
                dirty: true,
                ..Default::default()
            },
            regex_cache: RegexCache::new(),
            range_active: Vec::new(),
            i18n: I18n::new(),
            rand_seed,
            rand_state: rand_seed | 1,
            pending_signal: None,
            exit_code: 0,
            output_targets: HashMap::new(),
            input_files: HashMap::new(),
            input_pipes: HashMap::new(),
            coprocesses: HashMap::new(),
        }
    }

    /// Pre-assign ARGC/ARGV from the command line (ARGV[0] is "awk").
    pub fn set_args(&mut self, args: Vec<String>) {
        self.env.set_argv(&args);
        self.special.dirty = true;
    }

    /// Set the field separator (the -F option).
    pub fn set_fs(&mut self, fs: &str) {
        self.env.set_global("FS", Value::str(fs));
        self.special.dirty = true;
    }

    /// Pre-assign a variable (the -v option); the caller decides the tag.
    pub fn set_var(&mut self, name: &str, value: Value) {
        self.env.set_global(name, value);
        self.special.dirty = true;
    }

    /// Run the program: BEGIN rules, the per-file record loop with
    /// BEGINFILE/ENDFILE, then END rules, then stream cleanup. Returns
    /// the exit status (0 unless `exit N` ran).
    pub fn run<'a, W: Write>(
        &mut self,
        inputs: Vec<(String, Box<dyn BufRead + 'a>)>,
        output: &mut W,
    ) -> Result<i32> {
        self.run_dyn(inputs, output)
    }

    fn run_dyn(
        &mut self,
        inputs: Vec<(String, Box<dyn BufRead + '_>)>,
        output: &mut dyn Write,
    ) -> Result<i32> {
        let program = self.program;
        self.range_active = vec![false; program.rules.len()];

        if self.env.get_global("ARGC").to_number() == 0.0 {
            let mut argv = vec!["awk".to_string()];
            argv.extend(inputs.iter().map(|(name, _)| name.clone()));
            self.env.set_argv(&argv);
            self.special.dirty = true;
        }

        let mut exited = false;

        for rule in &program.rules {
            if !matches!(rule.pattern, Some(Pattern::Begin)) {
                continue;
            }
            if let Some(action) = &rule.action {
                let mut io = RunIo {
                    input: None,
                    output: &mut *output,
                };
                if let Flow::Exit(code) = self.execute_block(action, &mut io)? {
                    self.exit_code = code;
                    exited = true;
                    break;
                }
            }
        }

        if !exited {
            for (name, mut reader) in inputs {
                let flow = self.process_input(&name, reader.as_mut(), output)?;
                if let Flow::Exit(code) = flow {
                    self.exit_code = code;
                    break;
                }
            }
        }

        // An exit during BEGIN or the record loop still runs END rules;
        // exit inside END stops END processing immediately.
        for rule in &program.rules {
            if !matches!(rule.pattern, Some(Pattern::End)) {
                continue;
            }
            if let Some(action) = &rule.action {
                let mut io = RunIo {
                    input: None,
                    output: &mut *output,
                };
                if let Flow::Exit(code) = self.execute_block(action, &mut io)? {
                    self.exit_code = code;
                    break;
                }
            }
        }

        self.cleanup_io();
        output.flush().ok();
        Ok(self.exit_code)
    }

    /// One input target: BEGINFILE, the record loop, ENDFILE.
    /// Returns Flow::Exit to abort the remaining targets.
    fn process_input(
        &mut self,
        name: &str,
        reader: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Flow> {
        let program = self.program;

        self.env
            .set_global("FILENAME", Value::from_input(name.to_string()));
        self.env.set_global("FNR", Value::num(0.0));
        self.special.dirty = true;

        let mut result = Flow::Normal;
        let mut skip_records = false;

        for rule in &program.rules {
            if !matches!(rule.pattern, Some(Pattern::BeginFile)) {
                continue;
            }
            if let Some(action) = &rule.action {
                let mut io = RunIo {
                    input: None,
                    output: &mut *output,
                };
                match self.execute_block(action, &mut io)? {
                    Flow::Exit(code) => {
                        result = Flow::Exit(code);
                        skip_records = true;
                    }
                    Flow::Nextfile => skip_records = true,
                    _ => {}
                }
            }
            if skip_records {
                break;
            }
        }

        if !skip_records {
            'records: loop {
                if !self.read_record(reader)? {
                    break;
                }

                for (idx, rule) in program.rules.iter().enumerate() {
                    if matches!(
                        rule.pattern,
                        Some(
                            Pattern::Begin
                                | Pattern::End
                                | Pattern::BeginFile
                                | Pattern::EndFile
                        )
                    ) {
                        continue;
                    }

                    let mut io = RunIo {
                        input: Some(&mut *reader),
                        output: &mut *output,
                    };
                    if !self.pattern_matches(idx, &mut io)? {
                        continue;
                    }

                    let flow = match &rule.action {
                        Some(action) => self.execute_block(action, &mut io)?,
                        None => {
                            self.print_default_action(&mut io)?;
                            Flow::Normal
                        }
                    };

                    match flow {
                        Flow::Normal => {}
                        Flow::Next => continue 'records,
                        Flow::Nextfile => break 'records,
                        Flow::Exit(code) => {
                            result = Flow::Exit(code);
                            break 'records;
                        }
                        Flow::Break | Flow::Continue => {
                            eprintln!("awk: break or continue outside a loop");
                        }
                        Flow::Return(_) => {
                            eprintln!("awk: return outside a function");
                        }
                    }
                }
            }
        }

        for rule in &program.rules {
            if !matches!(rule.pattern, Some(Pattern::EndFile)) {
                continue;
            }
            if let Some(action) = &rule.action {
                let mut io = RunIo {
                    input: None,
                    output: &mut *output,
                };
                if let Flow::Exit(code) = self.execute_block(action, &mut io)? {
                    result = Flow::Exit(code);
                    break;
                }
            }
        }

        Ok(result)
    }

    // ------------------------------------------------------------------
    // Record reading
    // ------------------------------------------------------------------

    fn read_record(&mut self, reader: &mut dyn BufRead) -> Result<bool> {
        let rs = self.rs();
        match read_one_record(reader, &rs)? {
            Some((record, rt)) => {
                self.env.set_global("RT", Value::str(rt));
                let nr = self.env.get_global("NR").to_number() + 1.0;
                let fnr = self.env.get_global("FNR").to_number() + 1.0;
                self.env.set_global("NR", Value::num(nr));
                self.env.set_global("FNR", Value::num(fnr));
                self.record = record;
                self.record_dirty = true;
                self.fields_dirty = false;
                self.special.dirty = true;
                Ok(true)
            }
            None => {
                self.env.set_global("RT", Value::str(""));
                self.special.dirty = true;
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------
    // Fields and $0
    // ------------------------------------------------------------------

    /// Re-split the record when a new record or a $0 write left it dirty.
    pub(crate) fn parse_fields(&mut self) -> Result<()> {
        if !self.record_dirty {
            return Ok(());
        }
        self.record_dirty = false;
        self.fields_dirty = false;

        let record = std::mem::take(&mut self.record);
        let result = self.split_record(&record);
        self.record = record;
        let fields = result?;

        self.fields = fields;
        self.env
            .set_global("NF", Value::num(self.fields.len() as f64));
        self.special.dirty = true;
        Ok(())
    }

    fn split_record(&mut self, record: &str) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        if record.is_empty() {
            return Ok(fields);
        }

        // FPAT describes the fields themselves, not the separators
        let fpat = self.fpat();
        if !fpat.is_empty() {
            match self.get_regex(&fpat) {
                Ok(re) => {
                    fields.extend(re.find_iter(record).map(|m| m.as_str().to_string()));
                }
                Err(e) => {
                    eprintln!("awk: FPAT: {}", e);
                    fields.push(record.to_string());
                }
            }
            return Ok(fields);
        }

        let fs = self.fs();

        // In paragraph mode a newline always separates fields
        if self.rs().is_empty() {
            if fs == " " {
                fields.extend(record.split_whitespace().map(String::from));
            } else {
                for line in record.split('\n') {
                    self.split_simple(line, &fs, &mut fields);
                }
            }
            return Ok(fields);
        }

        self.split_simple(record, &fs, &mut fields);
        Ok(fields)
    }

    fn split_simple(&mut self, record: &str, fs: &str, fields: &mut Vec<String>) {
        if record.is_empty() {
            return;
        }
        if fs == " " {
            fields.extend(record.split_whitespace().map(String::from));
        } else if fs.chars().count() == 1 {
            let sep = fs.chars().next().unwrap();
            fields.extend(record.split(sep).map(String::from));
        } else {
            match self.get_regex(fs) {
                Ok(re) => fields.extend(re.split(record).map(String::from)),
                Err(_) => {
                    // Unusable regex separator: fall back to a literal split
                    fields.extend(record.split(fs).map(String::from));
                }
            }
        }
    }

    /// Re-join $0 from the fields after a field write.
    pub(crate) fn rebuild_record(&mut self) {
        if !self.fields_dirty {
            return;
        }
        self.fields_dirty = false;
        let ofs = self.ofs();
        self.record = self.fields.join(&ofs);
    }

    pub(crate) fn get_field(&mut self, index: i64) -> Result<Value> {
        self.parse_fields()?;

        if index == 0 {
            self.rebuild_record();
            return Ok(Value::from_input(self.record.clone()));
        }
        if index < 0 {
            eprintln!("awk: attempt to read field {}", index);
            return Ok(Value::Uninitialized);
        }

        let i = index as usize;
        if i <= self.fields.len() {
            Ok(Value::from_input(self.fields[i - 1].clone()))
        } else {
            Ok(Value::Uninitialized)
        }
    }

    pub(crate) fn set_field(&mut self, index: i64, value: &Value) -> Result<()> {
        self.parse_fields()?;
        let convfmt = self.convfmt();

        if index == 0 {
            self.record = value.to_string_with(&convfmt);
            self.record_dirty = true;
            self.fields_dirty = false;
            self.parse_fields()?;
            return Ok(());
        }
        if index < 0 {
            eprintln!("awk: attempt to assign field {}", index);
            return Ok(());
        }

        let i = index as usize;
        if self.fields.len() < i {
            self.fields.resize(i, String::new());
        }
        self.fields[i - 1] = value.to_string_with(&convfmt);
        self.fields_dirty = true;
        self.env
            .set_global("NF", Value::num(self.fields.len() as f64));
        self.special.dirty = true;
        Ok(())
    }

    pub(crate) fn set_record(&mut self, record: String) -> Result<()> {
        self.record = record;
        self.record_dirty = true;
        self.fields_dirty = false;
        self.parse_fields()
    }

    /// $0 as a plain string, rebuilding or re-splitting as needed.
    pub(crate) fn record_text(&mut self) -> Result<String> {
        self.parse_fields()?;
        self.rebuild_record();
        Ok(self.record.clone())
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    pub(crate) fn get_variable(&mut self, name: &str) -> Result<Value> {
        if !self.env.has_local(name) && effective_name(name) == "NF" {
            // NF must reflect a pending re-split
            self.parse_fields()?;
        }
        Ok(self.env.get(name))
    }

    pub(crate) fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        if self.env.has_local(name) {
            self.env.set(name, value);
            return Ok(());
        }

        if effective_name(name) == "NF" {
            // Direct NF assignment truncates or pads the field vector
            self.parse_fields()?;
            let new_nf = value.to_number().max(0.0) as usize;
            if new_nf <= self.fields.len() {
                self.fields.truncate(new_nf);
            } else {
                self.fields.resize(new_nf, String::new());
            }
            self.fields_dirty = true;
            self.env.set_global("NF", Value::num(new_nf as f64));
        } else {
            self.env.set(name, value);
        }
        self.special.dirty = true;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Special-variable cache
    // ------------------------------------------------------------------

    fn refresh_special(&mut self) {
        if !self.special.dirty {
            return;
        }
        self.special.fs = self.env.get_global("FS").to_string_val();
        self.special.ofs = self.env.get_global("OFS").to_string_val();
        self.special.ors = self.env.get_global("ORS").to_string_val();
        self.special.rs = self.env.get_global("RS").to_string_val();
        self.special.subsep = self.env.get_global("SUBSEP").to_string_val();
        self.special.convfmt = self.env.get_global("CONVFMT").to_string_val();
        self.special.ofmt = self.env.get_global("OFMT").to_string_val();
        self.special.fpat = self.env.get_global("FPAT").to_string_val();
        self.special.ignorecase = self.env.get_global("IGNORECASE").is_truthy();
        self.special.dirty = false;
    }

    pub(crate) fn fs(&mut self) -> String {
        self.refresh_special();
        self.special.fs.clone()
    }

    pub(crate) fn ofs(&mut self) -> String {
        self.refresh_special();
        self.special.ofs.clone()
    }

    pub(crate) fn ors(&mut self) -> String {
        self.refresh_special();
        self.special.ors.clone()
    }

    pub(crate) fn rs(&mut self) -> String {
        self.refresh_special();
        self.special.rs.clone()
    }

    pub(crate) fn subsep(&mut self) -> String {
        self.refresh_special();
        self.special.subsep.clone()
    }

    pub(crate) fn convfmt(&mut self) -> String {
        self.refresh_special();
        self.special.convfmt.clone()
    }

    pub(crate) fn ofmt(&mut self) -> String {
        self.refresh_special();
        self.special.ofmt.clone()
    }

    pub(crate) fn fpat(&mut self) -> String {
        self.refresh_special();
        self.special.fpat.clone()
    }

    // ------------------------------------------------------------------
    // Regex and keys
    // ------------------------------------------------------------------

    pub(crate) fn get_regex(&mut self, pattern: &str) -> Result<Rc<Regex>> {
        self.refresh_special();
        let ignore_case = self.special.ignorecase;
        self.regex_cache.get(pattern, ignore_case)
    }

    pub(crate) fn make_key(&mut self, indices: &[Value]) -> String {
        let subsep = self.subsep();
        let convfmt = self.convfmt();
        join_array_key(indices, &subsep, &convfmt)
    }

    // ------------------------------------------------------------------
    // Patterns
    // ------------------------------------------------------------------

    fn pattern_matches(&mut self, idx: usize, io: &mut RunIo) -> Result<bool> {
        let program = self.program;
        match &program.rules[idx].pattern {
            None => Ok(true),
            Some(
                Pattern::Begin | Pattern::End | Pattern::BeginFile | Pattern::EndFile,
            ) => Ok(false),
            Some(Pattern::Expr(expr)) => self.eval_truthy(expr, io),
            Some(Pattern::Range { start, end }) => {
                if self.range_active[idx] {
                    // The record that matches the end still matches
                    if self.eval_truthy(end, io)? {
                        self.range_active[idx] = false;
                    }
                    Ok(true)
                } else if self.eval_truthy(start, io)? {
                    // A record matching both bounds fires exactly once
                    if !self.eval_truthy(end, io)? {
                        self.range_active[idx] = true;
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn print_default_action(&mut self, io: &mut RunIo) -> Result<()> {
        let record = self.record_text()?;
        let ors = self.ors();
        io.output.write_all(record.as_bytes())?;
        io.output.write_all(ors.as_bytes())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Random numbers (xorshift64)
    // ------------------------------------------------------------------

    pub(crate) fn next_random(&mut self) -> f64 {
        let mut x = self.rand_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rand_state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }

    pub(crate) fn reseed(&mut self, seed: Option<u64>) -> u64 {
        let old = self.rand_seed;
        let seed = seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });
        self.rand_seed = seed;
        self.rand_state = seed | 1;
        old
    }
}

/// Read one record delimited by RS. Returns the record text plus the
/// terminator actually seen (stored in RT), or None at end of input.
///
/// RS semantics: "\n" is line mode, "" is paragraph mode, a single
/// character splits at that byte, and multi-character RS reads in line
/// mode as a documented simplification.
pub(crate) fn read_one_record(
    reader: &mut dyn BufRead,
    rs: &str,
) -> Result<Option<(String, String)>> {
    if rs.is_empty() {
        return read_paragraph(reader);
    }
    if rs == "\n" || rs.chars().count() > 1 {
        return read_line_record(reader);
    }

    let delim = rs.as_bytes()[0];
    let mut buf = Vec::new();
    let n = reader.read_until(delim, &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    let rt = if buf.last() == Some(&delim) {
        buf.pop();
        rs.to_string()
    } else {
        String::new()
    };
    Ok(Some((String::from_utf8_lossy(&buf).into_owned(), rt)))
}

fn read_line_record(reader: &mut dyn BufRead) -> Result<Option<(String, String)>> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    let rt = if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        "\n".to_string()
    } else {
        String::new()
    };
    Ok(Some((String::from_utf8_lossy(&buf).into_owned(), rt)))
}

fn read_paragraph(reader: &mut dyn BufRead) -> Result<Option<(String, String)>> {
    // Skip leading blank lines
    let mut record;
    loop {
        match read_line_record(reader)? {
            None => return Ok(None),
            Some((line, _)) if line.is_empty() => continue,
            Some((line, _)) => {
                record = line;
                break;
            }
        }
    }

    loop {
        match read_line_record(reader)? {
            None => return Ok(Some((record, String::new()))),
            Some((line, _)) if line.is_empty() => return Ok(Some((record, "\n".to_string()))),
            Some((line, _)) => {
                record.push('\n');
                record.push_str(&line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use std::io::Cursor;

    fn run_awk(program: &str, input: &str) -> String {
        let tokens = Lexer::new(program).tokenize();
        let mut parser = Parser::new(tokens);
        let ast = parser.parse().unwrap();

        let mut interpreter = Interpreter::new(&ast);
        let mut output = Vec::new();
        let inputs: Vec<(String, Box<dyn BufRead>)> = if input.is_empty() {
            vec![]
        } else {
            vec![(String::new(), Box::new(Cursor::new(input.to_string())))]
        };

        interpreter.run(inputs, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_begin_print() {
        assert_eq!(run_awk(r#"BEGIN { print "hello" }"#, ""), "hello\n");
    }

    #[test]
    fn test_print_field() {
        assert_eq!(run_awk("{ print $1 }", "one two three"), "one\n");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run_awk("BEGIN { print 2 + 3 * 4 }", ""), "14\n");
    }

    #[test]
    fn test_pattern_match() {
        assert_eq!(run_awk("/two/ { print $0 }", "one\ntwo\nthree"), "two\n");
    }

    #[test]
    fn test_default_action_prints_record() {
        assert_eq!(run_awk("/b/", "a\nb\nab"), "b\nab\n");
    }

    #[test]
    fn test_record_reader_line_mode() {
        let mut input = Cursor::new("a\nb");
        let reader: &mut dyn BufRead = &mut input;
        assert_eq!(
            read_one_record(reader, "\n").unwrap(),
            Some(("a".to_string(), "\n".to_string()))
        );
        assert_eq!(
            read_one_record(reader, "\n").unwrap(),
            Some(("b".to_string(), String::new()))
        );
        assert_eq!(read_one_record(reader, "\n").unwrap(), None);
    }

    #[test]
    fn test_record_reader_single_char() {
        let mut input = Cursor::new("a:b:c");
        let reader: &mut dyn BufRead = &mut input;
        assert_eq!(
            read_one_record(reader, ":").unwrap(),
            Some(("a".to_string(), ":".to_string()))
        );
        assert_eq!(
            read_one_record(reader, ":").unwrap(),
            Some(("b".to_string(), ":".to_string()))
        );
        assert_eq!(
            read_one_record(reader, ":").unwrap(),
            Some(("c".to_string(), String::new()))
        );
    }

    #[test]
    fn test_record_reader_paragraph_mode() {
        let mut input = Cursor::new("\n\nfirst a\nfirst b\n\n\nsecond\n");
        let reader: &mut dyn BufRead = &mut input;
        assert_eq!(
            read_one_record(reader, "").unwrap(),
            Some(("first a\nfirst b".to_string(), "\n".to_string()))
        );
        assert_eq!(
            read_one_record(reader, "").unwrap(),
            Some(("second".to_string(), String::new()))
        );
        assert_eq!(read_one_record(reader, "").unwrap(), None);
    }

    #[test]
    fn test_range_state_machine() {
        let output = run_awk("/on/,/off/ { print }", "x\non\na\noff\ny\non\nb\n");
        assert_eq!(output, "on\na\noff\non\nb\n");
    }

    #[test]
    fn test_nf_assignment_truncates() {
        let output = run_awk("{ NF = 2; print $0; print NF }", "a b c d");
        assert_eq!(output, "a b\n2\n");
    }

    #[test]
    fn test_nf_assignment_extends() {
        let output = run_awk("{ NF = 4; print $0 \"|\" }", "a b");
        assert_eq!(output, "a b  |\n");
    }

    #[test]
    fn test_field_write_rebuilds_record() {
        let output = run_awk(r#"{ $2 = "X"; print }"#, "a b c");
        assert_eq!(output, "a X c\n");
    }

    #[test]
    fn test_extended_field_assignment() {
        let output = run_awk(r#"{ $5 = "z"; print NF; print $0 }"#, "a b");
        assert_eq!(output, "5\na b   z\n");
    }
}
