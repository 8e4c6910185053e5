use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::ast::RedirectKind;
use crate::error::Result;

use super::{read_one_record, Interpreter, RunIo};

/// Result of one getline read attempt
pub(crate) enum GetlineRead {
    Line(String),
    Eof,
    Failed,
}

/// A `cmd | getline` input pipe
pub(crate) struct PipeInput {
    child: Child,
    pub(crate) reader: BufReader<ChildStdout>,
}

/// A `|&` coprocess: both ends of the child are connected. Reads flush
/// the write side first so round-trips cannot deadlock on buffering.
pub(crate) struct Coprocess {
    child: Child,
    pub(crate) stdin: Option<ChildStdin>,
    pub(crate) reader: BufReader<ChildStdout>,
}

/// An entry of the output registry
pub(crate) enum OutputTarget {
    File(File),
    Pipe {
        child: Child,
        stdin: Option<ChildStdin>,
    },
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            OutputTarget::File(f) => f.write(buf),
            OutputTarget::Pipe { stdin, .. } => match stdin {
                Some(s) => s.write(buf),
                None => Ok(buf.len()),
            },
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            OutputTarget::File(f) => f.flush(),
            OutputTarget::Pipe { stdin, .. } => match stdin {
                Some(s) => s.flush(),
                None => Ok(()),
            },
        }
    }
}

impl<'p> Interpreter<'p> {
    /// Route redirected print/printf output. Special targets map to the
    /// process streams without touching the registry.
    pub(crate) fn write_redirected(
        &mut self,
        target: &str,
        kind: RedirectKind,
        data: &[u8],
        io: &mut RunIo,
    ) -> Result<()> {
        match target {
            "/dev/stdout" | "-" => {
                io.output.write_all(data)?;
                return Ok(());
            }
            "/dev/stderr" => {
                std::io::stderr().write_all(data)?;
                return Ok(());
            }
            "/dev/null" => return Ok(()),
            _ => {}
        }

        match kind {
            RedirectKind::Write | RedirectKind::Append => {
                let append = kind == RedirectKind::Append;
                if let Some(stream) = self.open_output_file(target, append) {
                    stream.write_all(data)?;
                }
            }
            RedirectKind::Pipe => {
                if let Some(stream) = self.open_output_pipe(target) {
                    stream.write_all(data)?;
                }
            }
            RedirectKind::PipeBoth => {
                if let Some(coproc) = self.open_coprocess(target) {
                    if let Some(stdin) = coproc.stdin.as_mut() {
                        stdin.write_all(data)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// `> target` truncates on first open; the entry is reused until
    /// close(), after which a reopen truncates again.
    fn open_output_file(&mut self, name: &str, append: bool) -> Option<&mut OutputTarget> {
        if !self.output_targets.contains_key(name) {
            let opened = if append {
                OpenOptions::new().create(true).append(true).open(name)
            } else {
                File::create(name)
            };
            match opened {
                Ok(file) => {
                    self.output_targets
                        .insert(name.to_string(), OutputTarget::File(file));
                }
                Err(e) => {
                    eprintln!("awk: can't open file {} for output: {}", name, e);
                    return None;
                }
            }
        }
        self.output_targets.get_mut(name)
    }

    fn open_output_pipe(&mut self, command: &str) -> Option<&mut OutputTarget> {
        if !self.output_targets.contains_key(command) {
            match Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::piped())
                .spawn()
            {
                Ok(mut child) => {
                    let stdin = child.stdin.take();
                    self.output_targets
                        .insert(command.to_string(), OutputTarget::Pipe { child, stdin });
                }
                Err(e) => {
                    eprintln!("awk: can't open pipe to command {}: {}", command, e);
                    return None;
                }
            }
        }
        self.output_targets.get_mut(command)
    }

    fn open_coprocess(&mut self, command: &str) -> Option<&mut Coprocess> {
        if !self.coprocesses.contains_key(command) {
            match Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
            {
                Ok(mut child) => {
                    let stdin = child.stdin.take();
                    let stdout = child.stdout.take()?;
                    self.coprocesses.insert(
                        command.to_string(),
                        Coprocess {
                            child,
                            stdin,
                            reader: BufReader::new(stdout),
                        },
                    );
                }
                Err(e) => {
                    eprintln!("awk: can't open coprocess {}: {}", command, e);
                    return None;
                }
            }
        }
        self.coprocesses.get_mut(command)
    }

    // ------------------------------------------------------------------
    // getline sources
    // ------------------------------------------------------------------

    pub(crate) fn read_from_input_file(&mut self, name: &str, rs: &str) -> Result<GetlineRead> {
        if !self.input_files.contains_key(name) {
            match File::open(name) {
                Ok(file) => {
                    self.input_files
                        .insert(name.to_string(), BufReader::new(file));
                }
                Err(e) => {
                    eprintln!("awk: can't open file {} for reading: {}", name, e);
                    return Ok(GetlineRead::Failed);
                }
            }
        }
        let reader = self.input_files.get_mut(name).unwrap();
        match read_one_record(reader, rs)? {
            Some((line, _)) => Ok(GetlineRead::Line(line)),
            None => Ok(GetlineRead::Eof),
        }
    }

    pub(crate) fn read_from_input_pipe(&mut self, command: &str, rs: &str) -> Result<GetlineRead> {
        if !self.input_pipes.contains_key(command) {
            match Command::new("sh")
                .arg("-c")
                .arg(command)
                .stdout(Stdio::piped())
                .spawn()
            {
                Ok(mut child) => match child.stdout.take() {
                    Some(stdout) => {
                        self.input_pipes.insert(
                            command.to_string(),
                            PipeInput {
                                child,
                                reader: BufReader::new(stdout),
                            },
                        );
                    }
                    None => return Ok(GetlineRead::Failed),
                },
                Err(e) => {
                    eprintln!("awk: can't open pipe from command {}: {}", command, e);
                    return Ok(GetlineRead::Failed);
                }
            }
        }
        let pipe = self.input_pipes.get_mut(command).unwrap();
        match read_one_record(&mut pipe.reader, rs)? {
            Some((line, _)) => Ok(GetlineRead::Line(line)),
            None => Ok(GetlineRead::Eof),
        }
    }

    pub(crate) fn read_from_coprocess(&mut self, command: &str, rs: &str) -> Result<GetlineRead> {
        if self.open_coprocess(command).is_none() {
            return Ok(GetlineRead::Failed);
        }
        let coproc = self.coprocesses.get_mut(command).unwrap();
        if let Some(stdin) = coproc.stdin.as_mut() {
            stdin.flush().ok();
        }
        match read_one_record(&mut coproc.reader, rs)? {
            Some((line, _)) => Ok(GetlineRead::Line(line)),
            None => Ok(GetlineRead::Eof),
        }
    }

    // ------------------------------------------------------------------
    // close / fflush / system
    // ------------------------------------------------------------------

    /// close(target): 0 when a stream was found in any registry, -1
    /// otherwise. Pipes and coprocesses wait for their child.
    pub(crate) fn close_stream(&mut self, target: &str) -> f64 {
        if let Some(stream) = self.output_targets.remove(target) {
            close_output(target, stream);
            return 0.0;
        }
        if self.input_files.remove(target).is_some() {
            return 0.0;
        }
        if let Some(mut pipe) = self.input_pipes.remove(target) {
            if let Err(e) = pipe.child.wait() {
                eprintln!("awk: close {}: {}", target, e);
            }
            return 0.0;
        }
        if let Some(mut coproc) = self.coprocesses.remove(target) {
            drop(coproc.stdin.take());
            if let Err(e) = coproc.child.wait() {
                eprintln!("awk: close {}: {}", target, e);
            }
            return 0.0;
        }
        -1.0
    }

    /// fflush(): no target flushes everything, "" flushes stdout, a
    /// target string flushes that stream.
    pub(crate) fn flush_stream(&mut self, target: Option<&str>, io: &mut RunIo) -> f64 {
        match target {
            None => {
                io.output.flush().ok();
                for stream in self.output_targets.values_mut() {
                    stream.flush().ok();
                }
                for coproc in self.coprocesses.values_mut() {
                    if let Some(stdin) = coproc.stdin.as_mut() {
                        stdin.flush().ok();
                    }
                }
                0.0
            }
            Some("") => {
                io.output.flush().ok();
                0.0
            }
            Some(name) => {
                if let Some(stream) = self.output_targets.get_mut(name) {
                    stream.flush().ok();
                    return 0.0;
                }
                if let Some(coproc) = self.coprocesses.get_mut(name) {
                    if let Some(stdin) = coproc.stdin.as_mut() {
                        stdin.flush().ok();
                    }
                    return 0.0;
                }
                -1.0
            }
        }
    }

    /// system(cmd): pending output is flushed before the child runs so
    /// interleaving matches statement order.
    pub(crate) fn run_system(&mut self, command: &str, io: &mut RunIo) -> f64 {
        self.flush_stream(None, io);
        match Command::new("sh").arg("-c").arg(command).status() {
            Ok(status) => status.code().unwrap_or(-1) as f64,
            Err(e) => {
                eprintln!("awk: system: {}", e);
                -1.0
            }
        }
    }

    /// Release every registry entry at the end of run(); children are
    /// waited for, failures reported but not fatal.
    pub(crate) fn cleanup_io(&mut self) {
        for (name, stream) in std::mem::take(&mut self.output_targets) {
            close_output(&name, stream);
        }
        self.input_files.clear();
        for (name, mut pipe) in std::mem::take(&mut self.input_pipes) {
            if let Err(e) = pipe.child.wait() {
                eprintln!("awk: close {}: {}", name, e);
            }
        }
        for (name, mut coproc) in std::mem::take(&mut self.coprocesses) {
            drop(coproc.stdin.take());
            if let Err(e) = coproc.child.wait() {
                eprintln!("awk: close {}: {}", name, e);
            }
        }
    }
}

fn close_output(name: &str, stream: OutputTarget) {
    match stream {
        OutputTarget::File(mut file) => {
            file.flush().ok();
        }
        OutputTarget::Pipe { mut child, stdin } => {
            drop(stdin);
            if let Err(e) = child.wait() {
                eprintln!("awk: close {}: {}", name, e);
            }
        }
    }
}
