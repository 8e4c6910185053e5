use std::env;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::process;

use grawk::{Interpreter, Lexer, Parser, Value};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    process::exit(run(&args));
}

fn run(args: &[String]) -> i32 {
    let mut field_separator: Option<String> = None;
    let mut program_source: Option<String> = None;
    let mut program_dir: Option<std::path::PathBuf> = None;
    let mut input_files: Vec<String> = Vec::new();
    let mut assignments: Vec<(String, String)> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];

        if arg == "-h" || arg == "--help" {
            print_help();
            return 0;
        }

        if arg == "--version" {
            println!("grawk {}", env!("CARGO_PKG_VERSION"));
            return 0;
        }

        if arg == "-F" {
            i += 1;
            let Some(fs) = args.get(i) else {
                eprintln!("awk: option -F requires an argument");
                return 1;
            };
            field_separator = Some(fs.clone());
        } else if let Some(fs) = arg.strip_prefix("-F") {
            field_separator = Some(fs.to_string());
        } else if arg == "-v" {
            i += 1;
            let Some(assignment) = args.get(i) else {
                eprintln!("awk: option -v requires an argument");
                return 1;
            };
            match assignment.split_once('=') {
                Some((name, value)) => {
                    assignments.push((name.to_string(), value.to_string()));
                }
                None => {
                    eprintln!("awk: invalid -v argument: {}", assignment);
                    return 1;
                }
            }
        } else if arg == "-f" {
            i += 1;
            let Some(path) = args.get(i) else {
                eprintln!("awk: option -f requires an argument");
                return 1;
            };
            match fs::read_to_string(path) {
                Ok(source) => {
                    program_source = Some(source);
                    program_dir = std::path::Path::new(path).parent().map(|p| p.to_path_buf());
                }
                Err(e) => {
                    eprintln!("awk: can't open file {}: {}", path, e);
                    return 1;
                }
            }
        } else if arg == "--" {
            i += 1;
            break;
        } else if arg.starts_with('-') && arg.len() > 1 {
            eprintln!("awk: unknown option: {}", arg);
            return 1;
        } else {
            break;
        }

        i += 1;
    }

    // The first non-option argument is the program unless -f was given
    if program_source.is_none() {
        match args.get(i) {
            Some(source) => {
                program_source = Some(source.clone());
                i += 1;
            }
            None => {
                eprintln!("awk: no program given");
                print_help();
                return 1;
            }
        }
    }
    input_files.extend(args[i..].iter().cloned());

    let source = program_source.unwrap();
    let tokens = Lexer::new(&source).tokenize();
    let mut parser = match program_dir {
        Some(dir) => Parser::with_base_dir(tokens, dir),
        None => Parser::new(tokens),
    };
    let program = match parser.parse() {
        Ok(program) => program,
        Err(_) => {
            for error in parser.errors() {
                eprintln!("awk: {}", error);
            }
            return 1;
        }
    };

    let mut interpreter = Interpreter::new(&program);

    if let Some(fs) = &field_separator {
        interpreter.set_fs(fs);
    }

    // -v values that parse cleanly as numbers are stored as numbers
    for (name, value) in &assignments {
        match value.parse::<f64>() {
            Ok(n) => interpreter.set_var(name, Value::num(n)),
            Err(_) => interpreter.set_var(name, Value::str(value.clone())),
        }
    }

    let mut argv = vec!["awk".to_string()];
    argv.extend(input_files.iter().cloned());
    interpreter.set_args(argv);

    let mut inputs: Vec<(String, Box<dyn BufRead>)> = Vec::new();
    if input_files.is_empty() {
        inputs.push((String::new(), Box::new(BufReader::new(io::stdin()))));
    } else {
        for name in &input_files {
            if name == "-" {
                inputs.push((name.clone(), Box::new(BufReader::new(io::stdin()))));
            } else {
                match File::open(name) {
                    Ok(file) => inputs.push((name.clone(), Box::new(BufReader::new(file)))),
                    Err(e) => {
                        eprintln!("awk: can't open file {}: {}", name, e);
                    }
                }
            }
        }
    }

    let stdout = io::stdout();
    let mut output = stdout.lock();

    match interpreter.run(inputs, &mut output) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("awk: {}", e);
            2
        }
    }
}

fn print_help() {
    println!(
        r#"Usage: grawk [options] 'program' [file ...]
       grawk [options] -f progfile [file ...]

An AWK interpreter: POSIX core plus the common gawk extensions.

Options:
  -F fs            Set the field separator to fs
  -v var=value     Assign value to variable before execution
  -f progfile      Read the AWK program from a file
  -h, --help       Print this help message
  --version        Print version information
  --               End of options

Extensions:
  BEGINFILE/ENDFILE, @include, @namespace, indirect calls (@f),
  coprocesses (|&), FPAT, RT, IGNORECASE, SYMTAB, FUNCTAB,
  gensub(), patsplit(), asort(), asorti(), switch/case,
  dcgettext()/dcngettext()/bindtextdomain()

Examples:
  grawk '{{ print $1 }}' file.txt
  grawk -F: '{{ print $1 }}' /etc/passwd
  grawk 'BEGIN {{ print "Hello" }}'
"#
    );
}
