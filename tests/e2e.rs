//! End-to-end tests: complete AWK programs through the library API.

use std::io::{BufRead, Cursor};

use grawk::{Interpreter, Lexer, Parser};

/// Run an AWK program with the given input and return its output
fn run_awk(program: &str, input: &str) -> Result<String, String> {
    run_awk_files(program, &[("", input)]).map(|(out, _)| out)
}

/// Run a program and also report the exit status
fn run_awk_status(program: &str, input: &str) -> (String, i32) {
    let (out, code) = run_awk_files(program, &[("", input)]).unwrap();
    (out, code)
}

/// Run a program over several named inputs
fn run_awk_files(program: &str, files: &[(&str, &str)]) -> Result<(String, i32), String> {
    let tokens = Lexer::new(program).tokenize();
    let mut parser = Parser::new(tokens);
    let ast = parser.parse().map_err(|e| e.to_string())?;

    let mut interpreter = Interpreter::new(&ast);
    let mut output = Vec::new();

    let inputs: Vec<(String, Box<dyn BufRead>)> = files
        .iter()
        .filter(|(_, content)| !(files.len() == 1 && content.is_empty()))
        .map(|(name, content)| {
            (
                name.to_string(),
                Box::new(Cursor::new(content.to_string())) as Box<dyn BufRead>,
            )
        })
        .collect();

    let code = interpreter
        .run(inputs, &mut output)
        .map_err(|e| e.to_string())?;
    let text = String::from_utf8(output).map_err(|e| e.to_string())?;
    Ok((text, code))
}

// ============================================================================
// Basic output
// ============================================================================

#[test]
fn test_hello_world() {
    let output = run_awk(r#"BEGIN { print "Hello, World!" }"#, "").unwrap();
    assert_eq!(output, "Hello, World!\n");
}

#[test]
fn test_print_number_formats() {
    assert_eq!(run_awk("BEGIN { print 42 }", "").unwrap(), "42\n");
    assert_eq!(run_awk("BEGIN { print 3.14159 }", "").unwrap(), "3.14159\n");
    assert_eq!(run_awk("BEGIN { print 1e10 }", "").unwrap(), "10000000000\n");
}

#[test]
fn test_print_multiple_values() {
    let output = run_awk(r#"BEGIN { print "a", "b", "c" }"#, "").unwrap();
    assert_eq!(output, "a b c\n");
}

#[test]
fn test_print_concatenation() {
    let output = run_awk(r#"BEGIN { print "hello" "world" }"#, "").unwrap();
    assert_eq!(output, "helloworld\n");
}

#[test]
fn test_concat_is_associative() {
    let left = run_awk(r#"BEGIN { print (("a" "b") "c") }"#, "").unwrap();
    let right = run_awk(r#"BEGIN { print ("a" ("b" "c")) }"#, "").unwrap();
    assert_eq!(left, right);
    assert_eq!(left, "abc\n");
}

#[test]
fn test_ofs_ors() {
    assert_eq!(
        run_awk(r#"BEGIN { OFS="-"; print "a", "b" }"#, "").unwrap(),
        "a-b\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { ORS="!"; print "x" }"#, "").unwrap(),
        "x!"
    );
}

// ============================================================================
// Fields and records
// ============================================================================

#[test]
fn test_field_access() {
    assert_eq!(run_awk("{ print $0 }", "hello world").unwrap(), "hello world\n");
    assert_eq!(run_awk("{ print $1 }", "one two three").unwrap(), "one\n");
    assert_eq!(run_awk("{ print $NF }", "a b c d").unwrap(), "d\n");
    assert_eq!(run_awk("{ print $(NF-1) }", "a b c d").unwrap(), "c\n");
}

#[test]
fn test_out_of_range_field_is_empty() {
    assert_eq!(run_awk(r#"{ print "[" $9 "]" }"#, "a b").unwrap(), "[]\n");
}

#[test]
fn test_negative_field_is_empty() {
    assert_eq!(run_awk(r#"{ print "[" $-1 "]" }"#, "a b").unwrap(), "[]\n");
}

#[test]
fn test_round_trip_record() {
    // Untouched records print back exactly, terminator stripped
    assert_eq!(
        run_awk("{ print }", "  spaced   out  ").unwrap(),
        "  spaced   out  \n"
    );
}

#[test]
fn test_field_assignment_rebuilds_record() {
    assert_eq!(
        run_awk(r#"{ $2 = "X"; print }"#, "a b c").unwrap(),
        "a X c\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { OFS="-" } { $1 = $1; print }"#, "a b c").unwrap(),
        "a-b-c\n"
    );
}

#[test]
fn test_extended_field_assignment_pads_with_empties() {
    let output = run_awk(r#"{ $5 = "z"; print NF; print $0 "|" }"#, "a b").unwrap();
    assert_eq!(output, "5\na b   z|\n");
}

#[test]
fn test_record_assignment_resplits() {
    assert_eq!(
        run_awk(r#"{ $0 = "x y"; print NF, $2 }"#, "whatever").unwrap(),
        "2 y\n"
    );
}

#[test]
fn test_fs_single_char() {
    assert_eq!(
        run_awk(r#"BEGIN { FS=":" } { print $1, $3 }"#, "root:x:0:0").unwrap(),
        "root 0\n"
    );
    // A single-character FS is literal, even a regex metacharacter
    assert_eq!(
        run_awk(r#"BEGIN { FS="." } { print $2 }"#, "a.b.c").unwrap(),
        "b\n"
    );
}

#[test]
fn test_fs_regex() {
    assert_eq!(
        run_awk(r#"BEGIN { FS="[,;]" } { print $2 }"#, "a;b,c").unwrap(),
        "b\n"
    );
}

#[test]
fn test_fs_preserves_empty_fields() {
    assert_eq!(
        run_awk(r#"BEGIN { FS="," } { print NF }"#, "a,,b,").unwrap(),
        "4\n"
    );
}

#[test]
fn test_fpat_matches_fields() {
    let output = run_awk(
        r#"BEGIN { FPAT="[0-9]+" } { print NF, $1, $2 }"#,
        "ab12cd34ef",
    )
    .unwrap();
    assert_eq!(output, "2 12 34\n");
}

#[test]
fn test_nf_truncation_and_extension() {
    assert_eq!(
        run_awk("{ NF = 2; print $0; print NF }", "a b c d").unwrap(),
        "a b\n2\n"
    );
    assert_eq!(
        run_awk(r#"{ NF = 4; print $0 "|" }"#, "a b").unwrap(),
        "a b  |\n"
    );
}

#[test]
fn test_huge_field_assignment() {
    let output = run_awk(r#"BEGIN { $1000000 = "x"; print NF }"#, "").unwrap();
    assert_eq!(output, "1000000\n");
}

// ============================================================================
// Record separators
// ============================================================================

#[test]
fn test_rs_single_char() {
    assert_eq!(
        run_awk(r#"BEGIN { RS=":" } { print NR, $0 }"#, "a:b:c").unwrap(),
        "1 a\n2 b\n3 c\n"
    );
}

#[test]
fn test_rt_reports_terminator() {
    assert_eq!(
        run_awk(r#"BEGIN { RS=":" } { printf "[%s]", RT }"#, "a:b").unwrap(),
        "[:][]"
    );
}

#[test]
fn test_paragraph_mode() {
    let input = "word1 word2\nword3 word4 word5\n\npara2\n";
    assert_eq!(
        run_awk(r#"BEGIN { RS="" } NR==1 { print NF }"#, input).unwrap(),
        "5\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { RS="" } { print NR ": " $0 }"#, "\n\na\nb\n\nc\n").unwrap(),
        "1: a\nb\n2: c\n"
    );
}

#[test]
fn test_paragraph_mode_newline_separates_fields() {
    let output = run_awk(
        r#"BEGIN { RS=""; FS=":" } { print NF, $2, $3 }"#,
        "a:b\nc:d\n\n",
    )
    .unwrap();
    assert_eq!(output, "4 b c\n");
}

// ============================================================================
// Patterns
// ============================================================================

#[test]
fn test_regex_pattern() {
    assert_eq!(
        run_awk("/two/ { print }", "one\ntwo\nthree").unwrap(),
        "two\n"
    );
}

#[test]
fn test_negated_regex_pattern() {
    assert_eq!(
        run_awk("!/skip/ { print }", "a\nskip me\nb").unwrap(),
        "a\nb\n"
    );
}

#[test]
fn test_expression_pattern() {
    assert_eq!(
        run_awk("NR % 2 == 1 { print }", "a\nb\nc\nd").unwrap(),
        "a\nc\n"
    );
}

#[test]
fn test_range_pattern() {
    let input = "before\nBEGIN\nx\ny\nEND\nafter\n";
    assert_eq!(
        run_awk("/BEGIN/,/END/ { print }", input).unwrap(),
        "BEGIN\nx\ny\nEND\n"
    );
}

#[test]
fn test_range_pattern_single_record() {
    // A record matching both ends fires once and stays inactive
    assert_eq!(
        run_awk("/on/,/off/ { print }", "x\non and off\ny\n").unwrap(),
        "on and off\n"
    );
}

#[test]
fn test_combined_patterns() {
    assert_eq!(
        run_awk("/a/ && !/b/ { print }", "a\nab\nba\nc").unwrap(),
        "a\n"
    );
}

// ============================================================================
// Expressions and operators
// ============================================================================

#[test]
fn test_arithmetic() {
    assert_eq!(
        run_awk("BEGIN { print 1+2, 3*4, 10/4, 7%3, 2^8 }", "").unwrap(),
        "3 12 2.5 1 256\n"
    );
}

#[test]
fn test_power_right_associative() {
    assert_eq!(run_awk("BEGIN { print 2 ^ 3 ^ 2 }", "").unwrap(), "512\n");
}

#[test]
fn test_division_by_zero_is_ieee() {
    assert_eq!(run_awk("BEGIN { print 1/0 }", "").unwrap(), "inf\n");
    assert_eq!(run_awk("BEGIN { print -1/0 }", "").unwrap(), "-inf\n");
    assert_eq!(run_awk("BEGIN { print 0/0 }", "").unwrap(), "nan\n");
    assert_eq!(run_awk("BEGIN { print 5 % 0 }", "").unwrap(), "nan\n");
}

#[test]
fn test_logical_operators_return_zero_one() {
    assert_eq!(
        run_awk(r#"BEGIN { print (2 && 3), (0 || "x"), !5, !0 }"#, "").unwrap(),
        "1 1 0 1\n"
    );
}

#[test]
fn test_ternary() {
    assert_eq!(
        run_awk(r#"BEGIN { x = 5; print (x > 3 ? "big" : "small") }"#, "").unwrap(),
        "big\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { x = 1; y = x == 1 ? "one" : "other"; print y }"#, "").unwrap(),
        "one\n"
    );
}

#[test]
fn test_increment_decrement() {
    let output = run_awk(
        "BEGIN { x = 5; print x++; print x; print ++x; print x--; print --x }",
        "",
    )
    .unwrap();
    assert_eq!(output, "5\n6\n7\n7\n5\n");
}

#[test]
fn test_compound_assignment() {
    let output = run_awk(
        "BEGIN { x = 10; x += 5; print x; x -= 3; print x; x *= 2; print x; x /= 4; print x; x %= 4; print x; x ^= 3; print x }",
        "",
    )
    .unwrap();
    assert_eq!(output, "15\n12\n24\n6\n2\n8\n");
}

#[test]
fn test_string_number_comparison_rules() {
    // Two string literals compare as strings
    assert_eq!(run_awk(r#"BEGIN { print ("10" < "9") }"#, "").unwrap(), "1\n");
    // Strnum fields compare numerically
    assert_eq!(run_awk("$1 < $2 { print }", "10 9").unwrap(), "");
    assert_eq!(run_awk("$1 > $2 { print }", "10 9").unwrap(), "10 9\n");
}

#[test]
fn test_uninitialized_coercion() {
    assert_eq!(
        run_awk(r#"BEGIN { print x + 0, "[" x "]", !x }"#, "").unwrap(),
        "0 [] 1\n"
    );
}

#[test]
fn test_match_operators() {
    assert_eq!(
        run_awk(r#"BEGIN { print ("foobar" ~ /o+/), ("foo" !~ /bar/) }"#, "").unwrap(),
        "1 1\n"
    );
    // Dynamic regex from a string value
    assert_eq!(
        run_awk(r#"BEGIN { re = "^f"; print ("foo" ~ re) }"#, "").unwrap(),
        "1\n"
    );
}

#[test]
fn test_in_operator_no_autovivification() {
    let output = run_awk(
        r#"BEGIN { if ("k" in a) print "found"; print length(a) }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "0\n");
}

#[test]
fn test_multi_key_in() {
    assert_eq!(
        run_awk(r#"BEGIN { a[1,2] = 3; if ((1,2) in a) print "yes" }"#, "").unwrap(),
        "yes\n"
    );
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_if_else() {
    assert_eq!(
        run_awk(r#"BEGIN { if (1 > 2) print "a"; else print "b" }"#, "").unwrap(),
        "b\n"
    );
}

#[test]
fn test_while_loop() {
    assert_eq!(
        run_awk("BEGIN { i = 1; while (i <= 3) { print i; i++ } }", "").unwrap(),
        "1\n2\n3\n"
    );
}

#[test]
fn test_do_while_loop() {
    assert_eq!(
        run_awk("BEGIN { i = 5; do { print i; i++ } while (i < 3) }", "").unwrap(),
        "5\n"
    );
}

#[test]
fn test_for_loop_with_break_continue() {
    let output = run_awk(
        "BEGIN { for (i = 1; i <= 10; i++) { if (i == 3) continue; if (i == 6) break; print i } }",
        "",
    )
    .unwrap();
    assert_eq!(output, "1\n2\n4\n5\n");
}

#[test]
fn test_for_in_visits_every_key() {
    let output = run_awk(
        "BEGIN { for (i = 0; i < 100000; i++) a[i] = i; n = 0; for (k in a) n++; print n }",
        "",
    )
    .unwrap();
    assert_eq!(output, "100000\n");
}

#[test]
fn test_switch_with_break_and_default() {
    let output = run_awk(
        r#"{ switch ($1) { case "a": print "A"; break; case "b": print "B"; break; default: print "?" } }"#,
        "a\nb\nc",
    )
    .unwrap();
    assert_eq!(output, "A\nB\n?\n");
}

#[test]
fn test_switch_fallthrough() {
    let output = run_awk(
        r#"BEGIN { switch (1) { case 1: print "one"; case 2: print "two" } }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "one\ntwo\n");
}

#[test]
fn test_next_skips_remaining_rules() {
    let output = run_awk(
        r#"$1 == "skip" { next } { print $0 }"#,
        "keep1\nskip\nkeep2",
    )
    .unwrap();
    assert_eq!(output, "keep1\nkeep2\n");
}

#[test]
fn test_exit_still_runs_end() {
    let (output, code) = run_awk_status(
        r#"BEGIN { print "a"; exit 3; print "b" } END { print "done" }"#,
        "",
    );
    assert_eq!(output, "a\ndone\n");
    assert_eq!(code, 3);
}

#[test]
fn test_exit_inside_end_stops_immediately() {
    let (output, code) = run_awk_status(
        r#"BEGIN { exit 1 } END { print "x"; exit 2; print "y" }"#,
        "",
    );
    assert_eq!(output, "x\n");
    assert_eq!(code, 2);
}

#[test]
fn test_exit_from_record_loop() {
    let (output, code) = run_awk_status("NR == 2 { exit 7 } { print }", "a\nb\nc");
    assert_eq!(output, "a\n");
    assert_eq!(code, 7);
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_recursive_function() {
    let output = run_awk(
        "function f(n){ return n<=1?1:n*f(n-1) } BEGIN { print f(5) }",
        "",
    )
    .unwrap();
    assert_eq!(output, "120\n");
}

#[test]
fn test_scalar_args_are_by_value() {
    let output = run_awk(
        "function bump(x) { x = x + 1; return x } BEGIN { y = 5; print bump(y), y }",
        "",
    )
    .unwrap();
    assert_eq!(output, "6 5\n");
}

#[test]
fn test_array_args_alias_the_caller() {
    let output = run_awk(
        r#"function fill(arr) { arr["x"] = 1; arr["y"] = 2 }
           BEGIN { data["seed"] = 0; fill(data); print length(data), data["y"] }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "3 2\n");
}

#[test]
fn test_extra_params_are_locals() {
    let output = run_awk(
        "function f(a, tmp) { tmp = a * 2; return tmp } BEGIN { tmp = 9; print f(3), tmp }",
        "",
    )
    .unwrap();
    assert_eq!(output, "6 9\n");
}

#[test]
fn test_missing_args_are_uninitialized() {
    let output = run_awk(
        r#"function f(a, b) { return "[" a "," b "]" } BEGIN { print f("x") }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "[x,]\n");
}

#[test]
fn test_func_keyword_alias() {
    assert_eq!(
        run_awk("func two() { return 2 } BEGIN { print two() }", "").unwrap(),
        "2\n"
    );
}

#[test]
fn test_exit_propagates_from_function() {
    let (output, code) = run_awk_status(
        r#"function stop() { exit 4 } BEGIN { print "a"; stop(); print "b" }"#,
        "",
    );
    assert_eq!(output, "a\n");
    assert_eq!(code, 4);
}

#[test]
fn test_indirect_call() {
    assert_eq!(
        run_awk(r#"BEGIN { f = "toupper"; print @f("abc") }"#, "").unwrap(),
        "ABC\n"
    );
    assert_eq!(
        run_awk(
            r#"function hi() { return "hi" } BEGIN { f = "hi"; print @f() }"#,
            ""
        )
        .unwrap(),
        "hi\n"
    );
}

// ============================================================================
// Arrays
// ============================================================================

#[test]
fn test_array_basics() {
    let output = run_awk(
        r#"BEGIN { a["x"] = 1; a["y"] = 2; delete a["x"]; print length(a), ("x" in a), ("y" in a) }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "1 0 1\n");
}

#[test]
fn test_delete_whole_array() {
    assert_eq!(
        run_awk("BEGIN { a[1] = 1; a[2] = 2; delete a; print length(a) }", "").unwrap(),
        "0\n"
    );
}

#[test]
fn test_multidimensional_subscripts() {
    let output = run_awk(
        r#"BEGIN { a[1,2] = 3; for (k in a) { split(k, parts, SUBSEP); print parts[1], parts[2], a[k] } }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "1 2 3\n");
}

#[test]
fn test_numeric_subscripts_canonicalized() {
    // 1 and "1" address the same element
    assert_eq!(
        run_awk(r#"BEGIN { a[1] = "x"; print a["1"] }"#, "").unwrap(),
        "x\n"
    );
}

#[test]
fn test_split_idempotent() {
    let output = run_awk(
        r#"BEGIN {
            s = "a b c"
            split(s, a)
            for (k in a) b[k] = a[k]
            split(s, a)
            same = 1
            for (k in a) if (!(k in b) || b[k] != a[k]) same = 0
            n = 0; for (k in a) n++
            m = 0; for (k in b) m++
            print same, n, m
        }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "1 3 3\n");
}

// ============================================================================
// Built-in functions
// ============================================================================

#[test]
fn test_length_variants() {
    let output = run_awk(
        r#"{ print length(), length($2), length("hello") }"#,
        "abc defg",
    )
    .unwrap();
    assert_eq!(output, "8 4 5\n");
    assert_eq!(
        run_awk("BEGIN { a[1]; a[2]; a[3]; print length(a) }", "").unwrap(),
        "3\n"
    );
}

#[test]
fn test_substr() {
    let output = run_awk(
        r#"BEGIN { s = "hello world"
            print substr(s, 7)
            print substr(s, 1, 5)
            print substr(s, 0, 2)
            print "[" substr(s, 4, 0) "]"
            print "[" substr(s, 100) "]" }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "world\nhello\nhe\n[]\n[]\n");
}

#[test]
fn test_index() {
    assert_eq!(
        run_awk(r#"BEGIN { print index("banana", "na"), index("abc", "z") }"#, "").unwrap(),
        "3 0\n"
    );
}

#[test]
fn test_tolower_toupper() {
    assert_eq!(
        run_awk(r#"BEGIN { print tolower("MiXeD"), toupper("MiXeD") }"#, "").unwrap(),
        "mixed MIXED\n"
    );
}

#[test]
fn test_sub_and_gsub() {
    assert_eq!(
        run_awk(r#"BEGIN { s = "aaa"; n = gsub(/a/, "b", s); print n, s }"#, "").unwrap(),
        "3 bbb\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { s = "aaa"; n = sub(/a/, "b", s); print n, s }"#, "").unwrap(),
        "1 baa\n"
    );
    // Defaults to $0
    assert_eq!(
        run_awk(r#"{ gsub(/o/, "0"); print }"#, "foo boo").unwrap(),
        "f00 b00\n"
    );
    // On a field
    assert_eq!(
        run_awk(r#"{ sub(/b/, "B", $2); print }"#, "a b c").unwrap(),
        "a B c\n"
    );
}

#[test]
fn test_sub_replacement_escapes() {
    assert_eq!(
        run_awk(r#"BEGIN { s = "x"; sub(/x/, "[&]", s); print s }"#, "").unwrap(),
        "[x]\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { s = "x"; sub(/x/, "\\&", s); print s }"#, "").unwrap(),
        "&\n"
    );
}

#[test]
fn test_gsub_with_ampersand_is_identity() {
    assert_eq!(
        run_awk(r#"BEGIN { s = "banana"; n = gsub(/an/, "&", s); print n, s }"#, "").unwrap(),
        "2 banana\n"
    );
}

#[test]
fn test_gsub_empty_matches() {
    assert_eq!(
        run_awk(r#"BEGIN { s = "ab"; n = gsub(/x*/, "-", s); print n, s }"#, "").unwrap(),
        "3 -a-b-\n"
    );
}

#[test]
fn test_gensub() {
    assert_eq!(
        run_awk(r#"BEGIN { print gensub(/o/, "0", "g", "foo") }"#, "").unwrap(),
        "f00\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { print gensub(/o/, "0", 2, "foo") }"#, "").unwrap(),
        "fo0\n"
    );
    // Backreferences, and the target is not modified
    assert_eq!(
        run_awk(
            r#"BEGIN { s = "ab"; print gensub(/(a)(b)/, "\\2\\1", "g", s); print s }"#,
            ""
        )
        .unwrap(),
        "ba\nab\n"
    );
}

#[test]
fn test_match_sets_rstart_rlength() {
    assert_eq!(
        run_awk(r#"BEGIN { r = match("foobar", /o+/); print r, RSTART, RLENGTH }"#, "").unwrap(),
        "2 2 2\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { r = match("foobar", /xyz/); print r, RSTART, RLENGTH }"#, "").unwrap(),
        "0 0 -1\n"
    );
}

#[test]
fn test_match_fills_group_array() {
    let output = run_awk(
        r#"BEGIN { match("abc123", /([a-z]+)([0-9]+)/, m); print m[0], m[1], m[2] }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "abc123 abc 123\n");
}

#[test]
fn test_split() {
    assert_eq!(
        run_awk(r#"BEGIN { n = split("a:b:c", arr, ":"); print n, arr[1], arr[3] }"#, "").unwrap(),
        "3 a c\n"
    );
    // Default separator is FS-style whitespace
    assert_eq!(
        run_awk(r#"BEGIN { n = split("  a  b  ", arr); print n, arr[2] }"#, "").unwrap(),
        "2 b\n"
    );
    // Regex separator
    assert_eq!(
        run_awk(r#"BEGIN { n = split("a1b22c", arr, /[0-9]+/); print n, arr[3] }"#, "").unwrap(),
        "3 c\n"
    );
    // Splitting the empty string yields nothing
    assert_eq!(
        run_awk(r#"BEGIN { print split("", arr, ":") }"#, "").unwrap(),
        "0\n"
    );
}

#[test]
fn test_split_clears_previous_contents() {
    let output = run_awk(
        r#"BEGIN { arr[99] = "stale"; n = split("a b", arr); print n, (99 in arr) }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "2 0\n");
}

#[test]
fn test_patsplit() {
    let output = run_awk(
        r#"BEGIN { n = patsplit("12ab34", f, /[0-9]+/, s); print n, f[1], f[2], "[" s[1] "]" }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "2 12 34 [ab]\n");
}

#[test]
fn test_asort_and_asorti() {
    let output = run_awk(
        r#"BEGIN {
            a["z"] = "c"; a["y"] = "a"; a["x"] = "b"
            n = asort(a, dest)
            for (i = 1; i <= n; i++) printf "%s", dest[i]
            print ""
        }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "abc\n");

    let output = run_awk(
        r#"BEGIN {
            a["bb"] = 1; a["aa"] = 2; a["cc"] = 3
            n = asorti(a, dest)
            for (i = 1; i <= n; i++) printf "%s ", dest[i]
            print ""
        }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "aa bb cc \n");
}

#[test]
fn test_asort_in_place() {
    let output = run_awk(
        r#"BEGIN { a[10] = "b"; a[20] = "a"; n = asort(a); print n, a[1], a[2] }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "2 a b\n");
}

#[test]
fn test_math_builtins() {
    assert_eq!(
        run_awk("BEGIN { print int(3.9), int(-3.9), sqrt(16), exp(0) }", "").unwrap(),
        "3 -3 4 1\n"
    );
    assert_eq!(
        run_awk("BEGIN { print ceil(1.2), floor(1.8), round(1.5), abs(-2) }", "").unwrap(),
        "2 1 2 2\n"
    );
    assert_eq!(
        run_awk("BEGIN { print min(3, 1, 2), max(3, 1, 2), pow(2, 10), fmod(7, 3) }", "").unwrap(),
        "1 3 1024 1\n"
    );
    assert_eq!(
        run_awk("BEGIN { print atan2(0, 1), sin(0), cos(0), log(1) }", "").unwrap(),
        "0 0 1 0\n"
    );
}

#[test]
fn test_rand_is_seedable() {
    assert_eq!(
        run_awk(
            "BEGIN { srand(42); x = rand(); srand(42); y = rand(); print (x == y), (x >= 0 && x < 1) }",
            ""
        )
        .unwrap(),
        "1 1\n"
    );
    // srand returns the previous seed
    assert_eq!(
        run_awk("BEGIN { srand(1); print srand(2) }", "").unwrap(),
        "1\n"
    );
}

#[test]
fn test_strtonum() {
    assert_eq!(
        run_awk(r#"BEGIN { print strtonum("0x11"), strtonum("011"), strtonum("11"), strtonum("3.5") }"#, "")
            .unwrap(),
        "17 9 11 3.5\n"
    );
}

#[test]
fn test_ord_chr() {
    assert_eq!(
        run_awk(r#"BEGIN { print ord("A"), chr(66), "[" chr(999) "]" }"#, "").unwrap(),
        "65 B []\n"
    );
}

#[test]
fn test_bit_operations() {
    assert_eq!(
        run_awk("BEGIN { print and(6, 3), or(6, 3), xor(6, 3), lshift(1, 4), rshift(16, 2) }", "")
            .unwrap(),
        "2 7 5 16 4\n"
    );
    assert_eq!(
        run_awk("BEGIN { print (compl(0) > 0) }", "").unwrap(),
        "1\n"
    );
}

#[test]
fn test_type_builtins() {
    let output = run_awk(
        r#"BEGIN { n = 1; s = "x"; a[1] = 1; print typeof(n), typeof(s), typeof(a), typeof(unset) }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "number string array unassigned\n");

    assert_eq!(
        run_awk(r#"BEGIN { a[1] = 1; print isarray(a), isarray(x), mkbool("yes"), mkbool("") }"#, "")
            .unwrap(),
        "1 0 1 0\n"
    );
}

#[test]
fn test_strnum_typeof_from_field() {
    assert_eq!(
        run_awk("{ print typeof($1), typeof($2) }", "42 hello").unwrap(),
        "strnum string\n"
    );
}

#[test]
fn test_time_builtins() {
    assert_eq!(
        run_awk(r#"BEGIN { print strftime("%Y-%m-%d %H:%M:%S", mktime("2000 01 02 03 04 05")) }"#, "")
            .unwrap(),
        "2000-01-02 03:04:05\n"
    );
    assert_eq!(
        run_awk("BEGIN { print (systime() > 1000000000) }", "").unwrap(),
        "1\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { print mktime("bad spec") }"#, "").unwrap(),
        "-1\n"
    );
}

#[test]
fn test_i18n_builtins_pass_through() {
    assert_eq!(
        run_awk(r#"BEGIN { print dcgettext("hello") }"#, "").unwrap(),
        "hello\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { print dcngettext("one", "many", 1), dcngettext("one", "many", 2) }"#, "")
            .unwrap(),
        "one many\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { print bindtextdomain("/tmp/locale", "dom") }"#, "").unwrap(),
        "/tmp/locale\n"
    );
}

// ============================================================================
// printf / sprintf
// ============================================================================

#[test]
fn test_printf_basic() {
    assert_eq!(
        run_awk(r#"BEGIN { printf "%d-%s|", 42, "x" }"#, "").unwrap(),
        "42-x|"
    );
    assert_eq!(
        run_awk(r#"BEGIN { printf "%05d %8.2f %-4s|\n", 42, 3.14159, "ab" }"#, "").unwrap(),
        "00042     3.14 ab  |\n"
    );
}

#[test]
fn test_printf_dynamic_width() {
    assert_eq!(
        run_awk(r#"BEGIN { printf "%*d|%.*f\n", 5, 42, 2, 3.14159 }"#, "").unwrap(),
        "   42|3.14\n"
    );
}

#[test]
fn test_printf_char_conversion() {
    assert_eq!(
        run_awk(r#"BEGIN { printf "%c%c\n", 65, "xyz" }"#, "").unwrap(),
        "Ax\n"
    );
}

#[test]
fn test_sprintf() {
    assert_eq!(
        run_awk(r#"BEGIN { s = sprintf("%.2f", 3.14159); print s }"#, "").unwrap(),
        "3.14\n"
    );
}

#[test]
fn test_ofmt_applies_to_print() {
    assert_eq!(
        run_awk(r#"BEGIN { OFMT = "%.2f"; print 3.14159 }"#, "").unwrap(),
        "3.14\n"
    );
}

#[test]
fn test_convfmt_applies_to_concatenation() {
    assert_eq!(
        run_awk(r#"BEGIN { CONVFMT = "%.2g"; x = 3.14159; y = x ""; print y }"#, "").unwrap(),
        "3.1\n"
    );
}

// ============================================================================
// Special variables and reflection
// ============================================================================

#[test]
fn test_nr_fnr_across_files() {
    let (output, _) = run_awk_files("{ print NR, FNR }", &[("one", "a\nb\n"), ("two", "c\n")])
        .unwrap();
    assert_eq!(output, "1 1\n2 2\n3 1\n");
}

#[test]
fn test_filename() {
    let (output, _) =
        run_awk_files("{ print FILENAME }", &[("data.txt", "x\n")]).unwrap();
    assert_eq!(output, "data.txt\n");
}

#[test]
fn test_argc_argv() {
    let (output, _) = run_awk_files(
        "BEGIN { print ARGC, ARGV[0], ARGV[1] }",
        &[("f1", "ignored\n")],
    )
    .unwrap();
    assert_eq!(output.lines().next().unwrap(), "2 awk f1");
}

#[test]
fn test_environ_array() {
    // PATH is always present in a test environment
    assert_eq!(
        run_awk(r#"BEGIN { print ("PATH" in ENVIRON) }"#, "").unwrap(),
        "1\n"
    );
}

#[test]
fn test_symtab_read_and_write() {
    assert_eq!(
        run_awk(r#"BEGIN { x = 5; print SYMTAB["x"] }"#, "").unwrap(),
        "5\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { SYMTAB["y"] = 7; print y }"#, "").unwrap(),
        "7\n"
    );
}

#[test]
fn test_functab() {
    assert_eq!(
        run_awk(r#"BEGIN { print FUNCTAB["length"], "[" FUNCTAB["nosuch"] "]" }"#, "").unwrap(),
        "length []\n"
    );
    assert_eq!(
        run_awk(
            r#"function mine() { return 1 } BEGIN { print ("mine" in FUNCTAB), ("length" in FUNCTAB) }"#,
            ""
        )
        .unwrap(),
        "1 1\n"
    );
}

#[test]
fn test_ignorecase() {
    assert_eq!(
        run_awk(r#"BEGIN { IGNORECASE=1; print ("HELLO" ~ /hello/) }"#, "").unwrap(),
        "1\n"
    );
    assert_eq!(
        run_awk(r#"BEGIN { IGNORECASE=1; s = "AbC"; gsub(/b/, "x", s); print s }"#, "").unwrap(),
        "AxC\n"
    );
    // And switching back off
    assert_eq!(
        run_awk(r#"BEGIN { IGNORECASE=1; IGNORECASE=0; print ("HELLO" ~ /hello/) }"#, "").unwrap(),
        "0\n"
    );
}

#[test]
fn test_subsep_default() {
    assert_eq!(
        run_awk("BEGIN { print length(SUBSEP), index(SUBSEP, sprintf(\"%c\", 28)) }", "").unwrap(),
        "1 1\n"
    );
}

// ============================================================================
// Namespaces
// ============================================================================

#[test]
fn test_namespace_function() {
    let output = run_awk(
        "@namespace \"m\"\nfunction f() { return 42 }\n@namespace \"awk\"\nBEGIN { print m::f() }",
        "",
    )
    .unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_namespace_variables_are_qualified() {
    let output = run_awk(
        "@namespace \"m\"\nBEGIN { counter = 10 }\n@namespace \"awk\"\nBEGIN { print m::counter, counter + 0 }",
        "",
    )
    .unwrap();
    assert_eq!(output, "10 0\n");
}

#[test]
fn test_namespace_special_variables_fall_through() {
    let output = run_awk(
        "@namespace \"m\"\n{ count = NR }\n@namespace \"awk\"\nEND { print m::count }",
        "a\nb\n",
    )
    .unwrap();
    assert_eq!(output, "2\n");
}

#[test]
fn test_namespace_function_parameters() {
    let output = run_awk(
        "@namespace \"m\"\nfunction twice(n) { return n * 2 }\n@namespace \"awk\"\nBEGIN { print m::twice(21) }",
        "",
    )
    .unwrap();
    assert_eq!(output, "42\n");
}

#[test]
fn test_namespace_builtins_fall_through() {
    let output = run_awk(
        "@namespace \"m\"\nBEGIN { print length(\"abc\") }",
        "",
    )
    .unwrap();
    assert_eq!(output, "3\n");
}

// ============================================================================
// Word count / sum scenarios
// ============================================================================

#[test]
fn test_word_count() {
    assert_eq!(
        run_awk("{ words += NF } END { print words }", "one two\nthree four five\n").unwrap(),
        "5\n"
    );
}

#[test]
fn test_sum_column() {
    assert_eq!(
        run_awk("{ sum += $1 } END { print sum }", "10\n20\n30\n").unwrap(),
        "60\n"
    );
}

#[test]
fn test_string_accumulation() {
    assert_eq!(
        run_awk(r#"BEGIN { s = ""; for (i = 1; i <= 100; i++) s = s "x"; print length(s) }"#, "")
            .unwrap(),
        "100\n"
    );
}

// ============================================================================
// getline and I/O
// ============================================================================

#[test]
fn test_getline_from_main_input() {
    assert_eq!(
        run_awk(r#"{ getline nxt; print nxt "-" $0; print NR }"#, "a\nb\n").unwrap(),
        "b-a\n2\n"
    );
}

#[test]
fn test_getline_replaces_record() {
    assert_eq!(
        run_awk("{ getline; print NF, $1 }", "a\nx y\n").unwrap(),
        "2 x\n"
    );
}

#[test]
fn test_getline_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.txt");
    std::fs::write(&path, "l1\nl2\n").unwrap();

    let program = format!(
        r#"BEGIN {{ while ((getline line < "{}") > 0) print line }}"#,
        path.display()
    );
    assert_eq!(run_awk(&program, "").unwrap(), "l1\nl2\n");
}

#[test]
fn test_getline_missing_file_is_minus_one() {
    assert_eq!(
        run_awk(r#"BEGIN { r = (getline x < "/definitely/not/here"); print r }"#, "").unwrap(),
        "-1\n"
    );
}

#[test]
fn test_getline_from_command_pipe() {
    assert_eq!(
        run_awk(r#"BEGIN { "echo hello" | getline line; print line }"#, "").unwrap(),
        "hello\n"
    );
    assert_eq!(
        run_awk(
            r#"BEGIN { while (("echo 1; echo 2" | getline l) > 0) print l }"#,
            ""
        )
        .unwrap(),
        "1\n2\n"
    );
}

#[test]
fn test_getline_pipe_into_record() {
    assert_eq!(
        run_awk(r#"BEGIN { "echo x y" | getline; print NF, $1 }"#, "").unwrap(),
        "2 x\n"
    );
}

#[test]
fn test_print_redirect_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let path_str = path.display().to_string();

    let program = format!(
        r#"BEGIN {{ print "out1" > "{p}"; print "out2" > "{p}"; close("{p}") }}"#,
        p = path_str
    );
    run_awk(&program, "").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "out1\nout2\n");
}

#[test]
fn test_print_append_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("log.txt");
    std::fs::write(&path, "first\n").unwrap();
    let path_str = path.display().to_string();

    let program = format!(
        r#"BEGIN {{ print "second" >> "{p}"; close("{p}") }}"#,
        p = path_str
    );
    run_awk(&program, "").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[test]
fn test_reopen_after_close_truncates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trunc.txt");
    let path_str = path.display().to_string();

    let program = format!(
        r#"BEGIN {{
            print "aaaa" > "{p}"; close("{p}")
            print "b" > "{p}"; close("{p}")
        }}"#,
        p = path_str
    );
    run_awk(&program, "").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "b\n");
}

#[test]
fn test_print_pipe_to_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piped.txt");
    let cmd = format!("cat > {}", path.display());

    let program = format!(
        r#"BEGIN {{ print "through pipe" | "{c}"; close("{c}") }}"#,
        c = cmd
    );
    run_awk(&program, "").unwrap();
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "through pipe\n"
    );
}

#[test]
fn test_coprocess_round_trip() {
    let output = run_awk(
        r#"BEGIN { print "ping" |& "cat"; "cat" |& getline reply; print reply; close("cat") }"#,
        "",
    )
    .unwrap();
    assert_eq!(output, "ping\n");
}

#[test]
fn test_close_unknown_target() {
    assert_eq!(
        run_awk(r#"BEGIN { print close("/no/such/stream") }"#, "").unwrap(),
        "-1\n"
    );
}

#[test]
fn test_fflush_then_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flush.txt");
    let path_str = path.display().to_string();

    let program = format!(
        r#"BEGIN {{
            print "flushed" > "{p}"
            fflush("{p}")
            getline line < "{p}"
            print line
        }}"#,
        p = path_str
    );
    assert_eq!(run_awk(&program, "").unwrap(), "flushed\n");
}

#[test]
fn test_system_exit_code() {
    assert_eq!(
        run_awk(r#"BEGIN { print system("exit 7") }"#, "").unwrap(),
        "7\n"
    );
}

#[test]
fn test_dev_null_target() {
    assert_eq!(
        run_awk(r#"BEGIN { print "discarded" > "/dev/null"; print "kept" }"#, "").unwrap(),
        "kept\n"
    );
}

#[test]
fn test_dev_stdout_target() {
    assert_eq!(
        run_awk(r#"BEGIN { print "direct" > "/dev/stdout" }"#, "").unwrap(),
        "direct\n"
    );
}

// ============================================================================
// Multiple files, BEGINFILE/ENDFILE, nextfile
// ============================================================================

#[test]
fn test_beginfile_endfile() {
    let (output, _) = run_awk_files(
        r#"BEGINFILE { print "<" FILENAME ">" } { print $0 } ENDFILE { print "</" FILENAME ">" }"#,
        &[("one", "a\n"), ("two", "b\n")],
    )
    .unwrap();
    assert_eq!(output, "<one>\na\n</one>\n<two>\nb\n</two>\n");
}

#[test]
fn test_nextfile_skips_rest_of_file() {
    let (output, _) = run_awk_files(
        r#"{ print FILENAME ": " $0 } FNR == 1 && FILENAME == "two" { nextfile }"#,
        &[("one", "a\nb\n"), ("two", "c\nd\n"), ("three", "e\n")],
    )
    .unwrap();
    assert_eq!(output, "one: a\none: b\ntwo: c\nthree: e\n");
}

#[test]
fn test_nextfile_still_runs_endfile() {
    let (output, _) = run_awk_files(
        r#"FNR == 1 { nextfile } ENDFILE { print "done", FILENAME }"#,
        &[("f1", "a\nb\n")],
    )
    .unwrap();
    assert_eq!(output, "done f1\n");
}

// ============================================================================
// @include
// ============================================================================

#[test]
fn test_include_splices_functions() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib.awk");
    std::fs::write(&lib, "function double(x) { return 2 * x }\n").unwrap();

    let program = format!(
        "@include \"{}\"\nBEGIN {{ print double(21) }}",
        lib.display()
    );
    assert_eq!(run_awk(&program, "").unwrap(), "42\n");
}

#[test]
fn test_include_relative_to_including_file() {
    let dir = tempfile::tempdir().unwrap();
    let inner = dir.path().join("inner.awk");
    std::fs::write(&inner, "function three() { return 3 }\n").unwrap();
    let outer = dir.path().join("outer.awk");
    std::fs::write(&outer, "@include \"inner.awk\"\nfunction six() { return 2 * three() }\n")
        .unwrap();

    let program = format!(
        "@include \"{}\"\nBEGIN {{ print six() }}",
        outer.display()
    );
    assert_eq!(run_awk(&program, "").unwrap(), "6\n");
}

#[test]
fn test_include_cycle_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let selfref = dir.path().join("selfref.awk");
    std::fs::write(
        &selfref,
        format!(
            "@include \"{}\"\nfunction once() {{ return 1 }}\n",
            selfref.display()
        ),
    )
    .unwrap();

    let program = format!(
        "@include \"{}\"\nBEGIN {{ print once() }}",
        selfref.display()
    );
    assert_eq!(run_awk(&program, "").unwrap(), "1\n");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unterminated_string_is_parse_error() {
    assert!(run_awk("{ print \"unterminated }", "").is_err());
}

#[test]
fn test_unterminated_regex_is_parse_error() {
    assert!(run_awk("/unterminated { print }", "").is_err());
}

#[test]
fn test_invalid_assignment_target_is_parse_error() {
    assert!(run_awk("{ 1 = 2 }", "").is_err());
}

#[test]
fn test_undefined_function_is_recoverable() {
    // Reported to stderr; the program keeps running
    assert_eq!(
        run_awk(r#"BEGIN { x = nosuchfn(1); print "after", x + 0 }"#, "").unwrap(),
        "after 0\n"
    );
}

#[test]
fn test_invalid_dynamic_regex_is_recoverable() {
    assert_eq!(
        run_awk(r#"BEGIN { re = "(unclosed"; print ("x" ~ re); print "alive" }"#, "").unwrap(),
        "0\nalive\n"
    );
}
