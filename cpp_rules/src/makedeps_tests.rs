// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use crate::makedeps::{parse_object_file_make_deps, ObjectFileDeps};

#[test]
fn parses_a_rule_without_headers() {
    let parsed = parse_object_file_make_deps("foo.o: src/foo.cpp\n").unwrap();
    assert_eq!(
        parsed,
        ObjectFileDeps {
            object_filename: "foo.o".to_owned(),
            cpp_filename: "src/foo.cpp".to_owned(),
            header_filenames: Vec::new(),
        }
    );
}

#[test]
fn parses_a_single_line_rule_with_headers() {
    let parsed =
        parse_object_file_make_deps("foo.o: src/foo.cpp src/foo.h src/util.h\n").unwrap();
    assert_eq!(parsed.object_filename, "foo.o");
    assert_eq!(parsed.cpp_filename, "src/foo.cpp");
    assert_eq!(parsed.header_filenames, vec!["src/foo.h", "src/util.h"]);
}

#[test]
fn parses_backslash_continuations() {
    let input = "main.o: src/main.cpp \\\n src/a.h \\\n src/b.h\n";
    let parsed = parse_object_file_make_deps(input).unwrap();
    assert_eq!(parsed.cpp_filename, "src/main.cpp");
    assert_eq!(parsed.header_filenames, vec!["src/a.h", "src/b.h"]);
}

#[test]
fn rejects_rules_for_non_cpp_inputs() {
    assert!(parse_object_file_make_deps("foo.o: foo.c\n").is_err());
}

#[test]
fn rejects_arbitrary_text() {
    let err = parse_object_file_make_deps("this is not a make rule").unwrap_err();
    assert!(err.contains("Invalid or unsupported"));
}

#[test]
fn rejects_rules_without_an_object() {
    assert!(parse_object_file_make_deps(": src/foo.cpp\n").is_err());
}

#[test]
fn renders_like_a_make_rule() {
    let deps = ObjectFileDeps {
        object_filename: "foo.o".to_owned(),
        cpp_filename: "foo.cpp".to_owned(),
        header_filenames: vec!["a.h".to_owned(), "b.h".to_owned()],
    };
    assert_eq!(deps.to_string(), "foo.o: foo.cpp \\\n a.h \\\n b.h");
}
