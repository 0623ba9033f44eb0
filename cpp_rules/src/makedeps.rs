// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

static MAKE_OBJECT_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\S+?\.o:[\s\\]*\S+?\.cpp(?:[\s\\\r\n]*[^\s\n\r\\]+)*\s*$")
        .expect("The make-rule pattern is well-formed")
});

static FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\s\n\r\\:]+").expect("The filename pattern is well-formed"));

///
/// One object file's dependencies as reported by `gcc -MM`: the object, the source it compiles,
/// and every header the source transitively includes.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectFileDeps {
    pub object_filename: String,
    pub cpp_filename: String,
    pub header_filenames: Vec<String>,
}

impl fmt::Display for ObjectFileDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = " \\\n ";
        write!(
            f,
            "{}: {}{}{}",
            self.object_filename,
            self.cpp_filename,
            sep,
            self.header_filenames.iter().join(sep)
        )
    }
}

///
/// Parses a single make rule of the shape `gcc -MM` emits, backslash continuations included.
///
pub fn parse_object_file_make_deps(input: &str) -> Result<ObjectFileDeps, String> {
    if !MAKE_OBJECT_RULE.is_match(input) {
        return Err(format!(
            "Invalid or unsupported Make object file rule:\n\"{input}\""
        ));
    }

    // Every filename that occurs in the rule, in order.
    let names: Vec<&str> = FILENAME.find_iter(input).map(|m| m.as_str()).collect();

    assert!(
        names.len() >= 2,
        "The object file should depend at least on the .cpp file"
    );
    assert!(
        names[0].len() > 2 && names[0].ends_with(".o"),
        "Expected an object file name, got {:?}",
        names[0]
    );

    Ok(ObjectFileDeps {
        object_filename: names[0].to_owned(),
        cpp_filename: names[1].to_owned(),
        header_filenames: names[2..].iter().map(|name| (*name).to_owned()).collect(),
    })
}
