#![allow(dead_code)]
use std::fs;

pub const WORKLOADS: [(&str, &str); 3] = [
    ("control", "tests/programs/control.sc"),
    ("functions", "tests/programs/functions.sc"),
    ("spill", "tests/programs/spill.sc"),
];

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn workloads() -> impl Iterator<Item = (&'static str, String)> {
    WORKLOADS
        .into_iter()
        .map(|(label, path)| (label, load_source(path)))
}
