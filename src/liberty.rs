// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! A reader for the subset of Liberty needed by the partitioner.
//!
//! The file is parsed into a generic group tree first, then the cell
//! attributes we care about are pulled out: area, sequential and macro
//! flags, pin directions, clock and supply pins, bus widths, and a
//! lumped worst-case delay and setup time per cell.

use crate::engine::{LibCellInfo, PinDirection};
use crate::error::{PartError, Result};
use compact_str::CompactString;
use indexmap::IndexMap;
use std::path::Path;

/// A generic Liberty group: `kind (args) { attributes and groups }`.
#[derive(Debug, Default, Clone)]
pub struct LibGroup {
    pub kind: String,
    pub args: Vec<String>,
    /// Simple attributes `name : value ;`.
    pub attrs: Vec<(String, String)>,
    /// Complex attributes `name (v1, v2, ...) ;`.
    pub complex: Vec<(String, Vec<String>)>,
    pub groups: Vec<LibGroup>,
}

impl LibGroup {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn groups_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a LibGroup> + 'a {
        self.groups.iter().filter(move |g| g.kind == kind)
    }

    fn attr_is_true(&self, name: &str) -> bool {
        matches!(self.attr(name), Some("true"))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Punct(char),
}

struct Lexer<'s> {
    src: &'s [u8],
    pos: usize,
    line: usize,
}

impl<'s> Lexer<'s> {
    fn skip_blank(&mut self) {
        while self.pos < self.src.len() {
            let c = self.src[self.pos];
            if c == b'\n' {
                self.line += 1;
                self.pos += 1;
            }
            else if c.is_ascii_whitespace() || c == b'\\' {
                self.pos += 1;
            }
            else if self.src[self.pos..].starts_with(b"/*") {
                self.pos += 2;
                while self.pos < self.src.len() && !self.src[self.pos..].starts_with(b"*/") {
                    if self.src[self.pos] == b'\n' { self.line += 1; }
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.src.len());
            }
            else if self.src[self.pos..].starts_with(b"//") {
                while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
                    self.pos += 1;
                }
            }
            else {
                break
            }
        }
    }

    /// Returns the next token and the line it starts on.
    fn next(&mut self) -> Option<(Token, usize)> {
        self.skip_blank();
        if self.pos >= self.src.len() {
            return None
        }
        let line = self.line;
        let c = self.src[self.pos];
        match c {
            b'(' | b')' | b'{' | b'}' | b':' | b';' | b',' => {
                self.pos += 1;
                Some((Token::Punct(c as char), line))
            },
            b'"' => {
                self.pos += 1;
                let st = self.pos;
                while self.pos < self.src.len() && self.src[self.pos] != b'"' {
                    if self.src[self.pos] == b'\n' { self.line += 1; }
                    self.pos += 1;
                }
                let s = String::from_utf8_lossy(&self.src[st..self.pos]).into_owned();
                self.pos = (self.pos + 1).min(self.src.len());
                Some((Token::Str(s), line))
            },
            _ => {
                let st = self.pos;
                while self.pos < self.src.len() {
                    let c = self.src[self.pos];
                    if c.is_ascii_whitespace() || b"(){}:;,\"".contains(&c) {
                        break
                    }
                    self.pos += 1;
                }
                let s = String::from_utf8_lossy(&self.src[st..self.pos]).into_owned();
                Some((Token::Word(s), line))
            }
        }
    }
}

struct Parser<'p> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    path: &'p Path,
}

impl<'p> Parser<'p> {
    fn new(src: &str, path: &'p Path) -> Self {
        let mut lexer = Lexer { src: src.as_bytes(), pos: 0, line: 1 };
        let mut tokens = Vec::new();
        while let Some(t) = lexer.next() {
            tokens.push(t);
        }
        Parser { tokens, pos: 0, path }
    }

    fn error(&self, message: impl Into<String>) -> PartError {
        let line = self.tokens.get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, l)| *l)
            .unwrap_or(0);
        PartError::Parse {
            path: self.path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_line(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, l)| *l).unwrap_or(usize::MAX)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        t
    }

    fn eat(&mut self, p: char) -> bool {
        if self.peek() == Some(&Token::Punct(p)) {
            self.pos += 1;
            true
        }
        else { false }
    }

    fn expect(&mut self, p: char) -> Result<()> {
        if self.eat(p) { Ok(()) }
        else { Err(self.error(format!("expected '{}'", p))) }
    }

    /// `( a, "b", c )` with the opening paren already consumed.
    fn parse_args(&mut self) -> Result<Vec<String>> {
        let mut args = Vec::new();
        loop {
            match self.bump() {
                Some(Token::Punct(')')) => return Ok(args),
                Some(Token::Punct(',')) => {},
                Some(Token::Word(w)) | Some(Token::Str(w)) => args.push(w),
                Some(Token::Punct(c)) => {
                    return Err(self.error(format!("unexpected '{}' in argument list", c)))
                },
                None => return Err(self.error("unterminated argument list")),
            }
        }
    }

    /// Parse statements until the closing brace of the current group.
    fn parse_body(&mut self, group: &mut LibGroup) -> Result<()> {
        loop {
            let name = match self.bump() {
                Some(Token::Punct('}')) => return Ok(()),
                Some(Token::Punct(';')) => continue,
                Some(Token::Word(w)) | Some(Token::Str(w)) => w,
                Some(Token::Punct(c)) => {
                    return Err(self.error(format!("unexpected '{}'", c)))
                },
                None => return Err(self.error(format!("unterminated group {}", group.kind))),
            };
            let stmt_line = self.tokens[self.pos - 1].1;
            if self.eat(':') {
                // the value runs to ';' or to the end of the line.
                let mut value = Vec::new();
                while self.peek_line() == stmt_line {
                    match self.peek() {
                        Some(Token::Punct(';')) | Some(Token::Punct('}')) => break,
                        Some(Token::Word(w)) | Some(Token::Str(w)) => {
                            value.push(w.clone());
                            self.pos += 1;
                        },
                        _ => { self.pos += 1; }
                    }
                }
                self.eat(';');
                group.attrs.push((name, value.join(" ")));
            }
            else if self.eat('(') {
                let args = self.parse_args()?;
                if self.eat('{') {
                    let mut sub = LibGroup { kind: name, args, ..Default::default() };
                    self.parse_body(&mut sub)?;
                    group.groups.push(sub);
                }
                else {
                    self.eat(';');
                    group.complex.push((name, args));
                }
            }
            else {
                return Err(self.error(format!("expected ':' or '(' after {}", name)))
            }
        }
    }

    fn parse_top(&mut self) -> Result<Vec<LibGroup>> {
        let mut groups = Vec::new();
        while self.peek().is_some() {
            let kind = match self.bump() {
                Some(Token::Word(w)) => w,
                _ => return Err(self.error("expected a top-level group")),
            };
            self.expect('(')?;
            let args = self.parse_args()?;
            self.expect('{')?;
            let mut g = LibGroup { kind, args, ..Default::default() };
            self.parse_body(&mut g)?;
            groups.push(g);
        }
        Ok(groups)
    }
}

/// Parse Liberty source text into top-level groups.
pub fn parse_liberty(src: &str, path: &Path) -> Result<Vec<LibGroup>> {
    Parser::new(src, path).parse_top()
}

/// A pin of a library cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LibPin {
    pub direction: PinDirection,
    pub is_clock: bool,
    /// Power/ground pin (`pg_pin`).
    pub is_supply: bool,
    /// Bus range `(from, to)` for bus pins.
    pub range: Option<(isize, isize)>,
}

#[derive(Debug, Clone)]
pub struct LibCell {
    pub info: LibCellInfo,
    pub pins: IndexMap<CompactString, LibPin>,
}

/// A merged set of Liberty libraries.
#[derive(Debug, Default, Clone)]
pub struct CellLibrary {
    pub library_names: Vec<String>,
    pub cells: IndexMap<CompactString, LibCell>,
}

const NON_DELAY_TIMING_TYPES: &[&str] = &[
    "hold", "removal", "recovery", "skew", "nochange",
    "min_pulse", "minimum_period", "non_seq",
];

fn table_max(group: &LibGroup) -> Option<f64> {
    let mut ret: Option<f64> = None;
    for (name, args) in &group.complex {
        if name != "values" { continue }
        for arg in args {
            for v in arg.split(',').filter_map(|s| s.trim().parse::<f64>().ok()) {
                ret = Some(ret.map_or(v, |r| r.max(v)));
            }
        }
    }
    ret
}

fn parse_direction(s: Option<&str>) -> PinDirection {
    match s {
        Some("input") => PinDirection::Input,
        Some("output") => PinDirection::Output,
        Some("inout") => PinDirection::Inout,
        _ => PinDirection::Unknown,
    }
}

/// Fold the timing groups of a pin into the cell's delay and setup.
fn collect_pin_timing(pin: &LibGroup, info: &mut LibCellInfo) {
    for timing in pin.groups_of("timing") {
        let ttype = timing.attr("timing_type").unwrap_or("combinational");
        if ttype.contains("setup") {
            for g in timing.groups.iter()
                .filter(|g| matches!(g.kind.as_str(), "rise_constraint" | "fall_constraint"))
            {
                if let Some(v) = table_max(g) {
                    info.setup = info.setup.max(v);
                }
            }
            continue
        }
        if NON_DELAY_TIMING_TYPES.iter().any(|t| ttype.contains(t)) {
            continue
        }
        for g in timing.groups.iter()
            .filter(|g| matches!(g.kind.as_str(), "cell_rise" | "cell_fall"))
        {
            if let Some(v) = table_max(g) {
                info.delay = info.delay.max(v);
            }
        }
        for name in ["intrinsic_rise", "intrinsic_fall"] {
            if let Some(v) = timing.attr(name).and_then(|v| v.parse::<f64>().ok()) {
                info.delay = info.delay.max(v);
            }
        }
    }
}

fn extract_cell(cell: &LibGroup, bus_types: &IndexMap<String, (isize, isize)>) -> Option<(CompactString, LibCell)> {
    let name = cell.args.first()?;
    let mut info = LibCellInfo {
        name: name.clone(),
        area: cell.attr("area").and_then(|a| a.parse().ok()).unwrap_or(0.0),
        is_sequential: cell.groups.iter().any(|g| matches!(
            g.kind.as_str(), "ff" | "ff_bank" | "latch" | "latch_bank" | "statetable")),
        is_macro: cell.attr_is_true("is_macro_cell"),
        ..Default::default()
    };
    let mut pins = IndexMap::new();
    for g in &cell.groups {
        match g.kind.as_str() {
            "pin" => {
                let lp = LibPin {
                    direction: parse_direction(g.attr("direction")),
                    is_clock: g.attr_is_true("clock"),
                    is_supply: false,
                    range: None,
                };
                for pname in &g.args {
                    pins.insert(CompactString::from(pname.as_str()), lp.clone());
                }
                collect_pin_timing(g, &mut info);
            },
            "bus" => {
                let Some(bname) = g.args.first() else { continue };
                let range = g.attr("bus_type")
                    .and_then(|t| bus_types.get(t))
                    .copied();
                pins.insert(CompactString::from(bname.as_str()), LibPin {
                    direction: parse_direction(g.attr("direction")),
                    is_clock: g.attr_is_true("clock"),
                    is_supply: false,
                    range,
                });
                collect_pin_timing(g, &mut info);
                for sub in g.groups_of("pin") {
                    collect_pin_timing(sub, &mut info);
                }
            },
            "pg_pin" => {
                for pname in &g.args {
                    pins.insert(CompactString::from(pname.as_str()), LibPin {
                        direction: PinDirection::Input,
                        is_clock: false,
                        is_supply: true,
                        range: None,
                    });
                }
            },
            _ => {}
        }
    }
    Some((CompactString::from(name.as_str()), LibCell { info, pins }))
}

impl CellLibrary {
    pub fn new() -> CellLibrary {
        Default::default()
    }

    /// Read a Liberty file and merge its cells into this library.
    ///
    /// Returns the library name. Cells already present are replaced.
    pub fn read_file(&mut self, path: &Path) -> Result<String> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| PartError::load("liberty", path, e))?;
        self.read_str(&src, path)
    }

    /// Like [`CellLibrary::read_file`], from already loaded text.
    /// `path` is only used in error messages.
    pub fn read_str(&mut self, src: &str, path: &Path) -> Result<String> {
        let groups = parse_liberty(src, path)?;
        let lib = groups.into_iter()
            .find(|g| g.kind == "library")
            .ok_or_else(|| PartError::load("liberty", path, "no library group"))?;
        let mut bus_types = IndexMap::new();
        for t in lib.groups_of("type") {
            let (Some(name), Some(from), Some(to)) = (
                t.args.first(),
                t.attr("bit_from").and_then(|v| v.parse::<isize>().ok()),
                t.attr("bit_to").and_then(|v| v.parse::<isize>().ok()),
            ) else { continue };
            bus_types.insert(name.clone(), (from, to));
        }
        let mut num_cells = 0;
        for cell in lib.groups_of("cell") {
            if let Some((name, c)) = extract_cell(cell, &bus_types) {
                self.cells.insert(name, c);
                num_cells += 1;
            }
        }
        let libname = lib.args.first().cloned().unwrap_or_default();
        clilog::info!("liberty library {} loaded: {} cells", libname, num_cells);
        self.library_names.push(libname.clone());
        Ok(libname)
    }

    #[inline]
    pub fn cell(&self, name: &str) -> Option<&LibCell> {
        self.cells.get(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn pin(&self, cell: &str, pin: &str) -> Option<&LibPin> {
        self.cells.get(cell)?.pins.get(pin)
    }
}
