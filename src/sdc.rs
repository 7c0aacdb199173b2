// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Timing constraints: the SDC commands the lumped timer understands.
//!
//! Supported are `create_clock`, `set_input_delay` and
//! `set_output_delay`. Everything else is skipped with a debug message.

use crate::error::{PartError, Result};
use indexmap::IndexMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    pub name: String,
    pub period: f64,
    /// `[rise, fall]` edges.
    pub waveform: [f64; 2],
    /// Source ports or pins; empty for a virtual clock.
    pub sources: Vec<String>,
}

/// Clocks and port delays of a design.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    pub clocks: Vec<Clock>,
    /// Port name to external input arrival.
    pub input_delays: IndexMap<String, f64>,
    /// Port name to external output requirement.
    pub output_delays: IndexMap<String, f64>,
}

/// Split a command line into words, flattening `[get_ports a]` and
/// `{a b}` object lists into their plain names.
///
/// A `[` inside a word starts a bit index (`data[3]`) and is kept.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut cur = String::new();
    let mut in_index = false;
    for c in line.chars() {
        match c {
            '[' if !cur.is_empty() => {
                in_index = true;
                cur.push(c);
            },
            ']' if in_index => {
                in_index = false;
                cur.push(c);
            },
            c if c.is_whitespace() || matches!(c, '[' | ']' | '{' | '}') => {
                in_index = false;
                if !cur.is_empty() {
                    words.push(std::mem::take(&mut cur));
                }
            },
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        words.push(cur);
    }
    words.retain(|w| !matches!(
        w.as_str(),
        "get_ports" | "get_pins" | "get_clocks" | "get_nets" | "get_cells"
    ));
    words
}

impl Constraints {
    pub fn new() -> Constraints {
        Default::default()
    }

    /// Read an SDC file, merging its constraints into `self`.
    pub fn read_file(&mut self, path: &Path) -> Result<()> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| PartError::load("sdc", path, e))?;
        self.read_str(&src, path)
    }

    pub fn read_str(&mut self, src: &str, path: &Path) -> Result<()> {
        // join backslash-continued lines first, keeping the line number
        // of the first physical line.
        let mut pending = String::new();
        let mut pending_line = 0;
        for (i, raw) in src.lines().enumerate() {
            if pending.is_empty() {
                pending_line = i + 1;
            }
            let raw = raw.trim_end();
            if let Some(stripped) = raw.strip_suffix('\\') {
                pending.push_str(stripped);
                pending.push(' ');
                continue
            }
            pending.push_str(raw);
            let line = std::mem::take(&mut pending);
            self.parse_command(line.trim(), path, pending_line)?;
        }
        if !pending.is_empty() {
            self.parse_command(pending.trim(), path, pending_line)?;
        }
        clilog::info!("constraints loaded: {} clocks, {} input delays, {} output delays",
                      self.clocks.len(), self.input_delays.len(), self.output_delays.len());
        Ok(())
    }

    fn parse_command(&mut self, line: &str, path: &Path, line_num: usize) -> Result<()> {
        if line.is_empty() || line.starts_with('#') {
            return Ok(())
        }
        let words = split_words(line);
        let err = |message: String| PartError::Parse {
            path: path.to_path_buf(),
            line: line_num,
            message,
        };
        match words[0].as_str() {
            "create_clock" => self.parse_create_clock(&words[1..]).map_err(err),
            "set_input_delay" => {
                let (delay, ports) = parse_port_delay(&words[1..]).map_err(err)?;
                for p in ports {
                    self.input_delays.insert(p, delay);
                }
                Ok(())
            },
            "set_output_delay" => {
                let (delay, ports) = parse_port_delay(&words[1..]).map_err(err)?;
                for p in ports {
                    self.output_delays.insert(p, delay);
                }
                Ok(())
            },
            cmd => {
                clilog::debug!("sdc: ignoring command {}", cmd);
                Ok(())
            }
        }
    }

    fn parse_create_clock(&mut self, args: &[String]) -> std::result::Result<(), String> {
        let mut name = None;
        let mut period = None;
        let mut waveform = None;
        let mut sources = Vec::new();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "-name" => {
                    i += 1;
                    name = args.get(i).cloned();
                },
                "-period" => {
                    i += 1;
                    period = args.get(i).and_then(|p| p.parse::<f64>().ok());
                    if period.is_none() {
                        return Err("create_clock: invalid -period".to_string())
                    }
                },
                "-waveform" => {
                    let r = args.get(i + 1).and_then(|v| v.parse::<f64>().ok());
                    let f = args.get(i + 2).and_then(|v| v.parse::<f64>().ok());
                    match (r, f) {
                        (Some(r), Some(f)) => waveform = Some([r, f]),
                        _ => return Err("create_clock: invalid -waveform".to_string()),
                    }
                    i += 2;
                },
                "-add" => {},
                a if a.starts_with('-') => {
                    // an option with an argument we do not model
                    i += 1;
                },
                src => sources.push(src.to_string()),
            }
            i += 1;
        }
        let period = period.ok_or_else(|| "create_clock: missing -period".to_string())?;
        let name = name
            .or_else(|| sources.first().cloned())
            .unwrap_or_else(|| format!("clk{}", self.clocks.len()));
        self.clocks.push(Clock {
            name,
            period,
            waveform: waveform.unwrap_or([0.0, period / 2.0]),
            sources,
        });
        Ok(())
    }

    /// The period used for single-domain analysis: the tightest clock.
    pub fn min_period(&self) -> Option<f64> {
        self.clocks.iter()
            .map(|c| c.period)
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.min(p))))
    }

    pub fn is_clock_source(&self, port: &str) -> bool {
        self.clocks.iter().any(|c| c.sources.iter().any(|s| s == port))
    }
}

/// `set_input_delay`/`set_output_delay`: the delay value and the ports.
fn parse_port_delay(args: &[String]) -> std::result::Result<(f64, Vec<String>), String> {
    let mut delay = None;
    let mut ports = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-clock" | "-reference_pin" => { i += 1; },
            a if a.starts_with('-') && a.parse::<f64>().is_err() => {},
            a => match (delay, a.parse::<f64>()) {
                (None, Ok(d)) => delay = Some(d),
                _ => ports.push(a.to_string()),
            }
        }
        i += 1;
    }
    let delay = delay.ok_or_else(|| "missing delay value".to_string())?;
    Ok((delay, ports))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Constraints {
        let mut c = Constraints::new();
        c.read_str(src, Path::new("test.sdc")).unwrap();
        c
    }

    #[test]
    fn clocks_and_delays() {
        let c = parse(r#"
# constraints
create_clock -name core_clk -period 2.5 [get_ports clk]
create_clock -period 1.0 -waveform {0 0.4} [get_ports {fast}]
set_input_delay 0.3 -clock core_clk [get_ports {a b}]
set_output_delay -clock core_clk 0.2 \
    [get_ports y]
set_load 0.01 [get_ports y]
"#);
        assert_eq!(c.clocks.len(), 2);
        assert_eq!(c.clocks[0].name, "core_clk");
        assert_eq!(c.clocks[0].sources, vec!["clk"]);
        assert_eq!(c.clocks[0].waveform, [0.0, 1.25]);
        assert_eq!(c.clocks[1].name, "fast");
        assert_eq!(c.clocks[1].waveform, [0.0, 0.4]);
        assert_eq!(c.min_period(), Some(1.0));
        assert_eq!(c.input_delays.get("a"), Some(&0.3));
        assert_eq!(c.input_delays.get("b"), Some(&0.3));
        assert_eq!(c.output_delays.get("y"), Some(&0.2));
        assert!(c.is_clock_source("clk"));
        assert!(!c.is_clock_source("a"));
    }

    #[test]
    fn missing_period_is_reported_with_line() {
        let mut c = Constraints::new();
        let err = c.read_str("\ncreate_clock [get_ports clk]\n", Path::new("x.sdc"))
            .unwrap_err();
        match err {
            PartError::Parse { line, .. } => assert_eq!(line, 2),
            e => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn bus_bits_keep_their_index() {
        let c = parse("set_output_delay 0.1 [get_ports {dout[0] dout[1]}]\n\
                       set_input_delay 0.2 [get_ports din[3]]");
        assert_eq!(c.output_delays.keys().collect::<Vec<_>>(), vec!["dout[0]", "dout[1]"]);
        assert_eq!(c.input_delays.get("din[3]"), Some(&0.2));
    }

    #[test]
    fn no_clock_no_period() {
        assert_eq!(parse("set_input_delay 0.1 [get_ports a]").min_period(), None);
    }
}
