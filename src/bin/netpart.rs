// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use netpart::builder::BuildStats;
use netpart::error::Result;
use netpart::evaluate::PartitionMetrics;
use netpart::netlist::NetlistEngine;
use netpart::partition::GreedyBalancePartitioner;
use netpart::session::{PartitionConfig, Session};
use netpart::solution;
use serde::Serialize;

#[derive(clap::Args, Debug)]
struct DesignArgs {
    /// Gate-level verilog netlist.
    #[clap(short = 'v', long)]
    verilog: PathBuf,
    /// Top module type in netlist to partition.
    ///
    /// If not specified, we will guess it from the hierarchy.
    #[clap(short = 'm', long)]
    top: Option<String>,
    /// Liberty libraries of the cells used in the netlist.
    #[clap(short = 'l', long, required = true)]
    liberty: Vec<PathBuf>,
    /// Timing constraints.
    #[clap(short = 's', long)]
    sdc: Option<PathBuf>,
    /// Number of partitions.
    #[clap(short = 'n', long, default_value_t = 2)]
    num_parts: usize,
    /// Allowed partition weight relative to the average.
    #[clap(short = 'b', long, default_value_t = 2.0)]
    balance: f64,
    #[clap(long, default_value_t = 0)]
    seed: u64,
    /// Extract critical timing paths and report how many are cut.
    #[clap(short = 't', long)]
    timing: bool,
    /// Maximum number of timing paths.
    #[clap(long, alias = "top_n", default_value_t = 100000)]
    top_n: usize,
    /// Write the metrics as JSON to this path.
    #[clap(long)]
    report_json: Option<PathBuf>,
    /// Print every timing path and partition member.
    #[clap(short = 'd', long)]
    debug: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Build the hypergraph, partition it and write the result.
    Partition {
        #[clap(flatten)]
        design: DesignArgs,
        /// Output path of the partition result.
        #[clap(short = 'o', long, default_value = "partition.part")]
        output: PathBuf,
    },
    /// Evaluate an existing solution against the design.
    Evaluate {
        #[clap(flatten)]
        design: DesignArgs,
        /// Solution file, one partition id per vertex.
        #[clap(long)]
        solution: PathBuf,
        /// Also write the weighted hypergraph in hMETIS format.
        #[clap(long)]
        hypergraph: Option<PathBuf>,
        /// Also write the hypergraph with integer weights.
        #[clap(long, alias = "hypergraph_int")]
        hypergraph_int: Option<PathBuf>,
    },
}

#[derive(clap::Parser, Debug)]
#[clap(about = "Timing-aware netlist hypergraph partitioning")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Serialize)]
struct Report<'a> {
    config: &'a PartitionConfig,
    build: Option<&'a BuildStats>,
    metrics: &'a PartitionMetrics,
}

fn load(design: &DesignArgs) -> Result<Session<NetlistEngine>> {
    let mut engine = NetlistEngine::new();
    for lib in &design.liberty {
        clilog::info!("reading liberty {}", lib.display());
        engine.read_liberty(lib)?;
    }
    clilog::info!("reading verilog {}", design.verilog.display());
    engine.read_netlist(&design.verilog, design.top.as_deref())?;
    if let Some(sdc) = &design.sdc {
        clilog::info!("reading sdc {}", sdc.display());
        engine.read_sdc(sdc)?;
    }
    let config = PartitionConfig {
        num_parts: design.num_parts,
        balance_factor: design.balance,
        seed: design.seed,
        timing_aware: design.timing,
        top_n: design.top_n,
    };
    Ok(Session::new(engine, config))
}

fn report(session: &Session<NetlistEngine>, design: &DesignArgs,
          parts: &[usize], metrics: &PartitionMetrics) -> Result<()> {
    clilog::info!("partition metrics:\n{}", metrics);
    if design.debug {
        for (i, p) in session.timing_paths().iter().enumerate() {
            clilog::info!("path {}: slack {:.4}, vertices {:?}, hyperedges {:?}",
                          i, p.slack, p.vertices, p.edges);
        }
        if let Some(hg) = session.hypergraph() {
            for (v, p) in hg.vertices().iter().zip(parts) {
                clilog::info!("{} ({}) -> {}", v.name, v.cell, p);
            }
        }
    }
    if let Some(path) = &design.report_json {
        let r = Report {
            config: session.config(),
            build: session.build_stats(),
            metrics,
        };
        let json = serde_json::to_string_pretty(&r).map_err(std::io::Error::from)?;
        std::fs::write(path, json)?;
        clilog::info!("json report written to {}", path.display());
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Partition { design, output } => {
            let mut session = load(&design)?;
            let timer = clilog::stimer!("partition");
            let (assignment, metrics) = session.run(&GreedyBalancePartitioner)?;
            clilog::finish!(timer);
            report(&session, &design, assignment.parts(), &metrics)?;
            if let Some(hg) = session.hypergraph() {
                solution::write_result_file(&output, hg, &assignment, metrics.cutsize)?;
            }
        },
        Command::Evaluate { design, solution, hypergraph, hypergraph_int } => {
            let mut session = load(&design)?;
            let hg = session.build_hypergraph()?;
            if let Some(path) = &hypergraph {
                hg.write_hmetis(path)?;
                clilog::info!("weighted hypergraph written to {}", path.display());
            }
            if let Some(path) = &hypergraph_int {
                hg.write_hmetis_int(path, 1.0)?;
                clilog::info!("integer hypergraph written to {}", path.display());
            }
            if design.timing {
                session.extract_timing_paths()?;
            }
            let assignment = solution::read_solution(&solution, design.num_parts)?;
            let metrics = session.evaluate(&assignment);
            report(&session, &design, assignment.parts(), &metrics)?;
        },
    }
    Ok(())
}

fn main() {
    clilog::init_stderr_color_debug();
    clilog::set_max_print_count(clilog::Level::Warn, "LIB_PIN_UNKNOWN", 10);
    let args = <Args as clap::Parser>::parse();
    clilog::info!("netpart args:\n{:#?}", args);
    if let Err(e) = run(args) {
        clilog::error!("{}", e);
        std::process::exit(1);
    }
}
