//! Runs the stock two-phase protocol demo: ten workers (three acquirers,
//! three releasers, four observers) contend over one six-slot block
//! stack, then report in creation order.
//!
//! Exit code 0 on a clean run; any domain error or sync fault is printed
//! to stderr and exits with code 1 (worker-local errors fail the process
//! from inside the worker, first error wins).

use std::process::ExitCode;

use block_phases::{BlockStack, Coordinator, Population};

fn main() -> ExitCode {
    let stack = BlockStack::new();
    println!(
        "coordinator: initial top = {}.",
        stack.top_index().map_or(-1, |top| top as i64)
    );
    println!("coordinator: initial stack: {}.", stack);

    match Coordinator::with_stack(Population::default(), stack).run() {
        Ok(report) => {
            println!("run complete.");
            println!(
                "final top = {}.",
                report.top_index.map_or(-1, |top| top as i64)
            );
            println!("final top block = '{}'.", report.top_block);
            match report.below_top_block {
                Some(block) => println!("final block below top = '{}'.", block),
                None => println!("final block below top = (none)."),
            }
            println!("stack access count = {}.", report.access_count);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("fatal: {}", error);
            ExitCode::FAILURE
        }
    }
}
