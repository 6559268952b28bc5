use clap::Parser;
use log::info;

use smg_rs::abstraction::AbstractionOptions;
use smg_rs::edge::TargetSpecifier;
use smg_rs::interrupt::InterruptFlag;
use smg_rs::merge::{MergeOperator, MergeOptions};
use smg_rs::object::SmgObject;
use smg_rs::spc::{SymbolicProgramConfiguration, Variable};
use smg_rs::state::{SmgPrecision, SmgState};
use smg_rs::types::ValueId;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of loop iterations to simulate.
    #[arg(value_name = "INT", default_value = "6")]
    iterations: usize,

    /// Least number of list nodes folded into a segment.
    #[clap(long, value_name = "INT", default_value = "2")]
    min_length: u32,

    /// Store the iteration counter in each node instead of a constant.
    #[clap(long)]
    counter: bool,

    /// Link the last node back to the first.
    #[clap(long)]
    cyclic: bool,

    /// Print the reached configuration after every iteration.
    #[clap(long)]
    verbose: bool,
}

/// `head` pointing to a list holding `data`, nodes of 16 bytes with the next
/// pointer at offset 8.
fn build_list(data: &[i64], cyclic: bool) -> color_eyre::Result<SymbolicProgramConfiguration> {
    let head = Variable::local("main", "head");
    let (spc, _) = SymbolicProgramConfiguration::new().declare_variable(head.clone(), 8);
    let mut smg = spc.smg().clone();
    let mut nodes = Vec::new();
    let mut next = ValueId::ZERO;
    for &d in data.iter().rev() {
        let (s, node) = smg.add_object(SmgObject::region(16));
        let (s, value) = s.add_explicit(d);
        let s = s.write_value(node, 0, 8, value)?;
        let s = s.write_value(node, 8, 8, next)?;
        let (s, address) = s.address_of(node, 0, TargetSpecifier::Region)?;
        smg = s;
        next = address;
        nodes.push(node);
    }
    if cyclic {
        if let Some(&last) = nodes.first() {
            smg = smg.write_value(last, 8, 8, next)?;
        }
    }
    Ok(spc.with_smg(smg).write_variable(&head, 0, 8, next)?)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let precision = SmgPrecision {
        merge_at_block_end_only: true,
        abstraction: AbstractionOptions {
            enabled: true,
            min_list_length: args.min_length,
        },
    };
    let interrupt = InterruptFlag::new();
    let operator = MergeOperator::new(MergeOptions::default(), interrupt.clone());

    // Simulate `while (..) head = prepend(head)`: iteration `i` sees a list of
    // `i` nodes at the loop head.
    let mut reached: Option<SmgState> = None;
    let mut subsumptions = 0;
    for i in 1..=args.iterations {
        let data: Vec<i64> = (0..i).map(|k| if args.counter { k as i64 } else { 0 }).collect();
        let state = SmgState::new(build_list(&data, args.cyclic)?)
            .with_block_end(true)
            .abstract_if_needed(&precision, &interrupt)?;
        info!("iteration {}: new state {} (abstract: {})", i, state.id(), state.has_abstracted_objects());

        let next = match &reached {
            None => state,
            Some(r) => operator.merge(&state, r, &precision)?,
        };
        if reached.as_ref().is_some_and(|r| r.id() == next.id()) {
            println!("iteration {}: covered by {}", i, next.id());
        } else {
            println!("iteration {}: reached is now {}", i, next.id());
        }
        for (covered, covering) in operator.take_subsumptions() {
            info!("{} is covered by {}", covered, covering);
            subsumptions += 1;
        }
        if args.verbose {
            println!("{}", next.configuration().debug_string());
        }
        reached = Some(next);
    }

    if let Some(r) = &reached {
        println!("final reached state {}:", r.id());
        println!("{}", r.configuration().debug_string());
    }
    let stats = operator.statistics();
    println!(
        "merge attempts: {}, successes: {}, subsumptions: {}, time: {:?}",
        stats.attempts(),
        stats.successes(),
        subsumptions,
        stats.elapsed()
    );

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.2} s", time_total.as_secs_f64());

    Ok(())
}
