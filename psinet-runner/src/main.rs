//! psinet runner
//!
//! Builds a small demo net, attaches it to the demo world and steps it.
//! Logging follows `RUST_LOG` (default `info`).

mod config;
mod world;

use tracing::info;
use tracing_subscriber::EnvFilter;

use psinet_compute::select_engine;
use psinet_core::{NetError, Nodenet, ScalarEngine};

use config::{print_banner, RunnerConfig};
use world::{build_demo_net, DemoWorld};

fn main() -> Result<(), NetError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runner = RunnerConfig::from_env()?;
    let net_config = runner.net_config()?;

    let mut net = Nodenet::with_config("demo", net_config, Box::new(ScalarEngine::new()))?;
    let nodes = build_demo_net(&mut net)?;
    select_engine(&mut net);

    print_banner(&runner, &net);

    let mut world = DemoWorld::new(runner.seed);
    for _ in 0..runner.steps {
        let step = net.step_with_world(&mut world)?;

        if step % runner.report_every == 0 {
            let stats = net.engine_stats();
            info!(
                "Step {}: light={:.3} bright={:.3} afterglow={:.3} motor={:.3} ({} active, {}us)",
                step,
                world.light(),
                net.gate(nodes.concept, "gen")?.activation,
                net.gate(nodes.memory, "gen")?.activation,
                world.motor(),
                stats.nodes_calculated,
                stats.compute_time_us
            );
        }
    }

    net.check_consistency()?;
    info!(
        "Done after {} steps, eye={:.3} wheel={:.3}, {:.1}% node updates skipped on average",
        net.current_step(),
        net.gate(nodes.sensor, "gen")?.activation,
        net.node(nodes.actor)?.activation,
        net.activity().savings_percentage()
    );
    Ok(())
}
