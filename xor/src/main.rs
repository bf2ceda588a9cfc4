use neatcore::genomics::GeneticConfig;
use neatcore::networks::Network;
use neatcore::populations::{self, PopulationConfig, Problem};

use std::num::NonZeroUsize;

/// Best fitness at which a network is considered a solution:
/// the error budget across all four patterns is 0.1.
const TARGET_FITNESS: f64 = 3.9;

const PATTERNS: [([f64; 2], f64); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

fn main() {
    tracing_subscriber::fmt().init();

    let problem = Problem::new(
        "xor",
        |_, network| {
            let mut fitness = 4.0;
            for (inputs, target) in PATTERNS {
                let output = network.activate(&inputs).map_or(f64::NAN, |out| out[0]);
                fitness -= (target - output).powi(2);
            }
            fitness
        },
        |sorted, _| sorted[0].fitness() >= TARGET_FITNESS,
    );

    let genetic_config = GeneticConfig {
        inputs: 2,
        outputs: 1,
        bias: true,
        ..GeneticConfig::default()
    };
    let population_config = PopulationConfig {
        population_size: NonZeroUsize::new(150).unwrap(),
        max_generations: 300,
        seed: std::env::args()
            .nth(1)
            .map(|arg| arg.parse().expect("seed must be a u64")),
        ..PopulationConfig::default()
    };

    let (best, statistics) = populations::run(&problem, genetic_config, population_config)
        .expect("degenerate population");

    for generation in statistics.generations() {
        println!("{}", generation);
    }
    println!();
    if best.fitness() >= TARGET_FITNESS {
        println!("solution found, fitness {:.4}:", best.fitness());
    } else {
        println!("no solution; best fitness {:.4}:", best.fitness());
    }
    println!("{}", best);

    let mut network = Network::create(&best);
    for (inputs, target) in PATTERNS {
        let output = network.activate(&inputs).map_or(f64::NAN, |out| out[0]);
        println!("  {:?} -> {:.4} (want {})", inputs, output, target);
    }
}
