//! Chain demo: every single-label marginal of a chain of 2x2 matrices, first in isolation and then inside one sharing scope.
//!
//! usage: einshare-demo [chain length] [backend]

use rand::{SeedableRng, rngs::SmallRng};
use tracing_subscriber::EnvFilter;

use einshare::prelude::*;

type Tensor = NdDenseRepr<f64>;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let size: usize = match args.next() {
        Some(s) => s.parse()?,
        None => 5,
    };
    let backend: NdBackend = match args.next() {
        Some(s) => s.parse()?,
        None => NdBackend::default(),
    };
    anyhow::ensure!((1..26).contains(&size), "chain length must be in 1..26");

    // use fast and seedable RNG for reproducibility.
    let mut rng = SmallRng::seed_from_u64(0);
    let xs: Vec<SharedArray<Tensor>> = (0..size)
        .map(|_| SharedArray::new(Tensor::random_using([2, 2], &mut rng)))
        .collect();

    // names ab,bc,cd,...
    let alphabet: Vec<char> = (b'a'..).take(size + 1).map(char::from).collect();
    let inputs = alphabet
        .windows(2)
        .map(|w| w.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    let shapes = vec![vec![2, 2]; size];

    println!("chain {} on backend {}", inputs, backend);

    let mut isolated = 0;
    for target in alphabet.iter() {
        let expr = format!("{}->{}", inputs, target);
        isolated += shared_intermediates(|cache| -> anyhow::Result<usize> {
            contract(&expr, &operands(&xs), &backend)?;
            Ok(cache.count_cached_ops())
        })?;
    }

    let shared = shared_intermediates(|cache| -> anyhow::Result<usize> {
        for target in alphabet.iter() {
            let expr = format!("{}->{}", inputs, target);
            println!("{}", contract_path(&expr, &shapes)?);
            let marginal = contract(&expr, &operands(&xs), &backend)?;
            println!("{} = {}\n", expr, marginal.data());
        }
        println!(
            "cache: {} keys, {} base arrays, {} resident values",
            cache.len(),
            cache.count_arrays(),
            cache.resident()
        );
        Ok(cache.count_cached_ops())
    })?;

    println!("{}", "-".repeat(40));
    println!("Without sharing: {} expressions", isolated);
    println!("With sharing: {} expressions", shared);
    Ok(())
}

fn operands(xs: &[SharedArray<Tensor>]) -> Vec<Operand<'_, Tensor>> {
    xs.iter().map(|x| x.to_operand()).collect()
}
