use std::{
    println,
    sync::{Arc, Barrier},
    thread,
};

use einshare::prelude::*;
use einshare_sharing::scope::depth;
use ndarray::Zip;
use num_traits::abs;
use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};

type Tensor = NdDenseRepr<f64>;

const EPS: f64 = 1e-8;

fn random(rng: &mut SmallRng, sizes: &[usize]) -> SharedArray<Tensor> {
    SharedArray::new(Tensor::random_using(sizes.iter().copied(), rng))
}

fn operands(xs: &[&SharedArray<Tensor>]) -> Vec<Operand<'static, Tensor>> {
    xs.iter().map(|x| Operand::Shared((*x).clone())).collect()
}

fn close(a: &Tensor, b: &Tensor) -> bool {
    a.data().shape() == b.data().shape()
        && Zip::from(a.data())
            .and(b.data())
            .all(|p, q| abs(p - q) < EPS * (1.0 + abs(*p)))
}

/// `ab,bc,cd,...` over `size` chained matrices, plus the labels used.
fn chain(size: usize) -> (String, Vec<char>) {
    let alphabet: Vec<char> = (b'a'..).take(size + 1).map(char::from).collect();
    let inputs = alphabet
        .windows(2)
        .map(|w| w.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",");
    (inputs, alphabet)
}

#[test]
fn shared_backend() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(0);
    let w = random(&mut rng, &[2, 3, 4]);
    let x = random(&mut rng, &[3, 4, 5]);
    let y = random(&mut rng, &[4, 5, 6]);
    let z = random(&mut rng, &[5, 6, 7]);
    let expr = "abc,bcd,cde,def->af";

    for backend in NdBackend::ALL {
        let ops = operands(&[&w, &x, &y, &z]);
        let expected = contract(expr, &ops, &backend)?;
        let actual = shared_intermediates(|_| contract(expr, &ops, &backend))?;
        assert!(close(&expected, &actual), "{}", backend);
    }
    Ok(())
}

#[test]
fn complete_sharing() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(1);
    let x = random(&mut rng, &[5, 4]);
    let y = random(&mut rng, &[4, 3]);
    let z = random(&mut rng, &[3, 2]);

    for backend in NdBackend::ALL {
        println!("{}", "-".repeat(40));
        println!("Without sharing:");
        let expected = shared_intermediates(|cache| -> anyhow::Result<usize> {
            contract("ab,bc,cd->", &operands(&[&x, &y, &z]), &backend)?;
            Ok(cache.len())
        })?;

        println!("{}", "-".repeat(40));
        println!("With sharing:");
        let actual = shared_intermediates(|cache| -> anyhow::Result<usize> {
            let first = contract("ab,bc,cd->", &operands(&[&x, &y, &z]), &backend)?;
            let second = contract("ab,bc,cd->", &operands(&[&x, &y, &z]), &backend)?;
            assert!(first.same_object(&second));
            // three base arrays and four steps
            assert_eq!(cache.count_arrays(), 3);
            assert_eq!(cache.count_cached_ops(), 4);
            Ok(cache.len())
        })?;

        println!("{}", "-".repeat(40));
        println!("Without sharing: {} expressions", expected);
        println!("With sharing: {} expressions", actual);
        assert_eq!(actual, expected);
    }
    Ok(())
}

#[test]
fn partial_sharing() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(2);
    let x = random(&mut rng, &[5, 4]);
    let y = random(&mut rng, &[4, 3]);
    let z1 = random(&mut rng, &[3, 2]);
    let z2 = random(&mut rng, &[3, 2]);

    for backend in NdBackend::ALL {
        let mut num_exprs_nosharing = 0;
        for z in [&z1, &z2] {
            num_exprs_nosharing += shared_intermediates(|cache| -> anyhow::Result<usize> {
                contract("ab,bc,cd->", &operands(&[&x, &y, z]), &backend)?;
                // ignore base arrays
                Ok(cache.len() - 3)
            })?;
        }

        let num_exprs_sharing = shared_intermediates(|cache| -> anyhow::Result<usize> {
            contract("ab,bc,cd->", &operands(&[&x, &y, &z1]), &backend)?;
            contract("ab,bc,cd->", &operands(&[&x, &y, &z2]), &backend)?;
            Ok(cache.len() - 4)
        })?;

        println!("Without sharing: {} expressions", num_exprs_nosharing);
        println!("With sharing: {} expressions", num_exprs_sharing);
        assert!(num_exprs_nosharing > num_exprs_sharing);
    }
    Ok(())
}

#[test]
fn chain_targets() -> anyhow::Result<()> {
    for size in [3, 4, 5] {
        let mut rng = SmallRng::seed_from_u64(size as u64);
        let xs: Vec<_> = (0..size).map(|_| random(&mut rng, &[2, 2])).collect();
        let refs: Vec<&SharedArray<Tensor>> = xs.iter().collect();
        let (inputs, alphabet) = chain(size);
        let shapes = vec![vec![2, 2]; size];

        shared_intermediates(|_| -> anyhow::Result<()> {
            println!("{}", inputs);
            for target in alphabet.iter() {
                let expr = format!("{}->{}", inputs, target);
                println!("{}", contract_path(&expr, &shapes)?);
                let shared = contract(&expr, &operands(&refs), &NdBackend::Dot)?;
                assert_eq!(shared.data().shape(), &[2]);
            }
            println!("{}", "-".repeat(40));
            Ok(())
        })?;
    }
    Ok(())
}

#[test]
fn chain_2() -> anyhow::Result<()> {
    for size in [3, 4, 5, 10] {
        let mut rng = SmallRng::seed_from_u64(100 + size as u64);
        let xs: Vec<_> = (0..size).map(|_| random(&mut rng, &[2, 2])).collect();
        let refs: Vec<&SharedArray<Tensor>> = xs.iter().collect();
        let (inputs, alphabet) = chain(size);

        let expected = alphabet
            .windows(2)
            .map(|t| {
                let expr = format!("{}->{}", inputs, t.iter().collect::<String>());
                contract(&expr, &operands(&refs), &NdBackend::Dot)
            })
            .collect::<Result<Vec<_>, _>>()?;

        shared_intermediates(|_| -> anyhow::Result<()> {
            for (t, expected) in alphabet.windows(2).zip(&expected) {
                let expr = format!("{}->{}", inputs, t.iter().collect::<String>());
                let actual = contract(&expr, &operands(&refs), &NdBackend::Dot)?;
                assert!(close(expected, &actual), "{}", expr);
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn compute_cost(cache: &SharingCache) -> usize {
    cache.count_cached_ops()
}

#[test]
fn chain_2_growth() -> anyhow::Result<()> {
    let sizes: Vec<usize> = (1..=20).collect();
    let mut costs = Vec::new();
    for &size in sizes.iter() {
        let mut rng = SmallRng::seed_from_u64(size as u64);
        let xs: Vec<_> = (0..size).map(|_| random(&mut rng, &[2, 2])).collect();
        let refs: Vec<&SharedArray<Tensor>> = xs.iter().collect();
        let (inputs, alphabet) = chain(size);

        let cost = shared_intermediates(|cache| -> anyhow::Result<usize> {
            for t in alphabet.windows(2) {
                let expr = format!("{}->{}", inputs, t.iter().collect::<String>());
                contract(&expr, &operands(&refs), &NdBackend::Dot)?;
            }
            Ok(compute_cost(cache))
        })?;
        costs.push(cost);
    }

    println!("sizes = {:?}", sizes);
    println!("costs = {:?}", costs);
    for (size, cost) in sizes.iter().zip(costs.iter()) {
        println!("{}\t{}", size, cost);
        // isolated, every one of the `size` targets would pay for its own path
        assert!(*cost <= 10 * size, "{} steps for a chain of {}", cost, size);
    }
    assert!(costs.windows(2).all(|w| w[0] <= w[1]));
    Ok(())
}

#[test]
fn long_chain_of_large_matrices() -> anyhow::Result<()> {
    let size = 20;
    let mut rng = SmallRng::seed_from_u64(20);
    let xs: Vec<_> = (0..size).map(|_| random(&mut rng, &[100, 100])).collect();
    let refs: Vec<&SharedArray<Tensor>> = xs.iter().collect();
    let (inputs, _) = chain(size);
    let expr = format!("{}->a", inputs);

    let path = contract_path(&expr, &vec![vec![100, 100]; size])?;
    // the naive estimate is 100^21 multiply-adds
    assert_eq!(path.info().naive_cost(), u128::MAX);
    assert_eq!(path.info().largest_intermediate(), 10_000);
    println!("{}", path);

    let marginal = shared_intermediates(|cache| -> anyhow::Result<_> {
        let r = contract(&expr, &operands(&refs), &NdBackend::Dot)?;
        assert_eq!(cache.count_cached_ops(), path.steps().len());
        Ok(r)
    })?;
    assert_eq!(marginal.data().shape(), &[100]);
    assert!(marginal.data().iter().all(|v| v.is_finite() && *v > 0.0));
    Ok(())
}

#[test]
fn chain_sharing() -> anyhow::Result<()> {
    for size in [3, 4, 5] {
        let mut rng = SmallRng::seed_from_u64(200 + size as u64);
        let xs: Vec<_> = (0..size).map(|_| random(&mut rng, &[2, 2])).collect();
        let refs: Vec<&SharedArray<Tensor>> = xs.iter().collect();
        let (inputs, alphabet) = chain(size);
        let shapes = vec![vec![2, 2]; size];

        let mut num_exprs_nosharing = 0;
        for target in alphabet.iter() {
            let expr = format!("{}->{}", inputs, target);
            num_exprs_nosharing += shared_intermediates(|cache| -> anyhow::Result<usize> {
                contract(&expr, &operands(&refs), &NdBackend::Dot)?;
                Ok(compute_cost(cache))
            })?;
        }

        let num_exprs_sharing = shared_intermediates(|cache| -> anyhow::Result<usize> {
            println!("{}", inputs);
            for target in alphabet.iter() {
                let expr = format!("{}->{}", inputs, target);
                println!("{}", contract_path(&expr, &shapes)?);
                contract(&expr, &operands(&refs), &NdBackend::Dot)?;
            }
            Ok(compute_cost(cache))
        })?;

        println!("{}", "-".repeat(40));
        println!("Without sharing: {} expressions", num_exprs_nosharing);
        println!("With sharing: {} expressions", num_exprs_sharing);
        assert!(num_exprs_nosharing > num_exprs_sharing);
    }
    Ok(())
}

#[test]
fn results_released_after_scope() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(3);
    let x = random(&mut rng, &[5, 4]);
    let y = random(&mut rng, &[4, 3]);

    let (cache, result) = shared_intermediates(|cache| -> anyhow::Result<_> {
        let result = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        assert!(cache.contains_result(result.token()));
        assert!(cache.contains_result(x.token()));
        Ok((cache.clone(), result))
    })?;
    assert!(!cache.contains_result(result.token()));
    assert!(!cache.contains_result(x.token()));
    assert!(cache.is_empty());
    assert_eq!(cache.resident(), 0);
    // the caller's handle outlives the scope
    assert_eq!(result.data().shape(), &[5, 3]);
    Ok(())
}

#[test]
fn relabelled_and_swapped_steps_hit() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(4);
    let x = random(&mut rng, &[3, 4]);
    let y = random(&mut rng, &[4, 5]);

    shared_intermediates(|cache| -> anyhow::Result<()> {
        let a = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let len = cache.len();
        let b = contract("ij,jk->ik", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let c = contract("jk,ij->ik", &operands(&[&y, &x]), &NdBackend::Dot)?;
        assert!(a.same_object(&b));
        assert!(a.same_object(&c));
        assert_eq!(cache.len(), len);
        Ok(())
    })
}

#[test]
fn distinct_objects_never_share() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(5);
    let x = random(&mut rng, &[3, 4]);
    let x2 = SharedArray::new(x.value().clone());
    let y = random(&mut rng, &[4, 5]);

    shared_intermediates(|cache| -> anyhow::Result<()> {
        let a = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let b = contract("ab,bc->ac", &operands(&[&x2, &y]), &NdBackend::Dot)?;
        assert!(!a.same_object(&b));
        assert!(close(&a, &b));
        assert_eq!(cache.count_cached_ops(), 2);
        assert_eq!(cache.count_arrays(), 3);
        Ok(())
    })
}

#[test]
fn backend_is_part_of_the_key() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(6);
    let x = random(&mut rng, &[3, 4]);
    let y = random(&mut rng, &[4, 5]);

    shared_intermediates(|cache| -> anyhow::Result<()> {
        let a = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let b = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Loop)?;
        assert!(!a.same_object(&b));
        assert!(close(&a, &b));
        assert_eq!(cache.count_cached_ops(), 2);
        Ok(())
    })
}

#[test]
fn nested_scope_borrows_outer_cache() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(7);
    let x = random(&mut rng, &[3, 4]);
    let y = random(&mut rng, &[4, 5]);

    shared_intermediates(|outer| -> anyhow::Result<()> {
        let a = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let len = outer.len();
        let (b, t) = shared_intermediates(|inner| -> anyhow::Result<_> {
            assert!(inner.same_cache(outer));
            let b = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
            let t = contract("ab,bc->ca", &operands(&[&x, &y]), &NdBackend::Dot)?;
            Ok((b, t))
        })?;
        assert!(a.same_object(&b));
        // results of the nested scope stay with the outer one
        assert!(outer.contains_result(t.token()));
        assert!(outer.len() > len);
        Ok(())
    })
}

#[test]
fn independent_nested_scope() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(8);
    let x = random(&mut rng, &[3, 4]);
    let y = random(&mut rng, &[4, 5]);
    let options = ScopeOptions::new().nesting(NestingPolicy::Independent);

    shared_intermediates(|outer| -> anyhow::Result<()> {
        let a = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
        let len = outer.len();
        let (inner, b) = shared_intermediates_with(None, options, |inner| -> anyhow::Result<_> {
            assert!(!inner.same_cache(outer));
            assert!(inner.is_empty());
            let b = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
            assert_eq!(inner.count_cached_ops(), 1);
            Ok((inner.clone(), b))
        })?;
        assert!(!a.same_object(&b));
        assert!(inner.is_empty());
        assert_eq!(outer.len(), len);
        assert!(outer.contains_result(a.token()));
        Ok(())
    })
}

#[test]
fn explicit_cache_across_threads() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(9);
    let x = random(&mut rng, &[6, 4]);
    let y = random(&mut rng, &[4, 6]);
    let cache = SharingCache::new();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let (x, y, cache, barrier) = (x.clone(), y.clone(), cache.clone(), barrier.clone());
            thread::spawn(move || -> anyhow::Result<_> {
                let token = shared_intermediates_with(Some(cache), ScopeOptions::default(), |_| {
                    let r = contract("ab,bc->ac", &operands(&[&x, &y]), &NdBackend::Dot)?;
                    // keep the scope open until both threads have computed
                    barrier.wait();
                    anyhow::Ok(r.token())
                })?;
                Ok(token)
            })
        })
        .collect();

    let mut tokens = Vec::new();
    for h in handles {
        match h.join() {
            Ok(token) => tokens.push(token?),
            Err(_) => anyhow::bail!("worker panicked"),
        }
    }
    assert_eq!(tokens[0], tokens[1]);
    assert!(cache.is_empty());
    Ok(())
}

#[test]
fn scope_exits_on_error() {
    let mut rng = SmallRng::seed_from_u64(10);
    let x = random(&mut rng, &[3, 4]);
    let z = random(&mut rng, &[5, 2]);

    let err = shared_intermediates(|_| contract("ab,bc->ac", &operands(&[&x, &z]), &NdBackend::Dot))
        .unwrap_err();
    assert!(matches!(
        err,
        ContractError::Subscripts(SubscriptsError::SizeMismatch { label: 'b', .. })
    ));
    assert_eq!(depth(), 0);

    let raw = x.value().clone();
    let err = shared_intermediates(|_| {
        contract("ab,ab->", &[x.to_operand(), Operand::Borrowed(&raw)], &NdBackend::Dot)
    })
    .unwrap_err();
    assert!(matches!(
        err,
        ContractError::Share(ShareError::Identity(IdentityError::Unstable))
    ));
    assert_eq!(depth(), 0);
}

#[test]
fn unmatched_exit_is_an_error() {
    assert_eq!(exit_scope(), Err(ScopeError::NotActive));
    let cache = enter_scope(None, ScopeOptions::default());
    assert!(cache.is_empty());
    assert_eq!(exit_scope(), Ok(()));
    assert_eq!(exit_scope(), Err(ScopeError::NotActive));
}

#[test]
fn backends_agree() -> anyhow::Result<()> {
    let mut rng = SmallRng::seed_from_u64(11);
    let x = random(&mut rng, &[2, 3, 4]);
    let y = random(&mut rng, &[4, 3, 5]);
    let z = random(&mut rng, &[5, 2]);
    for expr in ["abc,cbd,de->ae", "abc,cbd,da->b", "abc,cbd,de"] {
        let d = contract(expr, &operands(&[&x, &y, &z]), &NdBackend::Dot)?;
        let l = contract(expr, &operands(&[&x, &y, &z]), &NdBackend::Loop)?;
        assert!(close(&d, &l), "{}", expr);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// results inside and outside a scope agree
    #[test]
    fn sharing_is_transparent(
        a in 1usize..5,
        b in 1usize..5,
        c in 1usize..5,
        d in 1usize..5,
        seed in any::<u64>(),
        sequential in any::<bool>(),
    ) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let x = random(&mut rng, &[a, b]);
        let y = random(&mut rng, &[b, c]);
        let z = random(&mut rng, &[c, d]);
        let strategy = if sequential { PathStrategy::Sequential } else { PathStrategy::Greedy };
        let options = ContractOptions::new().strategy(strategy);

        for expr in ["ab,bc,cd->ad", "ab,bc,cd->", "ab,bc,cd->db"] {
            let ops = operands(&[&x, &y, &z]);
            let expected = contract_with(expr, &ops, &NdBackend::Loop, &options).unwrap();
            let actual =
                shared_intermediates(|_| contract_with(expr, &ops, &NdBackend::Dot, &options))
            .unwrap();
            prop_assert!(close(&expected, &actual), "{}", expr);
        }
    }
}
