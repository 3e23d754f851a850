pub mod error;

use alloc::{vec, vec::Vec};
use einshare_core::subscripts::{Label, PairSpec};
use error::TenalgError;
use ndarray::{
    ArrayBase, ArrayD, ArrayViewD, Axis, CowArray, Data, Dimension, ErrorKind::IncompatibleShape,
    Ix, IxDyn, LinalgScalar, Order, ShapeError, indices,
};

type Result<T> = core::result::Result<T, TenalgError>;

/// Contracts the last `concat_dim` axes of `x` with the first `concat_dim` axes of `y`.
pub fn mul<S1, D1, S2, D2, E>(
    x: &ArrayBase<S1, D1>,
    y: &ArrayBase<S2, D2>,
    concat_dim: usize,
) -> Result<ArrayD<E>>
where
    S1: Data<Elem = E>,
    D1: Dimension,
    S2: Data<Elem = E>,
    D2: Dimension,
    E: LinalgScalar,
{
    let x_ixs = x.shape();
    let y_ixs = y.shape();
    let x_dim = x_ixs.len();
    let y_dim = y_ixs.len();

    if x_dim < concat_dim || y_dim < concat_dim {
        return Err(ShapeError::from_kind(IncompatibleShape).into());
    }
    let (x_remain_ixs, x_concat_ixs) = x_ixs.split_at(x_dim - concat_dim);
    let (y_concat_ixs, y_remain_ixs) = y_ixs.split_at(concat_dim);

    if x_concat_ixs != y_concat_ixs {
        return Err(ShapeError::from_kind(IncompatibleShape).into());
    }
    let z_ixs = [x_remain_ixs, y_remain_ixs].concat();

    let x_remain_full_ix: Ix = x_remain_ixs.iter().product();
    let y_remain_full_ix: Ix = y_remain_ixs.iter().product();
    let concat_full_ix: Ix = x_concat_ixs.iter().product();

    // both sides flatten column-major, so the product unflattens the same way
    let x_mat = x.to_shape(((x_remain_full_ix, concat_full_ix), Order::ColumnMajor))?;
    let y_mat = y.to_shape(((concat_full_ix, y_remain_full_ix), Order::ColumnMajor))?;

    let z_mat = x_mat.dot(&y_mat);
    let z = z_mat
        .to_shape((IxDyn(&z_ixs), Order::ColumnMajor))?
        .into_owned();
    Ok(z)
}

/// Sums the axes whose labels are missing from `out`, then orders the rest as `out`.
pub fn reduce<E: LinalgScalar>(
    x: ArrayViewD<'_, E>,
    input: &[Label],
    out: &[Label],
) -> Result<ArrayD<E>> {
    if input.len() != x.ndim() {
        return Err(TenalgError::InvalidInput);
    }
    let mut labels = input.to_vec();
    let mut data: CowArray<E, IxDyn> = x.into();
    // from the back, so earlier axis numbers stay valid
    for ax in (0..input.len()).rev() {
        if !out.contains(&input[ax]) {
            data = data.sum_axis(Axis(ax)).into();
            labels.remove(ax);
        }
    }
    let perm = positions(&labels, out)?;
    if perm.len() != labels.len() {
        return Err(TenalgError::InvalidInput);
    }
    Ok(data.permuted_axes(perm).into_owned())
}

/// Pairwise contraction through a single matrix product.
///
/// Labels private to one side are summed first. Batch labels (shared and kept) cannot be expressed as one product, so such specs go through `contract_loop`.
pub fn contract_dot<E: LinalgScalar>(
    x: ArrayViewD<'_, E>,
    y: ArrayViewD<'_, E>,
    spec: &PairSpec,
) -> Result<ArrayD<E>> {
    label_sizes(&[(spec.lhs.as_slice(), x.shape()), (spec.rhs.as_slice(), y.shape())])?;
    if spec
        .lhs
        .iter()
        .any(|l| spec.rhs.contains(l) && spec.out.contains(l))
    {
        return contract_loop(x, y, spec);
    }

    let (x, lhs) = drop_private(x, &spec.lhs, &spec.rhs, &spec.out)?;
    let (y, rhs) = drop_private(y, &spec.rhs, &spec.lhs, &spec.out)?;

    let contracted: Vec<Label> = lhs.iter().filter(|l| rhs.contains(l)).copied().collect();
    let lhs_free: Vec<Label> = lhs.iter().filter(|l| !contracted.contains(l)).copied().collect();
    let rhs_free: Vec<Label> = rhs.iter().filter(|l| !contracted.contains(l)).copied().collect();

    let lhs_perm = positions(&lhs, &[lhs_free.as_slice(), contracted.as_slice()].concat())?;
    let rhs_perm = positions(&rhs, &[contracted.as_slice(), rhs_free.as_slice()].concat())?;

    let x_rot = x.permuted_axes(lhs_perm);
    let y_rot = y.permuted_axes(rhs_perm);
    let z = mul(&x_rot, &y_rot, contracted.len())?;

    let z_labels = [lhs_free, rhs_free].concat();
    let out_perm = positions(&z_labels, &spec.out)?;
    if out_perm.len() != z_labels.len() {
        return Err(TenalgError::InvalidInput);
    }
    Ok(z.permuted_axes(out_perm))
}

/// Pairwise contraction by explicit loops over every label.
pub fn contract_loop<E: LinalgScalar>(
    x: ArrayViewD<'_, E>,
    y: ArrayViewD<'_, E>,
    spec: &PairSpec,
) -> Result<ArrayD<E>> {
    let all = label_sizes(&[(spec.lhs.as_slice(), x.shape()), (spec.rhs.as_slice(), y.shape())])?;
    let labels: Vec<Label> = all.iter().map(|(l, _)| *l).collect();
    let shape: Vec<usize> = all.iter().map(|(_, n)| *n).collect();

    let lpos = positions(&labels, &spec.lhs)?;
    let rpos = positions(&labels, &spec.rhs)?;
    let opos = positions(&labels, &spec.out)?;
    let out_shape: Vec<usize> = opos.iter().map(|&p| shape[p]).collect();

    let mut z = ArrayD::<E>::zeros(out_shape);
    let mut li = vec![0; lpos.len()];
    let mut ri = vec![0; rpos.len()];
    let mut oi = vec![0; opos.len()];
    for idx in indices(shape) {
        gather(&mut li, &lpos, &idx);
        gather(&mut ri, &rpos, &idx);
        gather(&mut oi, &opos, &idx);
        let v = x[li.as_slice()] * y[ri.as_slice()];
        let e = &mut z[oi.as_slice()];
        *e = *e + v;
    }
    Ok(z)
}

fn gather(dst: &mut [usize], pos: &[usize], idx: &IxDyn) {
    for (d, &p) in dst.iter_mut().zip(pos) {
        *d = idx[p];
    }
}

fn drop_private<'a, E: LinalgScalar>(
    x: ArrayViewD<'a, E>,
    labels: &[Label],
    other: &[Label],
    out: &[Label],
) -> Result<(CowArray<'a, E, IxDyn>, Vec<Label>)> {
    let kept: Vec<Label> = labels
        .iter()
        .filter(|l| other.contains(l) || out.contains(l))
        .copied()
        .collect();
    if kept.len() == labels.len() {
        Ok((x.into(), labels.to_vec()))
    } else {
        Ok((reduce(x, labels, &kept)?.into(), kept))
    }
}

/// Union of labels in first-occurrence order, with their sizes.
fn label_sizes(terms: &[(&[Label], &[usize])]) -> Result<Vec<(Label, usize)>> {
    let mut all: Vec<(Label, usize)> = Vec::new();
    for (labels, shape) in terms {
        if labels.len() != shape.len() {
            return Err(TenalgError::InvalidInput);
        }
        for (&l, &n) in labels.iter().zip(shape.iter()) {
            match all.iter().find(|(m, _)| *m == l) {
                Some((_, size)) if *size != n => return Err(TenalgError::InvalidInput),
                Some(_) => {}
                None => all.push((l, n)),
            }
        }
    }
    Ok(all)
}

fn positions(labels: &[Label], of: &[Label]) -> Result<Vec<usize>> {
    of.iter()
        .map(|&l| {
            labels
                .iter()
                .position(|&m| m == l)
                .ok_or(TenalgError::UnknownLabel(l))
        })
        .collect()
}
