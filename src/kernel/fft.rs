//! Butterfly passes of the distributed transform.
//!
//! The coordinator owns the permutation and the chunking; these functions
//! only ever see one or two chunks at a time. Curve points are handled in
//! Jacobian coordinates.

use ark_ec::short_weierstrass::{Projective, SWCurveConfig};
use ark_ff::{FftField, Field};

use super::raw::{self, KernelField};
use super::{count, FunctionTable, Memory, Trap};

pub(crate) fn register<G: Group<F>, F: KernelField + FftField>(
    table: &mut FunctionTable,
    prefix: &str,
) {
    table.register(prefix, "fftMix", 3, fft_mix::<G, F>);
    table.register(prefix, "fftJoin", 5, fft_join::<G, F>);
    table.register(prefix, "fftFinal", 3, fft_final::<G, F>);
    table.register(prefix, "fftJoinExt", 6, fft_join_ext::<G, F>);
    table.register(prefix, "fftJoinExtInv", 6, fft_join_ext_inv::<G, F>);
    table.register(prefix, "fftJoinExtLagrange", 6, fft_join_ext_lagrange::<G, F>);
}

pub(crate) trait Group<S>: Sized + Copy {
    fn width() -> usize;
    fn read(bytes: &[u8]) -> Self;
    fn write(&self, out: &mut [u8]);
    fn group_mul_assign(&mut self, by: &S);
    fn group_add_assign(&mut self, other: &Self);
    fn group_sub_assign(&mut self, other: &Self);
}

pub(crate) struct Point<P: SWCurveConfig>(pub Projective<P>);

impl<P: SWCurveConfig> Copy for Point<P> {}

impl<P: SWCurveConfig> Clone for Point<P> {
    fn clone(&self) -> Point<P> {
        *self
    }
}

impl<P: SWCurveConfig> Group<P::ScalarField> for Point<P>
where
    P::BaseField: KernelField,
{
    fn width() -> usize {
        3 * <P::BaseField as KernelField>::N8
    }
    fn read(bytes: &[u8]) -> Self {
        Point(raw::read_jacobian(bytes))
    }
    fn write(&self, out: &mut [u8]) {
        raw::write_jacobian(&self.0, out)
    }
    fn group_mul_assign(&mut self, by: &P::ScalarField) {
        self.0 *= by;
    }
    fn group_add_assign(&mut self, other: &Self) {
        self.0 += other.0;
    }
    fn group_sub_assign(&mut self, other: &Self) {
        self.0 -= other.0;
    }
}

pub(crate) struct Scalar<F: KernelField>(pub F);

impl<F: KernelField> Copy for Scalar<F> {}

impl<F: KernelField> Clone for Scalar<F> {
    fn clone(&self) -> Scalar<F> {
        *self
    }
}

impl<F: KernelField> Group<F> for Scalar<F> {
    fn width() -> usize {
        F::N8
    }
    fn read(bytes: &[u8]) -> Self {
        Scalar(F::read_raw(bytes))
    }
    fn write(&self, out: &mut [u8]) {
        self.0.write_raw(out)
    }
    fn group_mul_assign(&mut self, by: &F) {
        self.0 *= by;
    }
    fn group_add_assign(&mut self, other: &Self) {
        self.0 += other.0;
    }
    fn group_sub_assign(&mut self, other: &Self) {
        self.0 -= other.0;
    }
}

fn load<G: Group<F>, F>(m: &Memory<'_>, offset: u32, n: usize) -> Result<Vec<G>, Trap> {
    let w = G::width();
    Ok(m.slice(offset, n * w)?.chunks_exact(w).map(G::read).collect())
}

fn store<G: Group<F>, F>(m: &mut Memory<'_>, offset: u32, values: &[G]) -> Result<(), Trap> {
    let w = G::width();
    let out = m.slice_mut(offset, values.len() * w)?;
    for (v, chunk) in values.iter().zip(out.chunks_exact_mut(w)) {
        v.write(chunk);
    }
    Ok(())
}

fn log2(n: usize) -> Result<u32, Trap> {
    if !n.is_power_of_two() {
        return Err(Trap::InvalidArgument("transform length is not a power of two"));
    }
    Ok(n.trailing_zeros())
}

/// `fftMix(p, n, inverse)`: every butterfly level that fits inside one
/// chunk. The chunk must already be in bit-reversed order.
fn fft_mix<G: Group<F>, F: KernelField + FftField>(
    m: &mut Memory<'_>,
    args: &[u32],
) -> Result<u32, Trap> {
    let n = count(args, 1);
    let log_n = log2(n)?;
    let mut a = load::<G, F>(m, args[0], n)?;

    let mut omega = F::get_root_of_unity(n as u64)
        .ok_or(Trap::InvalidArgument("chunk exceeds the two-adicity"))?;
    if args[2] != 0 {
        omega = omega.inverse().ok_or(Trap::NotInvertible)?;
    }

    // precompute twiddle factors
    let twiddles: Vec<_> = (0..(n / 2))
        .scan(F::one(), |w, _| {
            let tw = *w;
            *w *= omega;
            Some(tw)
        })
        .collect();

    serial_fft::<F, G>(&mut a, n, log_n, &twiddles);
    store::<G, F>(m, args[0], &a)?;
    Ok(0)
}

#[allow(clippy::many_single_char_names)]
fn serial_fft<S, T: Group<S>>(a: &mut [T], n: usize, log_n: u32, twiddles: &[S]) {
    let mut chunk = 2_usize;
    let mut twiddle_chunk = n / 2;
    for _ in 0..log_n {
        a.chunks_mut(chunk).for_each(|coeffs| {
            let (left, right) = coeffs.split_at_mut(chunk / 2);

            // case when twiddle factor is one
            let (a, left) = left.split_at_mut(1);
            let (b, right) = right.split_at_mut(1);
            let t = b[0];
            b[0] = a[0];
            a[0].group_add_assign(&t);
            b[0].group_sub_assign(&t);

            left.iter_mut()
                .zip(right.iter_mut())
                .enumerate()
                .for_each(|(i, (a, b))| {
                    let mut t = *b;
                    t.group_mul_assign(&twiddles[(i + 1) * twiddle_chunk]);
                    *b = *a;
                    a.group_add_assign(&t);
                    b.group_sub_assign(&t);
                });
        });
        chunk *= 2;
        twiddle_chunk /= 2;
    }
}

struct Pair<G> {
    a: Vec<G>,
    b: Vec<G>,
}

/// Loads the arguments common to the join family:
/// `(p1, p2, n, pFirst, pInc, ..)`.
fn load_pair<G: Group<F>, F: KernelField>(
    m: &Memory<'_>,
    args: &[u32],
) -> Result<(Pair<G>, F, F), Trap> {
    let n = count(args, 2);
    let a = load::<G, F>(m, args[0], n)?;
    let b = load::<G, F>(m, args[1], n)?;
    let first: F = m.field(args[3])?;
    let inc: F = m.field(args[4])?;
    Ok((Pair { a, b }, first, inc))
}

fn store_pair<G: Group<F>, F>(m: &mut Memory<'_>, args: &[u32], pair: &Pair<G>) -> Result<(), Trap> {
    store::<G, F>(m, args[0], &pair.a)?;
    store::<G, F>(m, args[1], &pair.b)
}

/// `fftJoin(p1, p2, n, pFirst, pInc)`: one cross-chunk butterfly level with
/// twiddles `first * inc^i`.
fn fft_join<G: Group<F>, F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let (mut pair, first, inc) = load_pair::<G, F>(m, args)?;
    let mut d = first;
    for (a, b) in pair.a.iter_mut().zip(pair.b.iter_mut()) {
        let mut t = *b;
        t.group_mul_assign(&d);
        *b = *a;
        a.group_add_assign(&t);
        b.group_sub_assign(&t);
        d *= inc;
    }
    store_pair::<G, F>(m, args, &pair)?;
    Ok(0)
}

/// `fftFinal(p, n, pFactor)`: scales a chunk.
fn fft_final<G: Group<F>, F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let n = count(args, 1);
    let factor: F = m.field(args[2])?;
    let mut a = load::<G, F>(m, args[0], n)?;
    for v in a.iter_mut() {
        v.group_mul_assign(&factor);
    }
    store::<G, F>(m, args[0], &a)?;
    Ok(0)
}

/// `s = c^(2^(bits - 1))` where `c` is the coset shift.
fn shift_power<F: Field>(shift: F, total_bits: u32) -> F {
    let mut s = shift;
    for _ in 1..total_bits {
        s.square_in_place();
    }
    s
}

/// `fftJoinExt(p1, p2, n, pFirst, pInc, totalBits)`: splits the low and
/// high coefficient halves `u`, `v` into `u + v` and `c^i (u + s v)` so
/// that two half-size transforms evaluate on the subgroup and on its coset
/// `c * H`.
fn fft_join_ext<G: Group<F>, F: KernelField>(
    m: &mut Memory<'_>,
    args: &[u32],
) -> Result<u32, Trap> {
    let (mut pair, first, inc) = load_pair::<G, F>(m, args)?;
    let s = shift_power(inc, args[5]);
    let mut d = first;
    for (u, v) in pair.a.iter_mut().zip(pair.b.iter_mut()) {
        let mut sv = *v;
        sv.group_mul_assign(&s);
        let mut hi = *u;
        hi.group_add_assign(&sv);
        hi.group_mul_assign(&d);

        u.group_add_assign(v);
        *v = hi;
        d *= inc;
    }
    store_pair::<G, F>(m, args, &pair)?;
    Ok(0)
}

/// Inverse of [`fft_join_ext`], applied after the two half-size inverse
/// transforms. `pInc` is the inverse of the coset shift.
fn fft_join_ext_inv<G: Group<F>, F: KernelField>(
    m: &mut Memory<'_>,
    args: &[u32],
) -> Result<u32, Trap> {
    let (mut pair, first, inc) = load_pair::<G, F>(m, args)?;
    let (_, k) = coset_constants(inc, args[5])?;
    let mut d = first;
    for (u, v) in pair.a.iter_mut().zip(pair.b.iter_mut()) {
        v.group_mul_assign(&d);
        // v <- (v - u) / (s - 1), u <- u - v
        v.group_sub_assign(u);
        v.group_mul_assign(&k);
        u.group_sub_assign(v);
        d *= inc;
    }
    store_pair::<G, F>(m, args, &pair)?;
    Ok(0)
}

/// Transposed form of [`fft_join_ext_inv`], applied to the powers of a
/// point before two half-size inverse transforms to obtain the values of
/// the Lagrange basis of `H ∪ c * H` at that point.
fn fft_join_ext_lagrange<G: Group<F>, F: KernelField>(
    m: &mut Memory<'_>,
    args: &[u32],
) -> Result<u32, Trap> {
    let (mut pair, first, inc) = load_pair::<G, F>(m, args)?;
    let (_, k) = coset_constants(inc, args[5])?;
    let mut d = first;
    for (u, v) in pair.a.iter_mut().zip(pair.b.iter_mut()) {
        // w = (v - u) / (s - 1); u <- u - w; v <- w * d
        v.group_sub_assign(u);
        v.group_mul_assign(&k);
        u.group_sub_assign(v);
        v.group_mul_assign(&d);
        d *= inc;
    }
    store_pair::<G, F>(m, args, &pair)?;
    Ok(0)
}

/// Returns `s` and `1 / (s - 1)` for an inverse shift `inc`.
fn coset_constants<F: Field>(inc: F, total_bits: u32) -> Result<(F, F), Trap> {
    let shift = inc.inverse().ok_or(Trap::NotInvertible)?;
    let s = shift_power(shift, total_bits);
    let k = (s - F::one()).inverse().ok_or(Trap::NotInvertible)?;
    Ok((s, k))
}
