use ark_ff::{batch_inversion, FftField};

use super::raw::{le_bytes_to_limbs, KernelField};
use super::{count, FunctionTable, Memory, Trap};

pub(crate) fn register<F: KernelField>(table: &mut FunctionTable, prefix: &str) {
    table.register(prefix, "add", 3, add::<F>);
    table.register(prefix, "sub", 3, sub::<F>);
    table.register(prefix, "mul", 3, mul::<F>);
    table.register(prefix, "div", 3, div::<F>);
    table.register(prefix, "square", 2, square::<F>);
    table.register(prefix, "neg", 2, neg::<F>);
    table.register(prefix, "copy", 2, copy::<F>);
    table.register(prefix, "inverse", 2, inverse::<F>);
    table.register(prefix, "exp", 4, exp::<F>);
    table.register(prefix, "eq", 2, eq::<F>);
    table.register(prefix, "isZero", 1, is_zero::<F>);
    table.register(prefix, "isOne", 1, is_one::<F>);
    table.register(prefix, "isNegative", 1, is_negative::<F>);
    table.register(prefix, "isSquare", 1, is_square::<F>);
    table.register(prefix, "sqrt", 2, sqrt::<F>);
    table.register(prefix, "one", 1, one::<F>);
    table.register(prefix, "zero", 1, zero::<F>);
    table.register(prefix, "toMontgomery", 2, to_montgomery::<F>);
    table.register(prefix, "fromMontgomery", 2, from_montgomery::<F>);
    table.register(prefix, "batchToMontgomery", 3, batch_to_montgomery::<F>);
    table.register(prefix, "batchFromMontgomery", 3, batch_from_montgomery::<F>);
    table.register(prefix, "batchInverse", 3, batch_inverse::<F>);
}

/// Root-of-unity queries, only meaningful for the scalar field.
pub(crate) fn register_roots<F: KernelField + FftField>(table: &mut FunctionTable, prefix: &str) {
    table.register(prefix, "twoAdicity", 0, two_adicity::<F>);
    table.register(prefix, "rootOfUnity", 2, root_of_unity::<F>);
    table.register(prefix, "nqr", 1, nqr::<F>);
}

fn binary<F: KernelField>(m: &mut Memory<'_>, args: &[u32], op: fn(F, F) -> F) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    let b: F = m.field(args[1])?;
    m.set_field(args[2], &op(a, b))?;
    Ok(0)
}

fn unary<F: KernelField>(m: &mut Memory<'_>, args: &[u32], op: fn(F) -> F) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    m.set_field(args[1], &op(a))?;
    Ok(0)
}

fn test<F: KernelField>(m: &mut Memory<'_>, args: &[u32], op: fn(&F) -> bool) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    Ok(op(&a) as u32)
}

fn add<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    binary(m, args, |a: F, b| a + b)
}

fn sub<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    binary(m, args, |a: F, b| a - b)
}

fn mul<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    binary(m, args, |a: F, b| a * b)
}

fn div<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    let b: F = m.field(args[1])?;
    let b_inv = b.inverse().ok_or(Trap::NotInvertible)?;
    m.set_field(args[2], &(a * b_inv))?;
    Ok(0)
}

fn square<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    unary(m, args, |a: F| a.square())
}

fn neg<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    unary(m, args, |a: F| -a)
}

fn copy<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    unary(m, args, |a: F| a)
}

fn inverse<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    let inv = a.inverse().ok_or(Trap::NotInvertible)?;
    m.set_field(args[1], &inv)?;
    Ok(0)
}

/// `exp(a, e, eLen, r)`: the exponent is a plain little-endian integer of
/// `eLen` bytes.
fn exp<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    let e = le_bytes_to_limbs(m.slice(args[1], count(args, 2))?);
    m.set_field(args[3], &a.pow(e))?;
    Ok(0)
}

fn eq<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    let b: F = m.field(args[1])?;
    Ok((a == b) as u32)
}

fn is_zero<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    test(m, args, |a: &F| a.is_zero())
}

fn is_one<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    test(m, args, |a: &F| a.is_one())
}

fn is_negative<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    test(m, args, |a: &F| a.is_negative())
}

fn is_square<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    test(m, args, |a: &F| !a.legendre().is_qnr())
}

/// Writes a square root and returns `1`, or returns `0` and leaves the
/// destination untouched.
fn sqrt<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    match a.sqrt() {
        Some(root) => {
            m.set_field(args[1], &root)?;
            Ok(1)
        }
        None => Ok(0),
    }
}

fn one<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    m.set_field(args[0], &F::one())?;
    Ok(0)
}

fn zero<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    m.set_field(args[0], &F::zero())?;
    Ok(0)
}

fn to_montgomery<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a = F::read_plain(m.slice(args[0], F::N8)?).ok_or(Trap::NonCanonical)?;
    m.set_field(args[1], &a)?;
    Ok(0)
}

fn from_montgomery<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a: F = m.field(args[0])?;
    a.write_plain(m.slice_mut(args[1], F::N8)?);
    Ok(0)
}

fn batch_to_montgomery<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let n = count(args, 1);
    let values = m
        .slice(args[0], n * F::N8)?
        .chunks_exact(F::N8)
        .map(|c| F::read_plain(c).ok_or(Trap::NonCanonical))
        .collect::<Result<Vec<F>, Trap>>()?;
    m.set_fields(args[2], &values)?;
    Ok(0)
}

fn batch_from_montgomery<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let n = count(args, 1);
    let values: Vec<F> = m.fields(args[0], n)?;
    let out = m.slice_mut(args[2], n * F::N8)?;
    for (v, chunk) in values.iter().zip(out.chunks_exact_mut(F::N8)) {
        v.write_plain(chunk);
    }
    Ok(0)
}

/// Inverts `n` elements with one field inversion. Zero elements stay zero.
fn batch_inverse<F: KernelField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let n = count(args, 1);
    let mut values: Vec<F> = m.fields(args[0], n)?;
    batch_inversion(&mut values);
    m.set_fields(args[2], &values)?;
    Ok(0)
}

fn two_adicity<F: KernelField + FftField>(_: &mut Memory<'_>, _: &[u32]) -> Result<u32, Trap> {
    Ok(F::TWO_ADICITY)
}

/// `rootOfUnity(k, r)`: a primitive `2^k`-th root of unity.
fn root_of_unity<F: KernelField + FftField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let k = args[0];
    if k > F::TWO_ADICITY {
        return Err(Trap::InvalidArgument("root of unity order exceeds the two-adicity"));
    }
    let root = F::get_root_of_unity(1u64 << k)
        .ok_or(Trap::InvalidArgument("root of unity order exceeds the two-adicity"))?;
    m.set_field(args[1], &root)?;
    Ok(0)
}

/// A quadratic non-residue: the multiplicative generator.
fn nqr<F: KernelField + FftField>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    m.set_field(args[0], &F::GENERATOR)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::super::{Kernel, KernelImage};
    use super::*;
    use crate::curves::Bn128;
    use ark_bn254::{Fq, Fq12, Fr};
    use ark_ff::{Field, One, UniformRand, Zero};
    use rand_core::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn rng() -> XorShiftRng {
        XorShiftRng::from_seed([
            0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06,
            0xbc, 0xe5,
        ])
    }

    #[test]
    fn arithmetic_through_memory() {
        let image = KernelImage::<Bn128>::new();
        let mut rng = rng();
        let a = Fq12::rand(&mut rng);
        let b = Fq12::rand(&mut rng);

        let w = Fq12::N8 as u32;
        let mut memory = vec![0u8; 3 * Fq12::N8];
        a.write_raw(&mut memory[..Fq12::N8]);
        b.write_raw(&mut memory[Fq12::N8..2 * Fq12::N8]);

        image.invoke(&mut memory, "ftm_mul", &[0, w, 2 * w]).unwrap();
        assert_eq!(Fq12::read_raw(&memory[2 * Fq12::N8..]), a * b);

        image.invoke(&mut memory, "ftm_div", &[2 * w, w, 2 * w]).unwrap();
        assert_eq!(Fq12::read_raw(&memory[2 * Fq12::N8..]), a);

        assert_eq!(image.invoke(&mut memory, "ftm_eq", &[0, 2 * w]), Ok(1));
    }

    #[test]
    fn zero_has_no_inverse() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 64];
        assert_eq!(
            image.invoke(&mut memory, "frm_inverse", &[0, 32]),
            Err(Trap::NotInvertible)
        );
    }

    #[test]
    fn sqrt_reports_missing_root() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 64];

        let nqr = Fq::from(3u64);
        assert!(nqr.legendre().is_qnr());
        nqr.write_raw(&mut memory[..32]);
        assert_eq!(image.invoke(&mut memory, "f1m_sqrt", &[0, 32]), Ok(0));
        assert_eq!(image.invoke(&mut memory, "f1m_isSquare", &[0]), Ok(0));

        Fq::from(4u64).write_raw(&mut memory[..32]);
        assert_eq!(image.invoke(&mut memory, "f1m_sqrt", &[0, 32]), Ok(1));
        assert_eq!(Fq::read_raw(&memory[32..]).square(), Fq::from(4u64));
    }

    #[test]
    fn batch_inverse_skips_zero() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 6 * 32];
        Fr::from(2u64).write_raw(&mut memory[..32]);
        Fr::from(5u64).write_raw(&mut memory[64..96]);

        image
            .invoke(&mut memory, "frm_batchInverse", &[0, 3, 96])
            .unwrap();
        let out: Vec<Fr> = memory[96..].chunks(32).map(Fr::read_raw).collect();
        assert_eq!(out[0], Fr::from(2u64).inverse().unwrap());
        assert!(out[1].is_zero());
        assert_eq!(out[2], Fr::from(5u64).inverse().unwrap());
    }

    #[test]
    fn roots_of_unity() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 32];
        assert_eq!(image.invoke(&mut memory, "frm_twoAdicity", &[]), Ok(28));

        image
            .invoke(&mut memory, "frm_rootOfUnity", &[2, 0])
            .unwrap();
        let w = Fr::read_raw(&memory);
        assert_eq!(w.square(), -Fr::one());

        assert!(matches!(
            image.invoke(&mut memory, "frm_rootOfUnity", &[29, 0]),
            Err(Trap::InvalidArgument(_))
        ));
    }
}
