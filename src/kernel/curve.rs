use ark_ec::short_weierstrass::{Projective, SWCurveConfig};
use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::{Field, Zero};

use super::raw::{le_bytes_to_limbs, KernelField};
use super::{count, FunctionTable, Memory, Trap};

pub(crate) fn register<P: SWCurveConfig>(table: &mut FunctionTable, prefix: &str)
where
    P::BaseField: KernelField,
{
    table.register(prefix, "add", 3, add::<P>);
    table.register(prefix, "addMixed", 3, add_mixed::<P>);
    table.register(prefix, "addAffine", 3, add_affine::<P>);
    table.register(prefix, "sub", 3, sub::<P>);
    table.register(prefix, "subMixed", 3, sub_mixed::<P>);
    table.register(prefix, "subAffine", 3, sub_affine::<P>);
    table.register(prefix, "double", 2, double::<P>);
    table.register(prefix, "doubleAffine", 2, double_affine::<P>);
    table.register(prefix, "neg", 2, neg::<P>);
    table.register(prefix, "negAffine", 2, neg_affine::<P>);
    table.register(prefix, "eq", 2, eq::<P>);
    table.register(prefix, "eqMixed", 2, eq_mixed::<P>);
    table.register(prefix, "eqAffine", 2, eq_affine::<P>);
    table.register(prefix, "isZero", 1, is_zero::<P>);
    table.register(prefix, "isZeroAffine", 1, is_zero_affine::<P>);
    table.register(prefix, "toAffine", 2, to_affine::<P>);
    table.register(prefix, "toJacobian", 2, to_jacobian::<P>);
    table.register(prefix, "batchToAffine", 3, batch_to_affine::<P>);
    table.register(prefix, "batchToJacobian", 3, batch_to_jacobian::<P>);
    table.register(prefix, "timesScalar", 4, times_scalar::<P>);
    table.register(prefix, "timesScalarAffine", 4, times_scalar_affine::<P>);
    table.register(prefix, "inCurve", 1, in_curve::<P>);
    table.register(prefix, "inCurveAffine", 1, in_curve_affine::<P>);
    table.register(prefix, "inGroupAffine", 1, in_group_affine::<P>);
    table.register(prefix, "zero", 1, zero::<P>);
    table.register(prefix, "one", 1, one::<P>);
    table.register(prefix, "rhs", 2, rhs::<P>);
}

fn add<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = m.jacobian::<P>(args[1])?;
    m.set_jacobian(args[2], &(a + b))?;
    Ok(0)
}

/// `addMixed(jacobian, affine, r)`.
fn add_mixed<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = m.affine::<P>(args[1])?;
    m.set_jacobian(args[2], &(a + b))?;
    Ok(0)
}

fn add_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = Projective::from(m.affine::<P>(args[0])?);
    let b = m.affine::<P>(args[1])?;
    m.set_jacobian(args[2], &(a + b))?;
    Ok(0)
}

fn sub<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = m.jacobian::<P>(args[1])?;
    m.set_jacobian(args[2], &(a - b))?;
    Ok(0)
}

fn sub_mixed<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = m.affine::<P>(args[1])?;
    m.set_jacobian(args[2], &(a - b))?;
    Ok(0)
}

fn sub_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = Projective::from(m.affine::<P>(args[0])?);
    let b = m.affine::<P>(args[1])?;
    m.set_jacobian(args[2], &(a - b))?;
    Ok(0)
}

fn double<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    m.set_jacobian(args[1], &a.double())?;
    Ok(0)
}

fn double_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = Projective::from(m.affine::<P>(args[0])?);
    m.set_jacobian(args[1], &a.double())?;
    Ok(0)
}

fn neg<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    m.set_jacobian(args[1], &-a)?;
    Ok(0)
}

fn neg_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.affine::<P>(args[0])?;
    m.set_affine(args[1], &-a)?;
    Ok(0)
}

fn eq<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = m.jacobian::<P>(args[1])?;
    Ok((a == b) as u32)
}

/// `eqMixed(jacobian, affine)`.
fn eq_mixed<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let b = Projective::from(m.affine::<P>(args[1])?);
    Ok((a == b) as u32)
}

fn eq_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.affine::<P>(args[0])?;
    let b = m.affine::<P>(args[1])?;
    Ok((a == b) as u32)
}

fn is_zero<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    Ok(m.jacobian::<P>(args[0])?.is_zero() as u32)
}

fn is_zero_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    Ok(m.affine::<P>(args[0])?.infinity as u32)
}

fn to_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    m.set_affine(args[1], &a.into_affine())?;
    Ok(0)
}

fn to_jacobian<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.affine::<P>(args[0])?;
    m.set_jacobian(args[1], &Projective::from(a))?;
    Ok(0)
}

/// Normalizes `n` Jacobian points with a single field inversion.
fn batch_to_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    let n = count(args, 1);
    let points = (0..n)
        .map(|i| m.jacobian::<P>(args[0] + (i * 3 * n8) as u32))
        .collect::<Result<Vec<_>, Trap>>()?;
    for (i, p) in Projective::normalize_batch(&points).iter().enumerate() {
        m.set_affine(args[2] + (i * 2 * n8) as u32, p)?;
    }
    Ok(0)
}

fn batch_to_jacobian<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    let n = count(args, 1);
    let points = (0..n)
        .map(|i| m.affine::<P>(args[0] + (i * 2 * n8) as u32))
        .collect::<Result<Vec<_>, Trap>>()?;
    for (i, p) in points.into_iter().enumerate() {
        m.set_jacobian(args[2] + (i * 3 * n8) as u32, &Projective::from(p))?;
    }
    Ok(0)
}

/// `timesScalar(p, e, eLen, r)`: the scalar is a plain little-endian
/// integer of `eLen` bytes and is not reduced.
fn times_scalar<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    let e = le_bytes_to_limbs(m.slice(args[1], count(args, 2))?);
    m.set_jacobian(args[3], &a.mul_bigint(e))?;
    Ok(0)
}

fn times_scalar_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.affine::<P>(args[0])?;
    let e = le_bytes_to_limbs(m.slice(args[1], count(args, 2))?);
    m.set_jacobian(args[3], &a.mul_bigint(e))?;
    Ok(0)
}

fn in_curve<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.jacobian::<P>(args[0])?;
    Ok(a.into_affine().is_on_curve() as u32)
}

fn in_curve_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    Ok(m.affine::<P>(args[0])?.is_on_curve() as u32)
}

/// On the curve and in the prime-order subgroup.
fn in_group_affine<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let a = m.affine::<P>(args[0])?;
    Ok((a.is_on_curve() && a.is_in_correct_subgroup_assuming_on_curve()) as u32)
}

fn zero<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    m.set_jacobian(args[0], &Projective::<P>::zero())?;
    Ok(0)
}

fn one<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    m.set_jacobian(args[0], &Projective::from(P::GENERATOR))?;
    Ok(0)
}

/// `rhs(x, r)`: the right-hand side `x^3 + a*x + b` of the curve equation.
fn rhs<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let x: P::BaseField = m.field(args[0])?;
    let y2 = x.square() * x + P::COEFF_A * x + P::COEFF_B;
    m.set_field(args[1], &y2)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::super::{Kernel, KernelImage};
    use super::*;
    use crate::curves::Bn128;
    use ark_bn254::{Fr, G1Affine, G1Projective};
    use ark_ff::{BigInteger, PrimeField, UniformRand};
    use rand_core::SeedableRng;
    use rand_xorshift::XorShiftRng;

    const W: u32 = 96;

    fn rng() -> XorShiftRng {
        XorShiftRng::from_seed([
            0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06,
            0xbc, 0xe5,
        ])
    }

    fn put(memory: &mut [u8], offset: u32, p: &G1Projective) {
        super::super::raw::write_jacobian(p, &mut memory[offset as usize..]);
    }

    fn get(memory: &[u8], offset: u32) -> G1Projective {
        super::super::raw::read_jacobian(&memory[offset as usize..])
    }

    #[test]
    fn mixed_and_affine_entry_points_agree() {
        let image = KernelImage::<Bn128>::new();
        let mut rng = rng();
        let a = G1Projective::rand(&mut rng);
        let b = G1Projective::rand(&mut rng);
        let expected = a + b;

        let mut memory = vec![0u8; 6 * W as usize];
        put(&mut memory, 0, &a);
        put(&mut memory, W, &b);
        image.invoke(&mut memory, "g1m_add", &[0, W, 2 * W]).unwrap();
        assert_eq!(get(&memory, 2 * W), expected);

        image.invoke(&mut memory, "g1m_toAffine", &[W, 3 * W]).unwrap();
        image
            .invoke(&mut memory, "g1m_addMixed", &[0, 3 * W, 4 * W])
            .unwrap();
        assert_eq!(get(&memory, 4 * W), expected);

        image.invoke(&mut memory, "g1m_toAffine", &[0, 5 * W]).unwrap();
        image
            .invoke(&mut memory, "g1m_addAffine", &[5 * W, 3 * W, 4 * W])
            .unwrap();
        assert_eq!(get(&memory, 4 * W), expected);
        assert_eq!(image.invoke(&mut memory, "g1m_eq", &[2 * W, 4 * W]), Ok(1));
    }

    #[test]
    fn order_annihilates_generator() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 2 * W as usize + 32];
        image.invoke(&mut memory, "g1m_one", &[0]).unwrap();
        memory[2 * W as usize..].copy_from_slice(&Fr::MODULUS.to_bytes_le());

        image
            .invoke(&mut memory, "g1m_timesScalar", &[0, 2 * W, 32, W])
            .unwrap();
        assert_eq!(image.invoke(&mut memory, "g1m_isZero", &[W]), Ok(1));
        assert_eq!(image.invoke(&mut memory, "g1m_isZero", &[0]), Ok(0));
    }

    #[test]
    fn curve_membership() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 128];
        super::super::raw::write_affine(&G1Affine::generator(), &mut memory);
        assert_eq!(image.invoke(&mut memory, "g1m_inCurveAffine", &[0]), Ok(1));
        assert_eq!(image.invoke(&mut memory, "g1m_inGroupAffine", &[0]), Ok(1));

        // (1, 3) is not on y^2 = x^3 + 3.
        let bogus = G1Affine::new_unchecked(1u64.into(), 3u64.into());
        super::super::raw::write_affine(&bogus, &mut memory);
        assert_eq!(image.invoke(&mut memory, "g1m_inCurveAffine", &[0]), Ok(0));

        image.invoke(&mut memory, "f1m_one", &[0]).unwrap();
        image.invoke(&mut memory, "g1m_rhs", &[0, 32]).unwrap();
        image.invoke(&mut memory, "f1m_fromMontgomery", &[32, 64]).unwrap();
        assert_eq!(memory[64], 4);
    }
}
