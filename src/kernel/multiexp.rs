use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ff::Zero;
use bitvec::prelude::*;

use super::raw::{self, KernelField};
use super::{count, FunctionTable, Memory, Trap};

pub(crate) fn register<P: SWCurveConfig>(table: &mut FunctionTable, prefix: &str)
where
    P::BaseField: KernelField,
{
    table.register(prefix, "multiexp_chunk", 7, multiexp_chunk::<P>);
    table.register(prefix, "multiexpAffine_chunk", 7, multiexp_affine_chunk::<P>);
}

/// Largest supported window, in bits.
const MAX_CHUNK_BITS: u32 = 24;

trait Base<P: SWCurveConfig> {
    fn width() -> usize;
    fn add_to(bytes: &[u8], acc: &mut Projective<P>);
}

struct JacobianBase;
struct AffineBase;

impl<P: SWCurveConfig> Base<P> for JacobianBase
where
    P::BaseField: KernelField,
{
    fn width() -> usize {
        3 * <P::BaseField as KernelField>::N8
    }
    fn add_to(bytes: &[u8], acc: &mut Projective<P>) {
        *acc += raw::read_jacobian::<P>(bytes);
    }
}

impl<P: SWCurveConfig> Base<P> for AffineBase
where
    P::BaseField: KernelField,
{
    fn width() -> usize {
        2 * <P::BaseField as KernelField>::N8
    }
    fn add_to(bytes: &[u8], acc: &mut Projective<P>) {
        let base: Affine<P> = raw::read_affine(bytes);
        *acc += base;
    }
}

/// `multiexp_chunk(bases, scalars, scalarSize, n, startBit, chunkBits, r)`
fn multiexp_chunk<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    bucket_window::<P, JacobianBase>(m, args)
}

fn multiexp_affine_chunk<P: SWCurveConfig>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    bucket_window::<P, AffineBase>(m, args)
}

/// Sums `digit_i * base_i` over one window of scalar bits.
fn bucket_window<P: SWCurveConfig, B: Base<P>>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap>
where
    P::BaseField: KernelField,
{
    let scalar_size = count(args, 2);
    let n = count(args, 3);
    let start = count(args, 4);
    let c = args[5];
    if c == 0 || c > MAX_CHUNK_BITS {
        return Err(Trap::InvalidArgument("window width out of range"));
    }

    let bases = m.slice(args[0], n * B::width())?;
    let scalars = m.slice(args[1], n * scalar_size)?;

    // Create space for the buckets
    let mut buckets = vec![Projective::<P>::zero(); (1 << c) - 1];

    // Sort the bases into buckets
    let scalar_bits = scalar_size * 8;
    let hi = scalar_bits.min(start + c as usize);
    if start < hi {
        for (base, scalar) in bases
            .chunks_exact(B::width())
            .zip(scalars.chunks_exact(scalar_size))
        {
            let digit = scalar.view_bits::<Lsb0>()[start..hi].load_le::<usize>();
            if digit != 0 {
                B::add_to(base, &mut buckets[digit - 1]);
            }
        }
    }

    // Summation by parts
    // e.g. 3a + 2b + 1c = a +
    //                    (a) + b +
    //                    ((a) + b) + c
    let mut acc = Projective::<P>::zero();
    let mut running_sum = Projective::<P>::zero();
    for exp in buckets.into_iter().rev() {
        running_sum += exp;
        acc += running_sum;
    }

    m.set_jacobian(args[6], &acc)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::super::{Kernel, KernelImage};
    use super::*;
    use crate::curves::Bn128;
    use ark_bn254::{g1::Config, G1Projective};
    use ark_ec::CurveGroup;
    use ark_ec::Group;
    use ark_ff::UniformRand;
    use rand_core::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn window_matches_digit_sum() {
        let image = KernelImage::<Bn128>::new();
        let mut rng = XorShiftRng::from_seed([
            0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06,
            0xbc, 0xe5,
        ]);
        let points: Vec<G1Projective> = (0..5).map(|_| G1Projective::rand(&mut rng)).collect();
        let affine = G1Projective::normalize_batch(&points);
        // two-byte scalars, window covering bits 4..9
        let scalars: [u16; 5] = [0x0000, 0x01f0, 0x0030, 0xffff, 0x0010];

        let mut memory = vec![0u8; 5 * 64 + 10 + 96];
        for (i, p) in affine.iter().enumerate() {
            raw::write_affine(p, &mut memory[i * 64..]);
        }
        for (i, s) in scalars.iter().enumerate() {
            memory[320 + 2 * i..322 + 2 * i].copy_from_slice(&s.to_le_bytes());
        }
        image
            .invoke(
                &mut memory,
                "g1m_multiexpAffine_chunk",
                &[0, 320, 2, 5, 4, 5, 330],
            )
            .unwrap();

        let mut expected = G1Projective::zero();
        for (p, s) in points.iter().zip(scalars.iter()) {
            let digit = (s >> 4) & 0x1f;
            expected += p.mul_bigint([digit as u64]);
        }
        assert_eq!(raw::read_jacobian::<Config>(&memory[330..]), expected);
    }

    #[test]
    fn window_past_scalar_is_zero() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 96 + 1 + 96];
        image.invoke(&mut memory, "g1m_one", &[0]).unwrap();
        memory[96] = 0xff;
        image
            .invoke(&mut memory, "g1m_multiexp_chunk", &[0, 96, 1, 1, 8, 4, 97])
            .unwrap();
        assert_eq!(image.invoke(&mut memory, "g1m_isZero", &[97]), Ok(1));
    }
}
