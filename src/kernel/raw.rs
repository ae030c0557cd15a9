//! Byte layouts of kernel values.
//!
//! Every field element lives in kernel memory as the little-endian limbs
//! of its internal (Montgomery) representation. Extension elements are
//! the concatenation of their coefficients, lowest degree first. Curve
//! points are the concatenation of their coordinates.

use std::marker::PhantomData;

use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};
use ark_ff::{
    BigInt, BigInteger, CubicExtConfig, CubicExtField, Field, Fp, FpConfig, PrimeField,
    QuadExtConfig, QuadExtField, Zero,
};
use byteorder::{ByteOrder, LittleEndian};

/// A field whose elements can be moved in and out of kernel memory.
pub trait KernelField: Field {
    /// Width of one element in bytes.
    const N8: usize;

    /// Writes the Montgomery-domain limbs into `out`.
    fn write_raw(&self, out: &mut [u8]);

    /// Reads an element from its Montgomery-domain limbs.
    fn read_raw(bytes: &[u8]) -> Self;

    /// Writes the plain (canonical) little-endian integer encoding.
    fn write_plain(&self, out: &mut [u8]);

    /// Reads a plain encoding, rejecting coefficients that are not
    /// reduced modulo the characteristic.
    fn read_plain(bytes: &[u8]) -> Option<Self>;

    /// Sign convention used by point compression: an element is negative
    /// when its most significant non-zero coefficient exceeds `(p - 1) / 2`.
    fn is_negative(&self) -> bool;
}

impl<P: FpConfig<N>, const N: usize> KernelField for Fp<P, N> {
    const N8: usize = N * 8;

    fn write_raw(&self, out: &mut [u8]) {
        write_limbs(&(self.0).0, out);
    }

    fn read_raw(bytes: &[u8]) -> Self {
        Fp(BigInt(read_limbs::<N>(bytes)), PhantomData)
    }

    fn write_plain(&self, out: &mut [u8]) {
        write_limbs(&self.into_bigint().0, out);
    }

    fn read_plain(bytes: &[u8]) -> Option<Self> {
        Self::from_bigint(BigInt(read_limbs::<N>(bytes)))
    }

    fn is_negative(&self) -> bool {
        self.into_bigint() > Self::MODULUS_MINUS_ONE_DIV_TWO
    }
}

impl<P: QuadExtConfig> KernelField for QuadExtField<P>
where
    P::BaseField: KernelField,
{
    const N8: usize = 2 * <P::BaseField as KernelField>::N8;

    fn write_raw(&self, out: &mut [u8]) {
        let (lo, hi) = out.split_at_mut(<P::BaseField as KernelField>::N8);
        self.c0.write_raw(lo);
        self.c1.write_raw(hi);
    }

    fn read_raw(bytes: &[u8]) -> Self {
        let (lo, hi) = bytes.split_at(<P::BaseField as KernelField>::N8);
        QuadExtField::new(P::BaseField::read_raw(lo), P::BaseField::read_raw(hi))
    }

    fn write_plain(&self, out: &mut [u8]) {
        let (lo, hi) = out.split_at_mut(<P::BaseField as KernelField>::N8);
        self.c0.write_plain(lo);
        self.c1.write_plain(hi);
    }

    fn read_plain(bytes: &[u8]) -> Option<Self> {
        let (lo, hi) = bytes.split_at(<P::BaseField as KernelField>::N8);
        Some(QuadExtField::new(
            P::BaseField::read_plain(lo)?,
            P::BaseField::read_plain(hi)?,
        ))
    }

    fn is_negative(&self) -> bool {
        if self.c1.is_zero() {
            self.c0.is_negative()
        } else {
            self.c1.is_negative()
        }
    }
}

impl<P: CubicExtConfig> KernelField for CubicExtField<P>
where
    P::BaseField: KernelField,
{
    const N8: usize = 3 * <P::BaseField as KernelField>::N8;

    fn write_raw(&self, out: &mut [u8]) {
        let n8 = <P::BaseField as KernelField>::N8;
        self.c0.write_raw(&mut out[..n8]);
        self.c1.write_raw(&mut out[n8..2 * n8]);
        self.c2.write_raw(&mut out[2 * n8..3 * n8]);
    }

    fn read_raw(bytes: &[u8]) -> Self {
        let n8 = <P::BaseField as KernelField>::N8;
        CubicExtField::new(
            P::BaseField::read_raw(&bytes[..n8]),
            P::BaseField::read_raw(&bytes[n8..2 * n8]),
            P::BaseField::read_raw(&bytes[2 * n8..3 * n8]),
        )
    }

    fn write_plain(&self, out: &mut [u8]) {
        let n8 = <P::BaseField as KernelField>::N8;
        self.c0.write_plain(&mut out[..n8]);
        self.c1.write_plain(&mut out[n8..2 * n8]);
        self.c2.write_plain(&mut out[2 * n8..3 * n8]);
    }

    fn read_plain(bytes: &[u8]) -> Option<Self> {
        let n8 = <P::BaseField as KernelField>::N8;
        Some(CubicExtField::new(
            P::BaseField::read_plain(&bytes[..n8])?,
            P::BaseField::read_plain(&bytes[n8..2 * n8])?,
            P::BaseField::read_plain(&bytes[2 * n8..3 * n8])?,
        ))
    }

    fn is_negative(&self) -> bool {
        if !self.c2.is_zero() {
            self.c2.is_negative()
        } else if !self.c1.is_zero() {
            self.c1.is_negative()
        } else {
            self.c0.is_negative()
        }
    }
}

fn write_limbs(limbs: &[u64], out: &mut [u8]) {
    for (limb, chunk) in limbs.iter().zip(out.chunks_exact_mut(8)) {
        LittleEndian::write_u64(chunk, *limb);
    }
}

fn read_limbs<const N: usize>(bytes: &[u8]) -> [u64; N] {
    let mut limbs = [0u64; N];
    for (limb, chunk) in limbs.iter_mut().zip(bytes.chunks_exact(8)) {
        *limb = LittleEndian::read_u64(chunk);
    }
    limbs
}

/// Converts an arbitrary-length little-endian byte string into `u64` limbs.
pub fn le_bytes_to_limbs(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            LittleEndian::read_u64(&buf)
        })
        .collect()
}

/// Little-endian bytes of a prime field modulus.
pub fn modulus_bytes<F: PrimeField>() -> Vec<u8> {
    F::MODULUS.to_bytes_le()
}

/// Reads an affine point; the all-zero encoding is the identity.
pub fn read_affine<P: SWCurveConfig>(bytes: &[u8]) -> Affine<P>
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    if bytes[..2 * n8].iter().all(|b| *b == 0) {
        return Affine::identity();
    }
    Affine::new_unchecked(
        P::BaseField::read_raw(&bytes[..n8]),
        P::BaseField::read_raw(&bytes[n8..2 * n8]),
    )
}

pub fn write_affine<P: SWCurveConfig>(p: &Affine<P>, out: &mut [u8])
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    if p.infinity {
        out[..2 * n8].iter_mut().for_each(|b| *b = 0);
        return;
    }
    p.x.write_raw(&mut out[..n8]);
    p.y.write_raw(&mut out[n8..2 * n8]);
}

/// Reads a Jacobian point; any encoding with `z = 0` is the identity.
pub fn read_jacobian<P: SWCurveConfig>(bytes: &[u8]) -> Projective<P>
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    Projective::new_unchecked(
        P::BaseField::read_raw(&bytes[..n8]),
        P::BaseField::read_raw(&bytes[n8..2 * n8]),
        P::BaseField::read_raw(&bytes[2 * n8..3 * n8]),
    )
}

pub fn write_jacobian<P: SWCurveConfig>(p: &Projective<P>, out: &mut [u8])
where
    P::BaseField: KernelField,
{
    let n8 = <P::BaseField as KernelField>::N8;
    p.x.write_raw(&mut out[..n8]);
    p.y.write_raw(&mut out[n8..2 * n8]);
    p.z.write_raw(&mut out[2 * n8..3 * n8]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fq, Fq2, Fr};
    use ark_ff::{One, UniformRand};
    use rand_core::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn raw_is_montgomery() {
        // The Montgomery form of one is R mod p, which is never the integer 1.
        let mut raw = [0u8; 32];
        Fr::one().write_raw(&mut raw);
        let mut plain = [0u8; 32];
        Fr::one().write_plain(&mut plain);

        assert_eq!(plain[0], 1);
        assert!(plain[1..].iter().all(|b| *b == 0));
        assert_ne!(raw, plain);
        assert_eq!(Fr::read_raw(&raw), Fr::one());
    }

    #[test]
    fn plain_rejects_modulus() {
        let modulus = modulus_bytes::<Fq>();
        assert!(Fq::read_plain(&modulus).is_none());
    }

    #[test]
    fn extension_layout() {
        let mut rng = XorShiftRng::from_seed([
            0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06,
            0xbc, 0xe5,
        ]);
        let a = Fq2::rand(&mut rng);
        let mut raw = vec![0u8; Fq2::N8];
        a.write_raw(&mut raw);

        let mut c0 = vec![0u8; Fq::N8];
        a.c0.write_raw(&mut c0);
        assert_eq!(&raw[..32], &c0[..]);
        assert_eq!(Fq2::read_raw(&raw), a);
    }

    #[test]
    fn sign_convention() {
        let two = Fq::from(2u64);
        assert!(!two.is_negative());
        assert!((-two).is_negative());
        assert!(Fq2::new(Fq::zero(), -two).is_negative());
        assert!(!Fq2::new(-two, two).is_negative());
    }
}
