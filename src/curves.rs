//! Parameter tables for the supported pairing-friendly curves.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ark_ec::pairing::Pairing;
use ark_ec::short_weierstrass::{Affine, SWCurveConfig};
use ark_ec::CurveConfig;
use ark_ff::{FftField, PrimeField};

use crate::kernel::raw::{modulus_bytes, KernelField};
use crate::kernel::{Kernel, KernelImage};
use crate::Error;

/// A pairing-friendly curve together with its field tower.
pub trait PairingCurve: Send + Sync + Sized + 'static {
    const NAME: &'static str;

    type Fr: PrimeField + FftField + KernelField;
    type Fq: PrimeField + KernelField;
    type Fq2: KernelField;
    type Fq6: KernelField;
    type Fq12: KernelField;

    type G1: SWCurveConfig<BaseField = Self::Fq, ScalarField = Self::Fr>;
    type G2: SWCurveConfig<BaseField = Self::Fq2, ScalarField = Self::Fr>;

    type Engine: Pairing<
        ScalarField = Self::Fr,
        G1Affine = Affine<Self::G1>,
        G2Affine = Affine<Self::G2>,
        TargetField = Self::Fq12,
    >;
}

/// BN254, also known as alt_bn128.
#[derive(Clone, Copy, Debug)]
pub struct Bn128;

impl PairingCurve for Bn128 {
    const NAME: &'static str = "bn128";

    type Fr = ark_bn254::Fr;
    type Fq = ark_bn254::Fq;
    type Fq2 = ark_bn254::Fq2;
    type Fq6 = ark_bn254::Fq6;
    type Fq12 = ark_bn254::Fq12;

    type G1 = ark_bn254::g1::Config;
    type G2 = ark_bn254::g2::Config;

    type Engine = ark_bn254::Bn254;
}

#[derive(Clone, Copy, Debug)]
pub struct Bls12381;

impl PairingCurve for Bls12381 {
    const NAME: &'static str = "bls12381";

    type Fr = ark_bls12_381::Fr;
    type Fq = ark_bls12_381::Fq;
    type Fq2 = ark_bls12_381::Fq2;
    type Fq6 = ark_bls12_381::Fq6;
    type Fq12 = ark_bls12_381::Fq12;

    type G1 = ark_bls12_381::g1::Config;
    type G2 = ark_bls12_381::g2::Config;

    type Engine = ark_bls12_381::Bls12_381;
}

/// Names a supported curve at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CurveId {
    Bn128,
    Bls12381,
}

impl CurveId {
    pub fn name(&self) -> &'static str {
        match *self {
            CurveId::Bn128 => Bn128::NAME,
            CurveId::Bls12381 => Bls12381::NAME,
        }
    }

    /// Builds the kernel for this curve.
    pub fn kernel(&self) -> Arc<dyn Kernel> {
        match *self {
            CurveId::Bn128 => Arc::new(KernelImage::<Bn128>::new()),
            CurveId::Bls12381 => Arc::new(KernelImage::<Bls12381>::new()),
        }
    }
}

impl FromStr for CurveId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bn128" | "bn254" | "alt_bn128" => Ok(CurveId::Bn128),
            "bls12381" | "bls12-381" | "bls12_381" => Ok(CurveId::Bls12381),
            _ => Err(Error::Unsupported),
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.name())
    }
}

/// Constants the engine needs to size buffers and validate input.
/// Integers are little-endian byte strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveParams {
    pub name: &'static str,
    pub q: Vec<u8>,
    pub r: Vec<u8>,
    pub n8q: usize,
    pub n8r: usize,
    pub q_bits: u32,
    pub r_bits: u32,
    pub two_adicity: u32,
    pub cofactor_g1: Vec<u8>,
    pub cofactor_g2: Vec<u8>,
}

impl CurveParams {
    pub fn of<C: PairingCurve>() -> Self {
        CurveParams {
            name: C::NAME,
            q: modulus_bytes::<C::Fq>(),
            r: modulus_bytes::<C::Fr>(),
            n8q: <C::Fq as KernelField>::N8,
            n8r: <C::Fr as KernelField>::N8,
            q_bits: <C::Fq as PrimeField>::MODULUS_BIT_SIZE,
            r_bits: <C::Fr as PrimeField>::MODULUS_BIT_SIZE,
            two_adicity: <C::Fr as FftField>::TWO_ADICITY,
            cofactor_g1: limbs_to_bytes(<C::G1 as CurveConfig>::COFACTOR),
            cofactor_g2: limbs_to_bytes(<C::G2 as CurveConfig>::COFACTOR),
        }
    }
}

fn limbs_to_bytes(limbs: &[u64]) -> Vec<u8> {
    limbs.iter().flat_map(|l| l.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_names() {
        assert_eq!("bn254".parse::<CurveId>().unwrap(), CurveId::Bn128);
        assert_eq!("BLS12-381".parse::<CurveId>().unwrap(), CurveId::Bls12381);
        assert!(matches!("ed25519".parse::<CurveId>(), Err(Error::Unsupported)));
    }

    #[test]
    fn bn128_params() {
        let params = CurveParams::of::<Bn128>();
        assert_eq!(params.n8q, 32);
        assert_eq!(params.n8r, 32);
        assert_eq!(params.r_bits, 254);
        assert_eq!(params.two_adicity, 28);
        assert_eq!(params.cofactor_g1[0], 1);
        // r = 0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001
        assert_eq!(params.r[0], 0x01);
        assert_eq!(params.r[31], 0x30);
    }

    #[test]
    fn bls12381_params() {
        let params = CurveParams::of::<Bls12381>();
        assert_eq!(params.n8q, 48);
        assert_eq!(params.n8r, 32);
        assert_eq!(params.q_bits, 381);
        assert_eq!(params.two_adicity, 32);
    }
}
