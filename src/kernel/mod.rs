//! The arithmetic kernel.
//!
//! A kernel is a fixed, versioned table of named functions operating on
//! byte offsets into a caller-owned linear memory. Functions never
//! allocate: every operand and every result lives at an offset the caller
//! passes in, with sizes implied by the element widths of the curve. The
//! only values a function returns directly are small integers (booleans
//! are `0`/`1`).
//!
//! [`KernelImage`] binds the table to the arkworks implementations of the
//! supported curves. Element layouts are described in [`raw`].
//!
//! | prefix | functions |
//! |--------|-----------|
//! | `frm`, `f1m`, `f2m`, `f6m`, `ftm` | `add sub mul div square neg copy inverse exp eq isZero isOne isNegative isSquare sqrt one zero toMontgomery fromMontgomery batchToMontgomery batchFromMontgomery batchInverse` |
//! | `frm` | `twoAdicity rootOfUnity nqr` and the FFT functions |
//! | `g1m`, `g2m` | `add addMixed addAffine sub subMixed subAffine double doubleAffine neg negAffine eq eqMixed eqAffine isZero isZeroAffine toAffine toJacobian batchToAffine batchToJacobian timesScalar timesScalarAffine inCurve inCurveAffine inGroupAffine zero one rhs multiexp_chunk multiexpAffine_chunk` and the FFT functions |
//! | `frm`, `g1m`, `g2m` | `fftMix fftJoin fftFinal fftJoinExt fftJoinExtInv fftJoinExtLagrange` |
//! | none | `prepareG1 prepareG2 millerLoop finalExponentiation pairing` |

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use ark_ec::short_weierstrass::{Affine, Projective, SWCurveConfig};

use crate::curves::{CurveParams, PairingCurve};

mod curve;
mod fft;
mod field;
mod multiexp;
mod pairing;
pub mod raw;

use self::raw::KernelField;

/// Version of the function contract implemented by [`KernelImage`].
pub const KERNEL_VERSION: u32 = 1;

/// A kernel function failed. Traps are never recoverable at the kernel
/// layer; the caller passed a buffer or argument the function cannot use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trap {
    UnknownFunction(String),
    Arity {
        func: String,
        expected: usize,
        actual: usize,
    },
    OutOfBounds {
        offset: u32,
        len: usize,
    },
    NotInvertible,
    NonCanonical,
    NotOnCurve,
    InvalidArgument(&'static str),
}

impl std::error::Error for Trap {}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Trap::UnknownFunction(ref func) => write!(f, "unknown kernel function `{}`", func),
            Trap::Arity {
                ref func,
                expected,
                actual,
            } => write!(
                f,
                "`{}` takes {} arguments but {} were supplied",
                func, expected, actual
            ),
            Trap::OutOfBounds { offset, len } => write!(
                f,
                "access of {} bytes at offset {} is outside kernel memory",
                len, offset
            ),
            Trap::NotInvertible => write!(f, "operand has no inverse"),
            Trap::NonCanonical => write!(f, "plain operand is not reduced"),
            Trap::NotOnCurve => write!(f, "point is not on the curve"),
            Trap::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
        }
    }
}

/// The call surface every worker instance binds to.
pub trait Kernel: Send + Sync {
    /// The function contract version this kernel implements.
    fn version(&self) -> u32;

    /// Parameters of the curve this kernel was built for.
    fn params(&self) -> &CurveParams;

    /// Calls `func` with `args` against `memory`.
    fn invoke(&self, memory: &mut [u8], func: &str, args: &[u32]) -> Result<u32, Trap>;
}

/// A view of kernel memory with typed accessors.
pub struct Memory<'a> {
    bytes: &'a mut [u8],
}

impl<'a> Memory<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Memory { bytes }
    }

    fn check(&self, offset: u32, len: usize) -> Result<std::ops::Range<usize>, Trap> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(Trap::OutOfBounds { offset, len }),
        }
    }

    pub fn slice(&self, offset: u32, len: usize) -> Result<&[u8], Trap> {
        let range = self.check(offset, len)?;
        Ok(&self.bytes[range])
    }

    pub fn slice_mut(&mut self, offset: u32, len: usize) -> Result<&mut [u8], Trap> {
        let range = self.check(offset, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn field<F: KernelField>(&self, offset: u32) -> Result<F, Trap> {
        Ok(F::read_raw(self.slice(offset, F::N8)?))
    }

    pub fn set_field<F: KernelField>(&mut self, offset: u32, value: &F) -> Result<(), Trap> {
        value.write_raw(self.slice_mut(offset, F::N8)?);
        Ok(())
    }

    pub fn fields<F: KernelField>(&self, offset: u32, n: usize) -> Result<Vec<F>, Trap> {
        let bytes = self.slice(offset, n * F::N8)?;
        Ok(bytes.chunks_exact(F::N8).map(F::read_raw).collect())
    }

    pub fn set_fields<F: KernelField>(&mut self, offset: u32, values: &[F]) -> Result<(), Trap> {
        let bytes = self.slice_mut(offset, values.len() * F::N8)?;
        for (v, out) in values.iter().zip(bytes.chunks_exact_mut(F::N8)) {
            v.write_raw(out);
        }
        Ok(())
    }

    pub fn affine<P: SWCurveConfig>(&self, offset: u32) -> Result<Affine<P>, Trap>
    where
        P::BaseField: KernelField,
    {
        let n8 = <P::BaseField as KernelField>::N8;
        Ok(raw::read_affine(self.slice(offset, 2 * n8)?))
    }

    pub fn set_affine<P: SWCurveConfig>(&mut self, offset: u32, p: &Affine<P>) -> Result<(), Trap>
    where
        P::BaseField: KernelField,
    {
        let n8 = <P::BaseField as KernelField>::N8;
        raw::write_affine(p, self.slice_mut(offset, 2 * n8)?);
        Ok(())
    }

    pub fn jacobian<P: SWCurveConfig>(&self, offset: u32) -> Result<Projective<P>, Trap>
    where
        P::BaseField: KernelField,
    {
        let n8 = <P::BaseField as KernelField>::N8;
        Ok(raw::read_jacobian(self.slice(offset, 3 * n8)?))
    }

    pub fn set_jacobian<P: SWCurveConfig>(
        &mut self,
        offset: u32,
        p: &Projective<P>,
    ) -> Result<(), Trap>
    where
        P::BaseField: KernelField,
    {
        let n8 = <P::BaseField as KernelField>::N8;
        raw::write_jacobian(p, self.slice_mut(offset, 3 * n8)?);
        Ok(())
    }
}

pub(crate) type Function = fn(&mut Memory<'_>, &[u32]) -> Result<u32, Trap>;

struct Entry {
    arity: usize,
    function: Function,
}

#[derive(Default)]
pub(crate) struct FunctionTable {
    entries: HashMap<String, Entry>,
}

impl FunctionTable {
    pub(crate) fn register(&mut self, prefix: &str, name: &str, arity: usize, function: Function) {
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}_{}", prefix, name)
        };
        self.entries.insert(key, Entry { arity, function });
    }

    fn call(&self, memory: &mut [u8], func: &str, args: &[u32]) -> Result<u32, Trap> {
        let entry = self
            .entries
            .get(func)
            .ok_or_else(|| Trap::UnknownFunction(func.to_string()))?;
        if entry.arity != args.len() {
            return Err(Trap::Arity {
                func: func.to_string(),
                expected: entry.arity,
                actual: args.len(),
            });
        }
        (entry.function)(&mut Memory::new(memory), args)
    }

    #[cfg(test)]
    fn contains(&self, func: &str) -> bool {
        self.entries.contains_key(func)
    }
}

/// The kernel for one pairing-friendly curve.
pub struct KernelImage<C: PairingCurve> {
    params: CurveParams,
    table: FunctionTable,
    _curve: PhantomData<fn() -> C>,
}

impl<C: PairingCurve> KernelImage<C> {
    pub fn new() -> Self {
        let mut table = FunctionTable::default();

        field::register::<C::Fr>(&mut table, "frm");
        field::register::<C::Fq>(&mut table, "f1m");
        field::register::<C::Fq2>(&mut table, "f2m");
        field::register::<C::Fq6>(&mut table, "f6m");
        field::register::<C::Fq12>(&mut table, "ftm");
        field::register_roots::<C::Fr>(&mut table, "frm");

        curve::register::<C::G1>(&mut table, "g1m");
        curve::register::<C::G2>(&mut table, "g2m");

        fft::register::<fft::Scalar<C::Fr>, C::Fr>(&mut table, "frm");
        fft::register::<fft::Point<C::G1>, C::Fr>(&mut table, "g1m");
        fft::register::<fft::Point<C::G2>, C::Fr>(&mut table, "g2m");

        multiexp::register::<C::G1>(&mut table, "g1m");
        multiexp::register::<C::G2>(&mut table, "g2m");

        pairing::register::<C>(&mut table);

        KernelImage {
            params: CurveParams::of::<C>(),
            table,
            _curve: PhantomData,
        }
    }
}

impl<C: PairingCurve> Default for KernelImage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PairingCurve> Kernel for KernelImage<C> {
    fn version(&self) -> u32 {
        KERNEL_VERSION
    }

    fn params(&self) -> &CurveParams {
        &self.params
    }

    fn invoke(&self, memory: &mut [u8], func: &str, args: &[u32]) -> Result<u32, Trap> {
        self.table.call(memory, func, args)
    }
}

/// Reads argument `i` as an element count.
fn count(args: &[u32], i: usize) -> usize {
    args[i] as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::Bn128;

    #[test]
    fn table_covers_every_prefix() {
        let image = KernelImage::<Bn128>::new();
        for prefix in &["frm", "f1m", "f2m", "f6m", "ftm"] {
            assert!(image.table.contains(&format!("{}_mul", prefix)));
        }
        for prefix in &["g1m", "g2m"] {
            assert!(image.table.contains(&format!("{}_multiexpAffine_chunk", prefix)));
            assert!(image.table.contains(&format!("{}_fftJoinExt", prefix)));
        }
        assert!(image.table.contains("millerLoop"));
    }

    #[test]
    fn traps_are_reported() {
        let image = KernelImage::<Bn128>::new();
        let mut memory = vec![0u8; 64];

        assert_eq!(
            image.invoke(&mut memory, "frm_nope", &[]),
            Err(Trap::UnknownFunction("frm_nope".into()))
        );
        assert!(matches!(
            image.invoke(&mut memory, "frm_add", &[0, 32]),
            Err(Trap::Arity { expected: 3, .. })
        ));
        assert_eq!(
            image.invoke(&mut memory, "frm_add", &[0, 32, 48]),
            Err(Trap::OutOfBounds { offset: 48, len: 32 })
        );
    }
}
