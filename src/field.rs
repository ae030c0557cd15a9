//! Field façade.
//!
//! Elements are opaque byte buffers in the kernel's Montgomery form. Every
//! operation runs synchronously on the engine's own instance.

use rand_core::RngCore;
use subtle::ConstantTimeEq;

use crate::engine::{Engine, FieldKind};
use crate::kernel::Trap;
use crate::{Error, Result};

/// A field element in Montgomery form.
#[derive(Clone, Debug)]
pub struct Element(pub(crate) Vec<u8>);

impl Element {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        self.0.len() == other.0.len() && bool::from(self.0.ct_eq(&other.0))
    }
}

impl Eq for Element {}

impl AsRef<[u8]> for Element {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// One field of the tower.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    engine: &'a Engine,
    kind: FieldKind,
    n8: usize,
}

impl<'a> Field<'a> {
    pub(crate) fn new(engine: &'a Engine, kind: FieldKind) -> Field<'a> {
        Field {
            engine,
            kind,
            n8: engine.field_width(kind),
        }
    }

    /// Width of one element in bytes.
    pub fn n8(&self) -> usize {
        self.n8
    }

    fn func(&self, name: &str) -> String {
        format!("{}_{}", self.kind.prefix(), name)
    }

    /// The prime the coefficients are reduced by, little-endian, and its
    /// bit length.
    fn characteristic(&self) -> (&'a [u8], u32) {
        let params = self.engine.params();
        match self.kind {
            FieldKind::Fr => (&params.r, params.r_bits),
            _ => (&params.q, params.q_bits),
        }
    }

    fn check(&self, a: &[u8]) -> Result<()> {
        if a.len() != self.n8 {
            return Err(Error::InvalidLength {
                expected: self.n8,
                actual: a.len(),
            });
        }
        Ok(())
    }

    fn check_batch(&self, buf: &[u8]) -> Result<usize> {
        if buf.len() % self.n8 != 0 {
            return Err(Error::InvalidLength {
                expected: (buf.len() / self.n8 + 1) * self.n8,
                actual: buf.len(),
            });
        }
        Ok(buf.len() / self.n8)
    }

    fn unary(&self, name: &str, a: &Element) -> Result<Element> {
        self.check(&a.0)?;
        let (_, out) = self.engine.sync_call(&self.func(name), &[&a.0], self.n8)?;
        Ok(Element(out))
    }

    fn binary(&self, name: &str, a: &Element, b: &Element) -> Result<Element> {
        self.check(&a.0)?;
        self.check(&b.0)?;
        let (_, out) = self
            .engine
            .sync_call(&self.func(name), &[&a.0, &b.0], self.n8)?;
        Ok(Element(out))
    }

    fn test(&self, name: &str, a: &Element) -> Result<bool> {
        self.check(&a.0)?;
        let (ret, _) = self.engine.sync_call(&self.func(name), &[&a.0], 0)?;
        Ok(ret != 0)
    }

    pub fn zero(&self) -> Result<Element> {
        let (_, out) = self.engine.sync_call(&self.func("zero"), &[], self.n8)?;
        Ok(Element(out))
    }

    pub fn one(&self) -> Result<Element> {
        let (_, out) = self.engine.sync_call(&self.func("one"), &[], self.n8)?;
        Ok(Element(out))
    }

    /// Embeds a small integer.
    pub fn from_u64(&self, v: u64) -> Result<Element> {
        let mut plain = vec![0u8; self.n8];
        let len = plain.len().min(8);
        plain[..len].copy_from_slice(&v.to_le_bytes()[..len]);
        self.to_montgomery(&plain)
    }

    pub fn add(&self, a: &Element, b: &Element) -> Result<Element> {
        self.binary("add", a, b)
    }

    pub fn sub(&self, a: &Element, b: &Element) -> Result<Element> {
        self.binary("sub", a, b)
    }

    pub fn mul(&self, a: &Element, b: &Element) -> Result<Element> {
        self.binary("mul", a, b)
    }

    pub fn div(&self, a: &Element, b: &Element) -> Result<Element> {
        if self.is_zero(b)? {
            return Err(Error::DivisionByZero);
        }
        self.binary("div", a, b)
    }

    pub fn square(&self, a: &Element) -> Result<Element> {
        self.unary("square", a)
    }

    pub fn neg(&self, a: &Element) -> Result<Element> {
        self.unary("neg", a)
    }

    pub fn copy(&self, a: &Element) -> Result<Element> {
        self.unary("copy", a)
    }

    pub fn inv(&self, a: &Element) -> Result<Element> {
        if self.is_zero(a)? {
            return Err(Error::DivisionByZero);
        }
        self.unary("inverse", a)
    }

    /// Raises `a` to a plain little-endian exponent of any length.
    pub fn exp(&self, a: &Element, e: &[u8]) -> Result<Element> {
        self.check(&a.0)?;
        let mut op = self.engine.start_sync_op()?;
        let pa = op.alloc_set(&a.0)?;
        let pe = op.alloc_set(e)?;
        let pr = op.alloc(self.n8)?;
        op.invoke(&self.func("exp"), &[pa, pe, e.len() as u32, pr])?;
        Ok(Element(op.read(pr, self.n8)?))
    }

    pub fn eq(&self, a: &Element, b: &Element) -> Result<bool> {
        self.check(&a.0)?;
        self.check(&b.0)?;
        let (ret, _) = self.engine.sync_call(&self.func("eq"), &[&a.0, &b.0], 0)?;
        Ok(ret != 0)
    }

    pub fn is_zero(&self, a: &Element) -> Result<bool> {
        self.test("isZero", a)
    }

    pub fn is_one(&self, a: &Element) -> Result<bool> {
        self.test("isOne", a)
    }

    /// Whether the most significant non-zero coefficient exceeds `(p-1)/2`.
    pub fn is_negative(&self, a: &Element) -> Result<bool> {
        self.test("isNegative", a)
    }

    pub fn is_square(&self, a: &Element) -> Result<bool> {
        self.test("isSquare", a)
    }

    /// A square root of `a`, or `None` when `a` is not a square.
    pub fn sqrt(&self, a: &Element) -> Result<Option<Element>> {
        self.check(&a.0)?;
        let (found, out) = self.engine.sync_call(&self.func("sqrt"), &[&a.0], self.n8)?;
        Ok(if found != 0 { Some(Element(out)) } else { None })
    }

    /// Converts a plain little-endian encoding into an element. Coefficients
    /// must be reduced.
    pub fn to_montgomery(&self, plain: &[u8]) -> Result<Element> {
        self.check(plain)?;
        let (_, out) = self
            .engine
            .sync_call(&self.func("toMontgomery"), &[plain], self.n8)
            .map_err(non_canonical)?;
        Ok(Element(out))
    }

    pub fn from_montgomery(&self, a: &Element) -> Result<Vec<u8>> {
        self.check(&a.0)?;
        let (_, out) = self
            .engine
            .sync_call(&self.func("fromMontgomery"), &[&a.0], self.n8)?;
        Ok(out)
    }

    fn batch(&self, name: &str, buf: &[u8]) -> Result<Vec<u8>> {
        let n = self.check_batch(buf)?;
        let mut op = self.engine.start_sync_op()?;
        let pa = op.alloc_set(buf)?;
        let pr = op.alloc(buf.len())?;
        op.invoke(&self.func(name), &[pa, n as u32, pr])?;
        op.read(pr, buf.len())
    }

    /// Converts a flat buffer of plain elements in one kernel call.
    pub fn batch_to_montgomery(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.batch("batchToMontgomery", buf).map_err(non_canonical)
    }

    pub fn batch_from_montgomery(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.batch("batchFromMontgomery", buf)
    }

    /// Inverts a flat buffer of elements with a single inversion. Zero
    /// elements are left as zero.
    pub fn batch_inverse(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.batch("batchInverse", buf)
    }

    /// Samples a uniformly distributed element.
    ///
    /// Each coefficient is drawn by rejection: random bytes are masked to
    /// the bit length of the prime and retried until they are below it.
    pub fn random<R: RngCore>(&self, rng: &mut R) -> Result<Element> {
        let (modulus, bits) = self.characteristic();
        let width = modulus.len();
        let mut plain = vec![0u8; self.n8];
        for coeff in plain.chunks_exact_mut(width) {
            loop {
                rng.fill_bytes(coeff);
                mask_bits(coeff, bits);
                if less_than(coeff, modulus) {
                    break;
                }
            }
        }
        self.to_montgomery(&plain)
    }

    /// Plain little-endian encoding.
    pub fn to_rpr_le(&self, a: &Element) -> Result<Vec<u8>> {
        self.from_montgomery(a)
    }

    pub fn from_rpr_le(&self, bytes: &[u8]) -> Result<Element> {
        self.to_montgomery(bytes).map_err(invalid_length_is_encoding)
    }

    /// Plain big-endian encoding: the byte reversal of the little-endian
    /// one, so the highest coefficient comes first.
    pub fn to_rpr_be(&self, a: &Element) -> Result<Vec<u8>> {
        let mut out = self.from_montgomery(a)?;
        out.reverse();
        Ok(out)
    }

    pub fn from_rpr_be(&self, bytes: &[u8]) -> Result<Element> {
        let mut le = bytes.to_vec();
        le.reverse();
        self.from_rpr_le(&le)
    }

    /// Montgomery little-endian encoding.
    pub fn to_rpr_lem(&self, a: &Element) -> Result<Vec<u8>> {
        self.check(&a.0)?;
        Ok(a.0.clone())
    }

    pub fn from_rpr_lem(&self, bytes: &[u8]) -> Result<Element> {
        self.check(bytes).map_err(invalid_length_is_encoding)?;
        let (modulus, _) = self.characteristic();
        if !bytes
            .chunks_exact(modulus.len())
            .all(|c| less_than(c, modulus))
        {
            return Err(Error::InvalidEncoding);
        }
        Ok(Element(bytes.to_vec()))
    }

    /// Montgomery big-endian encoding.
    pub fn to_rpr_bem(&self, a: &Element) -> Result<Vec<u8>> {
        let mut out = self.to_rpr_lem(a)?;
        out.reverse();
        Ok(out)
    }

    pub fn from_rpr_bem(&self, bytes: &[u8]) -> Result<Element> {
        let mut le = bytes.to_vec();
        le.reverse();
        self.from_rpr_lem(&le)
    }

    /// Evaluates coefficients at the roots of unity. Only `Fr` supports
    /// transforms.
    pub fn fft(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let layout = self.layout()?;
        self.engine.fft(layout, buf, false, false)
    }

    pub fn ifft(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let layout = self.layout()?;
        self.engine.ifft(layout, buf, false, false)
    }

    /// Given the powers `1, t, t^2, ..` returns the Lagrange basis of the
    /// evaluation domain at `t`.
    pub fn lagrange_evaluations(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let layout = self.layout()?;
        self.engine.lagrange_evaluations(layout, buf, false, false)
    }

    fn layout(&self) -> Result<crate::domain::Layout> {
        if self.kind != FieldKind::Fr {
            return Err(Error::Unsupported);
        }
        Ok(crate::domain::Layout::scalar(self.n8))
    }
}

fn non_canonical(e: Error) -> Error {
    match e {
        Error::Kernel(Trap::NonCanonical) => Error::InvalidEncoding,
        e => e,
    }
}

fn invalid_length_is_encoding(e: Error) -> Error {
    match e {
        Error::InvalidLength { .. } => Error::InvalidEncoding,
        e => e,
    }
}

/// Clears every bit at or above `bits` of a little-endian integer.
fn mask_bits(bytes: &mut [u8], bits: u32) {
    let bits = bits as usize;
    for (i, b) in bytes.iter_mut().enumerate() {
        let lo = i * 8;
        if lo >= bits {
            *b = 0;
        } else if lo + 8 > bits {
            *b &= (1u8 << (bits - lo)) - 1;
        }
    }
}

/// Compares little-endian integers of equal length.
fn less_than(a: &[u8], b: &[u8]) -> bool {
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        if x != y {
            return x < y;
        }
    }
    false
}
