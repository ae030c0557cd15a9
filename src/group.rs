//! Curve façade for `G1` and `G2`.
//!
//! A [`Point`] carries its coordinate system; operations dispatch to the
//! kernel function that matches the coordinates of their operands. Sums,
//! differences, doublings and multiples come back in Jacobian form.

use rand_core::RngCore;

use crate::domain::Layout;
use crate::engine::{CurveKind, Engine};
use crate::field::{Element, Field};
use crate::{Error, Result};

/// Coordinate system of a point or of a flat buffer of points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coordinates {
    /// `x‖y`, all zero for the identity.
    Affine,
    /// `x‖y‖z`, `z = 0` for the identity.
    Jacobian,
}

impl Coordinates {
    fn is_affine(self) -> bool {
        self == Coordinates::Affine
    }
}

/// A curve point in raw kernel encoding. Two points are equal when
/// [`Curve::eq`] says so; the bytes of equal Jacobian points can differ.
#[derive(Clone, Debug)]
pub enum Point {
    Affine(Vec<u8>),
    Jacobian(Vec<u8>),
}

impl Point {
    pub fn coordinates(&self) -> Coordinates {
        match self {
            Point::Affine(_) => Coordinates::Affine,
            Point::Jacobian(_) => Coordinates::Jacobian,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Point::Affine(b) | Point::Jacobian(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Point::Affine(b) | Point::Jacobian(b) => b,
        }
    }
}

const FLAG_GREATEST: u8 = 0x80;
const FLAG_INFINITY: u8 = 0x40;

/// One of the two groups of the pairing.
#[derive(Clone, Copy)]
pub struct Curve<'a> {
    engine: &'a Engine,
    kind: CurveKind,
    /// Width of one coordinate.
    n8: usize,
}

impl<'a> Curve<'a> {
    pub(crate) fn new(engine: &'a Engine, kind: CurveKind) -> Curve<'a> {
        Curve {
            engine,
            kind,
            n8: engine.field_width(kind.base()),
        }
    }

    /// The field the coordinates live in.
    pub fn base_field(&self) -> Field<'a> {
        Field::new(self.engine, self.kind.base())
    }

    /// Width of one coordinate in bytes.
    pub fn n8(&self) -> usize {
        self.n8
    }

    /// Width of one point in bytes.
    pub fn width(&self, coords: Coordinates) -> usize {
        match coords {
            Coordinates::Affine => 2 * self.n8,
            Coordinates::Jacobian => 3 * self.n8,
        }
    }

    fn func(&self, name: &str) -> String {
        format!("{}_{}", self.kind.prefix(), name)
    }

    fn call(&self, name: &str, inputs: &[&[u8]], out_len: usize) -> Result<(u32, Vec<u8>)> {
        self.engine.sync_call(&self.func(name), inputs, out_len)
    }

    fn check(&self, p: &Point) -> Result<()> {
        let expected = self.width(p.coordinates());
        if p.as_bytes().len() != expected {
            return Err(Error::InvalidLength {
                expected,
                actual: p.as_bytes().len(),
            });
        }
        Ok(())
    }

    fn jacobian(&self, name: &str, inputs: &[&[u8]]) -> Result<Point> {
        let (_, out) = self.call(name, inputs, 3 * self.n8)?;
        Ok(Point::Jacobian(out))
    }

    fn test(&self, name: &str, inputs: &[&[u8]]) -> Result<bool> {
        let (ret, _) = self.call(name, inputs, 0)?;
        Ok(ret != 0)
    }

    pub fn zero(&self) -> Result<Point> {
        self.jacobian("zero", &[])
    }

    /// The group generator.
    pub fn one(&self) -> Result<Point> {
        self.jacobian("one", &[])
    }

    pub fn add(&self, a: &Point, b: &Point) -> Result<Point> {
        self.check(a)?;
        self.check(b)?;
        match (a, b) {
            (Point::Jacobian(x), Point::Jacobian(y)) => self.jacobian("add", &[x, y]),
            (Point::Jacobian(x), Point::Affine(y)) => self.jacobian("addMixed", &[x, y]),
            (Point::Affine(x), Point::Jacobian(y)) => self.jacobian("addMixed", &[y, x]),
            (Point::Affine(x), Point::Affine(y)) => self.jacobian("addAffine", &[x, y]),
        }
    }

    pub fn sub(&self, a: &Point, b: &Point) -> Result<Point> {
        self.check(a)?;
        self.check(b)?;
        match (a, b) {
            (Point::Jacobian(x), Point::Jacobian(y)) => self.jacobian("sub", &[x, y]),
            (Point::Jacobian(x), Point::Affine(y)) => self.jacobian("subMixed", &[x, y]),
            (Point::Affine(x), Point::Jacobian(y)) => {
                let d = self.jacobian("subMixed", &[y, x])?;
                self.neg(&d)
            }
            (Point::Affine(x), Point::Affine(y)) => self.jacobian("subAffine", &[x, y]),
        }
    }

    pub fn double(&self, a: &Point) -> Result<Point> {
        self.check(a)?;
        match a {
            Point::Jacobian(x) => self.jacobian("double", &[x]),
            Point::Affine(x) => self.jacobian("doubleAffine", &[x]),
        }
    }

    /// Negation keeps the coordinate system.
    pub fn neg(&self, a: &Point) -> Result<Point> {
        self.check(a)?;
        match a {
            Point::Jacobian(x) => self.jacobian("neg", &[x]),
            Point::Affine(x) => {
                let (_, out) = self.call("negAffine", &[x], 2 * self.n8)?;
                Ok(Point::Affine(out))
            }
        }
    }

    pub fn eq(&self, a: &Point, b: &Point) -> Result<bool> {
        self.check(a)?;
        self.check(b)?;
        match (a, b) {
            (Point::Jacobian(x), Point::Jacobian(y)) => self.test("eq", &[x, y]),
            (Point::Jacobian(x), Point::Affine(y)) => self.test("eqMixed", &[x, y]),
            (Point::Affine(x), Point::Jacobian(y)) => self.test("eqMixed", &[y, x]),
            (Point::Affine(x), Point::Affine(y)) => self.test("eqAffine", &[x, y]),
        }
    }

    pub fn is_zero(&self, a: &Point) -> Result<bool> {
        self.check(a)?;
        match a {
            Point::Jacobian(x) => self.test("isZero", &[x]),
            Point::Affine(x) => self.test("isZeroAffine", &[x]),
        }
    }

    pub fn to_affine(&self, a: &Point) -> Result<Point> {
        self.check(a)?;
        match a {
            Point::Jacobian(x) => {
                let (_, out) = self.call("toAffine", &[x], 2 * self.n8)?;
                Ok(Point::Affine(out))
            }
            Point::Affine(_) => Ok(a.clone()),
        }
    }

    pub fn to_jacobian(&self, a: &Point) -> Result<Point> {
        self.check(a)?;
        match a {
            Point::Affine(x) => self.jacobian("toJacobian", &[x]),
            Point::Jacobian(_) => Ok(a.clone()),
        }
    }

    pub fn convert(&self, a: &Point, coords: Coordinates) -> Result<Point> {
        match coords {
            Coordinates::Affine => self.to_affine(a),
            Coordinates::Jacobian => self.to_jacobian(a),
        }
    }

    fn batch(&self, name: &str, buf: &[u8], from: Coordinates, to: Coordinates) -> Result<Vec<u8>> {
        let (w_from, w_to) = (self.width(from), self.width(to));
        if buf.len() % w_from != 0 {
            return Err(Error::InvalidLength {
                expected: (buf.len() / w_from + 1) * w_from,
                actual: buf.len(),
            });
        }
        let n = buf.len() / w_from;
        let mut op = self.engine.start_sync_op()?;
        let pa = op.alloc_set(buf)?;
        let pr = op.alloc(n * w_to)?;
        op.invoke(&self.func(name), &[pa, n as u32, pr])?;
        op.read(pr, n * w_to)
    }

    /// Normalizes a flat buffer of Jacobian points with one inversion.
    pub fn batch_to_affine(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.batch(
            "batchToAffine",
            buf,
            Coordinates::Jacobian,
            Coordinates::Affine,
        )
    }

    pub fn batch_to_jacobian(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.batch(
            "batchToJacobian",
            buf,
            Coordinates::Affine,
            Coordinates::Jacobian,
        )
    }

    /// Multiplies by a plain little-endian integer of any length.
    pub fn times_scalar(&self, a: &Point, e: &[u8]) -> Result<Point> {
        self.check(a)?;
        let name = match a {
            Point::Jacobian(_) => "timesScalar",
            Point::Affine(_) => "timesScalarAffine",
        };
        let mut op = self.engine.start_sync_op()?;
        let pa = op.alloc_set(a.as_bytes())?;
        let pe = op.alloc_set(e)?;
        let pr = op.alloc(3 * self.n8)?;
        op.invoke(&self.func(name), &[pa, pe, e.len() as u32, pr])?;
        Ok(Point::Jacobian(op.read(pr, 3 * self.n8)?))
    }

    /// Multiplies by an `Fr` element.
    pub fn times_fr(&self, a: &Point, e: &Element) -> Result<Point> {
        let plain = self.engine.fr().from_montgomery(e)?;
        self.times_scalar(a, &plain)
    }

    /// A uniformly distributed group element.
    pub fn random<R: RngCore>(&self, rng: &mut R) -> Result<Point> {
        let e = self.engine.fr().random(rng)?;
        self.times_fr(&self.one()?, &e)
    }

    pub fn is_on_curve(&self, a: &Point) -> Result<bool> {
        self.check(a)?;
        match a {
            Point::Jacobian(x) => self.test("inCurve", &[x]),
            Point::Affine(x) => self.test("inCurveAffine", &[x]),
        }
    }

    /// On the curve and in the subgroup of order `r`.
    pub fn is_in_group(&self, a: &Point) -> Result<bool> {
        let affine = self.to_affine(a)?;
        self.test("inGroupAffine", &[affine.as_bytes()])
    }

    fn coords_of(&self, affine: &Point) -> (Element, Element) {
        let (x, y) = affine.as_bytes().split_at(self.n8);
        (Element(x.to_vec()), Element(y.to_vec()))
    }

    fn from_coords(&self, x: Element, y: Element) -> Result<Point> {
        let mut bytes = x.into_bytes();
        bytes.extend_from_slice(y.as_bytes());
        let p = Point::Affine(bytes);
        if !self.test("inCurveAffine", &[p.as_bytes()])? {
            return Err(Error::InvalidEncoding);
        }
        Ok(p)
    }

    /// `x‖y` big-endian; the identity sets `0x40` in the first byte.
    pub fn to_rpr_uncompressed(&self, a: &Point) -> Result<Vec<u8>> {
        let affine = self.to_affine(a)?;
        if self.is_zero(&affine)? {
            let mut out = vec![0u8; 2 * self.n8];
            out[0] = FLAG_INFINITY;
            return Ok(out);
        }
        let base = self.base_field();
        let (x, y) = self.coords_of(&affine);
        let mut out = base.to_rpr_be(&x)?;
        out.extend_from_slice(&base.to_rpr_be(&y)?);
        Ok(out)
    }

    pub fn from_rpr_uncompressed(&self, bytes: &[u8]) -> Result<Point> {
        if bytes.len() != 2 * self.n8 {
            return Err(Error::InvalidEncoding);
        }
        if bytes[0] & FLAG_GREATEST != 0 {
            return Err(Error::InvalidEncoding);
        }
        if bytes[0] & FLAG_INFINITY != 0 {
            return self.identity_encoding(bytes);
        }
        let base = self.base_field();
        let (x, y) = bytes.split_at(self.n8);
        self.from_coords(base.from_rpr_be(x)?, base.from_rpr_be(y)?)
    }

    /// `x` big-endian; `0x80` in the first byte marks the larger of the
    /// two `y`, `0x40` marks the identity.
    pub fn to_rpr_compressed(&self, a: &Point) -> Result<Vec<u8>> {
        let affine = self.to_affine(a)?;
        if self.is_zero(&affine)? {
            let mut out = vec![0u8; self.n8];
            out[0] = FLAG_INFINITY;
            return Ok(out);
        }
        let base = self.base_field();
        let (x, y) = self.coords_of(&affine);
        let mut out = base.to_rpr_be(&x)?;
        if base.is_negative(&y)? {
            out[0] |= FLAG_GREATEST;
        }
        Ok(out)
    }

    pub fn from_rpr_compressed(&self, bytes: &[u8]) -> Result<Point> {
        if bytes.len() != self.n8 {
            return Err(Error::InvalidEncoding);
        }
        if bytes[0] & FLAG_INFINITY != 0 {
            if bytes[0] & FLAG_GREATEST != 0 {
                return Err(Error::InvalidEncoding);
            }
            return self.identity_encoding(bytes);
        }
        let greatest = bytes[0] & FLAG_GREATEST != 0;
        let mut be = bytes.to_vec();
        be[0] &= !FLAG_GREATEST;

        let base = self.base_field();
        let x = base.from_rpr_be(&be)?;
        let (_, y2) = self.call("rhs", &[x.as_bytes()], self.n8)?;
        let y = base
            .sqrt(&Element(y2))?
            .ok_or(Error::InvalidEncoding)?;
        let y = if base.is_negative(&y)? != greatest {
            base.neg(&y)?
        } else {
            y
        };
        self.from_coords(x, y)
    }

    fn identity_encoding(&self, bytes: &[u8]) -> Result<Point> {
        if bytes[0] & !FLAG_INFINITY != 0 || bytes[1..].iter().any(|b| *b != 0) {
            return Err(Error::InvalidEncoding);
        }
        Ok(Point::Affine(vec![0u8; 2 * self.n8]))
    }

    /// Raw Montgomery encoding, as exchanged with workers.
    pub fn to_rpr_lem(&self, a: &Point) -> Result<Vec<u8>> {
        self.check(a)?;
        Ok(a.as_bytes().to_vec())
    }

    /// Decodes a raw Montgomery encoding. Every coordinate must be reduced
    /// and the point must be on the curve.
    pub fn from_rpr_lem(&self, bytes: &[u8], coords: Coordinates) -> Result<Point> {
        if bytes.len() != self.width(coords) {
            return Err(Error::InvalidEncoding);
        }
        let base = self.base_field();
        for c in bytes.chunks(self.n8) {
            base.from_rpr_lem(c)?;
        }
        let p = match coords {
            Coordinates::Affine => Point::Affine(bytes.to_vec()),
            Coordinates::Jacobian => Point::Jacobian(bytes.to_vec()),
        };
        if !self.is_on_curve(&p)? {
            return Err(Error::InvalidEncoding);
        }
        Ok(p)
    }

    /// Flattens points into one buffer in the given coordinates.
    pub fn pack(&self, points: &[Point], coords: Coordinates) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(points.len() * self.width(coords));
        for p in points {
            out.extend_from_slice(self.convert(p, coords)?.as_bytes());
        }
        Ok(out)
    }

    pub fn unpack(&self, buf: &[u8], coords: Coordinates) -> Result<Vec<Point>> {
        let w = self.width(coords);
        if buf.len() % w != 0 {
            return Err(Error::InvalidLength {
                expected: (buf.len() / w + 1) * w,
                actual: buf.len(),
            });
        }
        Ok(buf
            .chunks(w)
            .map(|c| match coords {
                Coordinates::Affine => Point::Affine(c.to_vec()),
                Coordinates::Jacobian => Point::Jacobian(c.to_vec()),
            })
            .collect())
    }

    fn layout(&self) -> Layout {
        Layout::curve(self.kind, self.n8)
    }

    /// Transforms a flat buffer of `2^k` points.
    pub fn fft(&self, buf: &[u8], input: Coordinates, output: Coordinates) -> Result<Vec<u8>> {
        self.engine
            .fft(self.layout(), buf, input.is_affine(), output.is_affine())
    }

    pub fn ifft(&self, buf: &[u8], input: Coordinates, output: Coordinates) -> Result<Vec<u8>> {
        self.engine
            .ifft(self.layout(), buf, input.is_affine(), output.is_affine())
    }

    /// Given `[t^i]P` for `i < 2^k`, returns `[l_i(t)]P` for the Lagrange
    /// basis of the evaluation domain.
    pub fn lagrange_evaluations(
        &self,
        buf: &[u8],
        input: Coordinates,
        output: Coordinates,
    ) -> Result<Vec<u8>> {
        self.engine
            .lagrange_evaluations(self.layout(), buf, input.is_affine(), output.is_affine())
    }

    /// Computes `sum s_i * P_i`. `scalars` holds one plain little-endian
    /// integer per base, all of the same width.
    pub fn multi_exp(&self, bases: &[u8], coords: Coordinates, scalars: &[u8]) -> Result<Point> {
        self.engine
            .multi_exp(self.kind, self.width(coords), coords.is_affine(), bases, scalars)
    }
}
