use log::debug;

use crate::engine::CurveKind;
use crate::field::Element;
use crate::group::{Coordinates, Curve, Point};
use crate::kernel::Trap;
use crate::task::Task;
use crate::{Engine, Error, Result};

impl Engine {
    fn prepare(&self, kind: CurveKind, name: &str, p: &Point) -> Result<Point> {
        let curve = Curve::new(self, kind);
        let p = curve.to_jacobian(p)?;
        let (_, out) = self.sync_call(name, &[p.as_bytes()], 2 * curve.n8())?;
        Ok(Point::Affine(out))
    }

    /// The form of a `G1` point the Miller loop consumes.
    pub fn prepare_g1(&self, p: &Point) -> Result<Point> {
        self.prepare(CurveKind::G1, "prepareG1", p)
    }

    pub fn prepare_g2(&self, p: &Point) -> Result<Point> {
        self.prepare(CurveKind::G2, "prepareG2", p)
    }

    /// Runs the Miller loop on prepared points. The result still needs the
    /// final exponentiation.
    pub fn miller_loop(&self, p1: &Point, p2: &Point) -> Result<Element> {
        self.check_prepared(CurveKind::G1, p1)?;
        self.check_prepared(CurveKind::G2, p2)?;
        let n8 = self.f12().n8();
        let (_, out) = self.sync_call("millerLoop", &[p1.as_bytes(), p2.as_bytes()], n8)?;
        Ok(Element(out))
    }

    pub fn final_exponentiation(&self, f: &Element) -> Result<Element> {
        let n8 = self.f12().n8();
        if f.as_bytes().len() != n8 {
            return Err(Error::InvalidLength {
                expected: n8,
                actual: f.as_bytes().len(),
            });
        }
        let (_, out) = self
            .sync_call("finalExponentiation", &[f.as_bytes()], n8)
            .map_err(|e| match e {
                Error::Kernel(Trap::NotInvertible) => Error::DivisionByZero,
                e => e,
            })?;
        Ok(Element(out))
    }

    /// The reduced pairing `e(p1, p2)` as an element of `GT`.
    pub fn pairing(&self, p1: &Point, p2: &Point) -> Result<Element> {
        let p1 = self.g1().to_jacobian(p1)?;
        let p2 = self.g2().to_jacobian(p2)?;
        let n8 = self.f12().n8();
        let (_, out) = self.sync_call("pairing", &[p1.as_bytes(), p2.as_bytes()], n8)?;
        Ok(Element(out))
    }

    /// Whether `prod e(a_i, b_i) == 1`.
    pub fn pairing_eq(&self, pairs: &[(Point, Point)]) -> Result<bool> {
        self.pairing_eq_target(pairs, &self.gt().one()?)
    }

    /// Whether `prod e(a_i, b_i) == target` for a `GT` element `target`.
    ///
    /// Each pair is prepared and run through the Miller loop as its own
    /// task; the loop outputs are multiplied and exponentiated once.
    pub fn pairing_eq_target(&self, pairs: &[(Point, Point)], target: &Element) -> Result<bool> {
        let (g1, g2, gt) = (self.g1(), self.g2(), self.gt());
        if target.as_bytes().len() != gt.n8() {
            return Err(Error::InvalidLength {
                expected: gt.n8(),
                actual: target.as_bytes().len(),
            });
        }
        let mut tasks = Vec::with_capacity(pairs.len());
        for (a, b) in pairs {
            let a = g1.to_jacobian(a)?;
            let b = g2.to_jacobian(b)?;

            let mut task = Task::new();
            let pa = task.alloc_set(a.into_bytes());
            let qa = task.alloc(g1.width(Coordinates::Affine));
            let pb = task.alloc_set(b.into_bytes());
            let qb = task.alloc(g2.width(Coordinates::Affine));
            let f = task.alloc(gt.n8());
            task.call("prepareG1", &[pa, qa])
                .call("prepareG2", &[pb, qb])
                .call("millerLoop", &[qa, qb, f])
                .get(f, gt.n8());
            tasks.push(task);
        }

        debug!("pairing check over {} pairs", pairs.len());
        let mut acc = gt.one()?;
        for out in self.pool().compute_all(tasks)? {
            let f = out
                .into_iter()
                .next()
                .ok_or_else(|| Error::Task("miller loop task returned nothing".into()))?;
            acc = gt.mul(&acc, &Element(f))?;
        }
        let e = self.final_exponentiation(&acc)?;
        gt.eq(&e, target)
    }

    fn check_prepared(&self, kind: CurveKind, p: &Point) -> Result<()> {
        let curve = Curve::new(self, kind);
        match p {
            Point::Affine(b) if b.len() == curve.width(Coordinates::Affine) => Ok(()),
            Point::Affine(b) => Err(Error::InvalidLength {
                expected: curve.width(Coordinates::Affine),
                actual: b.len(),
            }),
            Point::Jacobian(_) => Err(Error::Unsupported),
        }
    }
}
