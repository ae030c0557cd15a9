use ark_ec::pairing::{MillerLoopOutput, Pairing};
use ark_ec::CurveGroup;

use crate::curves::PairingCurve;

use super::{FunctionTable, Memory, Trap};

pub(crate) fn register<C: PairingCurve>(table: &mut FunctionTable) {
    table.register("", "prepareG1", 2, prepare_g1::<C>);
    table.register("", "prepareG2", 2, prepare_g2::<C>);
    table.register("", "millerLoop", 3, miller_loop::<C>);
    table.register("", "finalExponentiation", 2, final_exponentiation::<C>);
    table.register("", "pairing", 3, pairing::<C>);
}

/// `prepareG1(p, r)`: writes the normalized affine form of a Jacobian point.
fn prepare_g1<C: PairingCurve>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let p = m.jacobian::<C::G1>(args[0])?;
    m.set_affine(args[1], &p.into_affine())?;
    Ok(0)
}

fn prepare_g2<C: PairingCurve>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let p = m.jacobian::<C::G2>(args[0])?;
    m.set_affine(args[1], &p.into_affine())?;
    Ok(0)
}

/// `millerLoop(pG1, pG2, r)` over prepared points.
fn miller_loop<C: PairingCurve>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a = m.affine::<C::G1>(args[0])?;
    let b = m.affine::<C::G2>(args[1])?;
    let f = C::Engine::miller_loop(a, b);
    m.set_field(args[2], &f.0)?;
    Ok(0)
}

fn final_exponentiation<C: PairingCurve>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let f: C::Fq12 = m.field(args[0])?;
    let out = C::Engine::final_exponentiation(MillerLoopOutput(f)).ok_or(Trap::NotInvertible)?;
    m.set_field(args[1], &out.0)?;
    Ok(0)
}

/// `pairing(p1, p2, r)` over Jacobian points.
fn pairing<C: PairingCurve>(m: &mut Memory<'_>, args: &[u32]) -> Result<u32, Trap> {
    let a = m.jacobian::<C::G1>(args[0])?.into_affine();
    let b = m.jacobian::<C::G2>(args[1])?.into_affine();
    let out = C::Engine::pairing(a, b);
    m.set_field(args[2], &out.0)?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::super::raw::{self, KernelField};
    use super::super::{Kernel, KernelImage};
    use crate::curves::Bn128;
    use ark_bn254::{Bn254, Fq12, G1Projective, G2Projective};
    use ark_ec::pairing::Pairing;
    use ark_ec::Group;

    #[test]
    fn pairing_is_loop_then_exponentiation() {
        let image = KernelImage::<Bn128>::new();
        let g1 = G1Projective::generator();
        let g2 = G2Projective::generator();

        // g1: 0..96, g2: 96..288, prepared: 288..352, 352..480, f: 480.., e: ..
        let n12 = Fq12::N8;
        let mut memory = vec![0u8; 480 + 2 * n12 + n12];
        raw::write_jacobian(&g1, &mut memory[..96]);
        raw::write_jacobian(&g2, &mut memory[96..288]);

        image.invoke(&mut memory, "prepareG1", &[0, 288]).unwrap();
        image.invoke(&mut memory, "prepareG2", &[96, 352]).unwrap();
        image
            .invoke(&mut memory, "millerLoop", &[288, 352, 480])
            .unwrap();
        let e = (480 + n12) as u32;
        image
            .invoke(&mut memory, "finalExponentiation", &[480, e])
            .unwrap();
        let direct = (480 + 2 * n12) as u32;
        image.invoke(&mut memory, "pairing", &[0, 96, direct]).unwrap();

        let expected = Bn254::pairing(g1, g2).0;
        assert_eq!(Fq12::read_raw(&memory[e as usize..]), expected);
        assert_eq!(Fq12::read_raw(&memory[direct as usize..]), expected);
    }
}
