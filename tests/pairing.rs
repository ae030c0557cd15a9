use curve_engine::{CurveId, Engine, EngineConfig, Error};
use rand_core::SeedableRng;
use rand_xorshift::XorShiftRng;

fn rng() -> XorShiftRng {
    XorShiftRng::from_seed([
        0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06, 0xbc,
        0xe5,
    ])
}

fn check_bilinearity(id: CurveId) {
    let engine = Engine::new(id, EngineConfig::default().with_workers(2)).unwrap();
    let (fr, g1, g2, gt) = (engine.fr(), engine.g1(), engine.g2(), engine.gt());
    let mut rng = rng();

    let p = g1.one().unwrap();
    let q = g2.one().unwrap();
    let a = fr.random(&mut rng).unwrap();
    let b = fr.random(&mut rng).unwrap();

    let e = engine.pairing(&p, &q).unwrap();
    assert!(!gt.is_one(&e).unwrap());

    let lhs = engine
        .pairing(&g1.times_fr(&p, &a).unwrap(), &g2.times_fr(&q, &b).unwrap())
        .unwrap();
    let rhs = engine
        .pairing(&g1.times_fr(&p, &fr.mul(&a, &b).unwrap()).unwrap(), &q)
        .unwrap();
    assert!(gt.eq(&lhs, &rhs).unwrap());

    // e(P, Q)^ab
    let ab = fr.from_montgomery(&fr.mul(&a, &b).unwrap()).unwrap();
    assert!(gt.eq(&gt.exp(&e, &ab).unwrap(), &lhs).unwrap());

    // the loop and the exponentiation compose to the pairing
    let f = engine
        .miller_loop(&engine.prepare_g1(&p).unwrap(), &engine.prepare_g2(&q).unwrap())
        .unwrap();
    assert!(gt.eq(&engine.final_exponentiation(&f).unwrap(), &e).unwrap());
}

#[test]
fn bilinearity_bn128() {
    check_bilinearity(CurveId::Bn128);
}

#[test]
fn bilinearity_bls12381() {
    check_bilinearity(CurveId::Bls12381);
}

#[test]
fn pairing_product_check() {
    let engine = Engine::new(CurveId::Bn128, EngineConfig::default().with_workers(3)).unwrap();
    let (fr, g1, g2) = (engine.fr(), engine.g1(), engine.g2());
    let mut rng = rng();

    let a = fr.random(&mut rng).unwrap();
    let b = fr.random(&mut rng).unwrap();
    let ab = fr.mul(&a, &b).unwrap();
    let p = g1.one().unwrap();
    let q = g2.one().unwrap();

    let pa = g1.times_fr(&p, &a).unwrap();
    let qb = g2.to_affine(&g2.times_fr(&q, &b).unwrap()).unwrap();
    let pab = g1.neg(&g1.times_fr(&p, &ab).unwrap()).unwrap();

    // e(aP, bQ) * e(-abP, Q) == 1
    assert!(engine
        .pairing_eq(&[(pa.clone(), qb.clone()), (pab.clone(), q.clone())])
        .unwrap());
    assert!(!engine
        .pairing_eq(&[(pa.clone(), qb.clone()), (pa, q.clone())])
        .unwrap());

    // identities pair to one
    assert!(engine
        .pairing_eq(&[(g1.zero().unwrap(), q), (pab, g2.zero().unwrap())])
        .unwrap());
    assert!(engine.pairing_eq(&[]).unwrap());
}

#[test]
fn pairing_product_against_a_target() {
    let engine = Engine::new(CurveId::Bls12381, EngineConfig::default().with_workers(2)).unwrap();
    let (fr, g1, g2, gt) = (engine.fr(), engine.g1(), engine.g2(), engine.gt());
    let mut rng = rng();

    let a = fr.random(&mut rng).unwrap();
    let p = g1.one().unwrap();
    let q = g2.one().unwrap();
    let pa = g1.times_fr(&p, &a).unwrap();
    let qa = g2.times_fr(&q, &a).unwrap();
    let target = engine.pairing(&p, &qa).unwrap();

    // e(aP, Q) * e(P, Q) == e(P, aQ) * e(P, Q)
    let e = engine.pairing(&p, &q).unwrap();
    let with_base = gt.mul(&target, &e).unwrap();
    assert!(engine
        .pairing_eq_target(&[(pa.clone(), q.clone())], &target)
        .unwrap());
    assert!(engine
        .pairing_eq_target(&[(pa.clone(), q.clone()), (p.clone(), q.clone())], &with_base)
        .unwrap());
    assert!(!engine.pairing_eq_target(&[(p, q.clone())], &target).unwrap());

    assert!(engine.pairing_eq_target(&[], &gt.one().unwrap()).unwrap());
    assert!(!engine.pairing_eq_target(&[], &target).unwrap());
    assert!(matches!(
        engine.pairing_eq_target(&[(pa, q)], &fr.one().unwrap()),
        Err(Error::InvalidLength { .. })
    ));
}

#[test]
fn miller_loop_needs_prepared_points() {
    let engine = Engine::new(CurveId::Bn128, EngineConfig::default().with_workers(1)).unwrap();
    let p = engine.g1().one().unwrap();
    let q = engine.prepare_g2(&engine.g2().one().unwrap()).unwrap();
    assert!(matches!(
        engine.miller_loop(&p, &q),
        Err(Error::Unsupported)
    ));
}
