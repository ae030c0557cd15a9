use curve_engine::{CurveId, Element, Engine, EngineConfig, Error, Field};
use rand_core::SeedableRng;
use rand_xorshift::XorShiftRng;

fn rng() -> XorShiftRng {
    XorShiftRng::from_seed([
        0x59, 0x62, 0xbe, 0x5d, 0x76, 0x3d, 0x31, 0x8d, 0x17, 0xdb, 0x37, 0x32, 0x54, 0x06, 0xbc,
        0xe5,
    ])
}

fn engine(curve: CurveId) -> Engine {
    Engine::new(curve, EngineConfig::default().with_workers(2)).unwrap()
}

fn check_axioms(field: Field<'_>, rng: &mut XorShiftRng) {
    let zero = field.zero().unwrap();
    let one = field.one().unwrap();

    for _ in 0..10 {
        let a = field.random(rng).unwrap();
        let b = field.random(rng).unwrap();
        let c = field.random(rng).unwrap();

        assert_eq!(field.add(&a, &b).unwrap(), field.add(&b, &a).unwrap());
        assert_eq!(field.mul(&a, &b).unwrap(), field.mul(&b, &a).unwrap());
        assert_eq!(field.add(&a, &zero).unwrap(), a);
        assert_eq!(field.mul(&a, &one).unwrap(), a);

        // (a + b) * c == a * c + b * c
        let lhs = field.mul(&field.add(&a, &b).unwrap(), &c).unwrap();
        let rhs = field
            .add(&field.mul(&a, &c).unwrap(), &field.mul(&b, &c).unwrap())
            .unwrap();
        assert_eq!(lhs, rhs);

        assert!(field.is_zero(&field.sub(&a, &a).unwrap()).unwrap());
        assert!(field.is_zero(&field.add(&a, &field.neg(&a).unwrap()).unwrap()).unwrap());
        assert_eq!(field.square(&a).unwrap(), field.mul(&a, &a).unwrap());

        if !field.is_zero(&a).unwrap() {
            assert!(field.is_one(&field.mul(&a, &field.inv(&a).unwrap()).unwrap()).unwrap());
            assert_eq!(field.mul(&field.div(&b, &a).unwrap(), &a).unwrap(), b);
        }

        let plain = field.from_montgomery(&a).unwrap();
        assert_eq!(field.to_montgomery(&plain).unwrap(), a);
    }
}

#[test]
fn field_axioms_bn128() {
    let engine = engine(CurveId::Bn128);
    let mut rng = rng();
    for field in [engine.fr(), engine.f1(), engine.f2(), engine.f6(), engine.f12()] {
        check_axioms(field, &mut rng);
    }
}

#[test]
fn field_axioms_bls12381() {
    let engine = engine(CurveId::Bls12381);
    let mut rng = rng();
    for field in [engine.fr(), engine.f1(), engine.f2(), engine.f6(), engine.f12()] {
        check_axioms(field, &mut rng);
    }
}

#[test]
fn widths() {
    let engine = engine(CurveId::Bls12381);
    assert_eq!(engine.fr().n8(), 32);
    assert_eq!(engine.f1().n8(), 48);
    assert_eq!(engine.f2().n8(), 96);
    assert_eq!(engine.f6().n8(), 288);
    assert_eq!(engine.f12().n8(), 576);
}

#[test]
fn small_integers() {
    let engine = engine(CurveId::Bn128);
    let fr = engine.fr();
    let two = fr.from_u64(2).unwrap();
    let three = fr.from_u64(3).unwrap();
    assert_eq!(fr.mul(&two, &three).unwrap(), fr.from_u64(6).unwrap());
    assert_eq!(fr.exp(&two, &[10]).unwrap(), fr.from_u64(1024).unwrap());
    assert_eq!(fr.exp(&two, &[]).unwrap(), fr.one().unwrap());
    assert_eq!(fr.copy(&three).unwrap(), three);

    let mut expected = vec![0u8; 32];
    expected[0] = 6;
    assert_eq!(fr.to_rpr_le(&fr.from_u64(6).unwrap()).unwrap(), expected);
    expected.reverse();
    assert_eq!(fr.to_rpr_be(&fr.from_u64(6).unwrap()).unwrap(), expected);
}

#[test]
fn signs_and_roots() {
    let engine = engine(CurveId::Bn128);
    let fr = engine.fr();
    let one = fr.one().unwrap();
    assert!(!fr.is_negative(&one).unwrap());
    assert!(fr.is_negative(&fr.neg(&one).unwrap()).unwrap());

    let four = fr.from_u64(4).unwrap();
    assert!(fr.is_square(&four).unwrap());
    let root = fr.sqrt(&four).unwrap().unwrap();
    assert_eq!(fr.square(&root).unwrap(), four);

    let mut rng = rng();
    let mut found_non_square = false;
    for _ in 0..32 {
        let a = fr.random(&mut rng).unwrap();
        match fr.sqrt(&a).unwrap() {
            Some(r) => assert_eq!(fr.square(&r).unwrap(), a),
            None => {
                assert!(!fr.is_square(&a).unwrap());
                found_non_square = true;
            }
        }
    }
    assert!(found_non_square);
}

#[test]
fn extension_roots() {
    let engine = engine(CurveId::Bn128);
    let f2 = engine.f2();
    let mut rng = rng();
    for _ in 0..5 {
        let a = f2.random(&mut rng).unwrap();
        let sq = f2.square(&a).unwrap();
        let root = f2.sqrt(&sq).unwrap().unwrap();
        assert!(root == a || root == f2.neg(&a).unwrap());
    }
}

#[test]
fn division_by_zero() {
    let engine = engine(CurveId::Bn128);
    let fr = engine.fr();
    let zero = fr.zero().unwrap();
    let one = fr.one().unwrap();
    assert!(matches!(fr.inv(&zero), Err(Error::DivisionByZero)));
    assert!(matches!(fr.div(&one, &zero), Err(Error::DivisionByZero)));
}

#[test]
fn batches() {
    let engine = engine(CurveId::Bn128);
    let fr = engine.fr();
    let mut rng = rng();
    let elements: Vec<Element> = (0..9).map(|_| fr.random(&mut rng).unwrap()).collect();
    let mut buf: Vec<u8> = elements.iter().flat_map(|e| e.as_bytes().to_vec()).collect();
    // a zero in the middle stays zero
    buf[4 * 32..5 * 32].copy_from_slice(fr.zero().unwrap().as_bytes());

    let inverted = fr.batch_inverse(&buf).unwrap();
    for (i, chunk) in inverted.chunks(32).enumerate() {
        let x = fr.from_rpr_lem(&buf[i * 32..(i + 1) * 32]).unwrap();
        let y = fr.from_rpr_lem(chunk).unwrap();
        if i == 4 {
            assert!(fr.is_zero(&y).unwrap());
        } else {
            assert!(fr.is_one(&fr.mul(&x, &y).unwrap()).unwrap());
        }
    }

    let plain = fr.batch_from_montgomery(&buf).unwrap();
    assert_eq!(fr.batch_to_montgomery(&plain).unwrap(), buf);
    assert_eq!(&plain[..32], fr.from_montgomery(&elements[0]).unwrap().as_slice());

    assert!(matches!(
        fr.batch_inverse(&buf[..33]),
        Err(Error::InvalidLength { .. })
    ));
}

#[test]
fn wire_formats() {
    let engine = engine(CurveId::Bn128);
    let mut rng = rng();
    for field in [engine.fr(), engine.f1(), engine.f2()] {
        let a = field.random(&mut rng).unwrap();
        assert_eq!(field.from_rpr_le(&field.to_rpr_le(&a).unwrap()).unwrap(), a);
        assert_eq!(field.from_rpr_be(&field.to_rpr_be(&a).unwrap()).unwrap(), a);
        assert_eq!(field.from_rpr_lem(&field.to_rpr_lem(&a).unwrap()).unwrap(), a);
        assert_eq!(field.from_rpr_bem(&field.to_rpr_bem(&a).unwrap()).unwrap(), a);

        let mut be = field.to_rpr_be(&a).unwrap();
        be.reverse();
        assert_eq!(be, field.to_rpr_le(&a).unwrap());
    }
}

#[test]
fn rejects_unreduced_encodings() {
    let engine = engine(CurveId::Bn128);
    let fr = engine.fr();
    let r = engine.params().r.clone();
    assert!(matches!(fr.from_rpr_le(&r), Err(Error::InvalidEncoding)));
    assert!(matches!(fr.from_rpr_lem(&r), Err(Error::InvalidEncoding)));
    assert!(matches!(fr.from_rpr_le(&r[..31]), Err(Error::InvalidEncoding)));
    assert!(matches!(fr.to_montgomery(&r), Err(Error::InvalidEncoding)));
}
