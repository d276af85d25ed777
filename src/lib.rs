#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

#![doc = include_str!("../Readme.md")]

use feanor_math::ring::*;
use feanor_math::primitive_int::StaticRing;

extern crate feanor_math;

const ZZi64: StaticRing<i64> = StaticRing::<i64>::RING;

///
/// Contains [`cyclotomic::CyclotomicGaloisGroup`], the Galois group `(Z/nZ)*` of the `n`-th
/// cyclotomic extension, whose elements we use to address ring automorphisms.
///
pub mod cyclotomic;

///
/// Contains [`number_ring::negacyclic::NegacyclicRing`], the ring `Z/tZ[X]/(X^N + 1)`
/// all transforms of this crate operate on.
///
pub mod number_ring;

///
/// Contains the trait [`slots::SlotRing`], which describes how a ring decomposes into
/// slots and which automorphisms move or twist them, together with the implementation
/// [`slots::pow2::Pow2SlotRing`] for power-of-two cyclotomic rings.
///
pub mod slots;

///
/// Contains the compiler that turns slot-wise linear transforms into sums of Galois
/// automorphisms, and the objects to evaluate them.
///
pub mod lintransform;

///
/// Contains the trait [`evaluator::HomomorphicEvaluator`], through which compiled
/// transforms are applied to ciphertexts of any scheme.
///
pub mod evaluator;

///
/// Euler's totient function.
///
/// It takes a list of all distinct prime factors of `n`, each with its multiplicity,
/// and returns `phi(n)`.
///
fn euler_phi(factorization: &[(i64, usize)]) -> i64 {
    ZZi64.prod(factorization.iter().map(|(p, e)| (p - 1) * ZZi64.pow(*p, e - 1)))
}

#[test]
fn test_euler_phi() {
    assert_eq!(64, euler_phi(&[(2, 7)]));
    assert_eq!(16 * 17, euler_phi(&[(17, 2)]));
    assert_eq!(4 * 16, euler_phi(&[(2, 3), (17, 1)]));
}
