use std::fmt::Debug;

use feanor_math::ring::*;
use feanor_math::delegate;
use feanor_math::rings::extension::FreeAlgebra;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::rings::zn::*;
use feanor_math::algorithms::int_factor::factor;
use feanor_math::divisibility::DivisibilityRingStore;

use crate::{euler_phi, ZZi64};

///
/// The Galois group `(Z/nZ)*` of the `n`-th cyclotomic number field. An element `k` corresponds
/// to the automorphism `X -> X^k` of any quotient of `Z[X]/(Phi_n)`.
///
#[derive(Clone, Copy)]
pub struct CyclotomicGaloisGroup {
    ring: Zn,
    order: usize
}

impl CyclotomicGaloisGroup {

    pub fn new(n: u64) -> Self {
        Self {
            ring: Zn::new(n),
            order: euler_phi(&factor(ZZi64, n as i64)) as usize
        }
    }

    pub fn identity(&self) -> CyclotomicGaloisGroupEl {
        CyclotomicGaloisGroupEl { value: self.ring.one() }
    }

    pub fn mul(&self, lhs: CyclotomicGaloisGroupEl, rhs: CyclotomicGaloisGroupEl) -> CyclotomicGaloisGroupEl {
        CyclotomicGaloisGroupEl { value: self.ring.mul(lhs.value, rhs.value) }
    }

    pub fn invert(&self, value: CyclotomicGaloisGroupEl) -> CyclotomicGaloisGroupEl {
        // elements are always units, see `from_ring_el()`
        CyclotomicGaloisGroupEl { value: self.ring.invert(&value.value).unwrap() }
    }

    ///
    /// Returns the exponent `k` in `[0, n)` such that the given element is `X -> X^k`.
    ///
    pub fn representative(&self, value: CyclotomicGaloisGroupEl) -> usize {
        self.ring.smallest_positive_lift(value.value) as usize
    }

    pub fn from_representative(&self, value: i64) -> CyclotomicGaloisGroupEl {
        self.from_ring_el(self.ring.coerce(&ZZi64, value))
    }

    pub fn from_ring_el(&self, value: ZnEl) -> CyclotomicGaloisGroupEl {
        assert!(self.ring.is_unit(&value), "{} is not coprime to {}", self.ring.smallest_positive_lift(value), self.n());
        CyclotomicGaloisGroupEl { value }
    }

    pub fn pow(&self, base: CyclotomicGaloisGroupEl, power: i64) -> CyclotomicGaloisGroupEl {
        if power >= 0 {
            CyclotomicGaloisGroupEl { value: self.ring.pow(base.value, power as usize) }
        } else {
            self.invert(CyclotomicGaloisGroupEl { value: self.ring.pow(base.value, (-power) as usize) })
        }
    }

    pub fn is_identity(&self, value: CyclotomicGaloisGroupEl) -> bool {
        self.ring.is_one(&value.value)
    }

    pub fn eq_el(&self, lhs: CyclotomicGaloisGroupEl, rhs: CyclotomicGaloisGroupEl) -> bool {
        self.ring.eq_el(&lhs.value, &rhs.value)
    }

    pub fn n(&self) -> usize {
        *self.ring.modulus() as usize
    }

    pub fn group_order(&self) -> usize {
        self.order
    }

    ///
    /// The multiplicative order of the given element. The groups we work with are small
    /// (their order is the ring degree), so we just walk through the powers.
    ///
    pub fn element_order(&self, value: CyclotomicGaloisGroupEl) -> usize {
        let mut current = value;
        let mut result = 1;
        while !self.is_identity(current) {
            current = self.mul(current, value);
            result += 1;
            debug_assert!(result <= self.group_order());
        }
        return result;
    }
}

impl Debug for CyclotomicGaloisGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(Z/{}Z)*", self.ring.modulus())
    }
}

impl PartialEq for CyclotomicGaloisGroup {
    fn eq(&self, other: &Self) -> bool {
        self.n() == other.n()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CyclotomicGaloisGroupEl {
    value: El<Zn>
}

///
/// A ring `R[X]/(Phi_n(X))`, given as a free algebra over `R` whose canonical generator is a
/// primitive `n`-th root of unity. Its Galois group `(Z/nZ)*` acts by `X -> X^k`.
///
pub trait CyclotomicRing: FreeAlgebra {

    ///
    /// The multiplicative order of `self.canonical_gen()`.
    ///
    fn n(&self) -> u64;

    fn galois_group(&self) -> CyclotomicGaloisGroup {
        CyclotomicGaloisGroup::new(self.n())
    }

    fn apply_galois_action(&self, x: &Self::Element, g: CyclotomicGaloisGroupEl) -> Self::Element;

    fn apply_galois_action_many(&self, x: &Self::Element, gs: &[CyclotomicGaloisGroupEl]) -> Vec<Self::Element> {
        gs.iter().map(move |g| self.apply_galois_action(&x, *g)).collect()
    }
}

///
/// The [`RingStore`] belonging to [`CyclotomicRing`]
///
pub trait CyclotomicRingStore: RingStore
    where Self::Type: CyclotomicRing
{
    delegate!{ CyclotomicRing, fn n(&self) -> u64 }
    delegate!{ CyclotomicRing, fn galois_group(&self) -> CyclotomicGaloisGroup }
    delegate!{ CyclotomicRing, fn apply_galois_action(&self, el: &El<Self>, g: CyclotomicGaloisGroupEl) -> El<Self> }
    delegate!{ CyclotomicRing, fn apply_galois_action_many(&self, el: &El<Self>, gs: &[CyclotomicGaloisGroupEl]) -> Vec<El<Self>> }
}

impl<R: RingStore> CyclotomicRingStore for R
    where R::Type: CyclotomicRing
{}

#[cfg(test)]
use feanor_math::assert_el_eq;

///
/// Checks that `ring.canonical_gen()` is a primitive `n`-th root of unity, that its powers
/// are compatible with the canonical basis, and that Galois automorphisms map it to the right power.
/// Only applies to rings with `n` a power of two, i.e. `Phi_n(X) = X^(n/2) + 1`.
///
#[cfg(any(test, feature = "generic_tests"))]
pub fn generic_test_cyclotomic_ring_axioms<R: CyclotomicRingStore>(ring: R)
    where R::Type: CyclotomicRing
{
    use feanor_math::rings::extension::FreeAlgebraStore;
    use feanor_math::seq::VectorView;
    use feanor_math::seq::VectorFn;
    use feanor_math::homomorphism::Homomorphism;

    let zeta = ring.canonical_gen();
    let n = ring.n() as usize;
    assert!(n.is_power_of_two());
    assert_eq!(n / 2, ring.rank());

    assert_el_eq!(&ring, &ring.one(), &ring.pow(ring.clone_el(&zeta), n));
    assert_el_eq!(&ring, &ring.neg_one(), &ring.pow(ring.clone_el(&zeta), n / 2));

    for i in 0..ring.rank() {
        let power = ring.pow(ring.clone_el(&zeta), i);
        let power_vec = ring.wrt_canonical_basis(&power);
        for j in 0..ring.rank() {
            if i == j {
                assert_el_eq!(ring.base_ring(), &ring.base_ring().one(), &power_vec.at(j));
            } else {
                assert_el_eq!(ring.base_ring(), &ring.base_ring().zero(), &power_vec.at(j));
            }
        }
    }

    let galois_group = ring.galois_group();
    for g in [3, 5, -1, n as i64 / 2 + 1] {
        let g = galois_group.from_representative(g);
        let expected = ring.pow(ring.clone_el(&zeta), galois_group.representative(g));
        assert_el_eq!(&ring, &expected, &ring.apply_galois_action(&zeta, g));
    }

    let element = ring.from_canonical_basis((0..ring.rank()).map(|k| ring.base_ring().int_hom().map(k as i32 + 1)));
    let expected = ring.sum((0..ring.rank()).map(|k| ring.int_hom().mul_map(ring.pow(ring.clone_el(&zeta), k), k as i32 + 1)));
    assert_el_eq!(&ring, &expected, &element);
}

#[test]
fn test_galois_group_order() {
    let group = CyclotomicGaloisGroup::new(64);
    assert_eq!(32, group.group_order());
    assert_eq!(16, group.element_order(group.from_representative(5)));
    assert_eq!(2, group.element_order(group.from_representative(-1)));
    assert_eq!(2, group.element_order(group.from_representative(33)));
    assert_eq!(1, group.element_order(group.identity()));
}

#[test]
fn test_galois_group_arithmetic() {
    let group = CyclotomicGaloisGroup::new(32);
    let g = group.from_representative(5);
    assert_eq!(25, group.representative(group.pow(g, 2)));
    assert!(group.is_identity(group.mul(g, group.invert(g))));
    assert!(group.eq_el(group.invert(g), group.pow(g, -1)));
    assert!(group.eq_el(group.from_representative(-5), group.mul(g, group.from_representative(31))));
    assert_eq!(13, group.representative(group.pow(g, -1)));
}
