use feanor_math::ring::*;
use feanor_math::rings::extension::*;

use crate::number_ring::negacyclic::*;
use crate::slots::*;

///
/// Contains [`frobenius::compile_frobenius()`], which writes a linear map of a single slot as a sum
/// of powers of the Frobenius.
///
pub mod frobenius;

///
/// Contains [`compiled::CompiledLinearTransform`] and its builder, i.e. the compiler from slot-wise
/// matrices to sums of Galois automorphisms, and the baby-step giant-step evaluation.
///
pub mod compiled;

///
/// Serialization of compiled transforms with `serde`.
///
pub mod serialization;

///
/// Contains [`subring::CompiledSubringLinearTransform`], to evaluate transforms on a subring
/// of a larger ring, and on ciphertexts.
///
pub mod subring;

///
/// Table of all powers of an element `a` of a ring that satisfies `a^h = -a^0` for a known `h`,
/// called the half order. The element does not have to be a unit, but may also be of the form
/// `e * zeta` for an idempotent `e`, in which case `a^0` is taken to be `e` and not `1`.
///
/// All powers are computed during construction, and indices are reduced modulo `2h`, using
/// `a^(i + h) = -a^i`.
///
pub struct NegacyclicPowerTable<R: RingStore> {
    ring: R,
    half_order: usize,
    content: Vec<El<R>>
}

impl<R: RingStore> NegacyclicPowerTable<R> {

    ///
    /// Creates the table of powers of `generator`.
    ///
    /// It is not checked that `half_order` is correct. If it is not, the returned powers are
    /// wrong.
    ///
    pub fn new(ring: R, generator: El<R>, half_order: usize) -> Self {
        assert!(half_order > 0);
        let mut content = Vec::with_capacity(half_order);
        content.push(ring.zero());
        let mut current = ring.clone_el(&generator);
        while content.len() < half_order {
            let next = ring.mul_ref(&current, &generator);
            content.push(std::mem::replace(&mut current, next));
        }
        // `current` is now `a^h = -a^0`
        content[0] = ring.negate(current);
        return Self { ring, half_order, content };
    }

    pub fn ring(&self) -> &R {
        &self.ring
    }

    pub fn half_order(&self) -> usize {
        self.half_order
    }

    pub fn get_power(&self, power: i64) -> El<R> {
        let reduced = power.rem_euclid(2 * self.half_order as i64) as usize;
        if reduced < self.half_order {
            self.ring.clone_el(&self.content[reduced])
        } else {
            self.ring.negate(self.ring.clone_el(&self.content[reduced - self.half_order]))
        }
    }
}

impl<'a> NegacyclicPowerTable<&'a NegacyclicRing> {

    ///
    /// Creates the table of powers of `e * zeta`, where `e` is the idempotent belonging to the
    /// first slot. Its half order is `N`.
    ///
    pub fn for_first_slot<S: SlotRing>(slot_ring: &'a S) -> Self {
        let ring = slot_ring.ring();
        Self::new(ring, slot_ring.from_slot_value(&slot_ring.slot_algebra().canonical_gen(), 0), ring.rank())
    }
}

#[cfg(test)]
use feanor_math::assert_el_eq;
#[cfg(test)]
use feanor_math::rings::zn::zn_64::*;
#[cfg(test)]
use crate::slots::pow2::Pow2SlotRing;

#[test]
fn test_power_table_of_root_of_unity() {
    let ring = NegacyclicRingBase::new(Zn::new(17), 8);
    let table = NegacyclicPowerTable::new(&ring, ring.canonical_gen(), 8);
    for i in -20..40 {
        assert_el_eq!(ring, ring.get_ring().monomial(i), table.get_power(i));
    }
}

#[test]
fn test_power_table_of_idempotent_multiple() {
    for (N, t) in [(16, 17), (16, 7)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let table = NegacyclicPowerTable::for_first_slot(&slot_ring);
        let generator = table.get_power(1);

        let idempotent = slot_ring.from_slot_value(&slot_ring.slot_algebra().one(), 0);
        assert_el_eq!(ring, idempotent, table.get_power(0));
        assert_el_eq!(ring, generator, table.get_power(1));
        assert_el_eq!(ring, ring.mul_ref(&generator, &generator), table.get_power(2));
        assert_el_eq!(ring, ring.negate(ring.clone_el(&generator)), table.get_power(ring.rank() as i64 + 1));
        assert_el_eq!(ring, ring.mul_ref(&idempotent, &ring.get_ring().monomial(-5)), table.get_power(-5));
    }
}

#[test]
fn test_power_table_in_slot_algebra() {
    let slot_ring = Pow2SlotRing::new(16, 7);
    let slot_algebra = slot_ring.slot_algebra();
    let table = NegacyclicPowerTable::new(slot_algebra, slot_algebra.canonical_gen(), 16);
    for i in [0i64, 1, 3, 4, 17, -1, 31] {
        assert_el_eq!(slot_algebra, slot_algebra.pow(slot_algebra.canonical_gen(), i.rem_euclid(32) as usize), table.get_power(i));
    }
}

#[test]
fn test_power_table_half_order_one() {
    let ring = NegacyclicRingBase::new(Zn::new(17), 2);
    let minus_one = ring.neg_one();
    let table = NegacyclicPowerTable::new(&ring, ring.clone_el(&minus_one), 1);
    assert_el_eq!(ring, ring.one(), table.get_power(0));
    assert_el_eq!(ring, minus_one, table.get_power(1));
    assert_el_eq!(ring, ring.one(), table.get_power(-2));
}
