use std::collections::HashMap;

use feanor_math::homomorphism::*;
use feanor_math::ring::*;
use feanor_math::rings::extension::*;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::seq::*;
use tracing::instrument;

use crate::lintransform::NegacyclicPowerTable;
use crate::number_ring::negacyclic::*;
use crate::slots::*;

///
/// Writes a `Z/tZ`-linear map `M` of the slot algebra `S = Z/tZ[zeta]` as a sum of powers of the Frobenius
/// `pi`, i.e. computes `c_0, ..., c_(d - 1)` in `S` such that
/// ```text
///     M(x) = sum_l c_l * pi^l(x)    for all x in S.
/// ```
/// The map is given by its sparse matrix `(row, col) -> M_(row, col)` w.r.t. the basis
/// `1, zeta, ..., zeta^(d - 1)`. The result `c_l` is returned as element of the ring that has
/// value `c_l` in the first slot, and vanishes in all other slots.
///
/// If `b_0, ..., b_(d - 1)` is the dual basis of `zeta^k` w.r.t. the trace, then `x = sum_k Tr(x b_k) zeta^k`,
/// and expanding the trace gives
/// ```text
///     c_l = sum_(row, k) M_(row, k) zeta^row pi^l(b_k)
/// ```
/// The map `S -> R` that sends a value to the ring element having this value in the first slot
/// is `Z/tZ`-linear, and maps `zeta^i` to the `i`-th power of the power table's generator `e * zeta`.
///
#[instrument(skip_all)]
pub fn compile_frobenius<S: SlotRing>(sparse_transform_matrix: &HashMap<(usize, usize), ZnEl>, slot_ring: &S, powertable: &NegacyclicPowerTable<&NegacyclicRing>) -> Vec<NegacyclicRingEl> {
    let ring = slot_ring.ring();
    let slot_algebra = slot_ring.slot_algebra();
    let base_ring = slot_algebra.base_ring();
    let d = slot_ring.slot_rank();
    assert_eq!(ring.rank(), powertable.half_order());

    let mut result = Vec::with_capacity(d);
    for l in 0..d {
        let frobenius_dual_basis = slot_ring.dual_basis().iter().map(|b| slot_ring.slot_frobenius(b, l as i64)).collect::<Vec<_>>();
        let mut current = slot_algebra.zero();
        for ((row, col), entry) in sparse_transform_matrix {
            debug_assert!(*row < d && *col < d);
            if base_ring.is_zero(entry) {
                continue;
            }
            let summand = slot_algebra.mul_ref_snd(slot_ring.zeta_power(*row as i64), &frobenius_dual_basis[*col]);
            slot_algebra.add_assign(&mut current, slot_algebra.inclusion().mul_ref_snd_map(summand, entry));
        }
        let current = slot_algebra.wrt_canonical_basis(&current);
        result.push(ring.sum((0..d).filter_map(|i| {
            let c = current.at(i);
            if base_ring.is_zero(&c) {
                None
            } else {
                Some(ring.inclusion().mul_map(powertable.get_power(i as i64), c))
            }
        })));
    }
    return result;
}

#[cfg(test)]
use crate::slots::pow2::Pow2SlotRing;
#[cfg(test)]
use feanor_math::rings::finite::FiniteRingStore;
#[cfg(test)]
use feanor_math::assert_el_eq;

#[test]
fn test_compile_frobenius() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (32, 17), (64, 17), (16, 289), (16, 97), (16, 7), (16, 23), (32, 7), (16, 49)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let base_ring = ring.base_ring();
        let d = slot_ring.slot_rank();
        let powertable = NegacyclicPowerTable::for_first_slot(&slot_ring);

        let mut matrix = HashMap::new();
        for _ in 0..(2 * d) {
            matrix.insert(((rng.rand_u64() % d as u64) as usize, (rng.rand_u64() % d as u64) as usize), base_ring.random_element(|| rng.rand_u64()));
        }
        let coefficients = compile_frobenius(&matrix, &slot_ring, &powertable);
        assert_eq!(d, coefficients.len());

        let value = (0..d).map(|_| base_ring.random_element(|| rng.rand_u64())).collect::<Vec<_>>();
        let x = slot_ring.from_slot_value(&slot_algebra.from_canonical_basis(value.iter().copied()), 0);
        let mut actual = ring.zero();
        for (l, c) in coefficients.iter().enumerate() {
            ring.add_assign(&mut actual, ring.mul_ref_snd(slot_ring.frobenius(l as i64).apply(ring, &x), c));
        }
        let actual = slot_ring.slot_values(&actual);

        let expected = slot_algebra.from_canonical_basis((0..d).map(|row| 
            base_ring.sum((0..d).filter_map(|col| matrix.get(&(row, col)).map(|entry| base_ring.mul_ref(entry, &value[col]))))
        ));
        assert_el_eq!(slot_algebra, expected, actual[0]);
        for s in 1..slot_ring.slot_count() {
            assert!(slot_algebra.is_zero(&actual[s]));
        }
    }
}

#[test]
fn test_compile_frobenius_identity() {
    for (N, t) in [(32, 17), (16, 7)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let base_ring = ring.base_ring();
        let d = slot_ring.slot_rank();
        let powertable = NegacyclicPowerTable::for_first_slot(&slot_ring);
        let matrix = (0..d).map(|i| ((i, i), base_ring.one())).collect::<HashMap<_, _>>();
        let coefficients = compile_frobenius(&matrix, &slot_ring, &powertable);
        assert_el_eq!(ring, powertable.get_power(0), coefficients[0]);
        for l in 1..d {
            assert!(ring.is_zero(&coefficients[l]));
        }
    }
}
