use std::collections::BTreeMap;

use feanor_math::algorithms::int_factor::is_prime_power;
use feanor_math::divisibility::DivisibilityRingStore;
use feanor_math::homomorphism::*;
use feanor_math::integer::*;
use feanor_math::ring::*;
use feanor_math::rings::extension::extension_impl::FreeAlgebraImpl;
use feanor_math::rings::extension::galois_field::GaloisField;
use feanor_math::rings::extension::*;
use feanor_math::rings::finite::FiniteRingStore;
use feanor_math::rings::poly::dense_poly::DensePolyRing;
use feanor_math::rings::poly::*;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::rings::zn::*;
use feanor_math::seq::*;
use tracing::{event, instrument, Level};

use crate::cyclotomic::*;
use crate::lintransform::NegacyclicPowerTable;
use crate::number_ring::negacyclic::*;
use crate::slots::*;
use crate::ZZi64;

///
/// The slot structure of `Z/p^eZ[X]/(X^N + 1)` for a power-of-two `N >= 4` and an odd prime `p`.
///
/// We have `(Z/2NZ)* = <5> x <-1>`, and `<5>` consists exactly of the residues `1 mod 4`. Hence
///  - if `p = 1 mod 4`, then `p` lies in `<5>`, and `(Z/2NZ)* / <p>` is the product of a cyclic group
///    of order `L = N/(2d)` generated by `5` and the group `{1, -1}`. We order the slots in two lanes
///    of length `L`, namely slot `b * L + a` belongs to `5^a * (-1)^b`. Rotations by `g1 = 5` rotate
///    both lanes simultaneously, `g2 = -1` swaps the lanes.
///  - if `p = 3 mod 4`, then `-1` lies in `<5> <p>`, and `(Z/2NZ)* / <p>` is cyclic of order `N/d`,
///    generated by `5`. There is a single lane, and slot `a` belongs to `5^a`. Odd powers of the Frobenius
///    are not in `<5>`, so compiling a transform requires `g2 = -1` in this case.
///
/// A slot is the Galois ring `Z/p^eZ[zeta]` of rank `d`, where `zeta` is a primitive `2N`-th root of unity.
///
pub struct Pow2SlotRing {
    ring: NegacyclicRing,
    galois_group: CyclotomicGaloisGroup,
    p: i64,
    e: usize,
    lane_len: usize,
    g1: CyclotomicGaloisGroupEl,
    g2: CyclotomicGaloisGroupEl,
    slot_representatives: Vec<CyclotomicGaloisGroupEl>,
    /// powers of `zeta` in the slot algebra, which also owns the slot algebra
    zeta_powers: NegacyclicPowerTable<SlotAlgebra>,
    /// `Tr(zeta^m)` for `0 <= m < 2N`
    power_traces: Vec<ZnEl>,
    dual_basis: Vec<El<SlotAlgebra>>,
    N_inv: ZnEl
}

///
/// Finds the minimal polynomial `f` over `Z/p^eZ` of a primitive `2N`-th root of unity in the Galois ring
/// of rank `d`, and returns the representation `-f_0, ..., -f_(d - 1)` of `Y^d` in `Z/p^eZ[Y]/(f(Y))`.
///
/// For this, we take any Galois ring of rank `d` (by lifting the modulus of `GF(p^d)`), and raise
/// random elements to the power `|units| / 2N`, until we find a root of unity of order exactly `2N`.
///
#[instrument(skip_all)]
fn slot_algebra_modulus(base_ring: Zn, p: i64, e: usize, d: usize, N: usize) -> Vec<ZnEl> {
    let galois_ring_modulus = if d == 1 {
        Vec::new()
    } else {
        let Fq = GaloisField::new(p, d);
        let x_pow_rank = Fq.pow(Fq.canonical_gen(), d);
        let x_pow_rank = Fq.wrt_canonical_basis(&x_pow_rank);
        (0..d).map(|i| base_ring.coerce(&ZZi64, Fq.base_ring().smallest_lift(x_pow_rank.at(i)))).collect::<Vec<_>>()
    };
    let galois_ring = FreeAlgebraImpl::new(base_ring, d, galois_ring_modulus);

    let ZZbig = BigIntRing::RING;
    let q = ZZbig.pow(int_cast(p, ZZbig, ZZi64), d);
    let mut exponent = ZZbig.sub_ref_fst(&q, ZZbig.one());
    ZZbig.euclidean_div_pow_2(&mut exponent, (2 * N).trailing_zeros() as usize);
    ZZbig.mul_assign(&mut exponent, ZZbig.pow(q, e - 1));

    let mut rng = oorandom::Rand64::new(*base_ring.modulus() as u128);
    let mut attempts = 0;
    let zeta = loop {
        attempts += 1;
        let candidate = galois_ring.from_canonical_basis((0..d).map(|_| base_ring.random_element(|| rng.rand_u64())));
        let zeta = galois_ring.pow_gen(candidate, &exponent, ZZbig);
        if galois_ring.is_neg_one(&galois_ring.pow(galois_ring.clone_el(&zeta), N)) {
            break zeta;
        }
    };
    event!(Level::DEBUG, attempts, "found primitive {}-th root of unity in Galois ring of rank {} over Z/{}Z", 2 * N, d, base_ring.modulus());

    // the Frobenius of the Galois ring maps `zeta` to `zeta^p`
    let mut conjugates = Vec::with_capacity(d);
    let mut current = zeta;
    for _ in 0..d {
        let next = galois_ring.pow(galois_ring.clone_el(&current), p as usize);
        conjugates.push(current);
        current = next;
    }
    let poly_ring = DensePolyRing::new(&galois_ring, "Y");
    let minpoly = poly_ring.prod(conjugates.into_iter().map(|conjugate| poly_ring.sub(poly_ring.indeterminate(), poly_ring.inclusion().map(conjugate))));
    return (0..d).map(|i| {
        let coefficient = galois_ring.wrt_canonical_basis(poly_ring.coefficient_at(&minpoly, i));
        debug_assert!((1..d).all(|j| base_ring.is_zero(&coefficient.at(j))));
        base_ring.negate(coefficient.at(0))
    }).collect();
}

///
/// Computes the dual basis of `1, zeta, ..., zeta^(d - 1)` w.r.t. the trace. If `f(Y) = (Y - zeta) sum_i b_i Y^i`
/// is the minimal polynomial of `zeta`, this is `b_i / f'(zeta)`.
///
fn trace_dual_basis(slot_algebra: &SlotAlgebra) -> Vec<El<SlotAlgebra>> {
    let d = slot_algebra.rank();
    let base_ring = slot_algebra.base_ring();
    let zeta = slot_algebra.canonical_gen();
    let zeta_pow_d = slot_algebra.pow(slot_algebra.clone_el(&zeta), d);
    let zeta_pow_d = slot_algebra.wrt_canonical_basis(&zeta_pow_d);
    let minpoly_coefficient = |i: usize| if i == d { base_ring.one() } else { base_ring.negate(zeta_pow_d.at(i)) };

    let mut quotient = (0..d).map(|_| slot_algebra.zero()).collect::<Vec<_>>();
    quotient[d - 1] = slot_algebra.one();
    for i in (1..d).rev() {
        let next = slot_algebra.add(slot_algebra.inclusion().map(minpoly_coefficient(i)), slot_algebra.mul_ref(&zeta, &quotient[i]));
        quotient[i - 1] = next;
    }
    let derivative = slot_algebra.sum((1..=d).map(|i| slot_algebra.inclusion().mul_map(
        slot_algebra.pow(slot_algebra.clone_el(&zeta), i - 1),
        base_ring.mul(minpoly_coefficient(i), base_ring.int_hom().map(i as i32))
    )));
    let derivative_inv = slot_algebra.invert(&derivative).unwrap_or_else(|| panic!("the slot algebra is not unramified"));
    return quotient.into_iter().map(|b| slot_algebra.mul_ref_snd(b, &derivative_inv)).collect();
}

impl Pow2SlotRing {

    #[instrument(skip_all)]
    pub fn new(N: usize, t: u64) -> Self {
        assert!(N >= 4 && N.is_power_of_two(), "ring degree must be a power of two >= 4, got {}", N);
        let (p, e) = is_prime_power(&ZZi64, &(t as i64)).unwrap_or_else(|| panic!("modulus {} is not a prime power", t));
        assert!(p != 2, "modulus {} must be odd", t);

        let ring = NegacyclicRingBase::new(Zn::new(t), N);
        let base_ring = *ring.base_ring();
        let galois_group = ring.galois_group();
        let d = galois_group.element_order(galois_group.from_representative(p));
        let g1 = galois_group.from_representative(5);
        let g2 = galois_group.from_representative(-1);
        debug_assert_eq!(N / 2, galois_group.element_order(g1));
        let slot_count = N / d;
        let lane_len = if p % 4 == 1 { slot_count / 2 } else { slot_count };

        let slot_algebra = FreeAlgebraImpl::new(base_ring, d, slot_algebra_modulus(base_ring, p, e, d, N));
        let dual_basis = trace_dual_basis(&slot_algebra);
        let zeta = slot_algebra.canonical_gen();
        let zeta_powers = NegacyclicPowerTable::new(slot_algebra, zeta, N);
        let power_traces = (0..(2 * N as i64)).map(|m| zeta_powers.ring().trace(zeta_powers.get_power(m))).collect();

        let slot_representatives = (0..slot_count).map(|s| galois_group.mul(
            galois_group.pow(g1, (s % lane_len) as i64),
            galois_group.pow(g2, (s / lane_len) as i64)
        )).collect();

        let N_inv = base_ring.invert(&base_ring.int_hom().map(N as i32)).unwrap_or_else(|| panic!("N = {} is not invertible modulo {}", N, t));

        return Self {
            ring,
            galois_group,
            p,
            e,
            lane_len,
            g1,
            g2,
            slot_representatives,
            zeta_powers,
            power_traces,
            dual_basis,
            N_inv
        };
    }

    pub fn e(&self) -> usize {
        self.e
    }
}

impl SlotRing for Pow2SlotRing {

    fn ring(&self) -> &NegacyclicRing {
        &self.ring
    }

    fn galois_group(&self) -> CyclotomicGaloisGroup {
        self.galois_group
    }

    fn prime(&self) -> i64 {
        self.p
    }

    fn slot_algebra(&self) -> &SlotAlgebra {
        self.zeta_powers.ring()
    }

    fn slot_count(&self) -> usize {
        self.slot_representatives.len()
    }

    fn slot_representative(&self, slot: usize) -> CyclotomicGaloisGroupEl {
        self.slot_representatives[slot]
    }

    fn lane_len(&self) -> usize {
        self.lane_len
    }

    fn galois_generators(&self) -> Option<GaloisGenerators> {
        Some(GaloisGenerators {
            g1: self.g1,
            ord_g1: self.ring.rank() / 2,
            g2: self.g2
        })
    }

    fn block_rotate(&self, steps: i64, block_size: usize) -> Rotation {
        assert!(block_size > 0 && self.slot_count() % block_size == 0, "block size {} does not divide the slot count {}", block_size, self.slot_count());
        // the automorphism that moves the value of slot `source` to `target` is unique, so
        // we group the target slots by it
        let mut targets_per_automorphism: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for target in 0..self.slot_count() {
            let block_start = target - target % block_size;
            let source = block_start + ((target % block_size) as i64 - steps).rem_euclid(block_size as i64) as usize;
            let g = self.galois_group.mul(self.galois_group.invert(self.slot_representatives[target]), self.slot_representatives[source]);
            targets_per_automorphism.entry(self.galois_group.representative(g)).or_insert_with(Vec::new).push(target);
        }
        let slot_algebra = self.slot_algebra();
        Rotation::new(targets_per_automorphism.into_iter().map(|(g, targets)| {
            let mask = if targets.len() == self.slot_count() {
                None
            } else {
                Some(self.from_slot_values((0..self.slot_count()).map(|s| if targets.contains(&s) { slot_algebra.one() } else { slot_algebra.zero() })))
            };
            (mask, self.galois_group.from_representative(g as i64))
        }).collect())
    }

    fn zeta_power(&self, power: i64) -> El<SlotAlgebra> {
        self.zeta_powers.get_power(power)
    }

    fn slot_values(&self, x: &NegacyclicRingEl) -> Vec<El<SlotAlgebra>> {
        let base_ring = self.ring.base_ring();
        let slot_algebra = self.slot_algebra();
        let coefficients = self.ring.wrt_canonical_basis(x);
        self.slot_representatives.iter().map(|h| {
            let h = self.galois_group.representative(*h);
            slot_algebra.sum((0..coefficients.len()).filter_map(|i| {
                let c = coefficients.at(i);
                if base_ring.is_zero(&c) {
                    None
                } else {
                    Some(slot_algebra.inclusion().mul_map(self.zeta_power((i * h) as i64), c))
                }
            }))
        }).collect()
    }

    ///
    /// Computes the inverse of the slot map. The `k`-th coefficient of the result is
    /// ```text
    ///     1/N * sum_s Tr(x_s * zeta^(-k h_s))
    /// ```
    /// and we expand `x_s` in the basis `zeta^j` to use the precomputed traces `Tr(zeta^m)`.
    ///
    fn from_slot_values<I>(&self, values: I) -> NegacyclicRingEl
        where I: IntoIterator<Item = El<SlotAlgebra>>
    {
        let slot_algebra = self.slot_algebra();
        let base_ring = self.ring.base_ring();
        let d = slot_algebra.rank();
        let coordinates = values.into_iter().map(|value| {
            let value = slot_algebra.wrt_canonical_basis(&value);
            (0..d).map(|j| value.at(j)).collect::<Vec<_>>()
        }).collect::<Vec<_>>();
        assert_eq!(self.slot_count(), coordinates.len());

        let n = self.ring.n() as usize;
        let slot_representatives = self.slot_representatives.iter().map(|h| self.galois_group.representative(*h)).collect::<Vec<_>>();
        let result = (0..self.ring.rank()).map(|k| {
            let mut result = base_ring.zero();
            for (value, h) in coordinates.iter().zip(slot_representatives.iter()) {
                let shift = n - (k * h) % n;
                for (j, c) in value.iter().enumerate() {
                    if !base_ring.is_zero(c) {
                        base_ring.add_assign(&mut result, base_ring.mul_ref(c, &self.power_traces[(j + shift) % n]));
                    }
                }
            }
            base_ring.mul(result, self.N_inv)
        }).collect::<Vec<_>>();
        self.ring.from_canonical_basis(result)
    }

    fn dual_basis(&self) -> &[El<SlotAlgebra>] {
        &self.dual_basis
    }

    fn subring(&self) -> Self {
        Pow2SlotRing::new(self.ring.rank() / 2, *self.ring.base_ring().modulus() as u64)
    }
}

impl std::fmt::Debug for Pow2SlotRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} with {} slots of rank {}", self.ring.get_ring(), self.slot_count(), self.slot_rank())
    }
}

#[cfg(test)]
use feanor_math::assert_el_eq;

#[cfg(test)]
fn random_slot_value<G: FnMut() -> u64>(slot_ring: &Pow2SlotRing, mut rng: G) -> El<SlotAlgebra> {
    let slot_algebra = slot_ring.slot_algebra();
    slot_algebra.from_canonical_basis((0..slot_ring.slot_rank()).map(|_| slot_algebra.base_ring().random_element(&mut rng)))
}

#[test]
fn test_pow2_slot_ring_structure() {
    let slot_ring = Pow2SlotRing::new(16, 17);
    assert_eq!(2, slot_ring.slot_rank());
    assert_eq!(8, slot_ring.slot_count());
    assert_eq!(4, slot_ring.lane_len());
    assert_eq!(2, slot_ring.lane_count());

    let slot_ring = Pow2SlotRing::new(16, 97);
    assert_eq!(1, slot_ring.slot_rank());
    assert_eq!(16, slot_ring.slot_count());

    let slot_ring = Pow2SlotRing::new(64, 17);
    assert_eq!(8, slot_ring.slot_rank());
    assert_eq!(8, slot_ring.slot_count());

    let slot_ring = Pow2SlotRing::new(16, 289);
    assert_eq!(17, slot_ring.prime());
    assert_eq!(2, slot_ring.e());
    assert_eq!(2, slot_ring.slot_rank());

    let slot_ring = Pow2SlotRing::new(4, 13);
    assert_eq!(2, slot_ring.slot_rank());
    assert_eq!(2, slot_ring.slot_count());
    assert_eq!(1, slot_ring.lane_len());
}

#[test]
fn test_pow2_slot_ring_structure_p_3_mod_4() {
    let slot_ring = Pow2SlotRing::new(16, 7);
    assert_eq!(4, slot_ring.slot_rank());
    assert_eq!(4, slot_ring.slot_count());
    assert_eq!(4, slot_ring.lane_len());
    assert_eq!(1, slot_ring.lane_count());

    let slot_ring = Pow2SlotRing::new(16, 23);
    assert_eq!(4, slot_ring.slot_rank());
    assert_eq!(4, slot_ring.slot_count());
    assert_eq!(1, slot_ring.lane_count());

    let slot_ring = Pow2SlotRing::new(32, 7);
    assert_eq!(8, slot_ring.slot_rank());
    assert_eq!(4, slot_ring.slot_count());

    let slot_ring = Pow2SlotRing::new(8, 23);
    assert_eq!(2, slot_ring.slot_rank());
    assert_eq!(4, slot_ring.slot_count());

    let slot_ring = Pow2SlotRing::new(16, 49);
    assert_eq!(7, slot_ring.prime());
    assert_eq!(2, slot_ring.e());
    assert_eq!(4, slot_ring.slot_rank());

    // the representatives are the powers of 5, and no two of them differ by a power of p
    let galois_group = slot_ring.galois_group();
    let frobenius_powers = (0..4).map(|l| slot_ring.frobenius(l).galois_element()).collect::<Vec<_>>();
    for s in 0..4 {
        assert!(galois_group.eq_el(galois_group.pow(galois_group.from_representative(5), s as i64), slot_ring.slot_representative(s)));
        for r in 0..s {
            let quotient = galois_group.mul(slot_ring.slot_representative(s), galois_group.invert(slot_ring.slot_representative(r)));
            assert!(frobenius_powers.iter().all(|f| !galois_group.eq_el(*f, quotient)));
        }
    }
}

#[test]
fn test_zeta_power() {
    for (N, t) in [(16, 17), (16, 289), (32, 97), (16, 7), (16, 23), (16, 49)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let slot_algebra = slot_ring.slot_algebra();
        let zeta = slot_algebra.canonical_gen();
        assert_el_eq!(slot_algebra, zeta, slot_ring.zeta_power(1));
        assert_el_eq!(slot_algebra, slot_algebra.neg_one(), slot_ring.zeta_power(N as i64));
        assert_el_eq!(slot_algebra, slot_algebra.neg_one(), slot_algebra.pow(slot_algebra.clone_el(&zeta), N));
        assert!(!slot_algebra.is_one(&slot_algebra.pow(slot_algebra.clone_el(&zeta), N / 2)));
        assert_el_eq!(slot_algebra, slot_algebra.one(), slot_algebra.mul(slot_ring.zeta_power(-1), slot_ring.zeta_power(1)));
    }
}

#[test]
fn test_dual_basis() {
    for (N, t) in [(16, 17), (64, 17), (16, 7), (32, 7), (16, 23), (16, 49), (16, 97)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let slot_algebra = slot_ring.slot_algebra();
        let base_ring = slot_algebra.base_ring();
        let d = slot_ring.slot_rank();
        assert_eq!(d, slot_ring.dual_basis().len());
        for i in 0..d {
            for j in 0..d {
                let expected = if i == j { base_ring.one() } else { base_ring.zero() };
                assert_el_eq!(base_ring, expected, slot_ring.slot_trace(&slot_algebra.mul(slot_ring.zeta_power(i as i64), slot_algebra.clone_el(&slot_ring.dual_basis()[j]))));
            }
        }
    }
}

#[test]
fn test_slot_trace_is_sum_of_conjugates() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 7), (16, 23)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let slot_algebra = slot_ring.slot_algebra();
        let value = random_slot_value(&slot_ring, || rng.rand_u64());
        let expected = slot_algebra.sum((0..slot_ring.slot_rank()).map(|l| slot_ring.slot_frobenius(&value, l as i64)));
        assert_el_eq!(slot_algebra, expected, slot_algebra.inclusion().map(slot_ring.slot_trace(&value)));
    }
}

#[test]
fn test_slot_values_inverse() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 97), (64, 17), (16, 289), (4, 13), (16, 7), (16, 23), (32, 7), (4, 7), (16, 49)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        for _ in 0..3 {
            let x = ring.get_ring().random_element(|| rng.rand_u64());
            assert_el_eq!(ring, x, slot_ring.from_slot_values(slot_ring.slot_values(&x)));
        }
        let values = (0..slot_ring.slot_count()).map(|_| random_slot_value(&slot_ring, || rng.rand_u64())).collect::<Vec<_>>();
        let actual = slot_ring.slot_values(&slot_ring.from_slot_values(values.iter().map(|v| slot_ring.slot_algebra().clone_el(v))));
        for (e, a) in values.iter().zip(actual.iter()) {
            assert_el_eq!(slot_ring.slot_algebra(), e, a);
        }
    }
}

#[test]
fn test_slot_values_multiplicative() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (32, 17), (16, 289), (16, 7), (16, 23), (16, 49)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let a = ring.get_ring().random_element(|| rng.rand_u64());
        let b = ring.get_ring().random_element(|| rng.rand_u64());
        let a_slots = slot_ring.slot_values(&a);
        let b_slots = slot_ring.slot_values(&b);
        let product_slots = slot_ring.slot_values(&ring.mul_ref(&a, &b));
        for s in 0..slot_ring.slot_count() {
            assert_el_eq!(slot_algebra, slot_algebra.mul_ref(&a_slots[s], &b_slots[s]), product_slots[s]);
        }
        let X_slots = slot_ring.slot_values(&ring.canonical_gen());
        assert_el_eq!(slot_algebra, slot_algebra.canonical_gen(), X_slots[0]);
    }
}

#[test]
fn test_rotate() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Pow2SlotRing::new(16, 17);
    let ring = slot_ring.ring();
    let slot_algebra = slot_ring.slot_algebra();
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let x_slots = slot_ring.slot_values(&x);
    for steps in [1, 3, 4, 6, -1] {
        let y_slots = slot_ring.slot_values(&slot_ring.rotate(steps).apply(ring, &x));
        for target in 0..8 {
            let source = (target as i64 - steps).rem_euclid(8) as usize;
            assert_el_eq!(slot_algebra, x_slots[source], y_slots[target]);
        }
    }
    assert_eq!(1, slot_ring.rotate(4).terms().len());
    assert!(slot_ring.rotate(4).terms()[0].0.is_none());
    assert_eq!(2, slot_ring.rotate(1).terms().len());
}

#[test]
fn test_rotate_p_3_mod_4() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 7), (16, 23), (32, 7)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let galois_group = slot_ring.galois_group();
        let slot_count = slot_ring.slot_count();
        let x = ring.get_ring().random_element(|| rng.rand_u64());
        let x_slots = slot_ring.slot_values(&x);
        for steps in [1, 2, -1] {
            let rotation = slot_ring.rotate(steps);
            // a single lane, so only powers of g1 are required
            for (_, g) in rotation.terms() {
                assert!((0..(N as i64 / 2)).any(|i| galois_group.eq_el(*g, galois_group.pow(galois_group.from_representative(5), i))));
            }
            let y_slots = slot_ring.slot_values(&rotation.apply(ring, &x));
            for target in 0..slot_count {
                let source = (target as i64 - steps).rem_euclid(slot_count as i64) as usize;
                assert_el_eq!(slot_algebra, x_slots[source], y_slots[target]);
            }
        }
    }
}

#[test]
fn test_block_rotate() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Pow2SlotRing::new(32, 17);
    let ring = slot_ring.ring();
    let slot_algebra = slot_ring.slot_algebra();
    let lane_len = slot_ring.lane_len();
    assert_eq!(4, lane_len);
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let x_slots = slot_ring.slot_values(&x);
    let galois_group = slot_ring.galois_group();
    for steps in [1, 2, 3] {
        let rotation = slot_ring.block_rotate(steps, lane_len);
        // within a lane, only powers of g1 are required
        for (_, g) in rotation.terms() {
            assert!((0..(ring.rank() as i64 / 2)).any(|i| galois_group.eq_el(*g, galois_group.pow(galois_group.from_representative(5), i))));
        }
        let y_slots = slot_ring.slot_values(&rotation.apply(ring, &x));
        for target in 0..slot_ring.slot_count() {
            let source = target - target % lane_len + (target as i64 - steps).rem_euclid(lane_len as i64) as usize;
            assert_el_eq!(slot_algebra, x_slots[source], y_slots[target]);
        }
    }
}

#[test]
fn test_frobenius() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (64, 17), (16, 289), (16, 7), (16, 23), (16, 49)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let x = ring.get_ring().random_element(|| rng.rand_u64());
        let x_slots = slot_ring.slot_values(&x);
        for power in [1, 2, -1] {
            let y_slots = slot_ring.slot_values(&slot_ring.frobenius(power).apply(ring, &x));
            for s in 0..slot_ring.slot_count() {
                assert_el_eq!(slot_algebra, slot_ring.slot_frobenius(&x_slots[s], power), y_slots[s]);
            }
        }
        // the Frobenius is a ring automorphism of the slot
        let a = random_slot_value(&slot_ring, || rng.rand_u64());
        let b = random_slot_value(&slot_ring, || rng.rand_u64());
        assert_el_eq!(slot_algebra, slot_algebra.mul(slot_ring.slot_frobenius(&a, 1), slot_ring.slot_frobenius(&b, 1)), slot_ring.slot_frobenius(&slot_algebra.mul_ref(&a, &b), 1));
    }
}

#[test]
fn test_from_slot_value() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 7)] {
        let slot_ring = Pow2SlotRing::new(N, t);
        let slot_algebra = slot_ring.slot_algebra();
        let value = random_slot_value(&slot_ring, || rng.rand_u64());
        let x = slot_ring.from_slot_value(&value, 2);
        let x_slots = slot_ring.slot_values(&x);
        for s in 0..slot_ring.slot_count() {
            if s == 2 {
                assert_el_eq!(slot_algebra, value, x_slots[s]);
            } else {
                assert!(slot_algebra.is_zero(&x_slots[s]));
            }
        }
    }
}
