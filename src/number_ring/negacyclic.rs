use std::io::{Read, Write, ErrorKind};

use feanor_math::algorithms::convolution::{ConvolutionAlgorithm, STANDARD_CONVOLUTION};
use feanor_math::homomorphism::*;
use feanor_math::integer::IntegerRing;
use feanor_math::ring::*;
use feanor_math::rings::extension::*;
use feanor_math::rings::finite::FiniteRingStore;
use feanor_math::rings::poly::dense_poly::DensePolyRing;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::rings::zn::*;
use feanor_math::seq::*;
use feanor_math::serialization::*;
use serde::de::{self, DeserializeSeed};
use serde::{Deserializer, Serialize, Serializer};

use crate::cyclotomic::*;
use crate::ZZi64;

///
/// The ring `Z/tZ[X]/(X^N + 1)`, where `N` is a power of two. This is the `2N`-th cyclotomic
/// ring modulo `t`, and its Galois group is `(Z/2NZ)*`, acting by `X -> X^k`.
///
/// Elements are stored w.r.t. the coefficient basis `1, X, ..., X^(N - 1)`, and multiplied by a
/// full convolution followed by the reduction `X^N = -1`. The transforms we compile work with
/// small `N`, and almost all of their cost is in automorphisms and additions anyway.
///
#[derive(Clone, Copy)]
pub struct NegacyclicRingBase {
    base_ring: Zn,
    N: usize
}

///
/// The [`RingStore`] corresponding to [`NegacyclicRingBase`].
///
pub type NegacyclicRing = RingValue<NegacyclicRingBase>;

pub struct NegacyclicRingEl {
    data: Vec<ZnEl>
}

impl NegacyclicRingBase {

    pub fn new(base_ring: Zn, N: usize) -> NegacyclicRing {
        assert!(N >= 2 && N.is_power_of_two(), "ring degree must be a power of two, got {}", N);
        RingValue::from(Self { base_ring, N })
    }

    ///
    /// Returns `X^power`. Since `X^N = -1`, the power is only relevant modulo `2N`.
    ///
    pub fn monomial(&self, power: i64) -> NegacyclicRingEl {
        let reduced = power.rem_euclid(2 * self.N as i64) as usize;
        let mut result = self.zero();
        if reduced < self.N {
            result.data[reduced] = self.base_ring.one();
        } else {
            result.data[reduced - self.N] = self.base_ring.neg_one();
        }
        return result;
    }

    ///
    /// Maps `x` along the inclusion `Z/tZ[X]/(X^N + 1) -> Z/tZ[X]/(X^N' + 1)` given by `X -> X^(N'/N)`,
    /// for a larger ring of degree `N'` over the same base ring.
    ///
    pub fn embed_into(&self, x: &NegacyclicRingEl, target: &NegacyclicRingBase) -> NegacyclicRingEl {
        assert!(target.N % self.N == 0);
        assert_eq!(self.base_ring.modulus(), target.base_ring.modulus());
        let factor = target.N / self.N;
        let mut result = target.zero();
        for (i, c) in x.data.iter().enumerate() {
            result.data[i * factor] = *c;
        }
        return result;
    }

    pub fn random_element<G>(&self, mut rng: G) -> NegacyclicRingEl
        where G: FnMut() -> u64
    {
        NegacyclicRingEl { data: (0..self.N).map(|_| self.base_ring.random_element(&mut rng)).collect() }
    }

    ///
    /// Writes the coefficients of `x` as `N` little-endian `u64`s, each the smallest
    /// nonnegative lift of the coefficient.
    ///
    pub fn write_le<W: Write>(&self, x: &NegacyclicRingEl, mut writer: W) -> std::io::Result<()> {
        for c in &x.data {
            let value = self.base_ring.smallest_positive_lift(*c) as u64;
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    ///
    /// Reads an element as written by [`NegacyclicRingBase::write_le()`]. Values that are not
    /// reduced modulo `t` are rejected.
    ///
    pub fn read_le<R: Read>(&self, mut reader: R) -> std::io::Result<NegacyclicRingEl> {
        let modulus = *self.base_ring.modulus() as u64;
        let mut buffer = [0u8; 8];
        let mut data = Vec::with_capacity(self.N);
        for _ in 0..self.N {
            reader.read_exact(&mut buffer)?;
            let value = u64::from_le_bytes(buffer);
            if value >= modulus {
                return Err(std::io::Error::new(ErrorKind::InvalidData, format!("coefficient {} is not reduced modulo {}", value, modulus)));
            }
            data.push(self.base_ring.coerce(&ZZi64, value as i64));
        }
        Ok(NegacyclicRingEl { data })
    }
}

impl PartialEq for NegacyclicRingBase {
    fn eq(&self, other: &Self) -> bool {
        self.N == other.N && self.base_ring.get_ring() == other.base_ring.get_ring()
    }
}

impl std::fmt::Debug for NegacyclicRingBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Z/{}Z[X]/(X^{} + 1)", self.base_ring.modulus(), self.N)
    }
}

impl RingBase for NegacyclicRingBase {

    type Element = NegacyclicRingEl;

    fn clone_el(&self, val: &Self::Element) -> Self::Element {
        NegacyclicRingEl { data: val.data.clone() }
    }

    fn add_assign_ref(&self, lhs: &mut Self::Element, rhs: &Self::Element) {
        debug_assert_eq!(self.N, lhs.data.len());
        debug_assert_eq!(self.N, rhs.data.len());
        for (l, r) in lhs.data.iter_mut().zip(rhs.data.iter()) {
            self.base_ring.add_assign_ref(l, r);
        }
    }

    fn add_assign(&self, lhs: &mut Self::Element, rhs: Self::Element) {
        self.add_assign_ref(lhs, &rhs);
    }

    fn sub_assign_ref(&self, lhs: &mut Self::Element, rhs: &Self::Element) {
        debug_assert_eq!(self.N, lhs.data.len());
        debug_assert_eq!(self.N, rhs.data.len());
        for (l, r) in lhs.data.iter_mut().zip(rhs.data.iter()) {
            self.base_ring.sub_assign_ref(l, r);
        }
    }

    fn negate_inplace(&self, lhs: &mut Self::Element) {
        for c in lhs.data.iter_mut() {
            self.base_ring.negate_inplace(c);
        }
    }

    fn mul_assign(&self, lhs: &mut Self::Element, rhs: Self::Element) {
        *lhs = self.mul_ref(lhs, &rhs);
    }

    fn mul_assign_ref(&self, lhs: &mut Self::Element, rhs: &Self::Element) {
        *lhs = self.mul_ref(lhs, rhs);
    }

    fn mul_ref(&self, lhs: &Self::Element, rhs: &Self::Element) -> Self::Element {
        debug_assert_eq!(self.N, lhs.data.len());
        debug_assert_eq!(self.N, rhs.data.len());
        let mut unreduced = Vec::with_capacity(2 * self.N);
        unreduced.resize_with(2 * self.N, || self.base_ring.zero());
        STANDARD_CONVOLUTION.compute_convolution(&lhs.data[..], &rhs.data[..], &mut unreduced[..], &self.base_ring);
        let (lower, upper) = unreduced.split_at_mut(self.N);
        for (l, u) in lower.iter_mut().zip(upper.iter()) {
            self.base_ring.sub_assign_ref(l, u);
        }
        unreduced.truncate(self.N);
        return NegacyclicRingEl { data: unreduced };
    }

    fn zero(&self) -> Self::Element {
        NegacyclicRingEl { data: (0..self.N).map(|_| self.base_ring.zero()).collect() }
    }

    fn from_int(&self, value: i32) -> Self::Element {
        self.from(self.base_ring.int_hom().map(value))
    }

    fn eq_el(&self, lhs: &Self::Element, rhs: &Self::Element) -> bool {
        lhs.data.iter().zip(rhs.data.iter()).all(|(l, r)| self.base_ring.eq_el(l, r))
    }

    fn is_zero(&self, value: &Self::Element) -> bool {
        value.data.iter().all(|c| self.base_ring.is_zero(c))
    }

    fn is_one(&self, value: &Self::Element) -> bool {
        self.base_ring.is_one(&value.data[0]) && value.data[1..].iter().all(|c| self.base_ring.is_zero(c))
    }

    fn is_neg_one(&self, value: &Self::Element) -> bool {
        self.base_ring.is_neg_one(&value.data[0]) && value.data[1..].iter().all(|c| self.base_ring.is_zero(c))
    }

    fn is_commutative(&self) -> bool { true }
    fn is_noetherian(&self) -> bool { true }
    fn is_approximate(&self) -> bool { false }

    fn dbg_within<'a>(&self, value: &Self::Element, out: &mut std::fmt::Formatter<'a>, env: EnvBindingStrength) -> std::fmt::Result {
        let poly_ring = DensePolyRing::new(self.base_ring(), "X");
        poly_ring.get_ring().dbg_within(&RingRef::new(self).poly_repr(&poly_ring, value, &self.base_ring().identity()), out, env)
    }

    fn characteristic<I: RingStore + Copy>(&self, ZZ: I) -> Option<El<I>>
        where I::Type: IntegerRing
    {
        self.base_ring.characteristic(ZZ)
    }
}

impl RingExtension for NegacyclicRingBase {

    type BaseRing = Zn;

    fn base_ring<'a>(&'a self) -> &'a Self::BaseRing {
        &self.base_ring
    }

    fn from(&self, x: El<Self::BaseRing>) -> Self::Element {
        let mut result = self.zero();
        result.data[0] = x;
        return result;
    }

    fn mul_assign_base(&self, lhs: &mut Self::Element, rhs: &El<Self::BaseRing>) {
        for c in lhs.data.iter_mut() {
            self.base_ring.mul_assign_ref(c, rhs);
        }
    }
}

impl FreeAlgebra for NegacyclicRingBase {

    type VectorRepresentation<'a> = CloneElFn<&'a [ZnEl], ZnEl, CloneRingEl<&'a Zn>>
        where Self: 'a;

    fn canonical_gen(&self) -> Self::Element {
        self.monomial(1)
    }

    fn rank(&self) -> usize {
        self.N
    }

    fn wrt_canonical_basis<'a>(&'a self, el: &'a Self::Element) -> Self::VectorRepresentation<'a> {
        (&el.data[..]).clone_ring_els(&self.base_ring)
    }

    fn from_canonical_basis<V>(&self, vec: V) -> Self::Element
        where V: IntoIterator<Item = El<Self::BaseRing>>,
            V::IntoIter: DoubleEndedIterator
    {
        let data = vec.into_iter().collect::<Vec<_>>();
        assert_eq!(self.N, data.len());
        NegacyclicRingEl { data }
    }
}

impl CyclotomicRing for NegacyclicRingBase {

    fn n(&self) -> u64 {
        2 * self.N as u64
    }

    ///
    /// Since `X -> X^g` maps monomials to monomials, this only permutes coefficients and
    /// flips some signs.
    ///
    fn apply_galois_action(&self, x: &Self::Element, g: CyclotomicGaloisGroupEl) -> Self::Element {
        let n = 2 * self.N;
        let g = self.galois_group().representative(g);
        debug_assert!(g % 2 == 1);
        let mut result = self.zero();
        for (i, c) in x.data.iter().enumerate() {
            let target = (i * g) % n;
            if target < self.N {
                result.data[target] = *c;
            } else {
                result.data[target - self.N] = self.base_ring.negate(*c);
            }
        }
        return result;
    }
}

impl SerializableElementRing for NegacyclicRingBase {

    fn serialize<S>(&self, el: &Self::Element, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        SerializableNewtype::new("NegacyclicRingEl", SerializableSeq::new(
            (0..self.N).map_fn(|i| SerializeWithRing::new(&el.data[i], &self.base_ring))
        )).serialize(serializer)
    }

    fn deserialize<'de, D>(&self, deserializer: D) -> Result<Self::Element, D::Error>
        where D: Deserializer<'de>
    {
        let data = DeserializeSeedNewtype::new("NegacyclicRingEl", DeserializeSeedSeq::new(
            std::iter::repeat(DeserializeWithRing::new(&self.base_ring)).take(self.N),
            Vec::with_capacity(self.N),
            |mut current, next| { current.push(next); current }
        )).deserialize(deserializer)?;
        if data.len() != self.N {
            return Err(de::Error::custom(format!("expected {} coefficients, got {}", self.N, data.len())));
        }
        return Ok(NegacyclicRingEl { data });
    }
}

#[cfg(test)]
use feanor_math::assert_el_eq;

#[test]
fn test_ring_axioms() {
    let mut rng = oorandom::Rand64::new(1);
    let ring = NegacyclicRingBase::new(Zn::new(17), 8);
    let mut elements = vec![ring.zero(), ring.one(), ring.neg_one(), ring.canonical_gen(), ring.get_ring().monomial(7), ring.get_ring().monomial(-3)];
    elements.extend((0..4).map(|_| ring.get_ring().random_element(|| rng.rand_u64())));
    feanor_math::ring::generic_tests::test_ring_axioms(&ring, elements.into_iter());
    feanor_math::rings::extension::generic_tests::test_free_algebra_axioms(&ring);
    generic_test_cyclotomic_ring_axioms(&ring);

    let ring = NegacyclicRingBase::new(Zn::new(257), 32);
    feanor_math::rings::extension::generic_tests::test_free_algebra_axioms(&ring);
    generic_test_cyclotomic_ring_axioms(&ring);
}

#[test]
fn test_mul_negacyclic() {
    let ring = NegacyclicRingBase::new(Zn::new(17), 8);
    let X = |i: i64| ring.get_ring().monomial(i);
    assert_el_eq!(ring, ring.negate(X(2)), ring.mul(X(7), X(3)));
    assert_el_eq!(ring, X(-1), ring.negate(X(7)));
    assert_el_eq!(ring, ring.one(), X(16));
    assert_el_eq!(ring, ring.pow(ring.canonical_gen(), 9), ring.negate(X(1)));

    let a = ring.add(X(1), ring.int_hom().map(2));
    let b = ring.sub(X(1), ring.int_hom().map(2));
    assert_el_eq!(ring, ring.sub(X(2), ring.int_hom().map(4)), ring.mul_ref(&a, &b));
}

#[test]
fn test_galois_action_is_homomorphic() {
    let mut rng = oorandom::Rand64::new(1);
    let ring = NegacyclicRingBase::new(Zn::new(97), 16);
    let galois_group = ring.galois_group();
    for g in [3, 5, 31, -1, 17] {
        let g = galois_group.from_representative(g);
        let a = ring.get_ring().random_element(|| rng.rand_u64());
        let b = ring.get_ring().random_element(|| rng.rand_u64());
        assert_el_eq!(ring, ring.mul(ring.apply_galois_action(&a, g), ring.apply_galois_action(&b, g)), ring.apply_galois_action(&ring.mul_ref(&a, &b), g));
        assert_el_eq!(ring, ring.get_ring().monomial(galois_group.representative(g) as i64), ring.apply_galois_action(&ring.canonical_gen(), g));
    }
}

#[test]
fn test_galois_action_composes() {
    let mut rng = oorandom::Rand64::new(1);
    let ring = NegacyclicRingBase::new(Zn::new(97), 16);
    let galois_group = ring.galois_group();
    let g = galois_group.from_representative(5);
    let h = galois_group.from_representative(-3);
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    assert_el_eq!(ring, ring.apply_galois_action(&x, galois_group.mul(g, h)), ring.apply_galois_action(&ring.apply_galois_action(&x, h), g));
    assert_el_eq!(ring, x, ring.apply_galois_action(&ring.apply_galois_action(&x, g), galois_group.invert(g)));
    let images = ring.apply_galois_action_many(&x, &[g, h]);
    assert_el_eq!(ring, ring.apply_galois_action(&x, h), images[1]);
}

#[test]
fn test_embed_into() {
    let mut rng = oorandom::Rand64::new(1);
    let subring = NegacyclicRingBase::new(Zn::new(17), 8);
    let ring = NegacyclicRingBase::new(Zn::new(17), 16);
    let embed = |x: &NegacyclicRingEl| subring.get_ring().embed_into(x, ring.get_ring());
    let a = subring.get_ring().random_element(|| rng.rand_u64());
    let b = subring.get_ring().random_element(|| rng.rand_u64());
    assert_el_eq!(ring, embed(&subring.mul_ref(&a, &b)), ring.mul(embed(&a), embed(&b)));

    // the Galois element 7 of the subring lifts to 7 in the larger ring
    let g_sub = subring.galois_group().from_representative(7);
    let g = ring.galois_group().from_representative(7);
    assert_el_eq!(ring, embed(&subring.apply_galois_action(&a, g_sub)), ring.apply_galois_action(&embed(&a), g));
    // and so does 7 + 16
    let g = ring.galois_group().from_representative(23);
    assert_el_eq!(ring, embed(&subring.apply_galois_action(&a, g_sub)), ring.apply_galois_action(&embed(&a), g));
}

#[test]
fn test_write_read_le() {
    let mut rng = oorandom::Rand64::new(1);
    let ring = NegacyclicRingBase::new(Zn::new(257), 4);
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let mut bytes = Vec::new();
    ring.get_ring().write_le(&x, &mut bytes).unwrap();
    assert_eq!(32, bytes.len());
    assert_el_eq!(ring, x, ring.get_ring().read_le(&bytes[..]).unwrap());

    bytes[0..8].copy_from_slice(&257u64.to_le_bytes());
    assert_eq!(ErrorKind::InvalidData, ring.get_ring().read_le(&bytes[..]).err().unwrap().kind());
    assert_eq!(ErrorKind::UnexpectedEof, ring.get_ring().read_le(&bytes[..20]).err().unwrap().kind());
}

#[test]
fn test_serialize_elements() {
    let mut rng = oorandom::Rand64::new(1);
    let ring = NegacyclicRingBase::new(Zn::new(65537), 16);
    let elements = vec![ring.zero(), ring.one(), ring.get_ring().monomial(5), ring.get_ring().random_element(|| rng.rand_u64())];
    feanor_math::serialization::generic_tests::test_serialization(&ring, elements.into_iter());
}
