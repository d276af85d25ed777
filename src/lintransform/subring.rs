use std::any::Any;
use std::sync::{Arc, OnceLock};

use feanor_math::ring::*;
use feanor_math::rings::extension::*;
use feanor_math::rings::zn::*;
use tracing::instrument;

use crate::cyclotomic::*;
use crate::evaluator::HomomorphicEvaluator;
use crate::lintransform::compiled::*;
use crate::number_ring::negacyclic::*;
use crate::slots::pow2::Pow2SlotRing;
use crate::slots::*;

///
/// A linear transform of a subring `S = Z/tZ[X^k]` of `R = Z/tZ[X]/(X^N + 1)`, where `k` is a power of two,
/// that is applied to elements of `R` that are known to lie in `S`.
///
/// Of course, every transform of `S` can be extended to a transform of `R`, but this requires many more
/// automorphisms. Automorphisms of `R` that only differ by an element of `Gal(R/S)` act in the same way on
/// `S`, so it suffices to apply one of them.
///
/// Elements of `S` are identified with elements of `Z/tZ[Y]/(Y^(N/k) + 1)` via `Y -> X^k`, which is the ring
/// the wrapped [`CompiledLinearTransform`] was compiled for. Its automorphism `Y -> Y^g` then becomes
/// `X -> X^g`, for any lift of `g` to `(Z/2NZ)*`.
///
pub struct CompiledSubringLinearTransform<S: SlotRing = Pow2SlotRing> {
    subring_transform: CompiledLinearTransform<S>,
    slot_ring: Arc<S>,
    /// the stored coefficients of `subring_transform`, mapped into the ring of `slot_ring`
    coefficients: Vec<NegacyclicRingEl>,
    /// the coefficients encoded as plaintexts, filled during the first call to `apply_ciphertext()`
    coefficients_plain: Vec<OnceLock<Box<dyn Any + Send + Sync>>>
}

impl<S: SlotRing> CompiledSubringLinearTransform<S> {

    pub fn new(transform: CompiledLinearTransform<S>, slot_ring: Arc<S>) -> Self {
        let subring = transform.ring();
        let ring = slot_ring.ring();
        assert_eq!(subring.base_ring().modulus(), ring.base_ring().modulus(), "transform and ring must have the same plaintext modulus");
        assert!(ring.rank() % subring.rank() == 0 && (ring.rank() / subring.rank()).is_power_of_two(), "cannot embed {:?} into {:?}", subring, ring);
        let coefficients = transform.stored_coefficients().iter().map(|c| subring.get_ring().embed_into(c, ring.get_ring())).collect::<Vec<_>>();
        Self {
            coefficients_plain: (0..coefficients.len()).map(|_| OnceLock::new()).collect(),
            coefficients: coefficients,
            subring_transform: transform,
            slot_ring: slot_ring
        }
    }

    ///
    /// The transform that maps `x` in `S` to the element of `S` whose first coefficients w.r.t. `Y = X^2` are
    /// the scalar parts of the slots of `x` w.r.t. the slot structure of `S`.
    ///
    /// Requires `N >= 8`, since `S` must have degree at least `4`.
    ///
    #[instrument(skip_all)]
    pub fn slots_to_coeffs(slot_ring: Arc<S>) -> Self {
        assert_subring_transform_supported(&*slot_ring);
        let subring = Arc::new(slot_ring.subring());
        Self::new(CompiledLinearTransform::scalar_slots_to_first_coefficients(subring), slot_ring)
    }

    ///
    /// The inverse of [`CompiledSubringLinearTransform::slots_to_coeffs()`] on its image.
    ///
    #[instrument(skip_all)]
    pub fn coeffs_to_slots(slot_ring: Arc<S>) -> Self {
        assert_subring_transform_supported(&*slot_ring);
        let subring = Arc::new(slot_ring.subring());
        Self::new(CompiledLinearTransform::first_coefficients_to_scalar_slots(subring), slot_ring)
    }

    pub fn slot_ring(&self) -> &Arc<S> {
        &self.slot_ring
    }

    pub fn params(&self) -> &BabyStepGiantStepParams {
        self.subring_transform.params()
    }

    fn lift(&self, g: CyclotomicGaloisGroupEl) -> CyclotomicGaloisGroupEl {
        let subring_galois_group = self.subring_transform.slot_ring().galois_group();
        self.slot_ring.galois_group().from_representative(subring_galois_group.representative(g) as i64)
    }

    fn automorphism(&self, index: usize) -> CyclotomicGaloisGroupEl {
        self.lift(self.subring_transform.automorphism(index))
    }

    #[allow(unused)]
    fn difference_automorphism(&self, from: usize, to: usize) -> CyclotomicGaloisGroupEl {
        self.lift(self.subring_transform.difference_automorphism(from, to))
    }

    #[allow(unused)]
    fn reverse_automorphism(&self, index: usize) -> CyclotomicGaloisGroupEl {
        self.lift(self.subring_transform.reverse_automorphism(index))
    }

    fn babystep_automorphism_count(&self) -> usize {
        self.params().babystep_count()
    }

    fn giantstep_automorphism_count(&self) -> usize {
        self.params().giantstep_count()
    }

    fn baby_step_galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        (0..self.babystep_automorphism_count()).map(|i| self.automorphism(i)).collect()
    }

    fn giant_step_galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        (0..self.giantstep_automorphism_count()).map(|j| self.automorphism(j * self.babystep_automorphism_count())).collect()
    }

    fn is_used(&self, index: usize) -> bool {
        !self.slot_ring.ring().is_zero(&self.coefficients[index])
    }

    ///
    /// The Galois elements of `(Z/2NZ)*` whose automorphisms are applied during evaluation, i.e. for which
    /// key-switching keys are required by [`CompiledSubringLinearTransform::apply_ciphertext()`].
    ///
    pub fn galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        used_galois_elements(&self.slot_ring.galois_group(), self.params(), |i| self.is_used(i), &self.baby_step_galois_elements(), &self.giant_step_galois_elements())
    }

    ///
    /// Applies the transform to `x`, which must lie in the subring `S`. If it does not, the result
    /// is unspecified.
    ///
    #[instrument(skip_all)]
    pub fn evaluate(&self, x: &NegacyclicRingEl) -> NegacyclicRingEl {
        evaluate_bsgs(
            self.slot_ring.ring(),
            self.params(),
            &self.coefficients,
            &self.baby_step_galois_elements(),
            &self.giant_step_galois_elements(),
            x
        )
    }

    fn plaintext_coefficient<'a, E>(&'a self, evaluator: &E, index: usize) -> &'a E::Plaintext
        where E: HomomorphicEvaluator
    {
        self.coefficients_plain[index].get_or_init(|| Box::new(evaluator.encode(self.slot_ring.ring(), &self.coefficients[index])) as Box<dyn Any + Send + Sync>)
            .downcast_ref::<E::Plaintext>()
            .unwrap_or_else(|| panic!("plaintexts were cached by an evaluator with a different plaintext type"))
    }

    ///
    /// Applies the transform to the message encrypted in `ct`, which must lie in the subring `S`.
    ///
    /// The coefficients are encoded on first use and cached, so all calls to this function on the
    /// same object must use evaluators with the same plaintext encoding. The Galois keys must contain
    /// keys for all elements returned by [`CompiledSubringLinearTransform::galois_elements()`].
    ///
    #[instrument(skip_all)]
    pub fn apply_ciphertext<E>(&self, ct: &E::Ciphertext, evaluator: &E, gk: &E::GaloisKeys) -> E::Ciphertext
        where E: HomomorphicEvaluator
    {
        let result = evaluate_bsgs_generic(
            self.params(),
            |i| self.is_used(i),
            &self.baby_step_galois_elements(),
            &self.giant_step_galois_elements(),
            ct,
            |lhs, rhs| evaluator.add(lhs, rhs),
            |x, index| evaluator.multiply_plain(x, self.plaintext_coefficient(evaluator, index)),
            |x, gs| evaluator.apply_automorphism_many(x, gs, gk),
            |x| evaluator.clone_ct(x)
        );
        match result {
            Some(result) => result,
            None => evaluator.multiply_plain(ct, &evaluator.encode(self.slot_ring.ring(), &self.slot_ring.ring().zero()))
        }
    }

    ///
    /// Returns the wrapped transform, which acts on the subring `S`.
    ///
    pub fn transform(self) -> CompiledLinearTransform<S> {
        self.subring_transform
    }
}

///
/// The subring `Z/tZ[X^2]` of a ring of degree `4` has degree `2`, which has no slot structure.
///
fn assert_subring_transform_supported<S: SlotRing>(slot_ring: &S) {
    assert!(slot_ring.ring().rank() >= 8, "subring transforms require a ring of degree at least 8, got {}", slot_ring.ring().rank());
}

#[cfg(test)]
use std::cell::{Cell, RefCell};
#[cfg(test)]
use std::collections::BTreeSet;
#[cfg(test)]
use feanor_math::assert_el_eq;
#[cfg(test)]
use feanor_math::homomorphism::*;
#[cfg(test)]
use feanor_math::seq::*;

///
/// Evaluator on unencrypted values, which records which automorphisms are applied and how often
/// plaintexts are encoded.
///
#[cfg(test)]
struct MockEvaluator {
    ring: NegacyclicRing,
    used_galois_elements: RefCell<BTreeSet<usize>>,
    encode_calls: Cell<usize>
}

#[cfg(test)]
impl MockEvaluator {

    fn new(ring: NegacyclicRing) -> Self {
        Self { ring: ring, used_galois_elements: RefCell::new(BTreeSet::new()), encode_calls: Cell::new(0) }
    }
}

#[cfg(test)]
impl HomomorphicEvaluator for MockEvaluator {

    type Ciphertext = NegacyclicRingEl;
    type Plaintext = NegacyclicRingEl;
    type GaloisKeys = BTreeSet<usize>;

    fn encode(&self, ring: &NegacyclicRing, m: &NegacyclicRingEl) -> Self::Plaintext {
        assert!(self.ring.get_ring() == ring.get_ring());
        self.encode_calls.set(self.encode_calls.get() + 1);
        ring.clone_el(m)
    }

    fn multiply_plain(&self, ct: &Self::Ciphertext, m: &Self::Plaintext) -> Self::Ciphertext {
        self.ring.mul_ref(ct, m)
    }

    fn apply_automorphism(&self, ct: &Self::Ciphertext, g: CyclotomicGaloisGroupEl, keys: &Self::GaloisKeys) -> Self::Ciphertext {
        let g_repr = self.ring.galois_group().representative(g);
        assert!(keys.contains(&g_repr), "missing key for X -> X^{}", g_repr);
        self.used_galois_elements.borrow_mut().insert(g_repr);
        self.ring.apply_galois_action(ct, g)
    }

    fn apply_automorphism_many(&self, ct: &Self::Ciphertext, gs: &[CyclotomicGaloisGroupEl], keys: &Self::GaloisKeys) -> Vec<Self::Ciphertext> {
        for g in gs {
            let g_repr = self.ring.galois_group().representative(*g);
            assert!(keys.contains(&g_repr), "missing key for X -> X^{}", g_repr);
            self.used_galois_elements.borrow_mut().insert(g_repr);
        }
        self.ring.apply_galois_action_many(ct, gs)
    }

    fn add(&self, lhs: Self::Ciphertext, rhs: &Self::Ciphertext) -> Self::Ciphertext {
        let mut result = lhs;
        self.ring.add_assign_ref(&mut result, rhs);
        result
    }

    fn clone_ct(&self, ct: &Self::Ciphertext) -> Self::Ciphertext {
        self.ring.clone_el(ct)
    }
}

#[cfg(test)]
fn galois_keys_for<S: SlotRing>(transform: &CompiledSubringLinearTransform<S>) -> BTreeSet<usize> {
    let galois_group = transform.slot_ring().galois_group();
    transform.galois_elements().into_iter().map(|g| galois_group.representative(g)).collect()
}

#[test]
fn test_slots_to_coeffs_subring() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(32, 17), (32, 97), (64, 17), (32, 7)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let subring = Arc::new(slot_ring.subring());
        let ring = slot_ring.ring();
        let embed = |x: &NegacyclicRingEl| subring.ring().get_ring().embed_into(x, ring.get_ring());
        let slot_algebra = subring.slot_algebra();
        let transform = CompiledSubringLinearTransform::slots_to_coeffs(slot_ring.clone());

        let x = subring.ring().get_ring().random_element(|| rng.rand_u64());
        let x_slots = subring.slot_values(&x);
        let expected = subring.ring().from_canonical_basis((0..(N / 2)).map(|i| if i < subring.slot_count() { slot_algebra.wrt_canonical_basis(&x_slots[i]).at(0) } else { ring.base_ring().zero() }));
        assert_el_eq!(ring, embed(&expected), transform.evaluate(&embed(&x)));

        let unrestricted = CompiledLinearTransform::scalar_slots_to_first_coefficients(subring.clone());
        assert_el_eq!(ring, embed(&unrestricted.evaluate(&x)), transform.evaluate(&embed(&x)));
    }
}

#[test]
fn test_subring_uses_fewer_automorphisms() {
    for (N, t) in [(32, 17), (64, 17)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let transform = CompiledSubringLinearTransform::slots_to_coeffs(slot_ring.clone());
        let full = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());
        assert_eq!(full.params().automorphism_count(), 2 * transform.params().automorphism_count());
        assert!(transform.galois_elements().len() < full.galois_elements().len());

        let transform = CompiledSubringLinearTransform::coeffs_to_slots(slot_ring.clone());
        let full = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone());
        assert!(transform.galois_elements().len() < full.galois_elements().len());
    }
}

#[test]
fn test_coeffs_to_slots_subring() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(32, 17), (32, 97), (64, 17), (32, 23)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let subring = Arc::new(slot_ring.subring());
        let ring = slot_ring.ring();
        let embed = |x: &NegacyclicRingEl| subring.ring().get_ring().embed_into(x, ring.get_ring());
        let slot_algebra = subring.slot_algebra();
        let transform = CompiledSubringLinearTransform::coeffs_to_slots(slot_ring.clone());

        let x = subring.ring().get_ring().random_element(|| rng.rand_u64());
        let coefficients = subring.ring().wrt_canonical_basis(&x);
        let expected = subring.from_slot_values((0..subring.slot_count()).map(|s| slot_algebra.inclusion().map(coefficients.at(s))));
        assert_el_eq!(ring, embed(&expected), transform.evaluate(&embed(&x)));
    }
}

#[test]
fn test_slots_to_coeffs_smallest_ring() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(8, 17));
    let subring = Arc::new(slot_ring.subring());
    let ring = slot_ring.ring();
    let embed = |x: &NegacyclicRingEl| subring.ring().get_ring().embed_into(x, ring.get_ring());
    let transform = CompiledSubringLinearTransform::slots_to_coeffs(slot_ring.clone());
    let unrestricted = CompiledLinearTransform::scalar_slots_to_first_coefficients(subring.clone());
    let x = subring.ring().get_ring().random_element(|| rng.rand_u64());
    assert_el_eq!(ring, embed(&unrestricted.evaluate(&x)), transform.evaluate(&embed(&x)));
}

#[test]
#[should_panic(expected = "subring transforms require a ring of degree at least 8")]
fn test_slots_to_coeffs_degree_four() {
    CompiledSubringLinearTransform::slots_to_coeffs(Arc::new(Pow2SlotRing::new(4, 17)));
}

#[test]
#[should_panic(expected = "subring transforms require a ring of degree at least 8")]
fn test_coeffs_to_slots_degree_four() {
    CompiledSubringLinearTransform::coeffs_to_slots(Arc::new(Pow2SlotRing::new(4, 13)));
}

#[test]
fn test_subring_of_index_four() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(64, 17));
    let subring = Arc::new(Pow2SlotRing::new(16, 17));
    let ring = slot_ring.ring();
    let embed = |x: &NegacyclicRingEl| subring.ring().get_ring().embed_into(x, ring.get_ring());
    let unrestricted = CompiledLinearTransform::first_coefficients_to_scalar_slots(subring.clone());
    let x = subring.ring().get_ring().random_element(|| rng.rand_u64());
    let expected = embed(&unrestricted.evaluate(&x));
    let transform = CompiledSubringLinearTransform::new(unrestricted, slot_ring.clone());
    assert_el_eq!(ring, expected, transform.evaluate(&embed(&x)));
}

#[test]
fn test_apply_ciphertext() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone()).in_ring();
    let evaluator = MockEvaluator::new(ring.clone());
    let keys = galois_keys_for(&transform);

    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let actual = transform.apply_ciphertext(&x, &evaluator, &keys);
    assert_el_eq!(ring, transform.evaluate(&x), actual);
    assert_eq!(keys, *evaluator.used_galois_elements.borrow());

    let encode_calls = evaluator.encode_calls.get();
    assert_eq!((0..transform.params().automorphism_count()).filter(|i| transform.is_used(*i)).count(), encode_calls);
    let y = ring.get_ring().random_element(|| rng.rand_u64());
    let actual = transform.apply_ciphertext(&y, &evaluator, &keys);
    assert_el_eq!(ring, transform.evaluate(&y), actual);
    assert_eq!(encode_calls, evaluator.encode_calls.get());
}

#[test]
fn test_apply_ciphertext_subring() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let subring = slot_ring.subring();
    let ring = slot_ring.ring();
    let transform = CompiledSubringLinearTransform::slots_to_coeffs(slot_ring.clone());
    let evaluator = MockEvaluator::new(ring.clone());
    let keys = galois_keys_for(&transform);

    let x = subring.ring().get_ring().embed_into(&subring.ring().get_ring().random_element(|| rng.rand_u64()), ring.get_ring());
    let actual = transform.apply_ciphertext(&x, &evaluator, &keys);
    assert_el_eq!(ring, transform.evaluate(&x), actual);
    assert_eq!(keys, *evaluator.used_galois_elements.borrow());
}

#[test]
#[should_panic(expected = "missing key")]
fn test_apply_ciphertext_missing_key() {
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 17));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone()).in_ring();
    let evaluator = MockEvaluator::new(ring.clone());
    let mut keys = galois_keys_for(&transform);
    let first = *keys.iter().next().unwrap();
    keys.remove(&first);
    transform.apply_ciphertext(&ring.one(), &evaluator, &keys);
}

#[test]
fn test_apply_ciphertext_zero_transform() {
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 17));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::compile_slot_basis(slot_ring.clone(), |_, _, _| {}, true).in_ring();
    assert_eq!(0, transform.galois_elements().len());
    let evaluator = MockEvaluator::new(ring.clone());
    let result = transform.apply_ciphertext(&ring.one(), &evaluator, &BTreeSet::new());
    assert!(ring.is_zero(&result));
    assert_eq!(0, evaluator.used_galois_elements.borrow().len());
}

#[test]
fn test_in_ring_and_transform() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 97));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());
    let params = *transform.params();
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let expected = transform.evaluate(&x);
    let wrapped = transform.in_ring();
    assert_el_eq!(ring, &expected, wrapped.evaluate(&x));
    let galois_group = slot_ring.galois_group();
    for i in 0..params.automorphism_count() {
        assert!(galois_group.eq_el(wrapped.subring_transform.automorphism(i), wrapped.automorphism(i)));
        assert!(galois_group.eq_el(wrapped.subring_transform.reverse_automorphism(i), wrapped.reverse_automorphism(i)));
        assert!(galois_group.eq_el(wrapped.subring_transform.difference_automorphism(i, 0), wrapped.difference_automorphism(i, 0)));
    }
    let unwrapped = wrapped.transform();
    assert_eq!(&params, unwrapped.params());
    assert_el_eq!(ring, expected, unwrapped.evaluate(&x));
}
