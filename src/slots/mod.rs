use feanor_math::homomorphism::*;
use feanor_math::ring::*;
use feanor_math::rings::extension::extension_impl::FreeAlgebraImpl;
use feanor_math::rings::extension::*;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::seq::*;

use crate::cyclotomic::*;
use crate::number_ring::negacyclic::*;

///
/// Contains [`pow2::Pow2SlotRing`], the slot structure of `Z/p^eZ[X]/(X^N + 1)`.
///
pub mod pow2;

///
/// The ring `S = Z/tZ[zeta]` of values of a single slot, i.e. `Z/tZ[Y]/(f(Y))` where `f` is
/// the minimal polynomial of a primitive `2N`-th root of unity over `Z/tZ`. Its canonical
/// generator is `zeta`.
///
pub type SlotAlgebra = FreeAlgebraImpl<Zn, Vec<ZnEl>>;

///
/// Generators `g1, g2` of a Galois group of the form `<g1> x <g2>`, where `g2` has order 2.
///
#[derive(Debug, Clone, Copy)]
pub struct GaloisGenerators {
    pub g1: CyclotomicGaloisGroupEl,
    pub ord_g1: usize,
    pub g2: CyclotomicGaloisGroupEl
}

///
/// A linear map `x -> sum_i m_i * sigma_(g_i)(x)` built from Galois automorphisms and masks
/// `m_i`, such that it moves the values of slots without changing them.
///
/// The mask `None` stands for `1`.
///
pub struct Rotation {
    terms: Vec<(Option<NegacyclicRingEl>, CyclotomicGaloisGroupEl)>
}

impl Rotation {

    pub fn new(terms: Vec<(Option<NegacyclicRingEl>, CyclotomicGaloisGroupEl)>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[(Option<NegacyclicRingEl>, CyclotomicGaloisGroupEl)] {
        &self.terms
    }

    pub fn apply(&self, ring: &NegacyclicRing, x: &NegacyclicRingEl) -> NegacyclicRingEl {
        let mut result = ring.zero();
        for (mask, g) in &self.terms {
            let image = ring.apply_galois_action(x, *g);
            match mask {
                Some(mask) => ring.add_assign_ref(&mut result, &ring.mul_ref(mask, &image)),
                None => ring.add_assign_ref(&mut result, &image)
            }
        }
        return result;
    }
}

///
/// The automorphism that acts as the `power`-th power of the Frobenius `a -> a^p` on every slot.
///
#[derive(Debug, Clone, Copy)]
pub struct Frobenius {
    power: i64,
    galois_element: CyclotomicGaloisGroupEl
}

impl Frobenius {

    pub fn new(power: i64, galois_element: CyclotomicGaloisGroupEl) -> Self {
        Self { power, galois_element }
    }

    pub fn power(&self) -> i64 {
        self.power
    }

    pub fn galois_element(&self) -> CyclotomicGaloisGroupEl {
        self.galois_element
    }

    pub fn apply(&self, ring: &NegacyclicRing, x: &NegacyclicRingEl) -> NegacyclicRingEl {
        ring.apply_galois_action(x, self.galois_element)
    }
}

///
/// Describes how `R = Z/tZ[X]/(X^N + 1)` decomposes into slots, i.e. the isomorphism
/// ```text
///     R  ->  S x ... x S,    x  ->  (x(zeta^h_0), ..., x(zeta^h_(n - 1)))
/// ```
/// where `S` is the [`SlotAlgebra`], a Galois ring of rank `d` over `Z/tZ` generated by a primitive
/// `2N`-th root of unity `zeta`, and the `h_i` are representatives of `(Z/2NZ)* / <p>`.
///
/// The Galois group then acts on the slots by permuting them (and possibly applying a power of
/// the Frobenius to their values), which is what makes the automorphisms useful for evaluating
/// linear maps on the slots.
///
/// Implementors are shared between many compiled transforms as `Arc<Self>`, and never change
/// after construction.
///
pub trait SlotRing: Send + Sync {

    fn ring(&self) -> &NegacyclicRing;

    fn galois_group(&self) -> CyclotomicGaloisGroup {
        self.ring().galois_group()
    }

    ///
    /// The prime `p` with `t = p^e`.
    ///
    fn prime(&self) -> i64;

    fn slot_algebra(&self) -> &SlotAlgebra;

    ///
    /// The rank `d` of a slot over `Z/tZ`, which is the order of `p` in the Galois group.
    ///
    fn slot_rank(&self) -> usize {
        self.slot_algebra().rank()
    }

    fn slot_count(&self) -> usize;

    ///
    /// The Galois group element `h` such that the given slot is `x -> x(zeta^h)`.
    ///
    fn slot_representative(&self, slot: usize) -> CyclotomicGaloisGroupEl;

    ///
    /// The length of the cycles on which `g1` acts on the slots. Slots `k * lane_len(), ..., (k + 1) * lane_len() - 1`
    /// form the `k`-th lane.
    ///
    fn lane_len(&self) -> usize;

    fn lane_count(&self) -> usize {
        self.slot_count() / self.lane_len()
    }

    ///
    /// Returns generators `g1, g2` of the Galois group if it is of the form `<g1> x <g2>` with
    /// `ord(g2) = 2`. Compilation of transforms is only implemented in this case.
    ///
    fn galois_generators(&self) -> Option<GaloisGenerators>;

    ///
    /// Returns the map that splits the slots into consecutive blocks of length `block_size`,
    /// and rotates each block cyclically by `steps`, i.e. moves the value of the `i`-th slot
    /// of a block to its `(i + steps)`-th slot.
    ///
    fn block_rotate(&self, steps: i64, block_size: usize) -> Rotation;

    fn rotate(&self, steps: i64) -> Rotation {
        self.block_rotate(steps, self.slot_count())
    }

    fn frobenius(&self, power: i64) -> Frobenius {
        let galois_group = self.galois_group();
        Frobenius::new(power, galois_group.pow(galois_group.from_representative(self.prime()), power))
    }

    ///
    /// Returns `zeta^power` as element of the [`SlotAlgebra`].
    ///
    fn zeta_power(&self, power: i64) -> El<SlotAlgebra>;

    fn slot_values(&self, x: &NegacyclicRingEl) -> Vec<El<SlotAlgebra>>;

    fn from_slot_values<I>(&self, values: I) -> NegacyclicRingEl
        where I: IntoIterator<Item = El<SlotAlgebra>>;

    ///
    /// Returns the ring element that has the given value in the given slot, and zero in
    /// all other slots.
    ///
    fn from_slot_value(&self, value: &El<SlotAlgebra>, slot: usize) -> NegacyclicRingEl {
        let slot_algebra = self.slot_algebra();
        self.from_slot_values((0..self.slot_count()).map(|i| if i == slot {
            slot_algebra.clone_el(value)
        } else {
            slot_algebra.zero()
        }))
    }

    ///
    /// The trace of `S` over `Z/tZ`, i.e. `Tr(a) = sum_l pi^l(a)`.
    ///
    fn slot_trace(&self, value: &El<SlotAlgebra>) -> ZnEl {
        self.slot_algebra().trace(self.slot_algebra().clone_el(value))
    }

    ///
    /// The basis `b_0, ..., b_(d - 1)` of `S` with `Tr(zeta^i b_j) = delta_ij`.
    ///
    fn dual_basis(&self) -> &[El<SlotAlgebra>];

    ///
    /// Applies the `power`-th power of the Frobenius to a single slot value.
    ///
    fn slot_frobenius(&self, value: &El<SlotAlgebra>, power: i64) -> El<SlotAlgebra> {
        let slot_algebra = self.slot_algebra();
        let frobenius = self.galois_group().representative(self.frobenius(power).galois_element()) as i64;
        let coordinates = slot_algebra.wrt_canonical_basis(value);
        slot_algebra.sum((0..self.slot_rank()).map(|i| slot_algebra.inclusion().mul_map(self.zeta_power(i as i64 * frobenius), coordinates.at(i))))
    }

    ///
    /// The slot structure of `Z/tZ[X]/(X^(N/2) + 1)`, which is isomorphic to the subring
    /// `Z/tZ[X^2]` of this ring.
    ///
    fn subring(&self) -> Self
        where Self: Sized;
}
