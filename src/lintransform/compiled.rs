use std::collections::HashMap;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::sync::Arc;

use feanor_math::divisibility::DivisibilityRingStore;
use feanor_math::homomorphism::*;
use feanor_math::ring::*;
use feanor_math::rings::extension::*;
use feanor_math::rings::zn::zn_64::*;
use feanor_math::rings::zn::*;
use feanor_math::seq::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cyclotomic::*;
use crate::lintransform::frobenius::compile_frobenius;
use crate::lintransform::subring::CompiledSubringLinearTransform;
use crate::lintransform::NegacyclicPowerTable;
use crate::number_ring::negacyclic::*;
use crate::slots::pow2::Pow2SlotRing;
use crate::slots::*;

///
/// Cost of an automorphism applied to a giant step sum, relative to a hoisted baby step.
///
const UNHOISTED_AUTO_COUNT_OVERHEAD: usize = 3;

///
/// Describes which automorphisms a [`CompiledLinearTransform`] uses, and how they are split
/// into baby steps and giant steps.
///
/// The automorphisms are indexed by `i` in `[0, g1_subgroup_order * g2_subgroup_order)`, where `i`
/// refers to `g1^(i mod ord(g1)) * g2^(i div ord(g1))`. The index `i` is written as `i = j * b + k` with
/// `0 <= k < b` for the number of baby steps `b`, and since `b` divides `ord(g1)` (or `b` is
/// the total number of automorphisms), the `i`-th automorphism is the composition of the
/// `(j * b)`-th automorphism (the giant step) and the `k`-th automorphism (the baby step).
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BabyStepGiantStepParams {
    g1_subgroup_order: usize,
    g2_subgroup_order: usize,
    babystep_count: usize
}

impl BabyStepGiantStepParams {

    pub fn new(g1_subgroup_order: usize, use_g2: bool, babystep_count: usize) -> Self {
        let result = Self {
            g1_subgroup_order: g1_subgroup_order,
            g2_subgroup_order: if use_g2 { 2 } else { 1 },
            babystep_count: babystep_count
        };
        assert!(result.is_valid(), "{} baby steps are not compatible with a subgroup of order {} x {}", babystep_count, result.g1_subgroup_order, result.g2_subgroup_order);
        return result;
    }

    ///
    /// Chooses the number of baby steps that minimizes the cost of evaluating the transform,
    /// assuming that all automorphisms are used.
    ///
    pub fn with_optimal_babysteps(g1_subgroup_order: usize, use_g2: bool) -> Self {
        let automorphism_count = g1_subgroup_order * if use_g2 { 2 } else { 1 };
        let babystep_count = (1..=automorphism_count)
            .filter(|babysteps| Self::babystep_count_valid(g1_subgroup_order, automorphism_count, *babysteps))
            .min_by_key(|babysteps| (babysteps - 1) + (automorphism_count / babysteps - 1) * UNHOISTED_AUTO_COUNT_OVERHEAD)
            .unwrap();
        return Self::new(g1_subgroup_order, use_g2, babystep_count);
    }

    fn babystep_count_valid(g1_subgroup_order: usize, automorphism_count: usize, babystep_count: usize) -> bool {
        babystep_count > 0 && (babystep_count == automorphism_count || g1_subgroup_order % babystep_count == 0)
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.g1_subgroup_order > 0 &&
            (self.g2_subgroup_order == 1 || self.g2_subgroup_order == 2) &&
            Self::babystep_count_valid(self.g1_subgroup_order, self.automorphism_count(), self.babystep_count)
    }

    pub fn g1_subgroup_order(&self) -> usize {
        self.g1_subgroup_order
    }

    pub fn g2_subgroup_order(&self) -> usize {
        self.g2_subgroup_order
    }

    pub fn uses_g2(&self) -> bool {
        self.g2_subgroup_order == 2
    }

    pub fn automorphism_count(&self) -> usize {
        self.g1_subgroup_order * self.g2_subgroup_order
    }

    pub fn babystep_count(&self) -> usize {
        self.babystep_count
    }

    pub fn giantstep_count(&self) -> usize {
        self.automorphism_count() / self.babystep_count
    }
}

///
/// The map from automorphism indices to Galois group elements, see [`BabyStepGiantStepParams`].
///
#[derive(Clone, Copy)]
pub(crate) struct AutomorphismIndexing {
    galois_group: CyclotomicGaloisGroup,
    g1: CyclotomicGaloisGroupEl,
    g2: CyclotomicGaloisGroupEl,
    params: BabyStepGiantStepParams
}

impl AutomorphismIndexing {

    pub(crate) fn new<S: SlotRing>(slot_ring: &S, params: BabyStepGiantStepParams) -> Self {
        let generators = slot_ring.galois_generators().unwrap_or_else(|| panic!("compiling linear transforms is only supported if the Galois group is of the form <g1> x <g2>"));
        assert_eq!(generators.ord_g1, params.g1_subgroup_order(), "only transforms using all powers of g1 are supported");
        Self {
            galois_group: slot_ring.galois_group(),
            g1: generators.g1,
            g2: generators.g2,
            params: params
        }
    }

    pub(crate) fn params(&self) -> &BabyStepGiantStepParams {
        &self.params
    }

    pub(crate) fn galois_group(&self) -> &CyclotomicGaloisGroup {
        &self.galois_group
    }

    pub(crate) fn automorphism(&self, index: usize) -> CyclotomicGaloisGroupEl {
        assert!(index < self.params.automorphism_count());
        let g1_power = index % self.params.g1_subgroup_order();
        let g2_power = index / self.params.g1_subgroup_order();
        self.galois_group.mul(self.galois_group.pow(self.g1, g1_power as i64), self.galois_group.pow(self.g2, g2_power as i64))
    }

    pub(crate) fn giantstep_index(&self, index: usize) -> usize {
        index - index % self.params.babystep_count()
    }

    pub(crate) fn automorphism_indices(&self) -> HashMap<usize, usize> {
        (0..self.params.automorphism_count()).map(|i| (self.galois_group.representative(self.automorphism(i)), i)).collect()
    }
}

///
/// A linear transform during compilation, i.e. before [`LinearTransformBuilder::fix_coefficient_shift()`]
/// has been called. It stores the coefficients `c_i` of the transform `x -> sum_i c_i sigma_i(x)`,
/// where `sigma_i` is the `i`-th automorphism.
///
pub struct LinearTransformBuilder<S: SlotRing = Pow2SlotRing> {
    slot_ring: Arc<S>,
    indexing: AutomorphismIndexing,
    automorphism_indices: HashMap<usize, usize>,
    coefficients: Vec<NegacyclicRingEl>
}

impl<S: SlotRing> LinearTransformBuilder<S> {

    ///
    /// Creates the builder for the zero transform.
    ///
    pub fn new(slot_ring: Arc<S>, params: BabyStepGiantStepParams) -> Self {
        let indexing = AutomorphismIndexing::new(&*slot_ring, params);
        let coefficients = (0..params.automorphism_count()).map(|_| slot_ring.ring().zero()).collect();
        Self {
            automorphism_indices: indexing.automorphism_indices(),
            indexing: indexing,
            coefficients: coefficients,
            slot_ring: slot_ring
        }
    }

    pub fn params(&self) -> &BabyStepGiantStepParams {
        self.indexing.params()
    }

    pub fn slot_ring(&self) -> &Arc<S> {
        &self.slot_ring
    }

    ///
    /// Changes the current transform `f` to `x -> f(x) + scaling * rotation(frobenius(x))`.
    ///
    /// All automorphisms in `rotation`, composed with `frobenius`, must be within the subgroup
    /// of automorphisms this transform uses.
    ///
    pub fn add_scaled_transform(&mut self, scaling: &NegacyclicRingEl, rotation: &Rotation, frobenius: &Frobenius) {
        let ring = self.slot_ring.ring();
        let galois_group = self.indexing.galois_group();
        for (mask, g) in rotation.terms() {
            let automorphism = galois_group.representative(galois_group.mul(*g, frobenius.galois_element()));
            let index = *self.automorphism_indices.get(&automorphism).unwrap_or_else(|| panic!("automorphism X -> X^{} is not in the subgroup used by this transform", automorphism));
            match mask {
                Some(mask) => ring.add_assign_ref(&mut self.coefficients[index], &ring.mul_ref(scaling, mask)),
                None => ring.add_assign_ref(&mut self.coefficients[index], scaling)
            }
        }
    }

    ///
    /// Finishes the compilation.
    ///
    /// When evaluating `sum_i c_i sigma_i(x)` with baby steps and giant steps, every term
    /// `c_(j b + k) sigma_(j b + k)(x)` is computed as `sigma_(j b)(c' sigma_k(x))`, thus we store
    /// `c' = sigma_(j b)^-1(c_(j b + k))` instead of `c_(j b + k)`.
    ///
    #[instrument(skip_all)]
    pub fn fix_coefficient_shift(self) -> CompiledLinearTransform<S> {
        let ring = self.slot_ring.ring();
        let indexing = self.indexing;
        let coefficients = self.coefficients.into_iter().enumerate().map(|(i, c)| {
            let giantstep_index = indexing.giantstep_index(i);
            if giantstep_index == 0 || ring.is_zero(&c) {
                c
            } else {
                ring.apply_galois_action(&c, indexing.galois_group().invert(indexing.automorphism(giantstep_index)))
            }
        }).collect();
        return CompiledLinearTransform {
            slot_ring: self.slot_ring,
            indexing: indexing,
            coefficients: coefficients
        };
    }
}

///
/// A linear transform `x -> sum_i c_i sigma_i(x)` of [`NegacyclicRing`], where `sigma_i` runs through
/// a subgroup of the Galois group, ready to be evaluated using the baby-step giant-step approach.
///
/// Usually created by [`CompiledLinearTransform::compile_slot_basis()`], from the description of
/// a linear map on the slots.
///
pub struct CompiledLinearTransform<S: SlotRing = Pow2SlotRing> {
    slot_ring: Arc<S>,
    indexing: AutomorphismIndexing,
    /// the `i`-th entry is `sigma_(j b)^-1(c_i)`, where `j b` is the giant step belonging to `i`
    coefficients: Vec<NegacyclicRingEl>
}

impl<S: SlotRing> CompiledLinearTransform<S> {

    ///
    /// Creates a transform from the coefficients as they are stored, i.e. after the shift
    /// by the inverse giant steps.
    ///
    pub(crate) fn from_stored_coefficients(slot_ring: Arc<S>, params: BabyStepGiantStepParams, coefficients: Vec<NegacyclicRingEl>) -> Self {
        assert_eq!(params.automorphism_count(), coefficients.len());
        Self {
            indexing: AutomorphismIndexing::new(&*slot_ring, params),
            slot_ring: slot_ring,
            coefficients: coefficients
        }
    }

    pub(crate) fn stored_coefficients(&self) -> &[NegacyclicRingEl] {
        &self.coefficients
    }

    pub fn slot_ring(&self) -> &Arc<S> {
        &self.slot_ring
    }

    pub fn ring(&self) -> &NegacyclicRing {
        self.slot_ring.ring()
    }

    pub fn params(&self) -> &BabyStepGiantStepParams {
        self.indexing.params()
    }

    ///
    /// The automorphism `sigma_i` belonging to the `i`-th coefficient.
    ///
    pub fn automorphism(&self, index: usize) -> CyclotomicGaloisGroupEl {
        self.indexing.automorphism(index)
    }

    ///
    /// Returns `sigma_from^-1 sigma_to`.
    ///
    pub fn difference_automorphism(&self, from: usize, to: usize) -> CyclotomicGaloisGroupEl {
        let galois_group = self.indexing.galois_group();
        galois_group.mul(galois_group.invert(self.automorphism(from)), self.automorphism(to))
    }

    ///
    /// Returns `sigma_i^-1`.
    ///
    pub fn reverse_automorphism(&self, index: usize) -> CyclotomicGaloisGroupEl {
        self.indexing.galois_group().invert(self.automorphism(index))
    }

    pub fn g1_subgroup_order(&self) -> usize {
        self.params().g1_subgroup_order()
    }

    pub fn g2_subgroup_order(&self) -> usize {
        self.params().g2_subgroup_order()
    }

    pub fn babystep_automorphism_count(&self) -> usize {
        self.params().babystep_count()
    }

    pub fn giantstep_automorphism_count(&self) -> usize {
        self.params().giantstep_count()
    }

    ///
    /// Returns the coefficient `c_i` of `sigma_i` in `x -> sum_i c_i sigma_i(x)`.
    ///
    pub fn coefficient(&self, index: usize) -> NegacyclicRingEl {
        let giantstep_index = self.indexing.giantstep_index(index);
        if giantstep_index == 0 {
            self.ring().clone_el(&self.coefficients[index])
        } else {
            self.ring().apply_galois_action(&self.coefficients[index], self.difference_automorphism(0, giantstep_index))
        }
    }

    pub fn baby_step_galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        (0..self.babystep_automorphism_count()).map(|i| self.automorphism(i)).collect()
    }

    pub fn giant_step_galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        (0..self.giantstep_automorphism_count()).map(|j| self.automorphism(j * self.babystep_automorphism_count())).collect()
    }

    ///
    /// The Galois elements of all automorphisms that are applied during [`CompiledLinearTransform::evaluate()`],
    /// sorted by their representative. The identity is never applied.
    ///
    pub fn galois_elements(&self) -> Vec<CyclotomicGaloisGroupEl> {
        used_galois_elements(self.indexing.galois_group(), self.params(), |i| !self.ring().is_zero(&self.coefficients[i]), &self.baby_step_galois_elements(), &self.giant_step_galois_elements())
    }

    ///
    /// Evaluates the transform on `input`, with baby steps and giant steps computed in parallel.
    ///
    #[instrument(skip_all)]
    pub fn evaluate(&self, input: &NegacyclicRingEl) -> NegacyclicRingEl {
        evaluate_bsgs(
            self.ring(),
            self.params(),
            &self.coefficients,
            &self.baby_step_galois_elements(),
            &self.giant_step_galois_elements(),
            input
        )
    }

    ///
    /// Evaluates the transform as `sum_i c_i sigma_i(x)`, without using baby steps and giant steps.
    ///
    pub fn evaluate_naive(&self, input: &NegacyclicRingEl) -> NegacyclicRingEl {
        let ring = self.ring();
        let mut result = ring.zero();
        for i in 0..self.params().automorphism_count() {
            let c = self.coefficient(i);
            if !ring.is_zero(&c) {
                ring.add_assign_ref(&mut result, &ring.mul_ref(&c, &ring.apply_galois_action(input, self.automorphism(i))));
            }
        }
        return result;
    }

    ///
    /// Compiles the linear transform `M` of the slots given blockwise by `matrix`, choosing the number
    /// of baby steps to minimize the evaluation cost.
    ///
    /// If `use_g2` is set, the whole slot vector forms a single block. Otherwise, each lane (see
    /// [`SlotRing::lane_len()`]) is a block, and the same transform is applied to every block. This
    /// requires that the Frobenius is a power of `g1`. Within a block, `matrix(m, row, col)` should fill `m` with the nonzero
    /// entries `(i, j) -> a_ij` of the `d x d` matrix that describes how the value of slot `col` contributes
    /// to slot `row`, i.e. the result in slot `row` is
    /// ```text
    ///     sum_col sum_(i, j) a_ij x_(col, j) zeta^i
    /// ```
    /// where `x_(col, j)` is the `j`-th coordinate of slot `col` w.r.t. `1, zeta, ..., zeta^(d - 1)`.
    ///
    pub fn compile_slot_basis<F>(slot_ring: Arc<S>, matrix: F, use_g2: bool) -> Self
        where F: FnMut(&mut HashMap<(usize, usize), ZnEl>, usize, usize)
    {
        let generators = slot_ring.galois_generators().unwrap_or_else(|| panic!("compiling linear transforms is only supported if the Galois group is of the form <g1> x <g2>"));
        let params = BabyStepGiantStepParams::with_optimal_babysteps(generators.ord_g1, use_g2);
        Self::compile_slot_basis_with_params(slot_ring, matrix, params)
    }

    ///
    /// Same as [`CompiledLinearTransform::compile_slot_basis()`], but uses the given baby-step giant-step
    /// parameters.
    ///
    #[instrument(skip_all)]
    pub fn compile_slot_basis_with_params<F>(slot_ring: Arc<S>, mut matrix: F, params: BabyStepGiantStepParams) -> Self
        where F: FnMut(&mut HashMap<(usize, usize), ZnEl>, usize, usize)
    {
        let ring = slot_ring.ring();
        let base_ring = ring.base_ring();
        let d = slot_ring.slot_rank();
        let galois_group = slot_ring.galois_group();
        let generators = slot_ring.galois_generators().unwrap_or_else(|| panic!("compiling linear transforms is only supported if the Galois group is of the form <g1> x <g2>"));
        let frobenius_in_g1 = (0..generators.ord_g1).any(|i| galois_group.eq_el(galois_group.pow(generators.g1, i as i64), slot_ring.frobenius(1).galois_element()));
        assert!(params.uses_g2() || frobenius_in_g1, "the Frobenius X -> X^{} is not a power of g1, so transforms must use g2", slot_ring.prime());
        let block_size = if params.uses_g2() { slot_ring.slot_count() } else { slot_ring.lane_len() };

        let rotations = (0..block_size).map(|i| slot_ring.block_rotate(i as i64, block_size)).collect::<Vec<_>>();
        let lane_switch = if !params.uses_g2() && slot_ring.lane_count() == 2 { Some(slot_ring.rotate(block_size as i64)) } else { None };
        let frobenius = (0..d).map(|l| slot_ring.frobenius(l as i64)).collect::<Vec<_>>();
        let powertable = NegacyclicPowerTable::for_first_slot(&*slot_ring);

        let mut builder = LinearTransformBuilder::new(slot_ring.clone(), params);
        let mut block = HashMap::new();
        for s in 0..block_size {
            for j in 0..block_size {
                let block_col = (j + block_size - s) % block_size;
                block.clear();
                matrix(&mut block, j, block_col);
                if block.values().all(|entry| base_ring.is_zero(entry)) {
                    continue;
                }
                let frobenius_coefficients = compile_frobenius(&block, &*slot_ring, &powertable);
                for (l, c) in frobenius_coefficients.into_iter().enumerate() {
                    if ring.is_zero(&c) {
                        continue;
                    }
                    let coefficient = rotations[j].apply(ring, &c);
                    builder.add_scaled_transform(&coefficient, &rotations[s], &frobenius[l]);
                    if let Some(lane_switch) = &lane_switch {
                        builder.add_scaled_transform(&lane_switch.apply(ring, &coefficient), &rotations[s], &frobenius[l]);
                    }
                }
            }
        }
        return builder.fix_coefficient_shift();
    }

    ///
    /// The transform that maps `x` to the element whose `i`-th coefficient is the scalar part of
    /// the `i`-th slot of `x`, for `i < slot_count()`. All other coefficients are zero.
    ///
    #[instrument(skip_all)]
    pub fn scalar_slots_to_first_coefficients(slot_ring: Arc<S>) -> Self {
        let galois_group = slot_ring.galois_group();
        let slot_algebra = slot_ring.slot_algebra();
        let slot_representatives = (0..slot_ring.slot_count()).map(|s| galois_group.representative(slot_ring.slot_representative(s)) as i64).collect::<Vec<_>>();
        Self::compile_slot_basis(slot_ring.clone(), |block, row, col| {
            // the value of `X^col` in slot `row` is `zeta^(col * h_row)`
            let value = slot_ring.zeta_power(col as i64 * slot_representatives[row]);
            let value = slot_algebra.wrt_canonical_basis(&value);
            for i in 0..value.len() {
                block.insert((i, 0), value.at(i));
            }
        }, true)
    }

    ///
    /// The transform that maps `x` to the element whose `i`-th slot contains the scalar `a_i`, where
    /// `a_i` is the `i`-th coefficient of `x`. Coefficients `a_i` with `i >= slot_count()` are ignored.
    ///
    #[instrument(skip_all)]
    pub fn first_coefficients_to_scalar_slots(slot_ring: Arc<S>) -> Self {
        let ring = slot_ring.ring();
        let base_ring = *ring.base_ring();
        let galois_group = slot_ring.galois_group();
        let slot_representatives = (0..slot_ring.slot_count()).map(|s| galois_group.representative(slot_ring.slot_representative(s)) as i64).collect::<Vec<_>>();
        let N_inv = base_ring.invert(&base_ring.int_hom().map(ring.rank() as i32)).unwrap_or_else(|| panic!("N = {} is not invertible modulo {}", ring.rank(), base_ring.modulus()));
        Self::compile_slot_basis(slot_ring.clone(), |block, row, col| {
            // we have `a_row = 1/N sum_col Tr(x_col zeta^(-row h_col))`, and `x_col = sum_j x_(col, j) zeta^j`
            for j in 0..slot_ring.slot_rank() {
                let trace = slot_ring.slot_trace(&slot_ring.zeta_power(j as i64 - row as i64 * slot_representatives[col]));
                block.insert((0, j), base_ring.mul(trace, N_inv));
            }
        }, true)
    }

    ///
    /// Writes the coefficients `c_i` of `x -> sum_i c_i sigma_i(x)`, in the order of the automorphism
    /// indices, as little-endian `u64`s. The written data does not depend on the number of baby steps.
    /// The parameters are not written, and have to be passed to [`CompiledLinearTransform::load_binary()`].
    ///
    #[instrument(skip_all)]
    pub fn save_binary<W: Write>(&self, writer: W) -> std::io::Result<()> {
        let mut writer = BufWriter::new(writer);
        for i in 0..self.params().automorphism_count() {
            self.ring().get_ring().write_le(&self.coefficient(i), &mut writer)?;
        }
        writer.flush()
    }

    ///
    /// Reads a transform written by [`CompiledLinearTransform::save_binary()`]. The parameters may use a
    /// different number of baby steps than the saved transform, but must refer to the same automorphisms.
    /// Parameters that do not fit the Galois group of `slot_ring` are rejected with [`ErrorKind::InvalidInput`].
    ///
    #[instrument(skip_all)]
    pub fn load_binary<R: Read>(slot_ring: Arc<S>, params: BabyStepGiantStepParams, reader: R) -> std::io::Result<Self> {
        let ord_g1 = slot_ring.galois_generators().map(|generators| generators.ord_g1);
        if !params.is_valid() || ord_g1 != Some(params.g1_subgroup_order()) {
            return Err(std::io::Error::new(ErrorKind::InvalidInput, format!("parameters {:?} do not match the Galois group {:?}, expected g1 of order {:?}", params, slot_ring.galois_group(), ord_g1)));
        }
        let mut reader = BufReader::new(reader);
        let coefficients = (0..params.automorphism_count()).map(|_| slot_ring.ring().get_ring().read_le(&mut reader)).collect::<Result<Vec<_>, _>>()?;
        let mut builder = LinearTransformBuilder::new(slot_ring, params);
        builder.coefficients = coefficients;
        return Ok(builder.fix_coefficient_shift());
    }

    ///
    /// Returns this transform as [`CompiledSubringLinearTransform`] acting on the ring it was
    /// compiled for, which can be applied to ciphertexts.
    ///
    pub fn in_ring(self) -> CompiledSubringLinearTransform<S> {
        let slot_ring = self.slot_ring.clone();
        CompiledSubringLinearTransform::new(self, slot_ring)
    }
}

pub(crate) fn used_galois_elements<F>(galois_group: &CyclotomicGaloisGroup, params: &BabyStepGiantStepParams, is_used: F, baby_step_galois_elements: &[CyclotomicGaloisGroupEl], giant_step_galois_elements: &[CyclotomicGaloisGroupEl]) -> Vec<CyclotomicGaloisGroupEl>
    where F: Fn(usize) -> bool
{
    let babystep_count = params.babystep_count();
    let giantstep_count = params.giantstep_count();
    let mut result = Vec::new();
    for i in 1..babystep_count {
        if (0..giantstep_count).any(|j| is_used(j * babystep_count + i)) {
            result.push(baby_step_galois_elements[i]);
        }
    }
    for j in 1..giantstep_count {
        if (0..babystep_count).any(|i| is_used(j * babystep_count + i)) {
            result.push(giant_step_galois_elements[j]);
        }
    }
    result.sort_unstable_by_key(|g| galois_group.representative(*g));
    result.dedup_by(|g, h| galois_group.eq_el(*g, *h));
    return result;
}

///
/// Computes `sum_j sigma_(G_j)(sum_i c_(j b + i) sigma_(B_i)(x))` for the baby steps `B_i` and giant steps `G_j`,
/// skipping zero coefficients. Both the baby steps and the giant steps are computed in parallel.
///
pub(crate) fn evaluate_bsgs(ring: &NegacyclicRing, params: &BabyStepGiantStepParams, coefficients: &[NegacyclicRingEl], baby_step_galois_elements: &[CyclotomicGaloisGroupEl], giant_step_galois_elements: &[CyclotomicGaloisGroupEl], input: &NegacyclicRingEl) -> NegacyclicRingEl {
    let babystep_count = params.babystep_count();
    let giantstep_count = params.giantstep_count();
    let is_used = |i: usize| !ring.is_zero(&coefficients[i]);

    let baby_steps = (0..babystep_count).into_par_iter().map(|i| if !(0..giantstep_count).any(|j| is_used(j * babystep_count + i)) {
        None
    } else if i == 0 {
        Some(ring.clone_el(input))
    } else {
        Some(ring.apply_galois_action(input, baby_step_galois_elements[i]))
    }).collect::<Vec<_>>();

    (0..giantstep_count).into_par_iter().filter_map(|j| {
        let mut giant_step_result: Option<NegacyclicRingEl> = None;
        for (i, x) in baby_steps.iter().enumerate() {
            let index = j * babystep_count + i;
            if let (Some(x), true) = (x, is_used(index)) {
                let summand = ring.mul_ref(&coefficients[index], x);
                match &mut giant_step_result {
                    Some(current) => ring.add_assign_ref(current, &summand),
                    None => giant_step_result = Some(summand)
                }
            }
        }
        giant_step_result.map(|result| if j == 0 { result } else { ring.apply_galois_action(&result, giant_step_galois_elements[j]) })
    }).reduce(|| ring.zero(), |lhs, rhs| ring.add(lhs, rhs))
}

///
/// Same as [`evaluate_bsgs()`], but sequential and for any type that supports the required operations. The
/// baby steps are requested from `apply_galois_fn` all at once, so they can be hoisted.
///
/// Returns `None` if all coefficients are zero.
///
pub(crate) fn evaluate_bsgs_generic<T, UsedFn, AddFn, ScaleFn, ApplyGaloisFn, CloneFn>(
    params: &BabyStepGiantStepParams,
    is_used: UsedFn,
    baby_step_galois_elements: &[CyclotomicGaloisGroupEl],
    giant_step_galois_elements: &[CyclotomicGaloisGroupEl],
    input: &T,
    mut add_fn: AddFn,
    mut scale_fn: ScaleFn,
    mut apply_galois_fn: ApplyGaloisFn,
    mut clone_fn: CloneFn
) -> Option<T>
    where UsedFn: Fn(usize) -> bool,
        AddFn: FnMut(T, &T) -> T,
        ScaleFn: FnMut(&T, usize) -> T,
        ApplyGaloisFn: FnMut(&T, &[CyclotomicGaloisGroupEl]) -> Vec<T>,
        CloneFn: FnMut(&T) -> T
{
    let babystep_count = params.babystep_count();
    let giantstep_count = params.giantstep_count();
    let used_babysteps = (0..babystep_count).filter(|i| (0..giantstep_count).any(|j| is_used(j * babystep_count + i))).collect::<Vec<_>>();

    let hoisted_galois_elements = used_babysteps.iter().filter(|i| **i != 0).map(|i| baby_step_galois_elements[*i]).collect::<Vec<_>>();
    let mut hoisted_results = apply_galois_fn(input, &hoisted_galois_elements).into_iter();
    assert_eq!(hoisted_galois_elements.len(), hoisted_results.len());
    let mut baby_steps = (0..babystep_count).map(|_| None).collect::<Vec<Option<T>>>();
    for i in &used_babysteps {
        baby_steps[*i] = Some(if *i == 0 { clone_fn(input) } else { hoisted_results.next().unwrap() });
    }

    let mut result: Option<T> = None;
    for j in 0..giantstep_count {
        let mut giant_step_result: Option<T> = None;
        for (i, x) in baby_steps.iter().enumerate() {
            let index = j * babystep_count + i;
            if let (Some(x), true) = (x, is_used(index)) {
                let summand = scale_fn(x, index);
                giant_step_result = Some(match giant_step_result {
                    Some(current) => add_fn(current, &summand),
                    None => summand
                });
            }
        }
        if let Some(giant_step_result) = giant_step_result {
            let summand = if j == 0 {
                giant_step_result
            } else {
                let mut summand = apply_galois_fn(&giant_step_result, &[giant_step_galois_elements[j]]);
                assert_eq!(1, summand.len());
                summand.pop().unwrap()
            };
            result = Some(match result {
                Some(current) => add_fn(current, &summand),
                None => summand
            });
        }
    }
    return result;
}

#[cfg(test)]
use feanor_math::rings::finite::FiniteRingStore;
#[cfg(test)]
use feanor_math::assert_el_eq;

#[cfg(test)]
fn random_block_matrices(slot_ring: &Pow2SlotRing, block_size: usize, rng: &mut oorandom::Rand64) -> HashMap<(usize, usize), HashMap<(usize, usize), ZnEl>> {
    let base_ring = slot_ring.ring().base_ring();
    let d = slot_ring.slot_rank();
    let mut result = HashMap::new();
    for row in 0..block_size {
        for col in 0..block_size {
            // leave some blocks empty
            if rng.rand_u64() % 4 == 0 {
                continue;
            }
            let mut block = HashMap::new();
            for _ in 0..d {
                block.insert(((rng.rand_u64() % d as u64) as usize, (rng.rand_u64() % d as u64) as usize), base_ring.random_element(|| rng.rand_u64()));
            }
            result.insert((row, col), block);
        }
    }
    return result;
}

#[cfg(test)]
fn apply_block_matrices(slot_ring: &Pow2SlotRing, matrices: &HashMap<(usize, usize), HashMap<(usize, usize), ZnEl>>, block_size: usize, input: &[El<SlotAlgebra>]) -> Vec<El<SlotAlgebra>> {
    let slot_algebra = slot_ring.slot_algebra();
    let base_ring = slot_algebra.base_ring();
    let d = slot_ring.slot_rank();
    let mut result = (0..slot_ring.slot_count()).map(|_| (0..d).map(|_| base_ring.zero()).collect::<Vec<_>>()).collect::<Vec<_>>();
    for block_start in (0..slot_ring.slot_count()).step_by(block_size) {
        for ((row, col), block) in matrices {
            let input_value = slot_algebra.wrt_canonical_basis(&input[block_start + col]);
            for ((i, j), entry) in block {
                base_ring.add_assign(&mut result[block_start + row][*i], base_ring.mul_ref_snd(input_value.at(*j), entry));
            }
        }
    }
    return result.into_iter().map(|value| slot_algebra.from_canonical_basis(value)).collect();
}

#[cfg(test)]
fn assert_slots_eq(slot_ring: &Pow2SlotRing, expected: &[El<SlotAlgebra>], actual: &[El<SlotAlgebra>]) {
    assert_eq!(expected.len(), actual.len());
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert_el_eq!(slot_ring.slot_algebra(), e, a);
    }
}

#[cfg(test)]
fn compile_block_matrices(slot_ring: &Arc<Pow2SlotRing>, matrices: &HashMap<(usize, usize), HashMap<(usize, usize), ZnEl>>, params: BabyStepGiantStepParams) -> CompiledLinearTransform {
    CompiledLinearTransform::compile_slot_basis_with_params(slot_ring.clone(), |block, row, col| {
        if let Some(matrix) = matrices.get(&(row, col)) {
            block.extend(matrix.iter().map(|(k, v)| (*k, *v)));
        }
    }, params)
}

#[test]
fn test_babystep_giantstep_params() {
    let params = BabyStepGiantStepParams::with_optimal_babysteps(8, true);
    assert_eq!(16, params.automorphism_count());
    assert_eq!(8, params.babystep_count());
    assert_eq!(2, params.giantstep_count());

    let params = BabyStepGiantStepParams::with_optimal_babysteps(32, true);
    assert_eq!(16, params.babystep_count());
    assert_eq!(4, params.giantstep_count());

    let params = BabyStepGiantStepParams::new(8, true, 16);
    assert_eq!(1, params.giantstep_count());
    assert!(params.is_valid());
}

#[test]
#[should_panic]
fn test_babystep_giantstep_params_invalid() {
    BabyStepGiantStepParams::new(8, true, 3);
}

#[test]
fn test_automorphism_indexing() {
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let galois_group = slot_ring.galois_group();
    let transform = CompiledLinearTransform::compile_slot_basis(slot_ring.clone(), |block, row, col| if row == col {
        block.insert((0, 0), slot_ring.ring().base_ring().one());
    }, true);
    assert_eq!(16, transform.g1_subgroup_order());
    assert_eq!(2, transform.g2_subgroup_order());
    assert_eq!(32, transform.babystep_automorphism_count() * transform.giantstep_automorphism_count());

    assert!(galois_group.is_identity(transform.automorphism(0)));
    assert_eq!(25, galois_group.representative(transform.automorphism(2)));
    assert_eq!(64 - 5, galois_group.representative(transform.automorphism(17)));
    assert!(galois_group.eq_el(transform.reverse_automorphism(3), galois_group.pow(galois_group.from_representative(5), -3)));
    for (from, to) in [(0, 5), (3, 20), (31, 2)] {
        let expected = galois_group.mul(transform.reverse_automorphism(from), transform.automorphism(to));
        assert!(galois_group.eq_el(expected, transform.difference_automorphism(from, to)));
    }
    let b = transform.babystep_automorphism_count();
    for i in 0..32 {
        let giant_step = transform.automorphism(i - i % b);
        let baby_step = transform.automorphism(i % b);
        assert!(galois_group.eq_el(transform.automorphism(i), galois_group.mul(giant_step, baby_step)));
    }
}

#[test]
fn test_fix_coefficient_shift() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 17));
    let ring = slot_ring.ring();
    let galois_group = slot_ring.galois_group();
    let params = BabyStepGiantStepParams::new(8, true, 4);
    let mut builder = LinearTransformBuilder::new(slot_ring.clone(), params);
    let coefficients = (0..16).map(|_| ring.get_ring().random_element(|| rng.rand_u64())).collect::<Vec<_>>();
    let indexing = AutomorphismIndexing::new(&*slot_ring, params);
    for (i, c) in coefficients.iter().enumerate() {
        builder.add_scaled_transform(c, &Rotation::new(vec![(None, indexing.automorphism(i))]), &Frobenius::new(0, galois_group.identity()));
    }
    let transform = builder.fix_coefficient_shift();
    for (i, c) in coefficients.iter().enumerate() {
        assert_el_eq!(ring, c, transform.coefficient(i));
    }
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let expected = ring.sum(coefficients.iter().enumerate().map(|(i, c)| ring.mul_ref_snd(ring.apply_galois_action(&x, indexing.automorphism(i)), c)));
    assert_el_eq!(ring, expected, transform.evaluate(&x));
    assert_el_eq!(ring, expected, transform.evaluate_naive(&x));
}

#[test]
fn test_compile_slot_basis() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (32, 17), (16, 97), (16, 289), (4, 13)] {
        for use_g2 in [true, false] {
            let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
            let ring = slot_ring.ring();
            let block_size = if use_g2 { slot_ring.slot_count() } else { slot_ring.lane_len() };
            let matrices = random_block_matrices(&slot_ring, block_size, &mut rng);
            let transform = compile_block_matrices(&slot_ring, &matrices, BabyStepGiantStepParams::with_optimal_babysteps(N / 2, use_g2));
            assert_eq!(if use_g2 { 2 } else { 1 }, transform.g2_subgroup_order());

            for _ in 0..3 {
                let x = ring.get_ring().random_element(|| rng.rand_u64());
                let expected = apply_block_matrices(&slot_ring, &matrices, block_size, &slot_ring.slot_values(&x));
                let actual = transform.evaluate(&x);
                assert_slots_eq(&slot_ring, &expected, &slot_ring.slot_values(&actual));
            }
        }
    }
}

#[test]
fn test_compile_slot_basis_p_3_mod_4() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 7), (16, 23), (32, 7), (8, 23), (16, 49)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let ring = slot_ring.ring();
        let matrices = random_block_matrices(&slot_ring, slot_ring.slot_count(), &mut rng);
        let transform = compile_block_matrices(&slot_ring, &matrices, BabyStepGiantStepParams::with_optimal_babysteps(N / 2, true));
        for _ in 0..3 {
            let x = ring.get_ring().random_element(|| rng.rand_u64());
            let expected = apply_block_matrices(&slot_ring, &matrices, slot_ring.slot_count(), &slot_ring.slot_values(&x));
            assert_slots_eq(&slot_ring, &expected, &slot_ring.slot_values(&transform.evaluate(&x)));
            assert_el_eq!(ring, transform.evaluate_naive(&x), transform.evaluate(&x));
        }
    }
}

#[test]
#[should_panic(expected = "is not a power of g1")]
fn test_compile_slot_basis_p_3_mod_4_requires_g2() {
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 7));
    let base_ring = *slot_ring.ring().base_ring();
    CompiledLinearTransform::compile_slot_basis(slot_ring.clone(), |block, row, col| if row == col {
        block.insert((0, 0), base_ring.one());
    }, false);
}

#[test]
fn test_bsgs_matches_naive() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let ring = slot_ring.ring();
    let matrices = random_block_matrices(&slot_ring, slot_ring.slot_count(), &mut rng);
    for babysteps in [1, 4, 16, 32] {
        let transform = compile_block_matrices(&slot_ring, &matrices, BabyStepGiantStepParams::new(16, true, babysteps));
        for _ in 0..3 {
            let x = ring.get_ring().random_element(|| rng.rand_u64());
            assert_el_eq!(ring, transform.evaluate_naive(&x), transform.evaluate(&x));
        }
    }
}

#[test]
fn test_scalar_slots_to_first_coefficients() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 97), (32, 17), (16, 289), (16, 7), (16, 23)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let base_ring = ring.base_ring();
        let transform = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());
        let x = ring.get_ring().random_element(|| rng.rand_u64());
        let x_slots = slot_ring.slot_values(&x);
        let expected = ring.from_canonical_basis((0..N).map(|i| if i < slot_ring.slot_count() { slot_algebra.wrt_canonical_basis(&x_slots[i]).at(0) } else { base_ring.zero() }));
        assert_el_eq!(ring, expected, transform.evaluate(&x));
    }
}

#[test]
fn test_first_coeffs_to_scalar_slots() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 97), (32, 17), (16, 289), (16, 7), (16, 23)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let transform = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone());
        let x = ring.get_ring().random_element(|| rng.rand_u64());
        let coefficients = ring.wrt_canonical_basis(&x);
        let expected = (0..slot_ring.slot_count()).map(|s| slot_algebra.inclusion().map(coefficients.at(s))).collect::<Vec<_>>();
        assert_slots_eq(&slot_ring, &expected, &slot_ring.slot_values(&transform.evaluate(&x)));
    }
}

#[test]
fn test_encoding_decoding_roundtrip() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t) in [(16, 17), (16, 97), (64, 17), (16, 7), (32, 23)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let ring = slot_ring.ring();
        let slot_algebra = slot_ring.slot_algebra();
        let base_ring = ring.base_ring();
        let encode = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());
        let decode = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone());

        let scalar_slots = slot_ring.from_slot_values((0..slot_ring.slot_count()).map(|_| slot_algebra.inclusion().map(base_ring.random_element(|| rng.rand_u64()))));
        assert_el_eq!(ring, scalar_slots, decode.evaluate(&encode.evaluate(&scalar_slots)));

        let first_coefficients = ring.from_canonical_basis((0..N).map(|i| if i < slot_ring.slot_count() { base_ring.random_element(|| rng.rand_u64()) } else { base_ring.zero() }));
        assert_el_eq!(ring, first_coefficients, encode.evaluate(&decode.evaluate(&first_coefficients)));
    }
}

#[test]
fn test_galois_elements() {
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let base_ring = *slot_ring.ring().base_ring();
    let galois_group = slot_ring.galois_group();

    let identity = CompiledLinearTransform::compile_slot_basis(slot_ring.clone(), |block, row, col| if row == col {
        for i in 0..slot_ring.slot_rank() {
            block.insert((i, i), base_ring.one());
        }
    }, true);
    assert_eq!(0, identity.galois_elements().len());

    let rotation = CompiledLinearTransform::compile_slot_basis(slot_ring.clone(), |block, row, col| if row == (col + 1) % slot_ring.slot_count() {
        for i in 0..slot_ring.slot_rank() {
            block.insert((i, i), base_ring.one());
        }
    }, true);
    let mut expected = slot_ring.rotate(1).terms().iter().map(|(_, g)| galois_group.representative(*g)).collect::<Vec<_>>();
    expected.sort();
    let mut used = (0..rotation.params().automorphism_count()).filter(|i| !slot_ring.ring().is_zero(&rotation.coefficient(*i))).map(|i| galois_group.representative(rotation.automorphism(i))).collect::<Vec<_>>();
    used.sort();
    assert_eq!(expected, used);

    // every used automorphism needs at most one baby step and one giant step
    let galois_elements = rotation.galois_elements();
    assert!(galois_elements.len() >= 1 && galois_elements.len() <= 2 * expected.len());
    assert!(galois_elements.iter().all(|g| !galois_group.is_identity(*g)));
    assert!(galois_elements.windows(2).all(|w| galois_group.representative(w[0]) < galois_group.representative(w[1])));
}

#[test]
fn test_save_load_binary() {
    let mut rng = oorandom::Rand64::new(1);
    for (N, t, babysteps) in [(16, 17, 4), (16, 97, 8), (64, 17, 8), (64, 17, 64), (16, 7, 4)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let ring = slot_ring.ring();
        let matrices = random_block_matrices(&slot_ring, slot_ring.slot_count(), &mut rng);
        let params = BabyStepGiantStepParams::new(N / 2, true, babysteps);
        let transform = compile_block_matrices(&slot_ring, &matrices, params);

        let mut bytes = Vec::new();
        transform.save_binary(&mut bytes).unwrap();
        assert_eq!(N * N * 8, bytes.len());
        let loaded = CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..]).unwrap();
        assert_eq!(transform.params(), loaded.params());
        for i in 0..params.automorphism_count() {
            assert_el_eq!(ring, transform.coefficient(i), loaded.coefficient(i));
            assert_el_eq!(ring, transform.stored_coefficients()[i], loaded.stored_coefficients()[i]);
        }
        let x = ring.get_ring().random_element(|| rng.rand_u64());
        assert_el_eq!(ring, transform.evaluate(&x), loaded.evaluate(&x));

        assert_eq!(std::io::ErrorKind::UnexpectedEof, CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..(bytes.len() - 1)]).err().unwrap().kind());
        bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(std::io::ErrorKind::InvalidData, CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..]).err().unwrap().kind());
    }
}

#[test]
fn test_load_binary_with_other_babysteps() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let ring = slot_ring.ring();
    let matrices = random_block_matrices(&slot_ring, slot_ring.slot_count(), &mut rng);
    let transform = compile_block_matrices(&slot_ring, &matrices, BabyStepGiantStepParams::new(16, true, 4));
    let mut bytes = Vec::new();
    transform.save_binary(&mut bytes).unwrap();

    let x = ring.get_ring().random_element(|| rng.rand_u64());
    for babysteps in [1, 8, 16, 32] {
        let params = BabyStepGiantStepParams::new(16, true, babysteps);
        let loaded = CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..]).unwrap();
        assert_eq!(babysteps, loaded.babystep_automorphism_count());
        assert_el_eq!(ring, transform.evaluate(&x), loaded.evaluate(&x));
    }
}

#[test]
fn test_load_binary_rejects_mismatched_params() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let matrices = random_block_matrices(&slot_ring, slot_ring.slot_count(), &mut rng);
    let transform = compile_block_matrices(&slot_ring, &matrices, BabyStepGiantStepParams::new(16, true, 4));
    let mut bytes = Vec::new();
    transform.save_binary(&mut bytes).unwrap();

    // params of a ring of degree 16, thus `ord(g1) = 8` instead of 16
    let params = BabyStepGiantStepParams::new(8, true, 4);
    assert_eq!(std::io::ErrorKind::InvalidInput, CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..]).err().unwrap().kind());

    let params: BabyStepGiantStepParams = serde_json::from_str(r#"{"g1_subgroup_order":16,"g2_subgroup_order":2,"babystep_count":3}"#).unwrap();
    assert_eq!(std::io::ErrorKind::InvalidInput, CompiledLinearTransform::load_binary(slot_ring.clone(), params, &bytes[..]).err().unwrap().kind());
}

#[test]
#[ignore]
fn time_compile_first_coefficients_to_scalar_slots() {
    use tracing_subscriber::prelude::*;
    let (chrome_layer, _guard) = tracing_chrome::ChromeLayerBuilder::new().build();
    tracing_subscriber::registry().with(chrome_layer).init();

    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(128, 17));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone());
    let x = ring.get_ring().random_element(|| rng.rand_u64());
    let result = transform.evaluate(&x);
    std::hint::black_box(result);
}
