use crate::cyclotomic::*;
use crate::number_ring::negacyclic::*;

///
/// The operations of a homomorphic encryption scheme that are required to evaluate a compiled
/// linear transform on a ciphertext.
///
/// Plaintexts are encoded once per transform and then cached, which is why they must be shareable
/// between threads.
///
pub trait HomomorphicEvaluator {

    type Ciphertext;
    type Plaintext: 'static + Send + Sync;
    type GaloisKeys;

    ///
    /// Encodes the given element of `ring` as plaintext, so that it can be multiplied with
    /// ciphertexts.
    ///
    fn encode(&self, ring: &NegacyclicRing, m: &NegacyclicRingEl) -> Self::Plaintext;

    fn multiply_plain(&self, ct: &Self::Ciphertext, m: &Self::Plaintext) -> Self::Ciphertext;

    ///
    /// Applies the automorphism `X -> X^g` to the encrypted message. The keys must contain a
    /// key-switching key for `g`.
    ///
    fn apply_automorphism(&self, ct: &Self::Ciphertext, g: CyclotomicGaloisGroupEl, keys: &Self::GaloisKeys) -> Self::Ciphertext;

    ///
    /// Applies multiple automorphisms to the same ciphertext. Schemes that support hoisting should
    /// override this, since it is used to compute all baby steps at once.
    ///
    fn apply_automorphism_many(&self, ct: &Self::Ciphertext, gs: &[CyclotomicGaloisGroupEl], keys: &Self::GaloisKeys) -> Vec<Self::Ciphertext> {
        gs.iter().map(|g| self.apply_automorphism(ct, *g, keys)).collect()
    }

    fn add(&self, lhs: Self::Ciphertext, rhs: &Self::Ciphertext) -> Self::Ciphertext;

    fn clone_ct(&self, ct: &Self::Ciphertext) -> Self::Ciphertext;
}
