use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use feanor_math::serialization::{DeserializeWithRing, SerializeWithRing};
use serde::de::{self, DeserializeSeed, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

use crate::lintransform::compiled::*;
use crate::number_ring::negacyclic::*;
use crate::slots::*;

struct CompiledLinearTransformSerializable<'a> {
    params: &'a BabyStepGiantStepParams,
    coefficients: Vec<SerializeWithRing<'a, &'a NegacyclicRing>>
}

impl<'a> Serialize for CompiledLinearTransformSerializable<'a> {

    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where S: serde::Serializer
    {
        let mut out = serializer.serialize_struct("CompiledLinearTransform", 2)?;
        out.serialize_field("params", self.params)?;
        out.serialize_field("coefficients", &self.coefficients)?;
        return out.end();
    }
}

///
/// Serializes the parameters and the stored coefficients. The slot ring is not serialized, and
/// has to be provided during deserialization by [`DeserializeLinearTransformSeed`].
///
impl<S: SlotRing> Serialize for CompiledLinearTransform<S> {

    fn serialize<Ser>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error>
        where Ser: serde::Serializer
    {
        let ring = self.ring();
        CompiledLinearTransformSerializable {
            params: self.params(),
            coefficients: self.stored_coefficients().iter().map(|c| SerializeWithRing::new(c, ring)).collect()
        }.serialize(serializer)
    }
}

#[derive(Clone)]
pub struct VecDeserializeSeed<S: Clone> {
    pub base_seed: S
}

impl<'de, S> DeserializeSeed<'de> for VecDeserializeSeed<S>
    where S: Clone + DeserializeSeed<'de>
{
    type Value = Vec<S::Value>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where D: de::Deserializer<'de>
    {
        struct ElementsVisitor<S: Clone> {
            seed: S
        }
        impl<'de, S> Visitor<'de> for ElementsVisitor<S>
            where S: Clone + DeserializeSeed<'de>
        {
            type Value = Vec<S::Value>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "sequence of values")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                where A: de::SeqAccess<'de>
            {
                let mut result = Vec::new();
                while let Some(el) = seq.next_element_seed(self.seed.clone())? {
                    result.push(el);
                }
                return Ok(result);
            }
        }
        deserializer.deserialize_seq(ElementsVisitor { seed: self.base_seed })
    }
}

///
/// Deserializes a [`CompiledLinearTransform`] over the given slot ring.
///
/// Fails if the parameters do not fit the slot ring, or if the number or size of the
/// coefficients does not match the parameters.
///
pub struct DeserializeLinearTransformSeed<S: SlotRing> {
    pub slot_ring: Arc<S>
}

impl<S: SlotRing> Clone for DeserializeLinearTransformSeed<S> {

    fn clone(&self) -> Self {
        Self { slot_ring: self.slot_ring.clone() }
    }
}

fn build_transform<S, E>(slot_ring: Arc<S>, params: BabyStepGiantStepParams, coefficients: Vec<NegacyclicRingEl>) -> Result<CompiledLinearTransform<S>, E>
    where S: SlotRing,
        E: de::Error
{
    if !params.is_valid() {
        return Err(E::custom(format!("invalid baby-step giant-step parameters {:?}", params)));
    }
    let ord_g1 = slot_ring.galois_generators().map(|generators| generators.ord_g1);
    if ord_g1 != Some(params.g1_subgroup_order()) {
        return Err(E::custom(format!("parameters {:?} do not fit the ring {:?}", params, slot_ring.ring())));
    }
    if coefficients.len() != params.automorphism_count() {
        return Err(E::invalid_length(coefficients.len(), &format!("{} coefficients", params.automorphism_count()).as_str()));
    }
    return Ok(CompiledLinearTransform::from_stored_coefficients(slot_ring, params, coefficients));
}

impl<'de, S: SlotRing> DeserializeSeed<'de> for DeserializeLinearTransformSeed<S> {

    type Value = CompiledLinearTransform<S>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
        where D: serde::Deserializer<'de>
    {
        struct FieldsVisitor<S: SlotRing> {
            slot_ring: Arc<S>
        }

        impl<'de, S: SlotRing> Visitor<'de> for FieldsVisitor<S> {

            type Value = CompiledLinearTransform<S>;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(formatter, "struct `CompiledLinearTransform` with fields `params`, `coefficients`")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
                where A: de::SeqAccess<'de>
            {
                let ring = self.slot_ring.ring();
                let params = seq.next_element::<BabyStepGiantStepParams>()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let coefficients = seq.next_element_seed(VecDeserializeSeed { base_seed: DeserializeWithRing::new(ring) })?.ok_or_else(|| de::Error::invalid_length(1, &self))?;
                return build_transform(self.slot_ring.clone(), params, coefficients);
            }

            fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
                where M: de::MapAccess<'de>
            {
                #[allow(non_camel_case_types)]
                #[derive(Deserialize)]
                enum Field {
                    params,
                    coefficients
                }
                let ring = self.slot_ring.ring();
                let mut params = None;
                let mut coefficients = None;
                while let Some(key) = map.next_key()? {
                    match key {
                        Field::params => {
                            if params.is_some() {
                                return Err(de::Error::duplicate_field("params"));
                            }
                            params = Some(map.next_value::<BabyStepGiantStepParams>()?);
                        },
                        Field::coefficients => {
                            if coefficients.is_some() {
                                return Err(de::Error::duplicate_field("coefficients"));
                            }
                            coefficients = Some(map.next_value_seed(VecDeserializeSeed { base_seed: DeserializeWithRing::new(ring) })?);
                        }
                    }
                }
                let params = params.ok_or_else(|| de::Error::missing_field("params"))?;
                let coefficients = coefficients.ok_or_else(|| de::Error::missing_field("coefficients"))?;
                return build_transform(self.slot_ring.clone(), params, coefficients);
            }
        }

        deserializer.deserialize_struct("CompiledLinearTransform", &["params", "coefficients"], FieldsVisitor {
            slot_ring: self.slot_ring
        })
    }
}

impl<S: SlotRing> CompiledLinearTransform<S> {

    ///
    /// Writes the transform as JSON to the given file.
    ///
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), self)?;
        Ok(())
    }

    ///
    /// Reads a transform written by [`CompiledLinearTransform::save_json()`].
    ///
    pub fn load_json<P: AsRef<Path>>(path: P, slot_ring: Arc<S>) -> std::io::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_reader(BufReader::new(File::open(path)?));
        let result = DeserializeLinearTransformSeed { slot_ring: slot_ring }.deserialize(&mut deserializer)?;
        deserializer.end()?;
        return Ok(result);
    }
}

#[cfg(test)]
use feanor_math::assert_el_eq;
#[cfg(test)]
use feanor_math::ring::*;
#[cfg(test)]
use crate::slots::pow2::Pow2SlotRing;

#[cfg(test)]
fn assert_transform_eq<S: SlotRing>(expected: &CompiledLinearTransform<S>, actual: &CompiledLinearTransform<S>) {
    let ring = expected.ring();
    assert_eq!(expected.params(), actual.params());
    for (e, a) in expected.stored_coefficients().iter().zip(actual.stored_coefficients().iter()) {
        assert_el_eq!(ring, e, a);
    }
}

#[test]
fn test_serialization() {
    for (N, t) in [(16, 17), (32, 97)] {
        let slot_ring = Arc::new(Pow2SlotRing::new(N, t));
        let transform = CompiledLinearTransform::first_coefficients_to_scalar_slots(slot_ring.clone());

        for human_readable in [true, false] {
            let serializer = serde_assert::Serializer::builder().is_human_readable(human_readable).build();
            let tokens = transform.serialize(&serializer).unwrap();
            let mut deserializer = serde_assert::Deserializer::builder(tokens).is_human_readable(human_readable).build();
            let deserialized = DeserializeLinearTransformSeed { slot_ring: slot_ring.clone() }.deserialize(&mut deserializer).unwrap();
            assert_transform_eq(&transform, &deserialized);
        }
    }
}

#[test]
fn test_serialize_params() {
    let params = BabyStepGiantStepParams::new(16, false, 4);
    let serializer = serde_assert::Serializer::builder().build();
    let tokens = params.serialize(&serializer).unwrap();
    let mut deserializer = serde_assert::Deserializer::builder(tokens).build();
    assert_eq!(params, BabyStepGiantStepParams::deserialize(&mut deserializer).unwrap());
}

#[test]
fn test_json_roundtrip() {
    let mut rng = oorandom::Rand64::new(1);
    let slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let ring = slot_ring.ring();
    let transform = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());

    let json = serde_json::to_string(&transform).unwrap();
    let deserialized = DeserializeLinearTransformSeed { slot_ring: slot_ring.clone() }.deserialize(&mut serde_json::Deserializer::from_str(&json)).unwrap();
    assert_transform_eq(&transform, &deserialized);

    let path = std::env::temp_dir().join(format!("he_lintransform_test_json_roundtrip_{}.json", std::process::id()));
    transform.save_json(&path).unwrap();
    let loaded = CompiledLinearTransform::load_json(&path, slot_ring.clone()).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_transform_eq(&transform, &loaded);

    let x = ring.get_ring().random_element(|| rng.rand_u64());
    assert_el_eq!(ring, transform.evaluate(&x), loaded.evaluate(&x));
}

#[test]
fn test_json_invalid() {
    let slot_ring = Arc::new(Pow2SlotRing::new(16, 17));
    let transform = CompiledLinearTransform::scalar_slots_to_first_coefficients(slot_ring.clone());

    let mut value = serde_json::to_value(&transform).unwrap();
    value["params"]["babystep_count"] = serde_json::Value::from(3);
    let json = serde_json::to_string(&value).unwrap();
    assert!(DeserializeLinearTransformSeed { slot_ring: slot_ring.clone() }.deserialize(&mut serde_json::Deserializer::from_str(&json)).is_err());

    let mut value = serde_json::to_value(&transform).unwrap();
    value["coefficients"].as_array_mut().unwrap().pop();
    let json = serde_json::to_string(&value).unwrap();
    assert!(DeserializeLinearTransformSeed { slot_ring: slot_ring.clone() }.deserialize(&mut serde_json::Deserializer::from_str(&json)).is_err());

    let mut value = serde_json::to_value(&transform).unwrap();
    value["coefficients"][0].as_array_mut().unwrap().pop();
    let json = serde_json::to_string(&value).unwrap();
    assert!(DeserializeLinearTransformSeed { slot_ring: slot_ring.clone() }.deserialize(&mut serde_json::Deserializer::from_str(&json)).is_err());

    let other_slot_ring = Arc::new(Pow2SlotRing::new(32, 17));
    let json = serde_json::to_string(&transform).unwrap();
    assert!(DeserializeLinearTransformSeed { slot_ring: other_slot_ring }.deserialize(&mut serde_json::Deserializer::from_str(&json)).is_err());

    let path = std::env::temp_dir().join(format!("he_lintransform_test_json_invalid_{}.json", std::process::id()));
    assert_eq!(std::io::ErrorKind::NotFound, CompiledLinearTransform::load_json(&path, slot_ring).err().unwrap().kind());
}
