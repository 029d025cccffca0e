//! Conversion of classifier-native values into plain JSON.
//!
//! Classifier backends hand back scores as single-precision floats, wide
//! integers, flags and whole tensors. [`RawValue`] carries those as-is;
//! [`normalize`] turns them into a `serde_json::Value` that only uses JSON
//! types so the result can go straight into a response body or a document.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Number, Value};

/// Key marking a serialized tensor: `{"__ndarray__": [...], "shape": [...]}`.
pub const NDARRAY_TAG: &str = "__ndarray__";

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i128),
    Float32(f32),
    Float(f64),
    Str(String),
    /// Elements are scalars; each keeps its own type.
    Tensor(ArrayD<RawValue>),
    Seq(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
}

/// Recursively convert `raw` into JSON-native values.
pub fn normalize(raw: RawValue) -> Value {
    match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(b),
        RawValue::Int(i) => int_value(i),
        RawValue::Float32(f) => float_value(f64::from(f)),
        RawValue::Float(f) => float_value(f),
        RawValue::Str(s) => Value::String(s),
        RawValue::Tensor(t) => tensor_value(t.view()),
        RawValue::Seq(items) => Value::Array(items.into_iter().map(normalize).collect()),
        RawValue::Map(entries) => Value::Object(entries.into_iter().map(|(k, v)| (k, normalize(v))).collect()),
    }
}

fn int_value(i: i128) -> Value {
    if let Ok(v) = i64::try_from(i) {
        Value::from(v)
    } else if let Ok(v) = u64::try_from(i) {
        Value::from(v)
    } else {
        float_value(i as f64)
    }
}

// NaN and infinities have no JSON spelling.
fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn tensor_value(view: ArrayViewD<'_, RawValue>) -> Value {
    if view.ndim() == 0 {
        return view.first().cloned().map(normalize).unwrap_or(Value::Null);
    }
    Value::Array(view.outer_iter().map(tensor_value).collect())
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i as i128)
                } else if let Some(u) = n.as_u64() {
                    RawValue::Int(u as i128)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => RawValue::Str(s),
            Value::Array(items) => RawValue::Seq(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Map(map.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect()),
        }
    }
}

impl RawValue {
    /// Unwrap `{"results": [...]}` envelopes some classifier servers add.
    pub fn into_results(self) -> RawValue {
        match self {
            RawValue::Map(mut map) if map.len() == 1 && map.contains_key("results") => {
                map.remove("results").unwrap_or(RawValue::Null)
            }
            other => other,
        }
    }
}

/// Build a tensor out of a tagged map; `None` leaves the map as a plain mapping.
fn tensor_from_tagged(map: &BTreeMap<String, RawValue>) -> Option<ArrayD<RawValue>> {
    let data = map.get(NDARRAY_TAG)?;
    let mut flat = Vec::new();
    let mut inferred = Vec::new();
    let mut leaf_depth = None;
    flatten(data, 0, &mut flat, &mut inferred, &mut leaf_depth)?;
    let shape = match map.get("shape") {
        Some(RawValue::Seq(dims)) => dims
            .iter()
            .map(|d| match d {
                RawValue::Int(i) => usize::try_from(*i).ok(),
                _ => None,
            })
            .collect::<Option<Vec<usize>>>()?,
        Some(_) => return None,
        None => inferred,
    };
    ArrayD::from_shape_vec(IxDyn(&shape), flat).ok()
}

// Every scalar must sit at the same depth and every list at a given depth must
// have the same length, otherwise the data is ragged.
fn flatten(
    v: &RawValue,
    depth: usize,
    out: &mut Vec<RawValue>,
    shape: &mut Vec<usize>,
    leaf_depth: &mut Option<usize>,
) -> Option<()> {
    match v {
        RawValue::Seq(items) => {
            if leaf_depth.is_some_and(|leaf| depth >= leaf) {
                return None;
            }
            match shape.get(depth) {
                Some(&len) if len != items.len() => return None,
                Some(_) => {}
                None => shape.push(items.len()),
            }
            for item in items {
                flatten(item, depth + 1, out, shape, leaf_depth)?;
            }
            Some(())
        }
        RawValue::Map(_) | RawValue::Tensor(_) => None,
        scalar => {
            match *leaf_depth {
                Some(leaf) if leaf != depth => return None,
                Some(_) => {}
                None => {
                    if shape.len() > depth {
                        return None;
                    }
                    *leaf_depth = Some(depth);
                }
            }
            out.push(scalar.clone());
            Some(())
        }
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any classifier value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<RawValue, E> {
        Ok(RawValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<RawValue, E> {
        Ok(RawValue::Int(v as i128))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<RawValue, E> {
        Ok(RawValue::Int(v as i128))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<RawValue, E> {
        Ok(RawValue::Int(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<RawValue, E> {
        Ok(i128::try_from(v).map(RawValue::Int).unwrap_or(RawValue::Float(v as f64)))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<RawValue, E> {
        Ok(RawValue::Float32(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<RawValue, E> {
        Ok(RawValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RawValue, E> {
        Ok(RawValue::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<RawValue, E> {
        Ok(RawValue::Str(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawValue, E> {
        Ok(RawValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<RawValue, D::Error> {
        RawValue::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawValue::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawValue, A::Error> {
        let mut map = BTreeMap::new();
        while let Some((k, v)) = access.next_entry::<String, RawValue>()? {
            map.insert(k, v);
        }
        if let Some(tensor) = tensor_from_tagged(&map) {
            return Ok(RawValue::Tensor(tensor));
        }
        Ok(RawValue::Map(map))
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        d.deserialize_any(RawValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use serde_json::json;

    fn map(entries: Vec<(&str, RawValue)>) -> RawValue {
        RawValue::Map(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn converts_native_scalars_inside_nested_structures() {
        let raw = RawValue::Seq(vec![map(vec![
            ("dominant_emotion", RawValue::Str("happy".into())),
            ("face_confidence", RawValue::Float32(0.5)),
            ("is_real", RawValue::Bool(true)),
            (
                "region",
                map(vec![("x", RawValue::Int(12)), ("y", RawValue::Int(40)), ("w", RawValue::Int(96)), ("h", RawValue::Int(96))]),
            ),
            ("emotion", map(vec![("happy", RawValue::Float(97.25)), ("sad", RawValue::Float32(0.25))])),
        ])]);

        let v = normalize(raw);
        assert_eq!(
            v,
            json!([{
                "dominant_emotion": "happy",
                "face_confidence": 0.5,
                "is_real": true,
                "region": {"x": 12, "y": 40, "w": 96, "h": 96},
                "emotion": {"happy": 97.25, "sad": 0.25}
            }])
        );
    }

    #[test]
    fn single_precision_widens_exactly() {
        let v = normalize(RawValue::Float32(0.1));
        assert_eq!(v.as_f64(), Some(f64::from(0.1f32)));
    }

    #[test]
    fn wide_integers_degrade_to_floats_and_non_finite_to_null() {
        assert_eq!(normalize(RawValue::Int(u64::MAX as i128)), json!(u64::MAX));
        assert_eq!(normalize(RawValue::Int(-5)), json!(-5));
        let huge = normalize(RawValue::Int(i128::MAX));
        assert!(huge.is_f64());
        assert_eq!(normalize(RawValue::Float(f64::NAN)), Value::Null);
        assert_eq!(normalize(RawValue::Float32(f32::INFINITY)), Value::Null);
    }

    #[test]
    fn tensors_become_nested_lists() {
        let t = arr2(&[[1.0, 2.5], [3.0, 4.0]]).mapv(RawValue::Float).into_dyn();
        assert_eq!(normalize(RawValue::Tensor(t)), json!([[1.0, 2.5], [3.0, 4.0]]));
        let scalar = ArrayD::from_elem(IxDyn(&[]), RawValue::Float32(7.5));
        assert_eq!(normalize(RawValue::Tensor(scalar)), json!(7.5));
    }

    #[test]
    fn normalizing_json_is_a_no_op() {
        let v = json!([{
            "emotion": {"angry": 0.01, "happy": 99.2},
            "region": {"x": 1, "y": 2, "w": 3, "h": 4, "left_eye": null},
            "big": u64::MAX,
            "neg": -3,
            "flags": [true, false],
            "dominant_emotion": "happy"
        }]);
        let once = normalize(RawValue::from(v.clone()));
        assert_eq!(once, v);
        let twice = normalize(RawValue::from(once.clone()));
        assert_eq!(twice, once);
    }

    #[test]
    fn deserializes_tagged_tensors() {
        let raw: RawValue = serde_json::from_str(r#"{"scores": {"__ndarray__": [1, 2, 3, 4], "shape": [2, 2]}}"#).unwrap();
        assert_eq!(normalize(raw), json!({"scores": [[1, 2], [3, 4]]}));

        let inferred: RawValue = serde_json::from_str(r#"{"__ndarray__": [[0.5], [1.5]]}"#).unwrap();
        assert_eq!(normalize(inferred), json!([[0.5], [1.5]]));
    }

    #[test]
    fn tensor_elements_keep_their_types() {
        let ints: RawValue = serde_json::from_str(r#"{"__ndarray__": [10, 20], "shape": [2]}"#).unwrap();
        assert!(matches!(ints, RawValue::Tensor(_)));
        let v = normalize(ints);
        assert_eq!(v, json!([10, 20]));
        assert!(v[0].is_i64());

        let big: RawValue = serde_json::from_str(r#"{"__ndarray__": [9007199254740993]}"#).unwrap();
        assert_eq!(normalize(big), json!([9007199254740993u64]));

        let flags: RawValue = serde_json::from_str(r#"{"__ndarray__": [true, false], "shape": [2]}"#).unwrap();
        assert!(matches!(flags, RawValue::Tensor(_)));
        assert_eq!(normalize(flags), json!([true, false]));

        let labels: RawValue = serde_json::from_str(r#"{"__ndarray__": [["happy"], ["sad"]]}"#).unwrap();
        assert_eq!(normalize(labels), json!([["happy"], ["sad"]]));
    }

    #[test]
    fn malformed_tensor_tags_stay_mappings() {
        let raw: RawValue = serde_json::from_str(r#"{"__ndarray__": [[1, 2], [3]]}"#).unwrap();
        assert!(matches!(raw, RawValue::Map(_)));
        assert_eq!(normalize(raw), json!({"__ndarray__": [[1, 2], [3]]}));

        let nested: RawValue = serde_json::from_str(r#"{"__ndarray__": [{"a": 1}]}"#).unwrap();
        assert!(matches!(nested, RawValue::Map(_)));
    }

    #[test]
    fn results_envelope_is_unwrapped() {
        let raw: RawValue = serde_json::from_str(r#"{"results": [{"dominant_emotion": "sad"}]}"#).unwrap();
        assert_eq!(normalize(raw.into_results()), json!([{"dominant_emotion": "sad"}]));
        let bare: RawValue = serde_json::from_str(r#"{"dominant_emotion": "sad"}"#).unwrap();
        assert_eq!(normalize(bare.into_results()), json!({"dominant_emotion": "sad"}));
    }
}
