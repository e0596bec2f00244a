use std::iter::FromIterator;
use std::ops::{Deref, DerefMut};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{self, Value};

/// A JSON object with its key order preserved.
///
/// Property bags and output data are opaque to this crate; providers pull typed values
/// out of them with [`Map::deserialize_into`] and build outputs with [`Map::serialize_from`].
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Map(serde_json::Map<String, Value>);

impl Map {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Fails unless `t` serializes to a JSON object.
    pub fn serialize_from<T: Serialize>(t: T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(t).and_then(serde_json::from_value)
    }
}

impl Deref for Map {
    type Target = serde_json::Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Map {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Map {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Pipeline {
        name: String,
        input_bucket: String,
    }

    #[test]
    fn rejects_non_objects() {
        for value in vec![json!(null), json!(true), json!(3), json!(1.5), json!("x"), json!([1])] {
            assert!(serde_json::from_value::<Map>(value).is_err());
        }
    }

    #[test]
    fn keeps_key_order() {
        let map: Map = serde_json::from_str(r#"{"Zeta":1,"Alpha":2,"Mid":{"b":1,"a":2}}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(|k| &k[..]).collect();
        assert_eq!(keys, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"Zeta":1,"Alpha":2,"Mid":{"b":1,"a":2}}"#);
    }

    #[test]
    fn typed_extraction() {
        let map: Map = vec![
            ("Name", json!("TestPipeline")),
            ("InputBucket", json!("rawvideo")),
        ].into_iter().collect();

        let pipeline: Pipeline = map.deserialize_into().unwrap();
        assert_eq!(pipeline, Pipeline { name: "TestPipeline".into(), input_bucket: "rawvideo".into() });
        assert_eq!(map["Name"], json!("TestPipeline"));
    }

    #[test]
    fn serialize_from_struct() {
        #[derive(Serialize)]
        struct Outputs { id: &'static str }

        let map = Map::serialize_from(Outputs { id: "abc" }).unwrap();
        assert_eq!(serde_json::to_value(&map).unwrap(), json!({ "id": "abc" }));
        assert!(Map::serialize_from(vec![1, 2]).is_err());
    }
}
