//! Cheap-to-clone identifiers shared by both engines.
//!
//! Junction, landmark and actor ids are created once (from the lane engine's
//! id lists or program parameters) and cloned on every tick, so they wrap an
//! `Arc<str>` and clone in O(1).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

macro_rules! arc_str_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default)]
        pub struct $name(Arc<str>);

        impl $name {
            #[inline]
            pub fn new(s: &str) -> Self {
                Self(Arc::from(s))
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(s: &str) -> Self {
                Self(Arc::from(s))
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(s: String) -> Self {
                Self(Arc::from(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl PartialEq for $name {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
            }
        }

        impl Eq for $name {}

        impl PartialEq<str> for $name {
            #[inline]
            fn eq(&self, other: &str) -> bool {
                self.0.as_ref() == other
            }
        }

        impl PartialEq<&str> for $name {
            #[inline]
            fn eq(&self, other: &&str) -> bool {
                self.0.as_ref() == *other
            }
        }

        // Ordered maps keyed by id must agree with `str` ordering for `Borrow<str>` lookups.
        impl PartialOrd for $name {
            #[inline]
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            #[inline]
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.0.as_ref().cmp(other.0.as_ref())
            }
        }

        impl Hash for $name {
            #[inline]
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s))
            }
        }
    };
}

arc_str_id!(
    /// Lane-engine traffic light (junction) id, e.g. `"918"`.
    JunctionId
);

arc_str_id!(
    /// World-engine light asset id as it appears in program parameters.
    ///
    /// ```
    /// use contracts::LandmarkId;
    ///
    /// let id: LandmarkId = "1032".into();
    /// assert_eq!(id, "1032");
    /// ```
    LandmarkId
);

arc_str_id!(
    /// Lane-engine vehicle id.
    ActorId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_clone_is_cheap() {
        let id1: LandmarkId = "1032".into();
        let id2 = id1.clone();
        assert_eq!(id1.as_str().as_ptr(), id2.as_str().as_ptr());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map: HashMap<ActorId, i32> = HashMap::new();
        map.insert("carla0".into(), 1);
        assert_eq!(map.get("carla0"), Some(&1));

        let mut ordered: BTreeMap<JunctionId, i32> = BTreeMap::new();
        ordered.insert("918".into(), 7);
        ordered.insert("12".into(), 3);
        assert_eq!(ordered.get("918"), Some(&7));
        assert_eq!(ordered.keys().next().map(JunctionId::as_str), Some("12"));
    }

    #[test]
    fn test_serde() {
        let id: JunctionId = "gneJ1".into();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"gneJ1\"");
        let parsed: JunctionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_debug_names_type() {
        let id: ActorId = "veh".into();
        assert_eq!(format!("{id:?}"), "ActorId(\"veh\")");
    }
}
