use serde::{Deserialize, Serialize};
use std::fmt;

/// Row identifiers assigned by the relational store. They are plain integers,
/// which is what makes them safe to interpolate into membership lists.
macro_rules! int_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

int_id!(FormId);
int_id!(FieldId);
int_id!(SubmissionId);
int_id!(PageId);
int_id!(IpAddressId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_bare_integer() {
        assert_eq!(FormId::new(42).to_string(), "42");
        assert_eq!(format!("{:?}", SubmissionId::new(7)), "SubmissionId(7)");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&PageId::new(3)).unwrap();
        assert_eq!(json, "3");
        let back: PageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PageId::new(3));
    }
}
