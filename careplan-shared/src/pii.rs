use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for protected health information (patient names, clinical notes).
///
/// `Debug` and `Display` always print a mask so the value cannot leak through
/// `tracing` fields. Serialization passes the real value through, since API
/// responses and exports need it.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let name = Masked::new("Jane Doe".to_string());
        assert_eq!(format!("{}", name), "********");
        assert_eq!(format!("{:?}", name), "********");
        assert_eq!(name.expose(), "Jane Doe");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let name = Masked::new("Jane Doe".to_string());
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Jane Doe\"");
    }
}
