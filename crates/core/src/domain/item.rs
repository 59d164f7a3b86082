use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self)
    }
}

/// A catalog item as the host hands it to the plugin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
    pub name: String,
}

impl ItemRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id: ItemId(id), name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::ItemId;

    #[test]
    fn parses_numeric_strings_with_whitespace() {
        assert_eq!(" 42 ".parse::<ItemId>().expect("numeric id"), ItemId(42));
        assert!("forty-two".parse::<ItemId>().is_err());
    }
}
