//! Newtype IDs for type-safe references to commerce platform resources.
//!
//! The commerce platform hands out opaque string identifiers. Use the
//! `define_id!` macro to create wrappers that prevent accidentally passing a
//! basket ID where a customer ID is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use larkspur_core::define_id;
/// define_id!(CustomerId);
/// define_id!(BasketId);
///
/// let customer_id = CustomerId::new("abKc1");
/// let basket_id = BasketId::new("abKc1");
///
/// // These are different types, so this won't compile:
/// // let _: CustomerId = basket_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Commerce platform identifiers
define_id!(CustomerId);
define_id!(BasketId);
define_id!(ProductId);
// Shopper session identifier, shared by the guest and registered sessions of one visitor.
define_id!(Usid);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_as_str() {
        let id = CustomerId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
    }

    #[test]
    fn test_serde_transparent() {
        let id = BasketId::from("bsk-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"bsk-1\"");

        let parsed: BasketId = serde_json::from_str("\"bsk-1\"").unwrap();
        assert_eq!(parsed, id);
    }
}
