//! Accessor-generation macros for concrete entity wrappers.
//!
//! Typed getters/setters for declared columns are synthesized from the
//! schema vocabulary instead of hand-written or dispatched on strings at
//! runtime. A wrapper only needs `entity()` / `entity_mut()` methods and can
//! then declare its accessor surface:
//!
//! ```ignore
//! impl AttributeTax {
//!     entity_string_accessor!("label", get_label, set_label);
//!     entity_int_accessor!("public", get_public, set_public);
//! }
//! ```

/// Generate a typed getter/setter pair for a string column.
///
/// The getter takes the accessor [`Context`](crate::entity::Context) and
/// returns the value's display string; the setter records the change
/// through the generic property path.
#[macro_export]
macro_rules! entity_string_accessor {
    ($prop:literal, $getter:ident, $setter:ident) => {
        #[must_use]
        pub fn $getter(&self, context: $crate::entity::Context) -> String {
            self.entity()
                .get($prop, context)
                .map($crate::value::Value::into_string)
                .unwrap_or_default()
        }

        pub fn $setter(
            &mut self,
            value: impl Into<String>,
        ) -> Result<(), $crate::error::DataError> {
            self.entity_mut().set($prop, value.into())
        }
    };
}

/// Generate a typed getter/setter pair for an integer column.
#[macro_export]
macro_rules! entity_int_accessor {
    ($prop:literal, $getter:ident, $setter:ident) => {
        #[must_use]
        pub fn $getter(&self, context: $crate::entity::Context) -> i64 {
            self.entity()
                .get($prop, context)
                .map($crate::value::Value::into_int)
                .unwrap_or_default()
        }

        pub fn $setter(&mut self, value: i64) -> Result<(), $crate::error::DataError> {
            self.entity_mut().set($prop, value)
        }
    };
}
