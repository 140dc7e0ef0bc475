// Wrapper declarations for this crate.
//
// Read by build.rs and never compiled itself. The generated wrappers are
// included at the crate root, so paths here resolve as they would in lib.rs.

use crate::fixtures::{RefType, SomeEnum};

#[type_wrapper(i32)]
#[readonly]
pub struct WrappedInt;

#[type_wrapper(i32)]
#[readonly]
pub struct OtherWrappedInt;

#[type_wrapper(String)]
#[readonly]
pub struct WrappedString;

#[type_wrapper(RefType)]
#[readonly]
pub struct WrappedRefType;

#[type_wrapper(i32, Feature::JsonConverter)]
#[readonly]
pub struct WrappedJsonInt;

#[type_wrapper(String, Feature::JsonConverter)]
#[readonly]
pub struct WrappedJsonString;

#[type_wrapper(SomeEnum, Feature::JsonConverter)]
#[readonly]
pub struct WrappedEnum;

#[type_wrapper(Option<String>, Feature::JsonConverter)]
#[readonly]
pub struct OptionalName;

#[type_wrapper(Box<str>, Feature::JsonConverter)]
#[readonly]
pub struct BoxedLabel;

#[type_wrapper(i32)]
#[readonly]
pub struct GenericWrappedInt<T>;

#[type_wrapper(String, Feature::JsonConverter)]
#[readonly]
pub struct GenericWrappedString<T>;

#[type_wrapper(i32, Feature::HostSerializable)]
pub struct SerializableWrappedInt;

#[type_wrapper(String, Feature::HostSerializable | Feature::JsonConverter)]
pub struct SerializableWrappedString;

#[type_wrapper(String, Feature::JsonConverter)]
#[readonly]
pub struct Email;

impl Email {
    fn on_create(value: &mut String) {
        *value = value.trim().to_ascii_lowercase();
    }
}

pub mod some_class {
    #[type_wrapper(i32)]
    #[readonly]
    pub struct ClassWrappedInt;

    #[type_wrapper(String)]
    #[readonly]
    pub struct ClassWrappedString;

    pub mod some_class2 {
        #[type_wrapper(String, Feature::JsonConverter)]
        #[readonly]
        pub struct DoubleClassWrappedString<T>;
    }
}
