//! Built-in types - the few value types the slot ABI traffics in
//!
//! Design: each type is a static, immortal type object with its own layout
//! and dealloc slot, exposing both C FFI exports and Rust helpers. Each
//! builtin is in a focused module.

pub mod dict;
pub mod int;
pub mod singletons;
pub mod string;
pub mod tuple;

#[cfg(test)]
mod tests;

pub use dict::{
    pyrt_dict_check, pyrt_dict_get_item_string, pyrt_dict_new, pyrt_dict_next, pyrt_dict_set_item,
    pyrt_dict_set_item_string, pyrt_dict_size,
};
pub use int::{new_bool, pyrt_bool_from_long, pyrt_false, pyrt_long_as_i64, pyrt_long_from_i64, pyrt_true};
pub use singletons::{new_not_implemented, pyrt_none, pyrt_not_implemented};
pub use string::{new_str, pyrt_unicode_as_utf8, pyrt_unicode_check, pyrt_unicode_from_string};
pub use tuple::{pyrt_tuple_check, pyrt_tuple_get_item, pyrt_tuple_new, pyrt_tuple_set_item, pyrt_tuple_size};

use crate::logging::debug;

/// Initialize builtins subsystem
///
/// Forces the static type objects and singletons into existence.
pub fn init() {
    string::str_type();
    int::int_type();
    int::bool_type();
    tuple::tuple_type();
    dict::dict_type();
    pyrt_none();
    pyrt_not_implemented();
    pyrt_true();
    pyrt_false();
    debug!("builtins initialized (str, int, bool, tuple, dict)");
}
