//! Tag handling: the filename encoding and the alias table.
//!
//! - `codec` - tag set <-> `(tag)(tag)` basename conversion
//! - `alias` - synonym groups and dedup-aware counting

mod alias;
mod codec;

pub use alias::{AliasResolver, BUILTIN_ALIAS_GROUPS};
pub use codec::{decode, decode_fast, encode, has_tag_groups};
