mod codec;
mod native;

pub use codec::{decode_fields, decode_value, encode_field_transform, encode_fields, encode_value};
pub use native::DocValue;

pub(crate) use codec::{append_path, parse_timestamp};
