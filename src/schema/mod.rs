pub mod literal;
pub mod model;
pub mod parser;
pub mod types;

pub use literal::decode_literal;
pub use model::{Field, FieldRole, SchemaModel};
pub use parser::{ParsedSchema, SchemaParser};
pub use types::{NativeKind, TypeResolver, TypeTree};
