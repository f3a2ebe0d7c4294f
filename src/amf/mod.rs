// AMF0 value encoding

mod amf0;
mod de;
mod ser;

pub use amf0::*;
pub use de::*;
pub use ser::*;
