//! vizij-api-core: value model and blend math shared by the animation runtime (engine-agnostic)

pub mod blend;
pub mod value;

pub use blend::{lerp_value, slerp, Trs};
pub use value::{Value, ValueKind};
